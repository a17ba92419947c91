// WEX - wex-runtime
// Module: WEX Linear Memory
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! WebAssembly linear memory.
//!
//! A memory instance owns a flat byte vector sized in 64 KiB pages.
//! Addresses arriving here are effective addresses (base plus memarg
//! offset, computed in 64 bits so the 33-bit range cannot wrap); every
//! access is bounds-checked and traps with "out of bounds memory access".
//! An access ending exactly at `size * 65536` is in range; one byte past
//! traps.

use wex_error::Result;
use wex_format::types::MemoryType;

use crate::values::Trap;

/// WebAssembly page size (64 KiB).
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages a memory may hold.
pub const MAX_PAGES: u32 = 65536;

/// A linear memory instance.
#[derive(Debug, Clone)]
pub struct Memory {
    ty: MemoryType,
    data: Vec<u8>,
}

impl Memory {
    /// Allocates a memory of its type's minimum page count.
    #[must_use]
    pub fn new(ty: MemoryType) -> Self {
        Self {
            ty,
            data: vec![0; ty.limits.min as usize * PAGE_SIZE],
        }
    }

    /// The memory's declared type.
    #[must_use]
    pub const fn ty(&self) -> MemoryType {
        self.ty
    }

    /// Current size in pages.
    #[must_use]
    pub fn size(&self) -> u32 {
        (self.data.len() / PAGE_SIZE) as u32
    }

    /// Current size in bytes.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.data.len()
    }

    /// Grows the memory by `delta` pages.
    ///
    /// Returns the previous size in pages, or -1 when the declared
    /// maximum or the 2^16-page limit would be exceeded.
    pub fn grow(&mut self, delta: u32) -> i32 {
        let old = self.size();
        let Some(new) = old.checked_add(delta) else {
            return -1;
        };
        let max = self.ty.limits.max.unwrap_or(MAX_PAGES).min(MAX_PAGES);
        if new > max {
            return -1;
        }
        self.data.resize(new as usize * PAGE_SIZE, 0);
        old as i32
    }

    /// Reads `len` bytes at the effective address.
    pub fn read(&self, addr: u64, len: usize) -> Result<&[u8]> {
        let start = usize::try_from(addr).map_err(|_| Trap::OutOfBoundsMemoryAccess)?;
        let end = start
            .checked_add(len)
            .ok_or(Trap::OutOfBoundsMemoryAccess)?;
        self.data
            .get(start..end)
            .ok_or_else(|| Trap::OutOfBoundsMemoryAccess.into())
    }

    /// Writes `bytes` at the effective address.
    pub fn write(&mut self, addr: u64, bytes: &[u8]) -> Result<()> {
        let start = usize::try_from(addr).map_err(|_| Trap::OutOfBoundsMemoryAccess)?;
        let end = start
            .checked_add(bytes.len())
            .ok_or(Trap::OutOfBoundsMemoryAccess)?;
        let target = self
            .data
            .get_mut(start..end)
            .ok_or(Trap::OutOfBoundsMemoryAccess)?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    /// `memory.fill`: sets `len` bytes at `dst` to `value`.
    pub fn fill(&mut self, dst: u64, value: u8, len: u64) -> Result<()> {
        let (start, end) = self.range(dst, len)?;
        self.data[start..end].fill(value);
        Ok(())
    }

    /// `memory.copy`: overlapping-safe copy of `len` bytes.
    pub fn copy_within(&mut self, dst: u64, src: u64, len: u64) -> Result<()> {
        let (src_start, _) = self.range(src, len)?;
        let (dst_start, _) = self.range(dst, len)?;
        self.data
            .copy_within(src_start..src_start + len as usize, dst_start);
        Ok(())
    }

    /// `memory.init`: copies `len` bytes from `data[src..]` to `dst`.
    ///
    /// Bounds of both the segment and the memory are checked before any
    /// byte moves, so a trapping init writes nothing.
    pub fn init(&mut self, dst: u64, data: &[u8], src: u64, len: u64) -> Result<()> {
        let src_start = usize::try_from(src).map_err(|_| Trap::OutOfBoundsMemoryAccess)?;
        let src_end = src_start
            .checked_add(len as usize)
            .ok_or(Trap::OutOfBoundsMemoryAccess)?;
        let source = data
            .get(src_start..src_end)
            .ok_or(Trap::OutOfBoundsMemoryAccess)?;
        let (dst_start, dst_end) = self.range(dst, len)?;
        self.data[dst_start..dst_end].copy_from_slice(source);
        Ok(())
    }

    fn range(&self, addr: u64, len: u64) -> Result<(usize, usize)> {
        let start = usize::try_from(addr).map_err(|_| Trap::OutOfBoundsMemoryAccess)?;
        let end = start
            .checked_add(usize::try_from(len).map_err(|_| Trap::OutOfBoundsMemoryAccess)?)
            .ok_or(Trap::OutOfBoundsMemoryAccess)?;
        if end > self.data.len() {
            return Err(Trap::OutOfBoundsMemoryAccess.into());
        }
        Ok((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wex_format::types::Limits;

    fn one_page() -> Memory {
        Memory::new(MemoryType {
            limits: Limits {
                min: 1,
                max: Some(2),
            },
        })
    }

    #[test]
    fn boundary_access() {
        let mut memory = one_page();
        // A 4-byte write ending exactly at the page boundary succeeds.
        memory.write(65532, &[1, 2, 3, 4]).unwrap();
        assert_eq!(memory.read(65532, 4).unwrap(), &[1, 2, 3, 4]);
        // One byte past the boundary traps.
        let err = memory.write(65533, &[1, 2, 3, 4]).unwrap_err();
        assert_eq!(err.message, "out of bounds memory access");
        let err = memory.read(65536, 1).unwrap_err();
        assert_eq!(err.message, "out of bounds memory access");
    }

    #[test]
    fn grow_respects_maximum() {
        let mut memory = one_page();
        assert_eq!(memory.grow(1), 1);
        assert_eq!(memory.size(), 2);
        assert_eq!(memory.grow(1), -1);
        assert_eq!(memory.size(), 2);
    }

    #[test]
    fn init_checks_segment_bounds() {
        let mut memory = one_page();
        let segment = [9u8];
        // Reading 1 byte starting at segment offset 1 is out of bounds.
        let err = memory.init(0, &segment, 1, 1).unwrap_err();
        assert_eq!(err.message, "out of bounds memory access");
        memory.init(0, &segment, 0, 1).unwrap();
        assert_eq!(memory.read(0, 1).unwrap(), &[9]);
    }
}
