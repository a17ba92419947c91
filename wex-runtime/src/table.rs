// WEX - wex-runtime
// Module: WEX Tables
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! WebAssembly table instances.
//!
//! A table entry is either null or a reference of the table's declared
//! reference type. Out-of-range accesses trap with "out of bounds table
//! access".

use wex_error::Result;
use wex_format::types::TableType;

use crate::values::{Trap, Value};

/// A table instance.
#[derive(Debug, Clone)]
pub struct Table {
    ty: TableType,
    elements: Vec<Value>,
}

impl Table {
    /// Allocates a table of its type's minimum size, filled with nulls.
    #[must_use]
    pub fn new(ty: TableType) -> Self {
        Self {
            ty,
            elements: vec![Value::null(ty.element); ty.limits.min as usize],
        }
    }

    /// The table's declared type.
    #[must_use]
    pub const fn ty(&self) -> TableType {
        self.ty
    }

    /// Current size in entries.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    /// Reads the entry at `index`.
    pub fn get(&self, index: u32) -> Result<Value> {
        self.elements
            .get(index as usize)
            .copied()
            .ok_or_else(|| Trap::OutOfBoundsTableAccess.into())
    }

    /// Writes the entry at `index`.
    pub fn set(&mut self, index: u32, value: Value) -> Result<()> {
        let slot = self
            .elements
            .get_mut(index as usize)
            .ok_or(Trap::OutOfBoundsTableAccess)?;
        *slot = value;
        Ok(())
    }

    /// Grows the table by `delta` null-initialised entries.
    ///
    /// Returns the previous size, or -1 when the maximum would be
    /// exceeded.
    pub fn grow(&mut self, delta: u32, init: Value) -> i32 {
        let old = self.size();
        let Some(new) = old.checked_add(delta) else {
            return -1;
        };
        if self.ty.limits.max.is_some_and(|max| new > max) {
            return -1;
        }
        self.elements.resize(new as usize, init);
        old as i32
    }

    /// `table.fill`: writes `len` copies of `value` starting at `dst`.
    pub fn fill(&mut self, dst: u32, value: Value, len: u32) -> Result<()> {
        let (start, end) = self.range(dst, len)?;
        self.elements[start..end].fill(value);
        Ok(())
    }

    /// Writes a slice of references starting at `dst`, trapping if the
    /// write would overflow the table.
    pub fn init(&mut self, dst: u32, refs: &[Value], src: u32, len: u32) -> Result<()> {
        let src_start = src as usize;
        let src_end = src_start
            .checked_add(len as usize)
            .ok_or(Trap::OutOfBoundsTableAccess)?;
        let source = refs
            .get(src_start..src_end)
            .ok_or(Trap::OutOfBoundsTableAccess)?;
        let (dst_start, dst_end) = self.range(dst, len)?;
        self.elements[dst_start..dst_end].copy_from_slice(source);
        Ok(())
    }

    fn range(&self, start: u32, len: u32) -> Result<(usize, usize)> {
        let start = start as usize;
        let end = start
            .checked_add(len as usize)
            .ok_or(Trap::OutOfBoundsTableAccess)?;
        if end > self.elements.len() {
            return Err(Trap::OutOfBoundsTableAccess.into());
        }
        Ok((start, end))
    }
}

/// `table.copy` between two tables (or within one), overlap-safe.
pub fn copy_between(
    tables: &mut [Table],
    dst_table: u32,
    src_table: u32,
    dst: u32,
    src: u32,
    len: u32,
) -> Result<()> {
    if dst_table == src_table {
        let table = tables
            .get_mut(dst_table as usize)
            .ok_or(Trap::OutOfBoundsTableAccess)?;
        let (src_start, src_end) = table.range(src, len)?;
        table.range(dst, len)?;
        let snapshot: Vec<Value> = table.elements[src_start..src_end].to_vec();
        table.init(dst, &snapshot, 0, len)
    } else {
        let snapshot: Vec<Value> = {
            let table = tables
                .get(src_table as usize)
                .ok_or(Trap::OutOfBoundsTableAccess)?;
            let (start, end) = table.range(src, len)?;
            table.elements[start..end].to_vec()
        };
        let table = tables
            .get_mut(dst_table as usize)
            .ok_or(Trap::OutOfBoundsTableAccess)?;
        table.init(dst, &snapshot, 0, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wex_format::types::{Limits, RefType};

    fn small_table() -> Table {
        Table::new(TableType {
            element: RefType::Func,
            limits: Limits {
                min: 2,
                max: Some(4),
            },
        })
    }

    #[test]
    fn new_tables_are_null() {
        let table = small_table();
        assert_eq!(table.get(0).unwrap(), Value::FuncRef(None));
        assert!(table.get(0).unwrap().is_null_ref());
    }

    #[test]
    fn out_of_range_access_traps() {
        let mut table = small_table();
        assert_eq!(
            table.get(2).unwrap_err().message,
            "out of bounds table access"
        );
        assert!(table.set(2, Value::FuncRef(Some(0))).is_err());
    }

    #[test]
    fn grow_respects_maximum() {
        let mut table = small_table();
        assert_eq!(table.grow(2, Value::FuncRef(None)), 2);
        assert_eq!(table.grow(1, Value::FuncRef(None)), -1);
    }
}
