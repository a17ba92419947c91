// WEX - wex-runtime
// Module: WEX Store
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The store: flat registries owning every runtime object.
//!
//! Modules may import from each other freely; instead of boxed mutable
//! cells, every cross-module reference is an integer address into one of
//! the store's vectors, and an [`Instance`] maps a module's index spaces
//! to those addresses. Ownership sits solely with the store.

use std::collections::HashMap;
use std::rc::Rc;

use wex_error::{codes, Error, Result};
use wex_format::module::Function;
use wex_format::types::{FuncType, GlobalType};

use crate::eval::Evaluator;
use crate::host::HostFunc;
use crate::memory::Memory;
use crate::table::Table;
use crate::values::Value;

const ERR_ADDRESS: Error = Error::runtime(codes::INVALID_ARGUMENT, "invalid store address");

/// A store-level reference to an exported item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternVal {
    /// A function address.
    Func(u32),
    /// A table address.
    Table(u32),
    /// A memory address.
    Memory(u32),
    /// A global address.
    Global(u32),
}

/// A function instance: wasm code bound to its instance, or a host
/// callback.
pub enum FuncInst<E: Evaluator> {
    /// A function defined by a wasm module.
    Wasm {
        /// The function's signature.
        ty: FuncType,
        /// The owning instance's index.
        instance: usize,
        /// The function body. Shared so execution does not borrow the
        /// store.
        code: Rc<Function>,
    },
    /// A host-provided function.
    Host {
        /// The declared signature.
        ty: FuncType,
        /// The callback.
        func: HostFunc<E>,
    },
}

impl<E: Evaluator> FuncInst<E> {
    /// The function's signature.
    pub fn ty(&self) -> &FuncType {
        match self {
            Self::Wasm { ty, .. } | Self::Host { ty, .. } => ty,
        }
    }
}

impl<E: Evaluator> core::fmt::Debug for FuncInst<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Wasm { ty, instance, .. } => {
                write!(f, "wasm func {ty} of instance {instance}")
            }
            Self::Host { ty, .. } => write!(f, "host func {ty}"),
        }
    }
}

/// A global instance.
#[derive(Debug, Clone)]
pub struct GlobalInst<V> {
    /// The declared type.
    pub ty: GlobalType,
    /// The current value.
    pub value: V,
}

/// One instantiated module: address vectors from the module's index
/// spaces into the store, plus resolved exports.
#[derive(Debug, Clone, Default)]
pub struct Instance {
    /// Declared function types.
    pub types: Vec<FuncType>,
    /// Function addresses, imports first.
    pub funcs: Vec<u32>,
    /// Table addresses.
    pub tables: Vec<u32>,
    /// Memory addresses.
    pub memories: Vec<u32>,
    /// Global addresses.
    pub globals: Vec<u32>,
    /// Element-segment addresses.
    pub elems: Vec<u32>,
    /// Data-segment addresses.
    pub datas: Vec<u32>,
    /// Exports by name.
    pub exports: HashMap<String, ExternVal>,
}

/// The store owning all runtime objects.
pub struct Store<E: Evaluator> {
    /// Function instances.
    pub funcs: Vec<FuncInst<E>>,
    /// Table instances.
    pub tables: Vec<Table>,
    /// Memory instances.
    pub memories: Vec<Memory>,
    /// Global instances.
    pub globals: Vec<GlobalInst<E::Value>>,
    /// Element-segment instances. Dropped segments are emptied in place,
    /// so later `table.init` sees a zero-length segment.
    pub elems: Vec<Vec<Value>>,
    /// Data-segment instances; dropped segments are emptied in place.
    pub datas: Vec<Vec<u8>>,
    /// Instantiated modules.
    pub instances: Vec<Instance>,
}

impl<E: Evaluator> Default for Store<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Evaluator> Store<E> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            funcs: Vec::new(),
            tables: Vec::new(),
            memories: Vec::new(),
            globals: Vec::new(),
            elems: Vec::new(),
            datas: Vec::new(),
            instances: Vec::new(),
        }
    }

    /// Appends a function instance, returning its address.
    pub fn push_func(&mut self, func: FuncInst<E>) -> u32 {
        self.funcs.push(func);
        (self.funcs.len() - 1) as u32
    }

    /// The function at `addr`.
    pub fn func(&self, addr: u32) -> Result<&FuncInst<E>> {
        self.funcs.get(addr as usize).ok_or(ERR_ADDRESS)
    }

    /// The table at `addr`.
    pub fn table(&self, addr: u32) -> Result<&Table> {
        self.tables.get(addr as usize).ok_or(ERR_ADDRESS)
    }

    /// The table at `addr`, mutable.
    pub fn table_mut(&mut self, addr: u32) -> Result<&mut Table> {
        self.tables.get_mut(addr as usize).ok_or(ERR_ADDRESS)
    }

    /// The memory at `addr`.
    pub fn memory(&self, addr: u32) -> Result<&Memory> {
        self.memories.get(addr as usize).ok_or(ERR_ADDRESS)
    }

    /// The memory at `addr`, mutable.
    pub fn memory_mut(&mut self, addr: u32) -> Result<&mut Memory> {
        self.memories.get_mut(addr as usize).ok_or(ERR_ADDRESS)
    }

    /// The global at `addr`.
    pub fn global(&self, addr: u32) -> Result<&GlobalInst<E::Value>> {
        self.globals.get(addr as usize).ok_or(ERR_ADDRESS)
    }

    /// The global at `addr`, mutable.
    pub fn global_mut(&mut self, addr: u32) -> Result<&mut GlobalInst<E::Value>> {
        self.globals.get_mut(addr as usize).ok_or(ERR_ADDRESS)
    }

    /// The instance at `index`.
    pub fn instance(&self, index: usize) -> Result<&Instance> {
        self.instances.get(index).ok_or(ERR_ADDRESS)
    }
}
