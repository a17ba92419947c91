// WEX - wex-runtime
// Module: WEX Host Modules
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Host-provided extern modules.
//!
//! A host module maps export names to typed items. Host functions run in
//! the interpreter's thread, receive the popped operands, and may push
//! results or (in symbolic mode) manipulate the evaluator's path
//! condition — that is how the `symbolic.*` primitives are built.

use std::rc::Rc;

use wex_error::Result;
use wex_format::types::{FuncType, GlobalType, MemoryType, TableType};

use crate::eval::Evaluator;
use crate::values::Value;

/// A host callback: operands in, results out, with full access to the
/// evaluator.
pub type HostFunc<E> =
    Rc<dyn Fn(&mut E, &[<E as Evaluator>::Value]) -> Result<Vec<<E as Evaluator>::Value>>>;

/// A host extern module under construction.
pub struct HostModule<E: Evaluator> {
    /// The name modules import from.
    pub name: String,
    pub(crate) funcs: Vec<(String, FuncType, HostFunc<E>)>,
    pub(crate) globals: Vec<(String, GlobalType, Value)>,
    pub(crate) memories: Vec<(String, MemoryType)>,
    pub(crate) tables: Vec<(String, TableType)>,
}

impl<E: Evaluator> HostModule<E> {
    /// Creates an empty host module.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            funcs: Vec::new(),
            globals: Vec::new(),
            memories: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Exports a host function.
    pub fn add_func<F>(&mut self, name: &str, ty: FuncType, func: F)
    where
        F: Fn(&mut E, &[E::Value]) -> Result<Vec<E::Value>> + 'static,
    {
        self.funcs.push((name.to_string(), ty, Rc::new(func)));
    }

    /// Exports a constant global.
    pub fn add_global(&mut self, name: &str, ty: GlobalType, value: Value) {
        self.globals.push((name.to_string(), ty, value));
    }

    /// Exports a memory.
    pub fn add_memory(&mut self, name: &str, ty: MemoryType) {
        self.memories.push((name.to_string(), ty));
    }

    /// Exports a table.
    pub fn add_table(&mut self, name: &str, ty: TableType) {
        self.tables.push((name.to_string(), ty));
    }
}
