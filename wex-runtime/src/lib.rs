// WEX - wex-runtime
// Module: WEX Runtime
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The WEX execution core: store, linker, and interpreter.
//!
//! All cross-module references are integer address pairs into flat
//! registry vectors owned by the [`Store`]; instances hold per-module
//! address tables, so no reference cycles exist anywhere in the runtime.
//!
//! The interpreter is written once against the [`Evaluator`] trait, a
//! total value algebra covering arithmetic, comparison, conversion,
//! selection, and choice evaluation. [`ConcreteEval`] instantiates it
//! with bit-exact native values; the symbolic instantiation lives in
//! `wex-sym`. `Evaluator::eval_condition` is the single branching point:
//! `if`, `br_if`, `br_table`, and the symbolic trap guards are all
//! expressed through it.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod engine;
mod eval;
mod host;
mod interp;
mod linker;
pub mod math;
mod memory;
mod store;
mod table;
mod values;

pub use config::{ExecConfig, ExecStats};
pub use engine::Engine;
pub use eval::{
    BinaryOp, CompareOp, ConcreteEval, ConvertOp, Evaluator, TestOp, UnaryOp,
};
pub use host::{HostFunc, HostModule};
pub use linker::Registry;
pub use memory::{Memory, MAX_PAGES, PAGE_SIZE};
pub use store::{ExternVal, FuncInst, GlobalInst, Instance, Store};
pub use table::Table;
pub use values::{Trap, Value};
