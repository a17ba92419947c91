// WEX - wex-format
// Module: WEX Module Data Model
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! WebAssembly module data model for the WEX toolchain.
//!
//! This crate holds the types every pipeline stage exchanges:
//!
//! - Value, function, limit, table, memory, and global types ([`types`]).
//! - The instruction enumeration ([`instructions`]).
//! - The module AST as produced by the decoder or a textual front-end and
//!   consumed by the rewriter ([`module`]).
//! - Binary-format constants, the LEB128 integer codec, and the module
//!   encoder ([`binary`]).
//!
//! Modules are built in stages and never mutated after rewriting: each
//! stage consumes its input by value or reference and produces a fresh
//! result.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod binary;
pub mod instructions;
pub mod module;
pub mod types;

pub use instructions::{Instruction, Label, MemArg};
pub use module::{
    CustomSection, DataMode, DataSegment, ElementMode, ElementSegment, Export, ExternKind,
    Function, Global, Import, ImportDesc, Module, TypeDef,
};
pub use types::{
    BlockType, FuncType, GlobalType, InlineSignature, ItemRef, Limits, MemoryType, RefType,
    TableType, ValueType,
};
