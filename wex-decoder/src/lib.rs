// WEX - wex-decoder
// Module: WEX Binary Decoder
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! WebAssembly binary module decoder.
//!
//! Decodes the canonical binary format into the [`wex_format::Module`]
//! AST: header check, the 12 section kinds in canonical order with custom
//! sections permitted between any two, length-framed section bodies that
//! must be consumed exactly, and the flat opcode dispatch table including
//! the two-byte `0xFC` opcode space.
//!
//! The decoder reports malformed input only. Scope rules, index bounds,
//! alignment, and typing are enforced downstream by `wex-rewrite` and
//! `wex-validate`.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod instructions;
mod module;
mod reader;

pub use module::decode_module;
pub use reader::Reader;
