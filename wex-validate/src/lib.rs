// WEX - wex-validate
// Module: WEX Type Checker
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Stack-polymorphic validation of function bodies.
//!
//! The operand stack is checked against each instruction's signature with
//! a three-valued type lattice: concrete value types extended with two
//! meta-types. `Any` stands for the unreachable stack and absorbs any
//! prefix of required types; `Something` is a placeholder for a type that
//! is not yet constrained (the result of an untyped `select` whose
//! operands are unconstrained).
//!
//! Structured control pushes a frame per `block`/`loop`/`if`. A frame's
//! branch target carries the block's result types, except for `loop`,
//! whose target carries its parameter types. After `br`, the remainder of
//! the straight-line block is polymorphic: the stack becomes `[Any]`.
//!
//! A pre-pass collects the declared function references (exports,
//! `ref.func` in initializers); `ref.func` in a body outside that set is
//! rejected with "undeclared function reference".
//!
//! Every rule is fail-fast and reports a stable message.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod typecheck;

pub use typecheck::{validate_module, Validated};
