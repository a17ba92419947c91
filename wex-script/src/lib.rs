// WEX - wex-script
// Module: WEX Script Runner
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Reference test-script execution.
//!
//! Runs `.wast` scripts through the full pipeline: the `wast` crate
//! parses the textual directives and assembles module binaries, the WEX
//! decoder/rewriter/validator check them, and the concrete engine
//! executes them. Supported directives: `module`, `register`, `invoke`,
//! `assert_return`, `assert_trap`, `assert_malformed`, `assert_invalid`,
//! `assert_unlinkable`, and `assert_exhaustion`; anything newer is
//! counted as skipped.
//!
//! Named modules stay addressable for later directives, and `register`
//! publishes an instance so subsequent modules can import from it. The
//! `spectest` host module is pre-installed.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod runner;
mod spectest;
mod values;

pub use runner::{prepare_module, ScriptRunner, ScriptStats};
pub use spectest::spectest_module;
