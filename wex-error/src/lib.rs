// WEX - wex-error
// Module: WEX Error Handling
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! WEX error handling library
//!
//! This library provides the error handling system shared by every crate in
//! the WEX toolchain. Errors carry a category, a numeric code, and a stable
//! human-readable message.
//!
//! # Error Categories
//!
//! Errors are organized into categories, each with its own range of error
//! codes:
//!
//! - **Parse (1000-1099)** — malformed binary modules: truncated input,
//!   bad magic bytes, over-long LEB128 encodings, unknown opcodes.
//! - **Validation (2000-2099)** — modules that decode but violate scope or
//!   typing rules: unknown indices, duplicate names, non-constant
//!   initializers, stack-shape mismatches.
//! - **Trap (3000-3099)** — runtime traps defined by the WebAssembly
//!   specification, surfaced through [`ErrorCategory::Trap`].
//! - **Link (4000-4099)** — import resolution and instantiation failures.
//! - **Runtime (5000-5099)** — engine-level failures that are not traps:
//!   exhausted call stacks, exceeded step budgets, unsupported features.
//!
//! The message strings follow the vocabulary of the reference conformance
//! suite ("type mismatch", "unknown global", "integer representation too
//! long", ...) so that script assertions can match on them directly.
//!
//! # Usage
//!
//! ```
//! use wex_error::{codes, Error, ErrorCategory, Result};
//!
//! fn check(depth: usize) -> Result<()> {
//!     if depth > 1000 {
//!         return Err(Error::new(
//!             ErrorCategory::Runtime,
//!             codes::CALL_STACK_EXHAUSTED,
//!             "call stack exhausted",
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codes;
pub mod errors;

pub use errors::{Error, ErrorCategory};

/// A specialized `Result` type for WEX operations.
///
/// This type alias uses [`Error`] as the error type and is used by every
/// crate in the workspace.
pub type Result<T> = core::result::Result<T, Error>;
