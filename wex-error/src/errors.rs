// WEX - wex-error
// Module: WEX Error Types
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The [`Error`] type and its categories.

use core::fmt;

use crate::codes;

/// `Error` categories for WEX operations.
///
/// The category names the pipeline stage (or failure channel) an error
/// belongs to. Static errors and traps are disjoint channels: a trap never
/// carries a non-[`ErrorCategory::Trap`] category and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCategory {
    /// Malformed binary input, detected by the decoder.
    Parse = 1,
    /// Scope or typing violations, detected by the rewriter or validator.
    Validation = 2,
    /// WebAssembly traps raised during execution.
    Trap = 3,
    /// Import resolution and instantiation failures.
    Link = 4,
    /// Engine-level failures that are not traps.
    Runtime = 5,
}

/// WEX `Error` type.
///
/// A small `Copy` value carrying a category, a numeric code from
/// [`crate::codes`], and a stable message. The message strings follow the
/// reference-suite vocabulary and are matched verbatim by script
/// assertions, so they must never be reworded casually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    /// `Error` category.
    pub category: ErrorCategory,
    /// `Error` code.
    pub code: u16,
    /// `Error` message.
    pub message: &'static str,
}

impl Error {
    /// Creates a new error from a category, code, and message.
    #[must_use]
    pub const fn new(category: ErrorCategory, code: u16, message: &'static str) -> Self {
        Self {
            category,
            code,
            message,
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub const fn parse(code: u16, message: &'static str) -> Self {
        Self::new(ErrorCategory::Parse, code, message)
    }

    /// Creates a validation error.
    #[must_use]
    pub const fn validation(code: u16, message: &'static str) -> Self {
        Self::new(ErrorCategory::Validation, code, message)
    }

    /// Creates a link error.
    #[must_use]
    pub const fn link(code: u16, message: &'static str) -> Self {
        Self::new(ErrorCategory::Link, code, message)
    }

    /// Creates a runtime (non-trap) error.
    #[must_use]
    pub const fn runtime(code: u16, message: &'static str) -> Self {
        Self::new(ErrorCategory::Runtime, code, message)
    }

    /// Creates a "type mismatch" validation error.
    #[must_use]
    pub const fn type_mismatch() -> Self {
        Self::validation(codes::TYPE_MISMATCH, "type mismatch")
    }

    /// Creates a "not supported" runtime error with a feature message.
    #[must_use]
    pub const fn not_supported(message: &'static str) -> Self {
        Self::runtime(codes::NOT_SUPPORTED, message)
    }

    /// Returns `true` when this error is a WebAssembly trap.
    #[must_use]
    pub const fn is_trap(&self) -> bool {
        matches!(self.category, ErrorCategory::Trap)
    }

    /// Returns `true` when this error is a static (parse or validation)
    /// error.
    #[must_use]
    pub const fn is_static(&self) -> bool {
        matches!(
            self.category,
            ErrorCategory::Parse | ErrorCategory::Validation
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}][E{:04}] {}", self.category, self.code, self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_disjoint_channels() {
        let trap = Error::new(
            ErrorCategory::Trap,
            codes::TRAP_UNREACHABLE,
            "unreachable",
        );
        assert!(trap.is_trap());
        assert!(!trap.is_static());

        let parse = Error::parse(codes::UNEXPECTED_END, "unexpected end");
        assert!(parse.is_static());
        assert!(!parse.is_trap());
    }

    #[test]
    fn display_includes_category_and_code() {
        let err = Error::type_mismatch();
        let shown = err.to_string();
        assert!(shown.contains("Validation"));
        assert!(shown.contains("type mismatch"));
    }
}
