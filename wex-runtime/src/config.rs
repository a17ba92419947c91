// WEX - wex-runtime
// Module: WEX Execution Configuration
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Execution configuration and statistics.
//!
//! Toggles travel in an explicit config value threaded through engine
//! construction; nothing here is process-global.

/// Configuration for one engine.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Emit per-instruction trace logging.
    pub debug: bool,
    /// Simplify symbolic expressions eagerly.
    pub optimize: bool,
    /// Collect and report execution statistics.
    pub profiling: bool,
    /// Maximum depth of the frame stack.
    pub max_call_depth: usize,
    /// Optional bound on executed instructions.
    pub max_steps: Option<u64>,
    /// Bound on explored symbolic paths.
    pub max_paths: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            debug: false,
            optimize: true,
            profiling: false,
            max_call_depth: 1024,
            max_steps: None,
            max_paths: 1024,
        }
    }
}

/// Execution statistics, updated by the interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecStats {
    /// Instructions executed.
    pub instructions: u64,
    /// Function calls performed (wasm and host).
    pub calls: u64,
    /// Deepest frame stack observed.
    pub peak_depth: usize,
}
