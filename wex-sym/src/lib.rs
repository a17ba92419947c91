// WEX - wex-sym
// Module: WEX Symbolic Execution
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Symbolic execution for the WEX interpreter.
//!
//! The crate provides the second instance of the runtime's value algebra:
//! values are terms ([`Expr`]) over constants, named symbols, and the
//! numeric operations; branch conditions are decided by consulting an
//! abstract [`Solver`].
//!
//! Path exploration realises the choice effect as a worklist of decision
//! scripts: each path re-executes the entry function from a fresh store,
//! following its script at every choice point; when a condition is
//! satisfiable both ways, the explorer continues down one branch and
//! enqueues the flipped script for the other. Re-execution gives each
//! path its own memory, so forked paths cannot observe each other's
//! writes.
//!
//! The SMT backend is an external collaborator behind the [`Solver`]
//! trait (`check_sat`, `simplify`, `symbol_of_name`). The in-tree
//! [`FoldSolver`] folds ground terms and reports `Sat` whenever a free
//! symbol occurs, which never prunes a feasible path.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod eval;
mod explore;
mod expr;
mod solver;

pub use eval::SymbolicEval;
pub use explore::{Explorer, PathOutcome, PathResult};
pub use expr::{Expr, ExprKind, SymbolId};
pub use solver::{FoldSolver, SatResult, Solver};
