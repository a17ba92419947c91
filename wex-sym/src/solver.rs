// WEX - wex-sym
// Module: WEX Solver Interface
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The abstract solver boundary.
//!
//! The SMT backend is an external collaborator: the engine only needs
//! satisfiability of a path condition, term simplification, and stable
//! named symbols. [`FoldSolver`] is the in-tree implementation used when
//! no external solver is wired up: it folds ground terms with the
//! concrete evaluator and reports `Sat` for anything containing a free
//! symbol. That over-approximates satisfiability, so exploration may
//! visit an infeasible path but never misses a feasible one.

use std::collections::HashMap;

use wex_error::Result;
use wex_format::types::ValueType;
use wex_runtime::{ConcreteEval, Evaluator, Value};

use crate::expr::{Expr, ExprKind, SymbolId};

/// A satisfiability verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    /// A model exists.
    Sat,
    /// No model exists.
    Unsat,
    /// The solver cannot decide.
    Unknown,
}

/// The abstract solver interface.
pub trait Solver {
    /// Decides satisfiability of a conjunction of i32 conditions (each
    /// condition holds when non-zero).
    fn check_sat(&mut self, assumptions: &[Expr]) -> Result<SatResult>;

    /// Simplifies a term, at least folding ground subterms.
    fn simplify(&self, expr: &Expr) -> Expr;

    /// Returns the symbol bound to `name`, creating it on first use.
    /// Repeated calls with one name yield the same symbol.
    fn symbol_of_name(&mut self, name: &str, ty: ValueType) -> Expr;
}

/// The built-in constant-folding solver.
#[derive(Debug, Clone, Default)]
pub struct FoldSolver {
    next_symbol: u32,
    symbols: HashMap<String, Expr>,
}

impl FoldSolver {
    /// Creates an empty solver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Solver for FoldSolver {
    fn check_sat(&mut self, assumptions: &[Expr]) -> Result<SatResult> {
        for assumption in assumptions {
            match self.simplify(assumption).as_const() {
                Some(Value::I32(0)) => return Ok(SatResult::Unsat),
                // A ground non-zero condition holds; a symbolic one is
                // assumed satisfiable.
                _ => {}
            }
        }
        Ok(SatResult::Sat)
    }

    fn simplify(&self, expr: &Expr) -> Expr {
        fold(expr)
    }

    fn symbol_of_name(&mut self, name: &str, ty: ValueType) -> Expr {
        if let Some(existing) = self.symbols.get(name) {
            return existing.clone();
        }
        let id = SymbolId(self.next_symbol);
        self.next_symbol += 1;
        let symbol = Expr::symbol(id, name, ty);
        self.symbols.insert(name.to_string(), symbol.clone());
        symbol
    }
}

/// Bottom-up constant folding. Operations that would trap on their
/// ground operands are left unfolded; the evaluator re-raises the trap
/// when the path actually executes them.
fn fold(expr: &Expr) -> Expr {
    let mut eval = ConcreteEval::new();
    match expr.kind() {
        ExprKind::Const(_) | ExprKind::Symbol(..) => expr.clone(),
        ExprKind::Unary(op, a) => {
            let a = fold(a);
            match a.as_const().and_then(|a| eval.unary(*op, a).ok()) {
                Some(value) => Expr::constant(value),
                None => Expr::unary(*op, expr.ty(), a),
            }
        }
        ExprKind::Binary(op, a, b) => {
            let a = fold(a);
            let b = fold(b);
            let folded = match (a.as_const(), b.as_const()) {
                (Some(a), Some(b)) => eval.binary(*op, a, b).ok(),
                _ => None,
            };
            match folded {
                Some(value) => Expr::constant(value),
                None => Expr::binary(*op, expr.ty(), a, b),
            }
        }
        ExprKind::Test(op, a) => {
            let a = fold(a);
            match a.as_const().and_then(|a| eval.test(*op, a).ok()) {
                Some(value) => Expr::constant(value),
                None => Expr::test(*op, a),
            }
        }
        ExprKind::Compare(op, a, b) => {
            let a = fold(a);
            let b = fold(b);
            let folded = match (a.as_const(), b.as_const()) {
                (Some(a), Some(b)) => eval.compare(*op, a, b).ok(),
                _ => None,
            };
            match folded {
                Some(value) => Expr::constant(value),
                None => Expr::compare(*op, a, b),
            }
        }
        ExprKind::Convert(op, a) => {
            let a = fold(a);
            match a.as_const().and_then(|a| eval.convert(*op, a).ok()) {
                Some(value) => Expr::constant(value),
                None => Expr::convert(*op, expr.ty(), a),
            }
        }
        ExprKind::Ite(cond, a, b) => {
            let cond = fold(cond);
            match cond.as_const() {
                Some(Value::I32(0)) => fold(b),
                Some(_) => fold(a),
                None => Expr::ite(cond, fold(a), fold(b)),
            }
        }
        ExprKind::Not(a) => {
            let a = fold(a);
            match a.as_const() {
                Some(Value::I32(0)) => Expr::constant(Value::I32(1)),
                Some(_) => Expr::constant(Value::I32(0)),
                None => a.negated(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wex_runtime::{BinaryOp, CompareOp};

    #[test]
    fn folds_ground_terms() {
        let solver = FoldSolver::new();
        let sum = Expr::binary(
            BinaryOp::I32Add,
            ValueType::I32,
            Expr::constant(Value::I32(2)),
            Expr::constant(Value::I32(40)),
        );
        assert_eq!(solver.simplify(&sum).as_const(), Some(Value::I32(42)));
    }

    #[test]
    fn leaves_trapping_ground_terms_unfolded() {
        let solver = FoldSolver::new();
        let division = Expr::binary(
            BinaryOp::I32DivS,
            ValueType::I32,
            Expr::constant(Value::I32(1)),
            Expr::constant(Value::I32(0)),
        );
        assert!(solver.simplify(&division).as_const().is_none());
    }

    #[test]
    fn ground_false_assumption_is_unsat() {
        let mut solver = FoldSolver::new();
        let falsehood = Expr::compare(
            CompareOp::I32Eq,
            Expr::constant(Value::I32(1)),
            Expr::constant(Value::I32(2)),
        );
        assert_eq!(solver.check_sat(&[falsehood]).unwrap(), SatResult::Unsat);
    }

    #[test]
    fn symbolic_assumptions_are_sat() {
        let mut solver = FoldSolver::new();
        let x = solver.symbol_of_name("x", ValueType::I32);
        let cond = Expr::compare(CompareOp::I32GtS, x.clone(), Expr::constant(Value::I32(0)));
        assert_eq!(
            solver.check_sat(&[cond.clone(), cond.negated()]).unwrap(),
            SatResult::Sat
        );
        // Names are stable: asking again yields the same symbol.
        let again = solver.symbol_of_name("x", ValueType::I32);
        assert_eq!(x.to_string(), again.to_string());
    }
}
