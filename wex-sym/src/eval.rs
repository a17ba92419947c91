// WEX - wex-sym
// Module: WEX Symbolic Evaluator
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The symbolic instance of the runtime's value algebra.
//!
//! Values are terms; operations fold when every operand is ground and
//! build term nodes otherwise. `eval_condition` is where paths split: a
//! ground condition decides itself, a scripted decision is replayed, and
//! an open decision consults the solver on both polarities, records a
//! fork for the branch not taken, and extends the path condition with
//! the branch that is.
//!
//! Trap predicates follow the same route: a symbolic divisor is guarded
//! by a `divisor == 0` choice (and the signed overflow pair), so the
//! trapping and non-trapping outcomes become ordinary sibling paths.

use log::trace;

use wex_error::{codes, Error, Result};
use wex_format::types::ValueType;
use wex_runtime::{
    BinaryOp, CompareOp, ConcreteEval, ConvertOp, Evaluator, TestOp, UnaryOp, Value,
};

use crate::expr::Expr;
use crate::solver::{SatResult, Solver};

const ERR_INFEASIBLE: Error = Error::runtime(
    codes::ASSUMPTION_UNSATISFIABLE,
    "assumption unsatisfiable",
);
const ERR_ASSERTION: Error =
    Error::runtime(codes::ASSERTION_VIOLATION, "assertion violation");

/// The symbolic evaluator: a solver handle, the decision script being
/// replayed, and the accumulated path condition.
pub struct SymbolicEval<S: Solver> {
    /// The solver deciding branch feasibility.
    pub solver: S,
    script: Vec<bool>,
    cursor: usize,
    decisions: Vec<bool>,
    path: Vec<(Expr, bool)>,
    forks: Vec<Vec<bool>>,
    optimize: bool,
}

impl<S: Solver> SymbolicEval<S> {
    /// Creates an evaluator that follows `script` at its first choice
    /// points and consults the solver beyond it.
    pub fn new(solver: S, script: Vec<bool>, optimize: bool) -> Self {
        Self {
            solver,
            script,
            cursor: 0,
            decisions: Vec::new(),
            path: Vec::new(),
            forks: Vec::new(),
            optimize,
        }
    }

    /// Creates a fresh symbol (or returns the existing one of that name).
    pub fn fresh_symbol(&mut self, name: &str, ty: ValueType) -> Expr {
        self.solver.symbol_of_name(name, ty)
    }

    /// Conjoins an assumption onto the path condition, failing the path
    /// when it becomes unsatisfiable.
    pub fn assume(&mut self, cond: &Expr) -> Result<()> {
        let folded = self.solver.simplify(cond);
        if let Some(value) = folded.as_const() {
            return if value.as_i32()? == 0 {
                Err(ERR_INFEASIBLE)
            } else {
                Ok(())
            };
        }
        self.path.push((folded, true));
        let condition = self.path_condition();
        if self.solver.check_sat(&condition)? == SatResult::Unsat {
            return Err(ERR_INFEASIBLE);
        }
        Ok(())
    }

    /// Checks an assertion: fails when its negation is satisfiable under
    /// the current path condition.
    pub fn assert(&mut self, cond: &Expr) -> Result<()> {
        let folded = self.solver.simplify(cond);
        if let Some(value) = folded.as_const() {
            return if value.as_i32()? == 0 {
                Err(ERR_ASSERTION)
            } else {
                Ok(())
            };
        }
        let mut condition = self.path_condition();
        condition.push(folded.negated());
        match self.solver.check_sat(&condition)? {
            SatResult::Unsat => Ok(()),
            SatResult::Sat | SatResult::Unknown => Err(ERR_ASSERTION),
        }
    }

    /// The path condition: one conjunct per decided choice, negated for
    /// false branches.
    #[must_use]
    pub fn path_condition(&self) -> Vec<Expr> {
        self.path
            .iter()
            .map(|(cond, taken)| if *taken { cond.clone() } else { cond.negated() })
            .collect()
    }

    /// Drains the decision scripts of forks discovered during this run.
    pub fn take_forks(&mut self) -> Vec<Vec<bool>> {
        std::mem::take(&mut self.forks)
    }

    /// Decides a symbolic condition, recording the decision.
    fn decide(&mut self, cond: Expr) -> Result<bool> {
        let taken = if self.cursor < self.script.len() {
            self.script[self.cursor]
        } else {
            let mut assuming_true = self.path_condition();
            assuming_true.push(cond.clone());
            let mut assuming_false = self.path_condition();
            assuming_false.push(cond.negated());
            let sat_true = self.solver.check_sat(&assuming_true)? != SatResult::Unsat;
            let sat_false = self.solver.check_sat(&assuming_false)? != SatResult::Unsat;
            match (sat_true, sat_false) {
                (true, true) => {
                    // Continue down the true branch; the false branch
                    // becomes pending work.
                    let mut flipped = self.decisions.clone();
                    flipped.push(false);
                    self.forks.push(flipped);
                    true
                }
                (true, false) => true,
                (false, true) => false,
                (false, false) => return Err(ERR_INFEASIBLE),
            }
        };
        trace!("choice {} -> {taken}: {cond}", self.decisions.len());
        self.cursor += 1;
        self.decisions.push(taken);
        self.path.push((cond, taken));
        Ok(taken)
    }

    /// Guards a trap predicate: a choice on `cond` where the true branch
    /// raises `trap` and the false branch continues with `cond` refuted
    /// in the path condition.
    fn guard(&mut self, cond: Expr, trap: Error) -> Result<()> {
        let folded = self.solver.simplify(&cond);
        match folded.as_const() {
            Some(value) => {
                if value.as_i32()? != 0 {
                    Err(trap)
                } else {
                    Ok(())
                }
            }
            None => {
                if self.decide(folded)? {
                    Err(trap)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// The zero-divisor (and signed-overflow) guards for division and
    /// remainder; non-trapping operations have no guard.
    fn guard_binary(&mut self, op: BinaryOp, a: &Expr, b: &Expr) -> Result<()> {
        use wex_runtime::Trap;
        if !op.can_trap() {
            return Ok(());
        }
        let is_64 = matches!(
            op,
            BinaryOp::I64DivS | BinaryOp::I64DivU | BinaryOp::I64RemS | BinaryOp::I64RemU
        );
        let (eq, zero, min, minus_one) = if is_64 {
            (
                CompareOp::I64Eq,
                Value::I64(0),
                Value::I64(i64::MIN),
                Value::I64(-1),
            )
        } else {
            (
                CompareOp::I32Eq,
                Value::I32(0),
                Value::I32(i32::MIN),
                Value::I32(-1),
            )
        };
        let zero_divisor = Expr::compare(eq, b.clone(), Expr::constant(zero));
        self.guard(zero_divisor, Trap::IntegerDivideByZero.into())?;
        if matches!(op, BinaryOp::I32DivS | BinaryOp::I64DivS) {
            let overflow = Expr::binary(
                BinaryOp::I32And,
                ValueType::I32,
                Expr::compare(eq, a.clone(), Expr::constant(min)),
                Expr::compare(eq, b.clone(), Expr::constant(minus_one)),
            );
            self.guard(overflow, Trap::IntegerOverflow.into())?;
        }
        Ok(())
    }
}

impl<S: Solver> Evaluator for SymbolicEval<S> {
    type Value = Expr;

    fn constant(&mut self, value: Value) -> Expr {
        Expr::constant(value)
    }

    fn concrete(&self, value: &Expr) -> Option<Value> {
        if self.optimize {
            self.solver.simplify(value).as_const()
        } else {
            value.as_const()
        }
    }

    fn unary(&mut self, op: UnaryOp, a: Expr) -> Result<Expr> {
        if let Some(value) = a.as_const() {
            return Ok(Expr::constant(ConcreteEval::new().unary(op, value)?));
        }
        Ok(Expr::unary(op, a.ty(), a))
    }

    fn binary(&mut self, op: BinaryOp, a: Expr, b: Expr) -> Result<Expr> {
        if let (Some(ca), Some(cb)) = (a.as_const(), b.as_const()) {
            return Ok(Expr::constant(ConcreteEval::new().binary(op, ca, cb)?));
        }
        self.guard_binary(op, &a, &b)?;
        let ty = a.ty();
        Ok(Expr::binary(op, ty, a, b))
    }

    fn test(&mut self, op: TestOp, a: Expr) -> Result<Expr> {
        if let Some(value) = a.as_const() {
            return Ok(Expr::constant(ConcreteEval::new().test(op, value)?));
        }
        Ok(Expr::test(op, a))
    }

    fn compare(&mut self, op: CompareOp, a: Expr, b: Expr) -> Result<Expr> {
        if let (Some(ca), Some(cb)) = (a.as_const(), b.as_const()) {
            return Ok(Expr::constant(ConcreteEval::new().compare(op, ca, cb)?));
        }
        Ok(Expr::compare(op, a, b))
    }

    fn convert(&mut self, op: ConvertOp, a: Expr) -> Result<Expr> {
        if let Some(value) = a.as_const() {
            return Ok(Expr::constant(ConcreteEval::new().convert(op, value)?));
        }
        let ty = convert_result_type(op);
        Ok(Expr::convert(op, ty, a))
    }

    fn select(&mut self, cond: Expr, a: Expr, b: Expr) -> Result<Expr> {
        match self.solver.simplify(&cond).as_const() {
            Some(value) => Ok(if value.as_i32()? != 0 { a } else { b }),
            None => Ok(Expr::ite(cond, a, b)),
        }
    }

    fn eval_condition(&mut self, cond: &Expr) -> Result<bool> {
        let folded = self.solver.simplify(cond);
        if let Some(value) = folded.as_const() {
            return Ok(value.as_i32()? != 0);
        }
        self.decide(folded)
    }

    fn choose_index(&mut self, index: &Expr, count: u32) -> Result<u32> {
        let folded = self.solver.simplify(index);
        if let Some(value) = folded.as_const() {
            let value = value.as_u32()?;
            return Ok(if value < count - 1 { value } else { count - 1 });
        }
        // One choice per non-default case, asked in order; the default
        // is what remains when all of them are refuted.
        for case in 0..count - 1 {
            let this_case = Expr::compare(
                CompareOp::I32Eq,
                folded.clone(),
                Expr::constant(Value::I32(case as i32)),
            );
            if self.eval_condition(&this_case)? {
                return Ok(case);
            }
        }
        Ok(count - 1)
    }
}

fn convert_result_type(op: ConvertOp) -> ValueType {
    use ConvertOp as Op;
    match op {
        Op::I32WrapI64
        | Op::I32TruncF32S
        | Op::I32TruncF32U
        | Op::I32TruncF64S
        | Op::I32TruncF64U
        | Op::I32ReinterpretF32
        | Op::I32TruncSatF32S
        | Op::I32TruncSatF32U
        | Op::I32TruncSatF64S
        | Op::I32TruncSatF64U => ValueType::I32,
        Op::I64ExtendI32S
        | Op::I64ExtendI32U
        | Op::I64TruncF32S
        | Op::I64TruncF32U
        | Op::I64TruncF64S
        | Op::I64TruncF64U
        | Op::I64ReinterpretF64
        | Op::I64TruncSatF32S
        | Op::I64TruncSatF32U
        | Op::I64TruncSatF64S
        | Op::I64TruncSatF64U => ValueType::I64,
        Op::F32ConvertI32S
        | Op::F32ConvertI32U
        | Op::F32ConvertI64S
        | Op::F32ConvertI64U
        | Op::F32DemoteF64
        | Op::F32ReinterpretI32 => ValueType::F32,
        Op::F64ConvertI32S
        | Op::F64ConvertI32U
        | Op::F64ConvertI64S
        | Op::F64ConvertI64U
        | Op::F64PromoteF32
        | Op::F64ReinterpretI64 => ValueType::F64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::FoldSolver;

    fn eval() -> SymbolicEval<FoldSolver> {
        SymbolicEval::new(FoldSolver::new(), Vec::new(), true)
    }

    #[test]
    fn ground_operations_fold() {
        let mut eval = eval();
        let two = eval.constant(Value::I32(2));
        let forty = eval.constant(Value::I32(40));
        let sum = eval.binary(BinaryOp::I32Add, two, forty).unwrap();
        assert_eq!(sum.as_const(), Some(Value::I32(42)));
    }

    #[test]
    fn open_condition_forks_and_records_path() {
        let mut eval = eval();
        let x = eval.fresh_symbol("x", ValueType::I32);
        let zero = eval.constant(Value::I32(0));
        let cond = eval.compare(CompareOp::I32GtS, x, zero).unwrap();
        // The solver allows both branches; the true branch is taken and
        // the flipped script queued.
        assert!(eval.eval_condition(&cond).unwrap());
        assert_eq!(eval.take_forks(), vec![vec![false]]);
        let condition = eval.path_condition();
        assert_eq!(condition.len(), 1);
        assert_eq!(condition[0].to_string(), "(i32.gt_s $x (i32.const 0))");
    }

    #[test]
    fn scripted_decisions_are_replayed() {
        let mut eval = SymbolicEval::new(FoldSolver::new(), vec![false], true);
        let x = eval.fresh_symbol("x", ValueType::I32);
        let zero = eval.constant(Value::I32(0));
        let cond = eval.compare(CompareOp::I32GtS, x, zero).unwrap();
        assert!(!eval.eval_condition(&cond).unwrap());
        assert!(eval.take_forks().is_empty());
        assert_eq!(
            eval.path_condition()[0].to_string(),
            "(not (i32.gt_s $x (i32.const 0)))"
        );
    }

    #[test]
    fn symbolic_divisor_is_guarded() {
        let mut eval = eval();
        let x = eval.fresh_symbol("x", ValueType::I32);
        let one = eval.constant(Value::I32(1));
        // Dividing by a symbol first explores the trapping branch.
        let err = eval.binary(BinaryOp::I32DivS, one, x).unwrap_err();
        assert_eq!(err.message, "integer divide by zero");
        assert_eq!(eval.take_forks(), vec![vec![false]]);
    }

    #[test]
    fn assume_and_assert() {
        let mut eval = eval();
        let x = eval.fresh_symbol("x", ValueType::I32);
        let zero = eval.constant(Value::I32(0));
        let positive = eval.compare(CompareOp::I32GtS, x, zero).unwrap();
        eval.assume(&positive).unwrap();
        // The fold solver cannot refute the negation, so the assertion
        // is reported as violable.
        let err = eval.assert(&positive).unwrap_err();
        assert_eq!(err.message, "assertion violation");
    }
}
