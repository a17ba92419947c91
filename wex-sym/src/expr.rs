// WEX - wex-sym
// Module: WEX Symbolic Expressions
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The symbolic term algebra.
//!
//! Terms are reference-counted immutable trees tagged with their Wasm
//! numeric type. Rendering follows the wat mnemonics so path conditions
//! read like folded instructions: `(i32.gt_s $x (i32.const 0))`.

use std::fmt;
use std::rc::Rc;

use wex_format::types::ValueType;
use wex_runtime::{BinaryOp, CompareOp, ConvertOp, TestOp, UnaryOp, Value};

/// A unique symbol identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub u32);

/// A symbolic term.
#[derive(Debug, Clone)]
pub struct Expr {
    node: Rc<Node>,
}

#[derive(Debug)]
struct Node {
    ty: ValueType,
    kind: ExprKind,
}

/// The shape of a term.
#[derive(Debug)]
pub enum ExprKind {
    /// A concrete constant.
    Const(Value),
    /// A free symbol with its source name.
    Symbol(SymbolId, Box<str>),
    /// A unary operation.
    Unary(UnaryOp, Expr),
    /// A binary operation.
    Binary(BinaryOp, Expr, Expr),
    /// A zero test.
    Test(TestOp, Expr),
    /// A relational operation.
    Compare(CompareOp, Expr, Expr),
    /// A conversion.
    Convert(ConvertOp, Expr),
    /// `select`: `cond != 0 ? a : b`.
    Ite(Expr, Expr, Expr),
    /// Boolean negation of an i32 condition.
    Not(Expr),
}

impl Expr {
    fn new(ty: ValueType, kind: ExprKind) -> Self {
        Self {
            node: Rc::new(Node { ty, kind }),
        }
    }

    /// Wraps a concrete value.
    #[must_use]
    pub fn constant(value: Value) -> Self {
        Self::new(value.ty(), ExprKind::Const(value))
    }

    /// Creates a free symbol.
    #[must_use]
    pub fn symbol(id: SymbolId, name: &str, ty: ValueType) -> Self {
        Self::new(ty, ExprKind::Symbol(id, name.into()))
    }

    /// Builds a unary application.
    #[must_use]
    pub fn unary(op: UnaryOp, ty: ValueType, a: Expr) -> Self {
        Self::new(ty, ExprKind::Unary(op, a))
    }

    /// Builds a binary application.
    #[must_use]
    pub fn binary(op: BinaryOp, ty: ValueType, a: Expr, b: Expr) -> Self {
        Self::new(ty, ExprKind::Binary(op, a, b))
    }

    /// Builds a zero test.
    #[must_use]
    pub fn test(op: TestOp, a: Expr) -> Self {
        Self::new(ValueType::I32, ExprKind::Test(op, a))
    }

    /// Builds a comparison.
    #[must_use]
    pub fn compare(op: CompareOp, a: Expr, b: Expr) -> Self {
        Self::new(ValueType::I32, ExprKind::Compare(op, a, b))
    }

    /// Builds a conversion.
    #[must_use]
    pub fn convert(op: ConvertOp, ty: ValueType, a: Expr) -> Self {
        Self::new(ty, ExprKind::Convert(op, a))
    }

    /// Builds a selection.
    #[must_use]
    pub fn ite(cond: Expr, a: Expr, b: Expr) -> Self {
        let ty = a.ty();
        Self::new(ty, ExprKind::Ite(cond, a, b))
    }

    /// Negates an i32 condition, collapsing double negation.
    #[must_use]
    pub fn negated(&self) -> Self {
        if let ExprKind::Not(inner) = self.kind() {
            return inner.clone();
        }
        Self::new(ValueType::I32, ExprKind::Not(self.clone()))
    }

    /// The term's Wasm type.
    #[must_use]
    pub fn ty(&self) -> ValueType {
        self.node.ty
    }

    /// The term's shape.
    #[must_use]
    pub fn kind(&self) -> &ExprKind {
        &self.node.kind
    }

    /// The concrete value, when the term is a constant.
    #[must_use]
    pub fn as_const(&self) -> Option<Value> {
        match self.kind() {
            ExprKind::Const(value) => Some(*value),
            _ => None,
        }
    }

    /// Whether any free symbol occurs in the term.
    #[must_use]
    pub fn has_symbols(&self) -> bool {
        match self.kind() {
            ExprKind::Const(_) => false,
            ExprKind::Symbol(..) => true,
            ExprKind::Unary(_, a) | ExprKind::Test(_, a) | ExprKind::Convert(_, a)
            | ExprKind::Not(a) => a.has_symbols(),
            ExprKind::Binary(_, a, b) | ExprKind::Compare(_, a, b) => {
                a.has_symbols() || b.has_symbols()
            }
            ExprKind::Ite(c, a, b) => c.has_symbols() || a.has_symbols() || b.has_symbols(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Const(value) => match value {
                Value::I32(v) => write!(f, "(i32.const {v})"),
                Value::I64(v) => write!(f, "(i64.const {v})"),
                Value::F32(v) => write!(f, "(f32.const {v})"),
                Value::F64(v) => write!(f, "(f64.const {v})"),
                other => write!(f, "({other})"),
            },
            ExprKind::Symbol(_, name) => write!(f, "${name}"),
            ExprKind::Unary(op, a) => write!(f, "({} {a})", unary_name(*op)),
            ExprKind::Binary(op, a, b) => write!(f, "({} {a} {b})", binary_name(*op)),
            ExprKind::Test(op, a) => write!(f, "({} {a})", test_name(*op)),
            ExprKind::Compare(op, a, b) => write!(f, "({} {a} {b})", compare_name(*op)),
            ExprKind::Convert(op, a) => write!(f, "({} {a})", convert_name(*op)),
            ExprKind::Ite(c, a, b) => write!(f, "(select {a} {b} {c})"),
            ExprKind::Not(a) => write!(f, "(not {a})"),
        }
    }
}

fn unary_name(op: UnaryOp) -> &'static str {
    use UnaryOp as Op;
    match op {
        Op::I32Clz => "i32.clz",
        Op::I32Ctz => "i32.ctz",
        Op::I32Popcnt => "i32.popcnt",
        Op::I32Extend8S => "i32.extend8_s",
        Op::I32Extend16S => "i32.extend16_s",
        Op::I64Clz => "i64.clz",
        Op::I64Ctz => "i64.ctz",
        Op::I64Popcnt => "i64.popcnt",
        Op::I64Extend8S => "i64.extend8_s",
        Op::I64Extend16S => "i64.extend16_s",
        Op::I64Extend32S => "i64.extend32_s",
        Op::F32Abs => "f32.abs",
        Op::F32Neg => "f32.neg",
        Op::F32Ceil => "f32.ceil",
        Op::F32Floor => "f32.floor",
        Op::F32Trunc => "f32.trunc",
        Op::F32Nearest => "f32.nearest",
        Op::F32Sqrt => "f32.sqrt",
        Op::F64Abs => "f64.abs",
        Op::F64Neg => "f64.neg",
        Op::F64Ceil => "f64.ceil",
        Op::F64Floor => "f64.floor",
        Op::F64Trunc => "f64.trunc",
        Op::F64Nearest => "f64.nearest",
        Op::F64Sqrt => "f64.sqrt",
    }
}

#[allow(clippy::too_many_lines)]
fn binary_name(op: BinaryOp) -> &'static str {
    use BinaryOp as Op;
    match op {
        Op::I32Add => "i32.add",
        Op::I32Sub => "i32.sub",
        Op::I32Mul => "i32.mul",
        Op::I32DivS => "i32.div_s",
        Op::I32DivU => "i32.div_u",
        Op::I32RemS => "i32.rem_s",
        Op::I32RemU => "i32.rem_u",
        Op::I32And => "i32.and",
        Op::I32Or => "i32.or",
        Op::I32Xor => "i32.xor",
        Op::I32Shl => "i32.shl",
        Op::I32ShrS => "i32.shr_s",
        Op::I32ShrU => "i32.shr_u",
        Op::I32Rotl => "i32.rotl",
        Op::I32Rotr => "i32.rotr",
        Op::I64Add => "i64.add",
        Op::I64Sub => "i64.sub",
        Op::I64Mul => "i64.mul",
        Op::I64DivS => "i64.div_s",
        Op::I64DivU => "i64.div_u",
        Op::I64RemS => "i64.rem_s",
        Op::I64RemU => "i64.rem_u",
        Op::I64And => "i64.and",
        Op::I64Or => "i64.or",
        Op::I64Xor => "i64.xor",
        Op::I64Shl => "i64.shl",
        Op::I64ShrS => "i64.shr_s",
        Op::I64ShrU => "i64.shr_u",
        Op::I64Rotl => "i64.rotl",
        Op::I64Rotr => "i64.rotr",
        Op::F32Add => "f32.add",
        Op::F32Sub => "f32.sub",
        Op::F32Mul => "f32.mul",
        Op::F32Div => "f32.div",
        Op::F32Min => "f32.min",
        Op::F32Max => "f32.max",
        Op::F32Copysign => "f32.copysign",
        Op::F64Add => "f64.add",
        Op::F64Sub => "f64.sub",
        Op::F64Mul => "f64.mul",
        Op::F64Div => "f64.div",
        Op::F64Min => "f64.min",
        Op::F64Max => "f64.max",
        Op::F64Copysign => "f64.copysign",
    }
}

fn test_name(op: TestOp) -> &'static str {
    match op {
        TestOp::I32Eqz => "i32.eqz",
        TestOp::I64Eqz => "i64.eqz",
    }
}

fn compare_name(op: CompareOp) -> &'static str {
    use CompareOp as Op;
    match op {
        Op::I32Eq => "i32.eq",
        Op::I32Ne => "i32.ne",
        Op::I32LtS => "i32.lt_s",
        Op::I32LtU => "i32.lt_u",
        Op::I32GtS => "i32.gt_s",
        Op::I32GtU => "i32.gt_u",
        Op::I32LeS => "i32.le_s",
        Op::I32LeU => "i32.le_u",
        Op::I32GeS => "i32.ge_s",
        Op::I32GeU => "i32.ge_u",
        Op::I64Eq => "i64.eq",
        Op::I64Ne => "i64.ne",
        Op::I64LtS => "i64.lt_s",
        Op::I64LtU => "i64.lt_u",
        Op::I64GtS => "i64.gt_s",
        Op::I64GtU => "i64.gt_u",
        Op::I64LeS => "i64.le_s",
        Op::I64LeU => "i64.le_u",
        Op::I64GeS => "i64.ge_s",
        Op::I64GeU => "i64.ge_u",
        Op::F32Eq => "f32.eq",
        Op::F32Ne => "f32.ne",
        Op::F32Lt => "f32.lt",
        Op::F32Gt => "f32.gt",
        Op::F32Le => "f32.le",
        Op::F32Ge => "f32.ge",
        Op::F64Eq => "f64.eq",
        Op::F64Ne => "f64.ne",
        Op::F64Lt => "f64.lt",
        Op::F64Gt => "f64.gt",
        Op::F64Le => "f64.le",
        Op::F64Ge => "f64.ge",
    }
}

fn convert_name(op: ConvertOp) -> &'static str {
    use ConvertOp as Op;
    match op {
        Op::I32WrapI64 => "i32.wrap_i64",
        Op::I32TruncF32S => "i32.trunc_f32_s",
        Op::I32TruncF32U => "i32.trunc_f32_u",
        Op::I32TruncF64S => "i32.trunc_f64_s",
        Op::I32TruncF64U => "i32.trunc_f64_u",
        Op::I64ExtendI32S => "i64.extend_i32_s",
        Op::I64ExtendI32U => "i64.extend_i32_u",
        Op::I64TruncF32S => "i64.trunc_f32_s",
        Op::I64TruncF32U => "i64.trunc_f32_u",
        Op::I64TruncF64S => "i64.trunc_f64_s",
        Op::I64TruncF64U => "i64.trunc_f64_u",
        Op::F32ConvertI32S => "f32.convert_i32_s",
        Op::F32ConvertI32U => "f32.convert_i32_u",
        Op::F32ConvertI64S => "f32.convert_i64_s",
        Op::F32ConvertI64U => "f32.convert_i64_u",
        Op::F32DemoteF64 => "f32.demote_f64",
        Op::F64ConvertI32S => "f64.convert_i32_s",
        Op::F64ConvertI32U => "f64.convert_i32_u",
        Op::F64ConvertI64S => "f64.convert_i64_s",
        Op::F64ConvertI64U => "f64.convert_i64_u",
        Op::F64PromoteF32 => "f64.promote_f32",
        Op::I32ReinterpretF32 => "i32.reinterpret_f32",
        Op::I64ReinterpretF64 => "i64.reinterpret_f64",
        Op::F32ReinterpretI32 => "f32.reinterpret_i32",
        Op::F64ReinterpretI64 => "f64.reinterpret_i64",
        Op::I32TruncSatF32S => "i32.trunc_sat_f32_s",
        Op::I32TruncSatF32U => "i32.trunc_sat_f32_u",
        Op::I32TruncSatF64S => "i32.trunc_sat_f64_s",
        Op::I32TruncSatF64U => "i32.trunc_sat_f64_u",
        Op::I64TruncSatF32S => "i64.trunc_sat_f32_s",
        Op::I64TruncSatF32U => "i64.trunc_sat_f32_u",
        Op::I64TruncSatF64S => "i64.trunc_sat_f64_s",
        Op::I64TruncSatF64U => "i64.trunc_sat_f64_u",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_like_folded_wat() {
        let x = Expr::symbol(SymbolId(0), "x", ValueType::I32);
        let zero = Expr::constant(Value::I32(0));
        let cond = Expr::compare(CompareOp::I32GtS, x, zero);
        assert_eq!(cond.to_string(), "(i32.gt_s $x (i32.const 0))");
        assert_eq!(
            cond.negated().to_string(),
            "(not (i32.gt_s $x (i32.const 0)))"
        );
    }

    #[test]
    fn double_negation_collapses() {
        let x = Expr::symbol(SymbolId(0), "x", ValueType::I32);
        let negated_twice = x.negated().negated();
        assert!(matches!(negated_twice.kind(), ExprKind::Symbol(..)));
    }

    #[test]
    fn symbol_occurrence() {
        let x = Expr::symbol(SymbolId(0), "x", ValueType::I32);
        let one = Expr::constant(Value::I32(1));
        let sum = Expr::binary(
            BinaryOp::I32Add,
            ValueType::I32,
            x,
            one.clone(),
        );
        assert!(sum.has_symbols());
        assert!(!one.has_symbols());
    }
}
