// WEX - wex-validate
// Module: WEX Stack Discipline
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The stack-discipline checker.

use std::collections::BTreeSet;

use log::trace;

use wex_error::{codes, Error, Result};
use wex_format::module::{ExternKind, Module};
use wex_format::types::{BlockType, RefType, ValueType};
use wex_format::Instruction;
use wex_rewrite::ModuleIndex;

const ERR_TYPE_MISMATCH: Error = Error::validation(codes::TYPE_MISMATCH, "type mismatch");
const ERR_UNDECLARED_REF: Error = Error::validation(
    codes::UNDECLARED_FUNCTION_REFERENCE,
    "undeclared function reference",
);
const ERR_RESULT_ARITY: Error = Error::validation(codes::TYPE_MISMATCH, "invalid result arity");

/// An operand-stack slot: a concrete value type or one of the two
/// meta-types of the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackType {
    /// A known value type.
    Val(ValueType),
    /// The unreachable stack: consumes and produces anything.
    Any,
    /// A type that exists but is not yet constrained.
    Something,
}

/// Lattice matching: either side `Any` or `Something`, or equal types.
fn match_types(required: ValueType, got: StackType) -> bool {
    match got {
        StackType::Any | StackType::Something => true,
        StackType::Val(ty) => ty == required,
    }
}

/// Matches a stack against required result types, top-down, with `Any`
/// absorption on both sides: an `Any` in the stack matches any remaining
/// required prefix; required types are themselves concrete here, so the
/// backtracking degenerates to a single right-to-left walk.
fn match_stack(stack: &[StackType], required: &[ValueType]) -> bool {
    let mut height = stack.len();
    for req in required.iter().rev() {
        if height == 0 {
            return false;
        }
        let got = stack[height - 1];
        if got == StackType::Any {
            return true;
        }
        if !match_types(*req, got) {
            return false;
        }
        height -= 1;
    }
    height == 0 || (height == 1 && stack[0] == StackType::Any)
}

/// The outcome of validating a module: the declared-reference set.
#[derive(Debug, Clone, Default)]
pub struct Validated {
    /// Function indices that may be the operand of `ref.func`.
    pub declared_funcs: BTreeSet<u32>,
}

/// Validates every function body of a rewritten module.
///
/// The module must already have passed the rewriter: all references are
/// dense in-bounds indices and all block types are normalised.
pub fn validate_module(module: &Module, index: &ModuleIndex) -> Result<Validated> {
    let declared = collect_declared_refs(module);

    let import_funcs = index.funcs.import_count();
    for (i, func) in module.funcs.iter().enumerate() {
        let ty = index.func_type(import_funcs + i as u32)?.clone();
        trace!("typechecking func {} : {}", i, ty);

        let mut locals: Vec<ValueType> = ty.params.clone();
        locals.extend(func.locals.iter().map(|l| l.ty));

        let mut checker = FuncChecker {
            index,
            declared: &declared,
            locals,
            ret: ty.results.clone(),
        };
        checker.check_func(&func.body)?;
    }

    Ok(Validated {
        declared_funcs: declared,
    })
}

/// The declared-reference pre-pass: function indices reachable via
/// `ref.func` in initializers or via exports.
fn collect_declared_refs(module: &Module) -> BTreeSet<u32> {
    let mut declared = BTreeSet::new();
    for export in &module.exports {
        if export.kind == ExternKind::Func {
            declared.insert(export.item.index());
        }
    }
    for global in &module.globals {
        collect_expr_refs(&global.init, &mut declared);
    }
    for elem in &module.elems {
        for item in &elem.items {
            collect_expr_refs(item, &mut declared);
        }
    }
    declared
}

fn collect_expr_refs(expr: &[Instruction], declared: &mut BTreeSet<u32>) {
    for instr in expr {
        if let Instruction::RefFunc(func) = instr {
            declared.insert(func.index());
        }
    }
}

struct FuncChecker<'a> {
    index: &'a ModuleIndex,
    declared: &'a BTreeSet<u32>,
    /// Parameters and locals in their shared index space.
    locals: Vec<ValueType>,
    /// The function's result types.
    ret: Vec<ValueType>,
}

/// One control frame: the branch-target types of the label plus the
/// types the block must leave on its stack.
struct Frame {
    target: Vec<ValueType>,
}

impl FuncChecker<'_> {
    fn check_func(&mut self, body: &[Instruction]) -> Result<()> {
        let mut labels = vec![Frame {
            target: self.ret.clone(),
        }];
        let mut stack = Vec::new();
        let ret = self.ret.clone();
        self.check_body(body, &mut stack, &mut labels)?;
        if !match_stack(&stack, &ret) {
            return Err(ERR_TYPE_MISMATCH);
        }
        Ok(())
    }

    fn check_body(
        &mut self,
        body: &[Instruction],
        stack: &mut Vec<StackType>,
        labels: &mut Vec<Frame>,
    ) -> Result<()> {
        for instr in body {
            self.check_instr(instr, stack, labels)?;
        }
        Ok(())
    }

    /// Runs a nested block: pops its parameters, checks the body against a
    /// fresh stack, requires the body to end with the block's results, and
    /// pushes those results.
    fn check_block(
        &mut self,
        body: &[Instruction],
        params: &[ValueType],
        results: &[ValueType],
        target: &[ValueType],
        stack: &mut Vec<StackType>,
        labels: &mut Vec<Frame>,
    ) -> Result<()> {
        pop_vals(stack, params)?;
        let mut inner: Vec<StackType> = params.iter().map(|ty| StackType::Val(*ty)).collect();
        labels.push(Frame {
            target: target.to_vec(),
        });
        self.check_body(body, &mut inner, labels)?;
        labels.pop();
        if !match_stack(&inner, results) {
            return Err(ERR_TYPE_MISMATCH);
        }
        for ty in results {
            stack.push(StackType::Val(*ty));
        }
        Ok(())
    }

    fn block_signature(&self, bt: &BlockType) -> Result<(Vec<ValueType>, Vec<ValueType>)> {
        match bt {
            BlockType::Empty => Ok((Vec::new(), Vec::new())),
            BlockType::Value(ty) => Ok((Vec::new(), vec![*ty])),
            BlockType::Type(item) => {
                let ty = self.index.types.get(item.index())?.ty();
                Ok((ty.params.clone(), ty.results.clone()))
            }
            BlockType::Inline(sig) => {
                debug_assert!(false, "inline block type after rewrite");
                Ok((sig.params.clone(), sig.results.clone()))
            }
        }
    }

    fn local(&self, index: u32) -> Result<ValueType> {
        self.locals
            .get(index as usize)
            .copied()
            .ok_or(ERR_TYPE_MISMATCH)
    }

    #[allow(clippy::too_many_lines)]
    fn check_instr(
        &mut self,
        instr: &Instruction,
        stack: &mut Vec<StackType>,
        labels: &mut Vec<Frame>,
    ) -> Result<()> {
        use Instruction as I;
        use ValueType::{FuncRef, F32, F64, I32, I64};
        match instr {
            I::Unreachable => set_unreachable(stack),
            I::Nop => {}

            I::Block(_, bt, body) => {
                let (params, results) = self.block_signature(bt)?;
                self.check_block(body, &params, &results, &results, stack, labels)?;
            }
            I::Loop(_, bt, body) => {
                let (params, results) = self.block_signature(bt)?;
                // A loop's branch target re-enters the loop, so it carries
                // the parameter types.
                self.check_block(body, &params, &results, &params, stack, labels)?;
            }
            I::If(_, bt, then, otherwise) => {
                let (params, results) = self.block_signature(bt)?;
                pop_expect(stack, I32)?;
                // Both arms consume the same parameters from the same
                // outer stack; the else arm checks against a snapshot.
                let mut snapshot = stack.clone();
                self.check_block(then, &params, &results, &results, stack, labels)?;
                self.check_block(otherwise, &params, &results, &results, &mut snapshot, labels)?;
            }

            I::Br(label) => {
                let target = target_types(labels, label.index())?;
                pop_vals(stack, &target)?;
                set_unreachable(stack);
            }
            I::BrIf(label) => {
                pop_expect(stack, I32)?;
                let target = target_types(labels, label.index())?;
                pop_vals(stack, &target)?;
                for ty in &target {
                    stack.push(StackType::Val(*ty));
                }
            }
            I::BrTable(table, default) => {
                pop_expect(stack, I32)?;
                let default_target = target_types(labels, default.index())?;
                for label in table {
                    let target = target_types(labels, label.index())?;
                    if target.len() != default_target.len() {
                        return Err(ERR_TYPE_MISMATCH);
                    }
                    if !default_target.iter().zip(&target).all(|(a, b)| a == b) {
                        return Err(ERR_TYPE_MISMATCH);
                    }
                }
                pop_vals(stack, &default_target)?;
                set_unreachable(stack);
            }
            I::Return => {
                let ret = self.ret.clone();
                pop_vals(stack, &ret)?;
                set_unreachable(stack);
            }
            I::Call(func) => {
                let ty = self.index.func_type(func.index())?.clone();
                pop_vals(stack, &ty.params)?;
                for ty in &ty.results {
                    stack.push(StackType::Val(*ty));
                }
            }
            I::CallIndirect(ty, table) => {
                if self.index.tables.get(table.index())?.ty().element != RefType::Func {
                    return Err(ERR_TYPE_MISMATCH);
                }
                let ty = self.index.types.get(ty.index())?.ty().clone();
                pop_expect(stack, I32)?;
                pop_vals(stack, &ty.params)?;
                for ty in &ty.results {
                    stack.push(StackType::Val(*ty));
                }
            }

            I::RefNull(ty) => stack.push(StackType::Val(ValueType::from(*ty))),
            I::RefIsNull => {
                match pop(stack)? {
                    StackType::Val(ty) if !ty.is_ref() => return Err(ERR_TYPE_MISMATCH),
                    _ => {}
                }
                stack.push(StackType::Val(I32));
            }
            I::RefFunc(func) => {
                if !self.declared.contains(&func.index()) {
                    return Err(ERR_UNDECLARED_REF);
                }
                stack.push(StackType::Val(FuncRef));
            }

            I::Drop => {
                pop(stack)?;
            }
            I::Select => {
                pop_expect(stack, I32)?;
                let a = pop(stack)?;
                let b = pop(stack)?;
                let result = match (a, b) {
                    (StackType::Val(ta), StackType::Val(tb)) => {
                        if ta != tb {
                            return Err(ERR_TYPE_MISMATCH);
                        }
                        StackType::Val(ta)
                    }
                    (StackType::Val(ty), _) | (_, StackType::Val(ty)) => StackType::Val(ty),
                    // Both operands unconstrained: the result exists but
                    // has no type yet.
                    _ => StackType::Something,
                };
                // The untyped form is restricted to numeric types.
                if let StackType::Val(ty) = result {
                    if !ty.is_numeric() {
                        return Err(ERR_TYPE_MISMATCH);
                    }
                }
                stack.push(result);
            }
            I::SelectT(types) => {
                if types.len() != 1 {
                    return Err(ERR_RESULT_ARITY);
                }
                let ty = types[0];
                pop_expect(stack, I32)?;
                pop_expect(stack, ty)?;
                pop_expect(stack, ty)?;
                stack.push(StackType::Val(ty));
            }

            I::LocalGet(local) => {
                let ty = self.local(local.index())?;
                stack.push(StackType::Val(ty));
            }
            I::LocalSet(local) => {
                let ty = self.local(local.index())?;
                pop_expect(stack, ty)?;
            }
            I::LocalTee(local) => {
                let ty = self.local(local.index())?;
                pop_expect(stack, ty)?;
                stack.push(StackType::Val(ty));
            }
            I::GlobalGet(global) => {
                let ty = self.index.globals.get(global.index())?.ty().value_type;
                stack.push(StackType::Val(ty));
            }
            I::GlobalSet(global) => {
                let ty = self.index.globals.get(global.index())?.ty().value_type;
                pop_expect(stack, ty)?;
            }

            I::TableGet(table) => {
                let elem = self.index.tables.get(table.index())?.ty().element;
                pop_expect(stack, I32)?;
                stack.push(StackType::Val(ValueType::from(elem)));
            }
            I::TableSet(table) => {
                let elem = self.index.tables.get(table.index())?.ty().element;
                pop_expect(stack, ValueType::from(elem))?;
                pop_expect(stack, I32)?;
            }
            I::TableSize(_) => stack.push(StackType::Val(I32)),
            I::TableGrow(table) => {
                let elem = self.index.tables.get(table.index())?.ty().element;
                pop_expect(stack, I32)?;
                pop_expect(stack, ValueType::from(elem))?;
                stack.push(StackType::Val(I32));
            }
            I::TableFill(table) => {
                let elem = self.index.tables.get(table.index())?.ty().element;
                pop_expect(stack, I32)?;
                pop_expect(stack, ValueType::from(elem))?;
                pop_expect(stack, I32)?;
            }
            I::TableCopy(dst, src) => {
                let dst_elem = self.index.tables.get(dst.index())?.ty().element;
                let src_elem = self.index.tables.get(src.index())?.ty().element;
                if dst_elem != src_elem {
                    return Err(ERR_TYPE_MISMATCH);
                }
                pop_expect(stack, I32)?;
                pop_expect(stack, I32)?;
                pop_expect(stack, I32)?;
            }
            I::TableInit(elem, table) => {
                let table_elem = self.index.tables.get(table.index())?.ty().element;
                let seg_elem = *self.index.elems.get(elem.index())?.ty();
                if table_elem != seg_elem {
                    return Err(ERR_TYPE_MISMATCH);
                }
                pop_expect(stack, I32)?;
                pop_expect(stack, I32)?;
                pop_expect(stack, I32)?;
            }
            I::ElemDrop(_) => {}

            I::I32Load(_) | I::I32Load8S(_) | I::I32Load8U(_) | I::I32Load16S(_)
            | I::I32Load16U(_) => load(stack, I32)?,
            I::I64Load(_) | I::I64Load8S(_) | I::I64Load8U(_) | I::I64Load16S(_)
            | I::I64Load16U(_) | I::I64Load32S(_) | I::I64Load32U(_) => load(stack, I64)?,
            I::F32Load(_) => load(stack, F32)?,
            I::F64Load(_) => load(stack, F64)?,
            I::I32Store(_) | I::I32Store8(_) | I::I32Store16(_) => store(stack, I32)?,
            I::I64Store(_) | I::I64Store8(_) | I::I64Store16(_) | I::I64Store32(_) => {
                store(stack, I64)?;
            }
            I::F32Store(_) => store(stack, F32)?,
            I::F64Store(_) => store(stack, F64)?,
            I::MemorySize => stack.push(StackType::Val(I32)),
            I::MemoryGrow => {
                pop_expect(stack, I32)?;
                stack.push(StackType::Val(I32));
            }
            I::MemoryFill | I::MemoryCopy | I::MemoryInit(_) => {
                pop_expect(stack, I32)?;
                pop_expect(stack, I32)?;
                pop_expect(stack, I32)?;
            }
            I::DataDrop(_) => {}

            I::I32Const(_) => stack.push(StackType::Val(I32)),
            I::I64Const(_) => stack.push(StackType::Val(I64)),
            I::F32Const(_) => stack.push(StackType::Val(F32)),
            I::F64Const(_) => stack.push(StackType::Val(F64)),

            I::I32Eqz => test(stack, I32)?,
            I::I64Eqz => test(stack, I64)?,

            I::I32Eq | I::I32Ne | I::I32LtS | I::I32LtU | I::I32GtS | I::I32GtU | I::I32LeS
            | I::I32LeU | I::I32GeS | I::I32GeU => rel(stack, I32)?,
            I::I64Eq | I::I64Ne | I::I64LtS | I::I64LtU | I::I64GtS | I::I64GtU | I::I64LeS
            | I::I64LeU | I::I64GeS | I::I64GeU => rel(stack, I64)?,
            I::F32Eq | I::F32Ne | I::F32Lt | I::F32Gt | I::F32Le | I::F32Ge => rel(stack, F32)?,
            I::F64Eq | I::F64Ne | I::F64Lt | I::F64Gt | I::F64Le | I::F64Ge => rel(stack, F64)?,

            I::I32Clz | I::I32Ctz | I::I32Popcnt | I::I32Extend8S | I::I32Extend16S => {
                unary(stack, I32)?;
            }
            I::I64Clz | I::I64Ctz | I::I64Popcnt | I::I64Extend8S | I::I64Extend16S
            | I::I64Extend32S => unary(stack, I64)?,
            I::F32Abs | I::F32Neg | I::F32Ceil | I::F32Floor | I::F32Trunc | I::F32Nearest
            | I::F32Sqrt => unary(stack, F32)?,
            I::F64Abs | I::F64Neg | I::F64Ceil | I::F64Floor | I::F64Trunc | I::F64Nearest
            | I::F64Sqrt => unary(stack, F64)?,

            I::I32Add | I::I32Sub | I::I32Mul | I::I32DivS | I::I32DivU | I::I32RemS
            | I::I32RemU | I::I32And | I::I32Or | I::I32Xor | I::I32Shl | I::I32ShrS
            | I::I32ShrU | I::I32Rotl | I::I32Rotr => binary(stack, I32)?,
            I::I64Add | I::I64Sub | I::I64Mul | I::I64DivS | I::I64DivU | I::I64RemS
            | I::I64RemU | I::I64And | I::I64Or | I::I64Xor | I::I64Shl | I::I64ShrS
            | I::I64ShrU | I::I64Rotl | I::I64Rotr => binary(stack, I64)?,
            I::F32Add | I::F32Sub | I::F32Mul | I::F32Div | I::F32Min | I::F32Max
            | I::F32Copysign => binary(stack, F32)?,
            I::F64Add | I::F64Sub | I::F64Mul | I::F64Div | I::F64Min | I::F64Max
            | I::F64Copysign => binary(stack, F64)?,

            I::I32WrapI64 => convert(stack, I64, I32)?,
            I::I32TruncF32S | I::I32TruncF32U | I::I32TruncSatF32S | I::I32TruncSatF32U => {
                convert(stack, F32, I32)?;
            }
            I::I32TruncF64S | I::I32TruncF64U | I::I32TruncSatF64S | I::I32TruncSatF64U => {
                convert(stack, F64, I32)?;
            }
            I::I64ExtendI32S | I::I64ExtendI32U => convert(stack, I32, I64)?,
            I::I64TruncF32S | I::I64TruncF32U | I::I64TruncSatF32S | I::I64TruncSatF32U => {
                convert(stack, F32, I64)?;
            }
            I::I64TruncF64S | I::I64TruncF64U | I::I64TruncSatF64S | I::I64TruncSatF64U => {
                convert(stack, F64, I64)?;
            }
            I::F32ConvertI32S | I::F32ConvertI32U => convert(stack, I32, F32)?,
            I::F32ConvertI64S | I::F32ConvertI64U => convert(stack, I64, F32)?,
            I::F32DemoteF64 => convert(stack, F64, F32)?,
            I::F64ConvertI32S | I::F64ConvertI32U => convert(stack, I32, F64)?,
            I::F64ConvertI64S | I::F64ConvertI64U => convert(stack, I64, F64)?,
            I::F64PromoteF32 => convert(stack, F32, F64)?,
            I::I32ReinterpretF32 => convert(stack, F32, I32)?,
            I::I64ReinterpretF64 => convert(stack, F64, I64)?,
            I::F32ReinterpretI32 => convert(stack, I32, F32)?,
            I::F64ReinterpretI64 => convert(stack, I64, F64)?,
        }
        Ok(())
    }
}

fn set_unreachable(stack: &mut Vec<StackType>) {
    stack.clear();
    stack.push(StackType::Any);
}

/// Pops one slot. An `Any` at the bottom absorbs the pop without being
/// consumed.
fn pop(stack: &mut Vec<StackType>) -> Result<StackType> {
    match stack.last() {
        Some(StackType::Any) => Ok(StackType::Any),
        Some(_) => Ok(stack.pop().unwrap_or(StackType::Any)),
        None => Err(ERR_TYPE_MISMATCH),
    }
}

fn pop_expect(stack: &mut Vec<StackType>, required: ValueType) -> Result<()> {
    let got = pop(stack)?;
    if match_types(required, got) {
        Ok(())
    } else {
        Err(ERR_TYPE_MISMATCH)
    }
}

fn pop_vals(stack: &mut Vec<StackType>, required: &[ValueType]) -> Result<()> {
    for ty in required.iter().rev() {
        pop_expect(stack, *ty)?;
    }
    Ok(())
}

fn target_types(labels: &[Frame], depth: u32) -> Result<Vec<ValueType>> {
    let position = labels
        .len()
        .checked_sub(1 + depth as usize)
        .ok_or(ERR_TYPE_MISMATCH)?;
    Ok(labels[position].target.clone())
}

fn load(stack: &mut Vec<StackType>, ty: ValueType) -> Result<()> {
    pop_expect(stack, ValueType::I32)?;
    stack.push(StackType::Val(ty));
    Ok(())
}

fn store(stack: &mut Vec<StackType>, ty: ValueType) -> Result<()> {
    pop_expect(stack, ty)?;
    pop_expect(stack, ValueType::I32)?;
    Ok(())
}

fn test(stack: &mut Vec<StackType>, ty: ValueType) -> Result<()> {
    pop_expect(stack, ty)?;
    stack.push(StackType::Val(ValueType::I32));
    Ok(())
}

fn rel(stack: &mut Vec<StackType>, ty: ValueType) -> Result<()> {
    pop_expect(stack, ty)?;
    pop_expect(stack, ty)?;
    stack.push(StackType::Val(ValueType::I32));
    Ok(())
}

fn unary(stack: &mut Vec<StackType>, ty: ValueType) -> Result<()> {
    pop_expect(stack, ty)?;
    stack.push(StackType::Val(ty));
    Ok(())
}

fn binary(stack: &mut Vec<StackType>, ty: ValueType) -> Result<()> {
    pop_expect(stack, ty)?;
    pop_expect(stack, ty)?;
    stack.push(StackType::Val(ty));
    Ok(())
}

fn convert(stack: &mut Vec<StackType>, from: ValueType, to: ValueType) -> Result<()> {
    pop_expect(stack, from)?;
    stack.push(StackType::Val(to));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wex_format::module::{Export, Function, TypeDef};
    use wex_format::types::{FuncType, ItemRef};
    use wex_rewrite::rewrite_module;

    fn checked(module: &Module) -> Result<Validated> {
        let (module, index) = rewrite_module(module)?;
        validate_module(&module, &index)
    }

    fn one_func(results: Vec<ValueType>, body: Vec<Instruction>) -> Module {
        Module {
            types: vec![TypeDef {
                name: None,
                ty: FuncType::new(Vec::new(), results),
            }],
            funcs: vec![Function {
                name: None,
                ty: ItemRef::Index(0),
                param_names: Vec::new(),
                locals: Vec::new(),
                body,
            }],
            ..Module::default()
        }
    }

    #[test]
    fn unreachable_absorbs_required_result() {
        // (block (result i32) unreachable) type-checks: the unreachable
        // stack absorbs the required i32.
        let module = one_func(
            vec![ValueType::I32],
            vec![Instruction::Block(
                None,
                BlockType::Value(ValueType::I32),
                vec![Instruction::Unreachable],
            )],
        );
        assert!(checked(&module).is_ok());
    }

    #[test]
    fn missing_result_is_a_type_mismatch() {
        let module = one_func(
            vec![ValueType::I32],
            vec![Instruction::Block(
                None,
                BlockType::Value(ValueType::I32),
                vec![],
            )],
        );
        let err = checked(&module).unwrap_err();
        assert_eq!(err.message, "type mismatch");
    }

    #[test]
    fn branch_makes_rest_of_block_polymorphic() {
        let module = one_func(
            vec![ValueType::I32],
            vec![
                Instruction::Block(
                    None,
                    BlockType::Value(ValueType::I32),
                    vec![
                        Instruction::I32Const(1),
                        Instruction::Br(ItemRef::Index(0)),
                        // Unreachable tail: consumes and produces anything.
                        Instruction::F64Add,
                        Instruction::Drop,
                    ],
                ),
            ],
        );
        assert!(checked(&module).is_ok());
    }

    #[test]
    fn operand_type_mismatch_is_rejected() {
        let module = one_func(
            vec![ValueType::I32],
            vec![
                Instruction::I32Const(1),
                Instruction::F32Const(2.0),
                Instruction::I32Add,
            ],
        );
        let err = checked(&module).unwrap_err();
        assert_eq!(err.message, "type mismatch");
    }

    #[test]
    fn select_of_unconstrained_operands_is_something() {
        // unreachable; select; drop -- the select result is Something and
        // may be dropped.
        let module = one_func(
            Vec::new(),
            vec![
                Instruction::Unreachable,
                Instruction::Select,
                Instruction::Drop,
            ],
        );
        assert!(checked(&module).is_ok());
    }

    #[test]
    fn untyped_select_rejects_references() {
        let module = one_func(
            Vec::new(),
            vec![
                Instruction::RefNull(RefType::Func),
                Instruction::RefNull(RefType::Func),
                Instruction::I32Const(0),
                Instruction::Select,
                Instruction::Drop,
            ],
        );
        let err = checked(&module).unwrap_err();
        assert_eq!(err.message, "type mismatch");
    }

    #[test]
    fn ref_func_requires_declaration() {
        let mut module = one_func(
            Vec::new(),
            vec![Instruction::RefFunc(ItemRef::Index(0)), Instruction::Drop],
        );
        let err = checked(&module).unwrap_err();
        assert_eq!(err.message, "undeclared function reference");

        // Exporting the function declares the reference.
        module.exports.push(Export {
            name: "f".into(),
            kind: ExternKind::Func,
            item: ItemRef::Index(0),
        });
        assert!(checked(&module).is_ok());
    }

    #[test]
    fn loop_branch_target_is_parameter_types() {
        // A loop whose target takes an i32 parameter: br 0 must provide
        // the parameter, not the result.
        let mut module = one_func(Vec::new(), Vec::new());
        module.types.push(TypeDef {
            name: None,
            ty: FuncType::new(vec![ValueType::I32], vec![ValueType::I32]),
        });
        module.funcs[0].body = vec![
            Instruction::I32Const(5),
            Instruction::Loop(
                None,
                BlockType::Type(ItemRef::Index(1)),
                vec![
                    Instruction::I32Const(1),
                    Instruction::I32Sub,
                    Instruction::Br(ItemRef::Index(0)),
                ],
            ),
            Instruction::Drop,
        ];
        assert!(checked(&module).is_ok());
    }

    #[test]
    fn if_arms_are_checked_independently() {
        let module = one_func(
            vec![ValueType::I32],
            vec![
                Instruction::I32Const(1),
                Instruction::If(
                    None,
                    BlockType::Value(ValueType::I32),
                    vec![Instruction::I32Const(7)],
                    vec![Instruction::F32Const(1.0)],
                ),
            ],
        );
        let err = checked(&module).unwrap_err();
        assert_eq!(err.message, "type mismatch");
    }

    #[test]
    fn exports_populate_declared_refs() {
        let mut module = one_func(Vec::new(), Vec::new());
        module.exports.push(Export {
            name: "f".into(),
            kind: ExternKind::Func,
            item: ItemRef::Index(0),
        });
        let validated = checked(&module).unwrap();
        assert!(validated.declared_funcs.contains(&0));
    }
}
