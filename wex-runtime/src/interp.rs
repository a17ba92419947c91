// WEX - wex-runtime
// Module: WEX Interpreter
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The stack-and-frame interpreter.
//!
//! Structured control executes by recursion over nested bodies; a label
//! outcome ([`Flow`]) propagates branches outward, decrementing the depth
//! at each enclosing block. A `loop` re-enters its body on a depth-0
//! branch with the loop parameters still on the stack.
//!
//! Every value computation is delegated to the [`Evaluator`]; the
//! interpreter itself only moves values, resolves addresses through the
//! current frame's instance, and enforces traps whose conditions are
//! structural (bounds, null entries, signature mismatches).

use log::trace;

use wex_error::{codes, Error, Result};
use wex_format::types::BlockType;
use wex_format::{Instruction, MemArg};

use crate::config::{ExecConfig, ExecStats};
use crate::eval::{BinaryOp, CompareOp, ConvertOp, Evaluator, TestOp, UnaryOp};
use crate::store::{FuncInst, Store};
use crate::table;
use crate::values::{Trap, Value};

const ERR_CALL_STACK: Error =
    Error::runtime(codes::CALL_STACK_EXHAUSTED, "call stack exhausted");
const ERR_STEP_LIMIT: Error =
    Error::runtime(codes::STEP_LIMIT_EXCEEDED, "step limit exceeded");
const ERR_ARITY: Error = Error::runtime(codes::INVALID_ARGUMENT, "argument arity mismatch");
const ERR_SYMBOLIC: Error = Error::runtime(
    codes::SYMBOLIC_VALUE_REQUIRED,
    "symbolic value in a concrete position",
);

/// The label outcome of executing a body.
enum Flow {
    /// Fell off the end.
    Next,
    /// Branching to the label at the given relative depth.
    Branch(u32),
    /// Returning from the function.
    Return,
}

/// One call frame: the owning instance plus the shared parameter/local
/// array.
struct Frame<V> {
    instance: usize,
    locals: Vec<V>,
}

/// The interpreter over a store, an evaluator, and a config.
pub(crate) struct Interpreter<'a, E: Evaluator> {
    pub store: &'a mut Store<E>,
    pub eval: &'a mut E,
    pub config: &'a ExecConfig,
    pub stats: &'a mut ExecStats,
    depth: usize,
}

impl<'a, E: Evaluator> Interpreter<'a, E> {
    pub fn new(
        store: &'a mut Store<E>,
        eval: &'a mut E,
        config: &'a ExecConfig,
        stats: &'a mut ExecStats,
    ) -> Self {
        Self {
            store,
            eval,
            config,
            stats,
            depth: 0,
        }
    }

    /// Invokes the function at `addr` with already-lifted arguments.
    pub fn invoke(&mut self, addr: u32, args: Vec<E::Value>) -> Result<Vec<E::Value>> {
        self.stats.calls += 1;
        self.depth += 1;
        self.stats.peak_depth = self.stats.peak_depth.max(self.depth);
        if self.depth > self.config.max_call_depth {
            self.depth -= 1;
            return Err(ERR_CALL_STACK);
        }
        let result = self.invoke_inner(addr, args);
        self.depth -= 1;
        result
    }

    fn invoke_inner(&mut self, addr: u32, args: Vec<E::Value>) -> Result<Vec<E::Value>> {
        enum Callee<E: Evaluator> {
            Wasm(std::rc::Rc<wex_format::module::Function>, usize, usize, usize),
            Host(crate::host::HostFunc<E>, wex_format::types::FuncType),
        }

        let callee = match self.store.func(addr)? {
            FuncInst::Wasm { ty, instance, code } => {
                if args.len() != ty.params.len() {
                    return Err(ERR_ARITY);
                }
                Callee::Wasm(code.clone(), *instance, ty.params.len(), ty.results.len())
            }
            FuncInst::Host { ty, func } => {
                if args.len() != ty.params.len() {
                    return Err(ERR_ARITY);
                }
                Callee::Host(func.clone(), ty.clone())
            }
        };

        match callee {
            Callee::Host(func, ty) => {
                // Concrete operands must match the declared signature; a
                // symbolic operand's typing is the algebra's concern.
                for (arg, expected) in args.iter().zip(&ty.params) {
                    if let Some(value) = self.eval.concrete(arg) {
                        if value.ty() != *expected {
                            return Err(Trap::ExternCallArgTypeMismatch.into());
                        }
                    }
                }
                func(self.eval, &args)
            }
            Callee::Wasm(code, instance, _params, results) => {
                let mut locals = args;
                for local in &code.locals {
                    let zero = self.eval.constant(Value::default_for(local.ty));
                    locals.push(zero);
                }
                let mut frame = Frame { instance, locals };
                let mut stack: Vec<E::Value> = Vec::new();
                self.exec_body(&mut frame, &code.body, &mut stack)?;
                // Whatever flow ended the body, the results sit on top.
                if stack.len() < results {
                    return Err(ERR_ARITY);
                }
                Ok(stack.split_off(stack.len() - results))
            }
        }
    }

    fn exec_body(
        &mut self,
        frame: &mut Frame<E::Value>,
        body: &[Instruction],
        stack: &mut Vec<E::Value>,
    ) -> Result<Flow> {
        for instr in body {
            match self.exec_instr(frame, instr, stack)? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    /// Arity of a block type in the current frame's instance.
    fn block_arity(&self, frame: &Frame<E::Value>, bt: &BlockType) -> Result<(usize, usize)> {
        match bt {
            BlockType::Empty => Ok((0, 0)),
            BlockType::Value(_) => Ok((0, 1)),
            BlockType::Type(item) => {
                let instance = self.store.instance(frame.instance)?;
                let ty = instance
                    .types
                    .get(item.index() as usize)
                    .ok_or(Trap::IndirectCallTypeMismatch)?;
                Ok((ty.params.len(), ty.results.len()))
            }
            BlockType::Inline(sig) => {
                debug_assert!(false, "inline block type after rewrite");
                Ok((sig.params.len(), sig.results.len()))
            }
        }
    }

    /// Runs a block body and converts its outgoing flow: a depth-0 branch
    /// lands here, keeping `arity` operands and discarding the rest of
    /// the block's stack.
    fn run_label(
        stack: &mut Vec<E::Value>,
        base: usize,
        arity: usize,
        flow: Flow,
    ) -> Flow {
        match flow {
            Flow::Next => Flow::Next,
            Flow::Branch(0) => {
                let kept = stack.split_off(stack.len() - arity);
                stack.truncate(base);
                stack.extend(kept);
                Flow::Next
            }
            Flow::Branch(depth) => Flow::Branch(depth - 1),
            Flow::Return => Flow::Return,
        }
    }

    #[allow(clippy::too_many_lines)]
    fn exec_instr(
        &mut self,
        frame: &mut Frame<E::Value>,
        instr: &Instruction,
        stack: &mut Vec<E::Value>,
    ) -> Result<Flow> {
        use Instruction as I;

        self.stats.instructions += 1;
        if self
            .config
            .max_steps
            .is_some_and(|limit| self.stats.instructions > limit)
        {
            return Err(ERR_STEP_LIMIT);
        }
        if self.config.debug {
            trace!("exec {instr:?} (stack depth {})", stack.len());
        }

        match instr {
            I::Unreachable => return Err(Trap::Unreachable.into()),
            I::Nop => {}

            I::Block(_, bt, body) => {
                let (params, results) = self.block_arity(frame, bt)?;
                let base = stack.len() - params;
                let flow = self.exec_body(frame, body, stack)?;
                return Ok(Self::run_label(stack, base, results, flow));
            }
            I::Loop(_, bt, body) => {
                let (params, _) = self.block_arity(frame, bt)?;
                let base = stack.len() - params;
                loop {
                    match self.exec_body(frame, body, stack)? {
                        Flow::Next => return Ok(Flow::Next),
                        // A branch to a loop label re-enters the loop with
                        // its parameters on the stack.
                        Flow::Branch(0) => {
                            let kept = stack.split_off(stack.len() - params);
                            stack.truncate(base);
                            stack.extend(kept);
                        }
                        Flow::Branch(depth) => return Ok(Flow::Branch(depth - 1)),
                        Flow::Return => return Ok(Flow::Return),
                    }
                }
            }
            I::If(_, bt, then, otherwise) => {
                let cond = pop(stack)?;
                let (params, results) = self.block_arity(frame, bt)?;
                let base = stack.len() - params;
                let body = if self.eval.eval_condition(&cond)? {
                    then
                } else {
                    otherwise
                };
                let flow = self.exec_body(frame, body, stack)?;
                return Ok(Self::run_label(stack, base, results, flow));
            }

            I::Br(label) => return Ok(Flow::Branch(label.index())),
            I::BrIf(label) => {
                let cond = pop(stack)?;
                if self.eval.eval_condition(&cond)? {
                    return Ok(Flow::Branch(label.index()));
                }
            }
            I::BrTable(labels, default) => {
                let index = pop(stack)?;
                let count = labels.len() as u32 + 1;
                let chosen = self.eval.choose_index(&index, count)?;
                let target = labels
                    .get(chosen as usize)
                    .unwrap_or(default)
                    .index();
                return Ok(Flow::Branch(target));
            }
            I::Return => return Ok(Flow::Return),

            I::Call(func) => {
                let addr = self.func_addr(frame, func.index())?;
                self.call(stack, addr)?;
            }
            I::CallIndirect(ty, table) => {
                let index = self.concrete_u32(&pop(stack)?)?;
                let instance = self.store.instance(frame.instance)?;
                let expected = instance
                    .types
                    .get(ty.index() as usize)
                    .ok_or(Trap::IndirectCallTypeMismatch)?
                    .clone();
                let table_addr = *instance
                    .tables
                    .get(table.index() as usize)
                    .ok_or(Trap::UndefinedElement)?;
                let table = self.store.table(table_addr)?;
                if index >= table.size() {
                    return Err(Trap::UndefinedElement.into());
                }
                let addr = match table.get(index)? {
                    Value::FuncRef(Some(addr)) => addr,
                    Value::FuncRef(None) => return Err(Trap::UninitializedElement.into()),
                    _ => return Err(Trap::IndirectCallTypeMismatch.into()),
                };
                if self.store.func(addr)?.ty() != &expected {
                    return Err(Trap::IndirectCallTypeMismatch.into());
                }
                self.call(stack, addr)?;
            }

            I::RefNull(ty) => {
                let null = self.eval.constant(Value::null(*ty));
                stack.push(null);
            }
            I::RefIsNull => {
                let value = self.concrete(&pop(stack)?)?;
                let result = self.eval.constant(Value::I32(i32::from(value.is_null_ref())));
                stack.push(result);
            }
            I::RefFunc(func) => {
                let addr = self.func_addr(frame, func.index())?;
                let value = self.eval.constant(Value::FuncRef(Some(addr)));
                stack.push(value);
            }

            I::Drop => {
                pop(stack)?;
            }
            I::Select | I::SelectT(_) => {
                let cond = pop(stack)?;
                let b = pop(stack)?;
                let a = pop(stack)?;
                let result = self.eval.select(cond, a, b)?;
                stack.push(result);
            }

            I::LocalGet(local) => {
                let value = frame
                    .locals
                    .get(local.index() as usize)
                    .ok_or(ERR_ARITY)?
                    .clone();
                stack.push(value);
            }
            I::LocalSet(local) => {
                let value = pop(stack)?;
                *frame
                    .locals
                    .get_mut(local.index() as usize)
                    .ok_or(ERR_ARITY)? = value;
            }
            I::LocalTee(local) => {
                let value = pop(stack)?;
                stack.push(value.clone());
                *frame
                    .locals
                    .get_mut(local.index() as usize)
                    .ok_or(ERR_ARITY)? = value;
            }
            I::GlobalGet(global) => {
                let addr = self.global_addr(frame, global.index())?;
                let value = self.store.global(addr)?.value.clone();
                stack.push(value);
            }
            I::GlobalSet(global) => {
                let addr = self.global_addr(frame, global.index())?;
                let value = pop(stack)?;
                self.store.global_mut(addr)?.value = value;
            }

            I::TableGet(table) => {
                let index = self.concrete_u32(&pop(stack)?)?;
                let addr = self.table_addr(frame, table.index())?;
                let value = self.store.table(addr)?.get(index)?;
                let value = self.eval.constant(value);
                stack.push(value);
            }
            I::TableSet(table) => {
                let value = self.concrete(&pop(stack)?)?;
                let index = self.concrete_u32(&pop(stack)?)?;
                let addr = self.table_addr(frame, table.index())?;
                self.store.table_mut(addr)?.set(index, value)?;
            }
            I::TableSize(table) => {
                let addr = self.table_addr(frame, table.index())?;
                let size = self.store.table(addr)?.size();
                let value = self.eval.constant(Value::I32(size as i32));
                stack.push(value);
            }
            I::TableGrow(table) => {
                let delta = self.concrete_u32(&pop(stack)?)?;
                let init = self.concrete(&pop(stack)?)?;
                let addr = self.table_addr(frame, table.index())?;
                let old = self.store.table_mut(addr)?.grow(delta, init);
                let value = self.eval.constant(Value::I32(old));
                stack.push(value);
            }
            I::TableFill(table) => {
                let len = self.concrete_u32(&pop(stack)?)?;
                let value = self.concrete(&pop(stack)?)?;
                let start = self.concrete_u32(&pop(stack)?)?;
                let addr = self.table_addr(frame, table.index())?;
                self.store.table_mut(addr)?.fill(start, value, len)?;
            }
            I::TableCopy(dst, src) => {
                let len = self.concrete_u32(&pop(stack)?)?;
                let src_start = self.concrete_u32(&pop(stack)?)?;
                let dst_start = self.concrete_u32(&pop(stack)?)?;
                let dst_addr = self.table_addr(frame, dst.index())?;
                let src_addr = self.table_addr(frame, src.index())?;
                table::copy_between(
                    &mut self.store.tables,
                    dst_addr,
                    src_addr,
                    dst_start,
                    src_start,
                    len,
                )?;
            }
            I::TableInit(elem, table) => {
                let len = self.concrete_u32(&pop(stack)?)?;
                let src = self.concrete_u32(&pop(stack)?)?;
                let dst = self.concrete_u32(&pop(stack)?)?;
                let table_addr = self.table_addr(frame, table.index())?;
                let elem_addr = self.elem_addr(frame, elem.index())?;
                let refs = std::mem::take(&mut self.store.elems[elem_addr as usize]);
                let result = self
                    .store
                    .table_mut(table_addr)?
                    .init(dst, &refs, src, len);
                self.store.elems[elem_addr as usize] = refs;
                result?;
            }
            I::ElemDrop(elem) => {
                let addr = self.elem_addr(frame, elem.index())?;
                self.store.elems[addr as usize].clear();
            }

            I::I32Load(m) => self.load(frame, stack, m, 4, |b| {
                Value::I32(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            })?,
            I::I64Load(m) => self.load(frame, stack, m, 8, |b| {
                Value::I64(i64::from_le_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]))
            })?,
            I::F32Load(m) => self.load(frame, stack, m, 4, |b| {
                Value::F32(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            })?,
            I::F64Load(m) => self.load(frame, stack, m, 8, |b| {
                Value::F64(f64::from_le_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]))
            })?,
            I::I32Load8S(m) => {
                self.load(frame, stack, m, 1, |b| Value::I32(i32::from(b[0] as i8)))?;
            }
            I::I32Load8U(m) => {
                self.load(frame, stack, m, 1, |b| Value::I32(i32::from(b[0])))?;
            }
            I::I32Load16S(m) => self.load(frame, stack, m, 2, |b| {
                Value::I32(i32::from(i16::from_le_bytes([b[0], b[1]])))
            })?,
            I::I32Load16U(m) => self.load(frame, stack, m, 2, |b| {
                Value::I32(i32::from(u16::from_le_bytes([b[0], b[1]])))
            })?,
            I::I64Load8S(m) => {
                self.load(frame, stack, m, 1, |b| Value::I64(i64::from(b[0] as i8)))?;
            }
            I::I64Load8U(m) => {
                self.load(frame, stack, m, 1, |b| Value::I64(i64::from(b[0])))?;
            }
            I::I64Load16S(m) => self.load(frame, stack, m, 2, |b| {
                Value::I64(i64::from(i16::from_le_bytes([b[0], b[1]])))
            })?,
            I::I64Load16U(m) => self.load(frame, stack, m, 2, |b| {
                Value::I64(i64::from(u16::from_le_bytes([b[0], b[1]])))
            })?,
            I::I64Load32S(m) => self.load(frame, stack, m, 4, |b| {
                Value::I64(i64::from(i32::from_le_bytes([b[0], b[1], b[2], b[3]])))
            })?,
            I::I64Load32U(m) => self.load(frame, stack, m, 4, |b| {
                Value::I64(i64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
            })?,

            I::I32Store(m) => {
                self.storeop(frame, stack, m, |v| Ok(v.as_i32()?.to_le_bytes().to_vec()))?;
            }
            I::I64Store(m) => {
                self.storeop(frame, stack, m, |v| Ok(v.as_i64()?.to_le_bytes().to_vec()))?;
            }
            I::F32Store(m) => {
                self.storeop(frame, stack, m, |v| Ok(v.as_f32()?.to_le_bytes().to_vec()))?;
            }
            I::F64Store(m) => {
                self.storeop(frame, stack, m, |v| Ok(v.as_f64()?.to_le_bytes().to_vec()))?;
            }
            I::I32Store8(m) => {
                self.storeop(frame, stack, m, |v| Ok(vec![v.as_i32()? as u8]))?;
            }
            I::I32Store16(m) => self.storeop(frame, stack, m, |v| {
                Ok((v.as_i32()? as u16).to_le_bytes().to_vec())
            })?,
            I::I64Store8(m) => {
                self.storeop(frame, stack, m, |v| Ok(vec![v.as_i64()? as u8]))?;
            }
            I::I64Store16(m) => self.storeop(frame, stack, m, |v| {
                Ok((v.as_i64()? as u16).to_le_bytes().to_vec())
            })?,
            I::I64Store32(m) => self.storeop(frame, stack, m, |v| {
                Ok((v.as_i64()? as u32).to_le_bytes().to_vec())
            })?,

            I::MemorySize => {
                let addr = self.memory_addr(frame)?;
                let size = self.store.memory(addr)?.size();
                let value = self.eval.constant(Value::I32(size as i32));
                stack.push(value);
            }
            I::MemoryGrow => {
                let delta = self.concrete_u32(&pop(stack)?)?;
                let addr = self.memory_addr(frame)?;
                let old = self.store.memory_mut(addr)?.grow(delta);
                let value = self.eval.constant(Value::I32(old));
                stack.push(value);
            }
            I::MemoryFill => {
                let len = self.concrete_u32(&pop(stack)?)?;
                let value = self.concrete_u32(&pop(stack)?)?;
                let dst = self.concrete_u32(&pop(stack)?)?;
                let addr = self.memory_addr(frame)?;
                self.store
                    .memory_mut(addr)?
                    .fill(u64::from(dst), value as u8, u64::from(len))?;
            }
            I::MemoryCopy => {
                let len = self.concrete_u32(&pop(stack)?)?;
                let src = self.concrete_u32(&pop(stack)?)?;
                let dst = self.concrete_u32(&pop(stack)?)?;
                let addr = self.memory_addr(frame)?;
                self.store.memory_mut(addr)?.copy_within(
                    u64::from(dst),
                    u64::from(src),
                    u64::from(len),
                )?;
            }
            I::MemoryInit(data) => {
                let len = self.concrete_u32(&pop(stack)?)?;
                let src = self.concrete_u32(&pop(stack)?)?;
                let dst = self.concrete_u32(&pop(stack)?)?;
                let mem_addr = self.memory_addr(frame)?;
                let data_addr = self.data_addr(frame, data.index())?;
                let bytes = std::mem::take(&mut self.store.datas[data_addr as usize]);
                let result = self.store.memory_mut(mem_addr)?.init(
                    u64::from(dst),
                    &bytes,
                    u64::from(src),
                    u64::from(len),
                );
                self.store.datas[data_addr as usize] = bytes;
                result?;
            }
            I::DataDrop(data) => {
                let addr = self.data_addr(frame, data.index())?;
                self.store.datas[addr as usize].clear();
            }

            I::I32Const(v) => {
                let value = self.eval.constant(Value::I32(*v));
                stack.push(value);
            }
            I::I64Const(v) => {
                let value = self.eval.constant(Value::I64(*v));
                stack.push(value);
            }
            I::F32Const(v) => {
                let value = self.eval.constant(Value::F32(*v));
                stack.push(value);
            }
            I::F64Const(v) => {
                let value = self.eval.constant(Value::F64(*v));
                stack.push(value);
            }

            I::I32Eqz => self.testop(stack, TestOp::I32Eqz)?,
            I::I64Eqz => self.testop(stack, TestOp::I64Eqz)?,

            I::I32Eq => self.cmpop(stack, CompareOp::I32Eq)?,
            I::I32Ne => self.cmpop(stack, CompareOp::I32Ne)?,
            I::I32LtS => self.cmpop(stack, CompareOp::I32LtS)?,
            I::I32LtU => self.cmpop(stack, CompareOp::I32LtU)?,
            I::I32GtS => self.cmpop(stack, CompareOp::I32GtS)?,
            I::I32GtU => self.cmpop(stack, CompareOp::I32GtU)?,
            I::I32LeS => self.cmpop(stack, CompareOp::I32LeS)?,
            I::I32LeU => self.cmpop(stack, CompareOp::I32LeU)?,
            I::I32GeS => self.cmpop(stack, CompareOp::I32GeS)?,
            I::I32GeU => self.cmpop(stack, CompareOp::I32GeU)?,
            I::I64Eq => self.cmpop(stack, CompareOp::I64Eq)?,
            I::I64Ne => self.cmpop(stack, CompareOp::I64Ne)?,
            I::I64LtS => self.cmpop(stack, CompareOp::I64LtS)?,
            I::I64LtU => self.cmpop(stack, CompareOp::I64LtU)?,
            I::I64GtS => self.cmpop(stack, CompareOp::I64GtS)?,
            I::I64GtU => self.cmpop(stack, CompareOp::I64GtU)?,
            I::I64LeS => self.cmpop(stack, CompareOp::I64LeS)?,
            I::I64LeU => self.cmpop(stack, CompareOp::I64LeU)?,
            I::I64GeS => self.cmpop(stack, CompareOp::I64GeS)?,
            I::I64GeU => self.cmpop(stack, CompareOp::I64GeU)?,
            I::F32Eq => self.cmpop(stack, CompareOp::F32Eq)?,
            I::F32Ne => self.cmpop(stack, CompareOp::F32Ne)?,
            I::F32Lt => self.cmpop(stack, CompareOp::F32Lt)?,
            I::F32Gt => self.cmpop(stack, CompareOp::F32Gt)?,
            I::F32Le => self.cmpop(stack, CompareOp::F32Le)?,
            I::F32Ge => self.cmpop(stack, CompareOp::F32Ge)?,
            I::F64Eq => self.cmpop(stack, CompareOp::F64Eq)?,
            I::F64Ne => self.cmpop(stack, CompareOp::F64Ne)?,
            I::F64Lt => self.cmpop(stack, CompareOp::F64Lt)?,
            I::F64Gt => self.cmpop(stack, CompareOp::F64Gt)?,
            I::F64Le => self.cmpop(stack, CompareOp::F64Le)?,
            I::F64Ge => self.cmpop(stack, CompareOp::F64Ge)?,

            I::I32Clz => self.unop(stack, UnaryOp::I32Clz)?,
            I::I32Ctz => self.unop(stack, UnaryOp::I32Ctz)?,
            I::I32Popcnt => self.unop(stack, UnaryOp::I32Popcnt)?,
            I::I32Extend8S => self.unop(stack, UnaryOp::I32Extend8S)?,
            I::I32Extend16S => self.unop(stack, UnaryOp::I32Extend16S)?,
            I::I64Clz => self.unop(stack, UnaryOp::I64Clz)?,
            I::I64Ctz => self.unop(stack, UnaryOp::I64Ctz)?,
            I::I64Popcnt => self.unop(stack, UnaryOp::I64Popcnt)?,
            I::I64Extend8S => self.unop(stack, UnaryOp::I64Extend8S)?,
            I::I64Extend16S => self.unop(stack, UnaryOp::I64Extend16S)?,
            I::I64Extend32S => self.unop(stack, UnaryOp::I64Extend32S)?,
            I::F32Abs => self.unop(stack, UnaryOp::F32Abs)?,
            I::F32Neg => self.unop(stack, UnaryOp::F32Neg)?,
            I::F32Ceil => self.unop(stack, UnaryOp::F32Ceil)?,
            I::F32Floor => self.unop(stack, UnaryOp::F32Floor)?,
            I::F32Trunc => self.unop(stack, UnaryOp::F32Trunc)?,
            I::F32Nearest => self.unop(stack, UnaryOp::F32Nearest)?,
            I::F32Sqrt => self.unop(stack, UnaryOp::F32Sqrt)?,
            I::F64Abs => self.unop(stack, UnaryOp::F64Abs)?,
            I::F64Neg => self.unop(stack, UnaryOp::F64Neg)?,
            I::F64Ceil => self.unop(stack, UnaryOp::F64Ceil)?,
            I::F64Floor => self.unop(stack, UnaryOp::F64Floor)?,
            I::F64Trunc => self.unop(stack, UnaryOp::F64Trunc)?,
            I::F64Nearest => self.unop(stack, UnaryOp::F64Nearest)?,
            I::F64Sqrt => self.unop(stack, UnaryOp::F64Sqrt)?,

            I::I32Add => self.binop(stack, BinaryOp::I32Add)?,
            I::I32Sub => self.binop(stack, BinaryOp::I32Sub)?,
            I::I32Mul => self.binop(stack, BinaryOp::I32Mul)?,
            I::I32DivS => self.binop(stack, BinaryOp::I32DivS)?,
            I::I32DivU => self.binop(stack, BinaryOp::I32DivU)?,
            I::I32RemS => self.binop(stack, BinaryOp::I32RemS)?,
            I::I32RemU => self.binop(stack, BinaryOp::I32RemU)?,
            I::I32And => self.binop(stack, BinaryOp::I32And)?,
            I::I32Or => self.binop(stack, BinaryOp::I32Or)?,
            I::I32Xor => self.binop(stack, BinaryOp::I32Xor)?,
            I::I32Shl => self.binop(stack, BinaryOp::I32Shl)?,
            I::I32ShrS => self.binop(stack, BinaryOp::I32ShrS)?,
            I::I32ShrU => self.binop(stack, BinaryOp::I32ShrU)?,
            I::I32Rotl => self.binop(stack, BinaryOp::I32Rotl)?,
            I::I32Rotr => self.binop(stack, BinaryOp::I32Rotr)?,
            I::I64Add => self.binop(stack, BinaryOp::I64Add)?,
            I::I64Sub => self.binop(stack, BinaryOp::I64Sub)?,
            I::I64Mul => self.binop(stack, BinaryOp::I64Mul)?,
            I::I64DivS => self.binop(stack, BinaryOp::I64DivS)?,
            I::I64DivU => self.binop(stack, BinaryOp::I64DivU)?,
            I::I64RemS => self.binop(stack, BinaryOp::I64RemS)?,
            I::I64RemU => self.binop(stack, BinaryOp::I64RemU)?,
            I::I64And => self.binop(stack, BinaryOp::I64And)?,
            I::I64Or => self.binop(stack, BinaryOp::I64Or)?,
            I::I64Xor => self.binop(stack, BinaryOp::I64Xor)?,
            I::I64Shl => self.binop(stack, BinaryOp::I64Shl)?,
            I::I64ShrS => self.binop(stack, BinaryOp::I64ShrS)?,
            I::I64ShrU => self.binop(stack, BinaryOp::I64ShrU)?,
            I::I64Rotl => self.binop(stack, BinaryOp::I64Rotl)?,
            I::I64Rotr => self.binop(stack, BinaryOp::I64Rotr)?,
            I::F32Add => self.binop(stack, BinaryOp::F32Add)?,
            I::F32Sub => self.binop(stack, BinaryOp::F32Sub)?,
            I::F32Mul => self.binop(stack, BinaryOp::F32Mul)?,
            I::F32Div => self.binop(stack, BinaryOp::F32Div)?,
            I::F32Min => self.binop(stack, BinaryOp::F32Min)?,
            I::F32Max => self.binop(stack, BinaryOp::F32Max)?,
            I::F32Copysign => self.binop(stack, BinaryOp::F32Copysign)?,
            I::F64Add => self.binop(stack, BinaryOp::F64Add)?,
            I::F64Sub => self.binop(stack, BinaryOp::F64Sub)?,
            I::F64Mul => self.binop(stack, BinaryOp::F64Mul)?,
            I::F64Div => self.binop(stack, BinaryOp::F64Div)?,
            I::F64Min => self.binop(stack, BinaryOp::F64Min)?,
            I::F64Max => self.binop(stack, BinaryOp::F64Max)?,
            I::F64Copysign => self.binop(stack, BinaryOp::F64Copysign)?,

            I::I32WrapI64 => self.cvtop(stack, ConvertOp::I32WrapI64)?,
            I::I32TruncF32S => self.cvtop(stack, ConvertOp::I32TruncF32S)?,
            I::I32TruncF32U => self.cvtop(stack, ConvertOp::I32TruncF32U)?,
            I::I32TruncF64S => self.cvtop(stack, ConvertOp::I32TruncF64S)?,
            I::I32TruncF64U => self.cvtop(stack, ConvertOp::I32TruncF64U)?,
            I::I64ExtendI32S => self.cvtop(stack, ConvertOp::I64ExtendI32S)?,
            I::I64ExtendI32U => self.cvtop(stack, ConvertOp::I64ExtendI32U)?,
            I::I64TruncF32S => self.cvtop(stack, ConvertOp::I64TruncF32S)?,
            I::I64TruncF32U => self.cvtop(stack, ConvertOp::I64TruncF32U)?,
            I::I64TruncF64S => self.cvtop(stack, ConvertOp::I64TruncF64S)?,
            I::I64TruncF64U => self.cvtop(stack, ConvertOp::I64TruncF64U)?,
            I::F32ConvertI32S => self.cvtop(stack, ConvertOp::F32ConvertI32S)?,
            I::F32ConvertI32U => self.cvtop(stack, ConvertOp::F32ConvertI32U)?,
            I::F32ConvertI64S => self.cvtop(stack, ConvertOp::F32ConvertI64S)?,
            I::F32ConvertI64U => self.cvtop(stack, ConvertOp::F32ConvertI64U)?,
            I::F32DemoteF64 => self.cvtop(stack, ConvertOp::F32DemoteF64)?,
            I::F64ConvertI32S => self.cvtop(stack, ConvertOp::F64ConvertI32S)?,
            I::F64ConvertI32U => self.cvtop(stack, ConvertOp::F64ConvertI32U)?,
            I::F64ConvertI64S => self.cvtop(stack, ConvertOp::F64ConvertI64S)?,
            I::F64ConvertI64U => self.cvtop(stack, ConvertOp::F64ConvertI64U)?,
            I::F64PromoteF32 => self.cvtop(stack, ConvertOp::F64PromoteF32)?,
            I::I32ReinterpretF32 => self.cvtop(stack, ConvertOp::I32ReinterpretF32)?,
            I::I64ReinterpretF64 => self.cvtop(stack, ConvertOp::I64ReinterpretF64)?,
            I::F32ReinterpretI32 => self.cvtop(stack, ConvertOp::F32ReinterpretI32)?,
            I::F64ReinterpretI64 => self.cvtop(stack, ConvertOp::F64ReinterpretI64)?,
            I::I32TruncSatF32S => self.cvtop(stack, ConvertOp::I32TruncSatF32S)?,
            I::I32TruncSatF32U => self.cvtop(stack, ConvertOp::I32TruncSatF32U)?,
            I::I32TruncSatF64S => self.cvtop(stack, ConvertOp::I32TruncSatF64S)?,
            I::I32TruncSatF64U => self.cvtop(stack, ConvertOp::I32TruncSatF64U)?,
            I::I64TruncSatF32S => self.cvtop(stack, ConvertOp::I64TruncSatF32S)?,
            I::I64TruncSatF32U => self.cvtop(stack, ConvertOp::I64TruncSatF32U)?,
            I::I64TruncSatF64S => self.cvtop(stack, ConvertOp::I64TruncSatF64S)?,
            I::I64TruncSatF64U => self.cvtop(stack, ConvertOp::I64TruncSatF64U)?,
        }
        Ok(Flow::Next)
    }

    fn call(&mut self, stack: &mut Vec<E::Value>, addr: u32) -> Result<()> {
        let params = self.store.func(addr)?.ty().params.len();
        if stack.len() < params {
            return Err(ERR_ARITY);
        }
        let args = stack.split_off(stack.len() - params);
        let results = self.invoke(addr, args)?;
        stack.extend(results);
        Ok(())
    }

    fn unop(&mut self, stack: &mut Vec<E::Value>, op: UnaryOp) -> Result<()> {
        let a = pop(stack)?;
        let result = self.eval.unary(op, a)?;
        stack.push(result);
        Ok(())
    }

    fn binop(&mut self, stack: &mut Vec<E::Value>, op: BinaryOp) -> Result<()> {
        let b = pop(stack)?;
        let a = pop(stack)?;
        let result = self.eval.binary(op, a, b)?;
        stack.push(result);
        Ok(())
    }

    fn testop(&mut self, stack: &mut Vec<E::Value>, op: TestOp) -> Result<()> {
        let a = pop(stack)?;
        let result = self.eval.test(op, a)?;
        stack.push(result);
        Ok(())
    }

    fn cmpop(&mut self, stack: &mut Vec<E::Value>, op: CompareOp) -> Result<()> {
        let b = pop(stack)?;
        let a = pop(stack)?;
        let result = self.eval.compare(op, a, b)?;
        stack.push(result);
        Ok(())
    }

    fn cvtop(&mut self, stack: &mut Vec<E::Value>, op: ConvertOp) -> Result<()> {
        let a = pop(stack)?;
        let result = self.eval.convert(op, a)?;
        stack.push(result);
        Ok(())
    }

    fn load(
        &mut self,
        frame: &Frame<E::Value>,
        stack: &mut Vec<E::Value>,
        memarg: &MemArg,
        width: usize,
        decode: impl FnOnce(&[u8]) -> Value,
    ) -> Result<()> {
        let base = self.concrete_u32(&pop(stack)?)?;
        let addr = self.memory_addr(frame)?;
        // Effective addresses are computed in 64 bits; base + offset fits
        // in 33 bits and cannot wrap.
        let effective = u64::from(base) + u64::from(memarg.offset);
        let bytes = self.store.memory(addr)?.read(effective, width)?;
        let value = decode(bytes);
        let value = self.eval.constant(value);
        stack.push(value);
        Ok(())
    }

    fn storeop(
        &mut self,
        frame: &Frame<E::Value>,
        stack: &mut Vec<E::Value>,
        memarg: &MemArg,
        encode: impl FnOnce(&Value) -> Result<Vec<u8>>,
    ) -> Result<()> {
        let value = self.concrete(&pop(stack)?)?;
        let base = self.concrete_u32(&pop(stack)?)?;
        let addr = self.memory_addr(frame)?;
        let effective = u64::from(base) + u64::from(memarg.offset);
        let bytes = encode(&value)?;
        self.store.memory_mut(addr)?.write(effective, &bytes)
    }

    /// Projects a value to a concrete one; symbolic values in concrete
    /// positions (addresses, table entries) are unsupported.
    fn concrete(&self, value: &E::Value) -> Result<Value> {
        self.eval.concrete(value).ok_or(ERR_SYMBOLIC)
    }

    fn concrete_u32(&self, value: &E::Value) -> Result<u32> {
        self.concrete(value)?.as_u32()
    }

    fn func_addr(&self, frame: &Frame<E::Value>, index: u32) -> Result<u32> {
        let instance = self.store.instance(frame.instance)?;
        instance
            .funcs
            .get(index as usize)
            .copied()
            .ok_or(ERR_ARITY)
    }

    fn table_addr(&self, frame: &Frame<E::Value>, index: u32) -> Result<u32> {
        let instance = self.store.instance(frame.instance)?;
        instance
            .tables
            .get(index as usize)
            .copied()
            .ok_or_else(|| Trap::OutOfBoundsTableAccess.into())
    }

    fn memory_addr(&self, frame: &Frame<E::Value>) -> Result<u32> {
        let instance = self.store.instance(frame.instance)?;
        instance
            .memories
            .first()
            .copied()
            .ok_or_else(|| Trap::OutOfBoundsMemoryAccess.into())
    }

    fn global_addr(&self, frame: &Frame<E::Value>, index: u32) -> Result<u32> {
        let instance = self.store.instance(frame.instance)?;
        instance
            .globals
            .get(index as usize)
            .copied()
            .ok_or(ERR_ARITY)
    }

    fn elem_addr(&self, frame: &Frame<E::Value>, index: u32) -> Result<u32> {
        let instance = self.store.instance(frame.instance)?;
        instance
            .elems
            .get(index as usize)
            .copied()
            .ok_or_else(|| Trap::OutOfBoundsTableAccess.into())
    }

    fn data_addr(&self, frame: &Frame<E::Value>, index: u32) -> Result<u32> {
        let instance = self.store.instance(frame.instance)?;
        instance
            .datas
            .get(index as usize)
            .copied()
            .ok_or_else(|| Trap::OutOfBoundsMemoryAccess.into())
    }
}

fn pop<V>(stack: &mut Vec<V>) -> Result<V> {
    stack
        .pop()
        .ok_or(Error::runtime(codes::INVALID_ARGUMENT, "operand stack underflow"))
}
