// WEX - wex-rewrite
// Module: WEX Rewriter
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The rewriter: identifier resolution, block-type normalisation, and the
//! static checks that belong before type checking.

use std::collections::{HashMap, HashSet};

use log::debug;

use wex_error::{codes, Error, Result};
use wex_format::module::{
    DataMode, DataSegment, ElementMode, ElementSegment, Export, ExternKind, Function, Global,
    ImportDesc, Module, TypeDef,
};
use wex_format::types::{BlockType, FuncType, ItemRef, ValueType};
use wex_format::{Instruction, Label, MemArg};

use crate::collections::ModuleIndex;

/// Maximum number of 64 KiB pages a memory may declare.
const MAX_MEMORY_PAGES: u32 = 65536;

const ERR_UNKNOWN_LABEL: Error = Error::validation(codes::UNKNOWN_LABEL, "unknown label");
const ERR_UNKNOWN_LOCAL: Error = Error::validation(codes::UNKNOWN_LOCAL, "unknown local");
const ERR_UNKNOWN_MEMORY_0: Error = Error::validation(codes::UNKNOWN_MEMORY, "unknown memory 0");
const ERR_CONST_REQUIRED: Error = Error::validation(
    codes::CONSTANT_EXPRESSION_REQUIRED,
    "constant expression required",
);
const ERR_TYPE_MISMATCH: Error = Error::validation(codes::TYPE_MISMATCH, "type mismatch");
const ERR_ALIGNMENT: Error = Error::validation(
    codes::ALIGNMENT_TOO_LARGE,
    "alignment must not be larger than natural",
);

/// Rewrites a module into fully indexed form.
///
/// Returns the fresh module together with the per-kind named collections
/// the grouper assigned. The input is not modified.
pub fn rewrite_module(module: &Module) -> Result<(Module, ModuleIndex)> {
    let mut rewriter = Rewriter {
        index: ModuleIndex::group(module)?,
        types: module.types.clone(),
        data_count_present: module.data_count.is_some(),
    };
    let out = rewriter.run(module)?;
    debug!(
        "rewrote module: {} funcs, {} globals, {} segments",
        out.funcs.len(),
        out.globals.len(),
        out.elems.len() + out.datas.len(),
    );
    Ok((out, rewriter.index))
}

struct Rewriter {
    index: ModuleIndex,
    /// Output type list; inline block signatures may append to it.
    types: Vec<TypeDef>,
    data_count_present: bool,
}

/// The local-scope map of one function: parameters and locals share a
/// single 0-based index space.
struct Scope {
    names: HashMap<Box<str>, u32>,
    count: u32,
}

impl Scope {
    fn resolve(&self, item: &ItemRef) -> Result<u32> {
        match item {
            ItemRef::Index(index) if *index < self.count => Ok(*index),
            ItemRef::Index(_) => Err(ERR_UNKNOWN_LOCAL),
            ItemRef::Named(name) => self
                .names
                .get(name.as_ref())
                .copied()
                .ok_or(ERR_UNKNOWN_LOCAL),
        }
    }
}

impl Rewriter {
    fn run(&mut self, module: &Module) -> Result<Module> {
        self.check_limits()?;

        let globals = module
            .globals
            .iter()
            .map(|global| self.rewrite_global(global))
            .collect::<Result<Vec<_>>>()?;

        let funcs = module
            .funcs
            .iter()
            .map(|func| self.rewrite_func(func))
            .collect::<Result<Vec<_>>>()?;

        let elems = module
            .elems
            .iter()
            .map(|elem| self.rewrite_elem(elem))
            .collect::<Result<Vec<_>>>()?;

        let datas = module
            .datas
            .iter()
            .map(|data| self.rewrite_data(data))
            .collect::<Result<Vec<_>>>()?;

        let exports = self.rewrite_exports(&module.exports)?;
        let start = module
            .start
            .as_ref()
            .map(|item| self.rewrite_start(item))
            .transpose()?;

        let imports = module
            .imports
            .iter()
            .map(|import| {
                let mut import = import.clone();
                let resolved = match &import.desc {
                    ImportDesc::Func(ty) => Some(self.index.types.resolve(ty)?),
                    _ => None,
                };
                if let Some(index) = resolved {
                    import.desc = ImportDesc::Func(ItemRef::Index(index));
                }
                Ok(import)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Module {
            types: std::mem::take(&mut self.types),
            imports,
            funcs,
            tables: module.tables.clone(),
            memories: module.memories.clone(),
            globals,
            exports,
            start,
            elems,
            datas,
            data_count: module.data_count,
            customs: module.customs.clone(),
        })
    }

    /// Memory and table limits: `min <= max`, memories capped at 2^16
    /// pages.
    fn check_limits(&self) -> Result<()> {
        for entry in self.index.memories.entries() {
            let limits = entry.ty().limits;
            if limits.min > MAX_MEMORY_PAGES || limits.max.is_some_and(|m| m > MAX_MEMORY_PAGES) {
                return Err(Error::validation(
                    codes::LIMITS_TOO_LARGE,
                    "memory size must be at most 65536 pages",
                ));
            }
            if !limits.is_ordered() {
                return Err(Error::validation(
                    codes::LIMITS_ORDER,
                    "size minimum must not be greater than maximum",
                ));
            }
        }
        for entry in self.index.tables.entries() {
            if !entry.ty().limits.is_ordered() {
                return Err(Error::validation(
                    codes::LIMITS_ORDER,
                    "size minimum must not be greater than maximum",
                ));
            }
        }
        Ok(())
    }

    fn rewrite_global(&mut self, global: &Global) -> Result<Global> {
        Ok(Global {
            name: global.name.clone(),
            ty: global.ty,
            init: self.rewrite_const_expr(&global.init, global.ty.value_type)?,
        })
    }

    fn rewrite_func(&mut self, func: &Function) -> Result<Function> {
        let ty = self.index.types.resolve(&func.ty)?;
        let params = self.index.types.get(ty)?.ty().params.len() as u32;

        let mut scope = Scope {
            names: HashMap::new(),
            count: params + func.locals.len() as u32,
        };
        for (i, name) in func.param_names.iter().enumerate() {
            bind_local(&mut scope, name, i as u32)?;
        }
        for (i, local) in func.locals.iter().enumerate() {
            bind_local(&mut scope, &local.name, params + i as u32)?;
        }

        let mut labels: Vec<Label> = vec![None]; // the function's implicit target
        let body = self.rewrite_body(&func.body, &scope, &mut labels)?;

        Ok(Function {
            name: func.name.clone(),
            ty: ItemRef::Index(ty),
            param_names: func.param_names.clone(),
            locals: func.locals.clone(),
            body,
        })
    }

    fn rewrite_body(
        &mut self,
        body: &[Instruction],
        scope: &Scope,
        labels: &mut Vec<Label>,
    ) -> Result<Vec<Instruction>> {
        body.iter()
            .map(|instr| self.rewrite_instr(instr, scope, labels))
            .collect()
    }

    #[allow(clippy::too_many_lines)]
    fn rewrite_instr(
        &mut self,
        instr: &Instruction,
        scope: &Scope,
        labels: &mut Vec<Label>,
    ) -> Result<Instruction> {
        use Instruction as I;
        let rewritten = match instr {
            I::Block(label, bt, body) => {
                let bt = self.normalize_block_type(bt)?;
                labels.push(label.clone());
                let body = self.rewrite_body(body, scope, labels)?;
                labels.pop();
                I::Block(label.clone(), bt, body)
            }
            I::Loop(label, bt, body) => {
                let bt = self.normalize_block_type(bt)?;
                labels.push(label.clone());
                let body = self.rewrite_body(body, scope, labels)?;
                labels.pop();
                I::Loop(label.clone(), bt, body)
            }
            I::If(label, bt, then, otherwise) => {
                let bt = self.normalize_block_type(bt)?;
                labels.push(label.clone());
                let then = self.rewrite_body(then, scope, labels)?;
                let otherwise = self.rewrite_body(otherwise, scope, labels)?;
                labels.pop();
                I::If(label.clone(), bt, then, otherwise)
            }
            I::Br(label) => I::Br(resolve_label(labels, label)?),
            I::BrIf(label) => I::BrIf(resolve_label(labels, label)?),
            I::BrTable(table, default) => {
                let table = table
                    .iter()
                    .map(|label| resolve_label(labels, label))
                    .collect::<Result<Vec<_>>>()?;
                I::BrTable(table, resolve_label(labels, default)?)
            }
            I::Call(func) => I::Call(ItemRef::Index(self.index.funcs.resolve(func)?)),
            I::CallIndirect(ty, table) => I::CallIndirect(
                ItemRef::Index(self.index.types.resolve(ty)?),
                ItemRef::Index(self.index.tables.resolve(table)?),
            ),
            I::RefFunc(func) => I::RefFunc(ItemRef::Index(self.index.funcs.resolve(func)?)),

            I::LocalGet(local) => I::LocalGet(ItemRef::Index(scope.resolve(local)?)),
            I::LocalSet(local) => I::LocalSet(ItemRef::Index(scope.resolve(local)?)),
            I::LocalTee(local) => I::LocalTee(ItemRef::Index(scope.resolve(local)?)),
            I::GlobalGet(global) => {
                I::GlobalGet(ItemRef::Index(self.index.globals.resolve(global)?))
            }
            I::GlobalSet(global) => {
                let index = self.index.globals.resolve(global)?;
                if !self.index.globals.get(index)?.ty().mutable {
                    return Err(Error::validation(
                        codes::GLOBAL_IS_IMMUTABLE,
                        "global is immutable",
                    ));
                }
                I::GlobalSet(ItemRef::Index(index))
            }

            I::TableGet(table) => I::TableGet(ItemRef::Index(self.index.tables.resolve(table)?)),
            I::TableSet(table) => I::TableSet(ItemRef::Index(self.index.tables.resolve(table)?)),
            I::TableSize(table) => I::TableSize(ItemRef::Index(self.index.tables.resolve(table)?)),
            I::TableGrow(table) => I::TableGrow(ItemRef::Index(self.index.tables.resolve(table)?)),
            I::TableFill(table) => I::TableFill(ItemRef::Index(self.index.tables.resolve(table)?)),
            I::TableCopy(dst, src) => I::TableCopy(
                ItemRef::Index(self.index.tables.resolve(dst)?),
                ItemRef::Index(self.index.tables.resolve(src)?),
            ),
            I::TableInit(elem, table) => I::TableInit(
                ItemRef::Index(self.index.elems.resolve(elem)?),
                ItemRef::Index(self.index.tables.resolve(table)?),
            ),
            I::ElemDrop(elem) => I::ElemDrop(ItemRef::Index(self.index.elems.resolve(elem)?)),

            I::I32Load(m) => I::I32Load(self.memarg(m, 4)?),
            I::I64Load(m) => I::I64Load(self.memarg(m, 8)?),
            I::F32Load(m) => I::F32Load(self.memarg(m, 4)?),
            I::F64Load(m) => I::F64Load(self.memarg(m, 8)?),
            I::I32Load8S(m) => I::I32Load8S(self.memarg(m, 1)?),
            I::I32Load8U(m) => I::I32Load8U(self.memarg(m, 1)?),
            I::I32Load16S(m) => I::I32Load16S(self.memarg(m, 2)?),
            I::I32Load16U(m) => I::I32Load16U(self.memarg(m, 2)?),
            I::I64Load8S(m) => I::I64Load8S(self.memarg(m, 1)?),
            I::I64Load8U(m) => I::I64Load8U(self.memarg(m, 1)?),
            I::I64Load16S(m) => I::I64Load16S(self.memarg(m, 2)?),
            I::I64Load16U(m) => I::I64Load16U(self.memarg(m, 2)?),
            I::I64Load32S(m) => I::I64Load32S(self.memarg(m, 4)?),
            I::I64Load32U(m) => I::I64Load32U(self.memarg(m, 4)?),
            I::I32Store(m) => I::I32Store(self.memarg(m, 4)?),
            I::I64Store(m) => I::I64Store(self.memarg(m, 8)?),
            I::F32Store(m) => I::F32Store(self.memarg(m, 4)?),
            I::F64Store(m) => I::F64Store(self.memarg(m, 8)?),
            I::I32Store8(m) => I::I32Store8(self.memarg(m, 1)?),
            I::I32Store16(m) => I::I32Store16(self.memarg(m, 2)?),
            I::I64Store8(m) => I::I64Store8(self.memarg(m, 1)?),
            I::I64Store16(m) => I::I64Store16(self.memarg(m, 2)?),
            I::I64Store32(m) => I::I64Store32(self.memarg(m, 4)?),

            I::MemorySize | I::MemoryGrow | I::MemoryCopy | I::MemoryFill => {
                self.require_memory()?;
                instr.clone()
            }
            I::MemoryInit(data) => {
                self.require_memory()?;
                self.require_data_count()?;
                I::MemoryInit(ItemRef::Index(self.index.datas.resolve(data)?))
            }
            I::DataDrop(data) => {
                self.require_data_count()?;
                I::DataDrop(ItemRef::Index(self.index.datas.resolve(data)?))
            }

            other => other.clone(),
        };
        Ok(rewritten)
    }

    fn memarg(&self, memarg: &MemArg, width: u32) -> Result<MemArg> {
        self.require_memory()?;
        // 2^align must not exceed the access width in bytes.
        if memarg.align > 31 || (1u32 << memarg.align) > width {
            return Err(ERR_ALIGNMENT);
        }
        Ok(*memarg)
    }

    fn require_memory(&self) -> Result<()> {
        if self.index.memories.is_empty() {
            return Err(ERR_UNKNOWN_MEMORY_0);
        }
        Ok(())
    }

    fn require_data_count(&self) -> Result<()> {
        if self.data_count_present {
            Ok(())
        } else {
            Err(Error::validation(
                codes::DATA_COUNT_REQUIRED,
                "data count section required",
            ))
        }
    }

    /// Resolves a block type to `Empty`, `Value`, or `Type` with a checked
    /// index. An inline signature with a declared-type hint must agree
    /// with the declaration exactly; one without a hint is matched against
    /// the declared types and appended when absent.
    fn normalize_block_type(&mut self, bt: &BlockType) -> Result<BlockType> {
        match bt {
            BlockType::Empty => Ok(BlockType::Empty),
            BlockType::Value(ty) => Ok(BlockType::Value(*ty)),
            BlockType::Type(item) => {
                Ok(BlockType::Type(ItemRef::Index(self.index.types.resolve(item)?)))
            }
            BlockType::Inline(sig) => {
                if let Some(item) = &sig.index {
                    let index = self.index.types.resolve(item)?;
                    let declared = self.index.types.get(index)?.ty();
                    let annotated = !sig.params.is_empty() || !sig.results.is_empty();
                    if annotated
                        && (declared.params != sig.params || declared.results != sig.results)
                    {
                        return Err(Error::validation(
                            codes::INLINE_FUNCTION_TYPE,
                            "inline function type",
                        ));
                    }
                    return Ok(BlockType::Type(ItemRef::Index(index)));
                }
                if sig.params.is_empty() && sig.results.is_empty() {
                    return Ok(BlockType::Empty);
                }
                if sig.params.is_empty() && sig.results.len() == 1 {
                    return Ok(BlockType::Value(sig.results[0]));
                }
                let ty = FuncType::new(sig.params.clone(), sig.results.clone());
                let index = self.find_or_declare_type(&ty)?;
                Ok(BlockType::Type(ItemRef::Index(index)))
            }
        }
    }

    fn find_or_declare_type(&mut self, ty: &FuncType) -> Result<u32> {
        if let Some(index) = self.types.iter().position(|def| &def.ty == ty) {
            return Ok(index as u32);
        }
        self.types.push(TypeDef {
            name: None,
            ty: ty.clone(),
        });
        self.index.types.push_local(None, ty.clone())
    }

    fn rewrite_elem(&mut self, elem: &ElementSegment) -> Result<ElementSegment> {
        let expected = ValueType::from(elem.ty);
        let items = elem
            .items
            .iter()
            .map(|item| self.rewrite_const_expr(item, expected))
            .collect::<Result<Vec<_>>>()?;
        let mode = match &elem.mode {
            ElementMode::Passive => ElementMode::Passive,
            ElementMode::Declarative => ElementMode::Declarative,
            ElementMode::Active { table, offset } => ElementMode::Active {
                table: ItemRef::Index(self.index.tables.resolve(table)?),
                offset: self.rewrite_const_expr(offset, ValueType::I32)?,
            },
        };
        Ok(ElementSegment {
            name: elem.name.clone(),
            ty: elem.ty,
            items,
            mode,
        })
    }

    fn rewrite_data(&mut self, data: &DataSegment) -> Result<DataSegment> {
        let mode = match &data.mode {
            DataMode::Passive => DataMode::Passive,
            DataMode::Active { memory, offset } => DataMode::Active {
                memory: ItemRef::Index(self.index.memories.resolve(memory)?),
                offset: self.rewrite_const_expr(offset, ValueType::I32)?,
            },
        };
        Ok(DataSegment {
            name: data.name.clone(),
            init: data.init.clone(),
            mode,
        })
    }

    /// Validates and resolves a constant expression of a required type.
    ///
    /// Permitted instructions are numeric constants, `ref.null`,
    /// `ref.func`, and `global.get` of an imported immutable global.
    fn rewrite_const_expr(&mut self, expr: &[Instruction], expected: ValueType) -> Result<Vec<Instruction>> {
        if expr.len() != 1 {
            return Err(if expr.iter().all(Instruction::is_const_shape) {
                ERR_TYPE_MISMATCH
            } else {
                ERR_CONST_REQUIRED
            });
        }
        let (instr, actual) = match &expr[0] {
            Instruction::I32Const(v) => (Instruction::I32Const(*v), ValueType::I32),
            Instruction::I64Const(v) => (Instruction::I64Const(*v), ValueType::I64),
            Instruction::F32Const(v) => (Instruction::F32Const(*v), ValueType::F32),
            Instruction::F64Const(v) => (Instruction::F64Const(*v), ValueType::F64),
            Instruction::RefNull(ty) => (Instruction::RefNull(*ty), ValueType::from(*ty)),
            Instruction::RefFunc(func) => (
                Instruction::RefFunc(ItemRef::Index(self.index.funcs.resolve(func)?)),
                ValueType::FuncRef,
            ),
            Instruction::GlobalGet(global) => {
                let index = self.index.globals.resolve(global)?;
                let entry = self.index.globals.get(index)?;
                if !entry.is_imported() {
                    // Only the imported prefix of the global index space is
                    // in scope inside initializers.
                    return Err(Error::validation(codes::UNKNOWN_GLOBAL, "unknown global"));
                }
                let ty = entry.ty();
                if ty.mutable {
                    return Err(ERR_CONST_REQUIRED);
                }
                (
                    Instruction::GlobalGet(ItemRef::Index(index)),
                    ty.value_type,
                )
            }
            _ => return Err(ERR_CONST_REQUIRED),
        };
        if actual != expected {
            return Err(ERR_TYPE_MISMATCH);
        }
        Ok(vec![instr])
    }

    fn rewrite_exports(&mut self, exports: &[Export]) -> Result<Vec<Export>> {
        let mut seen: HashSet<&str> = HashSet::new();
        exports
            .iter()
            .map(|export| {
                if !seen.insert(&export.name) {
                    return Err(Error::validation(
                        codes::DUPLICATE_NAME,
                        "duplicate export name",
                    ));
                }
                let index = match export.kind {
                    ExternKind::Func => self.index.funcs.resolve(&export.item)?,
                    ExternKind::Table => self.index.tables.resolve(&export.item)?,
                    ExternKind::Memory => self.index.memories.resolve(&export.item)?,
                    ExternKind::Global => self.index.globals.resolve(&export.item)?,
                };
                Ok(Export {
                    name: export.name.clone(),
                    kind: export.kind,
                    item: ItemRef::Index(index),
                })
            })
            .collect()
    }

    /// The start function must have signature `[] -> []`.
    fn rewrite_start(&mut self, item: &ItemRef) -> Result<ItemRef> {
        let index = self.index.funcs.resolve(item)?;
        let ty = self.index.func_type(index)?;
        if !ty.params.is_empty() || !ty.results.is_empty() {
            return Err(Error::validation(codes::START_FUNCTION, "start function"));
        }
        Ok(ItemRef::Index(index))
    }
}

fn bind_local(scope: &mut Scope, name: &Option<Box<str>>, index: u32) -> Result<()> {
    if let Some(name) = name {
        if scope.names.insert(name.clone(), index).is_some() {
            return Err(Error::validation(codes::DUPLICATE_NAME, "duplicate local"));
        }
    }
    Ok(())
}

/// Resolves a branch target against the label stack.
///
/// The stack grows innermost-last and carries the function's implicit
/// target at the bottom. `br $id` searches innermost-first for a matching
/// label; an integer target is validated against the stack depth.
fn resolve_label(labels: &[Label], item: &ItemRef) -> Result<ItemRef> {
    match item {
        ItemRef::Index(depth) => {
            if (*depth as usize) < labels.len() {
                Ok(ItemRef::Index(*depth))
            } else {
                Err(ERR_UNKNOWN_LABEL)
            }
        }
        ItemRef::Named(name) => {
            let position = labels
                .iter()
                .rev()
                .position(|label| label.as_deref() == Some(name.as_ref()))
                .ok_or(ERR_UNKNOWN_LABEL)?;
            Ok(ItemRef::Index(position as u32))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wex_format::module::{Import, ImportDesc, Local, Memory as MemoryDef, TypeDef};
    use wex_format::types::{GlobalType, InlineSignature, Limits, MemoryType};

    fn func_module(body: Vec<Instruction>) -> Module {
        Module {
            types: vec![TypeDef {
                name: None,
                ty: FuncType::default(),
            }],
            funcs: vec![Function {
                name: Some("f".into()),
                ty: ItemRef::Index(0),
                param_names: Vec::new(),
                locals: vec![Local {
                    name: Some("x".into()),
                    ty: ValueType::I32,
                }],
                body,
            }],
            ..Module::default()
        }
    }

    #[test]
    fn resolves_local_and_call_names() {
        let module = func_module(vec![
            Instruction::LocalGet(ItemRef::named("x")),
            Instruction::Drop,
            Instruction::Call(ItemRef::named("f")),
        ]);
        let (out, _) = rewrite_module(&module).unwrap();
        assert_eq!(
            out.funcs[0].body,
            vec![
                Instruction::LocalGet(ItemRef::Index(0)),
                Instruction::Drop,
                Instruction::Call(ItemRef::Index(0)),
            ]
        );
    }

    #[test]
    fn resolves_labels_innermost_first() {
        let module = func_module(vec![Instruction::Block(
            Some("out".into()),
            BlockType::Empty,
            vec![Instruction::Block(
                Some("in".into()),
                BlockType::Empty,
                vec![
                    Instruction::Br(ItemRef::named("in")),
                    Instruction::Br(ItemRef::named("out")),
                ],
            )],
        )]);
        let (out, _) = rewrite_module(&module).unwrap();
        let Instruction::Block(_, _, outer) = &out.funcs[0].body[0] else {
            panic!("expected block");
        };
        let Instruction::Block(_, _, inner) = &outer[0] else {
            panic!("expected block");
        };
        assert_eq!(inner[0], Instruction::Br(ItemRef::Index(0)));
        assert_eq!(inner[1], Instruction::Br(ItemRef::Index(1)));
    }

    #[test]
    fn branch_depth_past_function_fails() {
        let module = func_module(vec![Instruction::Block(
            None,
            BlockType::Empty,
            vec![Instruction::Br(ItemRef::Index(3))],
        )]);
        let err = rewrite_module(&module).unwrap_err();
        assert_eq!(err.message, "unknown label");
    }

    #[test]
    fn branch_to_function_boundary_is_allowed() {
        // br 1 from inside one block targets the function itself.
        let module = func_module(vec![Instruction::Block(
            None,
            BlockType::Empty,
            vec![Instruction::Br(ItemRef::Index(1))],
        )]);
        assert!(rewrite_module(&module).is_ok());
    }

    #[test]
    fn memory_access_without_memory_fails() {
        let module = func_module(vec![
            Instruction::I32Const(0),
            Instruction::I32Load(MemArg { align: 0, offset: 0 }),
            Instruction::Drop,
        ]);
        let err = rewrite_module(&module).unwrap_err();
        assert_eq!(err.message, "unknown memory 0");
    }

    #[test]
    fn oversized_alignment_fails() {
        let mut module = func_module(vec![
            Instruction::I32Const(0),
            Instruction::I32Load(MemArg { align: 3, offset: 0 }),
            Instruction::Drop,
        ]);
        module.memories.push(MemoryDef {
            name: None,
            ty: MemoryType {
                limits: Limits { min: 1, max: None },
            },
        });
        let err = rewrite_module(&module).unwrap_err();
        assert_eq!(err.message, "alignment must not be larger than natural");
    }

    #[test]
    fn natural_alignment_is_allowed() {
        let mut module = func_module(vec![
            Instruction::I32Const(0),
            Instruction::I32Load(MemArg { align: 2, offset: 0 }),
            Instruction::Drop,
        ]);
        module.memories.push(MemoryDef {
            name: None,
            ty: MemoryType {
                limits: Limits { min: 1, max: None },
            },
        });
        assert!(rewrite_module(&module).is_ok());
    }

    #[test]
    fn global_set_immutable_fails() {
        let mut module = func_module(vec![
            Instruction::I32Const(1),
            Instruction::GlobalSet(ItemRef::Index(0)),
        ]);
        module.globals.push(Global {
            name: None,
            ty: GlobalType {
                value_type: ValueType::I32,
                mutable: false,
            },
            init: vec![Instruction::I32Const(0)],
        });
        let err = rewrite_module(&module).unwrap_err();
        assert_eq!(err.message, "global is immutable");
    }

    #[test]
    fn global_init_requires_const_expr() {
        let module = Module {
            globals: vec![Global {
                name: None,
                ty: GlobalType {
                    value_type: ValueType::I32,
                    mutable: false,
                },
                init: vec![Instruction::I32Add],
            }],
            ..Module::default()
        };
        let err = rewrite_module(&module).unwrap_err();
        assert_eq!(err.message, "constant expression required");
    }

    #[test]
    fn global_init_may_read_imported_immutable_global() {
        let module = Module {
            imports: vec![Import {
                module: "env".into(),
                item: "base".into(),
                name: Some("base".into()),
                desc: ImportDesc::Global(GlobalType {
                    value_type: ValueType::I32,
                    mutable: false,
                }),
            }],
            globals: vec![Global {
                name: None,
                ty: GlobalType {
                    value_type: ValueType::I32,
                    mutable: false,
                },
                init: vec![Instruction::GlobalGet(ItemRef::named("base"))],
            }],
            ..Module::default()
        };
        let (out, _) = rewrite_module(&module).unwrap();
        assert_eq!(
            out.globals[0].init,
            vec![Instruction::GlobalGet(ItemRef::Index(0))]
        );
    }

    #[test]
    fn global_init_reading_local_global_fails() {
        let module = Module {
            globals: vec![
                Global {
                    name: Some("a".into()),
                    ty: GlobalType {
                        value_type: ValueType::I32,
                        mutable: false,
                    },
                    init: vec![Instruction::I32Const(0)],
                },
                Global {
                    name: None,
                    ty: GlobalType {
                        value_type: ValueType::I32,
                        mutable: false,
                    },
                    init: vec![Instruction::GlobalGet(ItemRef::named("a"))],
                },
            ],
            ..Module::default()
        };
        let err = rewrite_module(&module).unwrap_err();
        assert_eq!(err.message, "unknown global");
    }

    #[test]
    fn start_function_signature_is_checked() {
        let mut module = Module {
            types: vec![TypeDef {
                name: None,
                ty: FuncType::new(vec![ValueType::I32], Vec::new()),
            }],
            funcs: vec![Function {
                name: None,
                ty: ItemRef::Index(0),
                param_names: Vec::new(),
                locals: Vec::new(),
                body: Vec::new(),
            }],
            ..Module::default()
        };
        module.start = Some(ItemRef::Index(0));
        let err = rewrite_module(&module).unwrap_err();
        assert_eq!(err.message, "start function");
    }

    #[test]
    fn inline_block_signature_must_match_hint() {
        let module = func_module(vec![Instruction::Block(
            None,
            BlockType::Inline(Box::new(InlineSignature {
                index: Some(ItemRef::Index(0)),
                params: Vec::new(),
                results: vec![ValueType::I32],
            })),
            vec![Instruction::I32Const(0)],
        )]);
        // Type 0 is [] -> [], the inline annotation says [] -> [i32].
        let err = rewrite_module(&module).unwrap_err();
        assert_eq!(err.message, "inline function type");
    }

    #[test]
    fn inline_block_signature_declares_missing_type() {
        let module = func_module(vec![
            Instruction::I32Const(1),
            Instruction::Block(
                None,
                BlockType::Inline(Box::new(InlineSignature {
                    index: None,
                    params: vec![ValueType::I32],
                    results: vec![ValueType::I32],
                })),
                vec![],
            ),
            Instruction::Drop,
        ]);
        let (out, index) = rewrite_module(&module).unwrap();
        assert_eq!(out.types.len(), 2);
        assert_eq!(index.types.len(), 2);
        let Instruction::Block(_, BlockType::Type(item), _) = &out.funcs[0].body[1] else {
            panic!("expected resolved block type");
        };
        assert_eq!(item.index(), 1);
    }

    #[test]
    fn memory_over_page_limit_fails() {
        let module = Module {
            memories: vec![MemoryDef {
                name: None,
                ty: MemoryType {
                    limits: Limits {
                        min: 65537,
                        max: None,
                    },
                },
            }],
            ..Module::default()
        };
        let err = rewrite_module(&module).unwrap_err();
        assert_eq!(err.message, "memory size must be at most 65536 pages");
    }

    #[test]
    fn data_drop_requires_data_count_section() {
        let mut module = func_module(vec![Instruction::DataDrop(ItemRef::Index(0))]);
        module.datas.push(DataSegment {
            name: None,
            init: vec![1],
            mode: DataMode::Passive,
        });
        let err = rewrite_module(&module).unwrap_err();
        assert_eq!(err.message, "data count section required");

        module.data_count = Some(1);
        assert!(rewrite_module(&module).is_ok());
    }
}
