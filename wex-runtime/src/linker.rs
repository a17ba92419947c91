// WEX - wex-runtime
// Module: WEX Linker
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Import resolution and module instantiation.
//!
//! Given already-validated modules and a registry of named instances, the
//! linker resolves each import against the matching export, allocates
//! local memories, tables, and globals, applies active data and element
//! segments (after all allocations, before the start function, in
//! declaration order), retains passive segments, and finally invokes the
//! start function. A trap during segment application or start becomes
//! the link result.

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use wex_error::{codes, Error, Result};
use wex_format::module::{
    DataMode, ElementMode, ExternKind, ImportDesc, Module,
};
use wex_format::types::Limits;
use wex_format::Instruction;
use wex_rewrite::ModuleIndex;

use crate::config::{ExecConfig, ExecStats};
use crate::eval::Evaluator;
use crate::interp::Interpreter;
use crate::memory::Memory;
use crate::store::{ExternVal, FuncInst, GlobalInst, Instance, Store};
use crate::table::Table;
use crate::values::Value;

const ERR_UNKNOWN_IMPORT: Error = Error::link(codes::UNKNOWN_IMPORT, "unknown import");
const ERR_INCOMPATIBLE: Error =
    Error::link(codes::INCOMPATIBLE_IMPORT_TYPE, "incompatible import type");

/// Named instances importable by other modules.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    instances: HashMap<String, usize>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instance under a module name. Re-registration under
    /// the same name shadows the earlier instance.
    pub fn register(&mut self, name: &str, instance: usize) {
        self.instances.insert(name.to_string(), instance);
    }

    /// Looks up a registered instance.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.instances.get(name).copied()
    }
}

/// Instantiates a rewritten, validated module.
#[allow(clippy::too_many_lines)]
pub(crate) fn instantiate<E: Evaluator>(
    store: &mut Store<E>,
    eval: &mut E,
    config: &ExecConfig,
    stats: &mut ExecStats,
    registry: &Registry,
    module: &Module,
    index: &ModuleIndex,
) -> Result<usize> {
    let instance_idx = store.instances.len();
    let mut inst = Instance {
        types: module.types.iter().map(|def| def.ty.clone()).collect(),
        ..Instance::default()
    };

    // 1. Resolve imports against the registry.
    for import in &module.imports {
        let provider = registry
            .lookup(&import.module)
            .ok_or(ERR_UNKNOWN_IMPORT)?;
        let export = *store
            .instance(provider)?
            .exports
            .get(&import.item)
            .ok_or(ERR_UNKNOWN_IMPORT)?;
        match (&import.desc, export) {
            (ImportDesc::Func(ty), ExternVal::Func(addr)) => {
                let declared = &inst.types[ty.index() as usize];
                if store.func(addr)?.ty() != declared {
                    return Err(ERR_INCOMPATIBLE);
                }
                inst.funcs.push(addr);
            }
            (ImportDesc::Table(ty), ExternVal::Table(addr)) => {
                let actual = store.table(addr)?.ty();
                if actual.element != ty.element
                    || !limits_match(
                        Limits {
                            min: store.table(addr)?.size(),
                            max: actual.limits.max,
                        },
                        ty.limits,
                    )
                {
                    return Err(ERR_INCOMPATIBLE);
                }
                inst.tables.push(addr);
            }
            (ImportDesc::Memory(ty), ExternVal::Memory(addr)) => {
                let actual = store.memory(addr)?;
                let current = Limits {
                    min: actual.size(),
                    max: actual.ty().limits.max,
                };
                if !limits_match(current, ty.limits) {
                    return Err(ERR_INCOMPATIBLE);
                }
                inst.memories.push(addr);
            }
            (ImportDesc::Global(ty), ExternVal::Global(addr)) => {
                if store.global(addr)?.ty != *ty {
                    return Err(ERR_INCOMPATIBLE);
                }
                inst.globals.push(addr);
            }
            _ => return Err(ERR_INCOMPATIBLE),
        }
    }

    // 2. Allocate local definitions.
    let import_funcs = index.funcs.import_count();
    for (i, func) in module.funcs.iter().enumerate() {
        let ty = index.func_type(import_funcs + i as u32)?.clone();
        let addr = store.push_func(FuncInst::Wasm {
            ty,
            instance: instance_idx,
            code: Rc::new(func.clone()),
        });
        inst.funcs.push(addr);
    }
    for table in &module.tables {
        store.tables.push(Table::new(table.ty));
        inst.tables.push((store.tables.len() - 1) as u32);
    }
    for memory in &module.memories {
        store.memories.push(Memory::new(memory.ty));
        inst.memories.push((store.memories.len() - 1) as u32);
    }

    // 3. Evaluate global initializers.
    for global in &module.globals {
        let value = eval_const(store, eval, &inst, &global.init)?;
        store.globals.push(GlobalInst {
            ty: global.ty,
            value,
        });
        inst.globals.push((store.globals.len() - 1) as u32);
    }

    // 4. Resolve exports.
    for export in &module.exports {
        let item = export.item.index() as usize;
        let value = match export.kind {
            ExternKind::Func => ExternVal::Func(inst.funcs[item]),
            ExternKind::Table => ExternVal::Table(inst.tables[item]),
            ExternKind::Memory => ExternVal::Memory(inst.memories[item]),
            ExternKind::Global => ExternVal::Global(inst.globals[item]),
        };
        inst.exports.insert(export.name.clone(), value);
    }

    // 5. Evaluate element segments; apply the active ones to their
    // tables. Active and declarative segments end up empty.
    let mut elem_values: Vec<Vec<Value>> = Vec::with_capacity(module.elems.len());
    for elem in &module.elems {
        let refs = elem
            .items
            .iter()
            .map(|item| concrete_const(store, eval, &inst, item))
            .collect::<Result<Vec<_>>>()?;
        elem_values.push(refs);
    }

    store.instances.push(inst);

    for (elem, refs) in module.elems.iter().zip(elem_values) {
        match &elem.mode {
            ElementMode::Passive => {
                store.elems.push(refs);
            }
            ElementMode::Declarative => {
                store.elems.push(Vec::new());
            }
            ElementMode::Active { table, offset } => {
                let instance = store.instance(instance_idx)?;
                let table_addr = instance.tables[table.index() as usize];
                let offset =
                    concrete_const_at(store, eval, instance_idx, offset)?.as_u32()?;
                let len = refs.len() as u32;
                store.table_mut(table_addr)?.init(offset, &refs, 0, len)?;
                store.elems.push(Vec::new());
            }
        }
        let addr = (store.elems.len() - 1) as u32;
        store.instances[instance_idx].elems.push(addr);
    }

    // 6. Apply active data segments; retain passive ones.
    for data in &module.datas {
        match &data.mode {
            DataMode::Passive => {
                store.datas.push(data.init.clone());
            }
            DataMode::Active { memory, offset } => {
                let mem_addr =
                    store.instance(instance_idx)?.memories[memory.index() as usize];
                let offset = concrete_const_at(store, eval, instance_idx, offset)?.as_u32()?;
                store
                    .memory_mut(mem_addr)?
                    .write(u64::from(offset), &data.init)?;
                store.datas.push(Vec::new());
            }
        }
        let addr = (store.datas.len() - 1) as u32;
        store.instances[instance_idx].datas.push(addr);
    }

    // 7. Run the start function; a trap is the link result.
    if let Some(start) = &module.start {
        let addr = store.instance(instance_idx)?.funcs[start.index() as usize];
        debug!("running start function at address {addr}");
        let mut interp = Interpreter::new(store, eval, config, stats);
        interp.invoke(addr, Vec::new())?;
    }

    Ok(instance_idx)
}

/// Import limits match when the actual minimum is at least the declared
/// minimum and the actual maximum does not exceed a declared one.
fn limits_match(actual: Limits, declared: Limits) -> bool {
    if actual.min < declared.min {
        return false;
    }
    match declared.max {
        None => true,
        Some(declared_max) => actual.max.is_some_and(|actual_max| actual_max <= declared_max),
    }
}

/// Evaluates a constant expression in the algebra.
fn eval_const<E: Evaluator>(
    store: &Store<E>,
    eval: &mut E,
    inst: &Instance,
    expr: &[Instruction],
) -> Result<E::Value> {
    let [instr] = expr else {
        return Err(Error::validation(
            codes::CONSTANT_EXPRESSION_REQUIRED,
            "constant expression required",
        ));
    };
    let value = match instr {
        Instruction::I32Const(v) => eval.constant(Value::I32(*v)),
        Instruction::I64Const(v) => eval.constant(Value::I64(*v)),
        Instruction::F32Const(v) => eval.constant(Value::F32(*v)),
        Instruction::F64Const(v) => eval.constant(Value::F64(*v)),
        Instruction::RefNull(ty) => eval.constant(Value::null(*ty)),
        Instruction::RefFunc(func) => {
            let addr = inst.funcs[func.index() as usize];
            eval.constant(Value::FuncRef(Some(addr)))
        }
        Instruction::GlobalGet(global) => {
            let addr = inst.globals[global.index() as usize];
            store.global(addr)?.value.clone()
        }
        _ => {
            return Err(Error::validation(
                codes::CONSTANT_EXPRESSION_REQUIRED,
                "constant expression required",
            ));
        }
    };
    Ok(value)
}

/// Evaluates a constant expression to a concrete value.
fn concrete_const<E: Evaluator>(
    store: &Store<E>,
    eval: &mut E,
    inst: &Instance,
    expr: &[Instruction],
) -> Result<Value> {
    let value = eval_const(store, eval, inst, expr)?;
    eval.concrete(&value).ok_or(Error::runtime(
        codes::SYMBOLIC_VALUE_REQUIRED,
        "symbolic value in a constant expression",
    ))
}

fn concrete_const_at<E: Evaluator>(
    store: &Store<E>,
    eval: &mut E,
    instance: usize,
    expr: &[Instruction],
) -> Result<Value> {
    let inst = store.instance(instance)?.clone();
    concrete_const(store, eval, &inst, expr)
}

/// The declared result types of the export are occasionally needed by
/// embedders; re-exported through the engine.
pub(crate) fn export_func_addr<E: Evaluator>(
    store: &Store<E>,
    instance: usize,
    name: &str,
) -> Result<u32> {
    match store.instance(instance)?.exports.get(name) {
        Some(ExternVal::Func(addr)) => Ok(*addr),
        _ => Err(Error::link(codes::UNKNOWN_EXPORT, "unknown export")),
    }
}
