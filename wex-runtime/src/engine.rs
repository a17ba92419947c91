// WEX - wex-runtime
// Module: WEX Engine
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The engine facade: store, evaluator, registry, and configuration in
//! one place.

use log::debug;

use wex_error::{codes, Error, Result};
use wex_format::module::Module;
use wex_rewrite::ModuleIndex;

use crate::config::{ExecConfig, ExecStats};
use crate::eval::Evaluator;
use crate::host::HostModule;
use crate::interp::Interpreter;
use crate::linker::{self, Registry};
use crate::memory::Memory;
use crate::store::{ExternVal, FuncInst, GlobalInst, Instance, Store};
use crate::table::Table;
use crate::values::Value;

/// An execution engine: one store, one evaluator, one registry.
pub struct Engine<E: Evaluator> {
    /// The store owning all runtime objects.
    pub store: Store<E>,
    /// The value algebra.
    pub eval: E,
    /// Execution configuration.
    pub config: ExecConfig,
    /// Accumulated statistics.
    pub stats: ExecStats,
    /// Named instances importable by modules.
    pub registry: Registry,
}

impl<E: Evaluator> Engine<E> {
    /// Creates an engine over an evaluator and a configuration.
    pub fn new(eval: E, config: ExecConfig) -> Self {
        Self {
            store: Store::new(),
            eval,
            config,
            stats: ExecStats::default(),
            registry: Registry::new(),
        }
    }

    /// Installs a host extern module and registers it under its name.
    pub fn install_host_module(&mut self, module: HostModule<E>) -> usize {
        let mut inst = Instance::default();
        for (name, ty, func) in module.funcs {
            let addr = self.store.push_func(FuncInst::Host { ty, func });
            inst.exports.insert(name, ExternVal::Func(addr));
        }
        for (name, ty, value) in module.globals {
            let value = self.eval.constant(value);
            self.store.globals.push(GlobalInst { ty, value });
            let addr = (self.store.globals.len() - 1) as u32;
            inst.exports.insert(name, ExternVal::Global(addr));
        }
        for (name, ty) in module.memories {
            self.store.memories.push(Memory::new(ty));
            let addr = (self.store.memories.len() - 1) as u32;
            inst.exports.insert(name, ExternVal::Memory(addr));
        }
        for (name, ty) in module.tables {
            self.store.tables.push(Table::new(ty));
            let addr = (self.store.tables.len() - 1) as u32;
            inst.exports.insert(name, ExternVal::Table(addr));
        }
        self.store.instances.push(inst);
        let index = self.store.instances.len() - 1;
        self.registry.register(&module.name, index);
        debug!("installed host module {} as instance {index}", module.name);
        index
    }

    /// Instantiates a rewritten, validated module.
    pub fn instantiate(&mut self, module: &Module, index: &ModuleIndex) -> Result<usize> {
        linker::instantiate(
            &mut self.store,
            &mut self.eval,
            &self.config,
            &mut self.stats,
            &self.registry,
            module,
            index,
        )
    }

    /// Registers an instance for import under a module name.
    pub fn register(&mut self, name: &str, instance: usize) {
        self.registry.register(name, instance);
    }

    /// Invokes an exported function with concrete arguments.
    pub fn invoke(
        &mut self,
        instance: usize,
        export: &str,
        args: &[Value],
    ) -> Result<Vec<E::Value>> {
        let addr = linker::export_func_addr(&self.store, instance, export)?;
        let declared = self.store.func(addr)?.ty().clone();
        if declared.params.len() != args.len() {
            return Err(Error::runtime(
                codes::INVALID_ARGUMENT,
                "argument arity mismatch",
            ));
        }
        for (arg, expected) in args.iter().zip(&declared.params) {
            if arg.ty() != *expected {
                return Err(Error::runtime(
                    codes::INVALID_ARGUMENT,
                    "argument type mismatch",
                ));
            }
        }
        let args = args
            .iter()
            .map(|value| self.eval.constant(*value))
            .collect();
        let mut interp = Interpreter::new(
            &mut self.store,
            &mut self.eval,
            &self.config,
            &mut self.stats,
        );
        interp.invoke(addr, args)
    }

    /// Invokes an exported function by already-lifted values.
    pub fn invoke_lifted(
        &mut self,
        instance: usize,
        export: &str,
        args: Vec<E::Value>,
    ) -> Result<Vec<E::Value>> {
        let addr = linker::export_func_addr(&self.store, instance, export)?;
        let mut interp = Interpreter::new(
            &mut self.store,
            &mut self.eval,
            &self.config,
            &mut self.stats,
        );
        interp.invoke(addr, args)
    }

    /// Projects interpreter results to concrete values, failing when a
    /// result is symbolic.
    pub fn concrete_results(&self, values: &[E::Value]) -> Result<Vec<Value>> {
        values
            .iter()
            .map(|value| {
                self.eval.concrete(value).ok_or(Error::runtime(
                    codes::SYMBOLIC_VALUE_REQUIRED,
                    "symbolic result value",
                ))
            })
            .collect()
    }

    /// Reads an exported global's current value.
    pub fn global_value(&self, instance: usize, export: &str) -> Result<E::Value> {
        match self.store.instance(instance)?.exports.get(export) {
            Some(ExternVal::Global(addr)) => Ok(self.store.global(*addr)?.value.clone()),
            _ => Err(Error::link(codes::UNKNOWN_EXPORT, "unknown export")),
        }
    }
}
