// WEX - wex-script
// Module: WEX Script Runner
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The directive walker.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use serde::Serialize;
use wast::parser::{self, ParseBuffer};
use wast::{QuoteWat, Wast, WastDirective, WastExecute, WastInvoke, Wat};

use wex_error::ErrorCategory;
use wex_format::module::Module;
use wex_rewrite::ModuleIndex;
use wex_runtime::{ConcreteEval, Engine, ExecConfig, Value};

use crate::spectest::spectest_module;
use crate::values::{args_to_values, result_matches};

/// Statistics for one script run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScriptStats {
    /// Directives encountered.
    pub directives: usize,
    /// Modules instantiated.
    pub modules: usize,
    /// `register` directives executed.
    pub register_count: usize,
    /// Bare `invoke` directives executed.
    pub invoke_count: usize,
    /// `assert_return` directives executed.
    pub assert_return_count: usize,
    /// `assert_trap` directives executed.
    pub assert_trap_count: usize,
    /// `assert_invalid` directives executed.
    pub assert_invalid_count: usize,
    /// `assert_malformed` directives executed.
    pub assert_malformed_count: usize,
    /// `assert_unlinkable` directives executed.
    pub assert_unlinkable_count: usize,
    /// `assert_exhaustion` directives executed.
    pub assert_exhaustion_count: usize,
    /// Assertions that held.
    pub passed: usize,
    /// Assertions that did not hold.
    pub failed: usize,
    /// Directives outside the supported set.
    pub skipped: usize,
}

/// Runs the binary pipeline on an assembled module: decode, rewrite,
/// validate.
pub fn prepare_module(bytes: &[u8]) -> wex_error::Result<(Module, ModuleIndex)> {
    let module = wex_decoder::decode_module(bytes)?;
    let (module, index) = wex_rewrite::rewrite_module(&module)?;
    wex_validate::validate_module(&module, &index)?;
    Ok((module, index))
}

/// A script runner: one concrete engine plus the named-module registry.
pub struct ScriptRunner {
    engine: Engine<ConcreteEval>,
    /// Instances addressable by `$id`.
    instances: HashMap<String, usize>,
    /// The most recently instantiated module.
    current: Option<usize>,
    /// Accumulated statistics.
    pub stats: ScriptStats,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new(ExecConfig::default())
    }
}

impl ScriptRunner {
    /// Creates a runner with the `spectest` host module installed.
    #[must_use]
    pub fn new(config: ExecConfig) -> Self {
        let mut engine = Engine::new(ConcreteEval::new(), config);
        engine.install_host_module(spectest_module());
        Self {
            engine,
            instances: HashMap::new(),
            current: None,
            stats: ScriptStats::default(),
        }
    }

    /// Runs a whole script. Assertion failures are recorded in the
    /// statistics; a hard failure (unparseable script, module that should
    /// load but does not) aborts with an error.
    pub fn run_script(&mut self, source: &str, name: &str) -> Result<ScriptStats> {
        let buf = ParseBuffer::new(source)
            .map_err(|e| anyhow!("{name}: {e}"))?;
        let wast: Wast = parser::parse(&buf).map_err(|e| anyhow!("{name}: {e}"))?;

        for directive in wast.directives {
            self.stats.directives += 1;
            self.run_directive(directive)
                .with_context(|| format!("script {name}"))?;
        }
        Ok(self.stats.clone())
    }

    #[allow(clippy::too_many_lines)]
    fn run_directive(&mut self, directive: WastDirective<'_>) -> Result<()> {
        match directive {
            WastDirective::Module(mut quote) => {
                let name = quote_name(&quote);
                let bytes = quote.encode().context("encoding module")?;
                let (module, index) =
                    prepare_module(&bytes).map_err(|e| anyhow!("module failed to load: {e}"))?;
                let instance = self
                    .engine
                    .instantiate(&module, &index)
                    .map_err(|e| anyhow!("module failed to instantiate: {e}"))?;
                self.current = Some(instance);
                if let Some(name) = name {
                    self.instances.insert(name, instance);
                }
                self.stats.modules += 1;
            }

            WastDirective::Register { name, module, .. } => {
                let instance = self.resolve_instance(module.map(|id| id.name()))?;
                self.engine.register(name, instance);
                self.stats.register_count += 1;
            }

            WastDirective::Invoke(invoke) => {
                self.stats.invoke_count += 1;
                if let Err(err) = self.run_invoke(&invoke) {
                    warn!("invoke {} failed: {err}", invoke.name);
                    self.stats.failed += 1;
                }
            }

            WastDirective::AssertReturn { exec, results, .. } => {
                self.stats.assert_return_count += 1;
                match self.run_execute(exec) {
                    Ok(actual) if actual.len() == results.len() => {
                        let mut all = true;
                        for (value, expected) in actual.iter().zip(&results) {
                            all &= result_matches(value, expected)?;
                        }
                        self.record(all);
                    }
                    Ok(_) => self.record(false),
                    Err(err) => {
                        debug!("assert_return execution failed: {err}");
                        self.record(false);
                    }
                }
            }

            WastDirective::AssertTrap { exec, message, .. } => {
                self.stats.assert_trap_count += 1;
                match self.run_execute(exec) {
                    Err(err) if trap_matches(&err, message) => self.record(true),
                    Err(err) => {
                        debug!("expected trap \"{message}\", got {err}");
                        self.record(false);
                    }
                    Ok(_) => self.record(false),
                }
            }

            WastDirective::AssertMalformed {
                mut module,
                message,
                ..
            } => {
                self.stats.assert_malformed_count += 1;
                let malformed = match module.encode() {
                    // The text front-end itself may reject a quoted
                    // module; that counts as malformed.
                    Err(_) => true,
                    Ok(bytes) => matches!(
                        wex_decoder::decode_module(&bytes),
                        Err(err) if err.category == ErrorCategory::Parse
                    ),
                };
                if !malformed {
                    debug!("module expected to be malformed: \"{message}\"");
                }
                self.record(malformed);
            }

            WastDirective::AssertInvalid {
                mut module,
                message,
                ..
            } => {
                self.stats.assert_invalid_count += 1;
                let invalid = match module.encode() {
                    Err(_) => true,
                    Ok(bytes) => matches!(
                        prepare_module(&bytes),
                        Err(err) if err.category == ErrorCategory::Validation
                    ),
                };
                if !invalid {
                    debug!("module expected to be invalid: \"{message}\"");
                }
                self.record(invalid);
            }

            WastDirective::AssertUnlinkable {
                mut module,
                message,
                ..
            } => {
                self.stats.assert_unlinkable_count += 1;
                let unlinkable = match module.encode() {
                    Err(_) => false,
                    Ok(bytes) => match prepare_module(&bytes) {
                        Err(_) => false,
                        Ok((module, index)) => {
                            self.engine.instantiate(&module, &index).is_err()
                        }
                    },
                };
                if !unlinkable {
                    debug!("module expected to be unlinkable: \"{message}\"");
                }
                self.record(unlinkable);
            }

            WastDirective::AssertExhaustion { call, message, .. } => {
                self.stats.assert_exhaustion_count += 1;
                match self.run_invoke(&call) {
                    Err(err) if err.to_string().contains("exhausted") => self.record(true),
                    other => {
                        debug!("expected exhaustion \"{message}\", got {other:?}");
                        self.record(false);
                    }
                }
            }

            other => {
                debug!("skipping unsupported directive {other:?}");
                self.stats.skipped += 1;
            }
        }
        Ok(())
    }

    fn record(&mut self, passed: bool) {
        if passed {
            self.stats.passed += 1;
        } else {
            self.stats.failed += 1;
        }
    }

    fn resolve_instance(&self, id: Option<&str>) -> Result<usize> {
        match id {
            Some(name) => self
                .instances
                .get(name)
                .copied()
                .ok_or_else(|| anyhow!("unknown module ${name}")),
            None => self.current.ok_or_else(|| anyhow!("no module in scope")),
        }
    }

    fn run_invoke(&mut self, invoke: &WastInvoke<'_>) -> Result<Vec<Value>> {
        let instance = self.resolve_instance(invoke.module.map(|id| id.name()))?;
        let args = args_to_values(&invoke.args)?;
        let results = self
            .engine
            .invoke(instance, invoke.name, &args)
            .map_err(|e| anyhow!("{e}"))?;
        self.engine
            .concrete_results(&results)
            .map_err(|e| anyhow!("{e}"))
    }

    fn run_execute(&mut self, exec: WastExecute<'_>) -> Result<Vec<Value>> {
        match exec {
            WastExecute::Invoke(invoke) => self.run_invoke(&invoke),
            WastExecute::Get { module, global, .. } => {
                let instance = self.resolve_instance(module.map(|id| id.name()))?;
                let value = self
                    .engine
                    .global_value(instance, global)
                    .map_err(|e| anyhow!("{e}"))?;
                self.engine
                    .concrete_results(&[value])
                    .map_err(|e| anyhow!("{e}"))
            }
            WastExecute::Wat(mut wat) => {
                // Instantiating an inline module; a start-function trap
                // surfaces as the error.
                let bytes = wat.encode().context("encoding module")?;
                let (module, index) =
                    prepare_module(&bytes).map_err(|e| anyhow!("{e}"))?;
                self.engine
                    .instantiate(&module, &index)
                    .map_err(|e| anyhow!("{e}"))?;
                Ok(Vec::new())
            }
        }
    }
}

fn quote_name(quote: &QuoteWat<'_>) -> Option<String> {
    match quote {
        QuoteWat::Wat(Wat::Module(module)) => module.id.map(|id| id.name().to_string()),
        _ => None,
    }
}

/// A trap assertion holds when the reported message and the expected one
/// agree up to suite-side suffixes ("out of bounds memory access" vs
/// "out of bounds memory access at ...").
fn trap_matches(err: &anyhow::Error, expected: &str) -> bool {
    let actual = err.to_string();
    actual.contains(expected) || expected.contains(trim_brackets(&actual))
}

fn trim_brackets(message: &str) -> &str {
    // Engine errors render as "[Category][Ecode] message".
    match message.rfind("] ") {
        Some(position) => &message[position + 2..],
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> ScriptStats {
        let mut runner = ScriptRunner::default();
        runner.run_script(source, "inline").unwrap()
    }

    #[test]
    fn assert_return_and_trap() {
        let stats = run(
            r#"(module
                 (func (export "add") (param i32 i32) (result i32)
                   local.get 0
                   local.get 1
                   i32.add)
                 (func (export "div") (param i32 i32) (result i32)
                   local.get 0
                   local.get 1
                   i32.div_s))
               (assert_return (invoke "add" (i32.const 2) (i32.const 40)) (i32.const 42))
               (assert_trap (invoke "div" (i32.const 1) (i32.const 0)) "integer divide by zero")
               (assert_trap (invoke "div" (i32.const -2147483648) (i32.const -1)) "integer overflow")"#,
        );
        assert_eq!(stats.passed, 3);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn assert_malformed_and_invalid() {
        let stats = run(
            r#"(assert_malformed (module binary "") "unexpected end")
               (assert_malformed (module binary "\00asm\02\00\00\00") "unknown binary version")
               (assert_invalid (module (func (result i32))) "type mismatch")
               (assert_invalid
                 (module (func $s (param i32)) (start $s))
                 "start function")"#,
        );
        assert_eq!(stats.assert_malformed_count, 2);
        assert_eq!(stats.assert_invalid_count, 2);
        assert_eq!(stats.passed, 4);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn registered_modules_link() {
        let stats = run(
            r#"(module $lib
                 (func (export "one") (result i32) i32.const 1))
               (register "lib" $lib)
               (module
                 (import "lib" "one" (func $one (result i32)))
                 (func (export "two") (result i32)
                   call $one
                   call $one
                   i32.add))
               (assert_return (invoke "two") (i32.const 2))"#,
        );
        assert_eq!(stats.modules, 2);
        assert_eq!(stats.register_count, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.passed, 1);
    }

    #[test]
    fn spectest_imports_resolve() {
        let stats = run(
            r#"(module
                 (import "spectest" "print_i32" (func $print (param i32)))
                 (import "spectest" "global_i32" (global $g i32))
                 (func (export "run") (result i32)
                   global.get $g
                   call $print
                   global.get $g))
               (assert_return (invoke "run") (i32.const 666))"#,
        );
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.passed, 1);
    }

    #[test]
    fn unreachable_block_typechecks() {
        // The unreachable stack absorbs the required result.
        let stats = run(
            r#"(module
                 (func (export "poly") (result i32)
                   (block (result i32)
                     unreachable)))
               (assert_trap (invoke "poly") "unreachable")"#,
        );
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.passed, 1);
    }
}
