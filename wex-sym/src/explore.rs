// WEX - wex-sym
// Module: WEX Path Exploration
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The path explorer: the choice effect realised as a worklist of
//! decision scripts.
//!
//! Each script describes one path prefix. The explorer runs the entry
//! function from a fresh engine per script (fresh store, fresh memories,
//! so sibling paths never share state), replaying the script at each
//! choice point and consulting the solver beyond it. Forks discovered
//! during a run are pushed onto the worklist; exploration is depth-first
//! and bounded by `ExecConfig::max_paths`.
//!
//! Entry-function parameters become fresh symbols named `arg0`, `arg1`,
//! …; the `symbolic` host module provides `i32`/`i64` sources plus
//! `assume` and `assert` for modules that want to drive the path
//! condition themselves.

use log::{debug, warn};

use wex_error::{codes, Error, ErrorCategory, Result};
use wex_format::module::Module;
use wex_format::types::{FuncType, ValueType};
use wex_rewrite::ModuleIndex;
use wex_runtime::{Engine, ExecConfig, HostModule};

use crate::eval::SymbolicEval;
use crate::expr::Expr;
use crate::solver::Solver;

/// How one explored path ended.
#[derive(Debug)]
pub enum PathOutcome {
    /// The entry function returned these (possibly symbolic) results.
    Return(Vec<Expr>),
    /// The path trapped.
    Trap(Error),
    /// The path failed outside the trap channel (assertion violation,
    /// resource limits, unsupported feature).
    Error(Error),
}

/// One terminal path: its condition and its outcome.
#[derive(Debug)]
pub struct PathResult {
    /// The conjunction of branch conditions the path assumed.
    pub condition: Vec<Expr>,
    /// How the path ended.
    pub outcome: PathOutcome,
}

/// The exploration driver.
pub struct Explorer<'m, S: Solver + Clone> {
    module: &'m Module,
    index: &'m ModuleIndex,
    config: ExecConfig,
    solver: S,
}

impl<'m, S: Solver + Clone + 'static> Explorer<'m, S> {
    /// Creates an explorer over a rewritten, validated module.
    pub fn new(module: &'m Module, index: &'m ModuleIndex, config: ExecConfig, solver: S) -> Self {
        Self {
            module,
            index,
            config,
            solver,
        }
    }

    /// Explores every path of the exported function `entry`.
    ///
    /// Returns the terminal paths in depth-first discovery order.
    /// Exploration stops at `max_paths`; pending scripts beyond the
    /// budget are dropped with a warning.
    pub fn explore(&mut self, entry: &str) -> Result<Vec<PathResult>> {
        let mut worklist: Vec<Vec<bool>> = vec![Vec::new()];
        let mut results = Vec::new();

        while let Some(script) = worklist.pop() {
            if results.len() >= self.config.max_paths {
                warn!(
                    "path budget of {} exhausted; dropping {} pending paths",
                    self.config.max_paths,
                    worklist.len() + 1,
                );
                break;
            }
            let (result, forks) = self.run_path(entry, script)?;
            // Depth-first: newly discovered forks are explored before
            // older pending ones.
            worklist.extend(forks);
            if let Some(result) = result {
                debug!(
                    "path {} finished with {} conjuncts",
                    results.len(),
                    result.condition.len(),
                );
                results.push(result);
            }
        }
        Ok(results)
    }

    /// Runs a single path following `script`. Returns `None` as the
    /// result for infeasible paths (an over-approximating solver may
    /// send the explorer down a branch that has no model).
    fn run_path(
        &mut self,
        entry: &str,
        script: Vec<bool>,
    ) -> Result<(Option<PathResult>, Vec<Vec<bool>>)> {
        let eval = SymbolicEval::new(self.solver.clone(), script, self.config.optimize);
        let mut engine = Engine::new(eval, self.config.clone());
        engine.install_host_module(symbolic_host_module());
        // Instantiation may itself branch (start function, segment
        // initialisers); its failures are path outcomes, not exploration
        // failures.
        let instance = match engine.instantiate(self.module, self.index) {
            Ok(instance) => instance,
            Err(err) => {
                let condition = engine.eval.path_condition();
                let forks = engine.eval.take_forks();
                if err.code == codes::ASSUMPTION_UNSATISFIABLE {
                    return Ok((None, forks));
                }
                let outcome = if err.category == ErrorCategory::Trap {
                    PathOutcome::Trap(err)
                } else {
                    PathOutcome::Error(err)
                };
                return Ok((Some(PathResult { condition, outcome }), forks));
            }
        };

        let ty = entry_signature(&engine, instance, entry)?;
        let args = ty
            .params
            .iter()
            .enumerate()
            .map(|(i, ty)| engine.eval.fresh_symbol(&format!("arg{i}"), *ty))
            .collect();

        let invoked = engine.invoke_lifted(instance, entry, args);
        let condition = engine.eval.path_condition();
        let forks = engine.eval.take_forks();

        let outcome = match invoked {
            Ok(results) => PathOutcome::Return(results),
            Err(err) if err.code == codes::ASSUMPTION_UNSATISFIABLE => {
                return Ok((None, forks));
            }
            Err(err) if err.category == ErrorCategory::Trap => PathOutcome::Trap(err),
            Err(err) => PathOutcome::Error(err),
        };
        Ok((Some(PathResult { condition, outcome }), forks))
    }
}

fn entry_signature<S: Solver>(
    engine: &Engine<SymbolicEval<S>>,
    instance: usize,
    entry: &str,
) -> Result<FuncType> {
    use wex_runtime::ExternVal;
    match engine.store.instance(instance)?.exports.get(entry) {
        Some(ExternVal::Func(addr)) => Ok(engine.store.func(*addr)?.ty().clone()),
        _ => Err(Error::link(codes::UNKNOWN_EXPORT, "unknown export")),
    }
}

/// The `symbolic` host module: fresh-value sources plus path-condition
/// primitives.
#[must_use]
pub fn symbolic_host_module<S: Solver + 'static>() -> HostModule<SymbolicEval<S>> {
    let mut host = HostModule::new("symbolic");

    let counter = std::cell::Cell::new(0u32);
    host.add_func(
        "i32",
        FuncType::new(Vec::new(), vec![ValueType::I32]),
        move |eval: &mut SymbolicEval<S>, _args: &[Expr]| {
            let name = format!("sym{}", counter.get());
            counter.set(counter.get() + 1);
            Ok(vec![eval.fresh_symbol(&name, ValueType::I32)])
        },
    );

    let counter64 = std::cell::Cell::new(0u32);
    host.add_func(
        "i64",
        FuncType::new(Vec::new(), vec![ValueType::I64]),
        move |eval: &mut SymbolicEval<S>, _args: &[Expr]| {
            let name = format!("sym64_{}", counter64.get());
            counter64.set(counter64.get() + 1);
            Ok(vec![eval.fresh_symbol(&name, ValueType::I64)])
        },
    );

    host.add_func(
        "assume",
        FuncType::new(vec![ValueType::I32], Vec::new()),
        |eval: &mut SymbolicEval<S>, args: &[Expr]| {
            eval.assume(&args[0])?;
            Ok(Vec::new())
        },
    );

    host.add_func(
        "assert",
        FuncType::new(vec![ValueType::I32], Vec::new()),
        |eval: &mut SymbolicEval<S>, args: &[Expr]| {
            eval.assert(&args[0])?;
            Ok(Vec::new())
        },
    );

    host
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::FoldSolver;

    fn prepared(source: &str) -> (Module, ModuleIndex) {
        let buf = wast::parser::ParseBuffer::new(source).unwrap();
        let mut wat = wast::parser::parse::<wast::Wat>(&buf).unwrap();
        let bytes = wat.encode().unwrap();
        let module = wex_decoder::decode_module(&bytes).unwrap();
        let (module, index) = wex_rewrite::rewrite_module(&module).unwrap();
        wex_validate::validate_module(&module, &index).unwrap();
        (module, index)
    }

    #[test]
    fn branch_on_symbol_yields_two_paths() {
        let (module, index) = prepared(
            r#"(module
                 (import "symbolic" "i32" (func $any (result i32)))
                 (func (export "probe") (result i32)
                   call $any
                   i32.const 0
                   i32.gt_s
                   (if (result i32)
                     (then i32.const 1)
                     (else i32.const 2))))"#,
        );
        let mut explorer = Explorer::new(
            &module,
            &index,
            ExecConfig::default(),
            FoldSolver::new(),
        );
        let paths = explorer.explore("probe").unwrap();
        assert_eq!(paths.len(), 2);

        let rendered: Vec<String> = paths
            .iter()
            .map(|p| {
                p.condition
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        assert!(rendered.contains(&"(i32.gt_s $sym0 (i32.const 0))".to_string()));
        assert!(rendered.contains(&"(not (i32.gt_s $sym0 (i32.const 0)))".to_string()));
        for path in &paths {
            let PathOutcome::Return(values) = &path.outcome else {
                panic!("expected a returning path");
            };
            assert_eq!(values.len(), 1);
            assert!(values[0].as_const().is_some());
        }
    }

    #[test]
    fn entry_parameters_become_symbols() {
        let (module, index) = prepared(
            r#"(module
                 (func (export "sign") (param i32) (result i32)
                   local.get 0
                   i32.const 0
                   i32.lt_s
                   (if (result i32)
                     (then i32.const -1)
                     (else i32.const 1))))"#,
        );
        let mut explorer = Explorer::new(
            &module,
            &index,
            ExecConfig::default(),
            FoldSolver::new(),
        );
        let paths = explorer.explore("sign").unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths
            .iter()
            .all(|p| p.condition[0].to_string().contains("$arg0")));
    }

    #[test]
    fn symbolic_trap_paths_are_reported() {
        let (module, index) = prepared(
            r#"(module
                 (func (export "invert") (param i32) (result i32)
                   i32.const 100
                   local.get 0
                   i32.div_u))"#,
        );
        let mut explorer = Explorer::new(
            &module,
            &index,
            ExecConfig::default(),
            FoldSolver::new(),
        );
        let paths = explorer.explore("invert").unwrap();
        assert_eq!(paths.len(), 2);
        let traps: Vec<_> = paths
            .iter()
            .filter(|p| matches!(&p.outcome, PathOutcome::Trap(err) if err.message == "integer divide by zero"))
            .collect();
        assert_eq!(traps.len(), 1);
    }

    #[test]
    fn path_budget_is_enforced() {
        // Three sequential symbolic branches give eight paths; a budget
        // of four stops early.
        let (module, index) = prepared(
            r#"(module
                 (func (export "many") (param i32 i32 i32) (result i32)
                   (local $acc i32)
                   local.get 0
                   (if (then (local.set $acc (i32.const 1))))
                   local.get 1
                   (if (then (local.set $acc (i32.const 2))))
                   local.get 2
                   (if (then (local.set $acc (i32.const 3))))
                   local.get $acc))"#,
        );
        let mut config = ExecConfig::default();
        config.max_paths = 4;
        let mut explorer = Explorer::new(&module, &index, config, FoldSolver::new());
        let paths = explorer.explore("many").unwrap();
        assert_eq!(paths.len(), 4);
    }

    #[test]
    fn assumptions_prune_paths() {
        let (module, index) = prepared(
            r#"(module
                 (import "symbolic" "assume" (func $assume (param i32)))
                 (func (export "guarded") (param i32) (result i32)
                   local.get 0
                   i32.const 0
                   i32.gt_s
                   call $assume
                   local.get 0))"#,
        );
        let mut explorer = Explorer::new(
            &module,
            &index,
            ExecConfig::default(),
            FoldSolver::new(),
        );
        let paths = explorer.explore("guarded").unwrap();
        assert_eq!(paths.len(), 1);
        let PathOutcome::Return(values) = &paths[0].outcome else {
            panic!("expected a returning path");
        };
        assert_eq!(values[0].to_string(), "$arg0");
    }
}
