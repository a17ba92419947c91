// WEX - wex-runtime
// Module: WEX Execution Tests
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! End-to-end execution tests: text source through decode, rewrite,
//! validate, link, and concrete interpretation.

use wex_format::types::{FuncType, ValueType};
use wex_runtime::{ConcreteEval, Engine, ExecConfig, HostModule, Value};

fn engine() -> Engine<ConcreteEval> {
    Engine::new(ConcreteEval::new(), ExecConfig::default())
}

fn instantiate(engine: &mut Engine<ConcreteEval>, source: &str) -> usize {
    let buf = wast::parser::ParseBuffer::new(source).unwrap();
    let mut wat = wast::parser::parse::<wast::Wat>(&buf).unwrap();
    let bytes = wat.encode().unwrap();
    let module = wex_decoder::decode_module(&bytes).unwrap();
    let (module, index) = wex_rewrite::rewrite_module(&module).unwrap();
    wex_validate::validate_module(&module, &index).unwrap();
    engine.instantiate(&module, &index).unwrap()
}

fn invoke(
    engine: &mut Engine<ConcreteEval>,
    instance: usize,
    name: &str,
    args: &[Value],
) -> wex_error::Result<Vec<Value>> {
    let results = engine.invoke(instance, name, args)?;
    engine.concrete_results(&results)
}

#[test]
fn add_two_numbers() {
    let mut engine = engine();
    let instance = instantiate(
        &mut engine,
        r#"(module
             (func (export "add") (param i32 i32) (result i32)
               local.get 0
               local.get 1
               i32.add))"#,
    );
    let results = invoke(&mut engine, instance, "add", &[Value::I32(2), Value::I32(40)]).unwrap();
    assert_eq!(results, vec![Value::I32(42)]);
}

#[test]
fn branch_to_loop_counts_down() {
    let mut engine = engine();
    let instance = instantiate(
        &mut engine,
        r#"(module
             (func (export "countdown") (param i32) (result i32)
               local.get 0
               (loop $top (param i32) (result i32)
                 local.get 0
                 i32.const 1
                 i32.sub
                 local.tee 0
                 br_if $top)
               drop
               local.get 0)
             (func (export "count") (param i32) (result i32)
               (block $exit
                 (loop $top
                   local.get 0
                   i32.eqz
                   br_if $exit
                   local.get 0
                   i32.const 1
                   i32.sub
                   local.set 0
                   br $top))
               local.get 0))"#,
    );
    // Five iterations drive the counter to zero.
    let results = invoke(&mut engine, instance, "countdown", &[Value::I32(5)]).unwrap();
    assert_eq!(results, vec![Value::I32(0)]);
    let results = invoke(&mut engine, instance, "countdown", &[Value::I32(1)]).unwrap();
    assert_eq!(results, vec![Value::I32(0)]);
    // The block/loop variant handles zero without iterating.
    let results = invoke(&mut engine, instance, "count", &[Value::I32(0)]).unwrap();
    assert_eq!(results, vec![Value::I32(0)]);
    let results = invoke(&mut engine, instance, "count", &[Value::I32(5)]).unwrap();
    assert_eq!(results, vec![Value::I32(0)]);
}

#[test]
fn br_table_selects_arms() {
    let mut engine = engine();
    let instance = instantiate(
        &mut engine,
        r#"(module
             (func (export "classify") (param i32) (result i32)
               (block $b2 (block $b1 (block $b0
                 local.get 0
                 br_table $b0 $b1 $b2)
                 i32.const 100
                 return)
                 i32.const 200
                 return)
               i32.const 300))"#,
    );
    for (input, expected) in [(0, 100), (1, 200), (2, 300), (7, 300)] {
        let results = invoke(&mut engine, instance, "classify", &[Value::I32(input)]).unwrap();
        assert_eq!(results, vec![Value::I32(expected)]);
    }
}

#[test]
fn passive_data_segment_bounds() {
    let mut engine = engine();
    let instance = instantiate(
        &mut engine,
        r#"(module
             (memory 1)
             (data $seg "x")
             (func (export "init") (param i32 i32 i32)
               local.get 0
               local.get 1
               local.get 2
               memory.init $seg)
             (func (export "forget")
               data.drop $seg))"#,
    );
    // Reading two bytes from a one-byte segment traps.
    let err = invoke(
        &mut engine,
        instance,
        "init",
        &[Value::I32(0), Value::I32(0), Value::I32(2)],
    )
    .unwrap_err();
    assert_eq!(err.message, "out of bounds memory access");
    // One byte succeeds.
    invoke(
        &mut engine,
        instance,
        "init",
        &[Value::I32(0), Value::I32(0), Value::I32(1)],
    )
    .unwrap();
    // After the drop, the segment is zero-length: a zero-length init
    // still succeeds, a one-byte init traps.
    invoke(&mut engine, instance, "forget", &[]).unwrap();
    invoke(
        &mut engine,
        instance,
        "init",
        &[Value::I32(0), Value::I32(0), Value::I32(0)],
    )
    .unwrap();
    let err = invoke(
        &mut engine,
        instance,
        "init",
        &[Value::I32(0), Value::I32(0), Value::I32(1)],
    )
    .unwrap_err();
    assert_eq!(err.message, "out of bounds memory access");
}

#[test]
fn indirect_call_type_mismatch() {
    let mut engine = engine();
    let instance = instantiate(
        &mut engine,
        r#"(module
             (type $void (func))
             (func $f (param i32) (result i32) local.get 0)
             (table 3 funcref)
             (elem (i32.const 0) $f)
             (func (export "mismatch")
               i32.const 0
               call_indirect (type $void))
             (func (export "null")
               i32.const 1
               call_indirect (type $void))
             (func (export "oob")
               i32.const 9
               call_indirect (type $void)))"#,
    );
    let err = invoke(&mut engine, instance, "mismatch", &[]).unwrap_err();
    assert_eq!(err.message, "indirect call type mismatch");
    let err = invoke(&mut engine, instance, "null", &[]).unwrap_err();
    assert_eq!(err.message, "uninitialized element");
    let err = invoke(&mut engine, instance, "oob", &[]).unwrap_err();
    assert_eq!(err.message, "undefined element");
}

#[test]
fn memory_boundary_accesses() {
    let mut engine = engine();
    let instance = instantiate(
        &mut engine,
        r#"(module
             (memory 1)
             (func (export "peek") (param i32) (result i64)
               local.get 0
               i64.load))"#,
    );
    // An 8-byte load ending exactly at 65536 is in range.
    invoke(&mut engine, instance, "peek", &[Value::I32(65528)]).unwrap();
    // Starting at 65536 - or anywhere the access crosses the end - traps.
    for addr in [65529, 65536, -1] {
        let err = invoke(&mut engine, instance, "peek", &[Value::I32(addr)]).unwrap_err();
        assert_eq!(err.message, "out of bounds memory access");
    }
}

#[test]
fn trapping_arithmetic() {
    let mut engine = engine();
    let instance = instantiate(
        &mut engine,
        r#"(module
             (func (export "div") (param i32 i32) (result i32)
               local.get 0
               local.get 1
               i32.div_s)
             (func (export "sat") (param f32) (result i32)
               local.get 0
               i32.trunc_sat_f32_s)
             (func (export "boom")
               unreachable))"#,
    );
    let err = invoke(
        &mut engine,
        instance,
        "div",
        &[Value::I32(i32::MIN), Value::I32(-1)],
    )
    .unwrap_err();
    assert_eq!(err.message, "integer overflow");
    let err = invoke(&mut engine, instance, "div", &[Value::I32(1), Value::I32(0)]).unwrap_err();
    assert_eq!(err.message, "integer divide by zero");
    // The saturating truncation clamps where the checked one traps.
    let results = invoke(&mut engine, instance, "sat", &[Value::F32(1.0e10)]).unwrap();
    assert_eq!(results, vec![Value::I32(i32::MAX)]);
    let err = invoke(&mut engine, instance, "boom", &[]).unwrap_err();
    assert_eq!(err.message, "unreachable");
}

#[test]
fn start_function_runs_before_first_invoke() {
    let mut engine = engine();
    let instance = instantiate(
        &mut engine,
        r#"(module
             (global $g (export "g") (mut i32) (i32.const 0))
             (func $init (global.set $g (i32.const 41)))
             (start $init))"#,
    );
    let value = engine.global_value(instance, "g").unwrap();
    assert_eq!(engine.concrete_results(&[value]).unwrap(), vec![Value::I32(41)]);
}

#[test]
fn cross_module_imports() {
    let mut engine = engine();
    let provider = instantiate(
        &mut engine,
        r#"(module
             (global (export "base") i32 (i32.const 7))
             (func (export "triple") (param i32) (result i32)
               local.get 0
               i32.const 3
               i32.mul))"#,
    );
    engine.register("provider", provider);

    let consumer = instantiate(
        &mut engine,
        r#"(module
             (import "provider" "base" (global $base i32))
             (import "provider" "triple" (func $triple (param i32) (result i32)))
             (func (export "main") (result i32)
               global.get $base
               call $triple))"#,
    );
    let results = invoke(&mut engine, consumer, "main", &[]).unwrap();
    assert_eq!(results, vec![Value::I32(21)]);
}

#[test]
fn unknown_and_incompatible_imports() {
    let mut engine = engine();
    let provider = instantiate(
        &mut engine,
        r#"(module (func (export "f") (param i32)))"#,
    );
    engine.register("provider", provider);

    let source = r#"(module (import "provider" "missing" (func)))"#;
    let buf = wast::parser::ParseBuffer::new(source).unwrap();
    let mut wat = wast::parser::parse::<wast::Wat>(&buf).unwrap();
    let module = wex_decoder::decode_module(&wat.encode().unwrap()).unwrap();
    let (module, index) = wex_rewrite::rewrite_module(&module).unwrap();
    wex_validate::validate_module(&module, &index).unwrap();
    let err = engine.instantiate(&module, &index).unwrap_err();
    assert_eq!(err.message, "unknown import");

    let source = r#"(module (import "provider" "f" (func (param i64))))"#;
    let buf = wast::parser::ParseBuffer::new(source).unwrap();
    let mut wat = wast::parser::parse::<wast::Wat>(&buf).unwrap();
    let module = wex_decoder::decode_module(&wat.encode().unwrap()).unwrap();
    let (module, index) = wex_rewrite::rewrite_module(&module).unwrap();
    wex_validate::validate_module(&module, &index).unwrap();
    let err = engine.instantiate(&module, &index).unwrap_err();
    assert_eq!(err.message, "incompatible import type");
}

#[test]
fn host_functions_are_callable() {
    let mut engine = engine();
    let mut host = HostModule::new("env");
    host.add_func(
        "double",
        FuncType::new(vec![ValueType::I32], vec![ValueType::I32]),
        |_eval: &mut ConcreteEval, args: &[Value]| {
            let v = args[0].as_i32()?;
            Ok(vec![Value::I32(v * 2)])
        },
    );
    engine.install_host_module(host);

    let instance = instantiate(
        &mut engine,
        r#"(module
             (import "env" "double" (func $double (param i32) (result i32)))
             (func (export "main") (result i32)
               i32.const 21
               call $double))"#,
    );
    let results = invoke(&mut engine, instance, "main", &[]).unwrap();
    assert_eq!(results, vec![Value::I32(42)]);
}

#[test]
fn active_segment_out_of_bounds_fails_link() {
    let mut engine = engine();
    let source = r#"(module
        (memory 1)
        (data (i32.const 65536) "x"))"#;
    let buf = wast::parser::ParseBuffer::new(source).unwrap();
    let mut wat = wast::parser::parse::<wast::Wat>(&buf).unwrap();
    let module = wex_decoder::decode_module(&wat.encode().unwrap()).unwrap();
    let (module, index) = wex_rewrite::rewrite_module(&module).unwrap();
    wex_validate::validate_module(&module, &index).unwrap();
    let err = engine.instantiate(&module, &index).unwrap_err();
    assert_eq!(err.message, "out of bounds memory access");
}

#[test]
fn recursion_is_depth_bounded() {
    let mut engine = engine();
    engine.config.max_call_depth = 64;
    let instance = instantiate(
        &mut engine,
        r#"(module
             (func $spin (export "spin") call $spin))"#,
    );
    let err = invoke(&mut engine, instance, "spin", &[]).unwrap_err();
    assert_eq!(err.message, "call stack exhausted");
}

#[test]
fn table_ops_and_ref_func() {
    let mut engine = engine();
    let instance = instantiate(
        &mut engine,
        r#"(module
             (table $t 4 funcref)
             (func $answer (result i32) (i32.const 42))
             (elem declare func $answer)
             (func (export "plant") (param i32)
               local.get 0
               ref.func $answer
               table.set $t)
             (func (export "harvest") (param i32) (result i32)
               local.get 0
               call_indirect $t (type 0)))"#,
    );
    invoke(&mut engine, instance, "plant", &[Value::I32(2)]).unwrap();
    let results = invoke(&mut engine, instance, "harvest", &[Value::I32(2)]).unwrap();
    assert_eq!(results, vec![Value::I32(42)]);
    let err = invoke(&mut engine, instance, "harvest", &[Value::I32(0)]).unwrap_err();
    assert_eq!(err.message, "uninitialized element");
}
