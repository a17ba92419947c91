// WEX - wex-script
// Module: WEX Spectest Host Module
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The `spectest` host module the reference suite links against.

use log::info;

use wex_format::types::{
    FuncType, GlobalType, Limits, MemoryType, RefType, TableType, ValueType,
};
use wex_runtime::{Evaluator, HostModule, Value};

/// Builds the `spectest` host module: print functions, the 666 globals,
/// a small memory, and a small table.
#[must_use]
pub fn spectest_module<E: Evaluator>() -> HostModule<E> {
    let mut host = HostModule::new("spectest");

    print_func(&mut host, "print", Vec::new());
    print_func(&mut host, "print_i32", vec![ValueType::I32]);
    print_func(&mut host, "print_i64", vec![ValueType::I64]);
    print_func(&mut host, "print_f32", vec![ValueType::F32]);
    print_func(&mut host, "print_f64", vec![ValueType::F64]);
    print_func(
        &mut host,
        "print_i32_f32",
        vec![ValueType::I32, ValueType::F32],
    );
    print_func(
        &mut host,
        "print_f64_f64",
        vec![ValueType::F64, ValueType::F64],
    );

    host.add_global(
        "global_i32",
        GlobalType {
            value_type: ValueType::I32,
            mutable: false,
        },
        Value::I32(666),
    );
    host.add_global(
        "global_i64",
        GlobalType {
            value_type: ValueType::I64,
            mutable: false,
        },
        Value::I64(666),
    );
    host.add_global(
        "global_f32",
        GlobalType {
            value_type: ValueType::F32,
            mutable: false,
        },
        Value::F32(666.6),
    );
    host.add_global(
        "global_f64",
        GlobalType {
            value_type: ValueType::F64,
            mutable: false,
        },
        Value::F64(666.6),
    );

    host.add_memory(
        "memory",
        MemoryType {
            limits: Limits {
                min: 1,
                max: Some(2),
            },
        },
    );
    host.add_table(
        "table",
        TableType {
            element: RefType::Func,
            limits: Limits {
                min: 10,
                max: Some(20),
            },
        },
    );

    host
}

fn print_func<E: Evaluator>(host: &mut HostModule<E>, name: &str, params: Vec<ValueType>) {
    let label = name.to_string();
    host.add_func(
        name,
        FuncType::new(params, Vec::new()),
        move |_eval: &mut E, args: &[E::Value]| {
            info!("spectest {label}: {args:?}");
            Ok(Vec::new())
        },
    );
}
