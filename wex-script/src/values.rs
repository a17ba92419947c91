// WEX - wex-script
// Module: WEX Script Value Conversion
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Conversion between `wast` argument/result forms and runtime values.

use anyhow::{bail, Result};
use wast::core::{AbstractHeapType, HeapType, NanPattern, WastArgCore, WastRetCore};
use wast::{WastArg, WastRet};

use wex_runtime::Value;

/// Converts an invocation argument.
pub fn arg_to_value(arg: &WastArg) -> Result<Value> {
    let WastArg::Core(core) = arg else {
        bail!("component-model arguments are not supported");
    };
    let value = match core {
        WastArgCore::I32(v) => Value::I32(*v),
        WastArgCore::I64(v) => Value::I64(*v),
        WastArgCore::F32(v) => Value::F32(f32::from_bits(v.bits)),
        WastArgCore::F64(v) => Value::F64(f64::from_bits(v.bits)),
        WastArgCore::RefNull(ty) => null_of(ty)?,
        WastArgCore::RefExtern(v) => Value::ExternRef(Some(*v)),
        other => bail!("unsupported argument {other:?}"),
    };
    Ok(value)
}

/// Converts a list of invocation arguments.
pub fn args_to_values(args: &[WastArg]) -> Result<Vec<Value>> {
    args.iter().map(arg_to_value).collect()
}

fn null_of(ty: &HeapType) -> Result<Value> {
    match ty {
        HeapType::Abstract {
            ty: AbstractHeapType::Func,
            ..
        } => Ok(Value::FuncRef(None)),
        HeapType::Abstract {
            ty: AbstractHeapType::Extern,
            ..
        } => Ok(Value::ExternRef(None)),
        other => bail!("unsupported reference type {other:?}"),
    }
}

/// Whether an actual result matches one expected result pattern.
///
/// Integer and reference expectations are exact; float expectations are
/// bit-exact unless they are NaN patterns, which accept any canonical
/// (respectively arithmetic) NaN of the right width.
pub fn result_matches(actual: &Value, expected: &WastRet) -> Result<bool> {
    let WastRet::Core(core) = expected else {
        bail!("component-model results are not supported");
    };
    let matches = match (actual, core) {
        (Value::I32(a), WastRetCore::I32(e)) => a == e,
        (Value::I64(a), WastRetCore::I64(e)) => a == e,
        (Value::F32(a), WastRetCore::F32(pattern)) => match pattern {
            NanPattern::CanonicalNan => a.to_bits() & 0x7fff_ffff == 0x7fc0_0000,
            NanPattern::ArithmeticNan => a.is_nan() && a.to_bits() & 0x0040_0000 != 0,
            NanPattern::Value(e) => a.to_bits() == e.bits,
        },
        (Value::F64(a), WastRetCore::F64(pattern)) => match pattern {
            NanPattern::CanonicalNan => {
                a.to_bits() & 0x7fff_ffff_ffff_ffff == 0x7ff8_0000_0000_0000
            }
            NanPattern::ArithmeticNan => a.is_nan() && a.to_bits() & 0x0008_0000_0000_0000 != 0,
            NanPattern::Value(e) => a.to_bits() == e.bits,
        },
        (value, WastRetCore::RefNull(_)) => value.is_null_ref(),
        (Value::ExternRef(Some(a)), WastRetCore::RefExtern(Some(e))) => a == e,
        (Value::FuncRef(Some(_)), WastRetCore::RefFunc(_)) => true,
        _ => false,
    };
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_nan_pattern() {
        let expected = WastRet::Core(WastRetCore::F32(NanPattern::CanonicalNan));
        assert!(result_matches(
            &Value::F32(f32::from_bits(0x7fc0_0000)),
            &expected
        )
        .unwrap());
        assert!(result_matches(
            &Value::F32(f32::from_bits(0xffc0_0000)),
            &expected
        )
        .unwrap());
        assert!(!result_matches(&Value::F32(1.0), &expected).unwrap());
    }

    #[test]
    fn exact_float_bits() {
        let expected = WastRet::Core(WastRetCore::F64(NanPattern::Value(wast::token::F64 {
            bits: (-0.0f64).to_bits(),
        })));
        assert!(result_matches(&Value::F64(-0.0), &expected).unwrap());
        assert!(!result_matches(&Value::F64(0.0), &expected).unwrap());
    }
}
