// WEX - wex-runtime
// Module: WEX Trapping Arithmetic
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Trapping and wrapping arithmetic primitives.
//!
//! Integer add/sub/mul wrap; division and remainder trap on a zero
//! divisor and on `INT_MIN / -1` (remainder of `INT_MIN % -1` is 0, not a
//! trap). Shift counts are masked modulo the operand width. Float
//! arithmetic follows IEEE-754 with NaN results canonicalised (quiet bit
//! set, positive sign) so runs are deterministic. Checked truncations
//! trap on NaN and out-of-range inputs; the saturating forms clamp.

use wex_error::Result;

use crate::values::Trap;

/// The canonical quiet `f32` NaN (payload bit 22 set, positive).
const CANONICAL_NAN_32: u32 = 0x7fc0_0000;
/// The canonical quiet `f64` NaN (payload bit 51 set, positive).
const CANONICAL_NAN_64: u64 = 0x7ff8_0000_0000_0000;

/// Canonicalises an `f32` NaN result.
#[must_use]
pub fn canonicalize_f32(value: f32) -> f32 {
    if value.is_nan() {
        f32::from_bits(CANONICAL_NAN_32)
    } else {
        value
    }
}

/// Canonicalises an `f64` NaN result.
#[must_use]
pub fn canonicalize_f64(value: f64) -> f64 {
    if value.is_nan() {
        f64::from_bits(CANONICAL_NAN_64)
    } else {
        value
    }
}

// Signed division and remainder.

/// `i32.div_s`, trapping on zero and overflow.
pub fn i32_div_s(a: i32, b: i32) -> Result<i32> {
    if b == 0 {
        return Err(Trap::IntegerDivideByZero.into());
    }
    if a == i32::MIN && b == -1 {
        return Err(Trap::IntegerOverflow.into());
    }
    Ok(a.wrapping_div(b))
}

/// `i32.div_u`, trapping on zero.
pub fn i32_div_u(a: u32, b: u32) -> Result<u32> {
    if b == 0 {
        return Err(Trap::IntegerDivideByZero.into());
    }
    Ok(a / b)
}

/// `i32.rem_s`, trapping on zero; `INT_MIN % -1` is 0.
pub fn i32_rem_s(a: i32, b: i32) -> Result<i32> {
    if b == 0 {
        return Err(Trap::IntegerDivideByZero.into());
    }
    Ok(a.wrapping_rem(b))
}

/// `i32.rem_u`, trapping on zero.
pub fn i32_rem_u(a: u32, b: u32) -> Result<u32> {
    if b == 0 {
        return Err(Trap::IntegerDivideByZero.into());
    }
    Ok(a % b)
}

/// `i64.div_s`, trapping on zero and overflow.
pub fn i64_div_s(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Err(Trap::IntegerDivideByZero.into());
    }
    if a == i64::MIN && b == -1 {
        return Err(Trap::IntegerOverflow.into());
    }
    Ok(a.wrapping_div(b))
}

/// `i64.div_u`, trapping on zero.
pub fn i64_div_u(a: u64, b: u64) -> Result<u64> {
    if b == 0 {
        return Err(Trap::IntegerDivideByZero.into());
    }
    Ok(a / b)
}

/// `i64.rem_s`, trapping on zero; `INT_MIN % -1` is 0.
pub fn i64_rem_s(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Err(Trap::IntegerDivideByZero.into());
    }
    Ok(a.wrapping_rem(b))
}

/// `i64.rem_u`, trapping on zero.
pub fn i64_rem_u(a: u64, b: u64) -> Result<u64> {
    if b == 0 {
        return Err(Trap::IntegerDivideByZero.into());
    }
    Ok(a % b)
}

// Float minimum/maximum with WebAssembly NaN and zero-sign semantics:
// any NaN operand produces NaN, and -0 orders below +0.

/// `f32.min`.
#[must_use]
pub fn f32_min(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::from_bits(CANONICAL_NAN_32)
    } else if a < b {
        a
    } else if b < a {
        b
    } else if a.is_sign_negative() {
        a
    } else {
        b
    }
}

/// `f32.max`.
#[must_use]
pub fn f32_max(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::from_bits(CANONICAL_NAN_32)
    } else if a > b {
        a
    } else if b > a {
        b
    } else if a.is_sign_positive() {
        a
    } else {
        b
    }
}

/// `f64.min`.
#[must_use]
pub fn f64_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::from_bits(CANONICAL_NAN_64)
    } else if a < b {
        a
    } else if b < a {
        b
    } else if a.is_sign_negative() {
        a
    } else {
        b
    }
}

/// `f64.max`.
#[must_use]
pub fn f64_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::from_bits(CANONICAL_NAN_64)
    } else if a > b {
        a
    } else if b > a {
        b
    } else if a.is_sign_positive() {
        a
    } else {
        b
    }
}

// Checked truncations. The trapping forms reject NaN and out-of-range
// inputs; the ranges are checked in f64 so f32 inputs lose no precision.

/// `i32.trunc_f32_s` / `i32.trunc_f64_s`.
pub fn i32_trunc_s(value: f64) -> Result<i32> {
    if value.is_nan() {
        return Err(Trap::InvalidConversionToInteger.into());
    }
    let truncated = value.trunc();
    if truncated < -2_147_483_648.0 || truncated > 2_147_483_647.0 {
        return Err(Trap::IntegerOverflow.into());
    }
    Ok(truncated as i32)
}

/// `i32.trunc_f32_u` / `i32.trunc_f64_u`.
pub fn i32_trunc_u(value: f64) -> Result<u32> {
    if value.is_nan() {
        return Err(Trap::InvalidConversionToInteger.into());
    }
    let truncated = value.trunc();
    if truncated < 0.0 || truncated > 4_294_967_295.0 {
        return Err(Trap::IntegerOverflow.into());
    }
    Ok(truncated as u32)
}

/// `i64.trunc_f32_s` / `i64.trunc_f64_s`.
pub fn i64_trunc_s(value: f64) -> Result<i64> {
    if value.is_nan() {
        return Err(Trap::InvalidConversionToInteger.into());
    }
    let truncated = value.trunc();
    // 2^63 is exactly representable; anything >= it overflows.
    if truncated < -9_223_372_036_854_775_808.0 || truncated >= 9_223_372_036_854_775_808.0 {
        return Err(Trap::IntegerOverflow.into());
    }
    Ok(truncated as i64)
}

/// `i64.trunc_f32_u` / `i64.trunc_f64_u`.
pub fn i64_trunc_u(value: f64) -> Result<u64> {
    if value.is_nan() {
        return Err(Trap::InvalidConversionToInteger.into());
    }
    let truncated = value.trunc();
    if truncated < 0.0 || truncated >= 18_446_744_073_709_551_616.0 {
        return Err(Trap::IntegerOverflow.into());
    }
    Ok(truncated as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wex_error::ErrorCategory;

    #[test]
    fn div_s_overflow_and_zero_trap() {
        assert_eq!(i32_div_s(7, -2).unwrap(), -3);
        let err = i32_div_s(i32::MIN, -1).unwrap_err();
        assert_eq!(err.message, "integer overflow");
        let err = i32_div_s(1, 0).unwrap_err();
        assert_eq!(err.message, "integer divide by zero");
        assert_eq!(err.category, ErrorCategory::Trap);
    }

    #[test]
    fn rem_s_min_by_minus_one_is_zero() {
        assert_eq!(i32_rem_s(i32::MIN, -1).unwrap(), 0);
        assert_eq!(i64_rem_s(i64::MIN, -1).unwrap(), 0);
    }

    #[test]
    fn min_max_handle_zero_signs() {
        assert!(f32_min(0.0, -0.0).is_sign_negative());
        assert!(f32_max(-0.0, 0.0).is_sign_positive());
        assert!(f64_min(-0.0, 0.0).is_sign_negative());
    }

    #[test]
    fn min_max_propagate_canonical_nan() {
        let nan = f32_min(f32::NAN, 1.0);
        assert_eq!(nan.to_bits(), 0x7fc0_0000);
    }

    #[test]
    fn trunc_boundaries() {
        assert_eq!(i32_trunc_s(-2_147_483_648.9).unwrap(), i32::MIN);
        assert!(i32_trunc_s(2_147_483_648.0).is_err());
        assert!(i32_trunc_s(f64::NAN).unwrap_err().message == "invalid conversion to integer");
        assert_eq!(i32_trunc_u(4_294_967_295.9).unwrap(), u32::MAX);
        assert!(i64_trunc_s(9_223_372_036_854_775_808.0).is_err());
    }
}
