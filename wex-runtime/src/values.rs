// WEX - wex-runtime
// Module: WEX Runtime Values
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Concrete runtime values and typed traps.

use core::fmt;

use wex_error::{codes, Error, ErrorCategory, Result};
use wex_format::types::{RefType, ValueType};

/// A concrete WebAssembly runtime value.
///
/// References carry store-level addresses: a function reference holds a
/// function address, an extern reference an opaque host handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// 32-bit integer.
    I32(i32),
    /// 64-bit integer.
    I64(i64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// Nullable function reference.
    FuncRef(Option<u32>),
    /// Nullable external reference.
    ExternRef(Option<u32>),
}

impl Value {
    /// The value's type.
    #[must_use]
    pub const fn ty(&self) -> ValueType {
        match self {
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::F32(_) => ValueType::F32,
            Self::F64(_) => ValueType::F64,
            Self::FuncRef(_) => ValueType::FuncRef,
            Self::ExternRef(_) => ValueType::ExternRef,
        }
    }

    /// The zero/null value of a type, used for locals and table entries.
    #[must_use]
    pub const fn default_for(ty: ValueType) -> Self {
        match ty {
            ValueType::I32 => Self::I32(0),
            ValueType::I64 => Self::I64(0),
            ValueType::F32 => Self::F32(0.0),
            ValueType::F64 => Self::F64(0.0),
            ValueType::FuncRef => Self::FuncRef(None),
            ValueType::ExternRef => Self::ExternRef(None),
        }
    }

    /// The null reference of a reference type.
    #[must_use]
    pub const fn null(ty: RefType) -> Self {
        match ty {
            RefType::Func => Self::FuncRef(None),
            RefType::Extern => Self::ExternRef(None),
        }
    }

    /// Extracts an `i32`.
    pub fn as_i32(&self) -> Result<i32> {
        match self {
            Self::I32(v) => Ok(*v),
            _ => Err(type_error()),
        }
    }

    /// Extracts an `i64`.
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Self::I64(v) => Ok(*v),
            _ => Err(type_error()),
        }
    }

    /// Extracts an `f32`.
    pub fn as_f32(&self) -> Result<f32> {
        match self {
            Self::F32(v) => Ok(*v),
            _ => Err(type_error()),
        }
    }

    /// Extracts an `f64`.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Self::F64(v) => Ok(*v),
            _ => Err(type_error()),
        }
    }

    /// Extracts an `i32` reinterpreted as unsigned.
    pub fn as_u32(&self) -> Result<u32> {
        Ok(self.as_i32()? as u32)
    }

    /// Whether this is a null reference.
    #[must_use]
    pub const fn is_null_ref(&self) -> bool {
        matches!(self, Self::FuncRef(None) | Self::ExternRef(None))
    }

    /// Bit-exact equality: floats compare by bit pattern, so NaN payloads
    /// and zero signs are significant.
    #[must_use]
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::F32(a), Self::F32(b)) => a.to_bits() == b.to_bits(),
            (Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v} : i32"),
            Self::I64(v) => write!(f, "{v} : i64"),
            Self::F32(v) => write!(f, "{v} : f32"),
            Self::F64(v) => write!(f, "{v} : f64"),
            Self::FuncRef(None) => write!(f, "null : funcref"),
            Self::FuncRef(Some(a)) => write!(f, "func[{a}] : funcref"),
            Self::ExternRef(None) => write!(f, "null : externref"),
            Self::ExternRef(Some(a)) => write!(f, "extern[{a}] : externref"),
        }
    }
}

fn type_error() -> Error {
    Error::runtime(codes::INVALID_ARGUMENT, "value type mismatch")
}

/// Typed runtime traps.
///
/// A trap unwinds the frame stack to the nearest invocation boundary and
/// terminates the current path; sibling symbolic paths continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    /// `unreachable` executed.
    Unreachable,
    /// Memory access outside linear memory.
    OutOfBoundsMemoryAccess,
    /// Table access outside the table.
    OutOfBoundsTableAccess,
    /// `call_indirect` through an out-of-range table index.
    UndefinedElement,
    /// `call_indirect` through a null table entry.
    UninitializedElement,
    /// Signed overflow in division, remainder, or truncation.
    IntegerOverflow,
    /// Integer division or remainder by zero.
    IntegerDivideByZero,
    /// Truncation of a NaN.
    InvalidConversionToInteger,
    /// Callee type differs from the declared `call_indirect` type.
    IndirectCallTypeMismatch,
    /// Host function received ill-typed operands.
    ExternCallArgTypeMismatch,
}

impl Trap {
    /// The stable reference-suite message for this trap.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable",
            Self::OutOfBoundsMemoryAccess => "out of bounds memory access",
            Self::OutOfBoundsTableAccess => "out of bounds table access",
            Self::UndefinedElement => "undefined element",
            Self::UninitializedElement => "uninitialized element",
            Self::IntegerOverflow => "integer overflow",
            Self::IntegerDivideByZero => "integer divide by zero",
            Self::InvalidConversionToInteger => "invalid conversion to integer",
            Self::IndirectCallTypeMismatch => "indirect call type mismatch",
            Self::ExternCallArgTypeMismatch => "extern call argument type mismatch",
        }
    }

    const fn code(self) -> u16 {
        match self {
            Self::Unreachable => codes::TRAP_UNREACHABLE,
            Self::OutOfBoundsMemoryAccess => codes::TRAP_OUT_OF_BOUNDS_MEMORY,
            Self::OutOfBoundsTableAccess => codes::TRAP_OUT_OF_BOUNDS_TABLE,
            Self::UndefinedElement => codes::TRAP_UNDEFINED_ELEMENT,
            Self::UninitializedElement => codes::TRAP_UNINITIALIZED_ELEMENT,
            Self::IntegerOverflow => codes::TRAP_INTEGER_OVERFLOW,
            Self::IntegerDivideByZero => codes::TRAP_INTEGER_DIVIDE_BY_ZERO,
            Self::InvalidConversionToInteger => codes::TRAP_INVALID_CONVERSION,
            Self::IndirectCallTypeMismatch => codes::TRAP_INDIRECT_CALL_TYPE_MISMATCH,
            Self::ExternCallArgTypeMismatch => codes::TRAP_EXTERN_CALL_ARG_TYPE_MISMATCH,
        }
    }
}

impl From<Trap> for Error {
    fn from(trap: Trap) -> Self {
        Error::new(ErrorCategory::Trap, trap.code(), trap.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trap_errors_are_traps() {
        let err: Error = Trap::IntegerDivideByZero.into();
        assert!(err.is_trap());
        assert_eq!(err.message, "integer divide by zero");
    }

    #[test]
    fn bitwise_eq_distinguishes_nans_and_zero_signs() {
        let canonical = Value::F32(f32::from_bits(0x7fc0_0000));
        let payload = Value::F32(f32::from_bits(0x7fc0_0001));
        assert!(!canonical.bitwise_eq(&payload));
        assert!(canonical.bitwise_eq(&canonical));
        assert!(!Value::F64(0.0).bitwise_eq(&Value::F64(-0.0)));
    }
}
