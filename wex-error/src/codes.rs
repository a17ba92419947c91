// WEX - wex-error
// Module: WEX Error Codes
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Error code constants for the WEX toolchain.
//!
//! Codes are grouped in ranges by category so a code alone identifies the
//! failing pipeline stage.

// Parse errors (1000-1099): produced by the binary decoder.

/// Input ended before a complete item could be read.
pub const UNEXPECTED_END: u16 = 1000;
/// The `\0asm` magic bytes were not found.
pub const MAGIC_HEADER_NOT_DETECTED: u16 = 1001;
/// The version field is not the supported binary version 1.
pub const UNKNOWN_BINARY_VERSION: u16 = 1002;
/// A section body was longer or shorter than its declared size.
pub const SECTION_SIZE_MISMATCH: u16 = 1003;
/// A LEB128 encoding used more groups than its bit width allows.
pub const INTEGER_REPRESENTATION_TOO_LONG: u16 = 1004;
/// A LEB128 encoding decoded to a value outside its bit width.
pub const INTEGER_TOO_LARGE: u16 = 1005;
/// An opcode byte outside the supported instruction set.
pub const ILLEGAL_OPCODE: u16 = 1006;
/// A name was not valid UTF-8.
pub const MALFORMED_UTF8: u16 = 1007;
/// A non-custom section appeared out of canonical order or twice.
pub const UNEXPECTED_SECTION: u16 = 1008;
/// The data-count section disagrees with the data section.
pub const DATA_COUNT_MISMATCH: u16 = 1009;
/// The function and code sections declare different lengths.
pub const FUNC_CODE_MISMATCH: u16 = 1010;
/// A malformed value, reference, or block type byte.
pub const MALFORMED_TYPE: u16 = 1011;
/// A malformed mutability, limits, or segment-mode flag.
pub const MALFORMED_FLAG: u16 = 1012;
/// Bytes remained after the final section.
pub const TRAILING_BYTES: u16 = 1013;

// Validation errors (2000-2099): produced by the rewriter and type checker.

/// Reference to a type index outside the type section.
pub const UNKNOWN_TYPE: u16 = 2000;
/// Reference to an undefined function index or name.
pub const UNKNOWN_FUNCTION: u16 = 2001;
/// Reference to an undefined table index or name.
pub const UNKNOWN_TABLE: u16 = 2002;
/// Reference to an undefined memory index or name.
pub const UNKNOWN_MEMORY: u16 = 2003;
/// Reference to an undefined global index or name.
pub const UNKNOWN_GLOBAL: u16 = 2004;
/// Reference to an undefined local index or name.
pub const UNKNOWN_LOCAL: u16 = 2005;
/// Branch to a label deeper than the current block nesting.
pub const UNKNOWN_LABEL: u16 = 2006;
/// Reference to an undefined element segment.
pub const UNKNOWN_ELEM_SEGMENT: u16 = 2007;
/// Reference to an undefined data segment.
pub const UNKNOWN_DATA_SEGMENT: u16 = 2008;
/// Two items of the same kind were bound to one identifier.
pub const DUPLICATE_NAME: u16 = 2009;
/// An initializer used an instruction outside the constant subset.
pub const CONSTANT_EXPRESSION_REQUIRED: u16 = 2010;
/// `global.set` on an immutable global.
pub const GLOBAL_IS_IMMUTABLE: u16 = 2011;
/// The start function is not `[] -> []`.
pub const START_FUNCTION: u16 = 2012;
/// An inline block signature disagrees with its declared type index.
pub const INLINE_FUNCTION_TYPE: u16 = 2013;
/// A memarg alignment exceeds the access width.
pub const ALIGNMENT_TOO_LARGE: u16 = 2014;
/// Operand stack shape does not match the instruction signature.
pub const TYPE_MISMATCH: u16 = 2015;
/// `ref.func` on a function never declared as referenceable.
pub const UNDECLARED_FUNCTION_REFERENCE: u16 = 2016;
/// `memory.init`/`data.drop` without a data-count section.
pub const DATA_COUNT_REQUIRED: u16 = 2017;
/// Memory or table limits exceed the specification bounds.
pub const LIMITS_TOO_LARGE: u16 = 2018;
/// Limits with `min` greater than `max`.
pub const LIMITS_ORDER: u16 = 2019;

// Trap codes (3000-3099): typed runtime traps.

/// `unreachable` was executed.
pub const TRAP_UNREACHABLE: u16 = 3000;
/// A load or store fell outside linear memory.
pub const TRAP_OUT_OF_BOUNDS_MEMORY: u16 = 3001;
/// A table access fell outside the table.
pub const TRAP_OUT_OF_BOUNDS_TABLE: u16 = 3002;
/// `call_indirect` through an out-of-range table index.
pub const TRAP_UNDEFINED_ELEMENT: u16 = 3003;
/// `call_indirect` through a null table entry.
pub const TRAP_UNINITIALIZED_ELEMENT: u16 = 3004;
/// Signed overflow in division, remainder, or truncation.
pub const TRAP_INTEGER_OVERFLOW: u16 = 3005;
/// Integer division or remainder by zero.
pub const TRAP_INTEGER_DIVIDE_BY_ZERO: u16 = 3006;
/// Truncation of a NaN to an integer.
pub const TRAP_INVALID_CONVERSION: u16 = 3007;
/// `call_indirect` where the callee type differs from the declared type.
pub const TRAP_INDIRECT_CALL_TYPE_MISMATCH: u16 = 3008;
/// A host function received operands of the wrong type.
pub const TRAP_EXTERN_CALL_ARG_TYPE_MISMATCH: u16 = 3009;

// Link errors (4000-4099): produced by the linker.

/// No export matched an import's module and item names.
pub const UNKNOWN_IMPORT: u16 = 4000;
/// An export matched an import's names but not its type.
pub const INCOMPATIBLE_IMPORT_TYPE: u16 = 4001;
/// Invocation of an export that does not exist.
pub const UNKNOWN_EXPORT: u16 = 4002;
/// Registration under an already-registered module name.
pub const DUPLICATE_REGISTRATION: u16 = 4003;

// Runtime errors (5000-5099): engine-level failures that are not traps.

/// The frame stack reached the configured depth limit.
pub const CALL_STACK_EXHAUSTED: u16 = 5000;
/// The configured instruction budget was exceeded.
pub const STEP_LIMIT_EXCEEDED: u16 = 5001;
/// The configured symbolic path budget was exceeded.
pub const PATH_LIMIT_EXCEEDED: u16 = 5002;
/// An operation outside the supported feature set.
pub const NOT_SUPPORTED: u16 = 5003;
/// A caller supplied arguments of the wrong arity or type.
pub const INVALID_ARGUMENT: u16 = 5004;
/// A symbolic value reached a position that requires a concrete one.
pub const SYMBOLIC_VALUE_REQUIRED: u16 = 5005;
/// The solver rejected or could not process a query.
pub const SOLVER_FAILURE: u16 = 5006;
/// A path's accumulated assumptions became unsatisfiable.
pub const ASSUMPTION_UNSATISFIABLE: u16 = 5007;
/// A symbolic assertion has a satisfiable negation.
pub const ASSERTION_VIOLATION: u16 = 5008;
