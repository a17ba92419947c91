// WEX - wex-decoder
// Module: WEX Instruction Decoding
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Instruction and expression decoding.
//!
//! A flat byte-to-constructor dispatch covering the supported opcode set.
//! `0xFC` selects the two-byte miscellaneous space; its second byte is
//! itself LEB128-encoded. Structured control reads nested bodies up to the
//! matching terminator: `block`/`loop` up to `0x0B` (end), `if` up to
//! `0x05` (else) or `0x0B`.

use wex_error::{codes, Error, Result};
use wex_format::binary::{self, ELSE, END};
use wex_format::instructions::{Instruction, MemArg};
use wex_format::types::{BlockType, ItemRef};

use crate::reader::Reader;

const ERR_ILLEGAL_OPCODE: Error = Error::parse(codes::ILLEGAL_OPCODE, "illegal opcode");
const ERR_ZERO_BYTE: Error = Error::parse(codes::MALFORMED_FLAG, "zero byte expected");

/// Reads an expression: instructions up to and including `end`.
pub fn read_expr(reader: &mut Reader<'_>) -> Result<Vec<Instruction>> {
    let (body, terminator) = read_until(reader, false)?;
    debug_assert_eq!(terminator, END);
    Ok(body)
}

/// Reads instructions until `end` (always a terminator) or, when
/// `stop_at_else` is set, `else`. Returns the body and the terminator
/// byte actually seen.
fn read_until(reader: &mut Reader<'_>, stop_at_else: bool) -> Result<(Vec<Instruction>, u8)> {
    let mut body = Vec::new();
    loop {
        let opcode = reader.read_u8()?;
        if opcode == END || (stop_at_else && opcode == ELSE) {
            return Ok((body, opcode));
        }
        body.push(read_instruction(reader, opcode)?);
    }
}

fn read_block_type(reader: &mut Reader<'_>) -> Result<BlockType> {
    let byte = reader.peek_u8()?;
    if byte == binary::VOID_TYPE {
        reader.read_u8()?;
        return Ok(BlockType::Empty);
    }
    if let Ok(ty) = binary::parse_value_type(byte) {
        reader.read_u8()?;
        return Ok(BlockType::Value(ty));
    }
    let index = reader.read_s33()?;
    if index < 0 {
        return Err(Error::parse(codes::MALFORMED_TYPE, "malformed block type"));
    }
    Ok(BlockType::Type(ItemRef::Index(index as u32)))
}

fn read_memarg(reader: &mut Reader<'_>) -> Result<MemArg> {
    let align = reader.read_u32()?;
    let offset = reader.read_u32()?;
    Ok(MemArg { align, offset })
}

fn read_index(reader: &mut Reader<'_>) -> Result<ItemRef> {
    Ok(ItemRef::Index(reader.read_u32()?))
}

fn expect_zero_byte(reader: &mut Reader<'_>) -> Result<()> {
    if reader.read_u8()? != 0x00 {
        return Err(ERR_ZERO_BYTE);
    }
    Ok(())
}

/// Decodes one instruction whose opcode byte has already been consumed.
#[allow(clippy::too_many_lines)]
pub fn read_instruction(reader: &mut Reader<'_>, opcode: u8) -> Result<Instruction> {
    use Instruction as I;
    let instr = match opcode {
        // Control instructions
        0x00 => I::Unreachable,
        0x01 => I::Nop,
        0x02 => {
            let bt = read_block_type(reader)?;
            let (body, _) = read_until(reader, false)?;
            I::Block(None, bt, body)
        }
        0x03 => {
            let bt = read_block_type(reader)?;
            let (body, _) = read_until(reader, false)?;
            I::Loop(None, bt, body)
        }
        0x04 => {
            let bt = read_block_type(reader)?;
            let (then, terminator) = read_until(reader, true)?;
            let otherwise = if terminator == ELSE {
                let (body, _) = read_until(reader, false)?;
                body
            } else {
                Vec::new()
            };
            I::If(None, bt, then, otherwise)
        }
        0x0C => I::Br(read_index(reader)?),
        0x0D => I::BrIf(read_index(reader)?),
        0x0E => {
            let count = reader.read_u32()?;
            let mut labels = Vec::with_capacity(count as usize);
            for _ in 0..count {
                labels.push(read_index(reader)?);
            }
            let default = read_index(reader)?;
            I::BrTable(labels, default)
        }
        0x0F => I::Return,
        0x10 => I::Call(read_index(reader)?),
        0x11 => {
            let ty = read_index(reader)?;
            let table = read_index(reader)?;
            I::CallIndirect(ty, table)
        }

        // Parametric instructions
        0x1A => I::Drop,
        0x1B => I::Select,
        0x1C => {
            let count = reader.read_u32()?;
            let mut types = Vec::with_capacity(count as usize);
            for _ in 0..count {
                types.push(binary::parse_value_type(reader.read_u8()?)?);
            }
            I::SelectT(types)
        }

        // Variable instructions
        0x20 => I::LocalGet(read_index(reader)?),
        0x21 => I::LocalSet(read_index(reader)?),
        0x22 => I::LocalTee(read_index(reader)?),
        0x23 => I::GlobalGet(read_index(reader)?),
        0x24 => I::GlobalSet(read_index(reader)?),

        // Table instructions
        0x25 => I::TableGet(read_index(reader)?),
        0x26 => I::TableSet(read_index(reader)?),

        // Memory instructions
        0x28 => I::I32Load(read_memarg(reader)?),
        0x29 => I::I64Load(read_memarg(reader)?),
        0x2A => I::F32Load(read_memarg(reader)?),
        0x2B => I::F64Load(read_memarg(reader)?),
        0x2C => I::I32Load8S(read_memarg(reader)?),
        0x2D => I::I32Load8U(read_memarg(reader)?),
        0x2E => I::I32Load16S(read_memarg(reader)?),
        0x2F => I::I32Load16U(read_memarg(reader)?),
        0x30 => I::I64Load8S(read_memarg(reader)?),
        0x31 => I::I64Load8U(read_memarg(reader)?),
        0x32 => I::I64Load16S(read_memarg(reader)?),
        0x33 => I::I64Load16U(read_memarg(reader)?),
        0x34 => I::I64Load32S(read_memarg(reader)?),
        0x35 => I::I64Load32U(read_memarg(reader)?),
        0x36 => I::I32Store(read_memarg(reader)?),
        0x37 => I::I64Store(read_memarg(reader)?),
        0x38 => I::F32Store(read_memarg(reader)?),
        0x39 => I::F64Store(read_memarg(reader)?),
        0x3A => I::I32Store8(read_memarg(reader)?),
        0x3B => I::I32Store16(read_memarg(reader)?),
        0x3C => I::I64Store8(read_memarg(reader)?),
        0x3D => I::I64Store16(read_memarg(reader)?),
        0x3E => I::I64Store32(read_memarg(reader)?),
        0x3F => {
            expect_zero_byte(reader)?;
            I::MemorySize
        }
        0x40 => {
            expect_zero_byte(reader)?;
            I::MemoryGrow
        }

        // Numeric constants
        0x41 => I::I32Const(reader.read_i32()?),
        0x42 => I::I64Const(reader.read_i64()?),
        0x43 => I::F32Const(reader.read_f32()?),
        0x44 => I::F64Const(reader.read_f64()?),

        // I32 test, comparison, and arithmetic operations
        0x45 => I::I32Eqz,
        0x46 => I::I32Eq,
        0x47 => I::I32Ne,
        0x48 => I::I32LtS,
        0x49 => I::I32LtU,
        0x4A => I::I32GtS,
        0x4B => I::I32GtU,
        0x4C => I::I32LeS,
        0x4D => I::I32LeU,
        0x4E => I::I32GeS,
        0x4F => I::I32GeU,
        0x50 => I::I64Eqz,
        0x51 => I::I64Eq,
        0x52 => I::I64Ne,
        0x53 => I::I64LtS,
        0x54 => I::I64LtU,
        0x55 => I::I64GtS,
        0x56 => I::I64GtU,
        0x57 => I::I64LeS,
        0x58 => I::I64LeU,
        0x59 => I::I64GeS,
        0x5A => I::I64GeU,
        0x5B => I::F32Eq,
        0x5C => I::F32Ne,
        0x5D => I::F32Lt,
        0x5E => I::F32Gt,
        0x5F => I::F32Le,
        0x60 => I::F32Ge,
        0x61 => I::F64Eq,
        0x62 => I::F64Ne,
        0x63 => I::F64Lt,
        0x64 => I::F64Gt,
        0x65 => I::F64Le,
        0x66 => I::F64Ge,
        0x67 => I::I32Clz,
        0x68 => I::I32Ctz,
        0x69 => I::I32Popcnt,
        0x6A => I::I32Add,
        0x6B => I::I32Sub,
        0x6C => I::I32Mul,
        0x6D => I::I32DivS,
        0x6E => I::I32DivU,
        0x6F => I::I32RemS,
        0x70 => I::I32RemU,
        0x71 => I::I32And,
        0x72 => I::I32Or,
        0x73 => I::I32Xor,
        0x74 => I::I32Shl,
        0x75 => I::I32ShrS,
        0x76 => I::I32ShrU,
        0x77 => I::I32Rotl,
        0x78 => I::I32Rotr,
        0x79 => I::I64Clz,
        0x7A => I::I64Ctz,
        0x7B => I::I64Popcnt,
        0x7C => I::I64Add,
        0x7D => I::I64Sub,
        0x7E => I::I64Mul,
        0x7F => I::I64DivS,
        0x80 => I::I64DivU,
        0x81 => I::I64RemS,
        0x82 => I::I64RemU,
        0x83 => I::I64And,
        0x84 => I::I64Or,
        0x85 => I::I64Xor,
        0x86 => I::I64Shl,
        0x87 => I::I64ShrS,
        0x88 => I::I64ShrU,
        0x89 => I::I64Rotl,
        0x8A => I::I64Rotr,
        0x8B => I::F32Abs,
        0x8C => I::F32Neg,
        0x8D => I::F32Ceil,
        0x8E => I::F32Floor,
        0x8F => I::F32Trunc,
        0x90 => I::F32Nearest,
        0x91 => I::F32Sqrt,
        0x92 => I::F32Add,
        0x93 => I::F32Sub,
        0x94 => I::F32Mul,
        0x95 => I::F32Div,
        0x96 => I::F32Min,
        0x97 => I::F32Max,
        0x98 => I::F32Copysign,
        0x99 => I::F64Abs,
        0x9A => I::F64Neg,
        0x9B => I::F64Ceil,
        0x9C => I::F64Floor,
        0x9D => I::F64Trunc,
        0x9E => I::F64Nearest,
        0x9F => I::F64Sqrt,
        0xA0 => I::F64Add,
        0xA1 => I::F64Sub,
        0xA2 => I::F64Mul,
        0xA3 => I::F64Div,
        0xA4 => I::F64Min,
        0xA5 => I::F64Max,
        0xA6 => I::F64Copysign,

        // Conversions
        0xA7 => I::I32WrapI64,
        0xA8 => I::I32TruncF32S,
        0xA9 => I::I32TruncF32U,
        0xAA => I::I32TruncF64S,
        0xAB => I::I32TruncF64U,
        0xAC => I::I64ExtendI32S,
        0xAD => I::I64ExtendI32U,
        0xAE => I::I64TruncF32S,
        0xAF => I::I64TruncF32U,
        0xB0 => I::I64TruncF64S,
        0xB1 => I::I64TruncF64U,
        0xB2 => I::F32ConvertI32S,
        0xB3 => I::F32ConvertI32U,
        0xB4 => I::F32ConvertI64S,
        0xB5 => I::F32ConvertI64U,
        0xB6 => I::F32DemoteF64,
        0xB7 => I::F64ConvertI32S,
        0xB8 => I::F64ConvertI32U,
        0xB9 => I::F64ConvertI64S,
        0xBA => I::F64ConvertI64U,
        0xBB => I::F64PromoteF32,
        0xBC => I::I32ReinterpretF32,
        0xBD => I::I64ReinterpretF64,
        0xBE => I::F32ReinterpretI32,
        0xBF => I::F64ReinterpretI64,

        // Sign extension
        0xC0 => I::I32Extend8S,
        0xC1 => I::I32Extend16S,
        0xC2 => I::I64Extend8S,
        0xC3 => I::I64Extend16S,
        0xC4 => I::I64Extend32S,

        // Reference instructions
        0xD0 => I::RefNull(binary::parse_ref_type(reader.read_u8()?)?),
        0xD1 => I::RefIsNull,
        0xD2 => I::RefFunc(read_index(reader)?),

        // Two-byte miscellaneous opcodes
        0xFC => read_misc_instruction(reader)?,

        _ => return Err(ERR_ILLEGAL_OPCODE),
    };
    Ok(instr)
}

fn read_misc_instruction(reader: &mut Reader<'_>) -> Result<Instruction> {
    use Instruction as I;
    let instr = match reader.read_u32()? {
        0 => I::I32TruncSatF32S,
        1 => I::I32TruncSatF32U,
        2 => I::I32TruncSatF64S,
        3 => I::I32TruncSatF64U,
        4 => I::I64TruncSatF32S,
        5 => I::I64TruncSatF32U,
        6 => I::I64TruncSatF64S,
        7 => I::I64TruncSatF64U,
        8 => {
            let data = read_index(reader)?;
            expect_zero_byte(reader)?;
            I::MemoryInit(data)
        }
        9 => I::DataDrop(read_index(reader)?),
        10 => {
            expect_zero_byte(reader)?;
            expect_zero_byte(reader)?;
            I::MemoryCopy
        }
        11 => {
            expect_zero_byte(reader)?;
            I::MemoryFill
        }
        12 => {
            let elem = read_index(reader)?;
            let table = read_index(reader)?;
            I::TableInit(elem, table)
        }
        13 => I::ElemDrop(read_index(reader)?),
        14 => {
            let dst = read_index(reader)?;
            let src = read_index(reader)?;
            I::TableCopy(dst, src)
        }
        15 => I::TableGrow(read_index(reader)?),
        16 => I::TableSize(read_index(reader)?),
        17 => I::TableFill(read_index(reader)?),
        _ => return Err(ERR_ILLEGAL_OPCODE),
    };
    Ok(instr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_expr(bytes: &[u8]) -> Result<Vec<Instruction>> {
        let mut reader = Reader::new(bytes);
        let expr = read_expr(&mut reader)?;
        assert!(reader.is_empty());
        Ok(expr)
    }

    #[test]
    fn decodes_nested_blocks() {
        // block (result i32) i32.const 7 end
        let expr = decode_expr(&[0x02, 0x7F, 0x41, 0x07, 0x0B, 0x0B]).unwrap();
        assert_eq!(
            expr,
            vec![Instruction::Block(
                None,
                BlockType::Value(wex_format::ValueType::I32),
                vec![Instruction::I32Const(7)],
            )]
        );
    }

    #[test]
    fn decodes_if_with_else() {
        // i32.const 1  if (then nop) (else unreachable)  end
        let expr = decode_expr(&[0x41, 0x01, 0x04, 0x40, 0x01, 0x05, 0x00, 0x0B, 0x0B]).unwrap();
        assert_eq!(
            expr,
            vec![
                Instruction::I32Const(1),
                Instruction::If(
                    None,
                    BlockType::Empty,
                    vec![Instruction::Nop],
                    vec![Instruction::Unreachable],
                ),
            ]
        );
    }

    #[test]
    fn rejects_unknown_opcode() {
        let err = decode_expr(&[0xF5, 0x0B]).unwrap_err();
        assert_eq!(err.message, "illegal opcode");
    }

    #[test]
    fn rejects_nonzero_memory_index_byte() {
        // memory.size with a 0x01 reserved byte
        let err = decode_expr(&[0x3F, 0x01, 0x0B]).unwrap_err();
        assert_eq!(err.message, "zero byte expected");
    }

    #[test]
    fn decodes_trunc_sat() {
        let expr = decode_expr(&[0xFC, 0x00, 0x0B]).unwrap();
        assert_eq!(expr, vec![Instruction::I32TruncSatF32S]);
    }
}
