//! WebAssembly binary format primitives.
//!
//! Byte-level constants shared by the decoder and encoder, the LEB128
//! integer codec with the diagnostics the reference suite expects, and
//! the module encoder.

use wex_error::{codes, Error, Result};

use crate::instructions::{Instruction, MemArg};
use crate::module::{
    DataMode, ElementMode, ExternKind, ImportDesc, Module,
};
use crate::types::{BlockType, GlobalType, ItemRef, Limits, RefType, TableType, ValueType};

/// Magic bytes for WebAssembly modules: `\0asm`.
pub const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];

/// WebAssembly binary format version.
pub const WASM_VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// WebAssembly section IDs, in canonical order.
pub const CUSTOM_SECTION_ID: u8 = 0x00;
pub const TYPE_SECTION_ID: u8 = 0x01;
pub const IMPORT_SECTION_ID: u8 = 0x02;
pub const FUNCTION_SECTION_ID: u8 = 0x03;
pub const TABLE_SECTION_ID: u8 = 0x04;
pub const MEMORY_SECTION_ID: u8 = 0x05;
pub const GLOBAL_SECTION_ID: u8 = 0x06;
pub const EXPORT_SECTION_ID: u8 = 0x07;
pub const START_SECTION_ID: u8 = 0x08;
pub const ELEMENT_SECTION_ID: u8 = 0x09;
pub const CODE_SECTION_ID: u8 = 0x0A;
pub const DATA_SECTION_ID: u8 = 0x0B;
pub const DATA_COUNT_SECTION_ID: u8 = 0x0C;

/// WebAssembly type bytes.
pub const FUNC_TYPE: u8 = 0x60;
pub const I32_TYPE: u8 = 0x7F;
pub const I64_TYPE: u8 = 0x7E;
pub const F32_TYPE: u8 = 0x7D;
pub const F64_TYPE: u8 = 0x7C;
pub const FUNCREF_TYPE: u8 = 0x70;
pub const EXTERNREF_TYPE: u8 = 0x6F;
pub const VOID_TYPE: u8 = 0x40;

/// WebAssembly control instructions.
pub const UNREACHABLE: u8 = 0x00;
pub const NOP: u8 = 0x01;
pub const BLOCK: u8 = 0x02;
pub const LOOP: u8 = 0x03;
pub const IF: u8 = 0x04;
pub const ELSE: u8 = 0x05;
pub const END: u8 = 0x0B;
pub const BR: u8 = 0x0C;
pub const BR_IF: u8 = 0x0D;
pub const BR_TABLE: u8 = 0x0E;
pub const RETURN: u8 = 0x0F;
pub const CALL: u8 = 0x10;
pub const CALL_INDIRECT: u8 = 0x11;

/// WebAssembly parametric and reference instructions.
pub const DROP: u8 = 0x1A;
pub const SELECT: u8 = 0x1B;
pub const SELECT_T: u8 = 0x1C;
pub const REF_NULL: u8 = 0xD0;
pub const REF_IS_NULL: u8 = 0xD1;
pub const REF_FUNC: u8 = 0xD2;

/// WebAssembly variable instructions.
pub const LOCAL_GET: u8 = 0x20;
pub const LOCAL_SET: u8 = 0x21;
pub const LOCAL_TEE: u8 = 0x22;
pub const GLOBAL_GET: u8 = 0x23;
pub const GLOBAL_SET: u8 = 0x24;

/// WebAssembly constant instructions.
pub const I32_CONST: u8 = 0x41;
pub const I64_CONST: u8 = 0x42;
pub const F32_CONST: u8 = 0x43;
pub const F64_CONST: u8 = 0x44;

/// Prefix byte for the two-byte miscellaneous opcode space.
pub const MISC_PREFIX: u8 = 0xFC;

const ERR_UNEXPECTED_END: Error =
    Error::parse(codes::UNEXPECTED_END, "unexpected end");
const ERR_TOO_LONG: Error = Error::parse(
    codes::INTEGER_REPRESENTATION_TOO_LONG,
    "integer representation too long",
);
const ERR_TOO_LARGE: Error = Error::parse(codes::INTEGER_TOO_LARGE, "integer too large");

/// Reads an unsigned LEB128 integer of at most `bits` bits.
///
/// Returns the value and the number of bytes consumed. Fails with
/// "integer representation too long" when the encoding uses more than
/// `ceil(bits / 7)` groups and with "integer too large" when the decoded
/// value does not fit in `bits` bits.
fn read_leb128_unsigned(bytes: &[u8], pos: usize, bits: u32) -> Result<(u64, usize)> {
    let max_groups = bits.div_ceil(7) as usize;
    let mut result: u128 = 0;
    let mut shift = 0u32;
    let mut offset = 0usize;

    loop {
        if offset == max_groups {
            return Err(ERR_TOO_LONG);
        }
        let byte = *bytes.get(pos + offset).ok_or(ERR_UNEXPECTED_END)?;
        offset += 1;

        result |= u128::from(byte & 0x7F) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            break;
        }
    }

    if bits < 128 && result >> bits != 0 {
        return Err(ERR_TOO_LARGE);
    }
    Ok((result as u64, offset))
}

/// Reads a signed LEB128 integer of at most `bits` bits.
///
/// Sign-extends from the final group's `0x40` bit and range-checks against
/// `[-2^(bits-1), 2^(bits-1))`.
fn read_leb128_signed(bytes: &[u8], pos: usize, bits: u32) -> Result<(i64, usize)> {
    let max_groups = bits.div_ceil(7) as usize;
    let mut result: i128 = 0;
    let mut shift = 0u32;
    let mut offset = 0usize;

    loop {
        if offset == max_groups {
            return Err(ERR_TOO_LONG);
        }
        let byte = *bytes.get(pos + offset).ok_or(ERR_UNEXPECTED_END)?;
        offset += 1;

        result |= i128::from(byte & 0x7F) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            if byte & 0x40 != 0 {
                result |= -1i128 << shift;
            }
            break;
        }
    }

    let min = -(1i128 << (bits - 1));
    let max = 1i128 << (bits - 1);
    if result < min || result >= max {
        return Err(ERR_TOO_LARGE);
    }
    Ok((result as i64, offset))
}

/// Reads a LEB128 `u32` from `bytes` at `pos`.
pub fn read_leb128_u32(bytes: &[u8], pos: usize) -> Result<(u32, usize)> {
    let (value, len) = read_leb128_unsigned(bytes, pos, 32)?;
    Ok((value as u32, len))
}

/// Reads a LEB128 `u64` from `bytes` at `pos`.
pub fn read_leb128_u64(bytes: &[u8], pos: usize) -> Result<(u64, usize)> {
    read_leb128_unsigned(bytes, pos, 64)
}

/// Reads a signed LEB128 `i32` from `bytes` at `pos`.
pub fn read_leb128_i32(bytes: &[u8], pos: usize) -> Result<(i32, usize)> {
    let (value, len) = read_leb128_signed(bytes, pos, 32)?;
    Ok((value as i32, len))
}

/// Reads a signed LEB128 `i64` from `bytes` at `pos`.
pub fn read_leb128_i64(bytes: &[u8], pos: usize) -> Result<(i64, usize)> {
    read_leb128_signed(bytes, pos, 64)
}

/// Reads a signed 33-bit LEB128 integer, used by block types.
pub fn read_leb128_s33(bytes: &[u8], pos: usize) -> Result<(i64, usize)> {
    read_leb128_signed(bytes, pos, 33)
}

/// Writes an unsigned LEB128 integer.
pub fn write_leb128_u32(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Writes a signed LEB128 integer.
pub fn write_leb128_i64(out: &mut Vec<u8>, mut value: i64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        let sign_clear = byte & 0x40 == 0;
        if (value == 0 && sign_clear) || (value == -1 && !sign_clear) {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Writes a signed LEB128 `i32`.
pub fn write_leb128_i32(out: &mut Vec<u8>, value: i32) {
    write_leb128_i64(out, i64::from(value));
}

/// Reads a length-prefixed UTF-8 name.
pub fn read_name(bytes: &[u8], pos: usize) -> Result<(String, usize)> {
    let (len, len_size) = read_leb128_u32(bytes, pos)?;
    let start = pos + len_size;
    let end = start
        .checked_add(len as usize)
        .ok_or(ERR_UNEXPECTED_END)?;
    let slice = bytes.get(start..end).ok_or(ERR_UNEXPECTED_END)?;
    let name = core::str::from_utf8(slice)
        .map_err(|_| Error::parse(codes::MALFORMED_UTF8, "malformed UTF-8 encoding"))?;
    Ok((name.to_string(), len_size + len as usize))
}

/// Maps a value type to its binary byte.
#[must_use]
pub const fn value_type_byte(ty: ValueType) -> u8 {
    match ty {
        ValueType::I32 => I32_TYPE,
        ValueType::I64 => I64_TYPE,
        ValueType::F32 => F32_TYPE,
        ValueType::F64 => F64_TYPE,
        ValueType::FuncRef => FUNCREF_TYPE,
        ValueType::ExternRef => EXTERNREF_TYPE,
    }
}

/// Maps a binary byte to a value type.
pub fn parse_value_type(byte: u8) -> Result<ValueType> {
    match byte {
        I32_TYPE => Ok(ValueType::I32),
        I64_TYPE => Ok(ValueType::I64),
        F32_TYPE => Ok(ValueType::F32),
        F64_TYPE => Ok(ValueType::F64),
        FUNCREF_TYPE => Ok(ValueType::FuncRef),
        EXTERNREF_TYPE => Ok(ValueType::ExternRef),
        _ => Err(Error::parse(codes::MALFORMED_TYPE, "malformed value type")),
    }
}

/// Maps a binary byte to a reference type.
pub fn parse_ref_type(byte: u8) -> Result<RefType> {
    match byte {
        FUNCREF_TYPE => Ok(RefType::Func),
        EXTERNREF_TYPE => Ok(RefType::Extern),
        _ => Err(Error::parse(codes::MALFORMED_TYPE, "malformed reference type")),
    }
}

// ---------------------------------------------------------------------------
// Module encoder
// ---------------------------------------------------------------------------

/// Encodes a module into the canonical WebAssembly binary format.
///
/// Decoding the result yields the original AST; for modules that were
/// themselves decoded from a canonically encoded binary, the bytes round
/// trip exactly, up to custom-section interleaving (custom sections are
/// re-emitted after the last standard section).
#[must_use]
pub fn encode_module(module: &Module) -> Vec<u8> {
    let mut out = Vec::with_capacity(1024);
    out.extend_from_slice(&WASM_MAGIC);
    out.extend_from_slice(&WASM_VERSION);

    if !module.types.is_empty() {
        let mut body = Vec::new();
        write_leb128_u32(&mut body, module.types.len() as u32);
        for def in &module.types {
            body.push(FUNC_TYPE);
            write_result_type(&mut body, &def.ty.params);
            write_result_type(&mut body, &def.ty.results);
        }
        write_section(&mut out, TYPE_SECTION_ID, &body);
    }

    if !module.imports.is_empty() {
        let mut body = Vec::new();
        write_leb128_u32(&mut body, module.imports.len() as u32);
        for import in &module.imports {
            write_name(&mut body, &import.module);
            write_name(&mut body, &import.item);
            match &import.desc {
                ImportDesc::Func(ty) => {
                    body.push(0x00);
                    write_leb128_u32(&mut body, ty.index());
                }
                ImportDesc::Table(ty) => {
                    body.push(0x01);
                    write_table_type(&mut body, ty);
                }
                ImportDesc::Memory(ty) => {
                    body.push(0x02);
                    write_limits(&mut body, &ty.limits);
                }
                ImportDesc::Global(ty) => {
                    body.push(0x03);
                    write_global_type(&mut body, ty);
                }
            }
        }
        write_section(&mut out, IMPORT_SECTION_ID, &body);
    }

    if !module.funcs.is_empty() {
        let mut body = Vec::new();
        write_leb128_u32(&mut body, module.funcs.len() as u32);
        for func in &module.funcs {
            write_leb128_u32(&mut body, func.ty.index());
        }
        write_section(&mut out, FUNCTION_SECTION_ID, &body);
    }

    if !module.tables.is_empty() {
        let mut body = Vec::new();
        write_leb128_u32(&mut body, module.tables.len() as u32);
        for table in &module.tables {
            write_table_type(&mut body, &table.ty);
        }
        write_section(&mut out, TABLE_SECTION_ID, &body);
    }

    if !module.memories.is_empty() {
        let mut body = Vec::new();
        write_leb128_u32(&mut body, module.memories.len() as u32);
        for memory in &module.memories {
            write_limits(&mut body, &memory.ty.limits);
        }
        write_section(&mut out, MEMORY_SECTION_ID, &body);
    }

    if !module.globals.is_empty() {
        let mut body = Vec::new();
        write_leb128_u32(&mut body, module.globals.len() as u32);
        for global in &module.globals {
            write_global_type(&mut body, &global.ty);
            write_expr(&mut body, &global.init);
        }
        write_section(&mut out, GLOBAL_SECTION_ID, &body);
    }

    if !module.exports.is_empty() {
        let mut body = Vec::new();
        write_leb128_u32(&mut body, module.exports.len() as u32);
        for export in &module.exports {
            write_name(&mut body, &export.name);
            body.push(match export.kind {
                ExternKind::Func => 0x00,
                ExternKind::Table => 0x01,
                ExternKind::Memory => 0x02,
                ExternKind::Global => 0x03,
            });
            write_leb128_u32(&mut body, export.item.index());
        }
        write_section(&mut out, EXPORT_SECTION_ID, &body);
    }

    if let Some(start) = &module.start {
        let mut body = Vec::new();
        write_leb128_u32(&mut body, start.index());
        write_section(&mut out, START_SECTION_ID, &body);
    }

    if !module.elems.is_empty() {
        let mut body = Vec::new();
        write_leb128_u32(&mut body, module.elems.len() as u32);
        for elem in &module.elems {
            write_element_segment(&mut body, elem);
        }
        write_section(&mut out, ELEMENT_SECTION_ID, &body);
    }

    if let Some(count) = module.data_count {
        let mut body = Vec::new();
        write_leb128_u32(&mut body, count);
        write_section(&mut out, DATA_COUNT_SECTION_ID, &body);
    }

    if !module.funcs.is_empty() {
        let mut body = Vec::new();
        write_leb128_u32(&mut body, module.funcs.len() as u32);
        for func in &module.funcs {
            let mut code = Vec::new();
            write_locals(&mut code, func);
            for instr in &func.body {
                write_instruction(&mut code, instr);
            }
            code.push(END);
            write_leb128_u32(&mut body, code.len() as u32);
            body.extend_from_slice(&code);
        }
        write_section(&mut out, CODE_SECTION_ID, &body);
    }

    if !module.datas.is_empty() {
        let mut body = Vec::new();
        write_leb128_u32(&mut body, module.datas.len() as u32);
        for data in &module.datas {
            match &data.mode {
                DataMode::Active { memory, offset } if memory.index() == 0 => {
                    write_leb128_u32(&mut body, 0);
                    write_expr(&mut body, offset);
                }
                DataMode::Passive => {
                    write_leb128_u32(&mut body, 1);
                }
                DataMode::Active { memory, offset } => {
                    write_leb128_u32(&mut body, 2);
                    write_leb128_u32(&mut body, memory.index());
                    write_expr(&mut body, offset);
                }
            }
            write_leb128_u32(&mut body, data.init.len() as u32);
            body.extend_from_slice(&data.init);
        }
        write_section(&mut out, DATA_SECTION_ID, &body);
    }

    for custom in &module.customs {
        let mut body = Vec::new();
        write_name(&mut body, &custom.name);
        body.extend_from_slice(&custom.data);
        write_section(&mut out, CUSTOM_SECTION_ID, &body);
    }

    out
}

fn write_section(out: &mut Vec<u8>, id: u8, body: &[u8]) {
    out.push(id);
    write_leb128_u32(out, body.len() as u32);
    out.extend_from_slice(body);
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    write_leb128_u32(out, name.len() as u32);
    out.extend_from_slice(name.as_bytes());
}

fn write_result_type(out: &mut Vec<u8>, types: &[ValueType]) {
    write_leb128_u32(out, types.len() as u32);
    for ty in types {
        out.push(value_type_byte(*ty));
    }
}

fn write_limits(out: &mut Vec<u8>, limits: &Limits) {
    match limits.max {
        None => {
            out.push(0x00);
            write_leb128_u32(out, limits.min);
        }
        Some(max) => {
            out.push(0x01);
            write_leb128_u32(out, limits.min);
            write_leb128_u32(out, max);
        }
    }
}

fn write_table_type(out: &mut Vec<u8>, ty: &TableType) {
    out.push(match ty.element {
        RefType::Func => FUNCREF_TYPE,
        RefType::Extern => EXTERNREF_TYPE,
    });
    write_limits(out, &ty.limits);
}

fn write_global_type(out: &mut Vec<u8>, ty: &GlobalType) {
    out.push(value_type_byte(ty.value_type));
    out.push(u8::from(ty.mutable));
}

fn write_expr(out: &mut Vec<u8>, expr: &[Instruction]) {
    for instr in expr {
        write_instruction(out, instr);
    }
    out.push(END);
}

fn write_block_type(out: &mut Vec<u8>, bt: &BlockType) {
    match bt {
        BlockType::Empty => out.push(VOID_TYPE),
        BlockType::Value(ty) => out.push(value_type_byte(*ty)),
        BlockType::Type(idx) => write_leb128_i64(out, i64::from(idx.index())),
        BlockType::Inline(sig) => {
            // Only rewritten modules are encoded; inline signatures never
            // survive rewriting. Fall back to the hint when present.
            debug_assert!(false, "inline block type after rewrite");
            if let Some(idx) = &sig.index {
                write_leb128_i64(out, i64::from(idx.index()));
            } else {
                out.push(VOID_TYPE);
            }
        }
    }
}

/// Collapses consecutive locals of one type into `(count, type)` runs.
fn write_locals(out: &mut Vec<u8>, func: &crate::module::Function) {
    let mut runs: Vec<(u32, ValueType)> = Vec::new();
    for local in &func.locals {
        match runs.last_mut() {
            Some((count, ty)) if *ty == local.ty => *count += 1,
            _ => runs.push((1, local.ty)),
        }
    }
    write_leb128_u32(out, runs.len() as u32);
    for (count, ty) in runs {
        write_leb128_u32(out, count);
        out.push(value_type_byte(ty));
    }
}

fn write_memarg(out: &mut Vec<u8>, memarg: &MemArg) {
    write_leb128_u32(out, memarg.align);
    write_leb128_u32(out, memarg.offset);
}

fn write_item_ref(out: &mut Vec<u8>, item: &ItemRef) {
    write_leb128_u32(out, item.index());
}

fn write_element_segment(out: &mut Vec<u8>, elem: &crate::module::ElementSegment) {
    // Prefer the compact function-index encodings (flags 0..=3) when every
    // item is a plain `ref.func` and the type is funcref.
    let func_indices: Option<Vec<u32>> = if elem.ty == RefType::Func {
        elem.items
            .iter()
            .map(|expr| match expr.as_slice() {
                [Instruction::RefFunc(idx)] => Some(idx.index()),
                _ => None,
            })
            .collect()
    } else {
        None
    };

    match (&elem.mode, func_indices) {
        (ElementMode::Active { table, offset }, Some(indices)) if table.index() == 0 => {
            write_leb128_u32(out, 0);
            write_expr(out, offset);
            write_u32_vec(out, &indices);
        }
        (ElementMode::Passive, Some(indices)) => {
            write_leb128_u32(out, 1);
            out.push(0x00); // elemkind: funcref
            write_u32_vec(out, &indices);
        }
        (ElementMode::Active { table, offset }, Some(indices)) => {
            write_leb128_u32(out, 2);
            write_leb128_u32(out, table.index());
            write_expr(out, offset);
            out.push(0x00);
            write_u32_vec(out, &indices);
        }
        (ElementMode::Declarative, Some(indices)) => {
            write_leb128_u32(out, 3);
            out.push(0x00);
            write_u32_vec(out, &indices);
        }
        (ElementMode::Active { table, offset }, None) if table.index() == 0 => {
            write_leb128_u32(out, 4);
            write_expr(out, offset);
            write_expr_vec(out, &elem.items);
        }
        (ElementMode::Passive, None) => {
            write_leb128_u32(out, 5);
            out.push(ref_type_byte(elem.ty));
            write_expr_vec(out, &elem.items);
        }
        (ElementMode::Active { table, offset }, None) => {
            write_leb128_u32(out, 6);
            write_leb128_u32(out, table.index());
            write_expr(out, offset);
            out.push(ref_type_byte(elem.ty));
            write_expr_vec(out, &elem.items);
        }
        (ElementMode::Declarative, None) => {
            write_leb128_u32(out, 7);
            out.push(ref_type_byte(elem.ty));
            write_expr_vec(out, &elem.items);
        }
    }
}

const fn ref_type_byte(ty: RefType) -> u8 {
    match ty {
        RefType::Func => FUNCREF_TYPE,
        RefType::Extern => EXTERNREF_TYPE,
    }
}

fn write_u32_vec(out: &mut Vec<u8>, values: &[u32]) {
    write_leb128_u32(out, values.len() as u32);
    for value in values {
        write_leb128_u32(out, *value);
    }
}

fn write_expr_vec(out: &mut Vec<u8>, exprs: &[Vec<Instruction>]) {
    write_leb128_u32(out, exprs.len() as u32);
    for expr in exprs {
        write_expr(out, expr);
    }
}

#[allow(clippy::too_many_lines)]
fn write_instruction(out: &mut Vec<u8>, instr: &Instruction) {
    use Instruction as I;
    match instr {
        I::Unreachable => out.push(UNREACHABLE),
        I::Nop => out.push(NOP),
        I::Block(_, bt, body) => {
            out.push(BLOCK);
            write_block_type(out, bt);
            for i in body {
                write_instruction(out, i);
            }
            out.push(END);
        }
        I::Loop(_, bt, body) => {
            out.push(LOOP);
            write_block_type(out, bt);
            for i in body {
                write_instruction(out, i);
            }
            out.push(END);
        }
        I::If(_, bt, then, otherwise) => {
            out.push(IF);
            write_block_type(out, bt);
            for i in then {
                write_instruction(out, i);
            }
            if !otherwise.is_empty() {
                out.push(ELSE);
                for i in otherwise {
                    write_instruction(out, i);
                }
            }
            out.push(END);
        }
        I::Br(label) => {
            out.push(BR);
            write_item_ref(out, label);
        }
        I::BrIf(label) => {
            out.push(BR_IF);
            write_item_ref(out, label);
        }
        I::BrTable(labels, default) => {
            out.push(BR_TABLE);
            write_leb128_u32(out, labels.len() as u32);
            for label in labels {
                write_item_ref(out, label);
            }
            write_item_ref(out, default);
        }
        I::Return => out.push(RETURN),
        I::Call(func) => {
            out.push(CALL);
            write_item_ref(out, func);
        }
        I::CallIndirect(ty, table) => {
            out.push(CALL_INDIRECT);
            write_item_ref(out, ty);
            write_item_ref(out, table);
        }
        I::RefNull(ty) => {
            out.push(REF_NULL);
            out.push(ref_type_byte(*ty));
        }
        I::RefIsNull => out.push(REF_IS_NULL),
        I::RefFunc(func) => {
            out.push(REF_FUNC);
            write_item_ref(out, func);
        }
        I::Drop => out.push(DROP),
        I::Select => out.push(SELECT),
        I::SelectT(types) => {
            out.push(SELECT_T);
            write_result_type(out, types);
        }
        I::LocalGet(idx) => {
            out.push(LOCAL_GET);
            write_item_ref(out, idx);
        }
        I::LocalSet(idx) => {
            out.push(LOCAL_SET);
            write_item_ref(out, idx);
        }
        I::LocalTee(idx) => {
            out.push(LOCAL_TEE);
            write_item_ref(out, idx);
        }
        I::GlobalGet(idx) => {
            out.push(GLOBAL_GET);
            write_item_ref(out, idx);
        }
        I::GlobalSet(idx) => {
            out.push(GLOBAL_SET);
            write_item_ref(out, idx);
        }
        I::TableGet(idx) => {
            out.push(0x25);
            write_item_ref(out, idx);
        }
        I::TableSet(idx) => {
            out.push(0x26);
            write_item_ref(out, idx);
        }
        I::I32Load(m) => {
            out.push(0x28);
            write_memarg(out, m);
        }
        I::I64Load(m) => {
            out.push(0x29);
            write_memarg(out, m);
        }
        I::F32Load(m) => {
            out.push(0x2A);
            write_memarg(out, m);
        }
        I::F64Load(m) => {
            out.push(0x2B);
            write_memarg(out, m);
        }
        I::I32Load8S(m) => {
            out.push(0x2C);
            write_memarg(out, m);
        }
        I::I32Load8U(m) => {
            out.push(0x2D);
            write_memarg(out, m);
        }
        I::I32Load16S(m) => {
            out.push(0x2E);
            write_memarg(out, m);
        }
        I::I32Load16U(m) => {
            out.push(0x2F);
            write_memarg(out, m);
        }
        I::I64Load8S(m) => {
            out.push(0x30);
            write_memarg(out, m);
        }
        I::I64Load8U(m) => {
            out.push(0x31);
            write_memarg(out, m);
        }
        I::I64Load16S(m) => {
            out.push(0x32);
            write_memarg(out, m);
        }
        I::I64Load16U(m) => {
            out.push(0x33);
            write_memarg(out, m);
        }
        I::I64Load32S(m) => {
            out.push(0x34);
            write_memarg(out, m);
        }
        I::I64Load32U(m) => {
            out.push(0x35);
            write_memarg(out, m);
        }
        I::I32Store(m) => {
            out.push(0x36);
            write_memarg(out, m);
        }
        I::I64Store(m) => {
            out.push(0x37);
            write_memarg(out, m);
        }
        I::F32Store(m) => {
            out.push(0x38);
            write_memarg(out, m);
        }
        I::F64Store(m) => {
            out.push(0x39);
            write_memarg(out, m);
        }
        I::I32Store8(m) => {
            out.push(0x3A);
            write_memarg(out, m);
        }
        I::I32Store16(m) => {
            out.push(0x3B);
            write_memarg(out, m);
        }
        I::I64Store8(m) => {
            out.push(0x3C);
            write_memarg(out, m);
        }
        I::I64Store16(m) => {
            out.push(0x3D);
            write_memarg(out, m);
        }
        I::I64Store32(m) => {
            out.push(0x3E);
            write_memarg(out, m);
        }
        I::MemorySize => {
            out.push(0x3F);
            out.push(0x00);
        }
        I::MemoryGrow => {
            out.push(0x40);
            out.push(0x00);
        }
        I::I32Const(v) => {
            out.push(I32_CONST);
            write_leb128_i32(out, *v);
        }
        I::I64Const(v) => {
            out.push(I64_CONST);
            write_leb128_i64(out, *v);
        }
        I::F32Const(v) => {
            out.push(F32_CONST);
            out.extend_from_slice(&v.to_le_bytes());
        }
        I::F64Const(v) => {
            out.push(F64_CONST);
            out.extend_from_slice(&v.to_le_bytes());
        }
        I::I32Eqz => out.push(0x45),
        I::I32Eq => out.push(0x46),
        I::I32Ne => out.push(0x47),
        I::I32LtS => out.push(0x48),
        I::I32LtU => out.push(0x49),
        I::I32GtS => out.push(0x4A),
        I::I32GtU => out.push(0x4B),
        I::I32LeS => out.push(0x4C),
        I::I32LeU => out.push(0x4D),
        I::I32GeS => out.push(0x4E),
        I::I32GeU => out.push(0x4F),
        I::I64Eqz => out.push(0x50),
        I::I64Eq => out.push(0x51),
        I::I64Ne => out.push(0x52),
        I::I64LtS => out.push(0x53),
        I::I64LtU => out.push(0x54),
        I::I64GtS => out.push(0x55),
        I::I64GtU => out.push(0x56),
        I::I64LeS => out.push(0x57),
        I::I64LeU => out.push(0x58),
        I::I64GeS => out.push(0x59),
        I::I64GeU => out.push(0x5A),
        I::F32Eq => out.push(0x5B),
        I::F32Ne => out.push(0x5C),
        I::F32Lt => out.push(0x5D),
        I::F32Gt => out.push(0x5E),
        I::F32Le => out.push(0x5F),
        I::F32Ge => out.push(0x60),
        I::F64Eq => out.push(0x61),
        I::F64Ne => out.push(0x62),
        I::F64Lt => out.push(0x63),
        I::F64Gt => out.push(0x64),
        I::F64Le => out.push(0x65),
        I::F64Ge => out.push(0x66),
        I::I32Clz => out.push(0x67),
        I::I32Ctz => out.push(0x68),
        I::I32Popcnt => out.push(0x69),
        I::I32Add => out.push(0x6A),
        I::I32Sub => out.push(0x6B),
        I::I32Mul => out.push(0x6C),
        I::I32DivS => out.push(0x6D),
        I::I32DivU => out.push(0x6E),
        I::I32RemS => out.push(0x6F),
        I::I32RemU => out.push(0x70),
        I::I32And => out.push(0x71),
        I::I32Or => out.push(0x72),
        I::I32Xor => out.push(0x73),
        I::I32Shl => out.push(0x74),
        I::I32ShrS => out.push(0x75),
        I::I32ShrU => out.push(0x76),
        I::I32Rotl => out.push(0x77),
        I::I32Rotr => out.push(0x78),
        I::I64Clz => out.push(0x79),
        I::I64Ctz => out.push(0x7A),
        I::I64Popcnt => out.push(0x7B),
        I::I64Add => out.push(0x7C),
        I::I64Sub => out.push(0x7D),
        I::I64Mul => out.push(0x7E),
        I::I64DivS => out.push(0x7F),
        I::I64DivU => out.push(0x80),
        I::I64RemS => out.push(0x81),
        I::I64RemU => out.push(0x82),
        I::I64And => out.push(0x83),
        I::I64Or => out.push(0x84),
        I::I64Xor => out.push(0x85),
        I::I64Shl => out.push(0x86),
        I::I64ShrS => out.push(0x87),
        I::I64ShrU => out.push(0x88),
        I::I64Rotl => out.push(0x89),
        I::I64Rotr => out.push(0x8A),
        I::F32Abs => out.push(0x8B),
        I::F32Neg => out.push(0x8C),
        I::F32Ceil => out.push(0x8D),
        I::F32Floor => out.push(0x8E),
        I::F32Trunc => out.push(0x8F),
        I::F32Nearest => out.push(0x90),
        I::F32Sqrt => out.push(0x91),
        I::F32Add => out.push(0x92),
        I::F32Sub => out.push(0x93),
        I::F32Mul => out.push(0x94),
        I::F32Div => out.push(0x95),
        I::F32Min => out.push(0x96),
        I::F32Max => out.push(0x97),
        I::F32Copysign => out.push(0x98),
        I::F64Abs => out.push(0x99),
        I::F64Neg => out.push(0x9A),
        I::F64Ceil => out.push(0x9B),
        I::F64Floor => out.push(0x9C),
        I::F64Trunc => out.push(0x9D),
        I::F64Nearest => out.push(0x9E),
        I::F64Sqrt => out.push(0x9F),
        I::F64Add => out.push(0xA0),
        I::F64Sub => out.push(0xA1),
        I::F64Mul => out.push(0xA2),
        I::F64Div => out.push(0xA3),
        I::F64Min => out.push(0xA4),
        I::F64Max => out.push(0xA5),
        I::F64Copysign => out.push(0xA6),
        I::I32WrapI64 => out.push(0xA7),
        I::I32TruncF32S => out.push(0xA8),
        I::I32TruncF32U => out.push(0xA9),
        I::I32TruncF64S => out.push(0xAA),
        I::I32TruncF64U => out.push(0xAB),
        I::I64ExtendI32S => out.push(0xAC),
        I::I64ExtendI32U => out.push(0xAD),
        I::I64TruncF32S => out.push(0xAE),
        I::I64TruncF32U => out.push(0xAF),
        I::I64TruncF64S => out.push(0xB0),
        I::I64TruncF64U => out.push(0xB1),
        I::F32ConvertI32S => out.push(0xB2),
        I::F32ConvertI32U => out.push(0xB3),
        I::F32ConvertI64S => out.push(0xB4),
        I::F32ConvertI64U => out.push(0xB5),
        I::F32DemoteF64 => out.push(0xB6),
        I::F64ConvertI32S => out.push(0xB7),
        I::F64ConvertI32U => out.push(0xB8),
        I::F64ConvertI64S => out.push(0xB9),
        I::F64ConvertI64U => out.push(0xBA),
        I::F64PromoteF32 => out.push(0xBB),
        I::I32ReinterpretF32 => out.push(0xBC),
        I::I64ReinterpretF64 => out.push(0xBD),
        I::F32ReinterpretI32 => out.push(0xBE),
        I::F64ReinterpretI64 => out.push(0xBF),
        I::I32Extend8S => out.push(0xC0),
        I::I32Extend16S => out.push(0xC1),
        I::I64Extend8S => out.push(0xC2),
        I::I64Extend16S => out.push(0xC3),
        I::I64Extend32S => out.push(0xC4),
        I::I32TruncSatF32S => write_misc(out, 0),
        I::I32TruncSatF32U => write_misc(out, 1),
        I::I32TruncSatF64S => write_misc(out, 2),
        I::I32TruncSatF64U => write_misc(out, 3),
        I::I64TruncSatF32S => write_misc(out, 4),
        I::I64TruncSatF32U => write_misc(out, 5),
        I::I64TruncSatF64S => write_misc(out, 6),
        I::I64TruncSatF64U => write_misc(out, 7),
        I::MemoryInit(data) => {
            write_misc(out, 8);
            write_item_ref(out, data);
            out.push(0x00);
        }
        I::DataDrop(data) => {
            write_misc(out, 9);
            write_item_ref(out, data);
        }
        I::MemoryCopy => {
            write_misc(out, 10);
            out.push(0x00);
            out.push(0x00);
        }
        I::MemoryFill => {
            write_misc(out, 11);
            out.push(0x00);
        }
        I::TableInit(elem, table) => {
            write_misc(out, 12);
            write_item_ref(out, elem);
            write_item_ref(out, table);
        }
        I::ElemDrop(elem) => {
            write_misc(out, 13);
            write_item_ref(out, elem);
        }
        I::TableCopy(dst, src) => {
            write_misc(out, 14);
            write_item_ref(out, dst);
            write_item_ref(out, src);
        }
        I::TableGrow(table) => {
            write_misc(out, 15);
            write_item_ref(out, table);
        }
        I::TableSize(table) => {
            write_misc(out, 16);
            write_item_ref(out, table);
        }
        I::TableFill(table) => {
            write_misc(out, 17);
            write_item_ref(out, table);
        }
    }
}

fn write_misc(out: &mut Vec<u8>, op: u32) {
    out.push(MISC_PREFIX);
    write_leb128_u32(out, op);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leb128_u32_roundtrip() {
        for value in [0u32, 1, 127, 128, 624_485, u32::MAX] {
            let mut buf = Vec::new();
            write_leb128_u32(&mut buf, value);
            let (decoded, len) = read_leb128_u32(&buf, 0).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(len, buf.len());
        }
    }

    #[test]
    fn leb128_i64_roundtrip() {
        for value in [0i64, -1, 63, -64, 64, -65, i64::MIN, i64::MAX] {
            let mut buf = Vec::new();
            write_leb128_i64(&mut buf, value);
            let (decoded, len) = read_leb128_i64(&buf, 0).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(len, buf.len());
        }
    }

    #[test]
    fn leb128_u32_rejects_six_groups() {
        // Six continuation groups exceed ceil(32 / 7) = 5.
        let bytes = [0x80, 0x80, 0x80, 0x80, 0x80, 0x00];
        let err = read_leb128_u32(&bytes, 0).unwrap_err();
        assert_eq!(err.message, "integer representation too long");
    }

    #[test]
    fn leb128_u32_rejects_overflow_bits() {
        // Five groups, but the final group carries bits above 2^32.
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0x10];
        let err = read_leb128_u32(&bytes, 0).unwrap_err();
        assert_eq!(err.message, "integer too large");
    }

    #[test]
    fn leb128_i32_sign_extension() {
        // -1 encoded minimally.
        let (value, len) = read_leb128_i32(&[0x7F], 0).unwrap();
        assert_eq!(value, -1);
        assert_eq!(len, 1);

        // -1 with a redundant continuation group is still -1.
        let (value, _) = read_leb128_i32(&[0xFF, 0x7F], 0).unwrap();
        assert_eq!(value, -1);
    }

    #[test]
    fn leb128_i32_range_check() {
        // 2^31 does not fit in i32.
        let bytes = [0x80, 0x80, 0x80, 0x80, 0x08];
        let err = read_leb128_i32(&bytes, 0).unwrap_err();
        assert_eq!(err.message, "integer too large");
    }

    #[test]
    fn leb128_truncated_input() {
        let err = read_leb128_u32(&[0x80], 0).unwrap_err();
        assert_eq!(err.message, "unexpected end");
    }

    #[test]
    fn name_roundtrip() {
        let mut buf = Vec::new();
        write_name(&mut buf, "memory");
        let (name, len) = read_name(&buf, 0).unwrap();
        assert_eq!(name, "memory");
        assert_eq!(len, buf.len());
    }

    #[test]
    fn name_rejects_bad_utf8() {
        let buf = vec![0x02, 0xC0, 0x00];
        let err = read_name(&buf, 0).unwrap_err();
        assert_eq!(err.message, "malformed UTF-8 encoding");
    }
}
