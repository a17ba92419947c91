// WEX - wex-decoder
// Module: WEX Section Decoding
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Module decoding: header, section framing, and section contents.

use log::trace;

use wex_error::{codes, Error, Result};
use wex_format::binary::{self, WASM_MAGIC, WASM_VERSION};
use wex_format::module::{
    CustomSection, DataMode, DataSegment, ElementMode, ElementSegment, Export, ExternKind,
    Function, Global, Import, ImportDesc, Local, Memory, Module, Table, TypeDef,
};
use wex_format::types::{
    FuncType, GlobalType, ItemRef, Limits, MemoryType, RefType, TableType,
};
use wex_format::Instruction;

use crate::instructions::read_expr;
use crate::reader::Reader;

const ERR_SECTION_SIZE: Error =
    Error::parse(codes::SECTION_SIZE_MISMATCH, "section size mismatch");

/// Decodes a WebAssembly binary into a raw module AST.
///
/// The result still has to pass the rewriter and validator before it can
/// be linked; only well-formedness of the byte stream is checked here.
pub fn decode_module(bytes: &[u8]) -> Result<Module> {
    if bytes.len() < 4 || bytes[0..4] != WASM_MAGIC {
        return Err(Error::parse(
            codes::MAGIC_HEADER_NOT_DETECTED,
            "magic header not detected",
        ));
    }
    if bytes.len() < 8 || bytes[4..8] != WASM_VERSION {
        return Err(Error::parse(
            codes::UNKNOWN_BINARY_VERSION,
            "unknown binary version",
        ));
    }

    let mut reader = Reader::new(&bytes[8..]);
    let mut module = Module::new();
    // Type indices declared by the function section, paired with bodies by
    // the code section.
    let mut declared_funcs: Vec<u32> = Vec::new();
    let mut seen_code = false;
    let mut last_rank = 0u8;

    while !reader.is_empty() {
        let id = reader.read_u8()?;
        let size = reader.read_u32()?;
        let payload = reader.read_bytes(size as usize)?;
        let mut section = Reader::new(payload);
        trace!("section id {id} with {size} bytes");

        if id != binary::CUSTOM_SECTION_ID {
            let rank = section_rank(id)?;
            if rank <= last_rank {
                return Err(Error::parse(codes::UNEXPECTED_SECTION, "unexpected section"));
            }
            last_rank = rank;
        }

        match id {
            binary::CUSTOM_SECTION_ID => {
                let name = section.read_name()?;
                let data = section.read_bytes(section.remaining())?.to_vec();
                module.customs.push(CustomSection { name, data });
            }
            binary::TYPE_SECTION_ID => read_type_section(&mut section, &mut module)?,
            binary::IMPORT_SECTION_ID => read_import_section(&mut section, &mut module)?,
            binary::FUNCTION_SECTION_ID => {
                let count = section.read_u32()?;
                for _ in 0..count {
                    declared_funcs.push(section.read_u32()?);
                }
            }
            binary::TABLE_SECTION_ID => {
                let count = section.read_u32()?;
                for _ in 0..count {
                    let ty = read_table_type(&mut section)?;
                    module.tables.push(Table { name: None, ty });
                }
            }
            binary::MEMORY_SECTION_ID => {
                let count = section.read_u32()?;
                for _ in 0..count {
                    let limits = read_limits(&mut section)?;
                    module.memories.push(Memory {
                        name: None,
                        ty: MemoryType { limits },
                    });
                }
            }
            binary::GLOBAL_SECTION_ID => {
                let count = section.read_u32()?;
                for _ in 0..count {
                    let ty = read_global_type(&mut section)?;
                    let init = read_expr(&mut section)?;
                    module.globals.push(Global {
                        name: None,
                        ty,
                        init,
                    });
                }
            }
            binary::EXPORT_SECTION_ID => read_export_section(&mut section, &mut module)?,
            binary::START_SECTION_ID => {
                module.start = Some(ItemRef::Index(section.read_u32()?));
            }
            binary::ELEMENT_SECTION_ID => read_element_section(&mut section, &mut module)?,
            binary::DATA_COUNT_SECTION_ID => {
                module.data_count = Some(section.read_u32()?);
            }
            binary::CODE_SECTION_ID => {
                seen_code = true;
                read_code_section(&mut section, &mut module, &declared_funcs)?;
            }
            binary::DATA_SECTION_ID => read_data_section(&mut section, &mut module)?,
            _ => {
                return Err(Error::parse(codes::UNEXPECTED_SECTION, "malformed section id"));
            }
        }

        if !section.is_empty() {
            return Err(ERR_SECTION_SIZE);
        }
    }

    if !seen_code && !declared_funcs.is_empty() {
        return Err(Error::parse(
            codes::FUNC_CODE_MISMATCH,
            "function and code section have inconsistent lengths",
        ));
    }
    if let Some(count) = module.data_count {
        if count as usize != module.datas.len() {
            return Err(Error::parse(
                codes::DATA_COUNT_MISMATCH,
                "data count and data section have inconsistent lengths",
            ));
        }
    }

    Ok(module)
}

/// Canonical ordering rank of a non-custom section. The data-count
/// section sits between element and code.
fn section_rank(id: u8) -> Result<u8> {
    let rank = match id {
        binary::TYPE_SECTION_ID => 1,
        binary::IMPORT_SECTION_ID => 2,
        binary::FUNCTION_SECTION_ID => 3,
        binary::TABLE_SECTION_ID => 4,
        binary::MEMORY_SECTION_ID => 5,
        binary::GLOBAL_SECTION_ID => 6,
        binary::EXPORT_SECTION_ID => 7,
        binary::START_SECTION_ID => 8,
        binary::ELEMENT_SECTION_ID => 9,
        binary::DATA_COUNT_SECTION_ID => 10,
        binary::CODE_SECTION_ID => 11,
        binary::DATA_SECTION_ID => 12,
        _ => {
            return Err(Error::parse(codes::UNEXPECTED_SECTION, "malformed section id"));
        }
    };
    Ok(rank)
}

fn read_type_section(section: &mut Reader<'_>, module: &mut Module) -> Result<()> {
    let count = section.read_u32()?;
    for _ in 0..count {
        if section.read_u8()? != binary::FUNC_TYPE {
            return Err(Error::parse(codes::MALFORMED_TYPE, "malformed function type"));
        }
        let params = read_value_types(section)?;
        let results = read_value_types(section)?;
        module.types.push(TypeDef {
            name: None,
            ty: FuncType::new(params, results),
        });
    }
    Ok(())
}

fn read_value_types(section: &mut Reader<'_>) -> Result<Vec<wex_format::ValueType>> {
    let count = section.read_u32()?;
    let mut types = Vec::with_capacity(count.min(64) as usize);
    for _ in 0..count {
        types.push(binary::parse_value_type(section.read_u8()?)?);
    }
    Ok(types)
}

fn read_import_section(section: &mut Reader<'_>, module: &mut Module) -> Result<()> {
    let count = section.read_u32()?;
    for _ in 0..count {
        let module_name = section.read_name()?;
        let item = section.read_name()?;
        let desc = match section.read_u8()? {
            0x00 => ImportDesc::Func(ItemRef::Index(section.read_u32()?)),
            0x01 => ImportDesc::Table(read_table_type(section)?),
            0x02 => ImportDesc::Memory(MemoryType {
                limits: read_limits(section)?,
            }),
            0x03 => ImportDesc::Global(read_global_type(section)?),
            _ => {
                return Err(Error::parse(codes::MALFORMED_FLAG, "malformed import kind"));
            }
        };
        module.imports.push(Import {
            module: module_name,
            item,
            name: None,
            desc,
        });
    }
    Ok(())
}

fn read_export_section(section: &mut Reader<'_>, module: &mut Module) -> Result<()> {
    let count = section.read_u32()?;
    for _ in 0..count {
        let name = section.read_name()?;
        let kind = match section.read_u8()? {
            0x00 => ExternKind::Func,
            0x01 => ExternKind::Table,
            0x02 => ExternKind::Memory,
            0x03 => ExternKind::Global,
            _ => {
                return Err(Error::parse(codes::MALFORMED_FLAG, "malformed export kind"));
            }
        };
        let item = ItemRef::Index(section.read_u32()?);
        module.exports.push(Export { name, kind, item });
    }
    Ok(())
}

fn read_limits(section: &mut Reader<'_>) -> Result<Limits> {
    match section.read_u8()? {
        0x00 => Ok(Limits {
            min: section.read_u32()?,
            max: None,
        }),
        0x01 => {
            let min = section.read_u32()?;
            let max = section.read_u32()?;
            Ok(Limits {
                min,
                max: Some(max),
            })
        }
        _ => Err(Error::parse(codes::MALFORMED_FLAG, "malformed limits flag")),
    }
}

fn read_table_type(section: &mut Reader<'_>) -> Result<TableType> {
    let element = binary::parse_ref_type(section.read_u8()?)?;
    let limits = read_limits(section)?;
    Ok(TableType { element, limits })
}

fn read_global_type(section: &mut Reader<'_>) -> Result<GlobalType> {
    let value_type = binary::parse_value_type(section.read_u8()?)?;
    let mutable = match section.read_u8()? {
        0x00 => false,
        0x01 => true,
        _ => {
            return Err(Error::parse(codes::MALFORMED_FLAG, "malformed mutability"));
        }
    };
    Ok(GlobalType {
        value_type,
        mutable,
    })
}

fn read_element_section(section: &mut Reader<'_>, module: &mut Module) -> Result<()> {
    let count = section.read_u32()?;
    for _ in 0..count {
        let flags = section.read_u32()?;
        let segment = match flags {
            0 => {
                let offset = read_expr(section)?;
                ElementSegment {
                    name: None,
                    ty: RefType::Func,
                    items: read_func_index_items(section)?,
                    mode: ElementMode::Active {
                        table: ItemRef::Index(0),
                        offset,
                    },
                }
            }
            1 => ElementSegment {
                name: None,
                ty: read_elem_kind(section)?,
                items: read_func_index_items(section)?,
                mode: ElementMode::Passive,
            },
            2 => {
                let table = ItemRef::Index(section.read_u32()?);
                let offset = read_expr(section)?;
                ElementSegment {
                    name: None,
                    ty: read_elem_kind(section)?,
                    items: read_func_index_items(section)?,
                    mode: ElementMode::Active { table, offset },
                }
            }
            3 => ElementSegment {
                name: None,
                ty: read_elem_kind(section)?,
                items: read_func_index_items(section)?,
                mode: ElementMode::Declarative,
            },
            4 => {
                let offset = read_expr(section)?;
                ElementSegment {
                    name: None,
                    ty: RefType::Func,
                    items: read_expr_items(section)?,
                    mode: ElementMode::Active {
                        table: ItemRef::Index(0),
                        offset,
                    },
                }
            }
            5 => ElementSegment {
                name: None,
                ty: binary::parse_ref_type(section.read_u8()?)?,
                items: read_expr_items(section)?,
                mode: ElementMode::Passive,
            },
            6 => {
                let table = ItemRef::Index(section.read_u32()?);
                let offset = read_expr(section)?;
                ElementSegment {
                    name: None,
                    ty: binary::parse_ref_type(section.read_u8()?)?,
                    items: read_expr_items(section)?,
                    mode: ElementMode::Active { table, offset },
                }
            }
            7 => ElementSegment {
                name: None,
                ty: binary::parse_ref_type(section.read_u8()?)?,
                items: read_expr_items(section)?,
                mode: ElementMode::Declarative,
            },
            _ => {
                return Err(Error::parse(
                    codes::MALFORMED_FLAG,
                    "malformed element segment kind",
                ));
            }
        };
        module.elems.push(segment);
    }
    Ok(())
}

fn read_elem_kind(section: &mut Reader<'_>) -> Result<RefType> {
    if section.read_u8()? != 0x00 {
        return Err(Error::parse(
            codes::MALFORMED_FLAG,
            "malformed element segment kind",
        ));
    }
    Ok(RefType::Func)
}

fn read_func_index_items(section: &mut Reader<'_>) -> Result<Vec<Vec<Instruction>>> {
    let count = section.read_u32()?;
    let mut items = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        let func = section.read_u32()?;
        items.push(vec![Instruction::RefFunc(ItemRef::Index(func))]);
    }
    Ok(items)
}

fn read_expr_items(section: &mut Reader<'_>) -> Result<Vec<Vec<Instruction>>> {
    let count = section.read_u32()?;
    let mut items = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        items.push(read_expr(section)?);
    }
    Ok(items)
}

fn read_code_section(
    section: &mut Reader<'_>,
    module: &mut Module,
    declared_funcs: &[u32],
) -> Result<()> {
    let count = section.read_u32()?;
    if count as usize != declared_funcs.len() {
        return Err(Error::parse(
            codes::FUNC_CODE_MISMATCH,
            "function and code section have inconsistent lengths",
        ));
    }
    for ty in declared_funcs {
        let size = section.read_u32()?;
        let start = section.pos();
        let locals = read_locals(section)?;
        let body = read_expr(section)?;
        if section.pos() - start != size as usize {
            return Err(ERR_SECTION_SIZE);
        }
        module.funcs.push(Function {
            name: None,
            ty: ItemRef::Index(*ty),
            param_names: Vec::new(),
            locals,
            body,
        });
    }
    Ok(())
}

fn read_locals(section: &mut Reader<'_>) -> Result<Vec<Local>> {
    let run_count = section.read_u32()?;
    let mut locals = Vec::new();
    let mut total: u64 = 0;
    for _ in 0..run_count {
        let count = section.read_u32()?;
        let ty = binary::parse_value_type(section.read_u8()?)?;
        total += u64::from(count);
        if total > u64::from(u32::MAX) {
            return Err(Error::parse(codes::INTEGER_TOO_LARGE, "too many locals"));
        }
        for _ in 0..count {
            locals.push(Local { name: None, ty });
        }
    }
    Ok(locals)
}

fn read_data_section(section: &mut Reader<'_>, module: &mut Module) -> Result<()> {
    let count = section.read_u32()?;
    for _ in 0..count {
        let segment = match section.read_u32()? {
            0 => {
                let offset = read_expr(section)?;
                let len = section.read_u32()?;
                DataSegment {
                    name: None,
                    init: section.read_bytes(len as usize)?.to_vec(),
                    mode: DataMode::Active {
                        memory: ItemRef::Index(0),
                        offset,
                    },
                }
            }
            1 => {
                let len = section.read_u32()?;
                DataSegment {
                    name: None,
                    init: section.read_bytes(len as usize)?.to_vec(),
                    mode: DataMode::Passive,
                }
            }
            2 => {
                let memory = ItemRef::Index(section.read_u32()?);
                let offset = read_expr(section)?;
                let len = section.read_u32()?;
                DataSegment {
                    name: None,
                    init: section.read_bytes(len as usize)?.to_vec(),
                    mode: DataMode::Active { memory, offset },
                }
            }
            _ => {
                return Err(Error::parse(
                    codes::MALFORMED_FLAG,
                    "malformed data segment kind",
                ));
            }
        };
        module.datas.push(segment);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wex_format::binary::encode_module;

    fn assemble(source: &str) -> Vec<u8> {
        let buf = wast::parser::ParseBuffer::new(source).unwrap();
        let mut wat = wast::parser::parse::<wast::Wat>(&buf).unwrap();
        wat.encode().unwrap()
    }

    #[test]
    fn decodes_empty_module() {
        let module = decode_module(&assemble("(module)")).unwrap();
        assert!(module.types.is_empty());
        assert!(module.funcs.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let err = decode_module(b"\x01asm\x01\x00\x00\x00").unwrap_err();
        assert_eq!(err.message, "magic header not detected");
    }

    #[test]
    fn rejects_bad_version() {
        let err = decode_module(b"\x00asm\x02\x00\x00\x00").unwrap_err();
        assert_eq!(err.message, "unknown binary version");
    }

    #[test]
    fn rejects_oversized_section_claim() {
        // A type section claiming 100 bytes with none following.
        let mut bytes = b"\x00asm\x01\x00\x00\x00".to_vec();
        bytes.extend_from_slice(&[0x01, 0x64]);
        let err = decode_module(&bytes).unwrap_err();
        assert_eq!(err.message, "unexpected end");
    }

    #[test]
    fn rejects_underconsumed_section() {
        // An empty type section (count 0) declared as 2 bytes long.
        let mut bytes = b"\x00asm\x01\x00\x00\x00".to_vec();
        bytes.extend_from_slice(&[0x01, 0x02, 0x00, 0x00]);
        let err = decode_module(&bytes).unwrap_err();
        assert_eq!(err.message, "section size mismatch");
    }

    #[test]
    fn rejects_out_of_order_sections() {
        // A function section before the type section.
        let mut bytes = b"\x00asm\x01\x00\x00\x00".to_vec();
        bytes.extend_from_slice(&[0x03, 0x01, 0x00]);
        bytes.extend_from_slice(&[0x01, 0x01, 0x00]);
        let err = decode_module(&bytes).unwrap_err();
        assert_eq!(err.message, "unexpected section");
    }

    #[test]
    fn decodes_function_with_locals_and_body() {
        let bytes = assemble(
            r#"(module
                 (func (param i32) (result i32)
                   (local i64 i64 f32)
                   local.get 0))"#,
        );
        let module = decode_module(&bytes).unwrap();
        assert_eq!(module.types.len(), 1);
        assert_eq!(module.funcs.len(), 1);
        let func = &module.funcs[0];
        assert_eq!(func.locals.len(), 3);
        assert_eq!(
            func.body,
            vec![Instruction::LocalGet(ItemRef::Index(0))]
        );
    }

    #[test]
    fn decodes_imports_exports_and_start() {
        let bytes = assemble(
            r#"(module
                 (import "env" "tick" (func $tick))
                 (func $main (export "main"))
                 (start $main))"#,
        );
        let module = decode_module(&bytes).unwrap();
        assert_eq!(module.imports.len(), 1);
        assert_eq!(module.imports[0].module, "env");
        assert_eq!(module.exports.len(), 1);
        assert_eq!(module.exports[0].kind, ExternKind::Func);
        assert_eq!(module.start, Some(ItemRef::Index(1)));
    }

    #[test]
    fn decodes_element_and_data_segments() {
        let bytes = assemble(
            r#"(module
                 (memory 1)
                 (table 2 funcref)
                 (func $f)
                 (elem (i32.const 0) $f)
                 (data (i32.const 8) "hi")
                 (data "passive"))"#,
        );
        let module = decode_module(&bytes).unwrap();
        assert_eq!(module.elems.len(), 1);
        assert_eq!(module.datas.len(), 2);
        assert!(matches!(module.datas[0].mode, DataMode::Active { .. }));
        assert!(matches!(module.datas[1].mode, DataMode::Passive));
    }

    #[test]
    fn encode_decode_roundtrip() {
        let bytes = assemble(
            r#"(module
                 (type (func (param i32 i32) (result i32)))
                 (memory 1 2)
                 (global (mut i32) (i32.const 41))
                 (func (type 0) local.get 0 local.get 1 i32.add)
                 (export "add" (func 0)))"#,
        );
        let module = decode_module(&bytes).unwrap();
        let reencoded = encode_module(&module);
        let again = decode_module(&reencoded).unwrap();
        assert_eq!(module, again);
    }

    #[test]
    fn roundtrip_is_byte_exact_for_canonical_binaries() {
        let bytes = assemble(
            r#"(module
                 (func (result i32) i32.const 3)
                 (export "three" (func 0)))"#,
        );
        let module = decode_module(&bytes).unwrap();
        assert_eq!(encode_module(&module), bytes);
    }
}
