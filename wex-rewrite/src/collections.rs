// WEX - wex-rewrite
// Module: WEX Named Collections
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Named collections and the grouper/assigner.

use std::collections::HashMap;

use wex_error::{codes, Error, Result};
use wex_format::module::{ImportDesc, Module};
use wex_format::types::{FuncType, GlobalType, ItemRef, MemoryType, RefType, TableType};

/// One entry of a named collection: defined locally or imported.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry<T> {
    /// Defined in this module.
    Local(T),
    /// Imported from another module.
    Imported {
        /// The providing module's name.
        module: String,
        /// The item name within that module.
        item: String,
        /// The declared type.
        ty: T,
    },
}

impl<T> Entry<T> {
    /// The entry's type, local or imported.
    pub fn ty(&self) -> &T {
        match self {
            Self::Local(ty) | Self::Imported { ty, .. } => ty,
        }
    }

    /// Whether the entry is imported.
    #[must_use]
    pub fn is_imported(&self) -> bool {
        matches!(self, Self::Imported { .. })
    }
}

/// An ordered entry sequence plus a name-to-index side map.
///
/// Indices are dense and 0-based, assigned in push order; the grouper
/// pushes imports before local definitions.
#[derive(Debug, Clone)]
pub struct NamedCollection<T> {
    entries: Vec<Entry<T>>,
    names: HashMap<Box<str>, u32>,
    unknown: Error,
    duplicate: Error,
}

impl<T> NamedCollection<T> {
    /// Creates an empty collection with its kind-specific diagnostics.
    #[must_use]
    pub fn new(unknown: Error, duplicate: Error) -> Self {
        Self {
            entries: Vec::new(),
            names: HashMap::new(),
            unknown,
            duplicate,
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Whether the collection has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a local entry, binding `name` when present.
    pub fn push_local(&mut self, name: Option<&str>, ty: T) -> Result<u32> {
        let index = self.len();
        self.bind(name, index)?;
        self.entries.push(Entry::Local(ty));
        Ok(index)
    }

    /// Appends an imported entry, binding `name` when present.
    pub fn push_import(
        &mut self,
        module: &str,
        item: &str,
        name: Option<&str>,
        ty: T,
    ) -> Result<u32> {
        let index = self.len();
        self.bind(name, index)?;
        self.entries.push(Entry::Imported {
            module: module.to_string(),
            item: item.to_string(),
            ty,
        });
        Ok(index)
    }

    fn bind(&mut self, name: Option<&str>, index: u32) -> Result<()> {
        if let Some(name) = name {
            if self.names.insert(name.into(), index).is_some() {
                return Err(self.duplicate);
            }
        }
        Ok(())
    }

    /// Returns the entry at `index`, or the kind's "unknown" error.
    pub fn get(&self, index: u32) -> Result<&Entry<T>> {
        self.entries.get(index as usize).ok_or(self.unknown)
    }

    /// Resolves a reference to a dense index, bounds-checked.
    pub fn resolve(&self, item: &ItemRef) -> Result<u32> {
        match item {
            ItemRef::Index(index) => {
                if *index < self.len() {
                    Ok(*index)
                } else {
                    Err(self.unknown)
                }
            }
            ItemRef::Named(name) => self.names.get(name.as_ref()).copied().ok_or(self.unknown),
        }
    }

    /// Iterates the entries in index order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry<T>> {
        self.entries.iter()
    }

    /// Number of imported entries.
    #[must_use]
    pub fn import_count(&self) -> u32 {
        self.entries.iter().filter(|e| e.is_imported()).count() as u32
    }
}

/// Per-kind named collections for one module: the grouper's output.
#[derive(Debug, Clone)]
pub struct ModuleIndex {
    /// Declared function types.
    pub types: NamedCollection<FuncType>,
    /// Functions; the entry type is the declared type index.
    pub funcs: NamedCollection<u32>,
    /// Tables.
    pub tables: NamedCollection<TableType>,
    /// Memories.
    pub memories: NamedCollection<MemoryType>,
    /// Globals.
    pub globals: NamedCollection<GlobalType>,
    /// Element segments; the entry type is the element reference type.
    pub elems: NamedCollection<RefType>,
    /// Data segments.
    pub datas: NamedCollection<()>,
}

impl ModuleIndex {
    fn empty() -> Self {
        Self {
            types: NamedCollection::new(
                Error::validation(codes::UNKNOWN_TYPE, "unknown type"),
                Error::validation(codes::DUPLICATE_NAME, "duplicate type"),
            ),
            funcs: NamedCollection::new(
                Error::validation(codes::UNKNOWN_FUNCTION, "unknown function"),
                Error::validation(codes::DUPLICATE_NAME, "duplicate function"),
            ),
            tables: NamedCollection::new(
                Error::validation(codes::UNKNOWN_TABLE, "unknown table"),
                Error::validation(codes::DUPLICATE_NAME, "duplicate table"),
            ),
            memories: NamedCollection::new(
                Error::validation(codes::UNKNOWN_MEMORY, "unknown memory"),
                Error::validation(codes::DUPLICATE_NAME, "duplicate memory"),
            ),
            globals: NamedCollection::new(
                Error::validation(codes::UNKNOWN_GLOBAL, "unknown global"),
                Error::validation(codes::DUPLICATE_NAME, "duplicate global"),
            ),
            elems: NamedCollection::new(
                Error::validation(codes::UNKNOWN_ELEM_SEGMENT, "unknown elem segment"),
                Error::validation(codes::DUPLICATE_NAME, "duplicate elem segment"),
            ),
            datas: NamedCollection::new(
                Error::validation(codes::UNKNOWN_DATA_SEGMENT, "unknown data segment"),
                Error::validation(codes::DUPLICATE_NAME, "duplicate data segment"),
            ),
        }
    }

    /// Walks the module once, partitioning fields by kind and assigning
    /// dense indices: imports first within their kind, then local
    /// definitions, each in source order.
    pub fn group(module: &Module) -> Result<Self> {
        let mut index = Self::empty();

        for def in &module.types {
            index.types.push_local(def.name.as_deref(), def.ty.clone())?;
        }

        for import in &module.imports {
            let name = import.name.as_deref();
            match &import.desc {
                ImportDesc::Func(ty) => {
                    let ty = index.types.resolve(ty)?;
                    index
                        .funcs
                        .push_import(&import.module, &import.item, name, ty)?;
                }
                ImportDesc::Table(ty) => {
                    index
                        .tables
                        .push_import(&import.module, &import.item, name, *ty)?;
                }
                ImportDesc::Memory(ty) => {
                    index
                        .memories
                        .push_import(&import.module, &import.item, name, *ty)?;
                }
                ImportDesc::Global(ty) => {
                    index
                        .globals
                        .push_import(&import.module, &import.item, name, *ty)?;
                }
            }
        }

        for func in &module.funcs {
            let ty = index.types.resolve(&func.ty)?;
            index.funcs.push_local(func.name.as_deref(), ty)?;
        }
        for table in &module.tables {
            index.tables.push_local(table.name.as_deref(), table.ty)?;
        }
        for memory in &module.memories {
            index
                .memories
                .push_local(memory.name.as_deref(), memory.ty)?;
        }
        for global in &module.globals {
            index
                .globals
                .push_local(global.name.as_deref(), global.ty)?;
        }
        for elem in &module.elems {
            index.elems.push_local(elem.name.as_deref(), elem.ty)?;
        }
        for data in &module.datas {
            index.datas.push_local(data.name.as_deref(), ())?;
        }

        Ok(index)
    }

    /// The signature of a function, imported or local.
    pub fn func_type(&self, func: u32) -> Result<&FuncType> {
        let ty = *self.funcs.get(func)?.ty();
        Ok(self.types.get(ty)?.ty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wex_format::module::{Function, Global, Import, TypeDef};
    use wex_format::types::{Limits, ValueType};

    fn void_type() -> TypeDef {
        TypeDef {
            name: None,
            ty: FuncType::default(),
        }
    }

    #[test]
    fn imports_are_numbered_before_locals() {
        let module = Module {
            types: vec![void_type()],
            imports: vec![Import {
                module: "env".into(),
                item: "tick".into(),
                name: Some("tick".into()),
                desc: ImportDesc::Func(ItemRef::Index(0)),
            }],
            funcs: vec![Function {
                name: Some("main".into()),
                ty: ItemRef::Index(0),
                param_names: Vec::new(),
                locals: Vec::new(),
                body: Vec::new(),
            }],
            ..Module::default()
        };
        let index = ModuleIndex::group(&module).unwrap();
        assert_eq!(index.funcs.len(), 2);
        assert_eq!(index.funcs.resolve(&ItemRef::named("tick")).unwrap(), 0);
        assert_eq!(index.funcs.resolve(&ItemRef::named("main")).unwrap(), 1);
        assert!(index.funcs.get(0).unwrap().is_imported());
    }

    #[test]
    fn duplicate_globals_are_rejected() {
        let module = Module {
            globals: vec![
                Global {
                    name: Some("g".into()),
                    ty: GlobalType {
                        value_type: ValueType::I32,
                        mutable: false,
                    },
                    init: Vec::new(),
                },
                Global {
                    name: Some("g".into()),
                    ty: GlobalType {
                        value_type: ValueType::I32,
                        mutable: false,
                    },
                    init: Vec::new(),
                },
            ],
            ..Module::default()
        };
        let err = ModuleIndex::group(&module).unwrap_err();
        assert_eq!(err.message, "duplicate global");
    }

    #[test]
    fn unresolved_references_name_their_kind() {
        let module = Module::default();
        let index = ModuleIndex::group(&module).unwrap();
        let err = index.tables.resolve(&ItemRef::Index(0)).unwrap_err();
        assert_eq!(err.message, "unknown table");
    }

    #[test]
    fn grouping_respects_memory_limits_entries() {
        let module = Module {
            memories: vec![wex_format::module::Memory {
                name: Some("mem".into()),
                ty: MemoryType {
                    limits: Limits { min: 1, max: Some(2) },
                },
            }],
            ..Module::default()
        };
        let index = ModuleIndex::group(&module).unwrap();
        assert_eq!(index.memories.len(), 1);
        assert_eq!(index.memories.resolve(&ItemRef::named("mem")).unwrap(), 0);
    }
}
