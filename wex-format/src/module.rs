// WEX - wex-format
// Module: WEX Module AST
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The module AST exchanged between pipeline stages.
//!
//! The binary decoder and any textual front-end both produce this
//! representation. Optional textual names on fields come from a text
//! front-end; the binary decoder leaves them empty. The rewriter consumes
//! a module and produces a fresh one with every [`ItemRef`] resolved,
//! every block type normalised, and every index bounds-checked.

use crate::instructions::Instruction;
use crate::types::{FuncType, GlobalType, ItemRef, MemoryType, RefType, TableType, ValueType};

/// A constant-expression body: an instruction sequence evaluable without a
/// runtime frame.
pub type Expr = Vec<Instruction>;

/// A declared function type, optionally named.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    /// Optional textual identifier.
    pub name: Option<Box<str>>,
    /// The declared signature.
    pub ty: FuncType,
}

/// The kind of an imported or exported item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternKind {
    /// A function.
    Func,
    /// A table.
    Table,
    /// A linear memory.
    Memory,
    /// A global.
    Global,
}

impl core::fmt::Display for ExternKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Func => "func",
            Self::Table => "table",
            Self::Memory => "memory",
            Self::Global => "global",
        };
        f.write_str(name)
    }
}

/// The declared type of an import.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportDesc {
    /// A function import declaring its type by reference.
    Func(ItemRef),
    /// A table import.
    Table(TableType),
    /// A memory import.
    Memory(MemoryType),
    /// A global import.
    Global(GlobalType),
}

impl ImportDesc {
    /// The extern kind this import occupies an index space of.
    #[must_use]
    pub const fn kind(&self) -> ExternKind {
        match self {
            Self::Func(_) => ExternKind::Func,
            Self::Table(_) => ExternKind::Table,
            Self::Memory(_) => ExternKind::Memory,
            Self::Global(_) => ExternKind::Global,
        }
    }
}

/// An import: module name, item name, optional local identifier, and the
/// declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    /// The providing module's name.
    pub module: String,
    /// The item name within that module.
    pub item: String,
    /// Optional local identifier bound to the imported item.
    pub name: Option<Box<str>>,
    /// The declared type.
    pub desc: ImportDesc,
}

/// A local (non-imported) function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Optional textual identifier.
    pub name: Option<Box<str>>,
    /// Declared type, by reference into the type collection.
    pub ty: ItemRef,
    /// Optional parameter identifiers from a text front-end. May be
    /// shorter than the declared parameter list; missing entries are
    /// anonymous.
    pub param_names: Vec<Option<Box<str>>>,
    /// Locals in declaration order. Parameters and locals share one
    /// 0-based index space, parameters first.
    pub locals: Vec<Local>,
    /// The body, terminated structurally (no explicit `end` marker).
    pub body: Vec<Instruction>,
}

/// A declared local variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    /// Optional textual identifier.
    pub name: Option<Box<str>>,
    /// The local's value type.
    pub ty: ValueType,
}

/// A local table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Optional textual identifier.
    pub name: Option<Box<str>>,
    /// The table type.
    pub ty: TableType,
}

/// A local memory definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Memory {
    /// Optional textual identifier.
    pub name: Option<Box<str>>,
    /// The memory type.
    pub ty: MemoryType,
}

/// A local global definition with its initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    /// Optional textual identifier.
    pub name: Option<Box<str>>,
    /// The global type.
    pub ty: GlobalType,
    /// Constant initializer expression.
    pub init: Expr,
}

/// An export: a UTF-8 name plus a reference to the exported item.
///
/// The reference may still be textual when the module came from a text
/// front-end; the rewriter resolves it.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    /// The export name.
    pub name: String,
    /// The exported item's kind.
    pub kind: ExternKind,
    /// The exported item.
    pub item: ItemRef,
}

/// The mode of an element segment.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementMode {
    /// Available to `table.init` only.
    Passive,
    /// Contributes declared function references but is never applied.
    Declarative,
    /// Written into a table at instantiation.
    Active {
        /// The target table.
        table: ItemRef,
        /// Constant offset expression.
        offset: Expr,
    },
}

/// An element segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    /// Optional textual identifier.
    pub name: Option<Box<str>>,
    /// The reference type of the produced elements.
    pub ty: RefType,
    /// Initializer expressions, one per element.
    pub items: Vec<Expr>,
    /// The segment mode.
    pub mode: ElementMode,
}

/// The mode of a data segment.
#[derive(Debug, Clone, PartialEq)]
pub enum DataMode {
    /// Available to `memory.init` only.
    Passive,
    /// Copied into a memory at instantiation.
    Active {
        /// The target memory.
        memory: ItemRef,
        /// Constant offset expression.
        offset: Expr,
    },
}

/// A data segment.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    /// Optional textual identifier.
    pub name: Option<Box<str>>,
    /// The byte string.
    pub init: Vec<u8>,
    /// The segment mode.
    pub mode: DataMode,
}

/// A custom section, retained by name and otherwise ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomSection {
    /// The section name.
    pub name: String,
    /// The raw contents.
    pub data: Vec<u8>,
}

/// A WebAssembly module AST.
///
/// Fields are partitioned by kind; within each kind, imports precede local
/// definitions in the shared index space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    /// Declared function types.
    pub types: Vec<TypeDef>,
    /// Imports, in declaration order across all kinds.
    pub imports: Vec<Import>,
    /// Local function definitions.
    pub funcs: Vec<Function>,
    /// Local table definitions.
    pub tables: Vec<Table>,
    /// Local memory definitions.
    pub memories: Vec<Memory>,
    /// Local global definitions.
    pub globals: Vec<Global>,
    /// Exports.
    pub exports: Vec<Export>,
    /// Optional start function.
    pub start: Option<ItemRef>,
    /// Element segments.
    pub elems: Vec<ElementSegment>,
    /// Data segments.
    pub datas: Vec<DataSegment>,
    /// Declared data-segment count, when a data-count section was present.
    pub data_count: Option<u32>,
    /// Custom sections, in order of appearance.
    pub customs: Vec<CustomSection>,
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates the imports of one kind, in declaration order.
    pub fn imports_of(&self, kind: ExternKind) -> impl Iterator<Item = &Import> {
        self.imports.iter().filter(move |i| i.desc.kind() == kind)
    }

    /// Number of imports of one kind.
    #[must_use]
    pub fn import_count(&self, kind: ExternKind) -> u32 {
        self.imports_of(kind).count() as u32
    }

    /// Total size of a kind's index space: imports plus local definitions.
    #[must_use]
    pub fn index_space(&self, kind: ExternKind) -> u32 {
        let local = match kind {
            ExternKind::Func => self.funcs.len(),
            ExternKind::Table => self.tables.len(),
            ExternKind::Memory => self.memories.len(),
            ExternKind::Global => self.globals.len(),
        };
        self.import_count(kind) + local as u32
    }
}
