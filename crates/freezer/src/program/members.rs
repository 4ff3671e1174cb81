//! Member tables of a program: references, definitions and inherits

use super::flags::MemberFlags;
use super::Program;
use crate::value::{Object, StringValue, TypeExpr};

/// Which definition table a member reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Per-instance storage slot
    Variable,
    /// Function with a bytecode entry point
    Function,
    /// Named constant backed by the constant pool
    Constant,
}

impl MemberKind {
    /// Wire number of the kind.
    pub fn code(self) -> i64 {
        match self {
            MemberKind::Variable => 0,
            MemberKind::Function => 1,
            MemberKind::Constant => 2,
        }
    }

    /// Inverse of [`MemberKind::code`].
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(MemberKind::Variable),
            1 => Some(MemberKind::Function),
            2 => Some(MemberKind::Constant),
            _ => None,
        }
    }
}

/// One entry of the member-reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef {
    /// Inherit the member resolves through (0 is the program itself)
    pub inherit: usize,
    /// Visibility, locality and override state
    pub flags: MemberFlags,
    /// Definition table
    pub kind: MemberKind,
    /// Index into the definition table of the inherit's program
    pub index: usize,
}

/// Where a definition came from in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// Index of the file name in the program's string table
    pub file: Option<usize>,
    /// Line number
    pub line: i64,
}

/// A variable definition.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
    /// Member name
    pub name: StringValue,
    /// Declared type
    pub ty: TypeExpr,
    /// Storage kind byte derived from the type
    pub run_time_type: u8,
    /// Source position
    pub location: SourceLocation,
}

/// A function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Member name
    pub name: StringValue,
    /// Declared type
    pub ty: TypeExpr,
    /// Identifier kind and attribute bits
    pub identifier_flags: u16,
    /// Entry point in the bytecode blob; `None` for a prototype
    pub offset: Option<u32>,
    /// Optimizer hints
    pub opt_flags: u16,
    /// Source position
    pub location: SourceLocation,
}

/// A named constant definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDef {
    /// Member name
    pub name: StringValue,
    /// Declared type
    pub ty: TypeExpr,
    /// Slot in the constant pool; `None` when the value is not known
    pub offset: Option<usize>,
    /// Optimizer hints
    pub opt_flags: u16,
    /// Source position
    pub location: SourceLocation,
}

/// Function body description used when defining functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionBody {
    /// Identifier kind and attribute bits
    pub identifier_flags: u16,
    /// Entry point in the bytecode blob; `None` for a prototype
    pub offset: Option<u32>,
    /// Optimizer hints
    pub opt_flags: u16,
}

/// An entry of the inherit list.
#[derive(Debug, Clone)]
pub struct Inherit {
    /// Inherited program; `None` only for entry 0, the program itself
    pub program: Option<Program>,
    /// Parent object for inherits bound to an instance
    pub parent: Option<Object>,
    /// Name the inherit was given
    pub name: Option<StringValue>,
    /// First member reference of this inherit's range
    pub ref_offset: usize,
    /// Nesting depth (0 for the program itself, 1 for direct inherits)
    pub level: u32,
    /// Flags added to every member at inherit time
    pub flags: MemberFlags,
    /// First storage slot of this inherit's variables
    pub storage_offset: usize,
}

impl Inherit {
    pub(crate) fn own() -> Self {
        Inherit {
            program: None,
            parent: None,
            name: None,
            ref_offset: 0,
            level: 0,
            flags: MemberFlags::empty(),
            storage_offset: 0,
        }
    }
}

/// A member reference together with the program that defines it.
#[derive(Debug, Clone)]
pub struct ResolvedMember {
    /// Program holding the definition
    pub program: Program,
    /// The reference itself
    pub reference: MemberRef,
    /// Member name
    pub name: StringValue,
}

/// Storage requirements of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageLayout {
    /// Number of value slots
    pub size: usize,
    /// Alignment of the storage block in bytes
    pub alignment: usize,
}

impl Default for StorageLayout {
    fn default() -> Self {
        StorageLayout {
            size: 0,
            alignment: 1,
        }
    }
}
