//! Compiled programs: member tables, inherit chains and lifecycle.
//!
//! A [`Program`] is a shared handle. Its tables are only ever filled in
//! through a [`ProgramBuilder`], either by user code or by the decoder
//! rebuilding a program from a stream.
//!
//! ## Lifecycle
//!
//! - **virgin**: allocated, nothing filled in (a forward reference)
//! - **building**: tables being populated
//! - **pass one done**: member tables consistent, storage layout fixed;
//!   the program may now be inherited
//! - **finished**: every program on the inherit chain is finished;
//!   instances may be created

mod builder;
mod flags;
mod members;

pub use builder::ProgramBuilder;
pub(crate) use builder::mark_finished;
pub use flags::{
    MemberFlags, ProgramFlags, IDENTIFIER_ALIAS, IDENTIFIER_CONSTANT, IDENTIFIER_C_FUNCTION,
    IDENTIFIER_PIKE_FUNCTION, IDENTIFIER_TYPE_MASK, IDENTIFIER_VARIABLE,
};
pub use members::{
    ConstantDef, FunctionBody, FunctionDef, Inherit, MemberKind, MemberRef, ResolvedMember,
    SourceLocation, StorageLayout, VariableDef,
};

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::value::{StringValue, Value, T_FLOAT};

/// Where a program is in its construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProgramState {
    /// Allocated but empty
    Virgin,
    /// Tables being filled in
    Building,
    /// Member tables complete
    PassOneDone,
    /// Whole inherit chain complete
    Finished,
}

/// Tables and flags of a program.
#[derive(Debug, Default)]
pub struct ProgramData {
    /// Program flags, lifecycle bits included
    pub flags: ProgramFlags,
    /// Instance storage requirements
    pub storage: StorageLayout,
    /// String table
    pub strings: Vec<StringValue>,
    /// Bytecode blob
    pub bytecode: Vec<u8>,
    /// Relocation offsets into the bytecode
    pub relocations: Vec<u32>,
    /// Line-number delta blob
    pub linenumbers: Vec<u8>,
    /// Inherit list; entry 0 is the program itself
    pub inherits: Vec<Inherit>,
    /// Member-reference table
    pub references: Vec<MemberRef>,
    /// Variables defined here
    pub variables: Vec<VariableDef>,
    /// Functions defined here
    pub functions: Vec<FunctionDef>,
    /// Named constants defined here
    pub constants: Vec<ConstantDef>,
    /// Constant pool
    pub constant_pool: Vec<Value>,
}

impl ProgramData {
    /// Lifecycle state derived from the flags.
    pub fn state(&self) -> ProgramState {
        if self.flags.contains(ProgramFlags::FINISHED) {
            ProgramState::Finished
        } else if self.flags.contains(ProgramFlags::PASS_1_DONE) {
            ProgramState::PassOneDone
        } else if self.flags.contains(ProgramFlags::VIRGIN) {
            ProgramState::Virgin
        } else {
            ProgramState::Building
        }
    }

    /// Name of a definition in this program's own tables.
    pub fn definition_name(&self, kind: MemberKind, index: usize) -> Option<StringValue> {
        match kind {
            MemberKind::Variable => self.variables.get(index).map(|d| d.name.clone()),
            MemberKind::Function => self.functions.get(index).map(|d| d.name.clone()),
            MemberKind::Constant => self.constants.get(index).map(|d| d.name.clone()),
        }
    }

    /// Number of definitions of `kind`.
    pub fn definition_count(&self, kind: MemberKind) -> usize {
        match kind {
            MemberKind::Variable => self.variables.len(),
            MemberKind::Function => self.functions.len(),
            MemberKind::Constant => self.constants.len(),
        }
    }

    /// Name of the member behind reference `r`.
    ///
    /// References through inherit 0 are answered from `self`; others
    /// borrow the inherited program.
    pub(crate) fn reference_name(&self, r: &MemberRef) -> Option<StringValue> {
        if r.inherit == 0 {
            return self.definition_name(r.kind, r.index);
        }
        let program = self.inherits.get(r.inherit)?.program.as_ref()?;
        let data = program.data();
        data.definition_name(r.kind, r.index)
    }
}

/// Shared handle to a compiled program.
///
/// Equality and hashing are by identity.
#[derive(Clone)]
pub struct Program(Rc<RefCell<ProgramData>>);

impl Program {
    /// Allocate a virgin program.
    pub fn embryo() -> Self {
        let data = ProgramData {
            flags: ProgramFlags::VIRGIN,
            inherits: vec![Inherit::own()],
            ..Default::default()
        };
        Program(Rc::new(RefCell::new(data)))
    }

    /// Read access to the tables.
    pub fn data(&self) -> Ref<'_, ProgramData> {
        self.0.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, ProgramData> {
        self.0.borrow_mut()
    }

    /// Lifecycle state.
    pub fn state(&self) -> ProgramState {
        self.data().state()
    }

    /// True once the whole inherit chain is complete.
    pub fn is_finished(&self) -> bool {
        self.state() == ProgramState::Finished
    }

    /// True once the member tables are complete.
    pub fn is_pass_one_done(&self) -> bool {
        self.state() >= ProgramState::PassOneDone
    }

    /// Program flags.
    pub fn flags(&self) -> ProgramFlags {
        self.data().flags
    }

    /// Address used as the program's identity.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// True when both handles point at the same program.
    pub fn ptr_eq(&self, other: &Program) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of inherit entries, the program itself included.
    pub fn num_inherits(&self) -> usize {
        self.data().inherits.len()
    }

    /// Number of member references.
    pub fn num_references(&self) -> usize {
        self.data().references.len()
    }

    /// Program behind inherit `k` (0 is this program).
    pub fn inherit_program(&self, k: usize) -> Option<Program> {
        if k == 0 {
            return Some(self.clone());
        }
        self.data().inherits.get(k)?.program.clone()
    }

    /// Reference number of the first visible member called `name`.
    pub fn find_member(&self, name: &str) -> Option<usize> {
        let name = StringValue::from(name);
        self.find_member_str(&name)
    }

    pub(crate) fn find_member_str(&self, name: &StringValue) -> Option<usize> {
        let data = self.data();
        data.references.iter().position(|r| {
            !r.flags.contains(MemberFlags::HIDDEN)
                && data.reference_name(r).as_ref() == Some(name)
        })
    }

    /// Resolve a reference number to its definition.
    pub fn resolve(&self, reference: usize) -> Option<ResolvedMember> {
        let r = *self.data().references.get(reference)?;
        let program = self.inherit_program(r.inherit)?;
        let name = program.data().definition_name(r.kind, r.index)?;
        Some(ResolvedMember {
            program,
            reference: r,
            name,
        })
    }

    /// Name of the member behind a reference number.
    pub fn member_name(&self, reference: usize) -> Option<StringValue> {
        self.resolve(reference).map(|m| m.name)
    }

    /// Value of a named constant, if it is known.
    pub fn constant(&self, name: &str) -> Option<Value> {
        let member = self.resolve(self.find_member(name)?)?;
        if member.reference.kind != MemberKind::Constant {
            return None;
        }
        let data = member.program.data();
        let offset = data.constants.get(member.reference.index)?.offset?;
        data.constant_pool.get(offset).cloned()
    }

    /// Storage slot of a variable reference.
    pub fn storage_slot(&self, reference: usize) -> Option<usize> {
        let data = self.data();
        let r = data.references.get(reference)?;
        if r.kind != MemberKind::Variable {
            return None;
        }
        Some(data.inherits.get(r.inherit)?.storage_offset + r.index)
    }

    /// Slots of the visible variables, in reference order.
    pub fn visible_variable_slots(&self) -> Vec<usize> {
        let count = self.num_references();
        let mut slots = Vec::new();
        for reference in 0..count {
            let hidden = self
                .data()
                .references
                .get(reference)
                .map_or(true, |r| r.flags.contains(MemberFlags::HIDDEN));
            if hidden {
                continue;
            }
            if let Some(slot) = self.storage_slot(reference) {
                if !slots.contains(&slot) {
                    slots.push(slot);
                }
            }
        }
        slots
    }

    /// Fresh storage for an instance: `0.0` for float variables, `0`
    /// for everything else.
    pub fn default_storage(&self) -> Vec<Value> {
        let mut storage = vec![Value::Int(0); self.data().storage.size];
        let num_inherits = self.num_inherits();
        for k in 0..num_inherits {
            let Some(program) = self.inherit_program(k) else {
                continue;
            };
            let offset = self.data().inherits[k].storage_offset;
            let kinds: Vec<u8> = program
                .data()
                .variables
                .iter()
                .map(|v| v.run_time_type)
                .collect();
            for (i, kind) in kinds.into_iter().enumerate() {
                if kind == T_FLOAT {
                    if let Some(slot) = storage.get_mut(offset + i) {
                        *slot = Value::Float(0.0);
                    }
                }
            }
        }
        storage
    }

    /// True when every program on the inherit chain is finished.
    pub fn inherits_finished(&self) -> bool {
        let count = self.num_inherits();
        (1..count).all(|k| self.inherit_program(k).map_or(true, |p| p.is_finished()))
    }

    /// Drop every table of a half-built program so that cycles through
    /// its inherits, parents and constants are released.
    pub(crate) fn abandon(&self) {
        let mut data = self.data_mut();
        data.inherits.truncate(1);
        data.references.clear();
        data.constant_pool.clear();
        data.variables.clear();
        data.functions.clear();
        data.constants.clear();
    }
}

impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Program {}

impl Hash for Program {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => write!(
                f,
                "<program {:#x} {:?}, {} refs>",
                self.identity(),
                data.state(),
                data.references.len()
            ),
            Err(_) => write!(f, "<program {:#x}>", self.identity()),
        }
    }
}
