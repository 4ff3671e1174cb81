//! Incremental construction of programs

use tracing::debug;

use super::{
    ConstantDef, FunctionBody, FunctionDef, Inherit, MemberFlags, MemberKind, MemberRef, Program,
    ProgramData, ProgramFlags, ProgramState, SourceLocation, VariableDef,
};
use crate::error::{FreezerError, Result};
use crate::value::{Object, StringValue, TypeExpr, Value};

/// Builds the tables of a [`Program`].
///
/// ```
/// use freezer::{MemberFlags, ProgramBuilder, TypeExpr, Value};
///
/// let mut base = ProgramBuilder::new();
/// base.define_variable("x", TypeExpr::int(), MemberFlags::PUBLIC).unwrap();
/// let base = base.finish().unwrap();
///
/// let mut derived = ProgramBuilder::new();
/// derived.inherit(&base, None, Some("base"), MemberFlags::empty()).unwrap();
/// derived.constant("answer", Value::Int(42), MemberFlags::PUBLIC).unwrap();
/// let derived = derived.finish().unwrap();
///
/// assert_eq!(derived.find_member("x"), Some(0));
/// assert_eq!(derived.constant("answer"), Some(Value::Int(42)));
/// ```
#[derive(Debug)]
pub struct ProgramBuilder {
    program: Program,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    /// Start a new, empty program.
    pub fn new() -> Self {
        let program = Program::embryo();
        program.data_mut().flags.remove(ProgramFlags::VIRGIN);
        ProgramBuilder { program }
    }

    /// Continue building a virgin program allocated earlier, such as a
    /// forward reference created while decoding.
    pub fn resume(program: Program) -> Result<Self> {
        if program.state() != ProgramState::Virgin {
            return Err(FreezerError::graph(format!(
                "Cannot rebuild {:?}: not an embryo",
                program
            )));
        }
        program.data_mut().flags.remove(ProgramFlags::VIRGIN);
        Ok(ProgramBuilder { program })
    }

    /// The program under construction.
    pub fn program(&self) -> &Program {
        &self.program
    }

    fn ensure_building(&self) -> Result<()> {
        match self.program.state() {
            ProgramState::Building => Ok(()),
            state => Err(FreezerError::graph(format!(
                "Program member tables are closed ({:?})",
                state
            ))),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Raw tables
    // ═══════════════════════════════════════════════════════════════════

    /// Replace the non-lifecycle flag bits.
    pub fn set_flags(&mut self, flags: ProgramFlags) {
        let mut data = self.program.data_mut();
        data.flags = (data.flags & ProgramFlags::LIFECYCLE) | (flags & !ProgramFlags::LIFECYCLE);
    }

    /// Add a string to the string table, returning its index.
    pub fn add_string(&mut self, s: impl Into<StringValue>) -> usize {
        let s = s.into();
        let mut data = self.program.data_mut();
        if let Some(i) = data.strings.iter().position(|x| *x == s) {
            return i;
        }
        data.strings.push(s);
        data.strings.len() - 1
    }

    /// Append a string without deduplication.
    pub(crate) fn push_string(&mut self, s: StringValue) {
        self.program.data_mut().strings.push(s);
    }

    /// Set the bytecode blob.
    pub fn set_bytecode(&mut self, bytecode: Vec<u8>) {
        self.program.data_mut().bytecode = bytecode;
    }

    /// Set the relocation offsets.
    pub fn set_relocations(&mut self, relocations: Vec<u32>) {
        self.program.data_mut().relocations = relocations;
    }

    /// Set the line-number delta blob.
    pub fn set_linenumbers(&mut self, linenumbers: Vec<u8>) {
        self.program.data_mut().linenumbers = linenumbers;
    }

    /// Append a value to the constant pool, returning its slot.
    pub fn add_constant(&mut self, value: Value) -> usize {
        let mut data = self.program.data_mut();
        data.constant_pool.push(value);
        data.constant_pool.len() - 1
    }

    // ═══════════════════════════════════════════════════════════════════
    // Inherits
    // ═══════════════════════════════════════════════════════════════════

    /// Link `program` into this one.
    ///
    /// The inherited program's inherit list and member references are
    /// appended, references marked INHERITED with `flags` added. Private
    /// members become hidden. Members already defined locally under the
    /// same name override the incoming ones. Returns the index of the new
    /// inherit entry.
    pub fn inherit(
        &mut self,
        program: &Program,
        parent: Option<Object>,
        name: Option<&str>,
        flags: MemberFlags,
    ) -> Result<usize> {
        self.link(program, parent, name.map(StringValue::from), flags)
    }

    pub(crate) fn link(
        &mut self,
        program: &Program,
        parent: Option<Object>,
        name: Option<StringValue>,
        flags: MemberFlags,
    ) -> Result<usize> {
        self.ensure_building()?;
        if program.ptr_eq(&self.program) {
            return Err(FreezerError::graph("A program cannot inherit itself"));
        }
        if !program.is_pass_one_done() {
            return Err(FreezerError::graph(format!(
                "Cannot inherit {:?}: its member tables are not complete",
                program
            )));
        }

        let (incoming_inherits, incoming) = {
            let src = program.data();
            let refs: Vec<(MemberRef, Option<StringValue>)> = src
                .references
                .iter()
                .map(|r| (*r, src.reference_name(r)))
                .collect();
            (src.inherits.clone(), refs)
        };

        let mut data = self.program.data_mut();
        let base = data.inherits.len();
        let ref_offset = data.references.len();
        for (k, inh) in incoming_inherits.into_iter().enumerate() {
            let own = k == 0;
            data.inherits.push(Inherit {
                program: if own { Some(program.clone()) } else { inh.program },
                parent: if own { parent.clone() } else { inh.parent },
                name: if own { name.clone() } else { inh.name },
                ref_offset: ref_offset + inh.ref_offset,
                level: inh.level + 1,
                flags: if own { flags } else { inh.flags },
                storage_offset: 0,
            });
        }

        let locals = local_definitions(&data);
        for (r, member_name) in incoming {
            let mut f = r.flags | MemberFlags::INHERITED | flags.modifiers();
            if f.contains(MemberFlags::PRIVATE) {
                f.insert(MemberFlags::HIDDEN);
            }
            let mut new_ref = MemberRef {
                inherit: r.inherit + base,
                flags: f,
                kind: r.kind,
                index: r.index,
            };
            if !f.contains(MemberFlags::HIDDEN) {
                if let Some((_, local)) = locals.iter().find(|(n, _)| Some(n) == member_name.as_ref()) {
                    if f.contains(MemberFlags::FINAL) {
                        return Err(FreezerError::graph(format!(
                            "Cannot override final member {}",
                            member_name.map(|n| n.to_string()).unwrap_or_default()
                        )));
                    }
                    new_ref = *local;
                }
            }
            data.references.push(new_ref);
        }

        debug!(inherit = base, refs = data.references.len() - ref_offset, "linked inherit");
        Ok(base)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Definitions
    // ═══════════════════════════════════════════════════════════════════

    /// Define a variable. Returns its reference number.
    pub fn define_variable(&mut self, name: &str, ty: TypeExpr, flags: MemberFlags) -> Result<usize> {
        let run_time_type = ty.run_time_type();
        self.add_variable(
            VariableDef {
                name: StringValue::from(name),
                ty,
                run_time_type,
                location: SourceLocation::default(),
            },
            flags,
        )
    }

    /// Define a function. Returns its reference number.
    pub fn define_function(
        &mut self,
        name: &str,
        ty: TypeExpr,
        flags: MemberFlags,
        body: FunctionBody,
    ) -> Result<usize> {
        self.add_function(
            FunctionDef {
                name: StringValue::from(name),
                ty,
                identifier_flags: body.identifier_flags,
                offset: body.offset,
                opt_flags: body.opt_flags,
                location: SourceLocation::default(),
            },
            flags,
        )
    }

    /// Define a named constant backed by pool slot `offset`.
    pub fn define_constant(
        &mut self,
        name: &str,
        ty: TypeExpr,
        flags: MemberFlags,
        offset: Option<usize>,
    ) -> Result<usize> {
        self.add_constant_def(
            ConstantDef {
                name: StringValue::from(name),
                ty,
                offset,
                opt_flags: 0,
                location: SourceLocation::default(),
            },
            flags,
        )
    }

    /// Add `value` to the pool and define a constant for it.
    pub fn constant(&mut self, name: &str, value: Value, flags: MemberFlags) -> Result<usize> {
        let ty = TypeExpr::of_value(&value);
        let offset = self.add_constant(value);
        self.define_constant(name, ty, flags, Some(offset))
    }

    /// Add a fully described variable.
    pub fn add_variable(&mut self, def: VariableDef, flags: MemberFlags) -> Result<usize> {
        let name = def.name.clone();
        self.add_definition(MemberKind::Variable, &name, flags, move |data| {
            data.variables.push(def);
            data.variables.len() - 1
        })
    }

    /// Add a fully described function.
    pub fn add_function(&mut self, def: FunctionDef, flags: MemberFlags) -> Result<usize> {
        let name = def.name.clone();
        self.add_definition(MemberKind::Function, &name, flags, move |data| {
            data.functions.push(def);
            data.functions.len() - 1
        })
    }

    /// Add a fully described named constant.
    pub fn add_constant_def(&mut self, def: ConstantDef, flags: MemberFlags) -> Result<usize> {
        let name = def.name.clone();
        self.add_definition(MemberKind::Constant, &name, flags, move |data| {
            data.constants.push(def);
            data.constants.len() - 1
        })
    }

    fn add_definition(
        &mut self,
        kind: MemberKind,
        name: &StringValue,
        flags: MemberFlags,
        push: impl FnOnce(&mut ProgramData) -> usize,
    ) -> Result<usize> {
        self.ensure_building()?;
        let mut data = self.program.data_mut();

        let mut overridden = Vec::new();
        for (no, r) in data.references.iter().enumerate() {
            if r.flags.contains(MemberFlags::HIDDEN) {
                continue;
            }
            if data.reference_name(r).as_ref() != Some(name) {
                continue;
            }
            if !r.flags.contains(MemberFlags::INHERITED) {
                return Err(FreezerError::graph(format!("Member {} is already defined", name)));
            }
            if r.flags.contains(MemberFlags::FINAL) {
                return Err(FreezerError::graph(format!(
                    "Cannot override final member {}",
                    name
                )));
            }
            overridden.push(no);
        }

        let index = push(&mut *data);
        let new_ref = MemberRef {
            inherit: 0,
            flags: flags.modifiers(),
            kind,
            index,
        };
        match overridden.first() {
            None => {
                data.references.push(new_ref);
                Ok(data.references.len() - 1)
            }
            Some(&first) => {
                for no in &overridden {
                    data.references[*no] = new_ref;
                }
                Ok(first)
            }
        }
    }

    /// Add a local reference to member `name` of inherit `inherit`,
    /// bypassing the override chain. Returns the new reference number.
    pub fn alias_inherited(&mut self, inherit: usize, name: &str, flags: MemberFlags) -> Result<usize> {
        self.ensure_building()?;
        if inherit == 0 {
            return Err(FreezerError::graph("Inherit 0 is the program itself"));
        }
        let source = self
            .program
            .inherit_program(inherit)
            .ok_or_else(|| FreezerError::graph(format!("No inherit {}", inherit)))?;
        let no = source
            .find_member(name)
            .ok_or_else(|| FreezerError::graph(format!("No member {} in inherit {}", name, inherit)))?;
        let r = source.data().references[no];

        let mut data = self.program.data_mut();
        data.references.push(MemberRef {
            inherit: inherit + r.inherit,
            flags: flags.modifiers(),
            kind: r.kind,
            index: r.index,
        });
        Ok(data.references.len() - 1)
    }

    /// Store `r` at reference number `no`, appending when `no` is the
    /// current table length.
    pub fn set_reference(&mut self, no: usize, r: MemberRef) -> Result<()> {
        self.ensure_building()?;
        let target = self
            .program
            .inherit_program(r.inherit)
            .ok_or_else(|| FreezerError::graph(format!("Bad inherit offset {}", r.inherit)))?;
        let count = if r.inherit == 0 {
            self.program.data().definition_count(r.kind)
        } else {
            target.data().definition_count(r.kind)
        };
        if r.index >= count {
            return Err(FreezerError::graph(format!(
                "Bad {:?} offset {} in inherit {}",
                r.kind, r.index, r.inherit
            )));
        }

        let mut data = self.program.data_mut();
        let len = data.references.len();
        if no == len {
            data.references.push(r);
        } else if no < len {
            data.references[no] = r;
        } else {
            return Err(FreezerError::graph(format!(
                "Bad identifier reference offset {} (table has {})",
                no, len
            )));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Completion
    // ═══════════════════════════════════════════════════════════════════

    /// Close the member tables and fix the storage layout.
    pub fn end_pass_one(&mut self) -> Result<()> {
        self.ensure_building()?;
        let num_inherits = self.program.num_inherits();
        let mut counts = Vec::with_capacity(num_inherits);
        for k in 0..num_inherits {
            let count = if k == 0 {
                self.program.data().variables.len()
            } else {
                self.program
                    .inherit_program(k)
                    .map_or(0, |p| p.data().variables.len())
            };
            counts.push(count);
        }

        let mut data = self.program.data_mut();
        let mut offset = 0;
        for (inh, count) in data.inherits.iter_mut().zip(counts) {
            inh.storage_offset = offset;
            offset += count;
        }
        data.storage.size = offset;
        data.storage.alignment = if offset > 0 {
            std::mem::align_of::<Value>()
        } else {
            1
        };
        data.flags.insert(ProgramFlags::PASS_1_DONE);
        debug!(program = ?self.program.identity(), slots = offset, "pass one done");
        Ok(())
    }

    /// Complete the program. Every inherited program must already be
    /// finished.
    pub fn finish(mut self) -> Result<Program> {
        if self.program.state() == ProgramState::Building {
            self.end_pass_one()?;
        }
        if !self.program.inherits_finished() {
            return Err(FreezerError::graph(
                "Cannot finish a program whose inherits are unfinished",
            ));
        }
        mark_finished(&self.program);
        Ok(self.program)
    }
}

/// Flip a program to finished.
pub(crate) fn mark_finished(program: &Program) {
    program.data_mut().flags.insert(ProgramFlags::FINISHED);
    debug!(program = ?program.identity(), "program finished");
}

fn local_definitions(data: &ProgramData) -> Vec<(StringValue, MemberRef)> {
    data.references
        .iter()
        .filter(|r| {
            r.inherit == 0
                && !r.flags.intersects(MemberFlags::INHERITED | MemberFlags::HIDDEN)
        })
        .filter_map(|r| data.reference_name(r).map(|n| (n, *r)))
        .collect()
}
