//! Program bodies on the wire.
//!
//! A program body follows a `PROGRAM 4` entry:
//!
//! 1. byte order marker and program flags
//! 2. the format version string
//! 3. ten table sizes and the byte-code method marker
//! 4. the raw blobs: bytecode, relocations, line numbers
//! 5. the string table
//! 6. member entries up to an end-of-table marker
//! 7. the constant pool
//!
//! Member entries are written in reference order. Inherits appear right
//! before the first reference they contribute; references copied in by
//! an inherit are not written at all since linking the inherit again
//! recreates them.

use std::collections::HashSet;

use tracing::debug;

use crate::decoder::DecodeState;
use crate::encoder::EncodeState;
use crate::error::{FreezerError, Result};
use crate::program::{
    ConstantDef, FunctionDef, Inherit, MemberFlags, MemberKind, MemberRef, Program, ProgramBuilder,
    ProgramFlags, SourceLocation, VariableDef,
};
use crate::value::{Object, StringValue, TypeExpr, Value};

/// Byte order marker of this host.
pub(crate) const BYTE_ORDER: i64 = if cfg!(target_endian = "little") { 1234 } else { 4321 };

const ID_RAW: i64 = -2;
const ID_EOT: i64 = -1;
const ID_VARIABLE: i64 = 0;
const ID_FUNCTION: i64 = 1;
const ID_CONSTANT: i64 = 2;
const ID_INHERIT: i64 = 3;

/// Version string written into every program body.
pub(crate) fn format_version() -> StringValue {
    StringValue::from(concat!("freezer ", env!("CARGO_PKG_VERSION")))
}

// ═══════════════════════════════════════════════════════════════════════
// Encoding
// ═══════════════════════════════════════════════════════════════════════

/// Table snapshot taken up front so no borrow of the program is held
/// while nested values are written.
struct Tables {
    flags: ProgramFlags,
    bytecode: Vec<u8>,
    relocations: Vec<u32>,
    linenumbers: Vec<u8>,
    strings: Vec<StringValue>,
    inherits: Vec<Inherit>,
    references: Vec<MemberRef>,
    variables: Vec<VariableDef>,
    functions: Vec<FunctionDef>,
    constants: Vec<ConstantDef>,
    pool: Vec<Value>,
}

impl Tables {
    fn of(program: &Program) -> Self {
        let data = program.data();
        Tables {
            flags: data.flags,
            bytecode: data.bytecode.clone(),
            relocations: data.relocations.clone(),
            linenumbers: data.linenumbers.clone(),
            strings: data.strings.clone(),
            inherits: data.inherits.clone(),
            references: data.references.clone(),
            variables: data.variables.clone(),
            functions: data.functions.clone(),
            constants: data.constants.clone(),
            pool: data.constant_pool.clone(),
        }
    }
}

pub(crate) fn encode_program(state: &mut EncodeState<'_>, program: &Program) -> Result<()> {
    if !program.is_pass_one_done() {
        return Err(FreezerError::graph(format!(
            "Cannot encode {:?}: its member tables are not complete",
            program
        )));
    }
    let tables = Tables::of(program);

    state.number(BYTE_ORDER)?;
    state.number(i64::from((tables.flags & !ProgramFlags::LIFECYCLE).bits()))?;
    state.encode_value(&Value::String(format_version()), false)?;

    for count in [
        tables.bytecode.len(),
        tables.relocations.len(),
        tables.linenumbers.len(),
        tables.strings.len(),
        tables.inherits.len(),
        tables.references.len(),
        tables.variables.len(),
        tables.functions.len(),
        tables.constants.len(),
        tables.pool.len(),
    ] {
        state.number(count as i64)?;
    }
    // Byte-code method: portable.
    state.number(-1)?;

    state.writer().write_bytes(&tables.bytecode);
    for reloc in &tables.relocations {
        state.writer().write_bytes(&reloc.to_ne_bytes());
    }
    state.writer().write_bytes(&tables.linenumbers);

    for s in &tables.strings {
        state.encode_value(&Value::String(s.clone()), false)?;
    }

    encode_members(state, &tables)?;

    state.note(|| ".eot".to_string());
    state.number(ID_EOT)?;

    for constant in &tables.pool {
        state.encode_value(constant, false)?;
        // Slot for a per-constant name, always 0.
        state.encode_value(&Value::Int(0), false)?;
    }
    debug!(
        program = ?program.identity(),
        refs = tables.references.len(),
        constants = tables.pool.len(),
        "encoded program body"
    );
    Ok(())
}

fn encode_members(state: &mut EncodeState<'_>, tables: &Tables) -> Result<()> {
    let mut next_inherit = 1;
    let mut written: HashSet<(MemberKind, usize)> = HashSet::new();

    for (no, r) in tables.references.iter().enumerate() {
        while next_inherit < tables.inherits.len() && tables.inherits[next_inherit].ref_offset <= no {
            next_inherit += encode_inherit(state, &tables.inherits[next_inherit])?;
        }

        if r.flags.contains(MemberFlags::INHERITED) {
            continue;
        }
        if r.inherit != 0 || !written.insert((r.kind, r.index)) {
            state.note(|| format!(".ident raw, {}", no));
            state.number(ID_RAW)?;
            state.number(i64::from(r.flags.modifiers().bits()))?;
            state.number(r.inherit as i64)?;
            state.number(r.kind.code())?;
            state.number(r.index as i64)?;
            state.number(no as i64)?;
            continue;
        }

        let mods = i64::from(r.flags.modifiers().bits());
        match r.kind {
            MemberKind::Variable => {
                let def = tables.variables.get(r.index).ok_or_else(|| bad_index(r))?;
                state.note(|| format!(".ident variable, {}", def.name));
                state.number(ID_VARIABLE)?;
                state.number(mods)?;
                encode_head(state, &def.name, &def.ty, def.location)?;
                state.number(i64::from(def.run_time_type))?;
            }
            MemberKind::Function => {
                let def = tables.functions.get(r.index).ok_or_else(|| bad_index(r))?;
                state.note(|| format!(".ident function, {}", def.name));
                state.number(ID_FUNCTION)?;
                state.number(mods)?;
                encode_head(state, &def.name, &def.ty, def.location)?;
                state.number(i64::from(def.identifier_flags))?;
                state.number(def.offset.map_or(-1, i64::from))?;
                state.number(i64::from(def.opt_flags))?;
            }
            MemberKind::Constant => {
                let def = tables.constants.get(r.index).ok_or_else(|| bad_index(r))?;
                state.note(|| format!(".ident constant, {}", def.name));
                state.number(ID_CONSTANT)?;
                state.number(mods)?;
                encode_head(state, &def.name, &def.ty, def.location)?;
                state.number(def.offset.map_or(-1, |o| o as i64))?;
                state.number(i64::from(def.opt_flags))?;
            }
        }
        state.number(no as i64)?;
    }

    while next_inherit < tables.inherits.len() {
        next_inherit += encode_inherit(state, &tables.inherits[next_inherit])?;
    }
    Ok(())
}

fn bad_index(r: &MemberRef) -> FreezerError {
    FreezerError::graph(format!("Reference to missing {:?} #{}", r.kind, r.index))
}

/// Name, type and source position shared by every definition entry.
fn encode_head(
    state: &mut EncodeState<'_>,
    name: &StringValue,
    ty: &TypeExpr,
    location: SourceLocation,
) -> Result<()> {
    state.encode_value(&Value::String(name.clone()), false)?;
    state.encode_value(&Value::Type(ty.clone()), false)?;
    state.number(location.file.map_or(-1, |f| f as i64))?;
    state.number(location.line)
}

/// Write one direct inherit. Returns how many inherit entries it covers,
/// its own nested inherits included.
fn encode_inherit(state: &mut EncodeState<'_>, inherit: &Inherit) -> Result<usize> {
    let program = inherit
        .program
        .clone()
        .ok_or_else(|| FreezerError::graph("Inherit entry without a program"))?;
    state.note(|| format!(".inherit {:?}", inherit.name));
    state.number(ID_INHERIT)?;
    state.number(i64::from(inherit.flags.modifiers().bits()))?;
    match &inherit.name {
        Some(name) => state.encode_value(&Value::String(name.clone()), false)?,
        None => state.encode_value(&Value::Int(0), false)?,
    }
    state.encode_value(&Value::Program(program.clone()), true)?;
    match &inherit.parent {
        Some(parent) => state.encode_value(&Value::Object(parent.clone()), false)?,
        None => state.encode_value(&Value::Int(0), false)?,
    }
    state.number(program.num_references() as i64)?;
    state.number(inherit.ref_offset as i64)?;
    Ok(program.num_inherits())
}

// ═══════════════════════════════════════════════════════════════════════
// Decoding
// ═══════════════════════════════════════════════════════════════════════

/// Declared table sizes.
struct Counts {
    bytecode: usize,
    relocations: usize,
    linenumbers: usize,
    strings: usize,
    inherits: usize,
    references: usize,
    variables: usize,
    functions: usize,
    constants: usize,
    pool: usize,
}

pub(crate) fn decode_program(state: &mut DecodeState<'_, '_>, program: &Program) -> Result<()> {
    let mut builder = ProgramBuilder::resume(program.clone())?;

    let byte_order = state.number()?;
    if byte_order != 1234 && byte_order != 4321 {
        return Err(FreezerError::format(format!(
            "Unsupported byte-order {}",
            byte_order
        )));
    }
    let swap = byte_order != BYTE_ORDER;

    let flags = state.number()?;
    let flags = u16::try_from(flags)
        .map_err(|_| FreezerError::format(format!("Bad program flags {:#x}", flags)))?;
    builder.set_flags(ProgramFlags::from_bits_retain(flags));

    let version = state.decode_string()?;
    if version != format_version() {
        return Err(FreezerError::format(format!(
            "Unsupported version {}",
            version
        )));
    }
    state.raise_pickyness();

    let counts = Counts {
        bytecode: state.count()?,
        relocations: state.count()?,
        linenumbers: state.count()?,
        strings: state.count()?,
        inherits: state.count()?,
        references: state.count()?,
        variables: state.count()?,
        functions: state.count()?,
        constants: state.count()?,
        pool: state.count()?,
    };
    let method = state.number()?;
    if method != -1 {
        return Err(FreezerError::unsupported(format!(
            "Byte-code method {} is not supported",
            method
        )));
    }

    let bytecode = state.reader().read_bytes(counts.bytecode)?.to_vec();
    builder.set_bytecode(bytecode);
    let reloc_bytes = counts
        .relocations
        .checked_mul(4)
        .ok_or_else(|| FreezerError::format("Relocation table size overflows"))?;
    let raw = state.reader().read_bytes(reloc_bytes)?;
    let relocations = raw
        .chunks_exact(4)
        .map(|c| {
            let v = u32::from_ne_bytes([c[0], c[1], c[2], c[3]]);
            if swap {
                v.swap_bytes()
            } else {
                v
            }
        })
        .collect();
    builder.set_relocations(relocations);
    let linenumbers = state.reader().read_bytes(counts.linenumbers)?.to_vec();
    builder.set_linenumbers(linenumbers);

    for _ in 0..counts.strings {
        let s = state.decode_string()?;
        builder.push_string(s);
    }

    decode_members(state, &mut builder)?;
    check_counts(builder.program(), &counts)?;
    builder.end_pass_one()?;

    for _ in 0..counts.pool {
        let constant = state.decode_value()?;
        state.decode_value()?;
        builder.add_constant(constant);
    }

    state.lower_pickyness();
    debug!(program = ?program.identity(), "decoded program body");
    state.program_done(program)
}

fn decode_members(state: &mut DecodeState<'_, '_>, builder: &mut ProgramBuilder) -> Result<()> {
    loop {
        let at = state.position();
        let kind = state.number()?;
        match kind {
            ID_EOT => {
                state.note(at, || ".eot".to_string());
                return Ok(());
            }
            ID_RAW => {
                let flags = member_flags(state.number()?)?;
                let inherit = state.count()?;
                let code = state.number()?;
                let kind = MemberKind::from_code(code)
                    .ok_or_else(|| FreezerError::format(format!("Unknown member kind {}", code)))?;
                let index = state.count()?;
                let no = state.count()?;
                state.note(at, || format!(".ident raw, {}", no));
                builder.set_reference(
                    no,
                    MemberRef {
                        inherit,
                        flags,
                        kind,
                        index,
                    },
                )?;
            }
            ID_VARIABLE => {
                let flags = member_flags(state.number()?)?;
                let (name, ty, location) = decode_head(state)?;
                let rtt = state.number()?;
                let run_time_type = u8::try_from(rtt)
                    .map_err(|_| FreezerError::format(format!("Bad run-time type {}", rtt)))?;
                let expected = state.count()?;
                state.note(at, || format!(".ident variable, {}", name));
                let no = builder.add_variable(
                    VariableDef {
                        name,
                        ty,
                        run_time_type,
                        location,
                    },
                    flags,
                )?;
                check_offset(no, expected)?;
            }
            ID_FUNCTION => {
                let flags = member_flags(state.number()?)?;
                let (name, ty, location) = decode_head(state)?;
                let identifier_flags = small_u16(state.number()?, "identifier flags")?;
                let offset = match state.number()? {
                    -1 => None,
                    o => Some(u32::try_from(o).map_err(|_| {
                        FreezerError::format(format!("Bad function offset {}", o))
                    })?),
                };
                let opt_flags = small_u16(state.number()?, "optimizer flags")?;
                let expected = state.count()?;
                state.note(at, || format!(".ident function, {}", name));
                let no = builder.add_function(
                    FunctionDef {
                        name,
                        ty,
                        identifier_flags,
                        offset,
                        opt_flags,
                        location,
                    },
                    flags,
                )?;
                check_offset(no, expected)?;
            }
            ID_CONSTANT => {
                let flags = member_flags(state.number()?)?;
                let (name, ty, location) = decode_head(state)?;
                let offset = match state.number()? {
                    -1 => None,
                    o => Some(usize::try_from(o).map_err(|_| {
                        FreezerError::format(format!("Bad constant offset {}", o))
                    })?),
                };
                let opt_flags = small_u16(state.number()?, "optimizer flags")?;
                let expected = state.count()?;
                state.note(at, || format!(".ident constant, {}", name));
                let no = builder.add_constant_def(
                    ConstantDef {
                        name,
                        ty,
                        offset,
                        opt_flags,
                        location,
                    },
                    flags,
                )?;
                check_offset(no, expected)?;
            }
            ID_INHERIT => decode_inherit(state, builder, at)?,
            other => {
                return Err(FreezerError::format(format!(
                    "Unknown member entry kind {}",
                    other
                )));
            }
        }
    }
}

fn decode_head(state: &mut DecodeState<'_, '_>) -> Result<(StringValue, TypeExpr, SourceLocation)> {
    let name = state.decode_string()?;
    let ty = state.decode_type_value()?;
    let file = match state.number()? {
        -1 => None,
        f => Some(usize::try_from(f).map_err(|_| FreezerError::format(format!("Bad file index {}", f)))?),
    };
    let line = state.number()?;
    Ok((name, ty, SourceLocation { file, line }))
}

fn decode_inherit(state: &mut DecodeState<'_, '_>, builder: &mut ProgramBuilder, at: usize) -> Result<()> {
    let flags = member_flags(state.number()?)?;
    let name = match state.decode_value()? {
        Value::String(s) => Some(s),
        Value::Int(0) => None,
        other => {
            return Err(FreezerError::format(format!(
                "Inherit name is {} rather than a string",
                other.type_name()
            )));
        }
    };
    state.note(at, || format!(".inherit {:?}", name));
    let program = match state.decode_value()? {
        Value::Program(p) => p,
        other => {
            return Err(FreezerError::format(format!(
                "Inherit of {} rather than a program",
                other.type_name()
            )));
        }
    };
    let parent: Option<Object> = match state.decode_value()? {
        Value::Object(o) => Some(o),
        Value::Int(0) => None,
        other => {
            return Err(FreezerError::format(format!(
                "Inherit parent is {} rather than an object",
                other.type_name()
            )));
        }
    };
    let num_references = state.count()?;
    let ref_offset = state.count()?;

    if ref_offset != builder.program().num_references() {
        return Err(FreezerError::graph(format!(
            "Bad inherit identifier offset {} (table has {})",
            ref_offset,
            builder.program().num_references()
        )));
    }
    if !program.is_pass_one_done() {
        return Err(FreezerError::graph(format!(
            "Inherited {:?} is not complete",
            program
        )));
    }
    if program.num_references() != num_references {
        return Err(FreezerError::graph(format!(
            "Inherited program has {} references, expected {}",
            program.num_references(),
            num_references
        )));
    }
    builder.link(&program, parent, name, flags)?;
    Ok(())
}

fn check_offset(no: usize, expected: usize) -> Result<()> {
    if no != expected {
        return Err(FreezerError::graph(format!(
            "Bad identifier reference offset {} != {}",
            no, expected
        )));
    }
    Ok(())
}

fn check_counts(program: &Program, counts: &Counts) -> Result<()> {
    let data = program.data();
    let checks = [
        ("inherit", data.inherits.len(), counts.inherits),
        ("reference", data.references.len(), counts.references),
        ("variable", data.variables.len(), counts.variables),
        ("function", data.functions.len(), counts.functions),
        ("constant", data.constants.len(), counts.constants),
    ];
    for (what, got, declared) in checks {
        if got != declared {
            return Err(FreezerError::graph(format!(
                "Program has {} {} entries, {} declared",
                got, what, declared
            )));
        }
    }
    Ok(())
}

fn member_flags(n: i64) -> Result<MemberFlags> {
    small_u16(n, "member flags").map(MemberFlags::from_bits_retain)
}

fn small_u16(n: i64, what: &str) -> Result<u16> {
    u16::try_from(n).map_err(|_| FreezerError::format(format!("Bad {} {}", what, n)))
}
