//! Flag words for programs, member references and identifiers

use bitflags::bitflags;

bitflags! {
    /// Program-level flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProgramFlags: u16 {
        /// Bytecode has been optimized
        const OPTIMIZED = 0x0001;
        /// Layout can no longer change
        const FIXED = 0x0002;
        /// Whole inherit chain is complete; instances may be created
        const FINISHED = 0x0004;
        /// Member tables are internally consistent
        const PASS_1_DONE = 0x0008;
        /// Destruct instances as soon as they become garbage
        const DESTRUCT_IMMEDIATE = 0x0010;
        /// Implemented natively; only resolvable through a codec
        const HAS_C_METHODS = 0x0020;
        /// Program has no mutable state
        const CONSTANT = 0x0040;
        /// Instances refer to their parent object
        const USES_PARENT = 0x0080;
        /// Keep weak references alive through collection
        const NO_WEAK_FREE = 0x0100;
        /// Instances may not be destructed explicitly
        const NO_EXPLICIT_DESTRUCT = 0x0200;
        /// Skip consistency checks
        const AVOID_CHECK = 0x0400;
        /// Freshly allocated embryo, nothing filled in yet
        const VIRGIN = 0x0800;
        /// Instances must have a parent object
        const NEEDS_PARENT = 0x1000;
    }
}

impl ProgramFlags {
    /// Lifecycle bits that are recomputed by the decoder rather than
    /// taken from the stream.
    pub const LIFECYCLE: ProgramFlags = ProgramFlags::OPTIMIZED
        .union(ProgramFlags::FIXED)
        .union(ProgramFlags::FINISHED)
        .union(ProgramFlags::PASS_1_DONE)
        .union(ProgramFlags::VIRGIN);
}

bitflags! {
    /// Flags on a member reference: visibility, locality, override state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemberFlags: u16 {
        /// Visible to inheriting programs only
        const PROTECTED = 0x0001;
        /// Invisible outside the defining program
        const PRIVATE = 0x0002;
        /// Cannot be overridden
        const FINAL = 0x0004;
        /// Explicitly public
        const PUBLIC = 0x0008;
        /// Referenced from bytecode
        const USED = 0x0010;
        /// Bound locally, not through the override chain
        const LOCAL = 0x0020;
        /// Not found by name lookup
        const HIDDEN = 0x0040;
        /// Copied from an inherited program
        const INHERITED = 0x0080;
        /// May be missing in implementations
        const OPTIONAL = 0x0100;
        /// Declared here, defined elsewhere
        const EXTERN = 0x0200;
        /// Overloaded on argument types
        const VARIANT = 0x0400;
        /// Weak reference storage
        const WEAK = 0x0800;
        /// Generator function
        const GENERATOR = 0x1000;
        /// Asynchronous function
        const ASYNC = 0x2000;
    }
}

impl MemberFlags {
    /// Bits that travel on the wire as modifiers.
    pub const MODIFIER_MASK: MemberFlags = MemberFlags::from_bits_retain(0x2fff);

    /// Only the modifier bits.
    pub fn modifiers(self) -> MemberFlags {
        self & Self::MODIFIER_MASK
    }
}

/// Identifier kind: variable
pub const IDENTIFIER_VARIABLE: u16 = 0;
/// Identifier kind: constant
pub const IDENTIFIER_CONSTANT: u16 = 1;
/// Identifier kind: natively implemented function
pub const IDENTIFIER_C_FUNCTION: u16 = 2;
/// Identifier kind: bytecode function
pub const IDENTIFIER_PIKE_FUNCTION: u16 = 3;
/// Mask for the identifier kind
pub const IDENTIFIER_TYPE_MASK: u16 = 3;
/// Identifier is an alias of another
pub const IDENTIFIER_ALIAS: u16 = 4;
