//! Event opcode taxonomy (§3.2).
//!
//! The spec notes exact byte values are implementation-defined but fixed
//! within a build; nothing downstream depends on a specific numbering, so
//! this is a plain tagged enum rather than a hand-packed byte, the same
//! choice the teacher makes for its instruction opcode (`Opcode`) versus
//! its raw encoded `u32` word.

use tilc_types::{AliasSet, TypeDescriptor};

/// One event's opcode tag (`code[i]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventOp {
    // -- Block header --
    /// Straight-line block entry; no scope boundary.
    Nop = 0,
    /// Header of a loop/case scope: `data` = dominator's last event index.
    CaseHeader,
    /// Header of a join scope: `data` = join partner's event index.
    JoinHeader,

    // -- SSA markers --
    /// Block-argument placeholder; `data` starts at 0, later holds the min
    /// incoming `JoinCopy` argument index.
    Phi,
    /// Argument handoff at a `Goto`; `data` = target's phi slot.
    JoinCopy,
    /// An ordinary SSA value-producing event.
    Value,
    /// A value-producing event whose operand(s) are consumed destructively
    /// (the instruction overwrites one of its own sources).
    DestructiveValue,
    /// An explicit register-to-register copy, inserted by copy linking.
    Copy,

    // -- Uses --
    /// An ordinary use whose value must survive past this point (resolved
    /// from `LastUse` once a second same-target last-use is found live).
    Use,
    /// A use emitted by lowering at its consumption point, liveness not
    /// yet resolved; last-use detection turns every one of these into
    /// either `Use` or `OnlyUse`.
    LastUse,
    /// A use the copy-linking pass (§4.5) has tied to a `Copy`: the value
    /// is about to be destructively consumed.
    MutedUse,
    /// A `LastUse` proven to be its target's only use anywhere in the
    /// stream.
    OnlyUse,

    // -- Fixed-register hints --
    /// Divide/multiply operand constraint: the dividend must sit in EAX.
    UseEax,
    /// Divide operand constraint: EDX must hold the sign-extended dividend
    /// half, and is clobbered across the instruction.
    UseEdx,
    /// A use that also depends on the current flags register contents.
    UseEflags,
    /// Prefers (does not require) a specific physical register for `data`.
    RegisterHint,
    /// Marks a register as unavailable to any value live across this point.
    ClobberList,

    // -- Literals --
    /// `data` = literal bit pattern, narrower than 32 bits.
    ImmediateBytes,
    /// `data` = a full 32-bit integer literal.
    Int32,

    // -- Arithmetic / compare / logic / memory --
    Add,
    Sub,
    Mul,
    Div,
    Imod,
    Compare,
    Logic,
    Logic3,
    Load,
    Store,
    Neg,
    Shuffle,

    // -- Terminators --
    /// Unconditional jump; `data` = target block's first event.
    Jump,
    /// Conditional branch's "taken" edge; `data` = target block's first
    /// event (conventionally the else/fallthrough target, see
    /// `BranchTarget` for the paired then-target).
    Branch,
    /// The `then` edge of a `Branch`, emitted immediately after it.
    BranchTarget,
    /// Function return; `data` = the returned value's event index.
    Ret,
}

impl EventOp {
    const VARIANTS: &'static [EventOp] = &[
        EventOp::Nop,
        EventOp::CaseHeader,
        EventOp::JoinHeader,
        EventOp::Phi,
        EventOp::JoinCopy,
        EventOp::Value,
        EventOp::DestructiveValue,
        EventOp::Copy,
        EventOp::Use,
        EventOp::LastUse,
        EventOp::MutedUse,
        EventOp::OnlyUse,
        EventOp::UseEax,
        EventOp::UseEdx,
        EventOp::UseEflags,
        EventOp::RegisterHint,
        EventOp::ClobberList,
        EventOp::ImmediateBytes,
        EventOp::Int32,
        EventOp::Add,
        EventOp::Sub,
        EventOp::Mul,
        EventOp::Div,
        EventOp::Imod,
        EventOp::Compare,
        EventOp::Logic,
        EventOp::Logic3,
        EventOp::Load,
        EventOp::Store,
        EventOp::Neg,
        EventOp::Shuffle,
        EventOp::Jump,
        EventOp::Branch,
        EventOp::BranchTarget,
        EventOp::Ret,
    ];

    /// Reconstructs an opcode from its raw byte. Panics on an out-of-range
    /// byte: the event stream is only ever populated through this crate, so
    /// an unrecognized tag means memory corruption or a mismatched build,
    /// not a recoverable input error.
    pub fn from_u8(b: u8) -> Self {
        Self::VARIANTS[b as usize]
    }

    /// `true` for `Use`/`LastUse`/`MutedUse`/`OnlyUse`.
    pub fn is_use(self) -> bool {
        matches!(
            self,
            EventOp::Use | EventOp::LastUse | EventOp::MutedUse | EventOp::OnlyUse
        )
    }

    /// `true` for the two scope-boundary header opcodes.
    pub fn is_header(self) -> bool {
        matches!(self, EventOp::Nop | EventOp::CaseHeader | EventOp::JoinHeader)
    }

    /// `true` for opcodes that produce an SSA value other values can refer
    /// to by event index (anything the allocator assigns a register to).
    pub fn is_value(self) -> bool {
        matches!(
            self,
            EventOp::Phi
                | EventOp::Value
                | EventOp::DestructiveValue
                | EventOp::Copy
                | EventOp::ImmediateBytes
                | EventOp::Int32
                | EventOp::Add
                | EventOp::Sub
                | EventOp::Mul
                | EventOp::Div
                | EventOp::Imod
                | EventOp::Compare
                | EventOp::Logic
                | EventOp::Logic3
                | EventOp::Load
                | EventOp::Store
                | EventOp::Neg
                | EventOp::Shuffle
        )
    }

    /// `true` for the terminator category.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            EventOp::Jump | EventOp::Branch | EventOp::BranchTarget | EventOp::Ret
        )
    }
}

/// `data` payload for a `Value`/`DestructiveValue`/`Copy` event: the alias
/// set its result lives in plus its scalar/vector type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValuePayload {
    pub alias_set: AliasSet,
    pub type_desc: TypeDescriptor,
}

impl ValuePayload {
    pub fn pack(self) -> u32 {
        (self.alias_set as u32) | ((self.type_desc.to_byte() as u32) << 8)
    }

    pub fn unpack(data: u32) -> Self {
        let alias_set = match data & 0xFF {
            0 => AliasSet::Gpr,
            1 => AliasSet::Flags,
            2 => AliasSet::Mmx,
            3 => AliasSet::Sse,
            _ => AliasSet::Mask,
        };
        let type_desc = TypeDescriptor::from_byte(((data >> 8) & 0xFF) as u8);
        ValuePayload { alias_set, type_desc }
    }
}

/// Sub-opcode payload shared by `Compare`/`Logic`/`Logic3` (§4.2's `{type:8,
/// kind:4}` example): a type descriptor plus a small per-category kind tag
/// (comparison predicate, logic-table index, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArithPayload {
    pub type_desc: TypeDescriptor,
    pub kind: u8,
}

impl ArithPayload {
    pub fn pack(self) -> u32 {
        (self.type_desc.to_byte() as u32) | ((self.kind as u32) << 8)
    }

    pub fn unpack(data: u32) -> Self {
        ArithPayload {
            type_desc: TypeDescriptor::from_byte((data & 0xFF) as u8),
            kind: ((data >> 8) & 0xFF) as u8,
        }
    }
}

/// Comparison predicate, the `kind` field of an [`ArithPayload`] on a
/// `Compare` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompareKind {
    Eq = 0,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_u8_roundtrips_every_variant() {
        for (i, op) in EventOp::VARIANTS.iter().enumerate() {
            assert_eq!(EventOp::from_u8(i as u8), *op);
        }
    }

    #[test]
    fn value_payload_roundtrip() {
        let p = ValuePayload {
            alias_set: AliasSet::Sse,
            type_desc: TypeDescriptor::new(0, 5, tilc_types::BaseType::Float),
        };
        assert_eq!(ValuePayload::unpack(p.pack()), p);
    }
}
