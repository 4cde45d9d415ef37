//! Instruction selection (§2 component F/G glue): turns an allocated,
//! normalized, commuted [`EventStream`] into a [`Builder`] ready to encode.
//!
//! The walk is a single forward pass over `0..stream.len()`. Lowering
//! (`tilc-lower`) emits every function's events into one stream via a
//! running cursor in block-array order, so the stream's own order already
//! matches the order instructions must be pushed in -- no scheduling step
//! is needed here, only a skip/emit decision per event.
//!
//! Two things the allocator leaves behind make the single pass possible:
//! the final register for any value (read live off the stream, via
//! [`resolve_register`]), and the original per-event sub-opcode payload
//! (type/kind for arithmetic events, the raw literal for immediates) that
//! [`Payloads::capture`] must snapshot *before* allocation overwrites it --
//! `allocate` unconditionally replaces a self-keyed value event's `data`
//! with its assigned register mask, destroying whatever the event used to
//! carry there.

use std::collections::{BTreeSet, HashMap};

use tilc_event::{ArithPayload, CompareKind, EventOp, EventStream};
use tilc_types::{BaseType, EventIndex, RegisterMask, TypeDescriptor};
use x64_encode::{Builder, Label, OperandSize, Reg};

use crate::error::BackendError;

const EAX: Reg = Reg(0);
const EDX: Reg = Reg(2);

/// Snapshot of every event's `data` word taken right after lowering, before
/// [`tilc_regalloc::allocate`] overwrites self-keyed value events' `data`
/// with their assigned register. Selection reads registers live off the
/// (by-then allocated) stream and everything else -- literal values,
/// [`ArithPayload`] type/kind -- from here.
#[derive(Debug, Clone)]
pub struct Payloads {
    raw: Vec<u32>,
}

impl Payloads {
    /// Must run before `tilc_regalloc::normalize_and_allocate`.
    pub fn capture(stream: &EventStream) -> Self {
        let n = stream.len();
        let mut raw = Vec::with_capacity(n);
        for idx in 0..n {
            raw.push(stream.data(EventIndex::new(idx as u32)));
        }
        Payloads { raw }
    }

    fn literal(&self, i: EventIndex) -> i32 {
        self.raw[i.index()] as i32
    }

    fn arith(&self, i: EventIndex) -> ArithPayload {
        ArithPayload::unpack(self.raw[i.index()])
    }
}

/// Resolves `i`'s assigned register off the live (post-allocation) stream.
///
/// A self-keyed value event (everything but `Copy`) has its own `data`
/// overwritten with its register mask directly. A `Copy` or any `is_use()`
/// event's `data` instead holds its canonical key's event index (left
/// there by `tilc-regalloc`'s key compression), so resolving it takes one
/// extra hop through that key's `data`.
fn resolve_register(stream: &EventStream, i: EventIndex) -> RegisterMask {
    let op = stream.op(i);
    let key = if op == EventOp::Copy || op.is_use() {
        EventIndex::new(stream.data(i))
    } else {
        i
    };
    RegisterMask::from_bits_truncate(stream.data(key))
}

fn reg_of(stream: &EventStream, i: EventIndex) -> Result<Reg, BackendError> {
    match resolve_register(stream, i).lowest_bit_index() {
        Some(bit) => Ok(Reg(bit as u8)),
        None => Err(BackendError::RegisterPressureExceeded { index: i.get() }),
    }
}

fn operand_size(type_desc: TypeDescriptor) -> OperandSize {
    match type_desc.bits() {
        64 => OperandSize::Size64,
        16 => OperandSize::Size16,
        _ => OperandSize::Size32,
    }
}

fn prev(i: EventIndex, back: u32) -> EventIndex {
    EventIndex::new(i.get() - back)
}

/// Picks the `Jcc` variant matching a comparison's kind and signedness
/// (§6.3's flag-to-byte table, specialized per condition).
fn jcc_fn(kind: CompareKind, signed: bool) -> fn(&mut Builder, Label) -> &mut Builder {
    match (kind, signed) {
        (CompareKind::Eq, _) => Builder::jcc_e,
        (CompareKind::Ne, _) => Builder::jcc_ne,
        (CompareKind::Lt, true) => Builder::jcc_l,
        (CompareKind::Lt, false) => Builder::jcc_b,
        (CompareKind::Le, true) => Builder::jcc_le,
        (CompareKind::Le, false) => Builder::jcc_be,
        (CompareKind::Gt, true) => Builder::jcc_g,
        (CompareKind::Gt, false) => Builder::jcc_a,
        (CompareKind::Ge, true) => Builder::jcc_ge,
        (CompareKind::Ge, false) => Builder::jcc_ae,
    }
}

/// Runs instruction selection over an allocated stream, returning a
/// [`Builder`] ready for [`Builder::encode`] or [`Builder::encode_relaxed`].
pub fn select(stream: &EventStream, payloads: &Payloads) -> Result<Builder, BackendError> {
    let n = stream.len();
    let mut builder = Builder::new();

    let mut targets = BTreeSet::new();
    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        match stream.op(i) {
            EventOp::Jump | EventOp::Branch | EventOp::BranchTarget => {
                targets.insert(stream.data(i));
            }
            _ => {}
        }
    }
    let mut labels = HashMap::new();
    for target in targets {
        labels.insert(target, builder.new_label());
    }

    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        if let Some(&label) = labels.get(&(idx as u32)) {
            builder.place_label(label);
        }
        select_event(stream, payloads, i, &mut builder, &labels)?;
    }

    Ok(builder)
}

fn select_event(
    stream: &EventStream,
    payloads: &Payloads,
    i: EventIndex,
    b: &mut Builder,
    labels: &HashMap<u32, Label>,
) -> Result<(), BackendError> {
    match stream.op(i) {
        EventOp::Nop
        | EventOp::CaseHeader
        | EventOp::JoinHeader
        | EventOp::Phi
        | EventOp::Use
        | EventOp::LastUse
        | EventOp::MutedUse
        | EventOp::OnlyUse
        | EventOp::UseEax
        | EventOp::UseEdx
        | EventOp::UseEflags
        | EventOp::RegisterHint
        | EventOp::ClobberList
        | EventOp::Copy
        | EventOp::BranchTarget => Ok(()),

        EventOp::ImmediateBytes | EventOp::Int32 => select_immediate(stream, payloads, i, b),
        EventOp::Add => select_binary(stream, payloads, i, b, Builder::add_mr),
        EventOp::Sub => select_binary(stream, payloads, i, b, Builder::sub_mr),
        EventOp::Logic => select_logic(stream, payloads, i, b),
        EventOp::Logic3 => select_shift(stream, payloads, i, b),
        EventOp::Mul => select_mul(stream, payloads, i, b),
        EventOp::Div | EventOp::Imod => select_div(stream, payloads, i, b),
        EventOp::Neg => select_neg(stream, payloads, i, b),
        EventOp::Compare => select_compare(stream, payloads, i, b),
        EventOp::JoinCopy => select_join_copy(stream, i, b),
        EventOp::Jump => select_jump(stream, i, b, labels),
        EventOp::Branch => select_branch(stream, payloads, i, b, labels),
        EventOp::Ret => {
            b.ret();
            Ok(())
        }

        op @ (EventOp::Load
        | EventOp::Store
        | EventOp::Shuffle
        | EventOp::Value
        | EventOp::DestructiveValue) => Err(BackendError::UnsupportedOp { op, index: i.get() }),
    }
}

fn select_immediate(
    stream: &EventStream,
    payloads: &Payloads,
    i: EventIndex,
    b: &mut Builder,
) -> Result<(), BackendError> {
    let dst = reg_of(stream, i)?;
    b.mov_mi(dst, payloads.literal(i), OperandSize::Size32);
    Ok(())
}

/// Moves `dst` in from `lhs` first when they differ, matching destructive
/// two-operand encoding (`op dst, rhs` overwrites `dst`): nothing upstream
/// ties a binary op's result register to its lhs operand's, so selection
/// has to insert this move itself whenever allocation didn't happen to
/// land them on the same register.
fn move_in_lhs(b: &mut Builder, dst: Reg, lhs: Reg, size: OperandSize) {
    if dst != lhs {
        b.mov_mr(dst, lhs, size);
    }
}

fn select_binary(
    stream: &EventStream,
    payloads: &Payloads,
    i: EventIndex,
    b: &mut Builder,
    op: fn(&mut Builder, Reg, Reg, OperandSize) -> &mut Builder,
) -> Result<(), BackendError> {
    let lhs = reg_of(stream, prev(i, 2))?;
    let rhs = reg_of(stream, prev(i, 1))?;
    let dst = reg_of(stream, i)?;
    let size = operand_size(payloads.arith(i).type_desc);
    move_in_lhs(b, dst, lhs, size);
    op(b, dst, rhs, size);
    Ok(())
}

fn select_logic(
    stream: &EventStream,
    payloads: &Payloads,
    i: EventIndex,
    b: &mut Builder,
) -> Result<(), BackendError> {
    let payload = payloads.arith(i);
    let op: fn(&mut Builder, Reg, Reg, OperandSize) -> &mut Builder = match payload.kind {
        0 => Builder::and_mr,
        1 => Builder::or_mr,
        _ => Builder::xor_mr,
    };
    select_binary(stream, payloads, i, b, op)
}

fn select_shift(
    stream: &EventStream,
    payloads: &Payloads,
    i: EventIndex,
    b: &mut Builder,
) -> Result<(), BackendError> {
    let rhs_use = prev(i, 1);
    let rhs_key = EventIndex::new(stream.data(rhs_use));
    if !matches!(stream.op(rhs_key), EventOp::ImmediateBytes | EventOp::Int32) {
        // The table only tabulates the immediate-count SHL/SHR/SAR forms
        // (`0xC1 /4,/5,/7`, imm8); the variable-count `0xD3` forms were
        // never in the declared coverage (EXPANSION C).
        return Err(BackendError::UnsupportedOp { op: stream.op(i), index: i.get() });
    }
    let amount = payloads.literal(rhs_key) as i8;
    let lhs = reg_of(stream, prev(i, 2))?;
    let dst = reg_of(stream, i)?;
    let payload = payloads.arith(i);
    let size = operand_size(payload.type_desc);
    move_in_lhs(b, dst, lhs, size);
    match payload.kind {
        0 => b.shl(dst, amount, size),
        1 => b.shr(dst, amount, size),
        _ => b.sar(dst, amount, size),
    };
    Ok(())
}

fn select_mul(
    stream: &EventStream,
    payloads: &Payloads,
    i: EventIndex,
    b: &mut Builder,
) -> Result<(), BackendError> {
    let lhs = reg_of(stream, prev(i, 2))?;
    let rhs = reg_of(stream, prev(i, 1))?;
    let dst = reg_of(stream, i)?;
    let size = operand_size(payloads.arith(i).type_desc);
    move_in_lhs(b, dst, lhs, size);
    b.imul_rm(dst, rhs, size);
    Ok(())
}

/// `IDIV`'s RDX:RAX dividend isn't sign-extended here -- the event model
/// (§4.2) has no explicit sign-extend construct, and nothing upstream of
/// this backend emits one, so this is correct only for dividends already
/// known non-negative. A later pass could widen `bop_event` to emit a
/// `CDQ`-equivalent event ahead of `Div`/`Imod`; the opcode table doesn't
/// tabulate one today.
fn select_div(
    stream: &EventStream,
    payloads: &Payloads,
    i: EventIndex,
    b: &mut Builder,
) -> Result<(), BackendError> {
    let dividend = reg_of(stream, prev(i, 2))?;
    let divisor = reg_of(stream, prev(i, 1))?;
    let dst = reg_of(stream, i)?;
    let size = operand_size(payloads.arith(i).type_desc);
    if dividend != EAX {
        b.mov_mr(EAX, dividend, size);
    }
    b.idiv(divisor, size);
    let result = if stream.op(i) == EventOp::Div { EAX } else { EDX };
    if dst != result {
        b.mov_mr(dst, result, size);
    }
    Ok(())
}

fn select_neg(
    stream: &EventStream,
    payloads: &Payloads,
    i: EventIndex,
    b: &mut Builder,
) -> Result<(), BackendError> {
    let src = reg_of(stream, prev(i, 1))?;
    let dst = reg_of(stream, i)?;
    let size = operand_size(payloads.arith(i).type_desc);
    move_in_lhs(b, dst, src, size);
    b.neg(dst, size);
    Ok(())
}

fn select_compare(
    stream: &EventStream,
    payloads: &Payloads,
    i: EventIndex,
    b: &mut Builder,
) -> Result<(), BackendError> {
    let lhs = reg_of(stream, prev(i, 2))?;
    let rhs = reg_of(stream, prev(i, 1))?;
    let size = operand_size(payloads.arith(i).type_desc);
    b.cmp_rm(lhs, rhs, size);
    Ok(())
}

/// Result landing in a different register from its incoming value is the
/// common case (a phi is always its own allocatable unit, linked to its
/// source only through a soft goal), so `JoinCopy` usually needs a real
/// move; when allocation happened to land both in the same register the
/// move would be a no-op and is skipped.
fn select_join_copy(stream: &EventStream, i: EventIndex, b: &mut Builder) -> Result<(), BackendError> {
    let phi = EventIndex::new(stream.data(i));
    let src = prev(i, 1);
    let phi_reg = reg_of(stream, phi)?;
    let src_reg = reg_of(stream, src)?;
    if phi_reg != src_reg {
        b.mov_mr(phi_reg, src_reg, OperandSize::Size32);
    }
    Ok(())
}

fn select_jump(stream: &EventStream, i: EventIndex, b: &mut Builder, labels: &HashMap<u32, Label>) -> Result<(), BackendError> {
    let target = *labels.get(&stream.data(i)).expect("jump target was pre-registered");
    b.jmp(target);
    Ok(())
}

fn select_branch(
    stream: &EventStream,
    payloads: &Payloads,
    i: EventIndex,
    b: &mut Builder,
    labels: &HashMap<u32, Label>,
) -> Result<(), BackendError> {
    let cond_use = prev(i, 1);
    let cmp_key = EventIndex::new(stream.data(cond_use));
    let payload = payloads.arith(cmp_key);
    let kind = match payload.kind {
        0 => CompareKind::Eq,
        1 => CompareKind::Ne,
        2 => CompareKind::Lt,
        3 => CompareKind::Le,
        4 => CompareKind::Gt,
        _ => CompareKind::Ge,
    };
    let signed = matches!(payload.type_desc.base_type(), BaseType::Signed);

    let branch_target = EventIndex::new(i.get() + 1);
    let then_first = stream.data(branch_target);
    let else_first = stream.data(i);
    let then_label = *labels.get(&then_first).expect("branch-target target was pre-registered");
    let else_label = *labels.get(&else_first).expect("branch target was pre-registered");

    jcc_fn(kind, signed)(b, then_label);
    b.jmp(else_label);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int32() -> TypeDescriptor {
        TypeDescriptor::new(0, 5, BaseType::Signed)
    }

    /// §8.4 scenario 1, with the caller's arg-to-register move "omitted for
    /// brevity" modeled as a fixed `UseEax`/`UseEdx` hint on each phi --
    /// the worked example's own text says as much. Hand-traced against
    /// `tilc-regalloc::allocate`: with those two hints the only conflict is
    /// between the phis themselves, so the worklist (ordered by descending
    /// conflict degree, ties broken by declaration order) assigns phi `a`
    /// EAX and phi `b` EDX first, then the unconstrained `Add` falls back
    /// to the lowest free register, which is EAX again -- matching `a`'s,
    /// so no corrective move is needed before `ADD EAX, EDX`.
    #[test]
    fn single_add_matches_worked_example() {
        let mut s = EventStream::with_len(9);
        s.set(EventIndex::new(0), EventOp::Nop, 0);
        s.set(EventIndex::new(1), EventOp::Phi, 0);
        s.set(EventIndex::new(2), EventOp::UseEax, 0);
        s.set(EventIndex::new(3), EventOp::Phi, 0);
        s.set(EventIndex::new(4), EventOp::UseEdx, 0);
        s.set(EventIndex::new(5), EventOp::LastUse, 1);
        s.set(EventIndex::new(6), EventOp::LastUse, 3);
        s.set(
            EventIndex::new(7),
            EventOp::Add,
            ArithPayload { type_desc: int32(), kind: 0 }.pack(),
        );
        s.set(EventIndex::new(8), EventOp::Ret, 7);

        let payloads = Payloads::capture(&s);
        tilc_regalloc::normalize_and_allocate(&mut s);

        let builder = select(&s, &payloads).unwrap();
        let bytes = builder.encode().unwrap();
        assert_eq!(bytes, vec![0x01, 0xD0, 0xC3]);
    }

    #[test]
    fn copy_is_skipped_without_a_move() {
        let mut with_copy = EventStream::with_len(4);
        with_copy.set(EventIndex::new(0), EventOp::ImmediateBytes, 7);
        with_copy.set(EventIndex::new(1), EventOp::LastUse, 0);
        with_copy.set(EventIndex::new(2), EventOp::Copy, 0);
        with_copy.set(EventIndex::new(3), EventOp::Ret, 2);

        let mut without_copy = EventStream::with_len(3);
        without_copy.set(EventIndex::new(0), EventOp::ImmediateBytes, 7);
        without_copy.set(EventIndex::new(1), EventOp::LastUse, 0);
        without_copy.set(EventIndex::new(2), EventOp::Ret, 0);

        let payloads_a = Payloads::capture(&with_copy);
        tilc_regalloc::normalize_and_allocate(&mut with_copy);
        let bytes_a = select(&with_copy, &payloads_a).unwrap().encode().unwrap();

        let payloads_b = Payloads::capture(&without_copy);
        tilc_regalloc::normalize_and_allocate(&mut without_copy);
        let bytes_b = select(&without_copy, &payloads_b).unwrap().encode().unwrap();

        // A `Copy` is alias-merged into its source's key, so it never gets
        // its own register and never emits an instruction: the stream with
        // an intervening copy encodes identically to the one without.
        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn variable_count_shift_is_unsupported() {
        // The shift count must come from a register, not a literal -- an
        // inner `Add` stands in for any register-valued rhs, since it
        // selects cleanly itself and so doesn't trip the forward walk over
        // an unrelated unsupported op before reaching the `Logic3` under
        // test.
        let mut s = EventStream::with_len(10);
        s.set(EventIndex::new(0), EventOp::ImmediateBytes, 5);
        s.set(EventIndex::new(1), EventOp::ImmediateBytes, 1);
        s.set(EventIndex::new(2), EventOp::ImmediateBytes, 1);
        s.set(EventIndex::new(3), EventOp::LastUse, 1);
        s.set(EventIndex::new(4), EventOp::LastUse, 2);
        s.set(
            EventIndex::new(5),
            EventOp::Add,
            ArithPayload { type_desc: int32(), kind: 0 }.pack(),
        );
        s.set(EventIndex::new(6), EventOp::LastUse, 0);
        s.set(EventIndex::new(7), EventOp::LastUse, 5);
        s.set(
            EventIndex::new(8),
            EventOp::Logic3,
            ArithPayload { type_desc: int32(), kind: 0 }.pack(),
        );
        s.set(EventIndex::new(9), EventOp::Ret, 8);

        let payloads = Payloads::capture(&s);
        tilc_regalloc::normalize_and_allocate(&mut s);

        let err = select(&s, &payloads).unwrap_err();
        assert!(matches!(err, BackendError::UnsupportedOp { op: EventOp::Logic3, .. }));
    }
}
