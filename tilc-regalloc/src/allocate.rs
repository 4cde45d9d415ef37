//! Single-pass linear-scan-style register allocator (§4.5).
//!
//! Runs in five stages over an already-[`crate::normalize::normalize`]d
//! stream: copy linking, key compression, constraint collection, worklist
//! ordering, and final bitmask assignment. Every stage mutates the stream
//! in place; nothing here allocates a side table keyed by event index that
//! outlives the call, mirroring the flat, array-of-arrays shape the rest of
//! this pipeline uses.

use std::cmp::Reverse;

use tilc_event::{EventOp, EventStream, LiveRangeIter};
use tilc_types::{AliasSet, EventIndex, RegisterMask};

/// Runs the full allocator over `stream`, assigning every value-producing
/// event's `data` a [`RegisterMask`] with exactly one bit set (or
/// [`RegisterMask::NONE`] if the alias set ran out of registers for it --
/// §4.5 does not model spilling, so this is a hard capacity limit rather
/// than a recoverable condition the caller can react to).
pub fn allocate(stream: &mut EventStream) {
    link_copies(stream);
    key_compress(stream);
    let (fixed, conflicts, goals) = collect_constraints(stream);
    assign_registers(stream, fixed, conflicts, goals);
}

/// §4.5 step 1: resolves `COPY`/`JOIN_COPY` events against the use
/// immediately preceding them.
///
/// A `COPY` not already preceded by a `MUTED_USE` ties itself to the
/// preceding use's target (so the copy's key chases straight through to
/// the original value) and mutes that use. `COPY` stays a value-producing
/// event afterward -- only the use it rides on is retagged -- since
/// downstream consumers still need to resolve a register for it.
///
/// For a `JOIN_COPY` whose target phi's `data` still points at itself or
/// at an event later than the copy, [`crate::normalize::link_phis`] never
/// found a live incoming value for it; lower the phi's `data` to this
/// copy's own index so key compression has something concrete to chase.
fn link_copies(stream: &mut EventStream) {
    let n = stream.len();
    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        match stream.op(i) {
            EventOp::Copy => {
                if stream.op_before(i, 1) != EventOp::MutedUse {
                    if let Some(prev) = i.get().checked_sub(1) {
                        let prev = EventIndex::new(prev);
                        if stream.op(prev).is_use() {
                            stream.set_data(i, stream.data(prev));
                            stream.set_op(prev, EventOp::MutedUse);
                        }
                    }
                }
            }
            EventOp::JoinCopy => {
                let phi_idx = EventIndex::new(stream.data(i));
                if stream.op(phi_idx) == EventOp::Phi {
                    let phi_data = stream.data(phi_idx);
                    if phi_data == phi_idx.get() || phi_data > i.get() {
                        stream.set_data(phi_idx, i.get());
                    }
                }
            }
            _ => {}
        }
    }
}

/// §4.5 step 2: collapses every `COPY` alias chain down to its canonical
/// key.
///
/// `Copy` is the only opcode whose `data` is genuinely an index chain at
/// this point -- a phi is its own allocatable unit (it may still end up
/// sharing a register with its source through a goal, but is never
/// silently merged into it), and every other value-producing opcode's
/// `data` still holds its packed sub-opcode payload (§4.2), so walking it
/// as an index would chase garbage. [`canonical_key`] returns `i` directly
/// for all of those without dereferencing `data` at all.
fn key_compress(stream: &mut EventStream) {
    let n = stream.len();
    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        if stream.op(i) == EventOp::Copy {
            let key = canonical_key(stream, i);
            stream.set_data(i, key.get());
        }
    }

    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        if !stream.op(i).is_use() {
            continue;
        }
        let target = EventIndex::new(stream.data(i));
        let key = canonical_key(stream, target);
        stream.set_data(i, key.get());
    }
}

/// Resolves `i` to its canonical key. `Copy` chases `data -> data` until it
/// lands on a non-`Copy` event (or loops back on itself, meaning no value
/// was ever linked to it); anything else -- including `Phi` -- is already
/// canonical.
fn canonical_key(stream: &EventStream, i: EventIndex) -> EventIndex {
    if stream.op(i) != EventOp::Copy {
        return i;
    }
    let mut cur = i;
    loop {
        let next = EventIndex::new(stream.data(cur));
        if next == cur || stream.op(next) != EventOp::Copy {
            return next;
        }
        cur = next;
    }
}

/// One register-allocation work item: a self-keyed value event plus the
/// accumulated masks the assignment pass narrows down.
struct Item {
    key: EventIndex,
    alias_set: AliasSet,
    /// Registers a fixed-register hint or a goal-linked partner prefers.
    preferred: RegisterMask,
    /// Registers a clobber, fixed conflict, or conflicting neighbor rules
    /// out.
    invalid: RegisterMask,
}

/// Bit index of a physical register within its alias set (§4.5 step 7's
/// "lowest-set-bit" convention matches the encoder's own register
/// numbering directly, so the allocator's output needs no translation when
/// the backend resolves a mask to a concrete operand).
fn fixed_register_of(op: EventOp) -> Option<u32> {
    match op {
        EventOp::UseEax => Some(0),
        EventOp::UseEdx => Some(2),
        _ => None,
    }
}

/// Derives the alias set a value event's result lives in. `Value`,
/// `DestructiveValue` and `Copy` carry it directly in their payload;
/// everything else is dispatched by opcode, since arithmetic/logic/compare
/// events carry an [`tilc_event::ArithPayload`] with no alias-set field of
/// its own (§4.2's sub-opcode layout has no room for one).
fn alias_set_of(stream: &EventStream, i: EventIndex) -> AliasSet {
    use tilc_event::{ArithPayload, ValuePayload};
    match stream.op(i) {
        EventOp::Value | EventOp::DestructiveValue | EventOp::Copy => {
            ValuePayload::unpack(stream.data(i)).alias_set
        }
        EventOp::Compare => AliasSet::Flags,
        EventOp::Add | EventOp::Sub | EventOp::Mul | EventOp::Div | EventOp::Imod
        | EventOp::Logic | EventOp::Logic3 | EventOp::Neg | EventOp::Shuffle => {
            let payload = ArithPayload::unpack(stream.data(i));
            if payload.type_desc.is_vector() || matches!(payload.type_desc.base_type(), tilc_types::BaseType::Float) {
                AliasSet::Sse
            } else {
                AliasSet::Gpr
            }
        }
        _ => AliasSet::Gpr,
    }
}

/// §4.5 step 3: walks every use's live range collecting the three
/// constraint kinds the allocator needs -- fixed-register pins (from a
/// `UseEax`/`UseEdx` hint riding immediately after the value event),
/// pairwise conflicts (two distinct keys simultaneously live), and goals
/// (a `COPY`/`PHI_COPY` pair that would rather land in the same register so
/// the copy can be elided at encode time).
fn collect_constraints(
    stream: &EventStream,
) -> (Vec<(EventIndex, RegisterMask)>, Vec<(EventIndex, EventIndex)>, Vec<(EventIndex, EventIndex)>) {
    let n = stream.len();
    let mut fixed = Vec::new();
    let mut conflicts = Vec::new();
    let mut goals = Vec::new();

    // Fixed-register hints ride immediately after the value they pin.
    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        if !stream.op(i).is_value() {
            continue;
        }
        let key = canonical_key(stream, i);
        if key != i {
            continue;
        }
        if idx + 1 < n {
            let hint = EventIndex::new((idx + 1) as u32);
            if let Some(bit) = fixed_register_of(stream.op(hint)) {
                fixed.push((key, RegisterMask::single(bit)));
            }
        }
    }

    // Conflicts: for every use, every other value simultaneously live
    // across its live range conflicts with its target.
    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        let op_i = stream.op(i);
        if !op_i.is_use() {
            continue;
        }
        let target_raw = EventIndex::new(stream.data(i));
        let def = canonical_key(stream, target_raw);

        let mut iter = LiveRangeIter::new(stream, def, i);
        while let Some((j, op_j, data_j)) = iter.next() {
            if !iter.not_skipping() {
                continue;
            }
            let other = if op_j.is_value() {
                canonical_key(stream, j)
            } else if op_j.is_use() {
                canonical_key(stream, EventIndex::new(data_j))
            } else {
                continue;
            };
            if other != def {
                push_pair(&mut conflicts, def, other);
            }
        }
    }

    // Goals: a `COPY`/`JOIN_COPY` would rather share a register with the
    // value it links to.
    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        match stream.op(i) {
            EventOp::Copy => {
                let copy_key = canonical_key(stream, i);
                let linked = EventIndex::new(stream.data(i));
                let other_key = canonical_key(stream, linked);
                if copy_key != other_key {
                    push_pair(&mut goals, copy_key, other_key);
                }
            }
            EventOp::JoinCopy => {
                let phi_idx = EventIndex::new(stream.data(i));
                if stream.op(phi_idx) == EventOp::Phi && i.get() > 0 {
                    let prev = EventIndex::new(i.get() - 1);
                    if stream.op(prev).is_use() {
                        let source_raw = EventIndex::new(stream.data(prev));
                        let source_key = canonical_key(stream, source_raw);
                        let phi_key = canonical_key(stream, phi_idx);
                        if phi_key != source_key {
                            push_pair(&mut goals, phi_key, source_key);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    conflicts.sort_unstable();
    conflicts.dedup();
    goals.sort_unstable();
    goals.dedup();
    fixed.sort_unstable_by_key(|(k, _)| k.get());
    fixed.dedup();

    (fixed, conflicts, goals)
}

fn push_pair(pairs: &mut Vec<(EventIndex, EventIndex)>, a: EventIndex, b: EventIndex) {
    if a.get() <= b.get() {
        pairs.push((a, b));
    } else {
        pairs.push((b, a));
    }
}

/// §4.5 steps 4-7: builds the worklist, propagates preferred/invalid masks
/// in worklist order, and assigns each item the lowest-numbered register
/// that survives the fallback chain.
fn assign_registers(
    stream: &mut EventStream,
    fixed: Vec<(EventIndex, RegisterMask)>,
    conflicts: Vec<(EventIndex, EventIndex)>,
    goals: Vec<(EventIndex, EventIndex)>,
) {
    let n = stream.len();

    let mut keys = Vec::new();
    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        if stream.op(i).is_value() && canonical_key(stream, i) == i {
            keys.push(i);
        }
    }
    let index_of = |k: EventIndex, keys: &[EventIndex]| keys.binary_search_by_key(&k.get(), |e| e.get()).ok();

    let mut items: Vec<Item> = keys
        .iter()
        .map(|&k| Item {
            key: k,
            alias_set: alias_set_of(stream, k),
            preferred: RegisterMask::NONE,
            invalid: RegisterMask::NONE,
        })
        .collect();

    for &(k, mask) in &fixed {
        if let Some(pos) = index_of(k, &keys) {
            items[pos].preferred |= mask;
        }
    }

    let mut conflict_adj: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    for &(a, b) in &conflicts {
        if let (Some(pa), Some(pb)) = (index_of(a, &keys), index_of(b, &keys)) {
            conflict_adj[pa].push(pb);
            conflict_adj[pb].push(pa);
        }
    }
    let mut goal_adj: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    for &(a, b) in &goals {
        if let (Some(pa), Some(pb)) = (index_of(a, &keys), index_of(b, &keys)) {
            goal_adj[pa].push(pb);
            goal_adj[pb].push(pa);
        }
    }

    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by_key(|&p| Reverse(conflict_adj[p].len()));

    for &p in &order {
        let own = &items[p];
        let mut preferred = own.preferred;
        for &q in &goal_adj[p] {
            preferred |= items[q].preferred;
        }
        let mut invalid = own.invalid;
        for &q in &conflict_adj[p] {
            invalid |= items[q].invalid;
        }

        let all = RegisterMask::from_bits_truncate((1u32 << items[p].alias_set.register_count()) - 1);
        let unpreferred = all & !preferred;

        let chosen = non_empty(!unpreferred & preferred & !invalid & all)
            .or_else(|| non_empty(preferred & !invalid & all))
            .or_else(|| non_empty(!unpreferred & !invalid & all))
            .or_else(|| non_empty(!invalid & all))
            .unwrap_or(RegisterMask::NONE);

        items[p].preferred = chosen;
        stream.set_data(items[p].key, chosen.bits());

        for &q in &conflict_adj[p] {
            items[q].invalid |= chosen;
        }
        for &q in &goal_adj[p] {
            items[q].preferred |= chosen;
        }
    }
}

fn non_empty(mask: RegisterMask) -> Option<RegisterMask> {
    if mask.is_empty() {
        None
    } else {
        Some(mask.lowest_bit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilc_event::ValuePayload;
    use tilc_types::{BaseType, TypeDescriptor};

    fn gpr_payload() -> u32 {
        ValuePayload {
            alias_set: AliasSet::Gpr,
            type_desc: TypeDescriptor::new(0, 5, BaseType::Signed),
        }
        .pack()
    }

    #[test]
    fn two_conflicting_values_get_different_registers() {
        let mut s = EventStream::with_len(5);
        s.set(EventIndex::new(0), EventOp::Value, gpr_payload());
        s.set(EventIndex::new(1), EventOp::Value, gpr_payload());
        s.set(EventIndex::new(2), EventOp::OnlyUse, 0);
        s.set(EventIndex::new(3), EventOp::OnlyUse, 1);
        s.set(EventIndex::new(4), EventOp::Ret, 1);

        allocate(&mut s);
        let a = s.data(EventIndex::new(0));
        let b = s.data(EventIndex::new(1));
        assert_ne!(a, b);
        assert_eq!(a.count_ones(), 1);
        assert_eq!(b.count_ones(), 1);
    }

    #[test]
    fn fixed_eax_hint_is_honored() {
        let mut s = EventStream::with_len(3);
        s.set(EventIndex::new(0), EventOp::Value, gpr_payload());
        s.set(EventIndex::new(1), EventOp::UseEax, 0);
        s.set(EventIndex::new(2), EventOp::OnlyUse, 0);

        allocate(&mut s);
        assert_eq!(s.data(EventIndex::new(0)), RegisterMask::single(0).bits());
    }

    #[test]
    fn single_unconstrained_value_gets_lowest_register() {
        let mut s = EventStream::with_len(2);
        s.set(EventIndex::new(0), EventOp::Value, gpr_payload());
        s.set(EventIndex::new(1), EventOp::OnlyUse, 0);

        allocate(&mut s);
        assert_eq!(s.data(EventIndex::new(0)), RegisterMask::single(0).bits());
    }
}
