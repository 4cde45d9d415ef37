//! Event-stream normalization (§4.3): last-use resolution and phi
//! elimination. Commute (§4.3 step 2) runs later, from [`crate::commute`],
//! once register allocation has produced the `MUTED_USE` pairs it needs --
//! see that module's doc comment.

use tilc_event::{EventOp, EventStream, LiveRangeIter};
use tilc_types::EventIndex;

/// Resolves every `LASTUSE` event lowering emitted optimistically at each
/// use site into either `USE` (another live use of the same target exists
/// on a reachable path) or `ONLYUSE` (this is the target's sole live use,
/// so the allocator may consume it destructively).
///
/// A sibling use sitting inside a mutually-exclusive `JoinHeader`-guarded
/// scope does not count as "another live use": [`LiveRangeIter::not_skipping`]
/// is false for exactly that span, so each side of a branch can
/// independently be its target's only use.
pub fn detect_last_uses(stream: &mut EventStream) {
    let n = stream.len();
    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        if stream.op(i) != EventOp::LastUse {
            continue;
        }
        let target = stream.data(i);
        let def = EventIndex::new(target);

        let mut found_live_sibling = false;
        let mut iter = LiveRangeIter::new(stream, def, i);
        while let Some((j, op_j, data_j)) = iter.next() {
            if iter.not_skipping() && op_j.is_use() && data_j == target {
                found_live_sibling = true;
                if op_j != EventOp::Use {
                    stream.set_op(j, EventOp::Use);
                }
            }
        }

        stream.set_op(i, if found_live_sibling { EventOp::Use } else { EventOp::OnlyUse });
    }
}

/// Aggregates every `JOINCOPY` feeding a phi into that phi's `data` (the
/// earliest-in-stream incoming value), then collapses chains of phis that
/// feed one another down to their shared non-phi source.
///
/// A `JOINCOPY`'s own `data` names the target phi, not the incoming value
/// -- lowering emits the value as a `LASTUSE` immediately before it, so the
/// incoming value's index is read from that preceding event.
///
/// Does not reuse [`EventStream::key_of`]: that helper blindly follows
/// `data -> data` for any event, but a non-phi value event's `data` is
/// still its packed sub-opcode payload at this stage, not an index chain.
pub fn link_phis(stream: &mut EventStream) {
    let n = stream.len();
    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        if stream.op(i) != EventOp::JoinCopy {
            continue;
        }
        let phi_idx = EventIndex::new(stream.data(i));
        if stream.op(phi_idx) != EventOp::Phi {
            continue;
        }
        let incoming = stream.op_before(i, 1);
        if !incoming.is_use() {
            continue;
        }
        let source = stream.data(EventIndex::new(i.get() - 1));
        let current = stream.data(phi_idx);
        if current == 0 || source < current {
            stream.set_data(phi_idx, source);
        }
    }
    collapse_phi_chains(stream);
}

fn collapse_phi_chains(stream: &mut EventStream) {
    let n = stream.len();
    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        if stream.op(i) != EventOp::Phi {
            continue;
        }
        let mut cur = i;
        let terminal = loop {
            let next = EventIndex::new(stream.data(cur));
            if next == cur || stream.op(next) != EventOp::Phi {
                break next;
            }
            cur = next;
        };
        if terminal != i {
            stream.set_data(i, terminal.get());
        }
    }
}

/// Runs both passes in the order the allocator expects them: last-use
/// resolution first (copy linking in §4.5 step 1 looks for `MUTED_USE`
/// immediately preceding a `COPY`, which only makes sense once uses are
/// resolved), then phi elimination.
pub fn normalize(stream: &mut EventStream) {
    detect_last_uses(stream);
    link_phis(stream);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sole_use_becomes_only_use() {
        let mut s = EventStream::with_len(3);
        s.set(EventIndex::new(0), EventOp::Value, 0);
        s.set(EventIndex::new(1), EventOp::LastUse, 0);
        s.set(EventIndex::new(2), EventOp::Ret, 1);

        detect_last_uses(&mut s);
        assert_eq!(s.op(EventIndex::new(1)), EventOp::OnlyUse);
    }

    #[test]
    fn two_sequential_uses_both_demote_to_use() {
        let mut s = EventStream::with_len(4);
        s.set(EventIndex::new(0), EventOp::Value, 0);
        s.set(EventIndex::new(1), EventOp::LastUse, 0);
        s.set(EventIndex::new(2), EventOp::LastUse, 0);
        s.set(EventIndex::new(3), EventOp::Ret, 2);

        detect_last_uses(&mut s);
        assert_eq!(s.op(EventIndex::new(1)), EventOp::Use);
        assert_eq!(s.op(EventIndex::new(2)), EventOp::Use);
    }

    #[test]
    fn use_separated_by_unrelated_case_header_is_still_seen_as_live() {
        // The CaseHeader here teleports straight past event 2 without ever
        // reaching the earlier use, so it has no bearing on this walk --
        // confirms the two uses are still both found live across it.
        let mut s = EventStream::with_len(5);
        s.set(EventIndex::new(0), EventOp::Value, 0); // def
        s.set(EventIndex::new(1), EventOp::LastUse, 0);
        s.set(EventIndex::new(2), EventOp::CaseHeader, 1);
        s.set(EventIndex::new(3), EventOp::LastUse, 0);
        s.set(EventIndex::new(4), EventOp::Ret, 3);

        detect_last_uses(&mut s);
        assert_eq!(s.op(EventIndex::new(1)), EventOp::Use);
        assert_eq!(s.op(EventIndex::new(3)), EventOp::Use);
    }

    #[test]
    fn join_copies_aggregate_earliest_incoming_value_into_phi_data() {
        let mut s = EventStream::with_len(7);
        s.set(EventIndex::new(0), EventOp::Nop, 0);
        s.set(EventIndex::new(1), EventOp::Phi, 0);
        s.set(EventIndex::new(2), EventOp::Value, 0); // first incoming value
        s.set(EventIndex::new(3), EventOp::LastUse, 2);
        s.set(EventIndex::new(4), EventOp::JoinCopy, 1);
        s.set(EventIndex::new(5), EventOp::LastUse, 2);
        s.set(EventIndex::new(6), EventOp::JoinCopy, 1);

        link_phis(&mut s);
        assert_eq!(s.data(EventIndex::new(1)), 2);
    }

    #[test]
    fn chained_phis_collapse_to_shared_non_phi_source() {
        let mut s = EventStream::with_len(7);
        s.set(EventIndex::new(0), EventOp::Value, 0); // ultimate source
        s.set(EventIndex::new(1), EventOp::Phi, 0);
        s.set(EventIndex::new(2), EventOp::LastUse, 0);
        s.set(EventIndex::new(3), EventOp::JoinCopy, 1); // phi 1 <- value 0
        s.set(EventIndex::new(4), EventOp::Phi, 0);
        s.set(EventIndex::new(5), EventOp::LastUse, 1);
        s.set(EventIndex::new(6), EventOp::JoinCopy, 4); // phi 4 <- phi 1

        link_phis(&mut s);
        assert_eq!(s.data(EventIndex::new(1)), 0);
        assert_eq!(s.data(EventIndex::new(4)), 0);
    }
}
