//! Operand commuting for destructive two-address encoding (§4.3 step 2).
//!
//! Runs after [`crate::allocate::allocate`] rather than alongside the other
//! two normalization passes: it needs to find a `(USE, MUTED_USE)` pair
//! immediately preceding a commutative arithmetic event, and `MUTED_USE` is
//! only produced by copy linking, which is itself part of allocation
//! (§4.5 step 1). Running commute any earlier would have nothing to act
//! on.

use tilc_event::{EventOp, EventStream};
use tilc_types::EventIndex;

/// Swaps a commutative binary event's two operand uses when the second
/// (rhs) one is muted but the first (lhs) one isn't, so the destructively
/// consumed operand lines up with the position the encoder treats as the
/// in-place source (§5, two-operand `op dst, src` forms).
pub fn commute_destructive_ops(stream: &mut EventStream) {
    let n = stream.len();
    for idx in 0..n {
        let i = EventIndex::new(idx as u32);
        if !is_commutative(stream.op(i)) || idx < 2 {
            continue;
        }
        let rhs = EventIndex::new((idx - 1) as u32);
        let lhs = EventIndex::new((idx - 2) as u32);
        if stream.op(rhs) == EventOp::MutedUse && stream.op(lhs) != EventOp::MutedUse {
            swap_events(stream, lhs, rhs);
        }
    }
}

fn is_commutative(op: EventOp) -> bool {
    matches!(op, EventOp::Add | EventOp::Mul | EventOp::Logic | EventOp::Logic3)
}

fn swap_events(stream: &mut EventStream, a: EventIndex, b: EventIndex) {
    let (op_a, data_a) = (stream.op(a), stream.data(a));
    let (op_b, data_b) = (stream.op(b), stream.data(b));
    stream.set(a, op_b, data_b);
    stream.set(b, op_a, data_a);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn muted_rhs_swaps_to_lhs_position() {
        let mut s = EventStream::with_len(3);
        s.set(EventIndex::new(0), EventOp::Use, 10); // lhs, still live afterward
        s.set(EventIndex::new(1), EventOp::MutedUse, 20); // rhs, about to be clobbered
        s.set(EventIndex::new(2), EventOp::Add, 0);

        commute_destructive_ops(&mut s);
        assert_eq!(s.op(EventIndex::new(0)), EventOp::MutedUse);
        assert_eq!(s.data(EventIndex::new(0)), 20);
        assert_eq!(s.op(EventIndex::new(1)), EventOp::Use);
        assert_eq!(s.data(EventIndex::new(1)), 10);
    }

    #[test]
    fn already_muted_lhs_is_left_alone() {
        let mut s = EventStream::with_len(3);
        s.set(EventIndex::new(0), EventOp::MutedUse, 10);
        s.set(EventIndex::new(1), EventOp::Use, 20);
        s.set(EventIndex::new(2), EventOp::Add, 0);

        commute_destructive_ops(&mut s);
        assert_eq!(s.data(EventIndex::new(0)), 10);
        assert_eq!(s.data(EventIndex::new(1)), 20);
    }

    #[test]
    fn non_commutative_op_is_untouched() {
        let mut s = EventStream::with_len(3);
        s.set(EventIndex::new(0), EventOp::Use, 10);
        s.set(EventIndex::new(1), EventOp::MutedUse, 20);
        s.set(EventIndex::new(2), EventOp::Sub, 0);

        commute_destructive_ops(&mut s);
        assert_eq!(s.data(EventIndex::new(0)), 10);
        assert_eq!(s.data(EventIndex::new(1)), 20);
    }
}
