//! Event-stream normalization (§4.3) and the single-pass register allocator
//! (§4.5): the stage between lowering (`tilc-lower`) and instruction
//! encoding (`tilc-backend`). Operates purely on a flat [`EventStream`];
//! it has no notion of blocks or control flow beyond what the live-range
//! iterator already encodes.

pub mod allocate;
pub mod commute;
pub mod error;
pub mod normalize;

pub use allocate::allocate;
pub use commute::commute_destructive_ops;
pub use error::RegallocError;
pub use normalize::{detect_last_uses, link_phis, normalize};

use tilc_event::EventStream;

/// Runs the whole pipeline this crate owns, in the order the individual
/// passes require: use/phi normalization, allocation, then commuting.
pub fn normalize_and_allocate(stream: &mut EventStream) {
    normalize(stream);
    allocate(stream);
    commute_destructive_ops(stream);
}

#[cfg(test)]
mod proptests {
    use quickcheck_macros::quickcheck;
    use tilc_event::{EventOp, EventStream, ValuePayload};
    use tilc_types::{AliasSet, BaseType, EventIndex, TypeDescriptor};

    /// Builds a straight-line chain of `n` independent GPR values, each
    /// used exactly once by a following `LASTUSE`, terminated by a `RET`
    /// on the last value. Every value is simultaneously live with every
    /// other one still awaiting its use, so this is a worst-case conflict
    /// graph (a clique) for a chain of this length.
    fn clique_stream(n: usize) -> EventStream {
        let payload = ValuePayload {
            alias_set: AliasSet::Gpr,
            type_desc: TypeDescriptor::new(0, 5, BaseType::Signed),
        }
        .pack();
        let mut s = EventStream::with_len(2 * n + 1);
        for k in 0..n {
            s.set(EventIndex::new(k as u32), EventOp::Value, payload);
        }
        for k in 0..n {
            s.set(EventIndex::new((n + k) as u32), EventOp::LastUse, k as u32);
        }
        s.set(EventIndex::new((2 * n) as u32), EventOp::Ret, (n - 1) as u32);
        s
    }

    #[test]
    fn clique_of_sixteen_exhausts_every_gpr_register() {
        let mut s = clique_stream(16);
        super::normalize_and_allocate(&mut s);
        let mut seen = std::collections::HashSet::new();
        for k in 0..16 {
            let mask = s.data(EventIndex::new(k as u32));
            assert_eq!(mask.count_ones(), 1, "every clique member gets exactly one register");
            assert!(seen.insert(mask), "clique members must not share a register");
        }
    }

    /// Any two values simultaneously live at some use never end up with
    /// the same assigned register (§8.1's core soundness invariant),
    /// across chains of varying -- including register-file-exceeding --
    /// length.
    #[quickcheck]
    fn no_two_live_values_share_a_register(n: u8) -> bool {
        let n = ((n % 15) + 2) as usize;
        let mut s = clique_stream(n);
        super::normalize_and_allocate(&mut s);
        let mut seen = std::collections::HashSet::new();
        for k in 0..n {
            let mask = s.data(EventIndex::new(k as u32));
            if mask != 0 && !seen.insert(mask) {
                return false;
            }
        }
        true
    }
}
