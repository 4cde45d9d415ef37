//! Live-range iterator (§4.4): walks backward from a use toward its
//! definition, skipping over sibling case/join scopes encoded by header
//! events in the flat stream.
//!
//! Modeled as the 3-state machine `{scanning, skipping_join_body,
//! skipping_case_ancestor}` described in §9: `next()` yields every event on
//! the walked path (including header events), plus a `not_skipping` flag
//! callers consult before acting on what they found.

use tilc_types::EventIndex;

use crate::opcode::EventOp;
use crate::stream::EventStream;

/// Backward iterator over the open range `(def, use)` of one live range.
pub struct LiveRangeIter<'a> {
    stream: &'a EventStream,
    pos: Option<EventIndex>,
    def: EventIndex,
    skip_until: Option<EventIndex>,
}

impl<'a> LiveRangeIter<'a> {
    /// Starts just before `use_`, per §4.4 ("starting at use-1").
    pub fn new(stream: &'a EventStream, def: EventIndex, use_: EventIndex) -> Self {
        let pos = use_.get().checked_sub(1).map(EventIndex::new);
        LiveRangeIter {
            stream,
            pos,
            def,
            skip_until: None,
        }
    }

    /// `false` while walking inside a sibling join scope (between a
    /// `JoinHeader` and its recorded partner index); `true` otherwise.
    pub fn not_skipping(&self) -> bool {
        self.skip_until.is_none()
    }
}

impl<'a> Iterator for LiveRangeIter<'a> {
    type Item = (EventIndex, EventOp, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.pos?;
        if i.get() <= self.def.get() {
            self.pos = None;
            return None;
        }

        if let Some(k) = self.skip_until {
            if i.get() <= k.get() {
                self.skip_until = None;
            }
        }

        let op = self.stream.op(i);
        let data = self.stream.data(i);
        let step_back = EventIndex::new(i.get().saturating_sub(1));

        match op {
            EventOp::CaseHeader if self.not_skipping() => {
                // Teleport past the dominator-ancestor chain this header
                // guards, instead of walking through it one slot at a time.
                self.pos = Some(EventIndex::new(data));
            }
            EventOp::JoinHeader => {
                self.skip_until = Some(EventIndex::new(data));
                self.pos = Some(step_back);
            }
            _ => {
                self.pos = Some(step_back);
            }
        }

        Some((i, op, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_walks_every_event_between_def_and_use() {
        let mut s = EventStream::with_len(5);
        s.set(EventIndex::new(0), EventOp::Nop, 0);
        s.set(EventIndex::new(1), EventOp::Value, 0);
        s.set(EventIndex::new(2), EventOp::Value, 0);
        s.set(EventIndex::new(3), EventOp::Value, 0);
        s.set(EventIndex::new(4), EventOp::Use, 1);

        let visited: Vec<_> = LiveRangeIter::new(&s, EventIndex::new(1), EventIndex::new(4))
            .map(|(i, _, _)| i.get())
            .collect();
        assert_eq!(visited, vec![3, 2]);
    }

    #[test]
    fn case_header_teleports_past_ancestor_chain() {
        let mut s = EventStream::with_len(6);
        s.set(EventIndex::new(0), EventOp::Nop, 0);
        s.set(EventIndex::new(1), EventOp::Value, 0); // def, ancestor chain target
        s.set(EventIndex::new(2), EventOp::CaseHeader, 1); // dominator's last event = 1
        s.set(EventIndex::new(3), EventOp::Value, 0); // inside the case body
        s.set(EventIndex::new(4), EventOp::Value, 0);
        s.set(EventIndex::new(5), EventOp::Use, 1);

        let visited: Vec<_> = LiveRangeIter::new(&s, EventIndex::new(1), EventIndex::new(5))
            .map(|(i, _, _)| i.get())
            .collect();
        // Walks 4, then 3 (inside the case body -- the teleport only fires
        // on arrival at the header itself, not retroactively over events
        // already walked before it), then hits the header at 2 and
        // teleports to 1, which is the stop boundary.
        assert_eq!(visited, vec![4, 3, 2]);
    }

    #[test]
    fn join_header_marks_sibling_scope_not_skipping() {
        let mut s = EventStream::with_len(6);
        s.set(EventIndex::new(0), EventOp::Nop, 0);
        s.set(EventIndex::new(1), EventOp::Value, 0); // def
        s.set(EventIndex::new(2), EventOp::Value, 0);
        s.set(EventIndex::new(3), EventOp::JoinHeader, 2); // partner index = 2
        s.set(EventIndex::new(4), EventOp::Value, 0); // sibling scope
        s.set(EventIndex::new(5), EventOp::Use, 1);

        let mut iter = LiveRangeIter::new(&s, EventIndex::new(1), EventIndex::new(5));
        let (i0, _, _) = iter.next().unwrap();
        assert_eq!(i0.get(), 4);
        // The sibling-scope event at 4 is walked before the `JoinHeader` at
        // 3 is ever reached, so skip_until hasn't been set yet.
        assert!(iter.not_skipping());

        let (i1, _, _) = iter.next().unwrap();
        assert_eq!(i1.get(), 3);
        // Processing the `JoinHeader` itself sets skip_until = 2; it only
        // clears once the walk reaches that partner index.
        assert!(!iter.not_skipping());
    }
}
