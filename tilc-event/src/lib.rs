//! The packed event stream (§3.2): opcode taxonomy, storage, and the
//! live-range iterator (§4.4) that scopes SSA liveness queries over it.

pub mod debug;
pub mod live_range;
pub mod opcode;
pub mod stream;

pub use debug::DebugView;
pub use live_range::LiveRangeIter;
pub use opcode::{ArithPayload, CompareKind, EventOp, ValuePayload};
pub use stream::EventStream;
