//! The front-end-facing TIL IR (§6.1) and the lowering pass (§4.2) that
//! flattens it, paired with an already-normalized [`tilc_cfg::Module`],
//! into a packed event stream.

pub mod error;
pub mod ir;
mod lower;

pub use error::LowerError;
pub use ir::{
    BaseKind, BasicBlock, BinOp, Function, InstrKind, Instruction, Operand, Phi, Terminator,
    TilModule, ValueType,
};
pub use lower::lower;
