use thiserror::Error;

/// Failures raised while lowering a [`crate::ir::TilModule`] (§4.2, §7).
///
/// Like [`tilc_cfg::CfgError`], these are all structural mismatches between
/// the TIL IR and its paired, already-normalized CFG module -- a
/// well-formed front end never triggers them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LowerError {
    #[error("TIL module has {til} functions but the CFG module has {cfg}")]
    FunctionCountMismatch { til: usize, cfg: usize },

    #[error("function has {til} blocks but its CFG range spans {cfg}")]
    BlockCountMismatch { til: usize, cfg: usize },

    #[error("operand references instruction {0} before it was lowered")]
    OperandNotYetLowered(usize),
}
