use thiserror::Error;

/// Failures raised anywhere across the pipeline this crate drives (§7).
///
/// The three `#[from]` variants are the structural-invariant failures each
/// upstream crate already defines; this crate adds only the one failure
/// mode specific to instruction selection itself.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Cfg(#[from] tilc_cfg::CfgError),

    #[error(transparent)]
    Lower(#[from] tilc_lower::LowerError),

    #[error(transparent)]
    Encode(#[from] x64_encode::EncodeError),

    /// Instruction selection encountered a value-producing event this
    /// backend's declared opcode coverage doesn't lower (EXPANSION C: SIMD
    /// shuffle selection is an explicit non-goal).
    #[error("no instruction selection rule for {op:?} at event {index}")]
    UnsupportedOp { op: tilc_event::EventOp, index: u32 },

    /// The allocator left a value unassigned (bitmask `NONE`) -- register
    /// pressure exceeded the alias set's width. §4.5 defers the iterative
    /// spill pass that would recover from this to future work (§9); the
    /// core is complete only for pressure within the register file.
    #[error("event {index} has no assigned register (pressure exceeded the register file)")]
    RegisterPressureExceeded { index: u32 },
}
