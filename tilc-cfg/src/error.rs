use thiserror::Error;

/// Failures raised while normalizing a [`crate::Module`] (§4.1, §7).
///
/// These are all structural-invariant violations in the front end's CFG
/// construction, not user-facing diagnostics -- a well-formed module never
/// triggers them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CfgError {
    /// A block was never reached by the forward or backward block-ordering
    /// walk, meaning the CFG contains a block unreachable from its
    /// function's entry (forward pass) or exit (backward pass).
    #[error("block {0} is unreachable from its function's entry/exit")]
    UnreachableBlock(u32),

    /// A function's declared block range is empty.
    #[error("function has no blocks")]
    EmptyFunction,
}
