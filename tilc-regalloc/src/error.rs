use thiserror::Error;

/// Failures raised while normalizing or allocating over an event stream
/// (§4.3, §4.5, §7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegallocError {
    /// A use event's target index does not name any event in the stream.
    #[error("use at {0} targets out-of-range event {1}")]
    TargetOutOfRange(u32, u32),
}
