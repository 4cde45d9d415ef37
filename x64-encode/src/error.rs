//! Encoding errors (§7): failures the [`crate::Builder`] surfaces while
//! resolving labels and packing the final byte stream, as distinct from the
//! structural-invariant panics that indicate a caller bug elsewhere in the
//! pipeline.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("label {0} was referenced but never placed")]
    LabelOutOfRange(u32),

    #[error("branch displacement does not fit in 32 bits")]
    DeltaOverflow,

    #[error("encoded binary exceeds the 32-bit size limit")]
    BinaryTooLarge,

    #[error("a label was placed after the last instruction in the stream")]
    TrailingLabel,
}
