//! Pipeline driver (§2): CFG normalization through x86-64 encoding.
//!
//! `compile` is the one entry point this crate exists to provide --
//! everything else (`tilc-cfg`, `tilc-lower`, `tilc-regalloc`,
//! `x64-encode`) is a stage it wires together in the order §2's component
//! table lays out: normalize the CFG, lower TIL to events, allocate
//! registers, select instructions, encode.

pub mod config;
pub mod error;
pub mod select;

pub use config::PipelineConfig;
pub use error::BackendError;

use tracing::{debug, instrument};

use select::Payloads;
use tilc_cfg::Module as CfgModule;
use tilc_lower::TilModule;

/// Runs the full pipeline over one module, producing a raw instruction
/// byte buffer with no object-file framing (§6.2 -- linking is out of
/// scope).
#[instrument(skip_all)]
pub fn compile(til: &TilModule, cfg: &mut CfgModule, config: PipelineConfig) -> Result<Vec<u8>, BackendError> {
    tilc_cfg::normalize(cfg)?;
    debug!("cfg normalized");

    let mut stream = tilc_lower::lower(til, cfg)?;
    debug!(events = stream.len(), "lowering complete");

    let payloads = Payloads::capture(&stream);
    tilc_regalloc::normalize_and_allocate(&mut stream);
    debug!("register allocation complete");

    let builder = select::select(&stream, &payloads)?;
    debug!("instruction selection complete");

    let bytes = if config.relax_jumps {
        builder.encode_relaxed()?
    } else {
        builder.encode()?
    };
    debug!(bytes = bytes.len(), "encoding complete");
    Ok(bytes)
}
