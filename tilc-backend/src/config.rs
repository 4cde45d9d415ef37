/// Tunables for [`crate::compile`], threaded through the whole pipeline.
///
/// None of these are spec features (§1 scopes CLI drivers and their
/// configuration out) -- a driver still needs a handle on them, the same
/// way `fuel-vm`'s `InterpreterParams` carries knobs the VM spec itself
/// never names.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Number of addressable registers in the GPR alias set. The allocator
    /// (`tilc-regalloc`) is fixed at 16 (`AliasSet::Gpr::register_count`);
    /// this field exists so a driver can assert its target matches before
    /// compiling, rather than silently truncating register masks.
    pub gpr_count: u32,
    /// Run the two-phase jump relaxer (§4.7 `EncodeRelaxed`) rather than
    /// the simpler forward-patch encoder. Off only for debugging a
    /// miscompile in isolation from relaxation.
    pub relax_jumps: bool,
    /// Reserved for the §7 "type mismatches ... emit a diagnostic; replace
    /// with `Undefined`; continue" policy. `tilc-lower` currently treats
    /// every structural mismatch as a hard [`tilc_lower::LowerError`]
    /// rather than substituting an `Undefined` placeholder, so this flag
    /// has no effect yet -- see DESIGN.md.
    pub hard_fail_on_type_errors: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            gpr_count: 16,
            relax_jumps: true,
            hard_fail_on_type_errors: true,
        }
    }
}
