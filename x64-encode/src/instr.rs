//! The `Instr` descriptor (§3.3): a resolved, flat record staging one
//! x86-64 instruction before encoding. Fields are named rather than
//! literally bit-packed into a `u64` -- the wire format the comment
//! describes is what [`crate::encoder::encode`] produces, not this struct
//! -- the same trade the teacher's `Instruction` type makes for its own
//! packed 32-bit wire format.

/// A code-map prefix selecting the two- or three-byte opcode map
/// (§4.6 step 5, §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeMap {
    /// No escape byte.
    #[default]
    None,
    /// `0F` escape.
    Map0F,
    /// `0F 38` escape.
    Map0F38,
    /// `0F 3A` escape.
    Map0F3A,
}

/// Segment override prefix (§6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Segment {
    /// No segment override.
    #[default]
    Default,
    /// `%fs` override (`0x64`).
    Fs,
    /// `%gs` override (`0x65`).
    Gs,
}

/// `lock`/`rep` legacy prefix (§6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRep {
    /// `0xF0`.
    Lock,
    /// `0xF3`.
    RepZ,
    /// `0xF2`.
    RepNz,
}

/// VEX byte-2 SIMD prefix selector, folded into the VEX encoding instead of
/// a literal `0x66`/`0xF2`/`0xF3` legacy prefix byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimdPrefix {
    #[default]
    None,
    P66,
    F3,
    F2,
}

/// REX prefix fields (§6.3). `valid` tracks whether REX must be emitted at
/// all even when every bit is clear (e.g. to access `SPL`/`BPL`/`SIL`/`DIL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rex {
    pub w: bool,
    pub r: bool,
    pub x: bool,
    pub b: bool,
    pub valid: bool,
}

impl Rex {
    pub fn is_needed(self) -> bool {
        self.valid || self.w || self.r || self.x || self.b
    }

    pub fn to_byte(self) -> u8 {
        0x40 | ((self.w as u8) << 3) | ((self.r as u8) << 2) | ((self.x as u8) << 1) | (self.b as u8)
    }
}

/// VEX prefix fields (§3.3, §6.3). Only the fields the encoder needs to
/// decide 2- vs 3-byte form and to emit the bytes are modeled; AVX-512 `EVEX`
/// is out of scope (§1 excludes vector/SIMD instruction selection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vex {
    pub long: bool,
    pub simd_prefix: SimdPrefix,
    pub vvvv: u8,
    /// `E` bit: extended/EVEX-only context bit, reserved by the encoder's
    /// "use 3-byte form" decision; present for bit-field parity with §3.3.
    pub e: bool,
    pub r: bool,
    pub x: bool,
    pub b: bool,
    pub map_select: CodeMap,
}

/// ModRM byte fields, pre-merge with the displacement-size bits that
/// [`crate::encoder::encode`] folds into `mod` at emission time (§4.6 step 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModRm {
    pub reg: u8,
    pub rm: u8,
    /// `true` when this ModRM addresses a register directly (`mod == 3`);
    /// `false` for any memory form, whose `mod` bits are computed later from
    /// the displacement.
    pub is_register: bool,
}

/// SIB byte fields, present only when `ModRm::rm == 0b100` in a memory
/// addressing form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sib {
    pub scale: u8,
    /// `None` encodes "no index register" (`index == 0b100`).
    pub index: Option<u8>,
    /// `None` encodes the base-less absolute/disp32-only form
    /// (`base == 0b101` with `mod == 0`).
    pub base: Option<u8>,
}

/// Size, in bytes, of an immediate operand (§6.3 imm_size ∈ {8,16,32,64}).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImmSize {
    #[default]
    None,
    Imm8,
    Imm16,
    Imm32,
    Imm64,
}

impl ImmSize {
    pub fn byte_len(self) -> usize {
        match self {
            ImmSize::None => 0,
            ImmSize::Imm8 => 1,
            ImmSize::Imm16 => 2,
            ImmSize::Imm32 => 4,
            ImmSize::Imm64 => 8,
        }
    }
}

/// The flat, resolved instruction record passed to [`crate::encoder::encode`].
///
/// `Default` yields the all-zero / "noop, nothing to emit" instruction --
/// the `invalid` bit is unset by default, and an all-default `Instr` simply
/// has no opcode byte either, so callers always go through one of the
/// `Instr::new_*` constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr {
    // -- legacy prefixes --
    pub lock_rep: Option<LockRep>,
    pub segment: Segment,
    pub size_override: bool,
    pub addr_override: bool,

    // -- REX / VEX --
    pub use_rex: bool,
    pub rex: Rex,
    pub use_vex: bool,
    pub vex: Vex,

    // -- opcode --
    pub map: CodeMap,
    pub opcode: u8,
    pub imm_size: ImmSize,

    // -- ModRM / SIB --
    pub has_modrm: bool,
    pub modrm: ModRm,
    pub has_sib: bool,
    pub sib: Sib,

    /// `true` forces a 32-bit displacement field even when the value is
    /// zero or would fit in 8 bits (§4.6 step 7, §4.7 "force_disp").
    pub force_disp: bool,
    /// `true` when the address is `RIP`-relative; the displacement is a
    /// delta to be patched by the Builder once the target's offset is
    /// known (§4.7).
    pub rip_addr: bool,
    /// `true` for addressing forms with no base register (absolute /
    /// `RIP`-relative): always takes a 32-bit displacement regardless of
    /// its value (§4.6 step 7).
    pub fixed_base: bool,

    pub imm: i32,
    pub disp: i32,
    /// High 32 bits of an 8-byte immediate, packed into the same field the
    /// displacement otherwise occupies (§4.6 step 8).
    pub imm_hi: i32,

    /// When set, [`crate::encoder::encode`] either jumps straight to raw
    /// byte emission (`raw_data.is_some()`) or is a complete noop.
    pub invalid: bool,
    pub raw_data: Option<RawData>,
}

/// A short inline run of literal bytes, emitted verbatim when `Instr.invalid`
/// and `Instr.raw_data` are both set (§4.6 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawData {
    pub bytes: [u8; 8],
    pub len: u8,
}

impl RawData {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl Default for Instr {
    fn default() -> Self {
        Instr {
            lock_rep: None,
            segment: Segment::Default,
            size_override: false,
            addr_override: false,
            use_rex: false,
            rex: Rex::default(),
            use_vex: false,
            vex: Vex::default(),
            map: CodeMap::None,
            opcode: 0,
            imm_size: ImmSize::None,
            has_modrm: false,
            modrm: ModRm::default(),
            has_sib: false,
            sib: Sib::default(),
            force_disp: false,
            rip_addr: false,
            fixed_base: false,
            imm: 0,
            disp: 0,
            imm_hi: 0,
            invalid: true,
            raw_data: None,
        }
    }
}

impl Instr {
    /// Total byte count of this instruction, without actually encoding it:
    /// used by the §4.7 relaxer prepass to size the non-jump bulk of the
    /// stream quickly. Jump instructions still go through `encode` because
    /// their size depends on the chosen displacement width.
    pub fn static_len_hint(&self) -> usize {
        if self.invalid {
            return self.raw_data.map(|r| r.len as usize).unwrap_or(0);
        }
        let mut n = 0;
        n += self.segment_byte_len();
        n += self.lock_rep.is_some() as usize;
        n += self.size_override as usize;
        n += self.addr_override as usize;
        if self.use_vex {
            n += if self.vex_is_two_byte() { 2 } else { 3 };
        } else if self.use_rex {
            n += 1;
        }
        n += match self.map {
            CodeMap::None => 0,
            CodeMap::Map0F => 1,
            CodeMap::Map0F38 | CodeMap::Map0F3A => 2,
        };
        n += 1; // opcode byte
        if self.has_modrm {
            n += 1;
            if self.has_sib {
                n += 1;
            }
            if !self.modrm.is_register {
                n += self.disp_len();
            }
        }
        n += self.imm_size.byte_len();
        n
    }

    fn segment_byte_len(&self) -> usize {
        matches!(self.segment, Segment::Fs | Segment::Gs) as usize
    }

    pub fn vex_is_two_byte(&self) -> bool {
        !self.vex.long && !self.vex.x && !self.vex.b && matches!(self.vex.map_select, CodeMap::Map0F)
    }

    /// Displacement length in bytes, per §4.6 step 7.
    pub fn disp_len(&self) -> usize {
        if self.fixed_base {
            4
        } else if self.disp == 0 && !self.force_disp {
            0
        } else if (-128..=127).contains(&self.disp) {
            1
        } else {
            4
        }
    }
}
