//! The instruction builder and jump relaxer (Component B, §4.7).
//!
//! A [`Builder`] accumulates [`Instr`] descriptors plus a table of labels
//! and jump sites, then emits final bytes in one of three modes:
//! [`Builder::encode_no_rip`] (sequential, ignores labels),
//! [`Builder::encode`] (forward-patch, optional backward-only shrink), and
//! [`Builder::encode_relaxed`] (iterative two-phase relaxation).

use crate::encoder;
use crate::error::EncodeError;
use crate::instr::{CodeMap, ImmSize, Instr, ModRm, Rex, Sib};
use crate::operand::{Immediate, Label, Mem, OperandSize, Reg, RmOperand};

/// Accumulates a straight-line sequence of instructions plus label sites.
#[derive(Debug, Default)]
pub struct Builder {
    instrs: Vec<Instr>,
    label_pos: Vec<Option<usize>>,
    jumps: Vec<JumpSite>,
}

#[derive(Debug, Clone, Copy)]
struct JumpSite {
    instr_index: usize,
    target: Label,
    long_opcode: u8,
    long_map: CodeMap,
    relaxable: bool,
}

impl JumpSite {
    fn short_form(&self) -> Option<(u8, CodeMap)> {
        if !self.relaxable {
            return None;
        }
        if self.long_map == CodeMap::Map0F && (0x80..=0x8F).contains(&self.long_opcode) {
            Some((self.long_opcode - 0x10, CodeMap::None))
        } else if self.long_map == CodeMap::None && self.long_opcode == 0xE9 {
            Some((0xEB, CodeMap::None))
        } else {
            None
        }
    }

    fn long_len(&self) -> usize {
        match self.long_map {
            CodeMap::Map0F => 2 + 4, // 0F 8x + rel32
            _ => 1 + 4,              // E9/E8 + rel32
        }
    }

    fn short_len(&self) -> usize {
        2 // short opcode + rel8
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RexExtra {
    r: bool,
    x: bool,
    b: bool,
}

impl RexExtra {
    fn any(self) -> bool {
        self.r || self.x || self.b
    }
}

/// `(modrm, sib, disp, force_disp, fixed_base, rex)`. `force_disp` asks the
/// encoder for an explicit zero disp8 (RBP/R13 base with no displacement,
/// which would otherwise collide with the mod=00/no-disp encoding used to
/// select "no base register" for that rm/base value); `fixed_base` asks for
/// an unconditional disp32 (absolute or RIP-relative forms, §4.6 step 7).
fn build_rm(rm: RmOperand, reg_num: u8) -> (ModRm, Option<Sib>, i32, bool, bool, RexExtra) {
    let rex_r = reg_num >= 8;
    match rm {
        RmOperand::Reg(r) => (
            ModRm {
                reg: reg_num & 0x7,
                rm: r.low3(),
                is_register: true,
            },
            None,
            0,
            false,
            false,
            RexExtra {
                r: rex_r,
                x: false,
                b: r.needs_rex_bit(),
            },
        ),
        RmOperand::Mem(m) => build_rm_mem(m, reg_num, rex_r),
    }
}

fn build_rm_mem(
    m: Mem,
    reg_num: u8,
    rex_r: bool,
) -> (ModRm, Option<Sib>, i32, bool, bool, RexExtra) {
    let reg_field = reg_num & 0x7;

    if m.rip_relative {
        // mod=00, rm=101 is the RIP-relative form; always a full disp32.
        return (
            ModRm {
                reg: reg_field,
                rm: 0b101,
                is_register: false,
            },
            None,
            m.disp,
            false,
            true,
            RexExtra {
                r: rex_r,
                x: false,
                b: false,
            },
        );
    }

    if let Some((index, scale)) = m.index {
        // Any indexed form requires a SIB byte.
        let base_low3 = m.base.map(|b| b.low3());
        let force_disp = matches!(base_low3, Some(0b101)) && m.disp == 0;
        let fixed_base = m.base.is_none();
        return (
            ModRm {
                reg: reg_field,
                rm: 0b100,
                is_register: false,
            },
            Some(Sib {
                scale,
                index: Some(index.low3()),
                base: base_low3,
            }),
            m.disp,
            force_disp,
            fixed_base,
            RexExtra {
                r: rex_r,
                x: index.needs_rex_bit(),
                b: m.base.map(Reg::needs_rex_bit).unwrap_or(false),
            },
        );
    }

    match m.base {
        None => {
            // Absolute, base-less: SIB with base=101, mod=00 (always disp32).
            (
                ModRm {
                    reg: reg_field,
                    rm: 0b100,
                    is_register: false,
                },
                Some(Sib {
                    scale: 0,
                    index: None,
                    base: None,
                }),
                m.disp,
                false,
                true,
                RexExtra {
                    r: rex_r,
                    x: false,
                    b: false,
                },
            )
        }
        Some(base) => {
            let needs_sib = base.low3() == 0b100; // RSP/R12 always need a SIB byte.
            let force_disp = base.low3() == 0b101 && m.disp == 0; // RBP/R13 need an explicit disp8(0).
            (
                ModRm {
                    reg: reg_field,
                    rm: if needs_sib { 0b100 } else { base.low3() },
                    is_register: false,
                },
                if needs_sib {
                    Some(Sib {
                        scale: 0,
                        index: None,
                        base: Some(base.low3()),
                    })
                } else {
                    None
                },
                m.disp,
                force_disp,
                false,
                RexExtra {
                    r: rex_r,
                    x: false,
                    b: base.needs_rex_bit(),
                },
            )
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions accumulated so far.
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Allocates a new, as-yet-unplaced label.
    pub fn new_label(&mut self) -> Label {
        let id = self.label_pos.len() as u32;
        self.label_pos.push(None);
        Label(id)
    }

    /// Marks `label` as referring to the next instruction to be pushed.
    pub fn place_label(&mut self, label: Label) {
        self.label_pos[label.0 as usize] = Some(self.instrs.len());
    }

    fn push(&mut self, instr: Instr) -> &mut Self {
        self.instrs.push(instr);
        self
    }

    pub(crate) fn emit_rm_reg(
        &mut self,
        opcode: u8,
        map: CodeMap,
        size: OperandSize,
        rm: RmOperand,
        reg: Reg,
    ) -> &mut Self {
        let (modrm, sib, disp, force_disp, fixed_base, rex) = build_rm(rm, reg.0);
        let instr = Instr {
            invalid: false,
            opcode,
            map,
            has_modrm: true,
            modrm,
            has_sib: sib.is_some(),
            sib: sib.unwrap_or_default(),
            disp,
            force_disp,
            fixed_base,
            size_override: size.needs_size_override(),
            use_rex: size.needs_rex_w() || rex.any(),
            rex: Rex {
                w: size.needs_rex_w(),
                r: rex.r,
                x: rex.x,
                b: rex.b,
                valid: false,
            },
            ..Instr::default()
        };
        self.push(instr)
    }

    pub(crate) fn emit_rm_imm(
        &mut self,
        opcode: u8,
        map: CodeMap,
        size: OperandSize,
        rm: RmOperand,
        digit: u8,
        imm: Immediate,
    ) -> &mut Self {
        let (modrm, sib, disp, force_disp, fixed_base, rex) = build_rm(rm, digit);
        let (imm_size, imm_val) = match imm {
            Immediate::Imm8(v) => (ImmSize::Imm8, v as i32),
            Immediate::Imm32(v) => (ImmSize::Imm32, v),
        };
        let instr = Instr {
            invalid: false,
            opcode,
            map,
            has_modrm: true,
            modrm,
            has_sib: sib.is_some(),
            sib: sib.unwrap_or_default(),
            disp,
            force_disp,
            fixed_base,
            imm_size,
            imm: imm_val,
            size_override: size.needs_size_override(),
            use_rex: size.needs_rex_w() || rex.any(),
            rex: Rex {
                w: size.needs_rex_w(),
                r: rex.r,
                x: rex.x,
                b: rex.b,
                valid: false,
            },
            ..Instr::default()
        };
        self.push(instr)
    }

    pub(crate) fn emit_rm_unary(
        &mut self,
        opcode: u8,
        map: CodeMap,
        size: OperandSize,
        rm: RmOperand,
        digit: u8,
    ) -> &mut Self {
        let (modrm, sib, disp, force_disp, fixed_base, rex) = build_rm(rm, digit);
        let instr = Instr {
            invalid: false,
            opcode,
            map,
            has_modrm: true,
            modrm,
            has_sib: sib.is_some(),
            sib: sib.unwrap_or_default(),
            disp,
            force_disp,
            fixed_base,
            size_override: size.needs_size_override(),
            use_rex: size.needs_rex_w() || rex.any(),
            rex: Rex {
                w: size.needs_rex_w(),
                r: rex.r,
                x: rex.x,
                b: rex.b,
                valid: false,
            },
            ..Instr::default()
        };
        self.push(instr)
    }

    pub(crate) fn emit_rm_reg_imm(
        &mut self,
        opcode: u8,
        map: CodeMap,
        size: OperandSize,
        rm: RmOperand,
        reg: Reg,
        imm: i8,
    ) -> &mut Self {
        let (modrm, sib, disp, force_disp, fixed_base, rex) = build_rm(rm, reg.0);
        let instr = Instr {
            invalid: false,
            opcode,
            map,
            has_modrm: true,
            modrm,
            has_sib: sib.is_some(),
            sib: sib.unwrap_or_default(),
            disp,
            force_disp,
            fixed_base,
            imm_size: ImmSize::Imm8,
            imm: imm as i32,
            size_override: size.needs_size_override(),
            use_rex: size.needs_rex_w() || rex.any(),
            rex: Rex {
                w: size.needs_rex_w(),
                r: rex.r,
                x: rex.x,
                b: rex.b,
                valid: false,
            },
            ..Instr::default()
        };
        self.push(instr)
    }

    pub(crate) fn emit_jump(&mut self, opcode: u8, map: CodeMap, relaxable: bool, target: Label) -> &mut Self {
        let idx = self.instrs.len();
        self.jumps.push(JumpSite {
            instr_index: idx,
            target,
            long_opcode: opcode,
            long_map: map,
            relaxable,
        });
        self.push(Instr {
            invalid: false,
            opcode,
            map,
            imm_size: ImmSize::Imm32,
            imm: 0,
            ..Instr::default()
        })
    }

    pub(crate) fn emit_plain(&mut self, opcode: u8, map: CodeMap) -> &mut Self {
        self.push(Instr {
            invalid: false,
            opcode,
            map,
            ..Instr::default()
        })
    }

    /// `PUSH r64`: opcode `0x50 + (r & 7)`, REX.B set when `r >= 8`. Folds
    /// the register number into the opcode byte itself, a shape the
    /// declarative table (§6.4) doesn't model (see `opcode_table.rs`).
    pub fn push_reg(&mut self, reg: Reg) -> &mut Self {
        self.push(Instr {
            invalid: false,
            opcode: 0x50 + reg.low3(),
            use_rex: reg.needs_rex_bit(),
            rex: Rex {
                b: reg.needs_rex_bit(),
                ..Rex::default()
            },
            ..Instr::default()
        })
    }

    /// `POP r64`: opcode `0x58 + (r & 7)`.
    pub fn pop_reg(&mut self, reg: Reg) -> &mut Self {
        self.push(Instr {
            invalid: false,
            opcode: 0x58 + reg.low3(),
            use_rex: reg.needs_rex_bit(),
            rex: Rex {
                b: reg.needs_rex_bit(),
                ..Rex::default()
            },
            ..Instr::default()
        })
    }

    /// Sequential encoding: concatenates each instruction's bytes, ignoring
    /// labels entirely (§4.7 "Sequential (EncodeNoRIP)"). Any jump whose
    /// displacement was never patched encodes with a zero immediate.
    pub fn encode_no_rip(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for instr in &self.instrs {
            encoder::encode(instr, &mut out);
        }
        out
    }

    fn static_lengths(&self) -> Vec<usize> {
        let jump_at: std::collections::HashMap<usize, &JumpSite> =
            self.jumps.iter().map(|j| (j.instr_index, j)).collect();
        self.instrs
            .iter()
            .enumerate()
            .map(|(i, instr)| {
                if let Some(j) = jump_at.get(&i) {
                    j.long_len()
                } else {
                    instr.static_len_hint()
                }
            })
            .collect()
    }

    fn offsets_from_lengths(lengths: &[usize]) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(lengths.len() + 1);
        let mut acc = 0usize;
        for &l in lengths {
            offsets.push(acc);
            acc += l;
        }
        offsets.push(acc);
        offsets
    }

    fn check_trailing_label(&self) -> Result<(), EncodeError> {
        if self
            .label_pos
            .iter()
            .any(|p| *p == Some(self.instrs.len()))
        {
            return Err(EncodeError::TrailingLabel);
        }
        Ok(())
    }

    fn label_position(&self, label: Label) -> Result<usize, EncodeError> {
        self.label_pos
            .get(label.0 as usize)
            .copied()
            .flatten()
            .ok_or(EncodeError::LabelOutOfRange(label.0))
    }

    /// Forward-patch encoding: all jumps start in 32-bit form; backward
    /// jumps are then shrunk to 8-bit in place if they fit (§4.7
    /// "Forward-patch (Encode)").
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        self.check_trailing_label()?;

        let lengths = self.static_lengths();
        let offsets = Self::offsets_from_lengths(&lengths);

        let mut patched = self.instrs.clone();
        for j in &self.jumps {
            let target = self.label_position(j.target)?;
            let end = offsets[j.instr_index] + j.long_len();
            let delta = target as i64 - end as i64;
            let delta = i32::try_from(delta).map_err(|_| EncodeError::DeltaOverflow)?;
            patched[j.instr_index].imm = delta;

            if target < offsets[j.instr_index] {
                // Backward jump: see whether shrinking to the short form
                // still reaches (the target's offset is unaffected, since
                // it lies entirely before this instruction).
                if let Some((short_opcode, short_map)) = j.short_form() {
                    let short_end = offsets[j.instr_index] + j.short_len();
                    let short_delta = target as i64 - short_end as i64;
                    if (-128..=127).contains(&short_delta) {
                        patched[j.instr_index].opcode = short_opcode;
                        patched[j.instr_index].map = short_map;
                        patched[j.instr_index].imm_size = ImmSize::Imm8;
                        patched[j.instr_index].imm = short_delta as i32;
                    }
                }
            }
        }

        let mut out = Vec::new();
        for instr in &patched {
            encoder::encode(instr, &mut out);
        }
        if out.len() as u64 >= u32::MAX as u64 {
            return Err(EncodeError::BinaryTooLarge);
        }
        Ok(out)
    }

    /// Iterative two-phase relaxed encoding (§4.7 "Relaxed (EncodeRelaxed)").
    /// Converges to the shortest encoding reachable by shrinking
    /// conditional/unconditional jumps from 32-bit to 8-bit displacements.
    #[tracing::instrument(level = "debug", skip(self), fields(instrs = self.instrs.len(), jumps = self.jumps.len()))]
    pub fn encode_relaxed(&self) -> Result<Vec<u8>, EncodeError> {
        self.check_trailing_label()?;

        #[derive(Clone, Copy, PartialEq, Eq, Debug)]
        enum Kind {
            Candidate,
            OneByte,
            FourByte,
        }

        let mut kind = vec![Kind::Candidate; self.jumps.len()];
        for (i, j) in self.jumps.iter().enumerate() {
            if !j.relaxable {
                kind[i] = Kind::FourByte;
            }
        }

        let targets = self
            .jumps
            .iter()
            .map(|j| self.label_position(j.target))
            .collect::<Result<Vec<_>, _>>()?;

        let jump_index_by_instr: std::collections::HashMap<usize, usize> = self
            .jumps
            .iter()
            .enumerate()
            .map(|(ji, j)| (j.instr_index, ji))
            .collect();

        let cur_len = |ji: usize, k: &[Kind]| -> usize {
            match k[ji] {
                Kind::OneByte => self.jumps[ji].short_len(),
                _ => self.jumps[ji].long_len(),
            }
        };

        let mut prev_total = usize::MAX;
        const MAX_PASSES: usize = 32;
        for pass in 0..MAX_PASSES {
            let lengths: Vec<usize> = self
                .instrs
                .iter()
                .enumerate()
                .map(|(i, instr)| match jump_index_by_instr.get(&i) {
                    Some(&ji) => cur_len(ji, &kind),
                    None => instr.static_len_hint(),
                })
                .collect();
            let offsets = Self::offsets_from_lengths(&lengths);
            let total: usize = lengths.iter().sum();

            for (ji, j) in self.jumps.iter().enumerate() {
                if kind[ji] == Kind::FourByte {
                    continue;
                }
                let target = targets[ji];
                let backward = target <= j.instr_index;
                let short_end = offsets[j.instr_index] + j.short_len();
                let dist = if backward {
                    short_end as i64 - offsets[target] as i64
                } else {
                    offsets[target] as i64 - short_end as i64
                };
                kind[ji] = if (-128..=127).contains(&dist) {
                    Kind::OneByte
                } else {
                    Kind::Candidate
                };
            }

            if total == prev_total {
                tracing::debug!(pass, total, "relaxation converged");
                break;
            }
            prev_total = total;
            if pass == MAX_PASSES - 1 {
                // Safety backstop: anything still open after this many
                // passes is declared non-relaxable rather than looping
                // forever. The spec expects 2-3 passes in practice.
                for k in kind.iter_mut() {
                    if *k == Kind::Candidate {
                        *k = Kind::FourByte;
                    }
                }
            }
        }

        // Final pass: compute definitive offsets and patch instructions.
        let lengths: Vec<usize> = self
            .instrs
            .iter()
            .enumerate()
            .map(|(i, instr)| match jump_index_by_instr.get(&i) {
                Some(&ji) => cur_len(ji, &kind),
                None => instr.static_len_hint(),
            })
            .collect();
        let offsets = Self::offsets_from_lengths(&lengths);

        let mut patched = self.instrs.clone();
        for (ji, j) in self.jumps.iter().enumerate() {
            let target = targets[ji];
            match kind[ji] {
                Kind::OneByte => {
                    let (short_opcode, short_map) = j.short_form().expect("OneByte implies relaxable");
                    let end = offsets[j.instr_index] + j.short_len();
                    let delta = target as i64 - end as i64;
                    let delta = i32::try_from(delta).map_err(|_| EncodeError::DeltaOverflow)?;
                    patched[j.instr_index].opcode = short_opcode;
                    patched[j.instr_index].map = short_map;
                    patched[j.instr_index].imm_size = ImmSize::Imm8;
                    patched[j.instr_index].imm = delta;
                }
                Kind::FourByte | Kind::Candidate => {
                    let end = offsets[j.instr_index] + j.long_len();
                    let delta = target as i64 - end as i64;
                    let delta = i32::try_from(delta).map_err(|_| EncodeError::DeltaOverflow)?;
                    patched[j.instr_index].imm = delta;
                }
            }
        }

        let mut out = Vec::new();
        for instr in &patched {
            encoder::encode(instr, &mut out);
        }
        if out.len() as u64 >= u32::MAX as u64 {
            return Err(EncodeError::BinaryTooLarge);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::{RAX, RDX};
    use rstest::rstest;

    #[test]
    fn single_add_then_ret() {
        let mut b = Builder::new();
        b.add_mr(RAX.into(), RDX, OperandSize::Size32);
        b.ret();
        let bytes = b.encode_no_rip();
        assert_eq!(bytes, vec![0x01, 0xD0, 0xC3]);
    }

    /// Table-driven over all 16 `Jcc` conditions: a forward conditional
    /// jump never gets shrunk by plain `encode` (only backward jumps are
    /// shrink-candidates there), so each case deterministically lands in
    /// the long `0F 8x` form with the condition's own second byte.
    #[rstest]
    #[case(Builder::jcc_o, 0x80)]
    #[case(Builder::jcc_no, 0x81)]
    #[case(Builder::jcc_b, 0x82)]
    #[case(Builder::jcc_ae, 0x83)]
    #[case(Builder::jcc_e, 0x84)]
    #[case(Builder::jcc_ne, 0x85)]
    #[case(Builder::jcc_be, 0x86)]
    #[case(Builder::jcc_a, 0x87)]
    #[case(Builder::jcc_s, 0x88)]
    #[case(Builder::jcc_ns, 0x89)]
    #[case(Builder::jcc_p, 0x8A)]
    #[case(Builder::jcc_np, 0x8B)]
    #[case(Builder::jcc_l, 0x8C)]
    #[case(Builder::jcc_ge, 0x8D)]
    #[case(Builder::jcc_le, 0x8E)]
    #[case(Builder::jcc_g, 0x8F)]
    fn jcc_condition_encodes_its_own_0f_8x_opcode(
        #[case] jcc: fn(&mut Builder, Label) -> &mut Builder,
        #[case] expected_second_byte: u8,
    ) {
        let mut b = Builder::new();
        let target = b.new_label();
        jcc(&mut b, target);
        b.place_label(target);
        b.ret();

        let bytes = b.encode().unwrap();
        assert_eq!(&bytes[..2], &[0x0F, expected_second_byte]);
    }

    /// Table-driven over the three destructive `RmReg, Imm8` shift rows:
    /// each should pick its own opcode-extension digit while sharing the
    /// `0xC1` base opcode and ModRM/REX shape.
    #[rstest]
    #[case(Builder::shl, 4)]
    #[case(Builder::shr, 5)]
    #[case(Builder::sar, 7)]
    fn shift_variant_uses_its_own_modrm_digit(
        #[case] shift: fn(&mut Builder, RmOperand, i8, OperandSize) -> &mut Builder,
        #[case] expected_digit: u8,
    ) {
        let mut b = Builder::new();
        shift(&mut b, RAX.into(), 3, OperandSize::Size32);
        b.ret();
        let bytes = b.encode_no_rip();
        // `0xC1 /digit`: ModRM's reg field (bits 5-3) carries the digit,
        // mod=11 and rm=RAX(0) leave the other bits zero.
        assert_eq!(bytes[0], 0xC1);
        assert_eq!(bytes[1], 0xC0 | (expected_digit << 3));
    }

    #[test]
    fn short_forward_branch_relaxes() {
        let mut b = Builder::new();
        b.cmp_mi(RAX.into(), 0, OperandSize::Size32);
        let else_label = b.new_label();
        b.jcc_e(else_label);
        b.mov_mi(RAX.into(), 1, OperandSize::Size32);
        b.ret();
        b.place_label(else_label);
        b.mov_mi(RAX.into(), 2, OperandSize::Size32);
        b.ret();

        let bytes = b.encode_relaxed().unwrap();
        // JE should have relaxed to the 2-byte short form (0x74 rel8).
        assert!(bytes.windows(2).any(|w| w[0] == 0x74));
        assert!(!bytes.iter().any(|&b| b == 0x0F));
    }

    #[test]
    fn relaxed_is_never_longer_than_unrelaxed() {
        let mut b = Builder::new();
        let top = b.new_label();
        b.place_label(top);
        b.cmp_mi(RAX.into(), 0, OperandSize::Size32);
        b.jcc_ne(top);
        b.ret();

        let relaxed = b.encode_relaxed().unwrap();
        let unrelaxed = b.encode().unwrap();
        assert!(relaxed.len() <= unrelaxed.len());
    }

    #[test]
    fn backward_jump_minus_130_is_fourbyte_minus_120_is_onebyte() {
        // Build a backward conditional jump whose relative distance from
        // the jump's end is controlled precisely via filler NOPs.
        fn build(padding_bytes: usize) -> Vec<u8> {
            let mut b = Builder::new();
            let top = b.new_label();
            b.place_label(top);
            for _ in 0..padding_bytes {
                b.emit_plain(0x90, CodeMap::None); // 1-byte NOP filler
            }
            b.jcc_ne(top);
            b.encode_relaxed().unwrap()
        }

        // distance = padding + short_len(2); want -130 and -120 exactly.
        let far = build(128); // -130
        let near = build(118); // -120
        assert!(far.iter().any(|&b| b == 0x0F)); // still long form
        assert!(!near.iter().any(|&b| b == 0x0F)); // shrunk to short form
    }

    #[test]
    fn out_of_range_label_errors() {
        let mut b = Builder::new();
        let bogus = Label(99);
        b.jmp(bogus);
        assert!(matches!(b.encode(), Err(EncodeError::LabelOutOfRange(99))));
    }

    #[test]
    fn trailing_label_errors() {
        let mut b = Builder::new();
        b.ret();
        let tail = b.new_label();
        b.place_label(tail);
        assert!(matches!(b.encode(), Err(EncodeError::TrailingLabel)));
    }
}
