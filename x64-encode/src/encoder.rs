//! The single-instruction byte encoder (Component A, §4.6).
//!
//! `encode` appends bytes for one [`Instr`] to `out` and returns the number
//! of bytes written. It never fails: an `invalid` instruction with no raw
//! data is defined to encode to nothing (§4.6 step 1).

use crate::instr::{CodeMap, Instr, Segment};

/// Appends the encoding of `instr` to `out`, returning the number of bytes
/// written (`out.len()` grows by exactly that much).
pub fn encode(instr: &Instr, out: &mut Vec<u8>) -> usize {
    let start = out.len();

    // Step 1: invalid / raw-data short circuit.
    if instr.invalid {
        if let Some(raw) = instr.raw_data {
            out.extend_from_slice(raw.as_slice());
        }
        return out.len() - start;
    }

    // Step 2: legacy prefixes, in fixed order.
    match instr.segment {
        Segment::Fs => out.push(0x64),
        Segment::Gs => out.push(0x65),
        Segment::Default => {}
    }
    match instr.lock_rep {
        Some(crate::instr::LockRep::Lock) => out.push(0xF0),
        Some(crate::instr::LockRep::RepZ) => out.push(0xF3),
        Some(crate::instr::LockRep::RepNz) => out.push(0xF2),
        None => {}
    }
    if instr.size_override {
        out.push(0x66);
    }
    if instr.addr_override {
        out.push(0x67);
    }

    // Step 3/4: VEX or REX, mutually exclusive.
    if instr.use_vex {
        encode_vex(instr, out);
    } else if instr.use_rex && instr.rex.is_needed() {
        out.push(instr.rex.to_byte());
    }

    // Step 5: opcode map escape bytes (skipped entirely when VEX carries
    // the map selector, since VEX folds the escape into its own bytes).
    if !instr.use_vex {
        match instr.map {
            CodeMap::None => {}
            CodeMap::Map0F => out.push(0x0F),
            CodeMap::Map0F38 => {
                out.push(0x0F);
                out.push(0x38);
            }
            CodeMap::Map0F3A => {
                out.push(0x0F);
                out.push(0x3A);
            }
        }
    }

    // Step 6: opcode byte.
    out.push(instr.opcode);

    // Step 7: ModRM / SIB / displacement.
    if instr.has_modrm {
        let disp_len = instr.disp_len();
        let mode_bits: u8 = if instr.modrm.is_register {
            0b11
        } else {
            match disp_len {
                0 => 0b00,
                1 => 0b01,
                _ => 0b10,
            }
        };
        let modrm_byte = (mode_bits << 6) | ((instr.modrm.reg & 0x7) << 3) | (instr.modrm.rm & 0x7);
        out.push(modrm_byte);

        if !instr.modrm.is_register {
            if instr.has_sib {
                let scale_bits = instr.sib.scale & 0x3;
                let index_bits = instr.sib.index.unwrap_or(0b100) & 0x7;
                let base_bits = instr.sib.base.unwrap_or(0b101) & 0x7;
                out.push((scale_bits << 6) | (index_bits << 3) | base_bits);
            }
            match disp_len {
                0 => {}
                1 => out.push(instr.disp as i8 as u8),
                _ => out.extend_from_slice(&instr.disp.to_le_bytes()),
            }
        }
    }

    // Step 8: immediate.
    match instr.imm_size {
        crate::instr::ImmSize::None => {}
        crate::instr::ImmSize::Imm8 => out.push(instr.imm as i8 as u8),
        crate::instr::ImmSize::Imm16 => out.extend_from_slice(&(instr.imm as i16).to_le_bytes()),
        crate::instr::ImmSize::Imm32 => out.extend_from_slice(&instr.imm.to_le_bytes()),
        crate::instr::ImmSize::Imm64 => {
            out.extend_from_slice(&instr.imm.to_le_bytes());
            out.extend_from_slice(&instr.imm_hi.to_le_bytes());
        }
    }

    out.len() - start
}

fn encode_vex(instr: &Instr, out: &mut Vec<u8>) {
    let vex = instr.vex;
    if instr.vex_is_two_byte() {
        // 2-byte form: C5 [R vvvv L pp]
        let r = if vex.r { 0 } else { 1 }; // VEX fields are stored inverted
        let pp = simd_prefix_bits(vex.simd_prefix);
        let byte = (r << 7) | ((!vex.vvvv & 0xF) << 3) | ((vex.long as u8) << 2) | pp;
        out.push(0xC5);
        out.push(byte);
    } else {
        // 3-byte form: C4 [R X B mmmmm] [W vvvv L pp]
        let r = if vex.r { 0 } else { 1 };
        let x = if vex.x { 0 } else { 1 };
        let b = if vex.b { 0 } else { 1 };
        let mmmmm = match vex.map_select {
            CodeMap::None => 0b00001,
            CodeMap::Map0F => 0b00001,
            CodeMap::Map0F38 => 0b00010,
            CodeMap::Map0F3A => 0b00011,
        };
        let byte2 = (r << 7) | (x << 6) | (b << 5) | mmmmm;
        let w = instr.rex.w as u8;
        let pp = simd_prefix_bits(vex.simd_prefix);
        let byte3 = (w << 7) | ((!vex.vvvv & 0xF) << 3) | ((vex.long as u8) << 2) | pp;
        out.push(0xC4);
        out.push(byte2);
        out.push(byte3);
    }
}

fn simd_prefix_bits(p: crate::instr::SimdPrefix) -> u8 {
    match p {
        crate::instr::SimdPrefix::None => 0b00,
        crate::instr::SimdPrefix::P66 => 0b01,
        crate::instr::SimdPrefix::F3 => 0b10,
        crate::instr::SimdPrefix::F2 => 0b11,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::{ImmSize, ModRm};

    fn reg_reg(opcode: u8, reg: u8, rm: u8) -> Instr {
        Instr {
            invalid: false,
            opcode,
            has_modrm: true,
            modrm: ModRm {
                reg,
                rm,
                is_register: true,
            },
            ..Instr::default()
        }
    }

    #[test]
    fn add_eax_edx() {
        // ADD EAX, EDX => 01 D0
        let instr = reg_reg(0x01, /* reg = src = edx */ 2, /* rm = dst = eax */ 0);
        let mut out = Vec::new();
        encode(&instr, &mut out);
        assert_eq!(out, vec![0x01, 0xD0]);
    }

    #[test]
    fn ret_noop_shape() {
        let instr = Instr {
            invalid: false,
            opcode: 0xC3,
            ..Instr::default()
        };
        let mut out = Vec::new();
        encode(&instr, &mut out);
        assert_eq!(out, vec![0xC3]);
    }

    #[test]
    fn invalid_without_raw_data_emits_nothing() {
        let instr = Instr::default();
        let mut out = Vec::new();
        let n = encode(&instr, &mut out);
        assert_eq!(n, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn invalid_with_raw_data_emits_bytes_verbatim() {
        let instr = Instr {
            invalid: true,
            raw_data: Some(crate::instr::RawData {
                bytes: [0x90, 0x90, 0, 0, 0, 0, 0, 0],
                len: 2,
            }),
            ..Instr::default()
        };
        let mut out = Vec::new();
        encode(&instr, &mut out);
        assert_eq!(out, vec![0x90, 0x90]);
    }

    #[test]
    fn disp8_vs_disp32_boundary() {
        let mut mem = reg_reg(0x03, 0, 5);
        mem.modrm.is_register = false;
        mem.disp = 127;
        let mut out = Vec::new();
        encode(&mem, &mut out);
        assert_eq!(out.len(), 3); // opcode + modrm + 1-byte disp

        let mut mem2 = mem;
        mem2.disp = 128;
        let mut out2 = Vec::new();
        encode(&mem2, &mut out2);
        assert_eq!(out2.len(), 6); // opcode + modrm + 4-byte disp
    }

    #[test]
    fn zero_disp_omitted_unless_forced() {
        let mut mem = reg_reg(0x03, 0, 5);
        mem.modrm.is_register = false;
        mem.disp = 0;
        let mut out = Vec::new();
        encode(&mem, &mut out);
        assert_eq!(out.len(), 2);

        // Forcing a zero displacement still fits in 8 bits, so it is
        // emitted as a single explicit zero byte rather than omitted.
        mem.force_disp = true;
        let mut out2 = Vec::new();
        encode(&mem, &mut out2);
        assert_eq!(out2.len(), 3);
        assert_eq!(out2[2], 0x00);

        // `fixed_base` is the one flag that always forces a full 32-bit
        // displacement field, regardless of the value.
        mem.fixed_base = true;
        let mut out3 = Vec::new();
        encode(&mem, &mut out3);
        assert_eq!(out3.len(), 6);
    }
}
