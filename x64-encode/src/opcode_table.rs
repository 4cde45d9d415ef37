//! The declarative opcode table (§6.4): the single call site of
//! `x64_opcodes!`. Each row names a mnemonic/operand-shape variant; the
//! macro expands this into the `OPCODE_TABLE` static below and a matching
//! `Builder` method per row (see `x64-encode-derive`).
//!
//! Coverage is the documented subset named in SPEC_FULL.md EXPANSION C:
//! enough to lower every TIL construct in §4.2 end to end. `PUSH`/`POP`
//! are hand-written in `builder.rs` instead of tabulated here, because
//! their encoding folds the register number into the opcode byte itself
//! (`0x50+r`/`0x58+r`) rather than through ModRM -- a shape this table's
//! row grammar doesn't model and isn't worth contorting for two mnemonics.

use x64_encode_derive::x64_opcodes;

/// One row of the opcode table, as consulted by tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeSpec {
    pub mnemonic: &'static str,
    pub method: &'static str,
    pub opcode: u8,
    pub map: crate::CodeMap,
    pub digit: Option<u8>,
    pub sizes: &'static [u32],
    pub relaxable: bool,
}

x64_opcodes! {
    "Add r/m to register, storing into r/m."
    0x01 None ADD add_mr [RmReg, Reg] sizes[16,32,64]
    "Add r/m to register, storing into register."
    0x03 None ADD add_rm [Reg, RmReg] sizes[16,32,64]
    "Add immediate to r/m (opcode extension /0)."
    0x81 None ADD add_mi [RmReg, Imm32] sizes[16,32,64] digit[0]

    "Subtract register from r/m, storing into r/m."
    0x29 None SUB sub_mr [RmReg, Reg] sizes[16,32,64]
    "Subtract r/m from register, storing into register."
    0x2B None SUB sub_rm [Reg, RmReg] sizes[16,32,64]
    "Subtract immediate from r/m (opcode extension /5)."
    0x81 None SUB sub_mi [RmReg, Imm32] sizes[16,32,64] digit[5]

    "Bitwise AND r/m with register, storing into r/m."
    0x21 None AND and_mr [RmReg, Reg] sizes[16,32,64]
    "Bitwise AND register with r/m, storing into register."
    0x23 None AND and_rm [Reg, RmReg] sizes[16,32,64]
    "Bitwise AND r/m with immediate (opcode extension /4)."
    0x81 None AND and_mi [RmReg, Imm32] sizes[16,32,64] digit[4]

    "Bitwise OR r/m with register, storing into r/m."
    0x09 None OR or_mr [RmReg, Reg] sizes[16,32,64]
    "Bitwise OR register with r/m, storing into register."
    0x0B None OR or_rm [Reg, RmReg] sizes[16,32,64]
    "Bitwise OR r/m with immediate (opcode extension /1)."
    0x81 None OR or_mi [RmReg, Imm32] sizes[16,32,64] digit[1]

    "Bitwise XOR r/m with register, storing into r/m."
    0x31 None XOR xor_mr [RmReg, Reg] sizes[16,32,64]
    "Bitwise XOR register with r/m, storing into register."
    0x33 None XOR xor_rm [Reg, RmReg] sizes[16,32,64]
    "Bitwise XOR r/m with immediate (opcode extension /6)."
    0x81 None XOR xor_mi [RmReg, Imm32] sizes[16,32,64] digit[6]

    "Compare register against r/m (flags only)."
    0x3B None CMP cmp_rm [Reg, RmReg] sizes[16,32,64]
    "Compare r/m against immediate (opcode extension /7)."
    0x81 None CMP cmp_mi [RmReg, Imm32] sizes[16,32,64] digit[7]

    "Logical compare (AND, flags only) of r/m against register."
    0x85 None TEST test_mr [RmReg, Reg] sizes[16,32,64]
    "Logical compare (AND, flags only) of r/m against immediate (opcode extension /0)."
    0xF7 None TEST test_mi [RmReg, Imm32] sizes[16,32,64] digit[0]

    "Two's-complement negate (opcode extension /3)."
    0xF7 None NEG neg [RmOnly] sizes[16,32,64] digit[3]
    "Bitwise complement (opcode extension /2)."
    0xF7 None NOT not [RmOnly] sizes[16,32,64] digit[2]

    "Load effective address."
    0x8D None LEA lea [Reg, RmReg] sizes[16,32,64]

    "Move register/memory into register."
    0x8B None MOV mov_rm [Reg, RmReg] sizes[16,32,64]
    "Move register into register/memory."
    0x89 None MOV mov_mr [RmReg, Reg] sizes[16,32,64]
    "Move immediate into register/memory (opcode extension /0)."
    0xC7 None MOV mov_mi [RmReg, Imm32] sizes[16,32,64] digit[0]

    "Signed multiply: reg *= r/m (two-operand form)."
    0xAF Map0F IMUL imul_rm [Reg, RmReg] sizes[16,32,64]
    "Signed multiply: reg = r/m * imm8 (three-operand form)."
    0x6B None IMUL imul_rmi [Reg, RmReg, Imm8] sizes[16,32,64]
    "Signed multiply, one-operand form: RDX:RAX = RAX * r/m (opcode extension /5)."
    0xF7 None IMUL imul1 [RmOnly] sizes[16,32,64] digit[5]
    "Unsigned multiply, one-operand form: RDX:RAX = RAX * r/m (opcode extension /4)."
    0xF7 None MUL mul1 [RmOnly] sizes[16,32,64] digit[4]
    "Unsigned divide RDX:RAX by r/m (opcode extension /6)."
    0xF7 None DIV div [RmOnly] sizes[16,32,64] digit[6]
    "Signed divide RDX:RAX by r/m (opcode extension /7)."
    0xF7 None IDIV idiv [RmOnly] sizes[16,32,64] digit[7]

    "Shift left (opcode extension /4), shift count as imm8."
    0xC1 None SHL shl [RmReg, Imm8] sizes[16,32,64] digit[4]
    "Logical shift right (opcode extension /5), shift count as imm8."
    0xC1 None SHR shr [RmReg, Imm8] sizes[16,32,64] digit[5]
    "Arithmetic shift right (opcode extension /7), shift count as imm8."
    0xC1 None SAR sar [RmReg, Imm8] sizes[16,32,64] digit[7]

    "Unconditional jump, relative displacement."
    0xE9 None JMP jmp [Rel] sizes[32]
    "Call, relative displacement. Never relaxed: a call site's length must
    not depend on final layout the way a branch's does."
    0xE8 None CALL call [Rel] sizes[32] norelax

    "Jump if overflow (OF=1)."
    0x80 Map0F JCC jcc_o [Rel] sizes[32]
    "Jump if not overflow (OF=0)."
    0x81 Map0F JCC jcc_no [Rel] sizes[32]
    "Jump if below / carry (CF=1)."
    0x82 Map0F JCC jcc_b [Rel] sizes[32]
    "Jump if above-or-equal / not carry (CF=0)."
    0x83 Map0F JCC jcc_ae [Rel] sizes[32]
    "Jump if equal / zero (ZF=1)."
    0x84 Map0F JCC jcc_e [Rel] sizes[32]
    "Jump if not-equal / not-zero (ZF=0)."
    0x85 Map0F JCC jcc_ne [Rel] sizes[32]
    "Jump if below-or-equal (CF=1 or ZF=1)."
    0x86 Map0F JCC jcc_be [Rel] sizes[32]
    "Jump if above (CF=0 and ZF=0)."
    0x87 Map0F JCC jcc_a [Rel] sizes[32]
    "Jump if sign (SF=1)."
    0x88 Map0F JCC jcc_s [Rel] sizes[32]
    "Jump if not sign (SF=0)."
    0x89 Map0F JCC jcc_ns [Rel] sizes[32]
    "Jump if parity / parity even (PF=1)."
    0x8A Map0F JCC jcc_p [Rel] sizes[32]
    "Jump if not parity / parity odd (PF=0)."
    0x8B Map0F JCC jcc_np [Rel] sizes[32]
    "Jump if less (signed, SF != OF)."
    0x8C Map0F JCC jcc_l [Rel] sizes[32]
    "Jump if greater-or-equal (signed, SF == OF)."
    0x8D Map0F JCC jcc_ge [Rel] sizes[32]
    "Jump if less-or-equal (signed, ZF=1 or SF != OF)."
    0x8E Map0F JCC jcc_le [Rel] sizes[32]
    "Jump if greater (signed, ZF=0 and SF == OF)."
    0x8F Map0F JCC jcc_g [Rel] sizes[32]

    "Return from the current function."
    0xC3 None RET ret [] sizes[64]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_expected_row_count() {
        // One row per builder method declared above.
        assert_eq!(OPCODE_TABLE.len(), 53);
    }

    #[test]
    fn jcc_opcodes_are_contiguous_0f_8x() {
        let jccs: Vec<_> = OPCODE_TABLE
            .iter()
            .filter(|r| r.mnemonic == "JCC")
            .collect();
        assert_eq!(jccs.len(), 16);
        for (i, row) in jccs.iter().enumerate() {
            assert_eq!(row.opcode, 0x80 + i as u8);
            assert_eq!(row.map, crate::CodeMap::Map0F);
        }
    }

    #[test]
    fn call_is_not_relaxable() {
        let call = OPCODE_TABLE.iter().find(|r| r.mnemonic == "CALL").unwrap();
        assert!(!call.relaxable);
    }
}
