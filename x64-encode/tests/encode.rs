//! Black-box encoding tests through the public `Builder` API only (no
//! `crate::` access) -- a complement to `src/builder.rs`'s own in-module
//! unit tests, which can reach internals the public surface can't.

use x64_encode::{Builder, EncodeError, Label, Mem, OperandSize, Reg, RAX, RBX, RCX, RDX};

#[test]
fn add_reg_reg_then_ret_matches_worked_example() {
    let mut b = Builder::new();
    b.add_mr(RAX.into(), RDX, OperandSize::Size32);
    b.ret();
    assert_eq!(b.encode().unwrap(), vec![0x01, 0xD0, 0xC3]);
}

#[test]
fn push_pop_round_trip_a_callee_saved_register() {
    let mut b = Builder::new();
    b.push_reg(RBX);
    b.mov_mi(RBX.into(), 7, OperandSize::Size32);
    b.pop_reg(RBX);
    b.ret();
    let bytes = b.encode().unwrap();
    assert_eq!(bytes.first(), Some(&0x53)); // PUSH RBX
    assert_eq!(bytes.last(), Some(&0xC3));
}

#[test]
fn memory_operand_encodes_a_modrm_with_displacement() {
    let mut b = Builder::new();
    let mem = Mem::base_disp(RCX, 16);
    b.mov_rm(RAX, mem, OperandSize::Size64);
    b.ret();
    let bytes = b.encode().unwrap();
    // REX.W (0x48) must precede the opcode for a 64-bit operand size.
    assert_eq!(bytes[0], 0x48);
}

#[test]
fn unplaced_label_is_rejected_at_encode_time() {
    let mut b = Builder::new();
    let dangling = b.new_label();
    b.jmp(dangling);
    assert!(matches!(b.encode(), Err(EncodeError::LabelOutOfRange(_))));
}

#[test]
fn forward_short_jump_relaxes_to_two_bytes() {
    let mut b = Builder::new();
    let end: Label = b.new_label();
    b.jmp(end);
    b.place_label(end);
    b.ret();
    let bytes = b.encode_relaxed().unwrap();
    assert_eq!(bytes[0], 0xEB); // short JMP rel8
    assert_eq!(bytes.len(), 3); // EB 00 C3
}

#[test]
fn jcc_conditions_pick_distinct_opcodes() {
    let build_with = |jcc: fn(&mut Builder, Label) -> &mut Builder| {
        let mut b = Builder::new();
        let target = b.new_label();
        jcc(&mut b, target);
        b.place_label(target);
        b.ret();
        b.encode_relaxed().unwrap()
    };

    let je = build_with(Builder::jcc_e);
    let jne = build_with(Builder::jcc_ne);
    assert_ne!(je[0], jne[0]);
}

#[test]
fn reg_constants_are_the_conventional_sysv_encoding() {
    assert_eq!(RAX, Reg(0));
    assert_eq!(RCX, Reg(1));
    assert_eq!(RDX, Reg(2));
    assert_eq!(RBX, Reg(3));
}
