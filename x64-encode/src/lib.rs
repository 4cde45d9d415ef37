//! Single-instruction x86-64 encoding plus a jump-relaxing [`Builder`]
//! (§3.3, §4.6, §4.7, §6.3, §6.4).
//!
//! This crate has no notion of basic blocks, SSA values, or registers
//! beyond the raw r0-r15 numbering; it's the bottom layer the rest of the
//! pipeline targets.

pub mod builder;
pub mod encoder;
pub mod error;
pub mod instr;
pub mod opcode_table;
pub mod operand;

pub use builder::Builder;
pub use encoder::encode;
pub use error::EncodeError;
pub use instr::{CodeMap, ImmSize, Instr, LockRep, ModRm, RawData, Rex, Segment, Sib, SimdPrefix, Vex};
pub use opcode_table::{OpcodeSpec, OPCODE_TABLE};
pub use operand::{Immediate, Label, Mem, OperandSize, Reg, RmOperand, RAX, RBP, RBX, RCX, RDI, RDX, RSI, RSP};
