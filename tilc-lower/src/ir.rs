//! The front-end-facing TIL data model (§6.1): a typed, SSA-form module the
//! lowerer consumes. Concrete structs rather than consumer traits -- the
//! front end is expected to materialize this shape once, the same way a
//! transaction's on-chain fields are plain structs rather than a trait a
//! caller implements.

use std::cell::Cell;

use tilc_types::EventIndex;

/// `{Base, Size, Signed, VectSize}` value type, exactly as named in §6.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueType {
    pub base: BaseKind,
    /// Scalar width in bits: one of `0, 1, 8, 16, 32, 64, 128`. `0` only
    /// valid for `Void`.
    pub size: u16,
    pub signed: bool,
    /// Lane count for a vector value; `1` for scalars.
    pub vect_size: u8,
}

/// `ValueType.Base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseKind {
    Void,
    Bool,
    Int,
    Float,
    String,
    Pointer,
    ValueRef,
}

/// The binary operator tag on a TIL instruction. The lowerer's fixed table
/// (§4.2) maps each of these to an [`tilc_event::EventOp`] plus a packed
/// sub-opcode kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Sar,
}

impl BinOp {
    /// `true` for operators the commute pass (§4.3 step 2) may reorder.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Mul | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor
        )
    }
}

/// A reference to an operand: either a value already lowered earlier in
/// program order (reuses its existing event), or an immediate not yet
/// assigned an event of its own ("trivial", inlined at the point of use
/// per §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Index into the defining block's `instructions`, already lowered.
    Instr(usize),
    /// An immediate inlined directly before this use.
    Literal(i64),
}

/// One TIL instruction. `stack_id` is the mutable back-pointer slot §6.1
/// describes: the lowerer sets it to the event index at which this
/// instruction's value was emitted, and later lowering steps read it back
/// when this instruction is used as an [`Operand::Instr`].
#[derive(Debug)]
pub struct Instruction {
    pub value_type: ValueType,
    pub kind: InstrKind,
    pub stack_id: Cell<Option<EventIndex>>,
}

impl Instruction {
    pub fn new(value_type: ValueType, kind: InstrKind) -> Self {
        Instruction {
            value_type,
            kind,
            stack_id: Cell::new(None),
        }
    }
}

/// The operation an [`Instruction`] performs.
#[derive(Debug)]
pub enum InstrKind {
    Literal(i64),
    Binary { op: BinOp, lhs: Operand, rhs: Operand },
}

/// A block argument (phi node). Its own `stack_id` is the event index of
/// its `PHI` event.
#[derive(Debug, Default)]
pub struct Phi {
    pub stack_id: Cell<Option<EventIndex>>,
}

/// A block's terminator (§6.1: Goto / Branch / Return).
#[derive(Debug)]
pub enum Terminator {
    /// `args[i]` is the value handed to `target`'s `i`-th phi.
    Goto { target: usize, args: Vec<Operand> },
    Branch {
        condition: Operand,
        then_block: usize,
        else_block: usize,
    },
    Return { value: Option<Operand> },
}

/// One basic block's TIL content: phi arguments, instructions, terminator.
/// Block topology (predecessors/successors/dominance) lives in the paired
/// [`tilc_cfg::Module`], indexed identically by position.
#[derive(Debug)]
pub struct BasicBlock {
    pub arguments: Vec<Phi>,
    pub instructions: Vec<Instruction>,
    pub terminator: Terminator,
}

/// One function: a flat list of blocks, positionally aligned with one
/// [`tilc_cfg::FunctionRange`] of blocks in the paired CFG module.
#[derive(Debug, Default)]
pub struct Function {
    pub blocks: Vec<BasicBlock>,
}

/// A whole TIL program: one or more functions, each paired positionally
/// with a [`tilc_cfg::FunctionRange`].
#[derive(Debug, Default)]
pub struct TilModule {
    pub functions: Vec<Function>,
}
