//! Human-readable event-stream dump, grounded in the original `debug.cpp`'s
//! `printDebug` (EXPANSION C). Only ever used by tests and diagnostics --
//! never on the lowering/allocation hot path.

use std::fmt;

use crate::opcode::EventOp;
use crate::stream::EventStream;

/// Wraps an [`EventStream`] for `{}`/`{:?}` formatting as one line per
/// event: `"%3d > %OPCODE %data"`.
pub struct DebugView<'a>(pub &'a EventStream);

impl fmt::Display for DebugView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op, data) in self.0.iter() {
            writeln!(f, "{:3} > {:<16} {}", i.get(), opcode_name(op), data)?;
        }
        Ok(())
    }
}

fn opcode_name(op: EventOp) -> &'static str {
    match op {
        EventOp::Nop => "NOP",
        EventOp::CaseHeader => "CASE_HEADER",
        EventOp::JoinHeader => "JOIN_HEADER",
        EventOp::Phi => "PHI",
        EventOp::JoinCopy => "JOIN_COPY",
        EventOp::Value => "VALUE",
        EventOp::DestructiveValue => "DESTRUCTIVE_VALUE",
        EventOp::Copy => "COPY",
        EventOp::Use => "USE",
        EventOp::LastUse => "LAST_USE",
        EventOp::MutedUse => "MUTED_USE",
        EventOp::OnlyUse => "ONLY_USE",
        EventOp::UseEax => "USE_EAX",
        EventOp::UseEdx => "USE_EDX",
        EventOp::UseEflags => "USE_EFLAGS",
        EventOp::RegisterHint => "REGISTER_HINT",
        EventOp::ClobberList => "CLOBBER_LIST",
        EventOp::ImmediateBytes => "IMMEDIATE_BYTES",
        EventOp::Int32 => "INT32",
        EventOp::Add => "ADD",
        EventOp::Sub => "SUB",
        EventOp::Mul => "MUL",
        EventOp::Div => "DIV",
        EventOp::Imod => "IMOD",
        EventOp::Compare => "COMPARE",
        EventOp::Logic => "LOGIC",
        EventOp::Logic3 => "LOGIC3",
        EventOp::Load => "LOAD",
        EventOp::Store => "STORE",
        EventOp::Neg => "NEG",
        EventOp::Shuffle => "SHUFFLE",
        EventOp::Jump => "JUMP",
        EventOp::Branch => "BRANCH",
        EventOp::BranchTarget => "BRANCH_TARGET",
        EventOp::Ret => "RET",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilc_types::EventIndex;

    #[test]
    fn renders_one_line_per_event() {
        let mut s = EventStream::with_len(2);
        s.set(EventIndex::new(0), EventOp::Nop, 0);
        s.set(EventIndex::new(1), EventOp::Ret, 0);
        let rendered = DebugView(&s).to_string();
        assert_eq!(rendered.lines().count(), 2);
        assert!(rendered.contains("RET"));
    }
}
