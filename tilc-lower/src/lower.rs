//! TIL-to-event-stream lowering (§4.2): two passes over a [`TilModule`]
//! paired with its already-[`normalize`](tilc_cfg::normalize)d
//! [`tilc_cfg::Module`] -- first counting each block's event footprint and
//! propagating dominator "head" scopes, then emitting the real stream.

use tilc_cfg::Module as CfgModule;
use tilc_event::opcode::{ArithPayload, CompareKind};
use tilc_event::{EventOp, EventStream};
use tilc_types::{BaseType, BlockIndex, EventIndex, TypeDescriptor};

use crate::error::LowerError;
use crate::ir::{BasicBlock, BaseKind, BinOp, InstrKind, Operand, Terminator, TilModule, ValueType};

/// Runs §4.2 over `til`, writing `head`/`first_event`/`bound_event` into
/// `cfg`'s blocks and returning the packed event stream.
#[tracing::instrument(level = "debug", skip(til, cfg))]
pub fn lower(til: &TilModule, cfg: &mut CfgModule) -> Result<EventStream, LowerError> {
    if til.functions.len() != cfg.functions().len() {
        return Err(LowerError::FunctionCountMismatch {
            til: til.functions.len(),
            cfg: cfg.functions().len(),
        });
    }
    for (f, func_range) in cfg.functions().iter().enumerate() {
        let want = func_range.end - func_range.start;
        if til.functions[f].blocks.len() != want {
            return Err(LowerError::BlockCountMismatch {
                til: til.functions[f].blocks.len(),
                cfg: want,
            });
        }
    }

    let n = cfg.blocks().len();
    let mut sizes = vec![0u32; n];
    for (f, func_range) in cfg.functions().iter().enumerate() {
        let til_func = &til.functions[f];
        for p in func_range.start..func_range.end {
            let basic_block = cfg.block(BlockIndex::new(p as u32)).basic_block as usize;
            sizes[p] = count_block_events(&til_func.blocks[basic_block]);
        }
    }

    // Step 2: block-dominator ("head") propagation, in forward topological
    // order so a block's dominator's head is already resolved.
    let func_ranges: Vec<_> = cfg.functions().to_vec();
    for func_range in &func_ranges {
        for p in func_range.start..func_range.end {
            let bi = BlockIndex::new(p as u32);
            let dom = cfg.block(bi).dominator;
            let head = if dom.is_sentinel() {
                bi
            } else {
                let numerically_adjacent = dom.get() + 1 == p as u32;
                let dom_postdominates_self = cfg.block(dom).post_dominates(cfg.block(bi));
                if dom_postdominates_self || numerically_adjacent {
                    cfg.block(dom).head
                } else {
                    bi
                }
            };
            cfg.blocks_mut()[p].head = head;
        }
    }

    // Step 3: prefix-sum sizes into [firstEvent, boundEvent), one running
    // cursor across the whole module.
    let mut cursor: u32 = 0;
    for func_range in &func_ranges {
        for p in func_range.start..func_range.end {
            let first = cursor;
            cursor += sizes[p];
            cfg.blocks_mut()[p].first_event = EventIndex::new(first);
            cfg.blocks_mut()[p].bound_event = EventIndex::new(cursor);
        }
    }

    let mut stream = EventStream::with_len(cursor as usize);

    // Step 4: real emission.
    for (f, func_range) in cfg.functions().iter().enumerate() {
        let til_func = &til.functions[f];
        let mut pos_of_til = vec![0usize; til_func.blocks.len()];
        for p in func_range.start..func_range.end {
            let basic_block = cfg.block(BlockIndex::new(p as u32)).basic_block as usize;
            pos_of_til[basic_block] = p;
        }

        for p in func_range.start..func_range.end {
            let bi = BlockIndex::new(p as u32);
            let basic_block = cfg.block(bi).basic_block as usize;
            let til_block = &til_func.blocks[basic_block];
            emit_block(&mut stream, cfg, til_block, bi, &pos_of_til)?;
        }
    }

    tracing::debug!(events = cursor, "lowering complete");
    Ok(stream)
}

fn operand_needs_event(op: &Operand) -> bool {
    matches!(op, Operand::Literal(_))
}

fn count_block_events(block: &BasicBlock) -> u32 {
    let mut n = 1 + block.arguments.len() as u32;
    for instr in &block.instructions {
        n += match &instr.kind {
            InstrKind::Literal(_) => 1,
            InstrKind::Binary { lhs, rhs, .. } => {
                let mut m = 3; // two LAST_USE + one result
                if operand_needs_event(lhs) {
                    m += 1;
                }
                if operand_needs_event(rhs) {
                    m += 1;
                }
                m
            }
        };
    }
    n += match &block.terminator {
        Terminator::Goto { args, .. } => 2 * args.len() as u32 + 1,
        Terminator::Branch { condition, .. } => 3 + u32::from(operand_needs_event(condition)),
        Terminator::Return { value } => {
            1 + value.as_ref().map_or(0, |v| u32::from(operand_needs_event(v)))
        }
    };
    n
}

/// Tracks the write cursor while emitting one block's events.
struct EmitCursor<'a> {
    stream: &'a mut EventStream,
    next: u32,
}

impl<'a> EmitCursor<'a> {
    fn push(&mut self, op: EventOp, data: u32) -> EventIndex {
        let i = EventIndex::new(self.next);
        self.stream.set(i, op, data);
        self.next += 1;
        i
    }
}

fn resolve_operand(
    operand: &Operand,
    block: &BasicBlock,
    cur: &mut EmitCursor,
) -> Result<EventIndex, LowerError> {
    match operand {
        Operand::Literal(v) => Ok(cur.push(EventOp::ImmediateBytes, *v as u32)),
        Operand::Instr(idx) => block.instructions[*idx]
            .stack_id
            .get()
            .ok_or(LowerError::OperandNotYetLowered(*idx)),
    }
}

fn emit_block(
    stream: &mut EventStream,
    cfg: &CfgModule,
    block: &BasicBlock,
    bi: BlockIndex,
    pos_of_til: &[usize],
) -> Result<(), LowerError> {
    let this = cfg.block(bi);
    let mut cur = EmitCursor {
        stream,
        next: this.first_event.get(),
    };

    emit_header(&mut cur, cfg, bi);

    for phi in &block.arguments {
        let idx = cur.push(EventOp::Phi, 0);
        phi.stack_id.set(Some(idx));
    }

    for instr in &block.instructions {
        let idx = match &instr.kind {
            InstrKind::Literal(v) => cur.push(EventOp::ImmediateBytes, *v as u32),
            InstrKind::Binary { op, lhs, rhs } => {
                let lhs_idx = resolve_operand(lhs, block, &mut cur)?;
                let rhs_idx = resolve_operand(rhs, block, &mut cur)?;
                cur.push(EventOp::LastUse, lhs_idx.get());
                cur.push(EventOp::LastUse, rhs_idx.get());
                let (event_op, payload) = bop_event(*op, &instr.value_type);
                cur.push(event_op, payload.pack())
            }
        };
        instr.stack_id.set(Some(idx));
    }

    match &block.terminator {
        Terminator::Goto { target, args } => {
            let target_pos = pos_of_til[*target];
            let target_block = cfg.block(BlockIndex::new(target_pos as u32));
            for (slot, arg) in args.iter().enumerate() {
                let arg_idx = resolve_operand(arg, block, &mut cur)?;
                cur.push(EventOp::LastUse, arg_idx.get());
                let phi_event = target_block.first_event.get() + 1 + slot as u32;
                cur.push(EventOp::JoinCopy, phi_event);
            }
            cur.push(EventOp::Jump, target_block.first_event.get());
        }
        Terminator::Branch {
            condition,
            then_block,
            else_block,
        } => {
            let cond_idx = resolve_operand(condition, block, &mut cur)?;
            cur.push(EventOp::LastUse, cond_idx.get());
            let else_pos = pos_of_til[*else_block];
            let then_pos = pos_of_til[*then_block];
            let else_first = cfg.block(BlockIndex::new(else_pos as u32)).first_event.get();
            let then_first = cfg.block(BlockIndex::new(then_pos as u32)).first_event.get();
            cur.push(EventOp::Branch, else_first);
            cur.push(EventOp::BranchTarget, then_first);
        }
        Terminator::Return { value } => {
            let data = match value {
                Some(v) => resolve_operand(v, block, &mut cur)?.get(),
                None => 0,
            };
            cur.push(EventOp::Ret, data);
        }
    }

    debug_assert_eq!(cur.next, this.bound_event.get());
    Ok(())
}

fn emit_header(cur: &mut EmitCursor, cfg: &CfgModule, bi: BlockIndex) {
    let this = cfg.block(bi);
    let dom = this.dominator;
    if dom.is_sentinel() {
        cur.push(EventOp::Nop, 0);
        return;
    }
    let dom_block = cfg.block(dom);
    let straight_line = this.head != bi && this.first_event.get() == dom_block.bound_event.get();
    if straight_line {
        cur.push(EventOp::Nop, 0);
    } else if this.head == bi {
        cur.push(EventOp::CaseHeader, dom_block.bound_event.get().saturating_sub(1));
    } else {
        let head_block = cfg.block(this.head);
        cur.push(EventOp::JoinHeader, head_block.bound_event.get());
    }
}

fn type_desc_of(vt: &ValueType) -> TypeDescriptor {
    let log_bits = match vt.size {
        0 | 1 => 0,
        8 => 3,
        16 => 4,
        32 => 5,
        64 => 6,
        128 => 7,
        _ => 5,
    };
    let vector_width = match vt.vect_size {
        0 | 1 => 0,
        2 => 1,
        4 => 2,
        8 => 3,
        16 => 4,
        _ => 0,
    };
    let base_type = match vt.base {
        BaseKind::Float => BaseType::Float,
        _ if vt.signed => BaseType::Signed,
        BaseKind::Int | BaseKind::Bool => BaseType::Unsigned,
        _ => BaseType::BinaryData,
    };
    TypeDescriptor::new(vector_width, log_bits, base_type)
}

/// The fixed opcode table of §4.2 (`BOP_Add -> ADD`, `BOP_Eq -> COMPARE`,
/// `BOP_BitAnd -> LOGIC`, ...). Shifts don't have a dedicated event opcode
/// of their own, so they share `LOGIC3` with bitwise-shift `kind` tags --
/// the concrete x86 opcode is chosen later from `(event_op, kind,
/// type_desc)` by the backend's instruction selection.
fn bop_event(op: BinOp, vt: &ValueType) -> (EventOp, ArithPayload) {
    let type_desc = type_desc_of(vt);
    let (event_op, kind) = match op {
        BinOp::Add => (EventOp::Add, 0),
        BinOp::Sub => (EventOp::Sub, 0),
        BinOp::Mul => (EventOp::Mul, 0),
        BinOp::Div => (EventOp::Div, 0),
        BinOp::Mod => (EventOp::Imod, 0),
        BinOp::Eq => (EventOp::Compare, CompareKind::Eq as u8),
        BinOp::Ne => (EventOp::Compare, CompareKind::Ne as u8),
        BinOp::Lt => (EventOp::Compare, CompareKind::Lt as u8),
        BinOp::Le => (EventOp::Compare, CompareKind::Le as u8),
        BinOp::Gt => (EventOp::Compare, CompareKind::Gt as u8),
        BinOp::Ge => (EventOp::Compare, CompareKind::Ge as u8),
        BinOp::BitAnd => (EventOp::Logic, 0),
        BinOp::BitOr => (EventOp::Logic, 1),
        BinOp::BitXor => (EventOp::Logic, 2),
        BinOp::Shl => (EventOp::Logic3, 0),
        BinOp::Shr => (EventOp::Logic3, 1),
        BinOp::Sar => (EventOp::Logic3, 2),
    };
    (event_op, ArithPayload { type_desc, kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BasicBlock, Function, Instruction};
    use tilc_cfg::ModuleBuilder;

    fn int32() -> ValueType {
        ValueType {
            base: BaseKind::Int,
            size: 32,
            signed: true,
            vect_size: 1,
        }
    }

    #[test]
    fn single_add_lowers_to_two_last_uses_and_add() {
        let mut b = ModuleBuilder::new();
        b.start_function();
        b.add_block(0, 0);
        b.end_function();
        let mut cfg = b.build();
        tilc_cfg::normalize(&mut cfg).unwrap();

        let block = BasicBlock {
            arguments: vec![],
            instructions: vec![Instruction::new(
                int32(),
                InstrKind::Binary {
                    op: BinOp::Add,
                    lhs: Operand::Literal(1),
                    rhs: Operand::Literal(2),
                },
            )],
            terminator: Terminator::Return {
                value: Some(Operand::Instr(0)),
            },
        };
        let til = TilModule {
            functions: vec![Function { blocks: vec![block] }],
        };

        let stream = lower(&til, &mut cfg).unwrap();
        // NOP, IMMEDIATE_BYTES(1), IMMEDIATE_BYTES(2), LAST_USE, LAST_USE, ADD, RET
        assert_eq!(stream.len(), 7);
        assert_eq!(stream.op(EventIndex::new(0)), EventOp::Nop);
        assert_eq!(stream.op(EventIndex::new(1)), EventOp::ImmediateBytes);
        assert_eq!(stream.op(EventIndex::new(5)), EventOp::Add);
        assert_eq!(stream.op(EventIndex::new(6)), EventOp::Ret);
        assert_eq!(stream.data(EventIndex::new(6)), 5);
    }

    #[test]
    fn reused_value_emits_no_extra_event() {
        let mut b = ModuleBuilder::new();
        b.start_function();
        b.add_block(0, 0);
        b.end_function();
        let mut cfg = b.build();
        tilc_cfg::normalize(&mut cfg).unwrap();

        let literal = Instruction::new(int32(), InstrKind::Literal(7));
        let sum = Instruction::new(
            int32(),
            InstrKind::Binary {
                op: BinOp::Add,
                lhs: Operand::Instr(0),
                rhs: Operand::Instr(0),
            },
        );
        let block = BasicBlock {
            arguments: vec![],
            instructions: vec![literal, sum],
            terminator: Terminator::Return {
                value: Some(Operand::Instr(1)),
            },
        };
        let til = TilModule {
            functions: vec![Function { blocks: vec![block] }],
        };

        let stream = lower(&til, &mut cfg).unwrap();
        // NOP, IMMEDIATE_BYTES(7), LAST_USE, LAST_USE, ADD, RET
        assert_eq!(stream.len(), 6);
    }

    #[test]
    fn mismatched_function_count_is_rejected() {
        let mut b = ModuleBuilder::new();
        b.start_function();
        b.add_block(0, 0);
        b.end_function();
        let mut cfg = b.build();
        tilc_cfg::normalize(&mut cfg).unwrap();

        let til = TilModule { functions: vec![] };
        assert!(matches!(
            lower(&til, &mut cfg),
            Err(LowerError::FunctionCountMismatch { .. })
        ));
    }
}
