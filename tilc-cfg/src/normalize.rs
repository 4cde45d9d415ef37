//! Block ordering, dominator/post-dominator trees, and loop depth (§4.1).
//!
//! Block numbering and the dominator-tree build are the same algorithm run
//! twice: once walking successors from each function's entry (forward,
//! dominators), once walking predecessors from each function's exit
//! (backward, post-dominators). Only the forward pass's numbering is used to
//! physically reorder `block_array` -- lowering (§4.2) depends on that order
//! for sequential event-stream layout. The backward pass computes its
//! numbering and dominator tree over an auxiliary ordering instead of
//! re-sorting the array a second time, so both trees can be read off the
//! same block afterward.

use tilc_types::{BlockIndex, DomTreeId, LoopDepth};

use crate::error::CfgError;
use crate::module::{Block, FunctionRange, Module};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Runs the full §4.1 pipeline over `module` in place: block reordering,
/// dominator tree, post-dominator tree, loop depth.
#[tracing::instrument(level = "debug", skip(module), fields(blocks = module.block_array.len()))]
pub fn normalize(module: &mut Module) -> Result<(), CfgError> {
    for func in &module.function_array {
        if func.start == func.end {
            return Err(CfgError::EmptyFunction);
        }
    }

    let fwd_ids = number_blocks(module, Direction::Forward)?;
    apply_permutation(module, &topo_order_from_ids(&fwd_ids));
    // block_id now equals the block's array position, ascending per function.
    for (i, block) in module.block_array.iter_mut().enumerate() {
        block.block_id = i as u32;
    }

    let fwd_order: Vec<usize> = (0..module.block_array.len()).collect();
    let dominator = compute_immediate_dominators(module, &fwd_order, Direction::Forward);
    for (i, d) in dominator.iter().enumerate() {
        module.block_array[i].dominator = *d;
    }
    assign_dom_tree(module, &fwd_order, Direction::Forward);

    let bwd_ids = number_blocks(module, Direction::Backward)?;
    let bwd_order = topo_order_from_ids(&bwd_ids);
    let post_dominator = compute_immediate_dominators(module, &bwd_order, Direction::Backward);
    for (i, d) in post_dominator.iter().enumerate() {
        module.block_array[i].post_dominator = *d;
    }
    assign_dom_tree(module, &bwd_order, Direction::Backward);

    compute_loop_depth(module);

    tracing::debug!(blocks = module.block_array.len(), "cfg normalized");
    Ok(())
}

/// Post-order DFS numbering (§4.1 step 2). Forward numbers descend from
/// `n` to `0`; backward numbers ascend from `0`. Returns one id per block,
/// indexed by current `block_array` position.
fn number_blocks(module: &Module, direction: Direction) -> Result<Vec<u32>, CfgError> {
    let n = module.block_array.len();
    const UNVISITED: u32 = u32::MAX;
    let mut ids = vec![UNVISITED; n];
    let mut counter: i64 = match direction {
        Direction::Forward => n as i64,
        Direction::Backward => -1,
    };

    for func in &module.function_array {
        let entry = match direction {
            Direction::Forward => func.start,
            Direction::Backward => func.end - 1,
        };
        if ids[entry] != UNVISITED {
            continue;
        }

        let mut stack = vec![entry];
        let mut child_cursor = vec![0usize; n];
        let mut on_stack = vec![false; n];
        on_stack[entry] = true;

        while let Some(&top) = stack.last() {
            let neighbors = match direction {
                Direction::Forward => module.block_array[top].successors(&module.neighbor_array),
                Direction::Backward => {
                    module.block_array[top].predecessors(&module.neighbor_array)
                }
            };

            if child_cursor[top] < neighbors.len() {
                let next = neighbors[child_cursor[top]].index();
                child_cursor[top] += 1;
                if ids[next] == UNVISITED && !on_stack[next] {
                    on_stack[next] = true;
                    stack.push(next);
                }
            } else {
                stack.pop();
                on_stack[top] = false;
                if ids[top] == UNVISITED {
                    ids[top] = match direction {
                        Direction::Forward => {
                            counter -= 1;
                            counter as u32
                        }
                        Direction::Backward => {
                            counter += 1;
                            counter as u32
                        }
                    };
                }
            }
        }
    }

    if let Some(b) = ids.iter().position(|&id| id == UNVISITED) {
        return Err(CfgError::UnreachableBlock(b as u32));
    }
    match direction {
        Direction::Forward => debug_assert_eq!(counter, 0),
        Direction::Backward => debug_assert_eq!(counter, n as i64 - 1),
    }
    Ok(ids)
}

/// Block-array positions sorted ascending by `ids`, i.e. topological order.
fn topo_order_from_ids(ids: &[u32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..ids.len()).collect();
    order.sort_by_key(|&i| ids[i]);
    order
}

/// Physically reorders `block_array` to match `order` (`order[new_pos] =
/// old_pos`), rewriting every `BlockIndex`-valued field -- the neighbor
/// array's entries and each block's own `dominator`/`post_dominator` -- to
/// the moved positions.
fn apply_permutation(module: &mut Module, order: &[usize]) {
    let n = order.len();
    let mut old_to_new = vec![0u32; n];
    for (new_pos, &old_pos) in order.iter().enumerate() {
        old_to_new[old_pos] = new_pos as u32;
    }

    let remap = |idx: BlockIndex| -> BlockIndex {
        if idx.is_sentinel() {
            idx
        } else {
            BlockIndex::new(old_to_new[idx.index()])
        }
    };

    for idx in module.neighbor_array.iter_mut() {
        *idx = remap(*idx);
    }

    let mut new_blocks: Vec<Block> = Vec::with_capacity(n);
    for &old_pos in order {
        let mut b = module.block_array[old_pos].clone();
        b.dominator = remap(b.dominator);
        b.post_dominator = remap(b.post_dominator);
        new_blocks.push(b);
    }
    module.block_array = new_blocks;

    // function ranges stay contiguous: every block in a function receives
    // ids from one contiguous sub-range of the shared counter (§4.1 step 2).
    let mut new_ranges = Vec::with_capacity(module.function_array.len());
    for func in &module.function_array {
        let positions: Vec<u32> = (func.start..func.end)
            .map(|old| old_to_new[old])
            .collect();
        let lo = *positions.iter().min().unwrap();
        let hi = *positions.iter().max().unwrap();
        new_ranges.push(FunctionRange {
            start: lo as usize,
            end: hi as usize + 1,
        });
    }
    module.function_array = new_ranges;
}

/// Cooper/Harvey/Kennedy-style iterative dominance intersection, keyed by
/// each block's current `block_id`-ordering rank in `order` rather than
/// raw array position -- valid for both the forward pass (where `order` is
/// the identity after [`apply_permutation`]) and the backward pass (where it
/// is not).
fn compute_immediate_dominators(
    module: &Module,
    order: &[usize],
    direction: Direction,
) -> Vec<BlockIndex> {
    let n = module.block_array.len();
    let mut rank = vec![0u32; n];
    for (r, &b) in order.iter().enumerate() {
        rank[b] = r as u32;
    }

    let mut idom = vec![BlockIndex::SENTINEL; n];

    let intersect = |a: usize, b: usize, idom: &[BlockIndex]| -> usize {
        let mut f1 = a;
        let mut f2 = b;
        while f1 != f2 {
            while rank[f1] > rank[f2] {
                f1 = idom[f1].index();
            }
            while rank[f2] > rank[f1] {
                f2 = idom[f2].index();
            }
        }
        f1
    };

    for func in &module.function_array {
        let entry = match direction {
            Direction::Forward => func.start,
            Direction::Backward => func.end - 1,
        };
        for &b in order.iter().filter(|&&b| func.start <= b && b < func.end) {
            if b == entry {
                continue;
            }
            let preds = match direction {
                Direction::Forward => module.block_array[b].predecessors(&module.neighbor_array),
                Direction::Backward => module.block_array[b].successors(&module.neighbor_array),
            };
            let mut new_idom: Option<usize> = None;
            for &p in preds {
                let p = p.index();
                if idom[p].is_sentinel() && p != entry {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => p,
                    Some(cur) => intersect(cur, p, &idom),
                });
            }
            idom[b] = match new_idom {
                Some(x) => BlockIndex::new(x as u32),
                None => BlockIndex::SENTINEL,
            };
        }
    }

    idom
}

/// §4.1 step 5: subtree size by reverse topological order, then pre-order
/// `domTreeId` offsets from each parent (root = 0).
fn assign_dom_tree(module: &mut Module, order: &[usize], direction: Direction) {
    let n = module.block_array.len();
    let parent_of = |b: usize| -> BlockIndex {
        match direction {
            Direction::Forward => module.block_array[b].dominator,
            Direction::Backward => module.block_array[b].post_dominator,
        }
    };

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &b in order {
        let p = parent_of(b);
        if !p.is_sentinel() {
            children[p.index()].push(b);
        }
    }

    let mut size = vec![1u32; n];
    for &b in order.iter().rev() {
        let p = parent_of(b);
        if !p.is_sentinel() {
            size[p.index()] += size[b];
        }
    }

    let mut tree_id = vec![0u32; n];
    for func in &module.function_array {
        let root = match direction {
            Direction::Forward => func.start,
            Direction::Backward => func.end - 1,
        };
        preorder_assign(root, 0, &children, &size, &mut tree_id);
    }

    for i in 0..n {
        match direction {
            Direction::Forward => {
                module.block_array[i].dom_tree_id = DomTreeId::new(tree_id[i]);
                module.block_array[i].dom_tree_size = size[i];
            }
            Direction::Backward => {
                module.block_array[i].post_dom_tree_id = DomTreeId::new(tree_id[i]);
                module.block_array[i].post_dom_tree_size = size[i];
            }
        }
    }
}

fn preorder_assign(
    b: usize,
    base: u32,
    children: &[Vec<usize>],
    size: &[u32],
    tree_id: &mut [u32],
) {
    tree_id[b] = base;
    let mut offset = base + 1;
    for &c in &children[b] {
        preorder_assign(c, offset, children, size, tree_id);
        offset += size[c];
    }
}

/// §4.1 step 7: `B.loopDepth = B.dominator.loopDepth + (1 if B dominates any
/// predecessor of B else 0)`. The dominator relation has no cycles, so a
/// memoized walk up the `dominator` chain needs no separate topological
/// order.
fn compute_loop_depth(module: &mut Module) {
    let n = module.block_array.len();
    let mut computed = vec![false; n];
    let mut depth = vec![0u32; n];

    for b in 0..n {
        depth_of(module, b, &mut computed, &mut depth);
    }

    for i in 0..n {
        module.block_array[i].loop_depth = LoopDepth(depth[i]);
    }
}

fn depth_of(module: &Module, b: usize, computed: &mut [bool], depth: &mut [u32]) -> u32 {
    if computed[b] {
        return depth[b];
    }
    let dom = module.block_array[b].dominator;
    let base = if dom.is_sentinel() {
        0
    } else {
        depth_of(module, dom.index(), computed, depth)
    };
    let is_header = module.block_array[b]
        .predecessors(&module.neighbor_array)
        .iter()
        .any(|&p| module.block_array[b].dominates(&module.block_array[p.index()]));
    let d = base + u32::from(is_header);
    depth[b] = d;
    computed[b] = true;
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleBuilder;

    fn linear_chain(len: usize) -> Module {
        let mut b = ModuleBuilder::new();
        b.start_function();
        let blocks: Vec<_> = (0..len).map(|i| b.add_block(0, i as u32)).collect();
        for w in blocks.windows(2) {
            b.add_edge(w[0], w[1]);
        }
        b.end_function();
        b.build()
    }

    #[test]
    fn straight_line_dominator_chain() {
        let mut m = linear_chain(4);
        normalize(&mut m).unwrap();
        for i in 1..4 {
            assert_eq!(m.block(BlockIndex::new(i)).dominator, BlockIndex::new(i - 1));
        }
        assert!(m.block(BlockIndex::new(0)).dominator.is_sentinel());
    }

    #[test]
    fn straight_line_has_no_loops() {
        let mut m = linear_chain(5);
        normalize(&mut m).unwrap();
        for block in m.blocks() {
            assert_eq!(block.loop_depth.0, 0);
        }
    }

    #[test]
    fn diamond_join_dominator_is_the_branch_block() {
        let mut b = ModuleBuilder::new();
        b.start_function();
        let entry = b.add_block(0, 0);
        let left = b.add_block(0, 1);
        let right = b.add_block(0, 2);
        let join = b.add_block(0, 3);
        b.add_edge(entry, left);
        b.add_edge(entry, right);
        b.add_edge(left, join);
        b.add_edge(right, join);
        b.end_function();
        let mut m = b.build();
        normalize(&mut m).unwrap();

        let join_block = m
            .blocks()
            .iter()
            .find(|blk| blk.basic_block == 3)
            .unwrap();
        let entry_block = m
            .blocks()
            .iter()
            .find(|blk| blk.basic_block == 0)
            .unwrap();
        let entry_idx = m
            .blocks()
            .iter()
            .position(|blk| blk.basic_block == 0)
            .unwrap();
        assert_eq!(join_block.dominator, BlockIndex::new(entry_idx as u32));
        assert!(entry_block.dominates(join_block));
    }

    #[test]
    fn single_block_loop_header_has_depth_one() {
        let mut b = ModuleBuilder::new();
        b.start_function();
        let pre = b.add_block(0, 0);
        let header = b.add_block(0, 1);
        let exit = b.add_block(0, 2);
        b.add_edge(pre, header);
        b.add_edge(header, header); // self-loop back edge
        b.add_edge(header, exit);
        b.end_function();
        let mut m = b.build();
        normalize(&mut m).unwrap();

        let header_block = m
            .blocks()
            .iter()
            .find(|blk| blk.basic_block == 1)
            .unwrap();
        assert_eq!(header_block.loop_depth.0, 1);
    }

    #[test]
    fn dom_tree_containment_matches_interval_rule() {
        let mut m = linear_chain(6);
        normalize(&mut m).unwrap();
        let blocks = m.blocks();
        for b in blocks {
            if b.dominator.is_sentinel() {
                continue;
            }
            let dom = &blocks[b.dominator.index()];
            assert!(dom.dom_tree_id.get() <= b.dom_tree_id.get());
            assert!(b.dom_tree_id.get() < dom.dom_tree_id.get() + dom.dom_tree_size);
        }
    }

    #[test]
    fn renormalizing_is_idempotent() {
        let mut m = linear_chain(4);
        normalize(&mut m).unwrap();
        let first: Vec<_> = m
            .blocks()
            .iter()
            .map(|b| (b.dominator, b.dom_tree_id, b.loop_depth))
            .collect();
        normalize(&mut m).unwrap();
        let second: Vec<_> = m
            .blocks()
            .iter()
            .map(|b| (b.dominator, b.dom_tree_id, b.loop_depth))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn unreachable_block_is_rejected() {
        let mut b = ModuleBuilder::new();
        b.start_function();
        let entry = b.add_block(0, 0);
        let _unreachable = b.add_block(0, 1);
        let tail = b.add_block(0, 2);
        b.add_edge(entry, tail);
        b.end_function();
        let mut m = b.build();
        assert!(matches!(normalize(&mut m), Err(CfgError::UnreachableBlock(_))));
    }
}
