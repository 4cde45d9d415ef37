//! The CFG normalizer (§3.1, §4.1): block ordering, dominator and
//! post-dominator trees, and loop depth.

pub mod error;
mod module;
mod normalize;

pub use error::CfgError;
pub use module::{Block, FunctionRange, Module, ModuleBuilder};
pub use normalize::normalize;

#[cfg(test)]
mod proptests {
    use quickcheck_macros::quickcheck;

    use crate::module::ModuleBuilder;
    use crate::normalize::normalize;

    /// A random forest of edges added strictly from a lower-numbered block
    /// to a higher-numbered one, which is always a DAG and always keeps
    /// every non-entry block reachable from block 0.
    fn dag_chain_with_extra_edges(extra: Vec<(u8, u8)>, block_count: u8) -> crate::Module {
        let n = (block_count % 12).max(1) as usize;
        let mut b = ModuleBuilder::new();
        b.start_function();
        let blocks: Vec<_> = (0..n).map(|i| b.add_block(0, i as u32)).collect();
        for w in blocks.windows(2) {
            b.add_edge(w[0], w[1]);
        }
        for (from, to) in extra {
            let from = (from as usize) % n;
            let to = (to as usize) % n;
            if from < to {
                b.add_edge(blocks[from], blocks[to]);
            }
        }
        b.end_function();
        b.build()
    }

    #[quickcheck]
    fn dominator_tree_containment_holds(extra: Vec<(u8, u8)>, block_count: u8) -> bool {
        let mut m = dag_chain_with_extra_edges(extra, block_count);
        if normalize(&mut m).is_err() {
            return true;
        }
        let blocks = m.blocks();
        blocks.iter().all(|b| {
            if b.dominator.is_sentinel() {
                return true;
            }
            let dom = &blocks[b.dominator.index()];
            dom.dom_tree_id.get() <= b.dom_tree_id.get()
                && b.dom_tree_id.get() < dom.dom_tree_id.get() + dom.dom_tree_size
        })
    }

    #[quickcheck]
    fn post_dominator_tree_containment_holds(extra: Vec<(u8, u8)>, block_count: u8) -> bool {
        let mut m = dag_chain_with_extra_edges(extra, block_count);
        if normalize(&mut m).is_err() {
            return true;
        }
        let blocks = m.blocks();
        blocks.iter().all(|b| {
            if b.post_dominator.is_sentinel() {
                return true;
            }
            let pdom = &blocks[b.post_dominator.index()];
            pdom.post_dom_tree_id.get() <= b.post_dom_tree_id.get()
                && b.post_dom_tree_id.get()
                    < pdom.post_dom_tree_id.get() + pdom.post_dom_tree_size
        })
    }

    #[quickcheck]
    fn normalize_is_idempotent(extra: Vec<(u8, u8)>, block_count: u8) -> bool {
        let mut m = dag_chain_with_extra_edges(extra, block_count);
        if normalize(&mut m).is_err() {
            return true;
        }
        let before: Vec<_> = m
            .blocks()
            .iter()
            .map(|b| (b.dominator, b.dom_tree_id, b.post_dominator, b.loop_depth))
            .collect();
        if normalize(&mut m).is_err() {
            return false;
        }
        let after: Vec<_> = m
            .blocks()
            .iter()
            .map(|b| (b.dominator, b.dom_tree_id, b.post_dominator, b.loop_depth))
            .collect();
        before == after
    }
}
