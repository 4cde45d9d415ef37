//! CFG data model (§3.1): a module's block array, the neighbor array backing
//! each block's predecessor/successor slices, and the function ranges that
//! partition the block array.

use std::ops::Range;

use tilc_types::{BlockIndex, DomTreeId, EventIndex, LoopDepth};

/// One basic block, in the flattened representation §3.1 describes.
///
/// `dominator`/`dom_tree_id`/`dom_tree_size` and their `post_*` counterparts
/// are written by [`crate::normalize`]; they read as [`BlockIndex::SENTINEL`]
/// / zero before normalization runs.
#[derive(Debug, Clone)]
pub struct Block {
    /// Opaque handle back to the front end's own basic-block representation.
    pub basic_block: u32,
    /// Number of block arguments (join-point parameters / phi slots).
    pub num_arguments: u32,
    /// Immediate dominator, or [`BlockIndex::SENTINEL`] for an entry block.
    pub dominator: BlockIndex,
    /// First event of this block's own header, once lowered.
    pub head: BlockIndex,
    /// Forward topological ordering key, assigned by normalization.
    pub block_id: u32,
    /// Pre-order offset of this block within the dominator tree.
    pub dom_tree_id: DomTreeId,
    /// Size (node count) of this block's dominator subtree.
    pub dom_tree_size: u32,
    /// Immediate post-dominator, or [`BlockIndex::SENTINEL`] for an exit
    /// block.
    pub post_dominator: BlockIndex,
    /// Pre-order offset within the post-dominator tree.
    pub post_dom_tree_id: DomTreeId,
    /// Size of this block's post-dominator subtree.
    pub post_dom_tree_size: u32,
    /// First event index owned by this block, once lowered.
    pub first_event: EventIndex,
    /// One-past-the-last event index owned by this block.
    pub bound_event: EventIndex,
    /// Loop nesting depth (§4.1 step 7).
    pub loop_depth: LoopDepth,
    /// Slot index this block's phi arguments are read from.
    pub phi_slot: u32,
    pub(crate) predecessors: Range<usize>,
    pub(crate) successors: Range<usize>,
}

impl Block {
    fn new(basic_block: u32, num_arguments: u32) -> Self {
        Block {
            basic_block,
            num_arguments,
            dominator: BlockIndex::SENTINEL,
            head: BlockIndex::SENTINEL,
            block_id: u32::MAX,
            dom_tree_id: DomTreeId::new(0),
            dom_tree_size: 0,
            post_dominator: BlockIndex::SENTINEL,
            post_dom_tree_id: DomTreeId::new(0),
            post_dom_tree_size: 0,
            first_event: EventIndex::new(0),
            bound_event: EventIndex::new(0),
            loop_depth: LoopDepth(0),
            phi_slot: 0,
            predecessors: 0..0,
            successors: 0..0,
        }
    }

    /// This block's predecessors, resolved against the module's neighbor
    /// array.
    pub fn predecessors<'a>(&self, neighbors: &'a [BlockIndex]) -> &'a [BlockIndex] {
        &neighbors[self.predecessors.clone()]
    }

    /// This block's successors, resolved against the module's neighbor
    /// array.
    pub fn successors<'a>(&self, neighbors: &'a [BlockIndex]) -> &'a [BlockIndex] {
        &neighbors[self.successors.clone()]
    }

    /// `true` if `self`'s dominator subtree contains `other`, using the
    /// pre-order interval containment test of §8.1.
    pub fn dominates(&self, other: &Block) -> bool {
        self.dom_tree_id.get() <= other.dom_tree_id.get()
            && other.dom_tree_id.get() < self.dom_tree_id.get() + self.dom_tree_size
    }

    /// As [`Block::dominates`], but over the post-dominator tree.
    pub fn post_dominates(&self, other: &Block) -> bool {
        self.post_dom_tree_id.get() <= other.post_dom_tree_id.get()
            && other.post_dom_tree_id.get()
                < self.post_dom_tree_id.get() + self.post_dom_tree_size
    }
}

/// A function's half-open range of block-array indices (`functionArray`,
/// §3.1). Functions never share blocks and their edges never cross
/// function boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionRange {
    pub start: usize,
    pub end: usize,
}

impl FunctionRange {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// The CFG for one or more functions: a flat block array plus the neighbor
/// array each block's predecessor/successor slices are carved from.
#[derive(Debug, Default)]
pub struct Module {
    pub(crate) block_array: Vec<Block>,
    pub(crate) neighbor_array: Vec<BlockIndex>,
    pub(crate) function_array: Vec<FunctionRange>,
}

impl Module {
    pub fn blocks(&self) -> &[Block] {
        &self.block_array
    }

    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.block_array
    }

    pub fn block(&self, i: BlockIndex) -> &Block {
        &self.block_array[i.index()]
    }

    pub fn neighbors(&self) -> &[BlockIndex] {
        &self.neighbor_array
    }

    pub fn functions(&self) -> &[FunctionRange] {
        &self.function_array
    }
}

/// Builds a [`Module`] one function/block/edge at a time. Front ends
/// construct the CFG this way rather than assembling the packed arrays by
/// hand.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    blocks: Vec<BlockDraft>,
    functions: Vec<Range<usize>>,
    current_function_start: Option<usize>,
}

struct BlockDraft {
    basic_block: u32,
    num_arguments: u32,
    successors: Vec<usize>,
    predecessors: Vec<usize>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new function at the current block-array position. Must be
    /// paired with [`ModuleBuilder::end_function`] before the next call.
    pub fn start_function(&mut self) {
        assert!(
            self.current_function_start.is_none(),
            "start_function called while a function is already open"
        );
        self.current_function_start = Some(self.blocks.len());
    }

    /// Closes the function opened by the matching [`ModuleBuilder::start_function`].
    pub fn end_function(&mut self) {
        let start = self
            .current_function_start
            .take()
            .expect("end_function called with no open function");
        self.functions.push(start..self.blocks.len());
    }

    /// Adds a block to the currently open function and returns its index.
    pub fn add_block(&mut self, num_arguments: u32, basic_block: u32) -> BlockIndex {
        let idx = self.blocks.len();
        self.blocks.push(BlockDraft {
            basic_block,
            num_arguments,
            successors: Vec::new(),
            predecessors: Vec::new(),
        });
        BlockIndex::new(idx as u32)
    }

    /// Records a control-flow edge `from -> to`; both ends must already be
    /// registered blocks of the same (currently or previously closed)
    /// function.
    pub fn add_edge(&mut self, from: BlockIndex, to: BlockIndex) {
        self.blocks[from.index()].successors.push(to.index());
        self.blocks[to.index()].predecessors.push(from.index());
    }

    /// Finalizes the builder into a [`Module`], packing each block's
    /// predecessor/successor lists into one shared neighbor array.
    pub fn build(self) -> Module {
        assert!(
            self.current_function_start.is_none(),
            "build called with a function still open"
        );

        let mut block_array = Vec::with_capacity(self.blocks.len());
        let mut neighbor_array = Vec::new();

        for draft in &self.blocks {
            let mut block = Block::new(draft.basic_block, draft.num_arguments);

            let pred_start = neighbor_array.len();
            neighbor_array.extend(draft.predecessors.iter().map(|&p| BlockIndex::new(p as u32)));
            block.predecessors = pred_start..neighbor_array.len();

            let succ_start = neighbor_array.len();
            neighbor_array.extend(draft.successors.iter().map(|&s| BlockIndex::new(s as u32)));
            block.successors = succ_start..neighbor_array.len();

            block_array.push(block);
        }

        let function_array = self
            .functions
            .into_iter()
            .map(|r| FunctionRange {
                start: r.start,
                end: r.end,
            })
            .collect();

        Module {
            block_array,
            neighbor_array,
            function_array,
        }
    }
}
