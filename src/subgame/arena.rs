use crate::moves::{Move, SequenceId};

pub type NodeId = usize;

/// One concrete position reached by some `(own_sequence, opp_sequence)`
/// pair. Owned by an [`Arena`]; children are referenced by index, parents
/// by a non-owning back-index (see `SPEC_FULL.md` §9's note on arenas for
/// languages without checked non-owning references).
pub struct GameTreeNode<P> {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub position: P,
    pub position_key: u128,
    pub own_sequence: SequenceId,
    pub opp_sequence: SequenceId,
    pub depth: u32,
    pub in_kluss: bool,
    pub terminal: bool,
    pub terminal_value: f32,
    pub expanded: bool,
    /// The evaluator's score of the move that created this node, cached so
    /// a frozen (not in-KLUSS, or not-yet-expanded) node still has a value
    /// to propagate without recursing further.
    pub heuristic_value: f32,
    pub incoming_move: Option<Move>,
}

/// Append-only arena of [`GameTreeNode`]s for one subgame's lifetime.
/// Growth-only: nodes are created but never moved or freed until the
/// arena itself is dropped, matching the monotone-tree-growth contract of
/// `SPEC_FULL.md` §5.
pub struct Arena<P> {
    nodes: Vec<GameTreeNode<P>>,
}

impl<P> Arena<P> {
    pub fn new(root: GameTreeNode<P>) -> Self {
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> &GameTreeNode<P> {
        &self.nodes[0]
    }

    pub fn get(&self, id: NodeId) -> &GameTreeNode<P> {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a new child of `parent`, returning its id. Caller is
    /// responsible for wiring `children` on the parent via
    /// [`Arena::push_child`].
    pub fn insert(&mut self, mut node: GameTreeNode<P>) -> NodeId {
        let id = self.nodes.len();
        node.id = id;
        self.nodes.push(node);
        id
    }

    pub fn push_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].children.push(child);
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut GameTreeNode<P> {
        &mut self.nodes[id]
    }
}
