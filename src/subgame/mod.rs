mod arena;
mod gadget;
mod infoset;

pub use arena::{Arena, GameTreeNode, NodeId};
pub use gadget::{Gadget, GadgetMode};
pub use infoset::InfosetNode;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{PlannerError, Result};
use crate::geometry::{Side, Variant};
use crate::moves::SequenceId;
use crate::rules::Rules;

/// Owns one depth-limited, append-only game tree plus its information-set
/// table and active re-solving gadget. Constructed fresh for each
/// `plan_move` call and discarded at its end; shared by every worker
/// thread for the duration of one search via `Arc<Subgame<R>>`.
pub struct Subgame<R: Rules> {
    pub rules: Arc<R>,
    pub variant: Variant,
    pub root_player: Side,
    arena: RwLock<Arena<R::Position>>,
    infosets: RwLock<HashMap<SequenceId, Arc<InfosetNode>>>,
    /// Serializes the whole select -> expand -> publish sequence across
    /// Expander threads (§4.5, §5).
    pub expansion_lock: Mutex<()>,
    pub gadget: Gadget,
}

impl<R: Rules> Subgame<R> {
    pub fn construct(
        rules: Arc<R>,
        variant: Variant,
        samples: Vec<R::Position>,
        resolve_entry_epsilon: f32,
        prior_equilibrium: HashMap<SequenceId, f32>,
    ) -> Result<Self> {
        let representative = samples
            .into_iter()
            .next()
            .ok_or_else(|| PlannerError::ConfigInvalid("no belief samples to seed subgame".into()))?;
        let root_player = rules.side_to_move(&representative);
        let position_key = rules.position_key(&representative);
        let root = GameTreeNode {
            id: 0,
            parent: None,
            children: vec![],
            position: representative,
            position_key,
            own_sequence: SequenceId::ROOT,
            opp_sequence: SequenceId::ROOT,
            depth: 0,
            in_kluss: true,
            terminal: false,
            terminal_value: 0.0,
            expanded: false,
            heuristic_value: 0.0,
            incoming_move: None,
        };
        let mut infosets = HashMap::new();
        infosets.insert(SequenceId::ROOT, Arc::new(InfosetNode::new(root_player)));
        Ok(Self {
            rules,
            variant,
            root_player,
            arena: RwLock::new(Arena::new(root)),
            infosets: RwLock::new(infosets),
            expansion_lock: Mutex::new(()),
            gadget: Gadget::new(resolve_entry_epsilon, prior_equilibrium),
        })
    }

    pub fn root_id(&self) -> NodeId {
        0
    }

    pub fn node_count(&self) -> usize {
        self.arena.read().expect("arena poisoned").len()
    }

    pub fn infoset_count(&self) -> usize {
        self.infosets.read().expect("infosets poisoned").len()
    }

    /// Mean `depth` across every node in the arena, for `SearchStatistics`.
    pub fn average_depth(&self) -> f32 {
        let arena = self.arena.read().expect("arena poisoned");
        let n = arena.len();
        if n == 0 {
            return 0.0;
        }
        let total: u64 = (0..n).map(|id| arena.get(id).depth as u64).sum();
        total as f32 / n as f32
    }

    pub fn with_node<F, T>(&self, id: NodeId, f: F) -> T
    where
        F: FnOnce(&GameTreeNode<R::Position>) -> T,
    {
        let arena = self.arena.read().expect("arena poisoned");
        f(arena.get(id))
    }

    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        self.arena.read().expect("arena poisoned").get(id).children.clone()
    }

    pub fn sequence_key_of(&self, id: NodeId) -> SequenceId {
        self.with_node(id, |n| {
            let player = self.rules.side_to_move(&n.position);
            if player == self.root_player {
                n.own_sequence
            } else {
                n.opp_sequence
            }
        })
    }

    pub fn get_or_create_infoset(&self, key: SequenceId, player: Side) -> Arc<InfosetNode> {
        if let Some(existing) = self.infosets.read().expect("infosets poisoned").get(&key) {
            return existing.clone();
        }
        let mut write = self.infosets.write().expect("infosets poisoned");
        write
            .entry(key)
            .or_insert_with(|| Arc::new(InfosetNode::new(player)))
            .clone()
    }

    pub fn infoset_if_present(&self, key: SequenceId) -> Option<Arc<InfosetNode>> {
        self.infosets.read().expect("infosets poisoned").get(&key).cloned()
    }

    /// Expands `leaf` in place: generates children via `Rules`, scores
    /// them via `Evaluator`, and publishes the leaf's infoset. No-op if
    /// `leaf` is already terminal or expanded. Caller must hold
    /// `expansion_lock` (§4.5 step 1).
    pub fn expand_node<E>(&self, leaf: NodeId, evaluator: &E) -> Result<()>
    where
        E: crate::evaluator::Evaluator<R>,
    {
        let (already_done, position, depth, own_seq, opp_seq, in_check) = self.with_node(leaf, |n| {
            (
                n.terminal || n.expanded,
                n.position.clone(),
                n.depth,
                n.own_sequence,
                n.opp_sequence,
                false,
            )
        });
        if already_done {
            return Ok(());
        }
        let _ = in_check;

        let player = self.rules.side_to_move(&position);
        let legal = self.rules.legal_moves(&position);

        if legal.is_empty() {
            // Raw value is from the mover's perspective (the side with no
            // legal moves); stored canonically from White's perspective so
            // values combine consistently across alternating movers.
            let raw = if self.rules.in_check(&position) { -1.0 } else { 0.0 };
            let value = if player == Side::White { raw } else { -raw };
            let mut arena = self.arena.write().expect("arena poisoned");
            let node = arena.get_mut(leaf);
            node.terminal = true;
            node.terminal_value = value;
            node.expanded = true;
            return Ok(());
        }

        let scored = evaluator.score_children(&position);
        if scored.is_empty() {
            // Soft failure: treat as a terminal with neutral value rather
            // than propagating a hard error out of a worker thread.
            let mut arena = self.arena.write().expect("arena poisoned");
            let node = arena.get_mut(leaf);
            node.terminal = true;
            node.terminal_value = 0.0;
            node.expanded = true;
            log::warn!("evaluator returned no scored children at depth {depth}; treating as terminal");
            return Ok(());
        }

        let child_in_kluss = depth + 1 <= 1;
        let mut child_ids = Vec::with_capacity(scored.len());
        {
            let mut arena = self.arena.write().expect("arena poisoned");
            for &(mv, v) in &scored {
                let child_position = self.rules.apply(&position, mv)?;
                let child_key = self.rules.position_key(&child_position);
                let (child_own, child_opp) = if player == self.root_player {
                    (own_seq.extend(mv), opp_seq)
                } else {
                    (own_seq, opp_seq.extend(mv))
                };
                // `v` is from the mover's (leaf player's) perspective;
                // cache canonically from White's perspective.
                let heuristic_value = if player == Side::White { v } else { -v };
                let child = GameTreeNode {
                    id: 0,
                    parent: Some(leaf),
                    children: vec![],
                    position: child_position,
                    position_key: child_key,
                    own_sequence: child_own,
                    opp_sequence: child_opp,
                    depth: depth + 1,
                    in_kluss: child_in_kluss,
                    terminal: false,
                    terminal_value: 0.0,
                    expanded: false,
                    heuristic_value,
                    incoming_move: Some(mv),
                };
                let id = arena.insert(child);
                arena.push_child(leaf, id);
                child_ids.push(id);
            }
        }
        let _ = child_ids;

        let leaf_key = if player == self.root_player { own_seq } else { opp_seq };
        let infoset = self.get_or_create_infoset(leaf_key, player);
        infoset.initialize(&scored);

        let mut arena = self.arena.write().expect("arena poisoned");
        arena.get_mut(leaf).expanded = true;
        Ok(())
    }
}
