use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::geometry::Side;
use crate::moves::SequenceId;

/// Which re-solving gadget the subgame is currently embedded in. See
/// `SPEC_FULL.md` §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GadgetMode {
    /// The opponent may opt out of the subgame for her prior equilibrium
    /// value; unsafe once she has committed to entering.
    Resolve,
    /// Plain subgame solving maximizing the minimum margin, used once
    /// Resolve has been entered, to stabilize the last iterate.
    Maxmargin,
}

/// Tracks the one-shot Resolve -> Maxmargin latch and the per-infoset
/// alternative ("opt out") values for a single subgame's lifetime.
pub struct Gadget {
    entered: AtomicBool,
    epsilon: f32,
    /// Prior equilibrium value `v*`, keyed by entry infoset, supplied by
    /// the planner from the previous solve (or the evaluator's heuristic
    /// on the very first move). See `SPEC_FULL.md` §4.4 resolution.
    prior_equilibrium: HashMap<SequenceId, f32>,
}

impl Gadget {
    pub fn new(epsilon: f32, prior_equilibrium: HashMap<SequenceId, f32>) -> Self {
        Self {
            entered: AtomicBool::new(false),
            epsilon,
            prior_equilibrium,
        }
    }

    pub fn mode(&self) -> GadgetMode {
        if self.entered.load(Ordering::Acquire) {
            GadgetMode::Maxmargin
        } else {
            GadgetMode::Resolve
        }
    }

    /// Whether `depth`/`player` identifies a subgame entry infoset: depth
    /// 1, opponent of the root's acting player to move.
    pub fn is_entry_infoset(depth: u32, player: Side, root_player: Side) -> bool {
        depth == 1 && player == root_player.opponent()
    }

    /// Observes the opponent's opt-out probability mass at an entry
    /// infoset during a CFR iteration; latches `entered` once that mass
    /// falls below `epsilon` (she has effectively committed to the
    /// subgame line). Monotone: once latched, stays latched.
    pub fn observe_entry_probability(&self, opt_out_probability: f32) {
        if opt_out_probability < self.epsilon {
            self.entered.store(true, Ordering::Release);
        }
    }

    pub fn has_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }

    /// `v_alt(I) = min(heuristic(I), v*(I))`, falling back to
    /// `heuristic(I)` when there is no prior entry (first move of a
    /// game).
    pub fn alternative_value(&self, infoset: SequenceId, heuristic: f32) -> f32 {
        match self.prior_equilibrium.get(&infoset) {
            Some(&v_star) => heuristic.min(v_star),
            None => heuristic,
        }
    }
}
