use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::evaluator::Evaluator;
use crate::geometry::Side;
use crate::rules::Rules;
use crate::subgame::{NodeId, Subgame};

/// Grows the subgame tree by descending via PUCT at the exploring side's
/// nodes and via the current strategy at the other side's nodes, then
/// expanding the first unexpanded leaf reached. See `SPEC_FULL.md` §4.5.
pub struct Expander<R: Rules, E: Evaluator<R>> {
    subgame: Arc<Subgame<R>>,
    evaluator: Arc<E>,
    puct_constant: f32,
    running: Arc<AtomicBool>,
    exploring_side: AtomicBool, // true = White
    expansions: Arc<AtomicU64>,
    seed: u64,
}

impl<R: Rules, E: Evaluator<R>> Expander<R, E> {
    pub fn new(
        subgame: Arc<Subgame<R>>,
        evaluator: Arc<E>,
        puct_constant: f32,
        running: Arc<AtomicBool>,
        expansions: Arc<AtomicU64>,
        seed: u64,
    ) -> Self {
        Self {
            subgame,
            evaluator,
            puct_constant,
            running,
            exploring_side: AtomicBool::new(true),
            expansions,
            seed,
        }
    }

    pub fn run(&self) {
        let mut rng = SmallRng::seed_from_u64(self.seed);
        while self.running.load(Ordering::Acquire) {
            self.step(&mut rng);
        }
    }

    /// One expansion step (§4.5): descend, expand the first unexpanded
    /// leaf, toggle the exploring side.
    pub fn step(&self, rng: &mut SmallRng) {
        let _guard = self.subgame.expansion_lock.lock().expect("expansion lock poisoned");
        let leaf = self.descend(rng);
        let was_expanded = self.subgame.with_node(leaf, |n| n.expanded || n.terminal);
        if !was_expanded {
            if self.subgame.expand_node(leaf, self.evaluator.as_ref()).is_ok() {
                self.expansions.fetch_add(1, Ordering::Relaxed);
            }
        }
        let exploring = self.exploring_side.load(Ordering::Relaxed);
        self.exploring_side.store(!exploring, Ordering::Relaxed);
    }

    fn exploring(&self) -> Side {
        if self.exploring_side.load(Ordering::Acquire) {
            Side::White
        } else {
            Side::Black
        }
    }

    fn descend(&self, rng: &mut SmallRng) -> NodeId {
        let mut current = self.subgame.root_id();
        loop {
            let (terminal, expanded, children) = self.subgame.with_node(current, |n| {
                (n.terminal, n.expanded, n.children.clone())
            });
            if terminal || !expanded || children.is_empty() {
                return current;
            }
            let key = self.subgame.sequence_key_of(current);
            let player = self.subgame.with_node(current, |n| self.subgame.rules.side_to_move(&n.position));
            let Some(infoset) = self.subgame.infoset_if_present(key) else {
                return current;
            };
            let n = infoset.num_actions().min(children.len());
            if n == 0 {
                return current;
            }
            let chosen = if player == self.exploring() {
                self.puct_argmax(&infoset, n)
            } else {
                self.sample_from_strategy(&infoset, n, rng)
            };
            current = children[chosen];
        }
    }

    fn puct_argmax(&self, infoset: &crate::subgame::InfosetNode, n: usize) -> usize {
        let total_visits = infoset.total_visits().max(1) as f32;
        let mut best = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for a in 0..n {
            let q = infoset.q_value(a);
            let variance = infoset.variance(a).max(0.0);
            let visits = infoset.visit_count(a) as f32;
            let score = q + self.puct_constant * variance.sqrt() * total_visits.sqrt() / (1.0 + visits);
            if score > best_score {
                best_score = score;
                best = a;
            }
        }
        infoset.inc_visit_count(best);
        best
    }

    fn sample_from_strategy(&self, infoset: &crate::subgame::InfosetNode, n: usize, rng: &mut SmallRng) -> usize {
        use rand::Rng;
        let roll: f32 = rng.random::<f32>();
        let mut cumulative = 0.0;
        for a in 0..n {
            cumulative += infoset.strategy(a);
            if roll <= cumulative {
                return a;
            }
        }
        n - 1
    }
}
