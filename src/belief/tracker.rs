use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::geometry::Variant;
use crate::observation::ObservationHistory;
use crate::rules::Rules;
use crate::visibility;

use super::BeliefState;

/// Maintains the set of positions consistent with an [`ObservationHistory`]
/// and samples a subset to seed a subgame. See `SPEC_FULL.md` §4.2.
pub struct BeliefTracker<R: Rules> {
    variant: Variant,
    enumeration_cap: usize,
    state: BeliefState<R>,
}

impl<R: Rules> BeliefTracker<R> {
    pub fn new(variant: Variant, enumeration_cap: usize, seed: R::Position) -> Self {
        Self {
            variant,
            enumeration_cap,
            state: BeliefState::new(vec![seed]),
        }
    }

    pub fn state(&self) -> &BeliefState<R> {
        &self.state
    }

    /// Removes every candidate inconsistent with the latest observation.
    /// Never adds states back: the result is always a subset of the
    /// current belief set.
    pub fn incremental_filter(&mut self, rules: &R, history: &ObservationHistory) {
        let Some(latest) = history.latest() else { return };
        self.state.retain(|candidate| {
            let derived = visibility::observe(rules, candidate, self.variant);
            derived.side_to_move == latest.side_to_move
                && derived.own_pieces == latest.own_pieces
                && derived.seen_opponent_pieces == latest.seen_opponent_pieces
                && derived.known_empty().intersection(latest.own_pieces.union(latest.seen_opponent_pieces)).is_empty()
        });
    }

    /// Rebuilds the belief set from scratch using `generator` as a bounded
    /// source of raw candidate positions (e.g. all placements of unseen
    /// opponent pieces over unseen squares respecting piece counts). Only
    /// up to `enumeration_cap` candidates are drawn from `generator`
    /// before filtering through the full history; if the cap is exhausted
    /// without ever finding a consistent candidate other than
    /// `fallback_true_position`, the belief set degrades to that single
    /// known-true state.
    pub fn rebuild_from_scratch<G>(
        &mut self,
        rules: &R,
        history: &ObservationHistory,
        fallback_true_position: R::Position,
        mut generator: G,
    ) where
        G: FnMut() -> Option<R::Position>,
    {
        let mut consistent = Vec::new();
        let mut drawn = 0usize;
        while drawn < self.enumeration_cap {
            match generator() {
                Some(candidate) => {
                    drawn += 1;
                    if history.iter().all(|obs| {
                        let derived = visibility::observe(rules, &candidate, self.variant);
                        derived.side_to_move == obs.side_to_move
                            && derived.own_pieces == obs.own_pieces
                            && derived.seen_opponent_pieces == obs.seen_opponent_pieces
                    }) {
                        consistent.push(candidate);
                    }
                }
                None => break,
            }
        }
        if consistent.is_empty() {
            consistent.push(fallback_true_position);
        }
        self.state = BeliefState::new(consistent);
    }

    /// Draws `min(k, |P|)` states uniformly without replacement, using a
    /// deterministic RNG seeded by `seed` so search is reproducible.
    pub fn sample(&self, k: usize, seed: u64) -> Vec<R::Position>
    where
        R::Position: Clone,
    {
        let all = self.state.as_slice();
        if all.len() <= k {
            return all.to_vec();
        }
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut indices: Vec<usize> = (0..all.len()).collect();
        let (chosen, _) = indices.partial_shuffle(&mut rng, k);
        chosen.iter().map(|&i| all[i].clone()).collect()
    }
}
