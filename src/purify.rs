use rand::Rng;

use crate::subgame::{GadgetMode, InfosetNode};

/// A purified mixed strategy over a fixed, implicit action index space:
/// `weights[a]` sums to 1 and is zero outside the retained support. See
/// `SPEC_FULL.md` §4.8.
#[derive(Debug, Clone)]
pub struct PurifiedStrategy {
    weights: Vec<f32>,
}

impl PurifiedStrategy {
    pub fn weight(&self, a: usize) -> f32 {
        self.weights[a]
    }

    pub fn support(&self) -> impl Iterator<Item = usize> + '_ {
        self.weights
            .iter()
            .enumerate()
            .filter(|(_, &w)| w > 0.0)
            .map(|(a, _)| a)
    }

    pub fn is_deterministic(&self) -> bool {
        self.support().count() <= 1
    }

    pub fn argmax(&self) -> usize {
        self.weights
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(a, _)| a)
            .unwrap_or(0)
    }

    /// Samples an action index from the purified distribution using `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let roll: f32 = rng.random();
        let mut cumulative = 0.0;
        for (a, &w) in self.weights.iter().enumerate() {
            cumulative += w;
            if roll <= cumulative {
                return a;
            }
        }
        self.argmax()
    }
}

/// Purifies the root strategy of `infoset` per `SPEC_FULL.md` §4.8.
///
/// `gadget_mode == Resolve` always collapses to a one-hot distribution at
/// the argmax of the current strategy (deterministic play in Resolve,
/// §4.7 step 8). Otherwise the top `max_support` actions by strategy
/// weight are kept among those with positive strategy mass and a
/// non-negative margin `Q(I,a) - max_a' Q(I,a')`; if none qualify, the
/// original support is used uniformly.
pub fn purify(infoset: &InfosetNode, gadget_mode: GadgetMode, max_support: usize) -> PurifiedStrategy {
    let n = infoset.num_actions();
    if n == 0 {
        return PurifiedStrategy { weights: vec![] };
    }

    if gadget_mode == GadgetMode::Resolve {
        let best = (0..n)
            .max_by(|&a, &b| infoset.strategy(a).partial_cmp(&infoset.strategy(b)).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or(0);
        let mut weights = vec![0.0; n];
        weights[best] = 1.0;
        return PurifiedStrategy { weights };
    }

    let best_q = (0..n).map(|a| infoset.q_value(a)).fold(f32::NEG_INFINITY, f32::max);
    let margin = |a: usize| infoset.q_value(a) - best_q;

    let mut candidates: Vec<usize> = (0..n)
        .filter(|&a| infoset.strategy(a) > 0.0 && margin(a) >= 0.0)
        .collect();

    if candidates.is_empty() {
        candidates = (0..n).filter(|&a| infoset.strategy(a) > 0.0).collect();
        if candidates.is_empty() {
            candidates = (0..n).collect();
        }
        let uniform = 1.0 / candidates.len() as f32;
        let mut weights = vec![0.0; n];
        for &a in &candidates {
            weights[a] = uniform;
        }
        return PurifiedStrategy { weights };
    }

    candidates.sort_by(|&a, &b| infoset.strategy(b).partial_cmp(&infoset.strategy(a)).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(max_support.max(1));

    let total: f32 = candidates.iter().map(|&a| infoset.strategy(a)).sum();
    let mut weights = vec![0.0; n];
    if total > 0.0 {
        for &a in &candidates {
            weights[a] = infoset.strategy(a) / total;
        }
    } else {
        let uniform = 1.0 / candidates.len() as f32;
        for &a in &candidates {
            weights[a] = uniform;
        }
    }
    PurifiedStrategy { weights }
}
