use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::geometry::Side;
use crate::moves::Move;

fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Acquire))
}

fn store_f32(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Release)
}

/// One information set, keyed externally by [`crate::moves::SequenceId`].
///
/// Vectors are published exactly once, at expansion, via a [`OnceLock`];
/// every field is then sized identically to `actions`. After publication,
/// only the CFR solver mutates the per-action atomics, so readers never
/// observe a torn write across fields — the `OnceLock`'s acquire/release
/// pair gives the "expanded implies all vectors visible" ordering
/// `SPEC_FULL.md` §5 requires without hand-rolled fences.
pub struct InfosetNode {
    pub player: Side,
    data: OnceLock<InfosetData>,
    total_visits: AtomicU64,
    value: AtomicU32,
    expanded: AtomicBool,
}

struct InfosetData {
    actions: Vec<Move>,
    regret: Vec<AtomicU32>,
    strategy: Vec<AtomicU32>,
    cumulative_strategy: Vec<AtomicU32>,
    visit_count: Vec<AtomicU64>,
    q_value: Vec<AtomicU32>,
    variance: Vec<AtomicU32>,
}

impl InfosetNode {
    pub fn new(player: Side) -> Self {
        Self {
            player,
            data: OnceLock::new(),
            total_visits: AtomicU64::new(0),
            value: AtomicU32::new(0f32.to_bits()),
            expanded: AtomicBool::new(false),
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded.load(Ordering::Acquire)
    }

    /// Initializes this infoset's per-action vectors from a scored child
    /// list (§4.5 step 6-8). A no-op if already expanded.
    pub fn initialize(&self, scored: &[(Move, f32)]) {
        if self.is_expanded() {
            return;
        }
        let n = scored.len();
        let actions: Vec<Move> = scored.iter().map(|(m, _)| *m).collect();
        let q_value: Vec<AtomicU32> = scored.iter().map(|(_, v)| AtomicU32::new(v.to_bits())).collect();
        let variance: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(2.0f32.to_bits())).collect();
        let regret: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(0f32.to_bits())).collect();
        let cumulative_strategy: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(0f32.to_bits())).collect();
        let visit_count: Vec<AtomicU64> = (0..n).map(|_| AtomicU64::new(0)).collect();

        // Seed the strategy at the evaluator's greedy policy.
        let best = scored
            .iter()
            .enumerate()
            .max_by(|a, b| a.1 .1.partial_cmp(&b.1 .1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let strategy: Vec<AtomicU32> = (0..n)
            .map(|i| AtomicU32::new(if i == best { 1.0f32.to_bits() } else { 0.0f32.to_bits() }))
            .collect();

        let data = InfosetData {
            actions,
            regret,
            strategy,
            cumulative_strategy,
            visit_count,
            q_value,
            variance,
        };
        // Only one writer ever calls initialize for a given infoset (the
        // Expander, exactly once per leaf); set() failing just means a
        // racing duplicate expansion lost, which is fine, it's idempotent.
        let _ = self.data.set(data);
        self.expanded.store(true, Ordering::Release);
    }

    fn data(&self) -> &InfosetData {
        self.data.get().expect("infoset accessed before expansion")
    }

    pub fn num_actions(&self) -> usize {
        self.data().actions.len()
    }

    pub fn actions(&self) -> &[Move] {
        &self.data().actions
    }

    pub fn regret(&self, a: usize) -> f32 {
        load_f32(&self.data().regret[a])
    }

    pub fn set_regret(&self, a: usize, v: f32) {
        store_f32(&self.data().regret[a], v)
    }

    pub fn strategy(&self, a: usize) -> f32 {
        load_f32(&self.data().strategy[a])
    }

    pub fn set_strategy(&self, a: usize, v: f32) {
        store_f32(&self.data().strategy[a], v)
    }

    pub fn cumulative_strategy(&self, a: usize) -> f32 {
        load_f32(&self.data().cumulative_strategy[a])
    }

    pub fn add_cumulative_strategy(&self, a: usize, delta: f32) {
        let cell = &self.data().cumulative_strategy[a];
        store_f32(cell, load_f32(cell) + delta);
    }

    pub fn set_cumulative_strategy(&self, a: usize, v: f32) {
        store_f32(&self.data().cumulative_strategy[a], v)
    }

    pub fn q_value(&self, a: usize) -> f32 {
        load_f32(&self.data().q_value[a])
    }

    pub fn set_q_value(&self, a: usize, v: f32) {
        store_f32(&self.data().q_value[a], v)
    }

    pub fn variance(&self, a: usize) -> f32 {
        load_f32(&self.data().variance[a])
    }

    pub fn visit_count(&self, a: usize) -> u64 {
        self.data().visit_count[a].load(Ordering::Acquire)
    }

    pub fn inc_visit_count(&self, a: usize) {
        self.data().visit_count[a].fetch_add(1, Ordering::AcqRel);
        self.total_visits.fetch_add(1, Ordering::AcqRel);
    }

    pub fn total_visits(&self) -> u64 {
        self.total_visits.load(Ordering::Acquire)
    }

    pub fn value(&self) -> f32 {
        load_f32(&self.value)
    }

    pub fn set_value(&self, v: f32) {
        store_f32(&self.value, v)
    }
}
