use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque counters describing one `plan_move` search. Printed by the host
/// in any convenient key-value format; not a wire protocol. See
/// `SPEC_FULL.md` §6.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SearchStatistics {
    pub nodes: u64,
    pub infosets: u64,
    pub belief_size: u64,
    pub avg_depth: f32,
    pub cfr_iterations: u64,
    pub expansions: u64,
    pub elapsed_ms: u64,
}

impl std::fmt::Display for SearchStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "nodes={} infosets={} belief_size={} avg_depth={:.2} cfr_iterations={} expansions={} elapsed_ms={}",
            self.nodes, self.infosets, self.belief_size, self.avg_depth, self.cfr_iterations, self.expansions, self.elapsed_ms
        )
    }
}

/// Shared, lock-free accumulators that workers bump during a search; read
/// out into a [`SearchStatistics`] snapshot once the search has stopped.
/// Grounded on the teacher's atomic-counter worker idiom.
pub struct Counters {
    pub expansions: std::sync::Arc<AtomicU64>,
    pub iterations: std::sync::Arc<AtomicU64>,
}

impl Counters {
    pub fn new() -> Self {
        Self {
            expansions: std::sync::Arc::new(AtomicU64::new(0)),
            iterations: std::sync::Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn expansions(&self) -> u64 {
        self.expansions.load(Ordering::Relaxed)
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}
