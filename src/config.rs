use crate::error::{PlannerError, Result};

/// Tunable parameters for one [`crate::planner::Planner`].
///
/// Mirrors the teacher's preference for a plain struct with a `Default`
/// impl over a builder macro (see `mccfr::Discount::default()`).
#[derive(Debug, Clone)]
pub struct Config {
    pub min_infoset_size: usize,
    pub num_expander_threads: usize,
    pub num_solver_threads: usize,
    pub puct_constant: f32,
    pub max_support: usize,
    pub max_time_ms: u64,
    pub enable_incremental_belief: bool,
    pub belief_enumeration_cap: usize,
    pub resolve_entry_epsilon: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_infoset_size: 256,
            num_expander_threads: 2,
            num_solver_threads: 1,
            puct_constant: 1.0,
            max_support: 3,
            max_time_ms: 5_000,
            enable_incremental_belief: false,
            belief_enumeration_cap: 20_000,
            resolve_entry_epsilon: 0.05,
        }
    }
}

impl Config {
    pub fn validated(self) -> Result<Self> {
        if self.num_expander_threads == 0 {
            return Err(PlannerError::ConfigInvalid(
                "num_expander_threads must be >= 1".into(),
            ));
        }
        if self.num_solver_threads == 0 {
            return Err(PlannerError::ConfigInvalid(
                "num_solver_threads must be >= 1".into(),
            ));
        }
        if self.max_support == 0 {
            return Err(PlannerError::ConfigInvalid("max_support must be >= 1".into()));
        }
        if self.min_infoset_size == 0 {
            return Err(PlannerError::ConfigInvalid(
                "min_infoset_size must be >= 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.resolve_entry_epsilon) {
            return Err(PlannerError::ConfigInvalid(
                "resolve_entry_epsilon must be in [0, 1]".into(),
            ));
        }
        Ok(self)
    }
}
