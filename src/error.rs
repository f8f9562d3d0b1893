use crate::moves::SequenceId;

/// Errors surfaced by the planner and its workers.
///
/// No internal operation panics; every fallible path returns one of these
/// variants and is logged by the caller rather than unwound.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("belief filter emptied the consistent set; falling back to the true position")]
    ObservationInconsistent,

    #[error("root infoset {0:?} has no legal actions")]
    RootHasNoActions(SequenceId),

    #[error("evaluator returned no scored children for a non-terminal position")]
    EvaluatorFailed,

    #[error("search deadline elapsed before a single CFR iteration completed")]
    DeadlineReachedBeforeFirstIteration,

    #[error("rules engine failure: {0}")]
    RulesFailure(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
