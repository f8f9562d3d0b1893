use crate::moves::Move;
use crate::rules::Rules;

/// The positional evaluator: scores every legal child of a position from
/// the perspective of the side to move. Implemented outside this crate.
pub trait Evaluator<R: Rules>: Send + Sync {
    /// Returns one `(move, value)` pair per legal move, `value` in
    /// `[-1, +1]`. An empty vector for a non-terminal position is a soft
    /// failure handled by the caller (see [`crate::error::PlannerError::EvaluatorFailed`]).
    fn score_children(&self, position: &R::Position) -> Vec<(Move, f32)>;

    /// A single scalar estimate of `position`, from the side-to-move's
    /// perspective. Used by [`crate::cfr::CFRSolver`] as the
    /// `heuristic_eval(state)` term of the Resolve gadget's alternative
    /// value `v_alt = min(heuristic_eval(state), v*)` (`SPEC_FULL.md` §4.4).
    fn score_position(&self, position: &R::Position) -> f32;
}
