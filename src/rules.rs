use crate::error::Result;
use crate::geometry::{PieceKind, Side, SquareSet, Variant};
use crate::moves::Move;

/// The chess rules engine: legal move generation, make/undo, hashing and
/// serialization, and the attack queries [`crate::visibility`] is built
/// from. Implemented outside this crate; injected into the [`crate::planner::Planner`].
pub trait Rules: Send + Sync {
    /// Opaque, cheaply cloneable handle to one live position.
    type Position: Clone + Send + Sync;

    fn parse(&self, encoded: &str, variant: Variant) -> Result<Self::Position>;
    fn serialize(&self, position: &Self::Position) -> String;
    fn position_key(&self, position: &Self::Position) -> u128;

    fn legal_moves(&self, position: &Self::Position) -> Vec<Move>;
    fn apply(&self, position: &Self::Position, mv: Move) -> Result<Self::Position>;

    fn side_to_move(&self, position: &Self::Position) -> Side;
    fn in_check(&self, position: &Self::Position) -> bool;

    /// Squares from which `color`'s pieces attack `square` (pawn diagonal
    /// attacks count regardless of whether `square` is occupied).
    fn attacks_to(&self, position: &Self::Position, square: crate::geometry::Square, color: Side) -> SquareSet;
    fn pieces_of(&self, position: &Self::Position, color: Side, kind: PieceKind) -> SquareSet;
    fn board_squares(&self, variant: Variant) -> SquareSet;
}
