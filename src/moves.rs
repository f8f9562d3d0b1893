use std::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;

use crate::geometry::{PieceKind, Square};

/// A single chess move, agnostic of which side is to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
    pub is_en_passant: bool,
    pub is_castle: bool,
}

impl Move {
    pub fn quiet(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
            is_en_passant: false,
            is_castle: false,
        }
    }
}

/// A rolling-hash fingerprint of one player's move sequence, used as the
/// information-set key: under the perfect-opponent-observer assumption an
/// infoset is uniquely determined by the acting player's own sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct SequenceId(pub u64);

impl SequenceId {
    pub const ROOT: Self = Self(0);

    /// Extends this sequence with one more move, producing a new id that is
    /// distinct from `self` with overwhelming probability.
    pub fn extend(self, mv: Move) -> Self {
        let mut hasher = DefaultHasher::new();
        self.0.hash(&mut hasher);
        mv.hash(&mut hasher);
        SequenceId(hasher.finish())
    }
}
