use crate::geometry::{PieceKind, Side, SquareSet, Variant};
use crate::observation::Observation;
use crate::rules::Rules;

/// Computes the side-to-move's [`Observation`] of `position`, built only
/// from the `Rules` primitives: attack queries, piece location queries, and
/// legal move generation. See `SPEC_FULL.md` §4.1.
pub fn observe<R: Rules>(
    rules: &R,
    position: &R::Position,
    variant: Variant,
) -> Observation {
    let side = rules.side_to_move(position);
    let opponent = side.opponent();

    let own_pawns = rules.pieces_of(position, side, PieceKind::Pawn);
    let own_non_pawns = all_kinds()
        .into_iter()
        .filter(|k| *k != PieceKind::Pawn)
        .fold(SquareSet::EMPTY, |acc, k| {
            acc.union(rules.pieces_of(position, side, k))
        });
    let own_pieces = own_pawns.union(own_non_pawns);

    let board = rules.board_squares(variant);

    // Pawn diagonal attacks are visible regardless of occupancy.
    let pawn_diagonal_visibility: SquareSet = board
        .iter()
        .filter(|&sq| !rules.attacks_to(position, sq, side).intersection(own_pawns).is_empty())
        .collect();

    // Push/double-push/en-passant destinations: read straight off legal
    // pawn moves, which already encodes "both push squares empty" and
    // "blocked pawns do not reveal their blocker" for free.
    let pawn_move_destinations: SquareSet = rules
        .legal_moves(position)
        .into_iter()
        .filter(|mv| own_pawns.contains(mv.from) && !is_capture(rules, position, side, *mv))
        .map(|mv| mv.to)
        .collect();

    let mut en_passant_targets = SquareSet::EMPTY;
    for mv in rules.legal_moves(position) {
        if mv.is_en_passant && own_pawns.contains(mv.from) {
            en_passant_targets.insert(mv.to);
        }
    }

    let v_piece: SquareSet = board
        .iter()
        .filter(|&sq| !rules.attacks_to(position, sq, side).intersection(own_non_pawns).is_empty())
        .collect();

    let visible_squares = own_pieces
        .union(pawn_diagonal_visibility)
        .union(pawn_move_destinations)
        .union(en_passant_targets)
        .union(v_piece);

    let opponent_pieces = all_kinds()
        .into_iter()
        .fold(SquareSet::EMPTY, |acc, k| acc.union(rules.pieces_of(position, opponent, k)));
    let seen_opponent_pieces = visible_squares.intersection(opponent_pieces);

    Observation {
        side_to_move: side,
        visible_squares,
        own_pieces,
        seen_opponent_pieces,
        en_passant_targets,
        own_castling_rights: Default::default(),
        halfmove_clock: 0,
        fullmove_number: 1,
    }
}

fn is_capture<R: Rules>(rules: &R, position: &R::Position, side: Side, mv: crate::moves::Move) -> bool {
    if mv.is_en_passant {
        return true;
    }
    all_kinds()
        .into_iter()
        .any(|k| rules.pieces_of(position, side.opponent(), k).contains(mv.to))
}

fn all_kinds() -> [PieceKind; 6] {
    [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Square;
    use crate::moves::Move;
    use std::collections::HashMap;

    /// A minimal synthetic `Rules` double used only to exercise visibility
    /// in isolation, not a real chess engine.
    struct ToyRules {
        pieces: HashMap<(Side, PieceKind), SquareSet>,
        side: Side,
        moves: Vec<Move>,
        attackers: HashMap<u8, SquareSet>,
    }

    impl Rules for ToyRules {
        type Position = ();

        fn parse(&self, _: &str, _: Variant) -> crate::error::Result<Self::Position> {
            Ok(())
        }
        fn serialize(&self, _: &Self::Position) -> String {
            String::new()
        }
        fn position_key(&self, _: &Self::Position) -> u128 {
            0
        }
        fn legal_moves(&self, _: &Self::Position) -> Vec<Move> {
            self.moves.clone()
        }
        fn apply(&self, _: &Self::Position, _: Move) -> crate::error::Result<Self::Position> {
            Ok(())
        }
        fn side_to_move(&self, _: &Self::Position) -> Side {
            self.side
        }
        fn in_check(&self, _: &Self::Position) -> bool {
            false
        }
        fn attacks_to(&self, _: &Self::Position, square: Square, _color: Side) -> SquareSet {
            self.attackers.get(&square.0).copied().unwrap_or(SquareSet::EMPTY)
        }
        fn pieces_of(&self, _: &Self::Position, color: Side, kind: PieceKind) -> SquareSet {
            self.pieces.get(&(color, kind)).copied().unwrap_or(SquareSet::EMPTY)
        }
        fn board_squares(&self, _: Variant) -> SquareSet {
            (0..64u8).map(Square::new).collect()
        }
    }

    #[test]
    fn own_pieces_always_visible() {
        let mut pieces = HashMap::new();
        let own_king: SquareSet = [Square::new(4)].into_iter().collect();
        pieces.insert((Side::White, PieceKind::King), own_king);
        let rules = ToyRules {
            pieces,
            side: Side::White,
            moves: vec![],
            attackers: HashMap::new(),
        };
        let obs = observe(&rules, &(), Variant::Classic);
        assert!(obs.visible_squares.contains(Square::new(4)));
    }

    #[test]
    fn blocked_pawn_push_not_visible() {
        // No legal push move is generated (blocked), so the destination
        // square must not appear in visible_squares via the pawn path.
        let mut pieces = HashMap::new();
        let own_pawn: SquareSet = [Square::new(8)].into_iter().collect(); // a2
        pieces.insert((Side::White, PieceKind::Pawn), own_pawn);
        let rules = ToyRules {
            pieces,
            side: Side::White,
            moves: vec![], // blocked: no push available
            attackers: HashMap::new(),
        };
        let obs = observe(&rules, &(), Variant::Classic);
        assert!(!obs.visible_squares.contains(Square::new(16))); // a3
    }

    #[test]
    fn unblocked_pawn_push_visible() {
        let mut pieces = HashMap::new();
        let own_pawn: SquareSet = [Square::new(8)].into_iter().collect();
        pieces.insert((Side::White, PieceKind::Pawn), own_pawn);
        let rules = ToyRules {
            pieces,
            side: Side::White,
            moves: vec![Move::quiet(Square::new(8), Square::new(16))],
            attackers: HashMap::new(),
        };
        let obs = observe(&rules, &(), Variant::Classic);
        assert!(obs.visible_squares.contains(Square::new(16)));
    }

    #[test]
    fn seen_opponent_pieces_subset_of_visible() {
        let mut pieces = HashMap::new();
        pieces.insert((Side::White, PieceKind::Rook), [Square::new(0)].into_iter().collect::<SquareSet>());
        pieces.insert((Side::Black, PieceKind::Pawn), [Square::new(8)].into_iter().collect::<SquareSet>());
        let mut attackers = HashMap::new();
        attackers.insert(8u8, [Square::new(0)].into_iter().collect::<SquareSet>());
        let rules = ToyRules {
            pieces,
            side: Side::White,
            moves: vec![],
            attackers,
        };
        let obs = observe(&rules, &(), Variant::Classic);
        for sq in obs.seen_opponent_pieces.iter() {
            assert!(obs.visible_squares.contains(sq));
        }
    }
}
