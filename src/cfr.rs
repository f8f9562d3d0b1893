use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::evaluator::Evaluator;
use crate::geometry::Side;
use crate::rules::Rules;
use crate::subgame::{GadgetMode, NodeId, Subgame};

/// Predictive CFR+ discount schedule. Regrets are discounted before each
/// update (heavier discount early, approaching no discount as `t` grows);
/// the running average strategy is discounted symmetrically. Last-iterate
/// play never reads the averaged strategy back — it is retained purely
/// for diagnostics, matching `SPEC_FULL.md` §4.6's supplement.
#[derive(Debug, Clone, Copy)]
pub struct Discount {
    pub period: usize,
    pub alpha: f32,
    pub omega: f32,
    pub gamma: f32,
}

impl Discount {
    pub const fn default() -> &'static Self {
        &Self {
            period: 1,
            alpha: 1.5,
            omega: 0.5,
            gamma: 2.0,
        }
    }

    pub fn regret(&self, t: usize, regret: f32) -> f32 {
        if t == 0 || t % self.period != 0 {
            return regret;
        }
        let t = t as f32;
        if regret >= 0.0 {
            let c = t.powf(self.alpha) / (t.powf(self.alpha) + 1.0);
            regret * c
        } else {
            let c = t.powf(self.omega) / (t.powf(self.omega) + 1.0);
            regret * c
        }
    }

    pub fn policy(&self, t: usize) -> f32 {
        if t == 0 {
            return 1.0;
        }
        let t = t as f32;
        (t / (t + 1.0)).powf(self.gamma)
    }
}

/// Single-threaded, last-iterate traversal of the subgame under PRM+ with
/// PCFR+ discounting. See `SPEC_FULL.md` §4.6.
pub struct CFRSolver<R: Rules, E: Evaluator<R>> {
    subgame: Arc<Subgame<R>>,
    evaluator: Arc<E>,
    running: Arc<AtomicBool>,
    iterations: Arc<AtomicU64>,
    discount: Discount,
}

impl<R: Rules, E: Evaluator<R>> CFRSolver<R, E> {
    pub fn new(
        subgame: Arc<Subgame<R>>,
        evaluator: Arc<E>,
        running: Arc<AtomicBool>,
        iterations: Arc<AtomicU64>,
    ) -> Self {
        Self {
            subgame,
            evaluator,
            running,
            iterations,
            discount: *Discount::default(),
        }
    }

    pub fn run(&self) {
        while self.running.load(Ordering::Acquire) {
            self.iterate();
        }
    }

    /// One full CFR iteration: a gadget-mode check, then one traversal
    /// updating each player's regrets in turn (§4.6 steps 1-6).
    pub fn iterate(&self) {
        let t = self.iterations.load(Ordering::Relaxed) as usize + 1;
        let root = self.subgame.root_id();
        self.traverse(root, Side::White, 1.0, 1.0, t);
        self.traverse(root, Side::Black, 1.0, 1.0, t);
        self.iterations.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the node's value from White's canonical perspective.
    fn traverse(&self, node_id: NodeId, update_player: Side, reach_w: f32, reach_b: f32, t: usize) -> f32 {
        let (terminal, terminal_value, in_kluss, expanded, heuristic_value, position, depth, children) =
            self.subgame.with_node(node_id, |n| {
                (
                    n.terminal,
                    n.terminal_value,
                    n.in_kluss,
                    n.expanded,
                    n.heuristic_value,
                    n.position.clone(),
                    n.depth,
                    n.children.clone(),
                )
            });

        if terminal {
            return terminal_value;
        }
        if !in_kluss || !expanded || children.is_empty() {
            return heuristic_value;
        }

        let node_player = self.subgame.rules.side_to_move(&position);
        let key = self.subgame.sequence_key_of(node_id);
        let Some(infoset) = self.subgame.infoset_if_present(key) else {
            return heuristic_value;
        };
        let n = infoset.num_actions().min(children.len());
        if n == 0 {
            return heuristic_value;
        }

        recompute_strategy(&infoset, n);

        let root_player = self.subgame.root_player;
        let is_entry = crate::subgame::Gadget::is_entry_infoset(depth, node_player, root_player);
        let gadget_mode = self.subgame.gadget.mode();

        let mut action_values = vec![0.0f32; n];
        let mut node_value = 0.0f32;
        for a in 0..n {
            let p = infoset.strategy(a);
            let (next_w, next_b) = match node_player {
                Side::White => (reach_w * p, reach_b),
                Side::Black => (reach_w, reach_b * p),
            };
            let v = self.traverse(children[a], update_player, next_w, next_b, t);
            action_values[a] = v;
            node_value += p * v;
        }

        if gadget_mode == GadgetMode::Resolve && is_entry && node_player != root_player {
            // §4.4: v_alt = min(heuristic_eval(state), v*) — the state-level
            // heuristic is the evaluator's scalar position estimate, distinct
            // from the per-move `heuristic_value` cached for frozen KLUSS
            // leaves (which scores the incoming move, not this state).
            let raw = self.evaluator.score_position(&position);
            let heuristic = if node_player == Side::White { raw } else { -raw };
            let v_alt = self.subgame.gadget.alternative_value(key, heuristic);
            // the opponent may opt out for v_alt; track how much mass she
            // keeps on "staying in" vs opting out, to drive the latch.
            let stay_mass: f32 = infoset.strategy(action_values.iter().position(|&v| v >= node_value).unwrap_or(0));
            self.subgame.gadget.observe_entry_probability(1.0 - stay_mass);
            node_value = node_value.max(v_alt);
        }

        // from the update_player's canonical (White) perspective, the
        // node value as computed above is already canonical (children
        // return canonical values); translate to the value actually used
        // for regret relative to the update player.
        let value_for_update_player = node_value;

        if node_player == update_player {
            let opponent_reach = match update_player {
                Side::White => reach_b,
                Side::Black => reach_w,
            };
            let sign = if update_player == Side::White { 1.0 } else { -1.0 };
            for a in 0..n {
                let v_a = action_values[a] * sign;
                let v = value_for_update_player * sign;
                let instantaneous_regret = v_a - v;
                let discounted = self.discount.regret(t, infoset.regret(a));
                let updated = (discounted + opponent_reach * instantaneous_regret).max(0.0);
                infoset.set_regret(a, updated);

                let policy_decay = self.discount.policy(t);
                let own_reach = match update_player {
                    Side::White => reach_w,
                    Side::Black => reach_b,
                };
                let prev_cum = infoset.cumulative_strategy(a) * policy_decay;
                infoset.add_cumulative_strategy(a, prev_cum - infoset.cumulative_strategy(a) + own_reach * infoset.strategy(a));
            }
        }

        infoset.set_value(node_value);
        node_value
    }
}

/// Regret matching: `strategy[a] = max(0, regret[a]) / sum` or uniform if
/// the sum is zero (§4.6 step 5).
fn recompute_strategy(infoset: &crate::subgame::InfosetNode, n: usize) {
    let mut sum = 0.0f32;
    for a in 0..n {
        sum += infoset.regret(a).max(0.0);
    }
    if sum > 0.0 {
        for a in 0..n {
            infoset.set_strategy(a, infoset.regret(a).max(0.0) / sum);
        }
    } else {
        let uniform = 1.0 / n as f32;
        for a in 0..n {
            infoset.set_strategy(a, uniform);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Evaluator;
    use crate::geometry::{PieceKind, Square, SquareSet, Variant};
    use crate::moves::Move;
    use std::collections::HashMap;

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    struct Pos(u8);

    struct LinearRules;

    impl Rules for LinearRules {
        type Position = Pos;
        fn parse(&self, _: &str, _: Variant) -> crate::error::Result<Self::Position> {
            Ok(Pos(0))
        }
        fn serialize(&self, p: &Self::Position) -> String {
            p.0.to_string()
        }
        fn position_key(&self, p: &Self::Position) -> u128 {
            p.0 as u128
        }
        fn legal_moves(&self, p: &Self::Position) -> Vec<Move> {
            if p.0 >= 2 {
                vec![]
            } else {
                vec![
                    Move::quiet(Square::new(0), Square::new(1)),
                    Move::quiet(Square::new(0), Square::new(2)),
                ]
            }
        }
        fn apply(&self, p: &Self::Position, _: Move) -> crate::error::Result<Self::Position> {
            Ok(Pos(p.0 + 1))
        }
        fn side_to_move(&self, p: &Self::Position) -> Side {
            if p.0 % 2 == 0 { Side::White } else { Side::Black }
        }
        fn in_check(&self, _: &Self::Position) -> bool {
            false
        }
        fn attacks_to(&self, _: &Self::Position, _: Square, _: Side) -> SquareSet {
            SquareSet::EMPTY
        }
        fn pieces_of(&self, _: &Self::Position, _: Side, _: PieceKind) -> SquareSet {
            SquareSet::EMPTY
        }
        fn board_squares(&self, _: Variant) -> SquareSet {
            SquareSet::EMPTY
        }
    }

    struct AsymmetricEvaluator;

    impl Evaluator<LinearRules> for AsymmetricEvaluator {
        fn score_children(&self, position: &Pos) -> Vec<(Move, f32)> {
            LinearRules
                .legal_moves(position)
                .into_iter()
                .enumerate()
                .map(|(i, m)| (m, if i == 0 { 0.8 } else { -0.2 }))
                .collect()
        }
        fn score_position(&self, _: &Pos) -> f32 {
            0.0
        }
    }

    fn built_subgame() -> Arc<Subgame<LinearRules>> {
        let subgame = Arc::new(
            Subgame::construct(Arc::new(LinearRules), Variant::Classic, vec![Pos(0)], 0.05, HashMap::new())
                .unwrap(),
        );
        subgame.expand_node(subgame.root_id(), &AsymmetricEvaluator).unwrap();
        for &child in &subgame.children_of(subgame.root_id()) {
            subgame.expand_node(child, &AsymmetricEvaluator).unwrap();
        }
        subgame
    }

    #[test]
    fn strategy_stays_normalized_after_iterations() {
        let subgame = built_subgame();
        let solver = CFRSolver::new(
            subgame.clone(),
            Arc::new(AsymmetricEvaluator),
            Arc::new(AtomicBool::new(true)),
            Arc::new(AtomicU64::new(0)),
        );
        for _ in 0..50 {
            solver.iterate();
        }
        let key = subgame.sequence_key_of(subgame.root_id());
        let infoset = subgame.infoset_if_present(key).unwrap();
        let sum: f32 = (0..infoset.num_actions()).map(|a| infoset.strategy(a)).sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn regrets_stay_nonnegative() {
        let subgame = built_subgame();
        let solver = CFRSolver::new(
            subgame.clone(),
            Arc::new(AsymmetricEvaluator),
            Arc::new(AtomicBool::new(true)),
            Arc::new(AtomicU64::new(0)),
        );
        for _ in 0..50 {
            solver.iterate();
        }
        let key = subgame.sequence_key_of(subgame.root_id());
        let infoset = subgame.infoset_if_present(key).unwrap();
        for a in 0..infoset.num_actions() {
            assert!(infoset.regret(a) >= 0.0);
        }
    }

    #[test]
    fn discount_approaches_one_as_t_grows() {
        let d = Discount::default();
        assert!(d.regret(1000, 1.0) > d.regret(1, 1.0));
    }

    struct MateRules;

    impl Rules for MateRules {
        type Position = Pos;
        fn parse(&self, _: &str, _: Variant) -> crate::error::Result<Self::Position> {
            Ok(Pos(0))
        }
        fn serialize(&self, p: &Self::Position) -> String {
            p.0.to_string()
        }
        fn position_key(&self, p: &Self::Position) -> u128 {
            p.0 as u128
        }
        fn legal_moves(&self, p: &Self::Position) -> Vec<Move> {
            match p.0 {
                0 => vec![Move::quiet(Square::new(0), Square::new(1)), Move::quiet(Square::new(0), Square::new(2))],
                2 => vec![Move::quiet(Square::new(0), Square::new(3))],
                _ => vec![],
            }
        }
        fn apply(&self, p: &Self::Position, mv: Move) -> crate::error::Result<Self::Position> {
            Ok(match (p.0, mv.to.0) {
                (0, 1) => Pos(1),
                (0, 2) => Pos(2),
                (2, 3) => Pos(3),
                _ => Pos(p.0 + 1),
            })
        }
        fn side_to_move(&self, p: &Self::Position) -> Side {
            match p.0 {
                0 => Side::White,
                1 => Side::Black,
                2 => Side::Black,
                _ => Side::White,
            }
        }
        fn in_check(&self, p: &Self::Position) -> bool {
            // Black, to move at position 1, has no legal moves and is mated.
            p.0 == 1
        }
        fn attacks_to(&self, _: &Self::Position, _: Square, _: Side) -> SquareSet {
            SquareSet::EMPTY
        }
        fn pieces_of(&self, _: &Self::Position, _: Side, _: PieceKind) -> SquareSet {
            SquareSet::EMPTY
        }
        fn board_squares(&self, _: Variant) -> SquareSet {
            SquareSet::EMPTY
        }
    }

    struct MateEvaluator;

    impl Evaluator<MateRules> for MateEvaluator {
        fn score_children(&self, position: &Pos) -> Vec<(Move, f32)> {
            match position.0 {
                0 => vec![
                    (Move::quiet(Square::new(0), Square::new(1)), 1.0),
                    (Move::quiet(Square::new(0), Square::new(2)), -0.5),
                ],
                2 => vec![(Move::quiet(Square::new(0), Square::new(3)), -0.5)],
                _ => vec![],
            }
        }
        fn score_position(&self, _: &Pos) -> f32 {
            0.0
        }
    }

    #[test]
    fn mate_in_one_is_selected_with_probability_one() {
        let subgame = Arc::new(
            Subgame::construct(Arc::new(MateRules), Variant::Classic, vec![Pos(0)], 0.05, HashMap::new())
                .unwrap(),
        );
        subgame.expand_node(subgame.root_id(), &MateEvaluator).unwrap();
        for &child in &subgame.children_of(subgame.root_id()) {
            subgame.expand_node(child, &MateEvaluator).unwrap();
        }
        let solver = CFRSolver::new(
            subgame.clone(),
            Arc::new(MateEvaluator),
            Arc::new(AtomicBool::new(true)),
            Arc::new(AtomicU64::new(0)),
        );
        for _ in 0..50 {
            solver.iterate();
        }
        let key = subgame.sequence_key_of(subgame.root_id());
        let infoset = subgame.infoset_if_present(key).unwrap();
        let purified = crate::purify::purify(&infoset, subgame.gadget.mode(), 3);
        assert!(purified.is_deterministic());
        assert_eq!(infoset.actions()[purified.argmax()], Move::quiet(Square::new(0), Square::new(1)));
    }

    struct TiedRules;

    // Root (White) has two equally-good moves, to positions 1 and 2
    // (both Black entry infosets). Each of those in turn has two equally
    // good replies to frozen depth-2 leaves, so the entry infosets never
    // collapse to a single committed action and the Resolve latch never
    // trips on a false "opponent always stays in" signal.
    impl Rules for TiedRules {
        type Position = Pos;
        fn parse(&self, _: &str, _: Variant) -> crate::error::Result<Self::Position> {
            Ok(Pos(0))
        }
        fn serialize(&self, p: &Self::Position) -> String {
            p.0.to_string()
        }
        fn position_key(&self, p: &Self::Position) -> u128 {
            p.0 as u128
        }
        fn legal_moves(&self, p: &Self::Position) -> Vec<Move> {
            match p.0 {
                0 => vec![Move::quiet(Square::new(0), Square::new(1)), Move::quiet(Square::new(0), Square::new(2))],
                1 => vec![Move::quiet(Square::new(0), Square::new(3)), Move::quiet(Square::new(0), Square::new(4))],
                2 => vec![Move::quiet(Square::new(0), Square::new(5)), Move::quiet(Square::new(0), Square::new(6))],
                _ => vec![],
            }
        }
        fn apply(&self, p: &Self::Position, mv: Move) -> crate::error::Result<Self::Position> {
            Ok(match (p.0, mv.to.0) {
                (0, 1) => Pos(1),
                (0, 2) => Pos(2),
                (1, 3) => Pos(3),
                (1, 4) => Pos(4),
                (2, 5) => Pos(5),
                (2, 6) => Pos(6),
                _ => Pos(p.0 + 1),
            })
        }
        fn side_to_move(&self, p: &Self::Position) -> Side {
            match p.0 {
                0 => Side::White,
                1 | 2 => Side::Black,
                _ => Side::White,
            }
        }
        fn in_check(&self, _: &Self::Position) -> bool {
            false
        }
        fn attacks_to(&self, _: &Self::Position, _: Square, _: Side) -> SquareSet {
            SquareSet::EMPTY
        }
        fn pieces_of(&self, _: &Self::Position, _: Side, _: PieceKind) -> SquareSet {
            SquareSet::EMPTY
        }
        fn board_squares(&self, _: Variant) -> SquareSet {
            SquareSet::EMPTY
        }
    }

    struct TiedEvaluator;

    impl Evaluator<TiedRules> for TiedEvaluator {
        fn score_children(&self, position: &Pos) -> Vec<(Move, f32)> {
            match position.0 {
                0 => vec![
                    (Move::quiet(Square::new(0), Square::new(1)), 0.5),
                    (Move::quiet(Square::new(0), Square::new(2)), 0.5),
                ],
                1 => vec![
                    (Move::quiet(Square::new(0), Square::new(3)), -0.5),
                    (Move::quiet(Square::new(0), Square::new(4)), -0.5),
                ],
                2 => vec![
                    (Move::quiet(Square::new(0), Square::new(5)), -0.5),
                    (Move::quiet(Square::new(0), Square::new(6)), -0.5),
                ],
                _ => vec![],
            }
        }
        fn score_position(&self, _: &Pos) -> f32 {
            0.0
        }
    }

    fn tied_subgame() -> Arc<Subgame<TiedRules>> {
        let subgame = Arc::new(
            Subgame::construct(Arc::new(TiedRules), Variant::Classic, vec![Pos(0)], 0.05, HashMap::new())
                .unwrap(),
        );
        subgame.expand_node(subgame.root_id(), &TiedEvaluator).unwrap();
        for &child in &subgame.children_of(subgame.root_id()) {
            subgame.expand_node(child, &TiedEvaluator).unwrap();
        }
        subgame
    }

    #[test]
    fn symmetric_options_mix_under_maxmargin() {
        let subgame = tied_subgame();
        // Force the gadget's Resolve -> Maxmargin latch as if the opponent
        // had already committed to entering this subgame.
        subgame.gadget.observe_entry_probability(0.0);
        let solver = CFRSolver::new(
            subgame.clone(),
            Arc::new(TiedEvaluator),
            Arc::new(AtomicBool::new(true)),
            Arc::new(AtomicU64::new(0)),
        );
        for _ in 0..1000 {
            solver.iterate();
        }
        let key = subgame.sequence_key_of(subgame.root_id());
        let infoset = subgame.infoset_if_present(key).unwrap();
        for a in 0..infoset.num_actions() {
            let s = infoset.strategy(a);
            assert!((0.3..=0.7).contains(&s), "strategy[{a}] = {s} outside [0.3, 0.7]");
        }
        let purified = crate::purify::purify(&infoset, subgame.gadget.mode(), 3);
        for a in purified.support() {
            let w = purified.weight(a);
            assert!((0.3..=0.7).contains(&w), "purified weight[{a}] = {w} outside [0.3, 0.7]");
        }
    }

    #[test]
    fn same_tie_is_deterministic_under_resolve() {
        let subgame = tied_subgame();
        let solver = CFRSolver::new(
            subgame.clone(),
            Arc::new(TiedEvaluator),
            Arc::new(AtomicBool::new(true)),
            Arc::new(AtomicU64::new(0)),
        );
        for _ in 0..50 {
            solver.iterate();
        }
        assert_eq!(subgame.gadget.mode(), GadgetMode::Resolve);
        let key = subgame.sequence_key_of(subgame.root_id());
        let infoset = subgame.infoset_if_present(key).unwrap();
        let purified = crate::purify::purify(&infoset, subgame.gadget.mode(), 3);
        assert!(purified.is_deterministic());
    }
}
