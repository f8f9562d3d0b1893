//! Command-line harness for the planner.
//!
//! The chess rules engine and positional evaluator are external
//! collaborators (`SPEC_FULL.md` §1/§6) that this crate does not
//! implement. This binary wires the planner up against a tiny synthetic
//! stand-in game — a linear move counter, not real chess — purely so the
//! concurrency and search machinery can be smoke-tested end-to-end from
//! the command line. A real host supplies its own `Rules`/`Evaluator`.

use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use kriegspiel::geometry::{PieceKind, Side, Square, SquareSet, Variant};
use kriegspiel::moves::Move;
use kriegspiel::{Config, Evaluator, Planner, Rules};

#[derive(Parser, Debug)]
#[command(name = "kriegspiel", about = "Fog-of-war chess move planner")]
struct Cli {
    /// Belief samples used to seed the root subgame.
    #[arg(long, default_value_t = Config::default().min_infoset_size)]
    min_infoset_size: usize,

    /// Number of concurrent Expander worker threads.
    #[arg(long)]
    num_expander_threads: Option<usize>,

    /// Number of concurrent CFRSolver worker threads.
    #[arg(long, default_value_t = Config::default().num_solver_threads)]
    num_solver_threads: usize,

    /// PUCT exploration constant.
    #[arg(long, default_value_t = Config::default().puct_constant)]
    puct_constant: f32,

    /// Maximum support size kept after purification.
    #[arg(long, default_value_t = Config::default().max_support)]
    max_support: usize,

    /// Search deadline in milliseconds.
    #[arg(long, default_value_t = Config::default().max_time_ms)]
    max_time_ms: u64,

    /// Number of synthetic plies to step through for the smoke test.
    #[arg(long, default_value_t = 4)]
    plies: u8,
}

/// A linear "position" standing in for a live chess position: move `n`
/// simply advances to move `n + 1`, alternating side to move, until
/// `terminal_at` is reached. Exists only so `Planner` has something
/// concrete to search over in this demo binary.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct DemoPosition(u8);

struct DemoRules {
    terminal_at: u8,
}

impl Rules for DemoRules {
    type Position = DemoPosition;

    fn parse(&self, _encoded: &str, _variant: Variant) -> kriegspiel::Result<Self::Position> {
        Ok(DemoPosition(0))
    }

    fn serialize(&self, position: &Self::Position) -> String {
        format!("ply:{}", position.0)
    }

    fn position_key(&self, position: &Self::Position) -> u128 {
        position.0 as u128
    }

    fn legal_moves(&self, position: &Self::Position) -> Vec<Move> {
        if position.0 >= self.terminal_at {
            vec![]
        } else {
            vec![
                Move::quiet(Square::new(0), Square::new(1)),
                Move::quiet(Square::new(0), Square::new(2)),
            ]
        }
    }

    fn apply(&self, position: &Self::Position, _mv: Move) -> kriegspiel::Result<Self::Position> {
        Ok(DemoPosition(position.0 + 1))
    }

    fn side_to_move(&self, position: &Self::Position) -> Side {
        if position.0 % 2 == 0 { Side::White } else { Side::Black }
    }

    fn in_check(&self, _position: &Self::Position) -> bool {
        false
    }

    fn attacks_to(&self, _position: &Self::Position, _square: Square, _color: Side) -> SquareSet {
        SquareSet::EMPTY
    }

    fn pieces_of(&self, _position: &Self::Position, _color: Side, _kind: PieceKind) -> SquareSet {
        SquareSet::EMPTY
    }

    fn board_squares(&self, _variant: Variant) -> SquareSet {
        SquareSet::EMPTY
    }
}

struct DemoEvaluator;

impl Evaluator<DemoRules> for DemoEvaluator {
    fn score_children(&self, position: &DemoPosition) -> Vec<(Move, f32)> {
        let rules = DemoRules { terminal_at: u8::MAX };
        rules
            .legal_moves(position)
            .into_iter()
            .enumerate()
            .map(|(i, mv)| (mv, if i == 0 { 0.6 } else { 0.4 }))
            .collect()
    }

    fn score_position(&self, _position: &DemoPosition) -> f32 {
        0.0
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let num_expander_threads = cli.num_expander_threads.unwrap_or_else(|| num_cpus::get().clamp(1, 8).saturating_sub(1).max(1));

    let config = Config {
        min_infoset_size: cli.min_infoset_size,
        num_expander_threads,
        num_solver_threads: cli.num_solver_threads,
        puct_constant: cli.puct_constant,
        max_support: cli.max_support,
        max_time_ms: cli.max_time_ms,
        ..Config::default()
    };

    let rules = Arc::new(DemoRules { terminal_at: cli.plies });
    let evaluator = Arc::new(DemoEvaluator);
    let mut planner = match Planner::new(rules, evaluator, Variant::Classic, config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{} {e}", "configuration error:".red().bold());
            std::process::exit(1);
        }
    };

    let mut position = DemoPosition(0);
    for ply in 0..cli.plies {
        match planner.plan_move(&position) {
            Ok((Some(mv), stats)) => {
                println!("{} {mv:?}", format!("ply {ply}: chose").green());
                println!("  {}", stats.to_string().dimmed());
                position = DemoPosition(position.0 + 1);
                let _ = mv;
            }
            Ok((None, stats)) => {
                println!("{}", "no legal actions at root; game over".yellow());
                println!("  {}", stats.to_string().dimmed());
                break;
            }
            Err(e) => {
                eprintln!("{} {e}", "planner error:".red().bold());
                break;
            }
        }
    }
}
