use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::belief::BeliefTracker;
use crate::cfr::CFRSolver;
use crate::config::Config;
use crate::error::{PlannerError, Result};
use crate::evaluator::Evaluator;
use crate::expander::Expander;
use crate::geometry::Variant;
use crate::moves::{Move, SequenceId};
use crate::observation::ObservationHistory;
use crate::purify;
use crate::rules::Rules;
use crate::stats::{Counters, SearchStatistics};
use crate::subgame::Subgame;
use crate::visibility;

/// The space between signalling Expanders to stop and signalling the
/// CFRSolver to stop, so tree growth has settled before the last few CFR
/// iterations read it (§4.7 step 7).
const GRACE_PERIOD: Duration = Duration::from_millis(10);

/// Orchestrates one `Observation -> BeliefTracker -> Subgame ->
/// {Expander, CFRSolver} -> purify -> Move` decision. Owned across a
/// whole game so it can carry `ObservationHistory` and the re-solving
/// gadget's prior equilibrium values between calls. See `SPEC_FULL.md`
/// §4.7.
pub struct Planner<R: Rules, E: Evaluator<R>> {
    rules: Arc<R>,
    evaluator: Arc<E>,
    variant: Variant,
    config: Config,
    history: ObservationHistory,
    belief: Option<BeliefTracker<R>>,
    prior_equilibrium: Mutex<HashMap<SequenceId, f32>>,
    belief_seed: u64,
}

impl<R: Rules + 'static, E: Evaluator<R> + 'static> Planner<R, E> {
    pub fn new(rules: Arc<R>, evaluator: Arc<E>, variant: Variant, config: Config) -> Result<Self> {
        let config = config.validated()?;
        Ok(Self {
            rules,
            evaluator,
            variant,
            config,
            history: ObservationHistory::new(),
            belief: None,
            prior_equilibrium: Mutex::new(HashMap::new()),
            belief_seed: 0,
        })
    }

    /// Clears the observation history and belief state between games.
    pub fn reset(&mut self) {
        self.history.clear();
        self.belief = None;
        self.prior_equilibrium.lock().expect("prior_equilibrium poisoned").clear();
    }

    /// `plan_move` (§4.7): selects a move for `position`, returning `None`
    /// only when the root infoset has no legal actions (checkmate or
    /// stalemate at the root; §7 `RootHasNoActions`, non-fatal to the
    /// engine).
    pub fn plan_move(&mut self, position: &R::Position) -> Result<(Option<Move>, SearchStatistics)> {
        let start = Instant::now();

        let obs = visibility::observe(self.rules.as_ref(), position, self.variant);
        self.history.append(obs);

        self.update_belief(position);

        let samples = match &self.belief {
            Some(tracker) => {
                self.belief_seed = self.belief_seed.wrapping_add(1);
                let mut drawn = tracker.sample(self.config.min_infoset_size, self.belief_seed);
                if drawn.is_empty() {
                    drawn.push(position.clone());
                }
                drawn
            }
            None => vec![position.clone()],
        };
        let belief_size = samples.len() as u64;

        let prior_equilibrium = self.prior_equilibrium.lock().expect("prior_equilibrium poisoned").clone();
        let subgame = Arc::new(Subgame::construct(
            self.rules.clone(),
            self.variant,
            samples,
            self.config.resolve_entry_epsilon,
            prior_equilibrium,
        )?);

        let counters = Counters::new();
        let budget = Duration::from_millis(self.config.max_time_ms);

        // A non-positive deadline means no worker ever gets to run; skip
        // spawning them entirely rather than racing the stop signal
        // against a solver thread that could still squeeze in an
        // iteration before it sees `running == false` (§8 boundary:
        // "time budget ≤ 0 ⇒ deadline-before-first-iteration path").
        if budget > Duration::ZERO {
            let expanders_running = Arc::new(AtomicBool::new(true));
            let solver_running = Arc::new(AtomicBool::new(true));

            let mut expander_handles = Vec::with_capacity(self.config.num_expander_threads);
            for i in 0..self.config.num_expander_threads {
                let subgame = subgame.clone();
                let evaluator = self.evaluator.clone();
                let running = expanders_running.clone();
                let expansions = counters.expansions.clone();
                let puct_constant = self.config.puct_constant;
                let seed = self.belief_seed.wrapping_mul(31).wrapping_add(i as u64 + 1);
                expander_handles.push(thread::spawn(move || {
                    let expander = Expander::new(subgame, evaluator, puct_constant, running, expansions, seed);
                    expander.run();
                }));
            }

            let mut solver_handles = Vec::with_capacity(self.config.num_solver_threads);
            for _ in 0..self.config.num_solver_threads {
                let subgame = subgame.clone();
                let evaluator = self.evaluator.clone();
                let running = solver_running.clone();
                let iterations = counters.iterations.clone();
                solver_handles.push(thread::spawn(move || {
                    let solver = CFRSolver::new(subgame, evaluator, running, iterations);
                    solver.run();
                }));
            }

            thread::sleep(budget);

            // Graceful stop (§4.7 step 7, §5): Expanders first, a grace
            // period so tree growth settles, then the CFRSolver, then join.
            expanders_running.store(false, Ordering::Release);
            thread::sleep(GRACE_PERIOD);
            solver_running.store(false, Ordering::Release);
            for h in expander_handles {
                let _ = h.join();
            }
            for h in solver_handles {
                let _ = h.join();
            }
        }

        let iterations = counters.iterations();
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let mut stats = SearchStatistics {
            nodes: subgame.node_count() as u64,
            infosets: subgame.infoset_count() as u64,
            belief_size,
            avg_depth: subgame.average_depth(),
            cfr_iterations: iterations,
            expansions: counters.expansions(),
            elapsed_ms,
        };

        if iterations == 0 {
            log::warn!("deadline elapsed before a single CFR iteration completed; returning evaluator bootstrap");
            let scored = self.evaluator.score_children(position);
            let mv = scored
                .into_iter()
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(mv, _)| mv);
            if mv.is_none() {
                log::error!("{}", PlannerError::DeadlineReachedBeforeFirstIteration);
            }
            return Ok((mv, stats));
        }

        let root_key = SequenceId::ROOT;
        let root_has_actions = subgame
            .infoset_if_present(root_key)
            .is_some_and(|i| i.is_expanded() && i.num_actions() > 0);
        if !root_has_actions {
            // Either the root is terminal (checkmate/stalemate for the
            // side to move) or no Expander reached it in time; either way
            // there is no action to purify.
            log::error!("{}", PlannerError::RootHasNoActions(root_key));
            return Ok((None, stats));
        }
        let infoset = subgame.infoset_if_present(root_key).expect("checked above");

        self.record_prior_equilibrium(&subgame);

        let gadget_mode = subgame.gadget.mode();
        let purified = purify::purify(&infoset, gadget_mode, self.config.max_support);
        let chosen = if purified.is_deterministic() {
            purified.argmax()
        } else {
            let mut rng = rand::rng();
            purified.sample(&mut rng)
        };
        let mv = infoset.actions().get(chosen).copied();
        Ok((mv, stats))
    }

    fn update_belief(&mut self, position: &R::Position) {
        match &mut self.belief {
            None => {
                self.belief = Some(BeliefTracker::new(self.variant, self.config.belief_enumeration_cap, position.clone()));
            }
            Some(tracker) => {
                if self.config.enable_incremental_belief {
                    tracker.incremental_filter(self.rules.as_ref(), &self.history);
                } else {
                    tracker.rebuild_from_scratch(self.rules.as_ref(), &self.history, position.clone(), || None);
                }
                if tracker.state().is_empty() {
                    log::warn!("{}", PlannerError::ObservationInconsistent);
                    *tracker = BeliefTracker::new(self.variant, self.config.belief_enumeration_cap, position.clone());
                }
            }
        }
    }

    /// Stores the current solve's entry-infoset values as the prior
    /// equilibrium `v*` consumed by the gadget on the next call (§4.4's
    /// resolved open question).
    fn record_prior_equilibrium(&self, subgame: &Subgame<R>) {
        let mut prior = self.prior_equilibrium.lock().expect("prior_equilibrium poisoned");
        for child in subgame.children_of(subgame.root_id()) {
            let key = subgame.sequence_key_of(child);
            if let Some(infoset) = subgame.infoset_if_present(key) {
                if infoset.is_expanded() {
                    prior.insert(key, infoset.value());
                }
            }
        }
    }

    pub fn history(&self) -> &ObservationHistory {
        &self.history
    }
}
