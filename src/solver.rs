//! Monte-Carlo CFR over abstracted betting states.
//!
//! Each iteration deals one hand per active player (from the player's range
//! when one is given, otherwise from the deck), then walks the betting tree
//! from the root. Showdown values come from sampled runouts; subtrees past
//! the depth budget or below the reach threshold are scored by a one-step
//! heuristic instead of being expanded.
//!
//! Utilities are chips won back at showdown minus chips committed since the
//! root, per player.

use std::collections::HashMap;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::cards::{complete_board, CardSet, Hand, HOLE_CARDS};
use crate::equity::showdown_equity;
use crate::error::{GtoError, GtoResult};
use crate::game_state::{Action, BetMenu, ClosureRule, GameState};
use crate::math_engine::fold_probability;
use crate::nodes::NodeTable;
use crate::parallel::{chunk_rng, CancelToken};
use crate::texture::{analyze_board, BoardTexture, HandBucket};

// ---------------------------------------------------------------------------
// Config & result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Iterations when the caller does not name a count.
    pub iterations: u32,
    /// Decisions expanded below the root before the heuristic takes over.
    pub max_depth: u32,
    /// Joint reach probability under which a subtree is not expanded.
    pub prune_threshold: f64,
    pub bet_menu: BetMenu,
    /// Runouts sampled per showdown evaluation.
    pub showdown_samples: u32,
    pub closure: ClosureRule,
    /// Clamp cumulative regret at zero.
    pub cfr_plus: bool,
    pub seed: Option<u64>,
    #[serde(skip)]
    pub cancel: CancelToken,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            iterations: 1000,
            max_depth: 4,
            prune_threshold: 1e-3,
            bet_menu: BetMenu::default(),
            showdown_samples: 32,
            closure: ClosureRule::default(),
            cfr_plus: false,
            seed: None,
            cancel: CancelToken::default(),
        }
    }
}

impl SolverConfig {
    pub fn from_json(json: &str) -> GtoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_seed(seed: u64) -> Self {
        SolverConfig {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> GtoResult<()> {
        let bad = |msg: &str| Err(GtoError::SolverConstruction(msg.to_string()));
        if self.max_depth == 0 {
            return bad("max_depth must be at least 1");
        }
        if self.showdown_samples == 0 {
            return bad("showdown_samples must be at least 1");
        }
        if !(0.0..1.0).contains(&self.prune_threshold) {
            return bad("prune_threshold must be in [0, 1)");
        }
        if self
            .bet_menu
            .fractions
            .iter()
            .any(|f| !f.is_finite() || *f <= 0.0)
        {
            return bad("bet fractions must be positive");
        }
        if !self.bet_menu.min_bet_fraction.is_finite() || self.bet_menu.min_bet_fraction < 0.0 {
            return bad("min_bet_fraction must be non-negative");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFrequency {
    pub action: Action,
    pub frequency: f64,
}

/// Average strategy at one information set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoSetStrategy {
    pub infoset: String,
    pub visits: u64,
    pub actions: Vec<ActionFrequency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketReport {
    pub bucket: HandBucket,
    /// Share of sampled root hands in this bucket.
    pub frequency: f64,
    /// Mean root utility of those hands, in chips.
    pub ev: f64,
    pub samples: u64,
}

/// How the acting player's hands at the root split by strength, with the
/// board texture they were dealt on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutabilityReport {
    pub player: usize,
    /// `None` before the flop.
    pub texture: Option<BoardTexture>,
    pub buckets: Vec<BucketReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub iterations: u32,
    /// Sorted by information-set key.
    pub strategies: Vec<InfoSetStrategy>,
    /// Root showdown equity per player, in percent.
    pub equity: Vec<f64>,
    /// Mean root utility per player, in chips.
    pub ev: Vec<f64>,
    /// Visit-weighted mean normalized entropy of the average strategies.
    /// A convergence proxy in [0, 1], not a best-response exploitability.
    pub approx_exploitability: f64,
    pub report: NutabilityReport,
}

impl Solution {
    pub fn strategy(&self, infoset: &str) -> Option<&InfoSetStrategy> {
        self.strategies
            .binary_search_by(|s| s.infoset.as_str().cmp(infoset))
            .ok()
            .map(|i| &self.strategies[i])
    }

    pub fn to_json(&self) -> GtoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Cards and cached showdown shares for one iteration.
struct Deal {
    hands: Vec<Option<Hand>>,
    buckets: Vec<HandBucket>,
    root_stacks: Vec<f64>,
    /// Showdown shares per player, keyed by the bitmask of live players.
    shares: HashMap<u64, Vec<f64>>,
}

impl Deal {
    fn hand(&self, player: usize) -> GtoResult<Hand> {
        self.hands
            .get(player)
            .copied()
            .flatten()
            .ok_or_else(|| GtoError::SolverConstruction(format!("player {} was not dealt in", player)))
    }

    fn invested(&self, state: &GameState, player: usize) -> f64 {
        self.root_stacks[player] - state.stack(player)
    }
}

/// Owns the node table and RNG for one solve. Not shared across threads;
/// the bulk runner gives each unit of work its own solver.
pub struct CfrSolver {
    config: SolverConfig,
    table: NodeTable,
    rng: StdRng,
}

impl CfrSolver {
    pub fn new(config: SolverConfig) -> Self {
        let rng = chunk_rng(config.seed, 0);
        CfrSolver {
            config,
            table: NodeTable::new(),
            rng,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn table(&self) -> &NodeTable {
        &self.table
    }

    /// Runs CFR from `root` and returns the averaged strategies.
    pub fn solve(&mut self, root: &GameState, iterations: Option<u32>) -> GtoResult<Solution> {
        self.config.validate()?;
        root.validate()?;
        let root = root.normalized();
        let iterations = iterations.unwrap_or(self.config.iterations);
        if iterations == 0 {
            return Err(GtoError::InvalidValue("iterations must be positive".to_string()));
        }

        let n = root.num_players();
        let hero = root.player_position;
        let mut equity_sum = vec![0.0; n];
        let mut ev_sum = vec![0.0; n];
        let mut bucket_hits = [(0u64, 0.0f64); HandBucket::ALL.len()];

        for t in 0..iterations {
            self.config.cancel.check()?;
            let mut deal = self.deal(&root)?;

            let shares = self.showdown_shares(&root, &mut deal)?;
            for (sum, s) in equity_sum.iter_mut().zip(&shares) {
                *sum += s;
            }

            let reach = vec![1.0; n];
            let utils = self.cfr(&root, &reach, self.config.max_depth, &mut deal)?;
            for (sum, u) in ev_sum.iter_mut().zip(&utils) {
                *sum += u;
            }
            let hit = &mut bucket_hits[deal.buckets[hero].index()];
            hit.0 += 1;
            hit.1 += utils[hero];

            if (t + 1) % 100 == 0 {
                debug!("cfr iteration {}/{}: {} infosets", t + 1, iterations, self.table.len());
            }
        }

        let solution = self.build_solution(&root, iterations, &equity_sum, &ev_sum, &bucket_hits)?;
        info!(
            "solved spot in {} iterations: {} infosets, entropy {:.3}",
            iterations,
            solution.strategies.len(),
            solution.approx_exploitability
        );
        Ok(solution)
    }

    /// One hand per active player. Ranged players are dealt first so
    /// random hands avoid their cards.
    fn deal(&mut self, root: &GameState) -> GtoResult<Deal> {
        let n = root.num_players();
        let mut used = CardSet::new();
        root.board.add_to(&mut used)?;
        let mut hands: Vec<Option<Hand>> = vec![None; n];

        for &p in &root.active_players {
            let range = root.range(p);
            if range.is_empty() {
                continue;
            }
            let open: Vec<&Hand> = range
                .iter()
                .filter(|h| h.cards().iter().all(|c| !used.contains(*c)))
                .collect();
            let hand = **open.choose(&mut self.rng).ok_or_else(|| {
                GtoError::SimulationIteration(format!(
                    "no hand in player {}'s range fits the dealt cards",
                    p
                ))
            })?;
            used.insert_all(hand.cards())?;
            hands[p] = Some(hand);
        }
        for &p in &root.active_players {
            if hands[p].is_none() {
                let cards = complete_board(&used, HOLE_CARDS, &mut self.rng)?;
                used.insert_all(&cards)?;
                hands[p] = Some(Hand::try_from(cards)?);
            }
        }

        let board = root.board.primary();
        let buckets = hands
            .iter()
            .map(|h| h.map_or(HandBucket::Air, |h| HandBucket::classify(&h, board)))
            .collect();
        Ok(Deal {
            hands,
            buckets,
            root_stacks: root.stacks.clone(),
            shares: HashMap::new(),
        })
    }

    fn cfr(
        &mut self,
        state: &GameState,
        reach: &[f64],
        depth: u32,
        deal: &mut Deal,
    ) -> GtoResult<Vec<f64>> {
        if state.is_terminal(self.config.closure) {
            return self.utility(state, deal);
        }

        let p = state.player_position;
        let actions = state.legal_actions(&self.config.bet_menu);
        let key = state.to_infoset().refine(deal.buckets[p], &actions);
        let slot = self.table.get_or_insert(key, &actions);
        let strategy = self.table.node(slot).current_strategy();

        let mut node_util = vec![0.0; reach.len()];
        let mut action_utils = Vec::with_capacity(actions.len());
        for (&action, &prob) in actions.iter().zip(&strategy) {
            let child = state.apply(action)?;
            let mut child_reach = reach.to_vec();
            child_reach[p] *= prob;
            let joint: f64 = child_reach.iter().product();

            let u = if child.is_terminal(self.config.closure) {
                self.utility(&child, deal)?
            } else if depth <= 1 || joint < self.config.prune_threshold {
                self.heuristic(state, action, &child, deal)?
            } else {
                self.cfr(&child, &child_reach, depth - 1, deal)?
            };

            for (acc, v) in node_util.iter_mut().zip(&u) {
                *acc += prob * v;
            }
            action_utils.push(u[p]);
        }

        let cf_reach: f64 = reach
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != p)
            .map(|(_, r)| r)
            .product();
        let floor = self.config.cfr_plus;
        self.table
            .node_mut(slot)
            .update(&action_utils, node_util[p], cf_reach, &strategy, reach[p], floor);
        Ok(node_util)
    }

    /// Pot share per player at showdown, cached per set of live players.
    fn showdown_shares(&mut self, state: &GameState, deal: &mut Deal) -> GtoResult<Vec<f64>> {
        let mask = state
            .active_players
            .iter()
            .fold(0u64, |m, &p| m | (1u64 << p));
        if let Some(shares) = deal.shares.get(&mask) {
            return Ok(shares.clone());
        }

        let mut shares = vec![0.0; state.num_players()];
        if let [only] = state.active_players.as_slice() {
            shares[*only] = 1.0;
        } else {
            let hands = state
                .active_players
                .iter()
                .map(|&p| deal.hand(p))
                .collect::<GtoResult<Vec<Hand>>>()?;
            let eq = showdown_equity(&hands, &state.board, self.config.showdown_samples, &mut self.rng)?;
            for (&p, e) in state.active_players.iter().zip(eq) {
                shares[p] = e;
            }
        }
        deal.shares.insert(mask, shares.clone());
        Ok(shares)
    }

    /// Showdown payout minus chips committed since the root.
    fn utility(&mut self, state: &GameState, deal: &mut Deal) -> GtoResult<Vec<f64>> {
        let shares = self.showdown_shares(state, deal)?;
        Ok(shares
            .iter()
            .enumerate()
            .map(|(i, s)| s * state.pot_size - deal.invested(state, i))
            .collect())
    }

    /// Scores an unexpanded child. Passive actions go straight to showdown;
    /// a bet or raise also wins the pot outright when every opponent folds
    /// at the minimum-defense rate.
    fn heuristic(
        &mut self,
        parent: &GameState,
        action: Action,
        child: &GameState,
        deal: &mut Deal,
    ) -> GtoResult<Vec<f64>> {
        let mut u = self.utility(child, deal)?;
        if !action.is_aggressive() {
            return Ok(u);
        }
        let p = parent.player_position;
        let added = child.pot_size - parent.pot_size;
        let opponents = child.active_players.len().saturating_sub(1);
        let fold = fold_probability(added, parent.pot_size, opponents);
        for &q in &child.active_players {
            let invested = deal.invested(child, q);
            let uncontested = if q == p {
                child.pot_size - invested
            } else {
                -invested
            };
            u[q] = fold * uncontested + (1.0 - fold) * u[q];
        }
        Ok(u)
    }

    fn build_solution(
        &self,
        root: &GameState,
        iterations: u32,
        equity_sum: &[f64],
        ev_sum: &[f64],
        bucket_hits: &[(u64, f64)],
    ) -> GtoResult<Solution> {
        let t = f64::from(iterations);

        let mut strategies: Vec<InfoSetStrategy> = self
            .table
            .iter()
            .map(|(key, node)| InfoSetStrategy {
                infoset: key.as_str().to_string(),
                visits: node.visits(),
                actions: node
                    .actions
                    .iter()
                    .zip(node.average_strategy())
                    .map(|(&action, frequency)| ActionFrequency { action, frequency })
                    .collect(),
            })
            .collect();
        strategies.sort_by(|a, b| a.infoset.cmp(&b.infoset));

        let board = root.board.primary();
        let texture = if board.len() >= 3 {
            Some(analyze_board(board)?)
        } else {
            None
        };
        let buckets = HandBucket::ALL
            .iter()
            .map(|&bucket| {
                let (samples, ev) = bucket_hits[bucket.index()];
                BucketReport {
                    bucket,
                    frequency: samples as f64 / t,
                    ev: if samples > 0 { ev / samples as f64 } else { 0.0 },
                    samples,
                }
            })
            .collect();

        Ok(Solution {
            iterations,
            strategies,
            equity: equity_sum.iter().map(|s| s / t * 100.0).collect(),
            ev: ev_sum.iter().map(|s| s / t).collect(),
            approx_exploitability: self.table.mean_entropy(),
            report: NutabilityReport {
                player: root.player_position,
                texture,
                buckets,
            },
        })
    }
}

/// Solves `state` with the default configuration.
pub fn solve_spot(state: &GameState, iterations: Option<u32>) -> GtoResult<Solution> {
    solve_spot_with(state, iterations, &SolverConfig::default())
}

pub fn solve_spot_with(
    state: &GameState,
    iterations: Option<u32>,
    config: &SolverConfig,
) -> GtoResult<Solution> {
    CfrSolver::new(config.clone()).solve(state, iterations)
}
