//! Monte-Carlo equity for PLO.
//!
//! Every entry point validates its inputs (card counts, board lengths, no
//! card used twice) before any iteration runs, splits the iteration budget
//! into near-equal chunks and runs them on a dedicated rayon pool. Each chunk
//! owns its RNG and its counters; chunk results are summed elementwise, so
//! the reduction is order-independent.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cards::{ensure_disjoint, Board, Card, CardSet, Deck, Hand, FULL_BOARD, HOLE_CARDS};
use crate::error::{GtoError, GtoResult};
use crate::hand_evaluator::{evaluate_plo_best, HandCategory, HandScore};
use crate::parallel::{
    build_pool, chunk_iterations, chunk_rng, estimate_workers, multi_hand_workers, CancelToken,
    CANCEL_CHECK_INTERVAL,
};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// How a tied iteration is credited towards equity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieCredit {
    /// Each tie is worth `1 / number of hands in the pot`, whoever actually
    /// tied. Matches historical numbers; understates equity in multiway
    /// pots where two-way ties dominate.
    #[default]
    PotShare,
    /// Each tie is worth `1 / number of co-winners` of that iteration.
    CoWinners,
}

/// What to do when not a single random opponent can be dealt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortDeckPolicy {
    #[default]
    Reject,
    /// Report every iteration as a loss.
    CountAsLoss,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Overrides the default worker count for the call.
    pub workers: Option<usize>,
    /// Makes a call reproducible for a fixed worker count.
    pub seed: Option<u64>,
    pub tie_credit: TieCredit,
    pub short_deck: ShortDeckPolicy,
    #[serde(skip)]
    pub cancel: CancelToken,
}

impl SimulationConfig {
    pub fn from_json(json: &str) -> GtoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_seed(seed: u64) -> Self {
        SimulationConfig {
            seed: Some(seed),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Count of final hands per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub counts: [u64; HandCategory::COUNT],
}

impl CategoryBreakdown {
    #[inline]
    pub fn record(&mut self, category: HandCategory) {
        self.counts[category.index()] += 1;
    }

    pub fn count(&self, category: HandCategory) -> u64 {
        self.counts[category.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Share of each category in percent, zero when nothing was recorded.
    pub fn percentages(&self) -> Vec<(HandCategory, f64)> {
        let total = self.total();
        HandCategory::ALL
            .iter()
            .map(|&c| {
                let pct = if total == 0 {
                    0.0
                } else {
                    self.count(c) as f64 / total as f64 * 100.0
                };
                (c, pct)
            })
            .collect()
    }

    fn merge(&mut self, other: &CategoryBreakdown) {
        for (a, b) in self.counts.iter_mut().zip(other.counts.iter()) {
            *a += b;
        }
    }
}

/// Per-hand counters accumulated over all iterations of one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityResult {
    pub iterations: u32,
    pub wins: Vec<u64>,
    pub ties: Vec<u64>,
    /// Sum over tied iterations of `1 / co-winners`.
    pub tie_shares: Vec<f64>,
    /// Final category per hand (top board in double-board mode).
    pub categories: Vec<CategoryBreakdown>,
    pub tie_credit: TieCredit,
}

impl EquityResult {
    fn empty(hands: usize, iterations: u32, tie_credit: TieCredit) -> Self {
        EquityResult {
            iterations,
            wins: vec![0; hands],
            ties: vec![0; hands],
            tie_shares: vec![0.0; hands],
            categories: vec![CategoryBreakdown::default(); hands],
            tie_credit,
        }
    }

    fn merge(mut self, other: EquityResult) -> Self {
        self.iterations += other.iterations;
        for i in 0..self.wins.len() {
            self.wins[i] += other.wins[i];
            self.ties[i] += other.ties[i];
            self.tie_shares[i] += other.tie_shares[i];
            self.categories[i].merge(&other.categories[i]);
        }
        self
    }

    pub fn num_hands(&self) -> usize {
        self.wins.len()
    }

    pub fn losses(&self) -> Vec<u64> {
        self.wins
            .iter()
            .zip(&self.ties)
            .map(|(w, t)| u64::from(self.iterations) - w - t)
            .collect()
    }

    pub fn equity_pct(&self) -> Vec<f64> {
        let n = self.num_hands() as f64;
        let iters = f64::from(self.iterations.max(1));
        (0..self.num_hands())
            .map(|i| {
                let tie_credit = match self.tie_credit {
                    TieCredit::PotShare => self.ties[i] as f64 / n,
                    TieCredit::CoWinners => self.tie_shares[i],
                };
                (self.wins[i] as f64 + tie_credit) / iters * 100.0
            })
            .collect()
    }

    pub fn tie_pct(&self) -> Vec<f64> {
        let iters = f64::from(self.iterations.max(1));
        self.ties.iter().map(|&t| t as f64 / iters * 100.0).collect()
    }
}

/// One hero against randomly dealt opponents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatedEquity {
    pub iterations: u32,
    /// Opponents actually dealt, after capping by available cards.
    pub opponents: usize,
    pub wins: u64,
    pub ties: u64,
    pub tie_share: f64,
    pub hand_breakdown: CategoryBreakdown,
    pub opponent_breakdown: CategoryBreakdown,
    pub tie_credit: TieCredit,
}

impl EstimatedEquity {
    fn empty(iterations: u32, opponents: usize, tie_credit: TieCredit) -> Self {
        EstimatedEquity {
            iterations,
            opponents,
            wins: 0,
            ties: 0,
            tie_share: 0.0,
            hand_breakdown: CategoryBreakdown::default(),
            opponent_breakdown: CategoryBreakdown::default(),
            tie_credit,
        }
    }

    fn merge(mut self, other: EstimatedEquity) -> Self {
        self.iterations += other.iterations;
        self.wins += other.wins;
        self.ties += other.ties;
        self.tie_share += other.tie_share;
        self.hand_breakdown.merge(&other.hand_breakdown);
        self.opponent_breakdown.merge(&other.opponent_breakdown);
        self
    }

    pub fn losses(&self) -> u64 {
        u64::from(self.iterations) - self.wins - self.ties
    }

    pub fn equity_pct(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        let tie_credit = match self.tie_credit {
            TieCredit::PotShare => self.ties as f64 / (self.opponents + 1) as f64,
            TieCredit::CoWinners => self.tie_share,
        };
        (self.wins as f64 + tie_credit) / f64::from(self.iterations) * 100.0
    }

    pub fn tie_pct(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.ties as f64 / f64::from(self.iterations) * 100.0
    }
}

/// Per-player double-board outcomes as fractions of iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleBoardStats {
    pub iterations: u32,
    /// Tied (not sole winner) on both boards.
    pub chop_both: Vec<f64>,
    /// Sole winner of both boards.
    pub scoop_both: Vec<f64>,
    /// Among the top board's winners.
    pub split_top: Vec<f64>,
    /// Among the bottom board's winners.
    pub split_bottom: Vec<f64>,
}

#[derive(Debug, Clone)]
struct DoubleBoardCounts {
    iterations: u32,
    chop_both: Vec<u64>,
    scoop_both: Vec<u64>,
    split_top: Vec<u64>,
    split_bottom: Vec<u64>,
}

impl DoubleBoardCounts {
    fn empty(hands: usize) -> Self {
        DoubleBoardCounts {
            iterations: 0,
            chop_both: vec![0; hands],
            scoop_both: vec![0; hands],
            split_top: vec![0; hands],
            split_bottom: vec![0; hands],
        }
    }

    fn merge(mut self, other: DoubleBoardCounts) -> Self {
        self.iterations += other.iterations;
        for i in 0..self.chop_both.len() {
            self.chop_both[i] += other.chop_both[i];
            self.scoop_both[i] += other.scoop_both[i];
            self.split_top[i] += other.split_top[i];
            self.split_bottom[i] += other.split_bottom[i];
        }
        self
    }

    fn into_stats(self) -> DoubleBoardStats {
        let iters = f64::from(self.iterations.max(1));
        let frac = |v: Vec<u64>| v.into_iter().map(|c| c as f64 / iters).collect();
        DoubleBoardStats {
            iterations: self.iterations,
            chop_both: frac(self.chop_both),
            scoop_both: frac(self.scoop_both),
            split_top: frac(self.split_top),
            split_bottom: frac(self.split_bottom),
        }
    }
}

// ---------------------------------------------------------------------------
// Runouts
// ---------------------------------------------------------------------------

/// Reusable buffers holding the completed board(s) of one iteration.
struct Runout {
    top: Vec<Card>,
    bottom: Vec<Card>,
}

impl Runout {
    fn new() -> Self {
        Runout {
            top: Vec::with_capacity(FULL_BOARD),
            bottom: Vec::with_capacity(FULL_BOARD),
        }
    }

    /// Completes the known board(s) from `drawn`, top board first. Returns
    /// the number of drawn cards consumed.
    fn fill(&mut self, board: &Board, drawn: &[Card]) -> usize {
        self.top.clear();
        self.bottom.clear();
        match board {
            Board::Single(known) => complete_into(&mut self.top, known, drawn),
            Board::Double { top, bottom } => {
                let used = complete_into(&mut self.top, top, drawn);
                used + complete_into(&mut self.bottom, bottom, &drawn[used..])
            }
        }
    }

    fn is_double(&self) -> bool {
        !self.bottom.is_empty()
    }
}

fn complete_into(out: &mut Vec<Card>, known: &[Card], drawn: &[Card]) -> usize {
    let missing = FULL_BOARD - known.len();
    out.extend_from_slice(known);
    out.extend_from_slice(&drawn[..missing]);
    missing
}

/// Indices holding the minimum score.
fn winners(scores: &[u32]) -> impl Iterator<Item = usize> + '_ {
    let best = scores.iter().copied().min().unwrap_or(u32::MAX);
    scores
        .iter()
        .enumerate()
        .filter(move |(_, &s)| s == best)
        .map(|(i, _)| i)
}

fn run_chunks<T, F>(
    iterations: u32,
    workers: usize,
    seed: Option<u64>,
    run: F,
) -> GtoResult<Vec<T>>
where
    T: Send,
    F: Fn(u32, &mut StdRng) -> GtoResult<T> + Sync,
{
    let chunks = chunk_iterations(iterations, workers);
    debug!(
        "running {} iterations in {} chunks on {} workers",
        iterations,
        chunks.len(),
        workers
    );
    let pool = build_pool(workers)?;
    pool.install(|| {
        chunks
            .par_iter()
            .enumerate()
            .map(|(i, &n)| {
                let mut rng = chunk_rng(seed, i);
                run(n, &mut rng)
            })
            .collect()
    })
}

fn check_iterations(iterations: u32) -> GtoResult<()> {
    if iterations == 0 {
        return Err(GtoError::InvalidValue("iterations must be positive".to_string()));
    }
    Ok(())
}

fn validate_hands_and_board(hands: &[Hand], board: &Board, extra: &[Card]) -> GtoResult<CardSet> {
    if hands.is_empty() {
        return Err(GtoError::InvalidValue("at least one hand is required".to_string()));
    }
    board.validate()?;
    let mut groups: Vec<&[Card]> = hands.iter().map(|h| h.cards().as_slice()).collect();
    groups.extend(board.boards());
    groups.push(extra);
    ensure_disjoint(&groups)
}

// ---------------------------------------------------------------------------
// Known hands
// ---------------------------------------------------------------------------

/// Equity of fully known hands. With a double board each hand's score is
/// the sum of its two board scores; the lowest sum wins.
pub fn simulate_equity(
    hands: &[Hand],
    board: &Board,
    iterations: u32,
    config: &SimulationConfig,
) -> GtoResult<EquityResult> {
    check_iterations(iterations)?;
    let used = validate_hands_and_board(hands, board, &[])?;
    let missing = board.missing();
    let available = used.remaining();
    if missing > available {
        return Err(GtoError::InsufficientCards {
            requested: missing,
            available,
        });
    }

    let workers = config.workers.unwrap_or_else(multi_hand_workers);
    let partials = run_chunks(iterations, workers, config.seed, |n, rng| {
        showdown_chunk(hands, board, &used, n, rng, config)
    })?;
    Ok(partials
        .into_iter()
        .fold(EquityResult::empty(hands.len(), 0, config.tie_credit), EquityResult::merge))
}

fn showdown_chunk(
    hands: &[Hand],
    board: &Board,
    used: &CardSet,
    iterations: u32,
    rng: &mut StdRng,
    config: &SimulationConfig,
) -> GtoResult<EquityResult> {
    let mut deck = Deck::excluding(used);
    let mut runout = Runout::new();
    let missing = board.missing();
    let mut result = EquityResult::empty(hands.len(), iterations, config.tie_credit);
    let mut scores = vec![0u32; hands.len()];

    for i in 0..iterations {
        if i % CANCEL_CHECK_INTERVAL == 0 {
            config.cancel.check()?;
        }
        let drawn = deck.draw(missing, rng)?;
        runout.fill(board, drawn);

        for (h, hand) in hands.iter().enumerate() {
            let top = evaluate_plo_best(hand.cards(), &runout.top)?;
            result.categories[h].record(top.category());
            scores[h] = u32::from(top.value());
            if runout.is_double() {
                scores[h] += u32::from(evaluate_plo_best(hand.cards(), &runout.bottom)?.value());
            }
        }

        let won: Vec<usize> = winners(&scores).collect();
        if let [sole] = won[..] {
            result.wins[sole] += 1;
        } else {
            let share = 1.0 / won.len() as f64;
            for &w in &won {
                result.ties[w] += 1;
                result.tie_shares[w] += share;
            }
        }
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Random opponents
// ---------------------------------------------------------------------------

/// Equity of one hero hand against `num_opponents` random hands.
///
/// Opponents are capped by the cards left once the board is completed; a
/// `max_hand_combinations` above zero caps the number of sampled deals.
pub fn simulate_estimated_equity(
    hand: &Hand,
    board: &[Card],
    iterations: u32,
    folded: &[Card],
    max_hand_combinations: u32,
    num_opponents: usize,
    config: &SimulationConfig,
) -> GtoResult<EstimatedEquity> {
    check_iterations(iterations)?;
    if num_opponents == 0 {
        return Err(GtoError::InvalidValue("num_opponents must be positive".to_string()));
    }
    let board = Board::Single(board.to_vec());
    let used = validate_hands_and_board(std::slice::from_ref(hand), &board, folded)?;
    let missing = board.missing();

    let iterations = if max_hand_combinations > 0 {
        iterations.min(max_hand_combinations)
    } else {
        iterations
    };

    let dealable = used.remaining().saturating_sub(missing);
    let max_possible = dealable / HOLE_CARDS;
    let opponents = num_opponents.min(max_possible);
    if opponents < num_opponents {
        warn!(
            "requested {} opponents but only {} can be dealt",
            num_opponents, opponents
        );
    }
    if opponents == 0 {
        return match config.short_deck {
            ShortDeckPolicy::Reject => Err(GtoError::InsufficientCards {
                requested: missing + HOLE_CARDS,
                available: used.remaining(),
            }),
            ShortDeckPolicy::CountAsLoss => {
                Ok(EstimatedEquity::empty(iterations, 0, config.tie_credit))
            }
        };
    }

    let workers = config.workers.unwrap_or_else(estimate_workers);
    let partials = run_chunks(iterations, workers, config.seed, |n, rng| {
        estimate_chunk(hand, &board, &used, opponents, n, rng, config)
    })?;
    Ok(partials.into_iter().fold(
        EstimatedEquity::empty(0, opponents, config.tie_credit),
        EstimatedEquity::merge,
    ))
}

fn estimate_chunk(
    hand: &Hand,
    board: &Board,
    used: &CardSet,
    opponents: usize,
    iterations: u32,
    rng: &mut StdRng,
    config: &SimulationConfig,
) -> GtoResult<EstimatedEquity> {
    let mut deck = Deck::excluding(used);
    let mut runout = Runout::new();
    let missing = board.missing();
    let mut result = EstimatedEquity::empty(iterations, opponents, config.tie_credit);

    for i in 0..iterations {
        if i % CANCEL_CHECK_INTERVAL == 0 {
            config.cancel.check()?;
        }
        let drawn = deck.draw(missing + opponents * HOLE_CARDS, rng)?;
        let consumed = runout.fill(board, drawn);

        let hero = evaluate_plo_best(hand.cards(), &runout.top)?;
        result.hand_breakdown.record(hero.category());

        let mut best_opponent = HandScore(u16::MAX);
        let mut tied = 0usize;
        for opp in drawn[consumed..].chunks_exact(HOLE_CARDS) {
            let score = evaluate_plo_best(opp, &runout.top)?;
            result.opponent_breakdown.record(score.category());
            if score.beats(best_opponent) {
                best_opponent = score;
                tied = 1;
            } else if score == best_opponent {
                tied += 1;
            }
        }

        if hero.beats(best_opponent) {
            result.wins += 1;
        } else if hero == best_opponent {
            result.ties += 1;
            result.tie_share += 1.0 / (tied + 1) as f64;
        }
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Double board
// ---------------------------------------------------------------------------

/// Split, scoop and chop frequencies for known hands on two boards.
pub fn calculate_double_board_stats(
    hands: &[Hand],
    top_board: &[Card],
    bottom_board: &[Card],
    iterations: u32,
    config: &SimulationConfig,
) -> GtoResult<DoubleBoardStats> {
    check_iterations(iterations)?;
    let board = Board::Double {
        top: top_board.to_vec(),
        bottom: bottom_board.to_vec(),
    };
    let used = validate_hands_and_board(hands, &board, &[])?;
    let missing = board.missing();
    if missing > used.remaining() {
        return Err(GtoError::InsufficientCards {
            requested: missing,
            available: used.remaining(),
        });
    }

    let workers = config.workers.unwrap_or_else(multi_hand_workers);
    let partials = run_chunks(iterations, workers, config.seed, |n, rng| {
        double_board_chunk(hands, &board, &used, n, rng, &config.cancel)
    })?;
    Ok(partials
        .into_iter()
        .fold(DoubleBoardCounts::empty(hands.len()), DoubleBoardCounts::merge)
        .into_stats())
}

fn double_board_chunk(
    hands: &[Hand],
    board: &Board,
    used: &CardSet,
    iterations: u32,
    rng: &mut StdRng,
    cancel: &CancelToken,
) -> GtoResult<DoubleBoardCounts> {
    let mut deck = Deck::excluding(used);
    let mut runout = Runout::new();
    let missing = board.missing();
    let mut counts = DoubleBoardCounts::empty(hands.len());
    counts.iterations = iterations;
    let mut top_scores = vec![0u32; hands.len()];
    let mut bottom_scores = vec![0u32; hands.len()];

    for i in 0..iterations {
        if i % CANCEL_CHECK_INTERVAL == 0 {
            cancel.check()?;
        }
        let drawn = deck.draw(missing, rng)?;
        runout.fill(board, drawn);

        for (h, hand) in hands.iter().enumerate() {
            top_scores[h] = u32::from(evaluate_plo_best(hand.cards(), &runout.top)?.value());
            bottom_scores[h] = u32::from(evaluate_plo_best(hand.cards(), &runout.bottom)?.value());
        }

        let mut top_won = vec![false; hands.len()];
        let mut bottom_won = vec![false; hands.len()];
        for w in winners(&top_scores) {
            top_won[w] = true;
        }
        for w in winners(&bottom_scores) {
            bottom_won[w] = true;
        }
        let top_sole = top_won.iter().filter(|&&w| w).count() == 1;
        let bottom_sole = bottom_won.iter().filter(|&&w| w).count() == 1;

        for h in 0..hands.len() {
            if top_won[h] {
                counts.split_top[h] += 1;
            }
            if bottom_won[h] {
                counts.split_bottom[h] += 1;
            }
            if top_won[h] && bottom_won[h] {
                if top_sole && bottom_sole {
                    counts.scoop_both[h] += 1;
                } else if !top_sole && !bottom_sole {
                    counts.chop_both[h] += 1;
                }
            }
        }
    }
    Ok(counts)
}

// ---------------------------------------------------------------------------
// Solver support
// ---------------------------------------------------------------------------

/// Pot share of each hand at showdown, as fractions summing to one. Ties
/// split between co-winners; a double board splits the pot in half per
/// board. Runs on the caller's thread with the caller's RNG.
pub fn showdown_equity<R: Rng + ?Sized>(
    hands: &[Hand],
    board: &Board,
    samples: u32,
    rng: &mut R,
) -> GtoResult<Vec<f64>> {
    let used = validate_hands_and_board(hands, board, &[])?;
    let missing = board.missing();
    let samples = if missing == 0 { 1 } else { samples.max(1) };
    let boards_per_runout = if board.is_double() { 2.0 } else { 1.0 };

    let mut deck = Deck::excluding(&used);
    let mut runout = Runout::new();
    let mut shares = vec![0.0; hands.len()];
    let mut scores = vec![0u32; hands.len()];

    let credit = |scores: &[u32], shares: &mut [f64]| {
        let won: Vec<usize> = winners(scores).collect();
        let share = 1.0 / (won.len() as f64 * boards_per_runout);
        for w in won {
            shares[w] += share;
        }
    };

    for _ in 0..samples {
        let drawn = deck.draw(missing, rng)?;
        runout.fill(board, drawn);

        for (h, hand) in hands.iter().enumerate() {
            scores[h] = u32::from(evaluate_plo_best(hand.cards(), &runout.top)?.value());
        }
        credit(&scores, &mut shares);
        if runout.is_double() {
            for (h, hand) in hands.iter().enumerate() {
                scores[h] = u32::from(evaluate_plo_best(hand.cards(), &runout.bottom)?.value());
            }
            credit(&scores, &mut shares);
        }
    }

    let n = f64::from(samples);
    Ok(shares.into_iter().map(|s| s / n).collect())
}
