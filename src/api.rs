//! String-in, tuple-out entry points for the job layer.
//!
//! Every function parses and cross-checks all of its cards before any
//! sampling starts, then delegates to the typed engine with the default
//! `SimulationConfig`.

use crate::cards::{parse_cards, Board, Card, Hand, FULL_BOARD};
use crate::equity::{self, CategoryBreakdown, SimulationConfig};
use crate::error::GtoResult;
use crate::game_state::GameState;
use crate::solver::{self, Solution};

fn parse_hands<S: AsRef<str>>(hands: &[[S; 4]]) -> GtoResult<Vec<Hand>> {
    hands
        .iter()
        .map(|h| Hand::try_from(parse_cards(h)?))
        .collect()
}

/// Flat board list to a `Board`. In double mode the first five cards (or
/// fewer, if that is all there is) are the top board and the rest the
/// bottom board.
pub fn split_board(cards: Vec<Card>, double_board: bool) -> Board {
    if !double_board {
        return Board::Single(cards);
    }
    let mut top = cards;
    let bottom = top.split_off(top.len().min(FULL_BOARD));
    Board::Double { top, bottom }
}

/// `(equity_pct, tie_pct)` per hand.
pub fn simulate_equity<S: AsRef<str>>(
    hands: &[[S; 4]],
    board: &[S],
    iterations: u32,
    double_board: bool,
) -> GtoResult<(Vec<f64>, Vec<f64>)> {
    let hands = parse_hands(hands)?;
    let board = split_board(parse_cards(board)?, double_board);
    let result = equity::simulate_equity(&hands, &board, iterations, &SimulationConfig::default())?;
    Ok((result.equity_pct(), result.tie_pct()))
}

/// `(equity_pct, tie_pct, hand_breakdown, opponent_breakdown)` for one hand
/// against random opponents.
pub fn simulate_estimated_equity<S: AsRef<str>>(
    hand: &[S; 4],
    board: &[S],
    iterations: u32,
    folded: &[S],
    max_hand_combinations: u32,
    num_opponents: usize,
) -> GtoResult<(f64, f64, CategoryBreakdown, CategoryBreakdown)> {
    let hand = Hand::try_from(parse_cards(hand)?)?;
    let board = parse_cards(board)?;
    let folded = parse_cards(folded)?;
    let result = equity::simulate_estimated_equity(
        &hand,
        &board,
        iterations,
        &folded,
        max_hand_combinations,
        num_opponents,
        &SimulationConfig::default(),
    )?;
    Ok((
        result.equity_pct(),
        result.tie_pct(),
        result.hand_breakdown,
        result.opponent_breakdown,
    ))
}

/// `(chop_both, scoop_both, split_top, split_bottom)`, each indexed by
/// player.
pub fn calculate_double_board_stats<S: AsRef<str>>(
    hands: &[[S; 4]],
    top_board: &[S],
    bottom_board: &[S],
    iterations: u32,
) -> GtoResult<(Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>)> {
    let hands = parse_hands(hands)?;
    let top = parse_cards(top_board)?;
    let bottom = parse_cards(bottom_board)?;
    let stats = equity::calculate_double_board_stats(
        &hands,
        &top,
        &bottom,
        iterations,
        &SimulationConfig::default(),
    )?;
    Ok((stats.chop_both, stats.scoop_both, stats.split_top, stats.split_bottom))
}

pub fn solve_spot(game_state: &GameState, iterations: Option<u32>) -> GtoResult<Solution> {
    solver::solve_spot(game_state, iterations)
}
