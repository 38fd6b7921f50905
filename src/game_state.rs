//! Betting state for the CFR solver.
//!
//! A `GameState` is a value: `apply` returns a new state and never mutates
//! the one it is called on, so recursion can branch freely from a shared
//! ancestor.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::cards::{ensure_disjoint, Board, Card, Hand};
use crate::error::{GtoError, GtoResult};
use crate::math_engine::pot_odds;
use crate::texture::{texture_code, HandBucket};

const EPS: f64 = 1e-9;

/// Number of trailing actions folded into an information-set key.
pub const HISTORY_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Street {
    pub fn from_board_len(len: usize) -> Street {
        match len {
            0..=2 => Street::Preflop,
            3 => Street::Flop,
            4 => Street::Turn,
            _ => Street::River,
        }
    }

    fn code(self) -> char {
        match self {
            Street::Preflop => 'p',
            Street::Flop => 'f',
            Street::Turn => 't',
            Street::River => 'r',
            Street::Showdown => 's',
        }
    }
}

/// A betting decision. `to` is the total the player has in front of them
/// on this street after the action ("raise to").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Fold,
    Check,
    Call,
    Bet { to: f64 },
    Raise { to: f64 },
}

impl Action {
    /// Builds an action from its name and, for bets and raises, the
    /// street total it makes.
    pub fn parse(name: &str, to: Option<f64>) -> GtoResult<Action> {
        let sized = |a: Option<f64>| {
            a.filter(|v| v.is_finite() && *v > 0.0)
                .ok_or_else(|| GtoError::InvalidValue(format!("{} needs a positive amount", name)))
        };
        match name.to_ascii_lowercase().as_str() {
            "fold" => Ok(Action::Fold),
            "check" => Ok(Action::Check),
            "call" => Ok(Action::Call),
            "bet" => Ok(Action::Bet { to: sized(to)? }),
            "raise" => Ok(Action::Raise { to: sized(to)? }),
            other => Err(GtoError::InvalidValue(format!("unknown action: {}", other))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Fold => "fold",
            Action::Check => "check",
            Action::Call => "call",
            Action::Bet { .. } => "bet",
            Action::Raise { .. } => "raise",
        }
    }

    pub fn is_aggressive(&self) -> bool {
        matches!(self, Action::Bet { .. } | Action::Raise { .. })
    }

    pub fn raise_to(&self) -> Option<f64> {
        match self {
            Action::Bet { to } | Action::Raise { to } => Some(*to),
            _ => None,
        }
    }

    fn kind_code(&self) -> char {
        match self {
            Action::Fold => 'f',
            Action::Check => 'x',
            Action::Call => 'c',
            Action::Bet { .. } => 'b',
            Action::Raise { .. } => 'r',
        }
    }
}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind_code().hash(state);
        if let Some(a) = self.raise_to() {
            a.to_bits().hash(state);
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raise_to() {
            Some(a) => write!(f, "{} {:.1}", self.name(), a),
            None => write!(f, "{}", self.name()),
        }
    }
}

/// One entry of the betting history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBetRecord", into = "RawBetRecord")]
pub struct BetRecord {
    pub player: usize,
    pub action: Action,
    /// Chips the action moved from the player's stack into the pot.
    pub put_in: f64,
    /// `None` means the street the state is on.
    pub street: Option<Street>,
}

impl BetRecord {
    fn on_street(&self, street: Street) -> bool {
        self.street.map_or(true, |s| s == street)
    }
}

/// Wire shapes accepted for a history entry: a `[player, "action", amount]`
/// triple or a `{player, action, to, put_in, street}` map. A bare `amount`
/// stands in for whichever of `to` and `put_in` is missing. Records are
/// always written back as the map with `to` and `put_in`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawBetRecord {
    Triple(usize, String, f64),
    Map {
        player: usize,
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        put_in: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        street: Option<Street>,
    },
}

impl TryFrom<RawBetRecord> for BetRecord {
    type Error = GtoError;

    fn try_from(raw: RawBetRecord) -> GtoResult<BetRecord> {
        let (player, name, to, put_in, street) = match raw {
            RawBetRecord::Triple(p, a, amt) => (p, a, Some(amt), Some(amt), None),
            RawBetRecord::Map {
                player,
                action,
                to,
                put_in,
                amount,
                street,
            } => (player, action, to.or(amount), put_in.or(amount), street),
        };
        let action = Action::parse(&name, to)?;
        let put_in = put_in.unwrap_or(0.0);
        if !put_in.is_finite() || put_in < 0.0 {
            return Err(GtoError::InvalidValue(format!("bad amount {}", put_in)));
        }
        Ok(BetRecord {
            player,
            action,
            put_in,
            street,
        })
    }
}

impl From<BetRecord> for RawBetRecord {
    fn from(r: BetRecord) -> RawBetRecord {
        RawBetRecord::Map {
            player: r.player,
            action: r.action.name().to_string(),
            to: r.action.raise_to(),
            put_in: Some(r.put_in),
            amount: None,
            street: r.street,
        }
    }
}

/// Pot-fraction bet menu for legal-action generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetMenu {
    pub fractions: Vec<f64>,
    /// Smallest bet as a fraction of the pot.
    pub min_bet_fraction: f64,
    /// Cap every size at the pot-limit maximum.
    pub pot_limit: bool,
}

impl Default for BetMenu {
    fn default() -> Self {
        BetMenu {
            fractions: vec![0.33, 0.66, 1.0],
            min_bet_fraction: 0.25,
            pot_limit: true,
        }
    }
}

/// When a betting round counts as finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureRule {
    /// Every active player has acted at least once this street. Ignores
    /// action reopened by a raise.
    #[default]
    EveryoneActedOnce,
    /// Everyone has acted since the last bet or raise and all live bets
    /// are matched or all-in.
    MatchedBets,
}

/// Abstract key for a decision point. Many states share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InfoSet(String);

impl InfoSet {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Adds the acting player's hand bucket and the shape of the legal
    /// action list, so every state under one key offers the same actions.
    pub fn refine(&self, bucket: HandBucket, actions: &[Action]) -> InfoSet {
        let shape: String = actions.iter().map(|a| a.kind_code()).collect();
        InfoSet(format!("{}|{}|{}", self.0, bucket.code(), shape))
    }
}

impl From<&str> for InfoSet {
    fn from(key: &str) -> InfoSet {
        InfoSet(key.to_string())
    }
}

impl fmt::Display for InfoSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Player to act.
    pub player_position: usize,
    /// Players still in the hand, in acting order.
    pub active_players: Vec<usize>,
    pub board: Board,
    pub pot_size: f64,
    /// Highest total any player has in front of them this street.
    pub current_bet: f64,
    pub stacks: Vec<f64>,
    /// Chips each player has put in this street; empty means none yet.
    #[serde(default)]
    pub street_bets: Vec<f64>,
    #[serde(default)]
    pub betting_history: Vec<BetRecord>,
    pub street: Street,
    /// Possible hole cards per player; an empty range is unknown.
    #[serde(default)]
    pub ranges: Vec<Vec<Hand>>,
}

impl GameState {
    /// Fresh state with everyone active, first player to act, no bets.
    pub fn new(stacks: Vec<f64>, pot_size: f64, board: Board) -> GameState {
        let n = stacks.len();
        let street = Street::from_board_len(board.primary().len());
        GameState {
            player_position: 0,
            active_players: (0..n).collect(),
            board,
            pot_size,
            current_bet: 0.0,
            stacks,
            street_bets: vec![0.0; n],
            betting_history: Vec::new(),
            street,
            ranges: vec![Vec::new(); n],
        }
    }

    pub fn from_json(json: &str) -> GtoResult<GameState> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn num_players(&self) -> usize {
        self.stacks.len()
    }

    pub fn stack(&self, player: usize) -> f64 {
        self.stacks.get(player).copied().unwrap_or(0.0)
    }

    pub fn street_bet(&self, player: usize) -> f64 {
        self.street_bets.get(player).copied().unwrap_or(0.0)
    }

    pub fn to_call(&self, player: usize) -> f64 {
        (self.current_bet - self.street_bet(player)).max(0.0)
    }

    pub fn range(&self, player: usize) -> &[Hand] {
        self.ranges.get(player).map_or(&[], |r| r.as_slice())
    }

    /// Checks the fields a solve depends on.
    pub fn validate(&self) -> GtoResult<()> {
        let bad = |msg: String| Err(GtoError::SolverConstruction(msg));
        let n = self.num_players();
        if n < 2 {
            return bad(format!("need at least 2 players, got {}", n));
        }
        if n > 64 {
            return bad(format!("at most 64 players are supported, got {}", n));
        }
        if self.active_players.is_empty() {
            return bad("no active players".to_string());
        }
        let mut seen = 0u64;
        for &p in &self.active_players {
            if p >= n {
                return bad(format!("active player {} has no stack", p));
            }
            if seen & (1 << p) != 0 {
                return bad(format!("active player {} listed twice", p));
            }
            seen |= 1 << p;
        }
        if !self.active_players.contains(&self.player_position) {
            return bad(format!(
                "player to act {} is not active",
                self.player_position
            ));
        }
        let amounts = [self.pot_size, self.current_bet];
        if amounts
            .iter()
            .chain(&self.stacks)
            .chain(&self.street_bets)
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return bad("pot, bets and stacks must be finite and non-negative".to_string());
        }
        if !self.street_bets.is_empty() && self.street_bets.len() != n {
            return bad(format!("{} street bets for {} players", self.street_bets.len(), n));
        }
        if !self.ranges.is_empty() && self.ranges.len() != n {
            return bad(format!("{} ranges for {} players", self.ranges.len(), n));
        }
        if let Some(r) = self.betting_history.iter().find(|r| r.player >= n) {
            return bad(format!("history names unknown player {}", r.player));
        }
        self.board.validate()?;
        let board_cards: Vec<&[Card]> = self.board.boards();
        let used = ensure_disjoint(&board_cards)?;
        for hand in self.ranges.iter().flatten() {
            if let Some(c) = hand.cards().iter().find(|c| used.contains(**c)) {
                return Err(GtoError::DuplicateCard(*c));
            }
        }
        Ok(())
    }

    /// Pads per-player vectors so every index is addressable.
    pub fn normalized(&self) -> GameState {
        let mut s = self.clone();
        let n = s.num_players();
        s.street_bets.resize(n, 0.0);
        s.ranges.resize(n, Vec::new());
        s
    }

    /// Legal actions for the player to act.
    pub fn legal_actions(&self, menu: &BetMenu) -> Vec<Action> {
        let p = self.player_position;
        let stack = self.stack(p);
        let to_call = self.to_call(p);

        let mut actions = Vec::new();
        if to_call > EPS {
            actions.push(Action::Fold);
            if stack + EPS >= to_call {
                actions.push(Action::Call);
            }
        } else {
            actions.push(Action::Check);
        }

        let mut max_to = self.street_bet(p) + stack;
        if menu.pot_limit {
            max_to = max_to.min(self.current_bet + self.pot_size + to_call);
        }
        let floor = (2.0 * self.current_bet).max(menu.min_bet_fraction * self.pot_size);

        let mut sizes: Vec<f64> = Vec::new();
        for &fraction in &menu.fractions {
            let size = (fraction * self.pot_size).max(floor).min(max_to);
            if size > self.current_bet + EPS && !sizes.iter().any(|s| (s - size).abs() < EPS) {
                sizes.push(size);
            }
        }
        for size in sizes {
            actions.push(if self.current_bet > EPS {
                Action::Raise { to: size }
            } else {
                Action::Bet { to: size }
            });
        }
        actions
    }

    /// The state after the player to act takes `action`.
    pub fn apply(&self, action: Action) -> GtoResult<GameState> {
        let p = self.player_position;
        if p >= self.num_players() {
            return Err(GtoError::SolverConstruction(format!(
                "player {} has no stack ({} players)",
                p,
                self.num_players()
            )));
        }
        if !self.active_players.contains(&p) {
            return Err(GtoError::InvalidValue(format!("player {} is not active", p)));
        }
        let mut next = self.normalized();
        let to_call = self.to_call(p);
        let put_in = match action {
            Action::Fold => {
                next.active_players.retain(|&q| q != p);
                0.0
            }
            Action::Check => {
                if to_call > EPS {
                    return Err(GtoError::InvalidValue(format!(
                        "player {} cannot check facing {:.2}",
                        p, to_call
                    )));
                }
                0.0
            }
            Action::Call => to_call.min(self.stack(p)),
            Action::Bet { to } | Action::Raise { to } => {
                if to <= self.current_bet + EPS {
                    return Err(GtoError::InvalidValue(format!(
                        "{} must exceed the current bet {:.2}",
                        action, self.current_bet
                    )));
                }
                let add = to - self.street_bet(p);
                if add > self.stack(p) + EPS {
                    return Err(GtoError::InvalidValue(format!(
                        "{} exceeds player {}'s stack {:.2}",
                        action,
                        p,
                        self.stack(p)
                    )));
                }
                next.current_bet = to;
                add.min(self.stack(p))
            }
        };

        next.stacks[p] -= put_in;
        next.street_bets[p] += put_in;
        next.pot_size += put_in;
        next.betting_history.push(BetRecord {
            player: p,
            action,
            put_in,
            street: Some(self.street),
        });
        if let Some(q) = self.next_to_act(p, &next) {
            next.player_position = q;
        }
        Ok(next)
    }

    /// Next player after `from` in this state's acting order who is still
    /// active in `next` and has chips behind.
    fn next_to_act(&self, from: usize, next: &GameState) -> Option<usize> {
        let order = &self.active_players;
        let start = order.iter().position(|&q| q == from)?;
        (1..order.len())
            .map(|k| order[(start + k) % order.len()])
            .find(|q| next.active_players.contains(q) && next.stack(*q) > EPS)
    }

    pub fn is_terminal(&self, rule: ClosureRule) -> bool {
        if self.active_players.len() <= 1 || self.street == Street::Showdown {
            return true;
        }
        if !self.anyone_can_act() {
            return true;
        }
        match rule {
            ClosureRule::EveryoneActedOnce => self.everyone_acted_once(),
            ClosureRule::MatchedBets => self.bets_matched(),
        }
    }

    /// False when all live players are all-in, or only one has chips and
    /// owes nothing.
    fn anyone_can_act(&self) -> bool {
        let with_chips: Vec<usize> = self
            .active_players
            .iter()
            .copied()
            .filter(|&p| self.stack(p) > EPS)
            .collect();
        match with_chips.as_slice() {
            [] => false,
            [only] => self.to_call(*only) > EPS,
            _ => true,
        }
    }

    /// Approximate round closure: every active player has appeared in this
    /// street's history.
    pub fn everyone_acted_once(&self) -> bool {
        self.active_players.iter().all(|&p| {
            self.betting_history
                .iter()
                .any(|r| r.player == p && r.on_street(self.street))
        })
    }

    /// Exact round closure.
    pub fn bets_matched(&self) -> bool {
        let street_actions: Vec<&BetRecord> = self
            .betting_history
            .iter()
            .filter(|r| r.on_street(self.street))
            .collect();
        let since = street_actions
            .iter()
            .rposition(|r| r.action.is_aggressive())
            .unwrap_or(0);
        let acted_since: Vec<usize> = street_actions[since..].iter().map(|r| r.player).collect();

        self.active_players.iter().all(|&p| {
            let all_in = self.stack(p) <= EPS;
            let matched = self.to_call(p) <= EPS;
            all_in || (matched && acted_since.contains(&p))
        })
    }

    /// Public abstraction of the state: acting seat, street, board texture,
    /// pot-odds bucket and the last few actions sized against the pot.
    pub fn to_infoset(&self) -> InfoSet {
        let p = self.player_position;
        let odds = pot_odds(self.pot_size, self.to_call(p)).unwrap_or(0.0);
        let odds_bucket = ((odds * 10.0).floor() as usize).min(5);

        // Walk back from the current pot to size each action against the
        // pot it was made into.
        let start = self.betting_history.len().saturating_sub(HISTORY_WINDOW);
        let mut pot = self.pot_size;
        let mut history: Vec<String> = self.betting_history[start..]
            .iter()
            .rev()
            .map(|r| {
                pot -= r.put_in;
                action_code(r, pot)
            })
            .collect();
        history.reverse();

        InfoSet(format!(
            "p{}|{}|{}|po{}|{}",
            p,
            self.street.code(),
            texture_code(self.board.primary()),
            odds_bucket,
            history.join("-")
        ))
    }

    /// Content hash over every field, used as the spot-cache key.
    pub fn to_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Kind letter plus, for bets and raises, a size letter for the chips put
/// in against `pot_before`.
fn action_code(record: &BetRecord, pot_before: f64) -> String {
    if !record.action.is_aggressive() {
        return record.action.kind_code().to_string();
    }
    let fraction = if pot_before > EPS {
        record.put_in / pot_before
    } else {
        1.0
    };
    let size = if fraction <= 0.4 {
        's'
    } else if fraction <= 0.8 {
        'm'
    } else if fraction <= 1.2 {
        'p'
    } else {
        'o'
    };
    format!("{}{}", record.action.kind_code(), size)
}

impl Hash for GameState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<u64>>();
        self.player_position.hash(state);
        self.active_players.hash(state);
        self.board.hash(state);
        self.pot_size.to_bits().hash(state);
        self.current_bet.to_bits().hash(state);
        bits(&self.stacks).hash(state);
        bits(&self.street_bets).hash(state);
        for r in &self.betting_history {
            r.player.hash(state);
            r.action.hash(state);
            r.put_in.to_bits().hash(state);
            r.street.hash(state);
        }
        self.street.hash(state);
        self.ranges.hash(state);
    }
}
