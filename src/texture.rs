//! Board texture and hand-strength buckets.
//!
//! Texture feeds both the CFR information-set key and the nutability
//! report; buckets are the coarse hand classes the solver learns over.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cards::{Card, Hand, ALL_SUITS, FULL_BOARD};
use crate::error::{GtoError, GtoResult};
use crate::hand_evaluator::{evaluate_plo_best, HandCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suitedness {
    Rainbow,
    TwoTone,
    /// Three or more cards of one suit: a flush is live.
    Monotone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectedness {
    Disconnected,
    SemiConnected,
    Connected,
}

impl fmt::Display for Connectedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectedness::Disconnected => write!(f, "disconnected"),
            Connectedness::SemiConnected => write!(f, "semi-connected"),
            Connectedness::Connected => write!(f, "connected"),
        }
    }
}

/// How readily the board hands out nut hands and nut draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nutability {
    Static,
    Dynamic,
    DrawHeavy,
}

impl fmt::Display for Nutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nutability::Static => write!(f, "static"),
            Nutability::Dynamic => write!(f, "dynamic"),
            Nutability::DrawHeavy => write!(f, "draw-heavy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardTexture {
    pub cards: Vec<Card>,
    pub suitedness: Suitedness,
    pub is_paired: bool,
    pub connectedness: Connectedness,
    pub flush_possible: bool,
    pub straight_possible: bool,
    pub flush_draw_possible: bool,
    pub straight_draw_possible: bool,
    /// 0.0 (bone dry) to 1.0 (every draw live).
    pub draw_heaviness: f64,
    pub nutability: Nutability,
}

impl BoardTexture {
    /// Short stable code used inside information-set keys.
    pub fn code(&self) -> String {
        let suit = match self.suitedness {
            Suitedness::Rainbow => 'r',
            Suitedness::TwoTone => 't',
            Suitedness::Monotone => 'm',
        };
        let pair = if self.is_paired { 'p' } else { 'u' };
        let conn = match self.connectedness {
            Connectedness::Disconnected => 'd',
            Connectedness::SemiConnected => 's',
            Connectedness::Connected => 'c',
        };
        format!("{}{}{}", suit, pair, conn)
    }
}

/// Texture code for any board, `pf` before the flop.
pub fn texture_code(board: &[Card]) -> String {
    match analyze_board(board) {
        Ok(texture) => texture.code(),
        Err(_) => "pf".to_string(),
    }
}

fn rank_mask(cards: &[Card]) -> u16 {
    cards.iter().fold(0u16, |m, c| m | 1 << c.rank().index())
}

/// Largest number of distinct ranks inside any five-rank straight window,
/// counting the ace as low for the wheel.
fn max_straight_window(mask: u16) -> u32 {
    let with_low_ace = (mask << 1) | ((mask >> 12) & 1);
    (0..=9)
        .map(|low| ((with_low_ace >> low) & 0b11111).count_ones())
        .max()
        .unwrap_or(0)
}

fn max_suit_count(cards: &[Card]) -> usize {
    ALL_SUITS
        .iter()
        .map(|&s| cards.iter().filter(|c| c.suit() == s).count())
        .max()
        .unwrap_or(0)
}

pub fn analyze_board(board: &[Card]) -> GtoResult<BoardTexture> {
    if board.len() < 3 {
        return Err(GtoError::InvalidBoardLength { len: board.len() });
    }

    let max_suit = max_suit_count(board);
    let suitedness = match max_suit {
        0 | 1 => Suitedness::Rainbow,
        2 => Suitedness::TwoTone,
        _ => Suitedness::Monotone,
    };

    let mask = rank_mask(board);
    let is_paired = (mask.count_ones() as usize) < board.len();

    let mut values: Vec<u8> = board.iter().map(|c| c.value()).collect();
    values.sort_unstable();
    values.dedup();
    let gaps: Vec<u8> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let has_connected = gaps.iter().any(|&g| g == 1);
    let has_one_gap = gaps.iter().any(|&g| g == 2);
    let connectedness = if has_connected && gaps.iter().filter(|&&g| g <= 2).count() >= 2 {
        Connectedness::Connected
    } else if has_connected || has_one_gap {
        Connectedness::SemiConnected
    } else {
        Connectedness::Disconnected
    };

    let more_to_come = board.len() < FULL_BOARD;
    let window = max_straight_window(mask);
    let flush_possible = max_suit >= 3;
    let straight_possible = window >= 3;
    let flush_draw_possible = more_to_come && max_suit == 2;
    let straight_draw_possible = more_to_come && window == 2;

    let mut wet_score: i32 = 0;
    match suitedness {
        Suitedness::Monotone => wet_score += 3,
        Suitedness::TwoTone if more_to_come => wet_score += 1,
        _ => {}
    }
    match connectedness {
        Connectedness::Connected => wet_score += 2,
        Connectedness::SemiConnected => wet_score += 1,
        Connectedness::Disconnected => {}
    }
    if straight_possible {
        wet_score += 1;
    }
    if is_paired {
        wet_score -= 1;
    }
    let draw_heaviness = (f64::from(wet_score.max(0)) / 6.0).min(1.0);

    let nutability = if wet_score >= 4 {
        Nutability::DrawHeavy
    } else if wet_score >= 2 || is_paired {
        Nutability::Dynamic
    } else {
        Nutability::Static
    };

    Ok(BoardTexture {
        cards: board.to_vec(),
        suitedness,
        is_paired,
        connectedness,
        flush_possible,
        straight_possible,
        flush_draw_possible,
        straight_draw_possible,
        draw_heaviness,
        nutability,
    })
}

/// Coarse strength class of a hand on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandBucket {
    /// Straight or better.
    Nutted,
    /// Two pair or a set.
    Strong,
    Medium,
    Draw,
    Air,
}

impl HandBucket {
    pub const ALL: [HandBucket; 5] = [
        HandBucket::Nutted,
        HandBucket::Strong,
        HandBucket::Medium,
        HandBucket::Draw,
        HandBucket::Air,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn code(self) -> char {
        match self {
            HandBucket::Nutted => 'N',
            HandBucket::Strong => 'S',
            HandBucket::Medium => 'M',
            HandBucket::Draw => 'D',
            HandBucket::Air => 'A',
        }
    }

    pub fn classify(hand: &Hand, board: &[Card]) -> HandBucket {
        if board.len() < 3 {
            return preflop_bucket(hand);
        }
        let category = match evaluate_plo_best(hand.cards(), board) {
            Ok(score) => score.category(),
            Err(_) => return HandBucket::Air,
        };
        match category {
            HandCategory::Straight
            | HandCategory::Flush
            | HandCategory::FullHouse
            | HandCategory::FourOfAKind
            | HandCategory::StraightFlush => HandBucket::Nutted,
            HandCategory::TwoPair | HandCategory::ThreeOfAKind => HandBucket::Strong,
            HandCategory::OnePair => HandBucket::Medium,
            HandCategory::HighCard if has_draw(hand, board) => HandBucket::Draw,
            HandCategory::HighCard => HandBucket::Air,
        }
    }
}

impl fmt::Display for HandBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandBucket::Nutted => write!(f, "nutted"),
            HandBucket::Strong => write!(f, "strong"),
            HandBucket::Medium => write!(f, "medium"),
            HandBucket::Draw => write!(f, "draw"),
            HandBucket::Air => write!(f, "air"),
        }
    }
}

/// Flush draw (two suited hole cards plus two on board) or a straight draw
/// using exactly two hole and two board ranks.
fn has_draw(hand: &Hand, board: &[Card]) -> bool {
    if board.len() >= FULL_BOARD {
        return false;
    }
    let hole = hand.cards();
    let flush_draw = ALL_SUITS.iter().any(|&s| {
        hole.iter().filter(|c| c.suit() == s).count() >= 2
            && board.iter().filter(|c| c.suit() == s).count() == 2
    });
    if flush_draw {
        return true;
    }
    let board_mask = rank_mask(board);
    for (i, a) in hole.iter().enumerate() {
        for b in &hole[i + 1..] {
            let hole_mask = rank_mask(&[*a, *b]);
            if hole_mask.count_ones() == 2
                && hole_mask & board_mask == 0
                && max_straight_window(hole_mask | board_mask) >= 4
            {
                return true;
            }
        }
    }
    false
}

fn preflop_bucket(hand: &Hand) -> HandBucket {
    let cards = hand.cards();
    let mask = rank_mask(cards);
    let paired = (mask.count_ones() as usize) < cards.len();
    let high_pair = cards.iter().enumerate().any(|(i, a)| {
        a.value() >= 10 && cards[i + 1..].iter().any(|b| b.rank() == a.rank())
    });
    let suited_suits = ALL_SUITS
        .iter()
        .filter(|&&s| cards.iter().filter(|c| c.suit() == s).count() >= 2)
        .count();
    let connected = max_straight_window(mask) >= 4;

    if high_pair && suited_suits >= 1 {
        HandBucket::Strong
    } else if suited_suits == 2 || (suited_suits == 1 && connected) {
        HandBucket::Draw
    } else if paired {
        HandBucket::Medium
    } else {
        HandBucket::Air
    }
}
