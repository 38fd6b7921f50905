//! PLO hand ranking.
//!
//! Scores follow the classic 7462-class equivalence ordering: 1 is a royal
//! flush, 7462 is 7-5-4-3-2 offsuit, and lower is always better. Category
//! boundaries are part of the public contract:
//!
//! | Category        | Scores      |
//! |-----------------|-------------|
//! | Straight flush  | 1–10        |
//! | Four of a kind  | 11–166      |
//! | Full house      | 167–322     |
//! | Flush           | 323–1599    |
//! | Straight        | 1600–1609   |
//! | Three of a kind | 1610–2467   |
//! | Two pair        | 2468–3325   |
//! | One pair        | 3326–6185   |
//! | High card       | 6186–7462   |
//!
//! Scores are computed arithmetically from the rank pattern instead of a
//! prime-product lookup: within a category, a hand's offset is the number
//! of same-category rank patterns that beat it.

use std::fmt;

use itertools::Itertools;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::cards::{check_board_len, Card, HOLE_CARDS};
use crate::error::{GtoError, GtoResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HandCategory {
    HighCard = 0,
    OnePair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
}

impl HandCategory {
    pub const COUNT: usize = 9;

    pub const ALL: [HandCategory; HandCategory::COUNT] = [
        HandCategory::HighCard,
        HandCategory::OnePair,
        HandCategory::TwoPair,
        HandCategory::ThreeOfAKind,
        HandCategory::Straight,
        HandCategory::Flush,
        HandCategory::FullHouse,
        HandCategory::FourOfAKind,
        HandCategory::StraightFlush,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandCategory::HighCard => write!(f, "High Card"),
            HandCategory::OnePair => write!(f, "One Pair"),
            HandCategory::TwoPair => write!(f, "Two Pair"),
            HandCategory::ThreeOfAKind => write!(f, "Three of a Kind"),
            HandCategory::Straight => write!(f, "Straight"),
            HandCategory::Flush => write!(f, "Flush"),
            HandCategory::FullHouse => write!(f, "Full House"),
            HandCategory::FourOfAKind => write!(f, "Four of a Kind"),
            HandCategory::StraightFlush => write!(f, "Straight Flush"),
        }
    }
}

/// Hand rank where lower is strictly better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HandScore(pub u16);

impl HandScore {
    pub const BEST: HandScore = HandScore(1);
    pub const WORST: HandScore = HandScore(7462);

    pub fn value(self) -> u16 {
        self.0
    }

    pub fn category(self) -> HandCategory {
        categorize(self)
    }

    /// True when `self` beats `other`.
    pub fn beats(self, other: HandScore) -> bool {
        self.0 < other.0
    }
}

const STRAIGHT_FLUSH_BASE: u16 = 1;
const QUADS_BASE: u16 = 11;
const FULL_HOUSE_BASE: u16 = 167;
const FLUSH_BASE: u16 = 323;
const STRAIGHT_BASE: u16 = 1600;
const TRIPS_BASE: u16 = 1610;
const TWO_PAIR_BASE: u16 = 2468;
const PAIR_BASE: u16 = 3326;
const HIGH_CARD_BASE: u16 = 6186;

/// Applies the fixed boundary table.
pub fn categorize(score: HandScore) -> HandCategory {
    match score.0 {
        0..=10 => HandCategory::StraightFlush,
        11..=166 => HandCategory::FourOfAKind,
        167..=322 => HandCategory::FullHouse,
        323..=1599 => HandCategory::Flush,
        1600..=1609 => HandCategory::Straight,
        1610..=2467 => HandCategory::ThreeOfAKind,
        2468..=3325 => HandCategory::TwoPair,
        3326..=6185 => HandCategory::OnePair,
        _ => HandCategory::HighCard,
    }
}

const ALL_RANKS_MASK: u16 = (1 << 13) - 1;
const WHEEL_MASK: u16 = (1 << 12) | 0b1111;

/// Highest rank index of a five-rank straight, 3 for the wheel.
fn straight_high(mask: u16) -> Option<u16> {
    if mask == WHEEL_MASK {
        return Some(3);
    }
    let low = mask.trailing_zeros();
    if low <= 8 && mask == 0b11111 << low {
        Some(low as u16 + 4)
    } else {
        None
    }
}

fn binomial(n: u32, k: u32) -> u16 {
    if k > n {
        return 0;
    }
    let mut acc: u32 = 1;
    for i in 0..k {
        acc = acc * (n - i) / (i + 1);
    }
    acc as u16
}

/// Number of `k`-subsets of `available` that rank above `mask`. Comparing
/// rank masks numerically is the same as comparing sorted kickers.
fn subsets_above(mask: u16, available: u16, mut k: u32) -> u16 {
    let mut above = 0;
    for bit in (0..13).rev() {
        if k == 0 {
            break;
        }
        let b = 1u16 << bit;
        if available & b == 0 {
            continue;
        }
        if mask & b != 0 {
            k -= 1;
        } else {
            let below = (available & (b - 1)).count_ones();
            above += binomial(below, k - 1);
        }
    }
    above
}

/// Offset of each non-straight five-rank mask among all such masks, best first.
static DISTINCT_FIVE: Lazy<Vec<u16>> = Lazy::new(|| {
    let mut table = vec![0u16; 1 << 13];
    let mut next = 0;
    for mask in (0..=ALL_RANKS_MASK).rev() {
        if mask.count_ones() == 5 && straight_high(mask).is_none() {
            table[mask as usize] = next;
            next += 1;
        }
    }
    table
});

/// Ranks strictly above `rank` that are not in `excluded`.
fn ranks_above(rank: u16, excluded: u16) -> u16 {
    let above = ALL_RANKS_MASK & !((2u16 << rank) - 1);
    (above & !excluded).count_ones() as u16
}

/// Ranks a concrete 5-card hand.
pub fn evaluate_5(cards: &[Card; 5]) -> HandScore {
    let mut counts = [0u8; 13];
    let mut mask: u16 = 0;
    let suit = cards[0].suit();
    let mut flush = true;
    for c in cards {
        let r = c.rank().index();
        counts[r] += 1;
        mask |= 1 << r;
        flush &= c.suit() == suit;
    }

    if mask.count_ones() == 5 {
        let score = match (flush, straight_high(mask)) {
            (true, Some(high)) => STRAIGHT_FLUSH_BASE + (12 - high),
            (true, None) => FLUSH_BASE + DISTINCT_FIVE[mask as usize],
            (false, Some(high)) => STRAIGHT_BASE + (12 - high),
            (false, None) => HIGH_CARD_BASE + DISTINCT_FIVE[mask as usize],
        };
        return HandScore(score);
    }

    let mut quads = None;
    let mut trips = None;
    let mut pairs: u16 = 0;
    let mut singles: u16 = 0;
    for (r, &n) in counts.iter().enumerate() {
        match n {
            4 => quads = Some(r as u16),
            3 => trips = Some(r as u16),
            2 => pairs |= 1 << r,
            1 => singles |= 1 << r,
            _ => {}
        }
    }

    let score = if let Some(q) = quads {
        let kicker = 15 - singles.leading_zeros() as u16;
        QUADS_BASE + (12 - q) * 12 + ranks_above(kicker, 1 << q)
    } else if let Some(t) = trips {
        if pairs != 0 {
            let p = pairs.trailing_zeros() as u16;
            FULL_HOUSE_BASE + (12 - t) * 12 + ranks_above(p, 1 << t)
        } else {
            TRIPS_BASE + (12 - t) * 66 + subsets_above(singles, ALL_RANKS_MASK & !(1 << t), 2)
        }
    } else if pairs.count_ones() == 2 {
        let kicker = singles.trailing_zeros() as u16;
        TWO_PAIR_BASE + subsets_above(pairs, ALL_RANKS_MASK, 2) * 11 + ranks_above(kicker, pairs)
    } else {
        let p = pairs.trailing_zeros() as u16;
        PAIR_BASE + (12 - p) * 220 + subsets_above(singles, ALL_RANKS_MASK & !(1 << p), 3)
    };
    HandScore(score)
}

/// Best hand using exactly two hole cards and exactly three board cards.
pub fn evaluate_plo_best(hole: &[Card], board: &[Card]) -> GtoResult<HandScore> {
    if hole.len() != HOLE_CARDS {
        return Err(GtoError::InvalidHoleCards { got: hole.len() });
    }
    if board.len() < 3 {
        return Err(GtoError::InvalidBoardLength { len: board.len() });
    }
    check_board_len(board.len())?;

    let mut best = HandScore(u16::MAX);
    for (&h0, &h1) in hole.iter().tuple_combinations() {
        for (&b0, &b1, &b2) in board.iter().tuple_combinations() {
            let score = evaluate_5(&[h0, h1, b0, b1, b2]);
            if score.beats(best) {
                best = score;
            }
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::parse_board;

    fn five(s: &str) -> [Card; 5] {
        let v = parse_board(s).unwrap();
        [v[0], v[1], v[2], v[3], v[4]]
    }

    #[test]
    fn category_extremes() {
        assert_eq!(evaluate_5(&five("AhKhQhJhTh")), HandScore(1));
        assert_eq!(evaluate_5(&five("5h4h3h2hAh")), HandScore(10));
        assert_eq!(evaluate_5(&five("AhAdAcAsKh")), HandScore(11));
        assert_eq!(evaluate_5(&five("2h2d2c2s3h")), HandScore(166));
        assert_eq!(evaluate_5(&five("AhAdAcKsKh")), HandScore(167));
        assert_eq!(evaluate_5(&five("2h2d2c3s3h")), HandScore(322));
        assert_eq!(evaluate_5(&five("AhKhQhJh9h")), HandScore(323));
        assert_eq!(evaluate_5(&five("7h5h4h3h2h")), HandScore(1599));
        assert_eq!(evaluate_5(&five("AhKdQhJhTh")), HandScore(1600));
        assert_eq!(evaluate_5(&five("5h4d3h2hAh")), HandScore(1609));
        assert_eq!(evaluate_5(&five("AhAdAcKsQh")), HandScore(1610));
        assert_eq!(evaluate_5(&five("2h2d2c4s3h")), HandScore(2467));
        assert_eq!(evaluate_5(&five("AhAdKcKsQh")), HandScore(2468));
        assert_eq!(evaluate_5(&five("3h3d2c2s4h")), HandScore(3325));
        assert_eq!(evaluate_5(&five("AhAdKcQsJh")), HandScore(3326));
        assert_eq!(evaluate_5(&five("2h2d5c4s3h")), HandScore(6185));
        assert_eq!(evaluate_5(&five("AhKdQcJs9h")), HandScore(6186));
        assert_eq!(evaluate_5(&five("7h5d4c3s2h")), HandScore(7462));
    }

    #[test]
    fn kickers_order_within_category() {
        let better = evaluate_5(&five("AhAdKcQsJh"));
        let worse = evaluate_5(&five("AhAdKcQs9h"));
        assert!(better.beats(worse));
        let two_pair_high = evaluate_5(&five("KhKdQcQs2h"));
        let two_pair_low = evaluate_5(&five("KhKd3c3sAh"));
        assert!(two_pair_high.beats(two_pair_low));
    }

    #[test]
    fn subsets_above_counts_better_kickers() {
        assert_eq!(subsets_above(0b11 << 11, ALL_RANKS_MASK, 2), 0);
        assert_eq!(subsets_above(0b11, ALL_RANKS_MASK, 2), 77);
    }

    #[test]
    fn distinct_five_table_covers_1277_patterns() {
        let max = (0..=ALL_RANKS_MASK)
            .filter(|m| m.count_ones() == 5 && straight_high(*m).is_none())
            .map(|m| DISTINCT_FIVE[m as usize])
            .max();
        assert_eq!(max, Some(1276));
    }
}
