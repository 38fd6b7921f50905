use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GtoError, GtoResult};

pub const RANKS_STR: &str = "23456789TJQKA";
pub const SUITS_STR: &str = "hdcs";
pub const DECK_SIZE: usize = 52;
pub const HOLE_CARDS: usize = 4;
pub const FULL_BOARD: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
    Ten = 10,
    Jack = 11,
    Queen = 12,
    King = 13,
    Ace = 14,
}

impl Rank {
    /// Ranks are upper-case only: `"ah"` is not a card.
    pub fn from_char(c: char) -> GtoResult<Rank> {
        match c {
            '2' => Ok(Rank::Two),
            '3' => Ok(Rank::Three),
            '4' => Ok(Rank::Four),
            '5' => Ok(Rank::Five),
            '6' => Ok(Rank::Six),
            '7' => Ok(Rank::Seven),
            '8' => Ok(Rank::Eight),
            '9' => Ok(Rank::Nine),
            'T' => Ok(Rank::Ten),
            'J' => Ok(Rank::Jack),
            'Q' => Ok(Rank::Queen),
            'K' => Ok(Rank::King),
            'A' => Ok(Rank::Ace),
            _ => Err(GtoError::InvalidRank(c)),
        }
    }

    pub fn to_char(self) -> char {
        RANKS_STR.as_bytes()[self.index()] as char
    }

    /// Face value, 2 through 14.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Zero-based index, `Two` = 0 through `Ace` = 12.
    pub fn index(self) -> usize {
        self as usize - 2
    }

    fn from_index(idx: usize) -> Rank {
        ALL_RANKS[idx]
    }
}

pub const ALL_RANKS: [Rank; 13] = [
    Rank::Two,
    Rank::Three,
    Rank::Four,
    Rank::Five,
    Rank::Six,
    Rank::Seven,
    Rank::Eight,
    Rank::Nine,
    Rank::Ten,
    Rank::Jack,
    Rank::Queen,
    Rank::King,
    Rank::Ace,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Suit {
    Hearts = 0,
    Diamonds = 1,
    Clubs = 2,
    Spades = 3,
}

impl Suit {
    pub fn from_char(c: char) -> GtoResult<Suit> {
        match c {
            'h' => Ok(Suit::Hearts),
            'd' => Ok(Suit::Diamonds),
            'c' => Ok(Suit::Clubs),
            's' => Ok(Suit::Spades),
            _ => Err(GtoError::InvalidSuit(c)),
        }
    }

    pub fn to_char(self) -> char {
        SUITS_STR.as_bytes()[self as usize] as char
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Suit::Spades => "\u{2660}",
            Suit::Hearts => "\u{2665}",
            Suit::Diamonds => "\u{2666}",
            Suit::Clubs => "\u{2663}",
        }
    }
}

pub const ALL_SUITS: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

/// A card as an integer in `0..52`: `rank_index * 4 + suit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Card(u8);

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card((rank.index() * 4 + suit as usize) as u8)
    }

    pub fn from_index(idx: u8) -> GtoResult<Card> {
        if (idx as usize) < DECK_SIZE {
            Ok(Card(idx))
        } else {
            Err(GtoError::InvalidValue(format!("card index {} out of range", idx)))
        }
    }

    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn rank(self) -> Rank {
        Rank::from_index((self.0 / 4) as usize)
    }

    #[inline]
    pub fn suit(self) -> Suit {
        ALL_SUITS[(self.0 % 4) as usize]
    }

    #[inline]
    pub fn value(self) -> u8 {
        self.rank().value()
    }

    pub fn pretty(&self) -> String {
        format!("{}{}", self.rank().to_char(), self.suit().symbol())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank().to_char(), self.suit().to_char())
    }
}

impl FromStr for Card {
    type Err = GtoError;

    fn from_str(s: &str) -> GtoResult<Card> {
        parse_card(s)
    }
}

impl Serialize for Card {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Card, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_card(&s).map_err(serde::de::Error::custom)
    }
}

/// Set of cards as a 52-bit mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CardSet(u64);

impl CardSet {
    pub fn new() -> CardSet {
        CardSet(0)
    }

    #[inline]
    pub fn contains(&self, card: Card) -> bool {
        self.0 & (1u64 << card.0) != 0
    }

    /// Adds `card`, returning false if it was already present.
    #[inline]
    pub fn insert(&mut self, card: Card) -> bool {
        let bit = 1u64 << card.0;
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Inserts every card, failing on the first one already present.
    pub fn insert_all(&mut self, cards: &[Card]) -> GtoResult<()> {
        for &c in cards {
            if !self.insert(c) {
                return Err(GtoError::DuplicateCard(c));
            }
        }
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        DECK_SIZE - self.len()
    }
}

/// Four distinct PLO hole cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Card>", into = "Vec<Card>")]
pub struct Hand([Card; HOLE_CARDS]);

impl Hand {
    pub fn new(cards: [Card; HOLE_CARDS]) -> GtoResult<Hand> {
        Hand::try_from(cards.to_vec())
    }

    pub fn cards(&self) -> &[Card; HOLE_CARDS] {
        &self.0
    }
}

impl TryFrom<Vec<Card>> for Hand {
    type Error = GtoError;

    fn try_from(cards: Vec<Card>) -> GtoResult<Hand> {
        if cards.len() != HOLE_CARDS {
            return Err(GtoError::InvalidHoleCards { got: cards.len() });
        }
        let mut seen = CardSet::new();
        seen.insert_all(&cards)?;
        Ok(Hand([cards[0], cards[1], cards[2], cards[3]]))
    }
}

impl From<Hand> for Vec<Card> {
    fn from(hand: Hand) -> Vec<Card> {
        hand.0.to_vec()
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.0 {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Community cards: one board, or two for double-board games.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Board {
    Single(Vec<Card>),
    Double { top: Vec<Card>, bottom: Vec<Card> },
}

impl Board {
    pub fn is_double(&self) -> bool {
        matches!(self, Board::Double { .. })
    }

    /// The single board, or the top board of a double.
    pub fn primary(&self) -> &[Card] {
        match self {
            Board::Single(cards) => cards,
            Board::Double { top, .. } => top,
        }
    }

    pub fn boards(&self) -> Vec<&[Card]> {
        match self {
            Board::Single(cards) => vec![cards.as_slice()],
            Board::Double { top, bottom } => vec![top.as_slice(), bottom.as_slice()],
        }
    }

    pub fn validate(&self) -> GtoResult<()> {
        for b in self.boards() {
            check_board_len(b.len())?;
        }
        Ok(())
    }

    pub fn add_to(&self, used: &mut CardSet) -> GtoResult<()> {
        for b in self.boards() {
            used.insert_all(b)?;
        }
        Ok(())
    }

    /// Cards still to be dealt to bring every board to five.
    pub fn missing(&self) -> usize {
        self.boards().iter().map(|b| FULL_BOARD.saturating_sub(b.len())).sum()
    }
}

pub fn check_board_len(len: usize) -> GtoResult<()> {
    match len {
        0 | 3 | 4 | 5 => Ok(()),
        _ => Err(GtoError::InvalidBoardLength { len }),
    }
}

/// Cards not yet seen, drawn without replacement.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    pub fn excluding(used: &CardSet) -> Deck {
        let cards = (0..DECK_SIZE as u8)
            .map(Card)
            .filter(|c| !used.contains(*c))
            .collect();
        Deck { cards }
    }

    /// Partial Fisher-Yates: returns `n` distinct cards uniformly at random.
    /// Successive draws may repeat cards; draw everything an iteration needs
    /// in one call.
    pub fn draw<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> GtoResult<&[Card]> {
        if n > self.cards.len() {
            return Err(GtoError::InsufficientCards {
                requested: n,
                available: self.cards.len(),
            });
        }
        let (drawn, _) = self.cards.partial_shuffle(rng, n);
        Ok(drawn)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Draws `missing` cards uniformly from the deck minus `used`.
pub fn complete_board<R: Rng + ?Sized>(
    used: &CardSet,
    missing: usize,
    rng: &mut R,
) -> GtoResult<Vec<Card>> {
    let mut deck = Deck::excluding(used);
    Ok(deck.draw(missing, rng)?.to_vec())
}

/// Parses exactly two characters: rank `23456789TJQKA`, suit `hdcs`.
pub fn parse_card(notation: &str) -> GtoResult<Card> {
    let mut chars = notation.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(r), Some(s), None) => Ok(Card::new(Rank::from_char(r)?, Suit::from_char(s)?)),
        _ => Err(GtoError::InvalidCardNotation(notation.to_string())),
    }
}

pub fn parse_cards<S: AsRef<str>>(notations: &[S]) -> GtoResult<Vec<Card>> {
    notations.iter().map(|s| parse_card(s.as_ref())).collect()
}

/// Parses a compact run like `"AhKd7c"`; whitespace and commas are ignored.
pub fn parse_board(notation: &str) -> GtoResult<Vec<Card>> {
    let chars: Vec<char> = notation
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if chars.len() % 2 != 0 {
        return Err(GtoError::InvalidCardNotation(notation.to_string()));
    }
    chars
        .chunks(2)
        .map(|pair| parse_card(&pair.iter().collect::<String>()))
        .collect()
}

pub fn parse_hand(notation: &str) -> GtoResult<Hand> {
    Hand::try_from(parse_board(notation)?)
}

/// Rejects any card that appears twice across all groups.
pub fn ensure_disjoint(groups: &[&[Card]]) -> GtoResult<CardSet> {
    let mut used = CardSet::new();
    for group in groups {
        used.insert_all(group)?;
    }
    Ok(used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn index_round_trips_through_rank_and_suit() {
        for idx in 0..52u8 {
            let card = Card::from_index(idx).unwrap();
            assert_eq!(Card::new(card.rank(), card.suit()), card);
        }
        assert!(Card::from_index(52).is_err());
    }

    #[test]
    fn card_set_counts_and_rejects_duplicates() {
        let mut set = CardSet::new();
        let ah = parse_card("Ah").unwrap();
        assert!(set.insert(ah));
        assert!(!set.insert(ah));
        assert_eq!(set.len(), 1);
        assert_eq!(set.remaining(), 51);
        assert!(matches!(set.insert_all(&[ah]), Err(GtoError::DuplicateCard(c)) if c == ah));
    }

    #[test]
    fn deck_draw_is_disjoint_from_used() {
        let used = ensure_disjoint(&[&parse_board("AhKhQhJh").unwrap()]).unwrap();
        let mut deck = Deck::excluding(&used);
        assert_eq!(deck.len(), 48);
        let mut rng = StdRng::seed_from_u64(7);
        let drawn = deck.draw(48, &mut rng).unwrap().to_vec();
        let mut seen = used;
        seen.insert_all(&drawn).unwrap();
        assert_eq!(seen.len(), 52);
    }

    #[test]
    fn complete_board_fails_when_deck_runs_out() {
        let mut used = CardSet::new();
        for idx in 0..50u8 {
            used.insert(Card::from_index(idx).unwrap());
        }
        let mut rng = StdRng::seed_from_u64(1);
        let err = complete_board(&used, 3, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            GtoError::InsufficientCards { requested: 3, available: 2 }
        ));
    }
}
