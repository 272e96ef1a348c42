//! Cards and decks.

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::GameError;

/// Card suit
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Suit {
    Club,
    Diamond,
    Heart,
    Spade,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Diamond, Suit::Heart, Suit::Spade];

    fn symbol(self) -> char {
        match self {
            Self::Club => 'c',
            Self::Diamond => 'd',
            Self::Heart => 'h',
            Self::Spade => 's',
        }
    }
}

/// A playing card; rank runs 2..=14 with the ace high
///
/// Serialized in the short form used by hand histories, e.g. `"As"`, `"Td"`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Card {
    pub rank: u8,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: u8, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rank = match self.rank {
            14 => 'A',
            13 => 'K',
            12 => 'Q',
            11 => 'J',
            10 => 'T',
            v => char::from(b'0' + v),
        };
        write!(f, "{}{}", rank, self.suit.symbol())
    }
}

impl FromStr for Card {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(rank), Some(suit), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(GameError::InvalidCard(s.to_string()));
        };

        let rank = match rank.to_ascii_uppercase() {
            'A' => 14,
            'K' => 13,
            'Q' => 12,
            'J' => 11,
            'T' => 10,
            c @ '2'..='9' => c as u8 - b'0',
            _ => return Err(GameError::InvalidCard(s.to_string())),
        };
        let suit = match suit.to_ascii_lowercase() {
            'c' => Suit::Club,
            'd' => Suit::Diamond,
            'h' => Suit::Heart,
            's' => Suit::Spade,
            _ => return Err(GameError::InvalidCard(s.to_string())),
        };

        Ok(Card::new(rank, suit))
    }
}

impl TryFrom<String> for Card {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Card> for String {
    fn from(card: Card) -> Self {
        card.to_string()
    }
}

/// Parse a whitespace separated card list such as `"As Ah 2c"`
pub fn parse_cards(s: &str) -> Result<Vec<Card>, GameError> {
    s.split_whitespace().map(str::parse).collect()
}

/// Deck composition
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeckKind {
    /// 52 cards
    Standard,
    /// 36 cards, six through ace
    ShortDeck,
}

impl DeckKind {
    fn min_rank(self) -> u8 {
        match self {
            Self::Standard => 2,
            Self::ShortDeck => 6,
        }
    }

    /// A fresh, ordered deck
    pub fn cards(self) -> Vec<Card> {
        (self.min_rank()..=14)
            .flat_map(|rank| Suit::ALL.into_iter().map(move |suit| Card::new(rank, suit)))
            .collect()
    }

    /// A shuffled deck, reproducible when `seed` is given
    pub fn shuffled(self, seed: Option<u64>) -> Vec<Card> {
        let mut cards = self.cards();
        match seed {
            Some(seed) => cards.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => cards.shuffle(&mut rand::rng()),
        }
        cards
    }
}
