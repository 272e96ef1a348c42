//! Hand ranking.
//!
//! Ranks are packed as `category << 20 | r0 << 16 | ... | r4`, so plain
//! integer comparison orders hands. The short-deck variant ranks a flush
//! above a full house and counts A-6-7-8-9 as the lowest straight.

use super::cards::Card;

/// Hand category by strength
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
}

impl HandCategory {
    fn strength(self, short_deck: bool) -> u32 {
        match (self, short_deck) {
            (Self::Flush, true) => Self::FullHouse as u32,
            (Self::FullHouse, true) => Self::Flush as u32,
            _ => self as u32,
        }
    }
}

/// Comparable strength of a five card hand
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct HandRank(pub u32);

impl HandRank {
    fn new(category: HandCategory, ranks: [u8; 5], short_deck: bool) -> Self {
        let value = ranks
            .iter()
            .fold(category.strength(short_deck), |acc, r| (acc << 4) | u32::from(*r & 0x0F));
        HandRank(value)
    }

    pub fn power(self) -> i64 {
        i64::from(self.0)
    }
}

/// Best hand of `hole` + `board`
///
/// With `required_hole == 0` any five cards play; otherwise exactly that
/// many hole cards must be used (Omaha uses 2).
pub fn best_hand(
    hole: &[Card],
    board: &[Card],
    required_hole: usize,
    short_deck: bool,
) -> Option<HandRank> {
    if required_hole == 0 {
        let cards: Vec<Card> = hole.iter().chain(board.iter()).copied().collect();
        return combinations(&cards, 5)
            .map(|five| evaluate_five(&five, short_deck))
            .max();
    }

    let required_board = 5usize.checked_sub(required_hole)?;
    let board_combos: Vec<Vec<Card>> = combinations(board, required_board).collect();
    combinations(hole, required_hole)
        .flat_map(|h| {
            board_combos
                .iter()
                .map(move |b| h.iter().chain(b.iter()).copied().collect::<Vec<Card>>())
        })
        .map(|five| evaluate_five(&five, short_deck))
        .max()
}

/// All `k`-card combinations of `cards`, in lexicographic index order
fn combinations(cards: &[Card], k: usize) -> impl Iterator<Item = Vec<Card>> + '_ {
    let n = cards.len();
    let mut indexes: Option<Vec<usize>> = if k <= n { Some((0..k).collect()) } else { None };

    std::iter::from_fn(move || {
        let current = indexes.as_mut()?;
        let combo: Vec<Card> = current.iter().map(|i| cards[*i]).collect();

        // Advance to the next combination
        let mut i = k;
        loop {
            if i == 0 {
                indexes = None;
                break;
            }
            i -= 1;
            if current[i] != i + n - k {
                current[i] += 1;
                for j in i + 1..k {
                    current[j] = current[j - 1] + 1;
                }
                break;
            }
        }

        Some(combo)
    })
}

/// Rank exactly five cards
pub fn evaluate_five(cards: &[Card], short_deck: bool) -> HandRank {
    let mut rank_counts = [0u8; 15];
    let mut rank_mask: u16 = 0;
    for card in cards {
        rank_counts[card.rank as usize] += 1;
        rank_mask |= 1 << card.rank;
    }
    let is_flush = cards.windows(2).all(|w| w[0].suit == w[1].suit);
    let straight_high = straight_high(rank_mask, short_deck);

    // (count, rank) sorted by count then rank, both descending
    let mut groups: Vec<(u8, u8)> = (2u8..=14)
        .rev()
        .filter(|r| rank_counts[*r as usize] > 0)
        .map(|r| (rank_counts[r as usize], r))
        .collect();
    groups.sort_by(|a, b| b.cmp(a));
    let pattern: Vec<u8> = groups.iter().map(|(count, _)| *count).collect();

    let mut ranks = [0u8; 5];
    for (slot, (_, rank)) in ranks.iter_mut().zip(groups.iter()) {
        *slot = *rank;
    }

    // Straights only compare by their top card
    if let Some(high) = straight_high {
        let category = if is_flush {
            HandCategory::StraightFlush
        } else {
            HandCategory::Straight
        };
        return HandRank::new(category, [high, 0, 0, 0, 0], short_deck);
    }

    let category = match pattern.as_slice() {
        [4, 1] => HandCategory::FourOfAKind,
        [3, 2] => HandCategory::FullHouse,
        _ if is_flush => HandCategory::Flush,
        [3, 1, 1] => HandCategory::ThreeOfAKind,
        [2, 2, 1] => HandCategory::TwoPair,
        [2, 1, 1, 1] => HandCategory::OnePair,
        _ => HandCategory::HighCard,
    };

    HandRank::new(category, ranks, short_deck)
}

/// High card of a straight, if the rank mask contains one
fn straight_high(mask: u16, short_deck: bool) -> Option<u8> {
    let run = |high: u8| (0..5).all(|i| mask & (1 << (high - i)) != 0);

    if let Some(high) = (6u8..=14).rev().find(|high| run(*high)) {
        return Some(high);
    }

    let wheel: &[u8] = if short_deck { &[14, 6, 7, 8, 9] } else { &[14, 2, 3, 4, 5] };
    if wheel.iter().all(|r| mask & (1 << r) != 0) {
        // The ace plays low; the run is topped by the last card
        return wheel.last().copied();
    }

    None
}
