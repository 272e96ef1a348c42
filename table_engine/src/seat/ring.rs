//! Fixed-size seat ring with dealer/SB/BB markers.

use serde::{Deserialize, Serialize};

/// Occupant of a seat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatPlayer {
    pub id: String,
    pub is_in: bool,
    pub is_between_dealer_bb: bool,
    pub has_chips: bool,
}

impl SeatPlayer {
    /// Create a reserved (not yet joined) occupant
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_in: false,
            is_between_dealer_bb: false,
            has_chips: true,
        }
    }

    /// Eligible to play the next hand
    pub fn active(&self) -> bool {
        self.is_in && !self.is_between_dealer_bb && self.has_chips
    }

    /// Seated with chips, regardless of the late-entry flag
    pub fn alive(&self) -> bool {
        self.is_in && self.has_chips
    }
}

/// Seats plus the current button positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatRing {
    pub(crate) seats: Vec<Option<SeatPlayer>>,
    pub(crate) dealer: Option<usize>,
    pub(crate) sb: Option<usize>,
    pub(crate) bb: Option<usize>,
    pub(crate) is_init: bool,
    /// Exactly two active seats at the last init/rotation
    pub(crate) is_hu: bool,
}

impl SeatRing {
    pub fn new(max_seats: usize) -> Self {
        Self {
            seats: vec![None; max_seats],
            dealer: None,
            sb: None,
            bb: None,
            is_init: false,
            is_hu: false,
        }
    }

    pub fn max_seats(&self) -> usize {
        self.seats.len()
    }

    pub fn player(&self, seat: usize) -> Option<&SeatPlayer> {
        self.seats.get(seat).and_then(Option::as_ref)
    }

    pub fn is_active(&self, seat: usize) -> bool {
        self.player(seat).is_some_and(SeatPlayer::active)
    }

    pub fn is_alive(&self, seat: usize) -> bool {
        self.player(seat).is_some_and(SeatPlayer::alive)
    }

    pub fn active_seats(&self) -> Vec<usize> {
        (0..self.max_seats()).filter(|s| self.is_active(*s)).collect()
    }

    pub fn active_count(&self) -> usize {
        self.active_seats().len()
    }

    pub fn alive_count(&self) -> usize {
        (0..self.max_seats()).filter(|s| self.is_alive(*s)).count()
    }

    pub fn find(&self, player_id: &str) -> Option<usize> {
        self.seats
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| p.id == player_id))
    }

    /// First seat clockwise after `from` matching `pred`; `from` itself is checked last
    pub fn next_seat_where(&self, from: usize, pred: impl Fn(usize) -> bool) -> Option<usize> {
        let max = self.max_seats();
        (1..=max).map(|offset| (from + offset) % max).find(|s| pred(*s))
    }

    /// First seat counter-clockwise before `from` matching `pred`
    pub fn prev_seat_where(&self, from: usize, pred: impl Fn(usize) -> bool) -> Option<usize> {
        let max = self.max_seats();
        (1..=max)
            .map(|offset| (from + max - offset % max) % max)
            .find(|s| pred(*s))
    }

    /// Occupied seats walking clockwise from `from` (inclusive)
    pub fn occupied_from(&self, from: usize) -> Vec<usize> {
        let max = self.max_seats();
        (0..max)
            .map(|offset| (from + offset) % max)
            .filter(|s| self.player(*s).is_some())
            .collect()
    }

    pub(crate) fn set_between(&mut self, seat: usize, value: bool) {
        if let Some(Some(player)) = self.seats.get_mut(seat) {
            player.is_between_dealer_bb = value;
        }
    }
}
