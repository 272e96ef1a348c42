//! Seat management: occupancy, eligibility and dealer/SB/BB rotation.
//!
//! The manager guards its ring with an internal mutex so membership can be
//! inspected from observers before the table worker runs. Every mutating
//! operation is all-or-nothing: it works on a copy of the ring and commits
//! only on success.

pub mod policy;
pub mod ring;

pub use policy::{HoldemPolicy, PositionPolicy, RulePolicy, ShortDeckPolicy};
pub use ring::{SeatPlayer, SeatRing};

use rand::seq::{IndexedRandom, SliceRandom};
use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard},
};

use crate::{
    errors::{TableError, TableResult},
    table::Rule,
};

/// Seats of one table
#[derive(Debug)]
pub struct SeatManager {
    ring: Mutex<SeatRing>,
    policy: RulePolicy,
}

impl SeatManager {
    /// Create a manager with `max_seats` empty seats
    pub fn new(max_seats: usize, rule: Rule) -> Self {
        Self {
            ring: Mutex::new(SeatRing::new(max_seats)),
            policy: RulePolicy::for_rule(rule),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SeatRing> {
        self.ring.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `f` to a copy of the ring and commit it on success
    fn transact<T>(&self, f: impl FnOnce(&mut SeatRing) -> TableResult<T>) -> TableResult<T> {
        let mut ring = self.lock();
        let mut next = ring.clone();
        let result = f(&mut next)?;
        *ring = next;
        Ok(result)
    }

    pub fn max_seats(&self) -> usize {
        self.lock().max_seats()
    }

    /// Seat of `player_id`
    pub fn get_seat_id(&self, player_id: &str) -> TableResult<usize> {
        self.lock()
            .find(player_id)
            .ok_or(TableError::PlayerNotFound)
    }

    pub fn empty_seat_count(&self) -> usize {
        self.lock().seats.iter().filter(|s| s.is_none()).count()
    }

    /// Pick `count` distinct empty seats uniformly at random without taking them
    pub fn random_pick_empty_seats(&self, count: usize) -> TableResult<Vec<usize>> {
        let ring = self.lock();
        let mut empty: Vec<usize> = (0..ring.max_seats())
            .filter(|s| ring.player(*s).is_none())
            .collect();

        if empty.len() < count {
            return Err(TableError::NotEnoughSeats);
        }

        empty.shuffle(&mut rand::rng());
        empty.truncate(count);
        Ok(empty)
    }

    /// Seat every player on a random empty seat
    ///
    /// # Returns
    ///
    /// * `Vec<(String, usize)>` - The assigned seat of every player
    pub fn random_assign_seats(&self, player_ids: &[String]) -> TableResult<Vec<(String, usize)>> {
        let seats = self.random_pick_empty_seats(player_ids.len())?;
        let assignments: Vec<(String, usize)> =
            player_ids.iter().cloned().zip(seats).collect();
        self.assign_seats(&assignments)?;
        Ok(assignments)
    }

    /// Seat players on the given seats, all or none
    ///
    /// Arrivals after positions were initialised get their late-entry flag
    /// computed against the current dealer and BB.
    pub fn assign_seats(&self, assignments: &[(String, usize)]) -> TableResult<()> {
        let policy = self.policy;
        self.transact(|ring| {
            let mut players = HashSet::new();
            let mut seats = HashSet::new();
            for (player_id, seat) in assignments {
                if !players.insert(player_id.as_str()) || ring.find(player_id).is_some() {
                    return Err(TableError::DuplicatePlayers);
                }
                if !seats.insert(*seat) {
                    return Err(TableError::DuplicateSeats);
                }
                if *seat >= ring.max_seats() {
                    return Err(TableError::InvalidSeat(*seat));
                }
            }

            let empty = ring.seats.iter().filter(|s| s.is_none()).count();
            if assignments.len() > empty {
                return Err(TableError::NotEnoughSeats);
            }

            for (player_id, seat) in assignments {
                if ring.player(*seat).is_some() {
                    return Err(TableError::SeatAlreadyIsTaken);
                }
                let mut player = SeatPlayer::new(player_id.clone());
                if ring.is_init {
                    player.is_between_dealer_bb = policy.is_between_dealer_bb(ring, *seat);
                }
                ring.seats[*seat] = Some(player);
            }
            Ok(())
        })
    }

    /// Release the seats of every player, all or none
    pub fn remove_seats(&self, player_ids: &[String]) -> TableResult<()> {
        self.transact(|ring| {
            for player_id in player_ids {
                let seat = ring.find(player_id).ok_or(TableError::PlayerNotFound)?;
                ring.seats[seat] = None;
            }
            Ok(())
        })
    }

    /// Mark reserved players as seated and in
    pub fn join_players(&self, player_ids: &[String]) -> TableResult<()> {
        self.transact(|ring| {
            for player_id in player_ids {
                let seat = ring.find(player_id).ok_or(TableError::PlayerNotFound)?;
                if let Some(Some(player)) = ring.seats.get_mut(seat) {
                    player.is_in = true;
                }
            }
            Ok(())
        })
    }

    pub fn update_player_has_chips(&self, player_id: &str, has_chips: bool) -> TableResult<()> {
        let mut ring = self.lock();
        let seat = ring.find(player_id).ok_or(TableError::PlayerNotFound)?;
        if let Some(Some(player)) = ring.seats.get_mut(seat) {
            player.has_chips = has_chips;
        }
        Ok(())
    }

    /// Place the first dealer/SB/BB; allowed once per table lifetime
    pub fn init_positions(&self, is_random: bool) -> TableResult<()> {
        let policy = self.policy;
        self.transact(|ring| {
            if ring.is_init {
                return Err(TableError::AlreadyInitPositions);
            }

            let active = ring.active_seats();
            let first = if is_random {
                active.choose(&mut rand::rng()).copied()
            } else {
                active.first().copied()
            }
            .ok_or(TableError::UnableToInitPositions)?;

            policy.init_positions(ring, first)?;
            ring.is_init = true;
            Ok(())
        })
    }

    /// Move positions on by one hand
    pub fn rotate_positions(&self) -> TableResult<()> {
        let policy = self.policy;
        self.transact(|ring| {
            if !ring.is_init {
                return Err(TableError::UnableToRotatePositions);
            }
            policy.rotate_positions(ring)
        })
    }

    /// Whether the player sits out because of the late-entry rule
    pub fn is_player_between_dealer_bb(&self, player_id: &str) -> bool {
        let ring = self.lock();
        ring.find(player_id)
            .and_then(|seat| ring.player(seat))
            .is_some_and(|p| p.is_between_dealer_bb)
    }

    pub fn is_player_active(&self, player_id: &str) -> bool {
        let ring = self.lock();
        ring.find(player_id).is_some_and(|seat| ring.is_active(seat))
    }

    /// Snapshot of all seats
    pub fn seats(&self) -> Vec<Option<SeatPlayer>> {
        self.lock().seats.clone()
    }

    pub fn current_dealer_seat_id(&self) -> Option<usize> {
        self.lock().dealer
    }

    pub fn current_sb_seat_id(&self) -> Option<usize> {
        self.lock().sb
    }

    pub fn current_bb_seat_id(&self) -> Option<usize> {
        self.lock().bb
    }

    pub fn is_init_positions(&self) -> bool {
        self.lock().is_init
    }

    /// Occupied seats walking clockwise from the dealer
    pub fn list_player_seats_from_dealer(&self) -> Vec<(usize, SeatPlayer)> {
        let ring = self.lock();
        let Some(dealer) = ring.dealer else {
            return vec![];
        };
        ring.occupied_from(dealer)
            .into_iter()
            .filter_map(|seat| ring.player(seat).map(|p| (seat, p.clone())))
            .collect()
    }

    /// Active seats of the next hand, dealer first
    pub fn participant_seats(&self) -> Vec<usize> {
        let ring = self.lock();
        self.policy.participant_seats(&ring)
    }

    /// Alive players clockwise after the current BB
    pub fn player_ids_from_bb(&self) -> Vec<String> {
        let ring = self.lock();
        let max = ring.max_seats();
        let start = ring.bb.or(ring.dealer).map(|s| s + 1).unwrap_or(0);
        (0..max)
            .map(|offset| (start + offset) % max)
            .filter_map(|seat| ring.player(seat))
            .filter(|p| p.alive())
            .map(|p| p.id.clone())
            .collect()
    }
}

impl Clone for SeatManager {
    fn clone(&self) -> Self {
        Self {
            ring: Mutex::new(self.lock().clone()),
            policy: self.policy,
        }
    }
}
