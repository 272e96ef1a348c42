//! Rule-dependent position handling.

use enum_dispatch::enum_dispatch;

use super::ring::SeatRing;
use crate::{
    errors::{TableError, TableResult},
    table::Rule,
};

/// Position selection, rotation and participant order for one rule family
#[enum_dispatch]
pub trait PositionPolicy {
    /// Place the first positions around `first`
    fn init_positions(&self, ring: &mut SeatRing, first: usize) -> TableResult<()>;

    /// Advance positions by one hand
    fn rotate_positions(&self, ring: &mut SeatRing) -> TableResult<()>;

    /// Whether `seat` sits strictly between the dealer and the BB
    fn is_between_dealer_bb(&self, ring: &SeatRing, seat: usize) -> bool;

    /// Active seats in hand order, dealer first
    fn participant_seats(&self, ring: &SeatRing) -> Vec<usize>;
}

/// Policy dispatch by rule
#[enum_dispatch(PositionPolicy)]
#[derive(Debug, Clone, Copy)]
pub enum RulePolicy {
    HoldemPolicy,
    ShortDeckPolicy,
}

impl RulePolicy {
    pub fn for_rule(rule: Rule) -> Self {
        match rule {
            Rule::Default | Rule::Omaha => HoldemPolicy.into(),
            Rule::ShortDeck => ShortDeckPolicy.into(),
        }
    }
}

/// Dealer, SB and BB; used by Texas Hold'em and Omaha
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldemPolicy;

impl HoldemPolicy {
    /// Recompute the late-entry flag of every inactive seat
    fn refresh_between_flags(&self, ring: &mut SeatRing) {
        for seat in 0..ring.max_seats() {
            if ring.player(seat).is_some() && !ring.is_active(seat) {
                let between = self.is_between_dealer_bb(ring, seat);
                ring.set_between(seat, between);
            }
        }
    }
}

impl PositionPolicy for HoldemPolicy {
    fn init_positions(&self, ring: &mut SeatRing, first: usize) -> TableResult<()> {
        let active = ring.active_count();
        if active < 2 || !ring.is_active(first) {
            return Err(TableError::UnableToInitPositions);
        }

        let bb = first;
        if active == 2 {
            let other = ring
                .next_seat_where(bb, |s| ring.is_active(s))
                .ok_or(TableError::UnableToInitPositions)?;
            ring.dealer = Some(other);
            ring.sb = Some(other);
        } else {
            let sb = ring
                .prev_seat_where(bb, |s| ring.is_active(s))
                .ok_or(TableError::UnableToInitPositions)?;
            let dealer = ring
                .prev_seat_where(sb, |s| ring.is_active(s))
                .ok_or(TableError::UnableToInitPositions)?;
            ring.dealer = Some(dealer);
            ring.sb = Some(sb);
        }
        ring.bb = Some(bb);
        ring.is_hu = active == 2;

        Ok(())
    }

    fn rotate_positions(&self, ring: &mut SeatRing) -> TableResult<()> {
        let (Some(_), Some(sb0), Some(bb0)) = (ring.dealer, ring.sb, ring.bb) else {
            return Err(TableError::UnableToRotatePositions);
        };
        if ring.alive_count() < 2 {
            return Err(TableError::UnableToRotatePositions);
        }

        // Forced BB: the next seated player with chips, even one sitting out
        let bb = ring
            .next_seat_where(bb0, |s| ring.is_alive(s))
            .ok_or(TableError::UnableToRotatePositions)?;
        ring.bb = Some(bb);
        ring.dealer = Some(sb0);
        self.refresh_between_flags(ring);

        let active = ring.active_count();
        if active < 2 {
            return Err(TableError::UnableToRotatePositions);
        }

        if active == 2 {
            let dealer = ring
                .next_seat_where(bb, |s| ring.is_active(s))
                .ok_or(TableError::UnableToRotatePositions)?;
            ring.dealer = Some(dealer);
            ring.sb = Some(dealer);
        } else if ring.is_hu {
            let dealer = ring
                .prev_seat_where(bb0, |s| ring.is_alive(s))
                .ok_or(TableError::UnableToRotatePositions)?;
            ring.sb = Some(bb0);
            ring.dealer = Some(dealer);
            self.refresh_between_flags(ring);
        } else {
            ring.sb = Some(bb0);
            ring.dealer = Some(sb0);
        }

        ring.is_hu = ring.active_count() == 2;
        Ok(())
    }

    fn is_between_dealer_bb(&self, ring: &SeatRing, seat: usize) -> bool {
        let (Some(dealer), Some(bb)) = (ring.dealer, ring.bb) else {
            return false;
        };

        if bb < dealer {
            seat > dealer || seat < bb
        } else {
            dealer < seat && seat < bb
        }
    }

    fn participant_seats(&self, ring: &SeatRing) -> Vec<usize> {
        let Some(bb) = ring.bb else {
            return vec![];
        };
        let max = ring.max_seats();
        let walk: Vec<usize> = (1..=max)
            .map(|offset| (bb + offset) % max)
            .filter(|s| ring.is_active(*s))
            .collect();

        let n = walk.len();
        match n {
            0..=2 => walk,
            _ => walk[n - 3..]
                .iter()
                .chain(walk[..n - 3].iter())
                .copied()
                .collect(),
        }
    }
}

/// Dealer button only, everyone posts the ante
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortDeckPolicy;

impl PositionPolicy for ShortDeckPolicy {
    fn init_positions(&self, ring: &mut SeatRing, first: usize) -> TableResult<()> {
        let active = ring.active_count();
        if active < 2 || !ring.is_active(first) {
            return Err(TableError::UnableToInitPositions);
        }

        ring.dealer = Some(first);
        ring.sb = None;
        ring.bb = None;
        ring.is_hu = active == 2;
        Ok(())
    }

    fn rotate_positions(&self, ring: &mut SeatRing) -> TableResult<()> {
        let Some(dealer0) = ring.dealer else {
            return Err(TableError::UnableToRotatePositions);
        };
        if ring.active_count() < 2 {
            return Err(TableError::UnableToRotatePositions);
        }

        let dealer = ring
            .next_seat_where(dealer0, |s| ring.is_active(s))
            .ok_or(TableError::UnableToRotatePositions)?;
        ring.dealer = Some(dealer);
        ring.is_hu = ring.active_count() == 2;
        Ok(())
    }

    fn is_between_dealer_bb(&self, _ring: &SeatRing, _seat: usize) -> bool {
        false
    }

    fn participant_seats(&self, ring: &SeatRing) -> Vec<usize> {
        let Some(dealer) = ring.dealer else {
            return vec![];
        };
        let max = ring.max_seats();
        (0..max)
            .map(|offset| (dealer + offset) % max)
            .filter(|s| ring.is_active(*s))
            .collect()
    }
}
