//! Main and side pots.

/// One pot and the players who may win it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PotLevel {
    pub total: i64,
    /// Game player indexes that did not fold and reached this level
    pub eligible: Vec<usize>,
}

/// Contribution of one player over the whole hand
#[derive(Clone, Copy, Debug)]
pub struct Contribution {
    pub idx: usize,
    pub chips: i64,
    pub folded: bool,
}

/// Build pots from total contributions, main pot first
///
/// Every distinct contribution level opens a new pot. Folded chips stay in
/// the pots but never make their owner eligible; a level nobody eligible
/// reached is merged into the pot below it.
pub fn build_pots(contributions: &[Contribution]) -> Vec<PotLevel> {
    let mut levels: Vec<i64> = contributions
        .iter()
        .filter(|c| c.chips > 0)
        .map(|c| c.chips)
        .collect();
    levels.sort_unstable();
    levels.dedup();

    let mut pots: Vec<PotLevel> = Vec::new();
    let mut prev_level = 0;
    for level in levels {
        let total: i64 = contributions
            .iter()
            .map(|c| c.chips.min(level) - c.chips.min(prev_level))
            .sum();
        let eligible: Vec<usize> = contributions
            .iter()
            .filter(|c| !c.folded && c.chips >= level)
            .map(|c| c.idx)
            .collect();
        prev_level = level;

        match pots.last_mut() {
            Some(last) if eligible.is_empty() || eligible == last.eligible => last.total += total,
            _ => pots.push(PotLevel { total, eligible }),
        }
    }

    pots
}

/// Split `total` between `winners`, odd chips going to the earliest winners
///
/// `winners` must already be in odd-chip order.
pub fn split_pot(total: i64, winners: &[usize]) -> Vec<(usize, i64)> {
    if winners.is_empty() {
        return vec![];
    }

    let count = winners.len() as i64;
    let share = total / count;
    let remainder = total % count;
    winners
        .iter()
        .enumerate()
        .map(|(i, idx)| (*idx, share + i64::from((i as i64) < remainder)))
        .collect()
}
