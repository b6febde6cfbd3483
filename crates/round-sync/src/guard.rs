//! Exactly-once marker for settlement display.

use std::sync::atomic::{AtomicU32, Ordering};

/// Remembers the highest round whose settlement has been claimed for display.
///
/// The polling path and the submission path both try to show a settlement
/// when a round closes. Whoever claims the round first shows it; the other
/// backs off. Claims are made before any network call, so a path that is still
/// fetching already blocks the other one.
///
/// The mark only moves forward. Shared as an `Arc` between the engine and the
/// tasks it spawns.
#[derive(Debug, Default)]
pub struct SettlementGuard {
    shown_for_round: AtomicU32,
}

impl SettlementGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest round claimed so far, 0 if none.
    pub fn shown_for_round(&self) -> u32 {
        self.shown_for_round.load(Ordering::Acquire)
    }

    /// Claim `round`. Returns `true` iff no round `>= round` was claimed before.
    pub fn try_claim(&self, round: u32) -> bool {
        round > 0 && self.shown_for_round.fetch_max(round, Ordering::AcqRel) < round
    }
}
