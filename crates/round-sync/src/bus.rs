//! In-process event channel from background tasks to the engine.
//!
//! Submission runs on its own task; it reports back here instead of touching
//! engine state. The engine drains the receiver in its select loop.

use tea_core::SettlementRecord;
use tokio::sync::mpsc;
use tracing::debug;

/// Bound on undelivered events.
pub const BUS_CAPACITY: usize = 64;

/// A fetched settlement ready for display.
#[derive(Clone, Debug, PartialEq)]
pub struct SettlementEvent {
    pub round_number: u32,
    pub record: SettlementRecord,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    /// The server took the production plan for `round`.
    ProductionAccepted { round: u32, all_players_submitted: bool },
    SubmissionFailed { round: u32, message: String },
    Settlement(SettlementEvent),
    /// The settlement for `round` was claimed but could not be fetched.
    SettlementUnavailable { round: u32 },
    /// The poll loop claimed `round` first; it shows the settlement instead.
    SettlementClaimedElsewhere { round: u32 },
}

/// Sending half of the bus.
#[derive(Clone, Debug)]
pub struct BusSender {
    tx: mpsc::Sender<SyncEvent>,
}

impl BusSender {
    /// Returns `false` if the engine is gone.
    pub async fn publish(&self, event: SyncEvent) -> bool {
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(e) => {
                debug!(event = ?e.0, "event bus closed, dropping event");
                false
            }
        }
    }
}

pub fn settlement_bus() -> (BusSender, mpsc::Receiver<SyncEvent>) {
    let (tx, rx) = mpsc::channel(BUS_CAPACITY);
    (BusSender { tx }, rx)
}
