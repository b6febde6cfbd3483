#![deny(warnings)]

//! Round lifecycle synchronization for the game client.
//!
//! Several clients play the same game and only learn about each other through
//! the server. This crate keeps one client consistent with the server about
//! which round is being played, whether the last round has been settled, and
//! whether everyone has submitted:
//!
//! - [`RoundStore`] holds the local round phase and UI gating flags.
//! - [`Poller`] pulls authoritative state on a fixed interval.
//! - [`Reconciler`] notices rounds that closed because of another player and
//!   fetches their settlement.
//! - [`Submitter`] fetches the settlement right away when this client's own
//!   submission closed the round.
//! - [`SettlementGuard`] makes sure each settlement is shown once, whichever
//!   path sees it first.
//! - [`SyncEngine`] runs all of it on one task.

pub mod bus;
pub mod display;
pub mod engine;
pub mod guard;
pub mod poller;
pub mod reconciler;
pub mod steps;
pub mod store;
pub mod submission;

#[cfg(test)]
mod mocks;

pub use bus::{settlement_bus, BusSender, SettlementEvent, SyncEvent};
pub use display::{next_phase_after_ack, NoticeLevel, Presenter, SettlementView};
pub use engine::{ExitReason, SyncEngine, UiCommand};
pub use guard::SettlementGuard;
pub use poller::{race_watchdog, Poller, ServerSnapshot};
pub use reconciler::Reconciler;
pub use steps::DecisionSteps;
pub use store::{RoundStore, TransitionError};
pub use submission::{SubmitReport, Submitter};

use thiserror::Error;

/// Errors surfaced by the synchronization layer.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] tea_client::Error),
    #[error("invalid input: {0}")]
    Invalid(#[from] tea_core::ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Session(#[from] persistence::SessionError),
    /// No game or player id in the session; the player belongs in the lobby.
    #[error("no active game in session")]
    NoSession,
}
