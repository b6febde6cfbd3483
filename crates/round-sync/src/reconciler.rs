//! Catch rounds that closed while this client was only watching.

use crate::guard::SettlementGuard;
use std::sync::Arc;
use tea_client::GameApi;
use tea_core::{GameId, SettlementRecord};
use tracing::{debug, info, warn};

/// Fetches the settlement of a round that closed because of other players.
///
/// Triggered from the poll loop. The round is identified by the client's own
/// memory of the previous server round, never by arithmetic on the new one.
pub struct Reconciler<A> {
    api: Arc<A>,
    guard: Arc<SettlementGuard>,
    game_id: GameId,
}

impl<A: GameApi> Reconciler<A> {
    pub fn new(api: Arc<A>, guard: Arc<SettlementGuard>, game_id: GameId) -> Self {
        Self { api, guard, game_id }
    }

    /// Returns the settlement of `local_last_round` if it closed and nobody
    /// has shown it yet.
    ///
    /// Nothing happens on the first load (`local_last_round == 0`) or when the
    /// server has not moved past the remembered round. A failed fetch is logged
    /// and the round is not retried.
    pub async fn reconcile(&self, local_last_round: u32, server_round: u32) -> Option<SettlementRecord> {
        if local_last_round == 0 || server_round <= local_last_round {
            return None;
        }
        if !self.guard.try_claim(local_last_round) {
            debug!(round = local_last_round, "settlement already claimed");
            return None;
        }
        info!(
            game_id = self.game_id,
            closed = local_last_round,
            server_round,
            "round closed remotely, fetching settlement"
        );
        match self.api.get_round_summary(self.game_id, local_last_round).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(round = local_last_round, error = %e, "settlement fetch failed, skipping");
                None
            }
        }
    }
}
