//! Local submission trigger.
//!
//! When this client's production plan is the last one the server was waiting
//! for, the round can be settled right away instead of on the next poll. The
//! submitter claims the round, gives the server a moment, optionally asks it
//! to advance, then fetches and publishes the settlement.

use crate::bus::{BusSender, SettlementEvent, SyncEvent};
use crate::guard::SettlementGuard;
use crate::SyncError;
use std::sync::Arc;
use std::time::Duration;
use tea_client::GameApi;
use tea_core::{validate_plan, ClientConfig, GameId, ProductionPlan, ProductionSubmitResponse};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What a successful submission led to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmitReport {
    pub response: ProductionSubmitResponse,
    /// A settlement event was published for the submitted round.
    pub settlement_published: bool,
}

pub struct Submitter<A> {
    api: Arc<A>,
    guard: Arc<SettlementGuard>,
    bus: BusSender,
    game_id: GameId,
    settlement_delay: Duration,
    advance_on_last_submit: bool,
}

impl<A: GameApi + 'static> Submitter<A> {
    pub fn new(
        api: Arc<A>,
        guard: Arc<SettlementGuard>,
        bus: BusSender,
        game_id: GameId,
        config: &ClientConfig,
    ) -> Self {
        Self {
            api,
            guard,
            bus,
            game_id,
            settlement_delay: config.settlement_delay(),
            advance_on_last_submit: config.advance_on_last_submit,
        }
    }

    /// Validate and send `plan`, then settle the round if this was the last
    /// submission.
    pub async fn submit(&self, plan: ProductionPlan) -> Result<SubmitReport, SyncError> {
        validate_plan(&plan)?;
        let round = plan.round_number;
        let response = self.api.submit_production(&plan).await?;
        info!(
            game_id = self.game_id,
            round,
            all_players_submitted = response.all_players_submitted,
            "production plan accepted"
        );
        self.bus
            .publish(SyncEvent::ProductionAccepted {
                round,
                all_players_submitted: response.all_players_submitted,
            })
            .await;

        let settlement_published = response.all_players_submitted && self.settle(round).await;
        Ok(SubmitReport {
            response,
            settlement_published,
        })
    }

    async fn settle(&self, round: u32) -> bool {
        if !self.guard.try_claim(round) {
            debug!(round, "settlement already claimed by the poll loop");
            self.bus
                .publish(SyncEvent::SettlementClaimedElsewhere { round })
                .await;
            return false;
        }
        tokio::time::sleep(self.settlement_delay).await;

        if self.advance_on_last_submit {
            match self.api.advance_round(self.game_id).await {
                Ok(outcome) => info!(
                    previous = outcome.previous_round,
                    current = outcome.current_round,
                    finished = outcome.game_finished,
                    "round advanced"
                ),
                // Another client may have advanced first.
                Err(e) => warn!(round, error = %e, "advance failed, fetching settlement anyway"),
            }
        }

        match self.api.get_round_summary(self.game_id, round).await {
            Ok(record) => {
                self.bus
                    .publish(SyncEvent::Settlement(SettlementEvent {
                        round_number: round,
                        record,
                    }))
                    .await
            }
            Err(e) => {
                warn!(round, error = %e, "settlement fetch failed, skipping");
                self.bus.publish(SyncEvent::SettlementUnavailable { round }).await;
                false
            }
        }
    }

    /// Submit and report failures on the bus instead of returning them.
    pub async fn run(self: Arc<Self>, plan: ProductionPlan) {
        let round = plan.round_number;
        if let Err(e) = self.submit(plan).await {
            warn!(round, error = %e, "production submission failed");
            let message = e.to_string();
            self.bus.publish(SyncEvent::SubmissionFailed { round, message }).await;
        }
    }

    pub fn spawn(self: &Arc<Self>, plan: ProductionPlan) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(plan))
    }
}
