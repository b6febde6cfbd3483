//! The game-view event loop.
//!
//! One task owns all round state. It wakes on the poll interval, on events
//! from background submissions, and on commands from the UI. Network calls
//! that outlive a single step (submission and settling) run on spawned tasks
//! and report back over the event bus.

use crate::bus::{settlement_bus, SyncEvent};
use crate::display::{next_phase_after_ack, NoticeLevel, Presenter, SettlementView};
use crate::guard::SettlementGuard;
use crate::poller::{race_watchdog, Poller};
use crate::reconciler::Reconciler;
use crate::store::RoundStore;
use crate::submission::Submitter;
use crate::SyncError;
use persistence::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tea_client::GameApi;
use tea_core::{ClientConfig, DecisionStepKey, Production, ProductionPlan, RoundPhase, SettlementRecord};
use tea_econ::final_standings;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Input from the player.
#[derive(Clone, Debug, PartialEq)]
pub enum UiCommand {
    /// Send the production plan for the current round.
    SubmitProduction(Vec<Production>),
    /// Lock the round locally without sending anything further.
    SubmitDecisions,
    /// Dismiss the settlement on screen.
    Acknowledge,
    Refresh,
    SelectStep(DecisionStepKey),
    Shutdown,
}

/// Why [`SyncEngine::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    Shutdown,
    /// The server refused the session token. The session was cleared.
    SessionExpired,
    /// The game or player no longer exists. The session was cleared.
    GameGone,
    CommandsClosed,
}

pub struct SyncEngine<A> {
    poller: Poller<A>,
    reconciler: Reconciler<A>,
    submitter: Arc<Submitter<A>>,
    guard: Arc<SettlementGuard>,
    events: mpsc::Receiver<SyncEvent>,
    session: SessionStore,
    store: RoundStore,
    view: SettlementView,
    poll_interval: Duration,
    loading_timeout: Duration,
    /// Server round as of the last successful poll; 0 before the first one.
    last_round_seen: u32,
    /// Round the submitter is settling right now.
    pending_settlement: Option<u32>,
}

impl<A: GameApi + 'static> SyncEngine<A> {
    /// Fails with [`SyncError::NoSession`] when the session names no game.
    pub fn new(api: A, config: &ClientConfig, mut session: SessionStore) -> Result<Self, SyncError> {
        let Some((game_id, player_id)) = session.hydrate().game_context() else {
            return Err(SyncError::NoSession);
        };
        let api = Arc::new(api);
        let guard = Arc::new(SettlementGuard::new());
        let (bus, events) = settlement_bus();
        Ok(Self {
            poller: Poller::new(api.clone(), game_id, player_id),
            reconciler: Reconciler::new(api.clone(), guard.clone(), game_id),
            submitter: Arc::new(Submitter::new(api, guard.clone(), bus, game_id, config)),
            guard,
            events,
            session,
            store: RoundStore::new(config.total_rounds),
            view: SettlementView::new(),
            poll_interval: config.poll_interval(),
            loading_timeout: config.loading_timeout(),
            last_round_seen: 0,
            pending_settlement: None,
        })
    }

    pub fn store(&self) -> &RoundStore {
        &self.store
    }

    pub fn view(&self) -> &SettlementView {
        &self.view
    }

    pub fn guard(&self) -> &SettlementGuard {
        &self.guard
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Run until shutdown, a dead session, or the command channel closing.
    pub async fn run<P: Presenter>(
        &mut self,
        mut commands: mpsc::Receiver<UiCommand>,
        presenter: &mut P,
    ) -> ExitReason {
        info!(
            game_id = self.poller.game_id(),
            player_id = self.poller.player_id(),
            poll_ms = self.poll_interval.as_millis() as u64,
            "entering game"
        );
        if let Some(exit) = self.refresh(presenter, true).await {
            return exit;
        }
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let exit = tokio::select! {
                biased;
                Some(event) = self.events.recv() => {
                    self.handle_event(event, presenter);
                    None
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, presenter).await,
                    None => Some(ExitReason::CommandsClosed),
                },
                _ = ticker.tick() => {
                    if self.store.phase().is_terminal() {
                        None
                    } else {
                        self.refresh(presenter, false).await
                    }
                }
            };
            if let Some(exit) = exit {
                info!(?exit, "leaving game");
                return exit;
            }
        }
    }

    /// Pull server state once and reconcile.
    ///
    /// A failed poll changes nothing but the loading flag. Returns an exit
    /// reason only when the session is gone for good.
    pub async fn refresh<P: Presenter>(&mut self, presenter: &mut P, show_loading: bool) -> Option<ExitReason> {
        if show_loading && self.store.set_loading(true) {
            presenter.loading_changed(true);
        }
        let store = &mut self.store;
        let result = race_watchdog(self.poller.fetch(), self.loading_timeout, || {
            if store.set_loading(false) {
                presenter.loading_changed(false);
            }
        })
        .await;
        if self.store.set_loading(false) {
            presenter.loading_changed(false);
        }

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(SyncError::Api(e)) if e.is_session_fatal() => return Some(self.end_session(e)),
            Err(e) => {
                warn!(error = %e, "poll failed");
                presenter.notice(NoticeLevel::Warning, &format!("could not refresh game state: {e}"));
                return None;
            }
        };

        let server_round = snapshot.game.current_round;
        if let Some(record) = self.reconciler.reconcile(self.last_round_seen, server_round).await {
            self.present_settlement(&record, presenter);
        }
        self.last_round_seen = server_round;

        let before = (self.store.phase(), self.store.current_round());
        self.store.apply_snapshot(&snapshot, self.settlement_in_flight());
        self.announce(before, presenter);
        None
    }

    pub fn handle_event<P: Presenter>(&mut self, event: SyncEvent, presenter: &mut P) {
        match event {
            SyncEvent::ProductionAccepted {
                round,
                all_players_submitted,
            } => {
                self.store.end_submission();
                if round != self.store.current_round() {
                    debug!(round, current = self.store.current_round(), "acceptance for a past round");
                    return;
                }
                if all_players_submitted {
                    self.pending_settlement = Some(round);
                }
                let before = (self.store.phase(), self.store.current_round());
                match self.store.submit_decisions() {
                    Ok(()) if all_players_submitted => {
                        presenter.notice(NoticeLevel::Info, "all players submitted, settling the round")
                    }
                    Ok(()) => presenter.notice(NoticeLevel::Info, "submitted, waiting for other players"),
                    Err(e) => debug!(round, error = %e, "round already locked"),
                }
                self.announce(before, presenter);
            }
            SyncEvent::SubmissionFailed { round, message } => {
                self.store.end_submission();
                presenter.notice(
                    NoticeLevel::Error,
                    &format!("round {round} submission failed: {message}"),
                );
            }
            SyncEvent::Settlement(event) => {
                self.present_settlement(&event.record, presenter);
            }
            SyncEvent::SettlementClaimedElsewhere { round } => {
                debug!(round, "settlement shown by the poll loop");
                self.settle_pending(round);
            }
            SyncEvent::SettlementUnavailable { round } => {
                self.settle_pending(round);
                presenter.notice(
                    NoticeLevel::Warning,
                    &format!("settlement for round {round} is unavailable"),
                );
            }
        }
    }

    pub async fn handle_command<P: Presenter>(&mut self, command: UiCommand, presenter: &mut P) -> Option<ExitReason> {
        match command {
            UiCommand::SubmitProduction(productions) => {
                if let Err(e) = self.store.begin_submission(DecisionStepKey::Production) {
                    presenter.notice(NoticeLevel::Warning, &e.to_string());
                    return None;
                }
                let plan = ProductionPlan {
                    player_id: self.poller.player_id(),
                    round_number: self.store.current_round(),
                    productions,
                };
                debug!(round = plan.round_number, lines = plan.productions.len(), "submitting production");
                self.submitter.spawn(plan);
            }
            UiCommand::SubmitDecisions => {
                let before = (self.store.phase(), self.store.current_round());
                match self.store.submit_decisions() {
                    Ok(()) => presenter.notice(NoticeLevel::Info, "submitted, waiting for other players"),
                    Err(e) => presenter.notice(NoticeLevel::Warning, &e.to_string()),
                }
                self.announce(before, presenter);
            }
            UiCommand::Acknowledge => return self.acknowledge(presenter).await,
            UiCommand::Refresh => return self.refresh(presenter, true).await,
            UiCommand::SelectStep(step) => self.store.steps_mut().set_active(step),
            UiCommand::Shutdown => return Some(ExitReason::Shutdown),
        }
        None
    }

    /// Wait for the next background event and apply it.
    pub async fn pump_event<P: Presenter>(&mut self, presenter: &mut P) -> Option<SyncEvent> {
        let event = self.events.recv().await?;
        self.handle_event(event.clone(), presenter);
        Some(event)
    }

    async fn acknowledge<P: Presenter>(&mut self, presenter: &mut P) -> Option<ExitReason> {
        let Some(round) = self.view.acknowledge() else {
            presenter.notice(NoticeLevel::Info, "no settlement on screen");
            return None;
        };
        debug!(round, "settlement acknowledged");
        self.settle_pending(round);
        if let Some(next) = self.view.promote_next() {
            presenter.settlement_shown(next);
            return None;
        }

        let finish = next_phase_after_ack(
            round,
            self.store.current_round(),
            self.store.total_rounds(),
            self.store.game_finished(),
        ) == RoundPhase::Finished;
        let before = (self.store.phase(), self.store.current_round());
        self.store.acknowledge(finish);
        self.announce(before, presenter);

        if finish {
            return None;
        }
        self.refresh(presenter, false).await
    }

    fn present_settlement<P: Presenter>(&mut self, record: &SettlementRecord, presenter: &mut P) {
        self.settle_pending(record.round_number);
        let Some(report) = self.view.show(record) else {
            return;
        };
        presenter.settlement_shown(report);
        let before = (self.store.phase(), self.store.current_round());
        self.store.enter_summary();
        self.announce(before, presenter);
    }

    /// Forget the in-flight settlement once `round` or a later one is dealt with.
    fn settle_pending(&mut self, round: u32) {
        if self.pending_settlement.is_some_and(|pending| pending <= round) {
            self.pending_settlement = None;
        }
    }

    /// Only the round this client is waiting on can hold the lock.
    fn settlement_in_flight(&self) -> bool {
        self.pending_settlement.is_some() && self.pending_settlement == self.store.submitted_round()
    }

    fn announce<P: Presenter>(&self, before: (RoundPhase, u32), presenter: &mut P) {
        let now = (self.store.phase(), self.store.current_round());
        if now == before {
            return;
        }
        presenter.phase_changed(now.1, now.0);
        if now.0.is_terminal() && !before.0.is_terminal() {
            presenter.game_over(&final_standings(self.store.players()));
        }
    }

    fn end_session(&mut self, error: tea_client::Error) -> ExitReason {
        warn!(error = %error, "session is no longer valid, clearing it");
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "could not clear session file");
        }
        match error {
            tea_client::Error::Unauthorized => ExitReason::SessionExpired,
            _ => ExitReason::GameGone,
        }
    }
}
