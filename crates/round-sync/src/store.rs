//! Local round state and the phase machine.
//!
//! ```text
//! planning --submit--> waiting --settlement--> summary --ack--> planning
//!     |                                           |
//!     +----------------settlement-----------------+--ack (last round)--> finished
//! ```
//!
//! `finished` is absorbing. A server snapshot reporting a finished game moves
//! any phase there.

use crate::poller::ServerSnapshot;
use crate::steps::DecisionSteps;
use tea_core::{DecisionStepKey, GameSession, Player, RoundPhase};
use thiserror::Error;
use tracing::{debug, info, warn};

/// A local action the current phase does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("decisions for round {0} were already submitted")]
    AlreadySubmitted(u32),
    #[error("a settlement is on screen; acknowledge it first")]
    SettlementPending,
    #[error("the game is over")]
    GameOver,
}

/// Client-side view of where the game stands.
#[derive(Clone, Debug)]
pub struct RoundStore {
    current_round: u32,
    total_rounds: u32,
    phase: RoundPhase,
    round_locked: bool,
    waiting_for_players: bool,
    submitting_step: Option<DecisionStepKey>,
    settlement_visible: bool,
    loading: bool,
    /// Round the local decisions were submitted for.
    submitted_round: Option<u32>,
    game: Option<GameSession>,
    players: Vec<Player>,
    me: Option<Player>,
    steps: DecisionSteps,
}

impl RoundStore {
    pub fn new(total_rounds: u32) -> Self {
        Self {
            current_round: 1,
            total_rounds,
            phase: RoundPhase::Planning,
            round_locked: false,
            waiting_for_players: false,
            submitting_step: None,
            settlement_visible: false,
            loading: false,
            submitted_round: None,
            game: None,
            players: Vec::new(),
            me: None,
            steps: DecisionSteps::default(),
        }
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_round_locked(&self) -> bool {
        self.round_locked
    }

    pub fn is_waiting_for_players(&self) -> bool {
        self.waiting_for_players
    }

    pub fn submitting_step(&self) -> Option<DecisionStepKey> {
        self.submitting_step
    }

    pub fn is_settlement_visible(&self) -> bool {
        self.settlement_visible
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn submitted_round(&self) -> Option<u32> {
        self.submitted_round
    }

    pub fn game(&self) -> Option<&GameSession> {
        self.game.as_ref()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn me(&self) -> Option<&Player> {
        self.me.as_ref()
    }

    pub fn steps(&self) -> &DecisionSteps {
        &self.steps
    }

    pub fn steps_mut(&mut self) -> &mut DecisionSteps {
        &mut self.steps
    }

    /// True once the server has reported the game finished.
    pub fn game_finished(&self) -> bool {
        self.game.as_ref().is_some_and(GameSession::is_finished)
    }

    /// Returns whether the flag changed.
    pub fn set_loading(&mut self, loading: bool) -> bool {
        let changed = self.loading != loading;
        self.loading = loading;
        changed
    }

    /// Checks that local decisions may still be sent for this round.
    pub fn ensure_can_submit(&self) -> Result<(), TransitionError> {
        match self.phase {
            RoundPhase::Finished => Err(TransitionError::GameOver),
            RoundPhase::Summary => Err(TransitionError::SettlementPending),
            _ if self.round_locked => Err(TransitionError::AlreadySubmitted(self.current_round)),
            _ => Ok(()),
        }
    }

    /// Mark `step` as being sent to the server.
    pub fn begin_submission(&mut self, step: DecisionStepKey) -> Result<(), TransitionError> {
        self.ensure_can_submit()?;
        self.submitting_step = Some(step);
        Ok(())
    }

    pub fn end_submission(&mut self) {
        self.submitting_step = None;
    }

    /// planning -> waiting. Locks the round and parks every step.
    pub fn submit_decisions(&mut self) -> Result<(), TransitionError> {
        self.ensure_can_submit()?;
        self.round_locked = true;
        self.waiting_for_players = true;
        self.submitting_step = None;
        self.submitted_round = Some(self.current_round);
        self.steps.mark_all_completed();
        self.steps.mark_waiting();
        self.phase = RoundPhase::Waiting;
        info!(round = self.current_round, "decisions submitted, waiting for other players");
        Ok(())
    }

    /// A settlement went on screen. planning|waiting -> summary; a finished
    /// game stays finished.
    pub fn enter_summary(&mut self) -> RoundPhase {
        self.settlement_visible = true;
        self.waiting_for_players = false;
        if !self.phase.is_terminal() {
            self.phase = RoundPhase::Summary;
        }
        self.phase
    }

    /// The settlement was dismissed. Unlocks a fresh round unless `finish`.
    pub fn acknowledge(&mut self, finish: bool) -> RoundPhase {
        self.settlement_visible = false;
        if finish || self.phase.is_terminal() {
            self.finish();
        } else {
            self.reset_round();
        }
        self.phase
    }

    /// Any phase -> finished.
    pub fn finish(&mut self) {
        if !self.phase.is_terminal() {
            info!(round = self.current_round, "game finished");
        }
        self.phase = RoundPhase::Finished;
        self.round_locked = true;
        self.waiting_for_players = false;
        self.submitting_step = None;
        self.submitted_round = None;
    }

    fn reset_round(&mut self) {
        self.phase = RoundPhase::Planning;
        self.round_locked = false;
        self.waiting_for_players = false;
        self.submitting_step = None;
        self.submitted_round = None;
        self.steps.reset();
    }

    /// Take in a successful poll.
    ///
    /// Reconciliation for a closed round has to run before this, since this
    /// moves `current_round` to the server's value. While `settlement_pending`
    /// a closed round stays locked until its settlement arrives.
    pub fn apply_snapshot(&mut self, snapshot: &ServerSnapshot, settlement_pending: bool) {
        let server_round = snapshot.game.current_round;
        self.game = Some(snapshot.game.clone());
        self.players = snapshot.players.clone();
        self.me = Some(snapshot.me.clone());

        if snapshot.game.is_finished() {
            self.current_round = server_round;
            self.finish();
            return;
        }
        if self.phase.is_terminal() || server_round == self.current_round {
            return;
        }

        debug!(from = self.current_round, to = server_round, phase = %self.phase, "server round moved");
        match self.phase {
            RoundPhase::Waiting
                if !settlement_pending && self.submitted_round.is_some_and(|r| r < server_round) =>
            {
                // Round closed but its settlement never made it on screen.
                warn!(
                    round = self.submitted_round.unwrap_or_default(),
                    "round closed without a settlement on screen, unlocking next round"
                );
                self.reset_round();
            }
            RoundPhase::Planning => self.reset_round(),
            _ => {}
        }
        self.current_round = server_round;
    }
}
