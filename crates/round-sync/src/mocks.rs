//! In-memory stand-in for the game server.

use rust_decimal::Decimal;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tea_client::{AdvanceOutcome, Error, GameApi, Result};
use tea_core::{
    GameId, GameSession, GameStatus, Player, PlayerId, PlayerStatus, ProductionPlan,
    ProductionSubmitResponse, SettlementRecord,
};

pub const GAME_ID: GameId = 9;
pub const ME: PlayerId = 1;

#[derive(Debug)]
struct State {
    round: u32,
    status: GameStatus,
    total_rounds: u32,
    players: Vec<Player>,
    poll_delay: Duration,
    submit_delay: Duration,
    transient_poll_failures: u32,
    poll_fatal: Option<fn() -> Error>,
    fail_summaries: bool,
    fail_advance: bool,
    reject_submissions: bool,
    all_submitted_on_submit: bool,
    summary_rounds: Vec<u32>,
    advance_calls: u32,
    get_game_calls: u32,
    submissions: Vec<ProductionPlan>,
}

/// Cheap to clone; clones share state.
#[derive(Clone, Debug)]
pub struct MockApi {
    state: Arc<Mutex<State>>,
}

fn player(id: PlayerId, name: &str, cash: i64) -> Player {
    Player {
        id,
        game_id: GAME_ID,
        name: name.to_string(),
        cash: Decimal::new(cash, 0),
        is_ready: true,
        turn_order: id as u32,
        status: PlayerStatus::Active,
    }
}

pub fn settlement(round: u32) -> SettlementRecord {
    let raw = json!({
        "round_number": round,
        "players": [
            {"player_id": 1, "nickname": "me", "total_revenue": 300, "total_sold": 10, "round_profit": 80},
            {"player_id": 2, "nickname": "rival", "total_revenue": 420, "total_sold": 14, "round_profit": 120}
        ],
        "customer_flow": {"round_number": round, "high_tier_customers": 20, "low_tier_customers": 40},
        "allocation_result": {"high_tier_served": 15, "low_tier_served": 40}
    });
    match SettlementRecord::from_payload(round, raw) {
        Ok(record) => record,
        Err(e) => panic!("fixture summary must decode: {e}"),
    }
}

impl MockApi {
    pub fn new(round: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                round,
                status: GameStatus::InProgress,
                total_rounds: 10,
                players: vec![player(ME, "me", 10_000), player(2, "rival", 12_000)],
                poll_delay: Duration::ZERO,
                submit_delay: Duration::ZERO,
                transient_poll_failures: 0,
                poll_fatal: None,
                fail_summaries: false,
                fail_advance: false,
                reject_submissions: false,
                all_submitted_on_submit: false,
                summary_rounds: Vec::new(),
                advance_calls: 0,
                get_game_calls: 0,
                submissions: Vec::new(),
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Another player closed the round.
    pub fn advance_server(&self) {
        self.with(advance);
    }

    pub fn set_round(&self, round: u32) {
        self.with(|s| s.round = round);
    }

    pub fn finish_game(&self) {
        self.with(|s| s.status = GameStatus::Finished);
    }

    pub fn set_poll_delay(&self, delay: Duration) {
        self.with(|s| s.poll_delay = delay);
    }

    /// Hold production submissions in flight for `delay`.
    pub fn set_submit_delay(&self, delay: Duration) {
        self.with(|s| s.submit_delay = delay);
    }

    pub fn fail_next_polls(&self, n: u32) {
        self.with(|s| s.transient_poll_failures = n);
    }

    pub fn fail_polls_with(&self, make: fn() -> Error) {
        self.with(|s| s.poll_fatal = Some(make));
    }

    pub fn fail_summaries(&self, fail: bool) {
        self.with(|s| s.fail_summaries = fail);
    }

    pub fn fail_advance(&self, fail: bool) {
        self.with(|s| s.fail_advance = fail);
    }

    pub fn reject_submissions(&self, reject: bool) {
        self.with(|s| s.reject_submissions = reject);
    }

    /// Submissions report that this client was the last one to submit.
    pub fn last_to_submit(&self, last: bool) {
        self.with(|s| s.all_submitted_on_submit = last);
    }

    pub fn round(&self) -> u32 {
        self.with(|s| s.round)
    }

    pub fn summary_calls(&self) -> usize {
        self.with(|s| s.summary_rounds.len())
    }

    pub fn summary_rounds(&self) -> Vec<u32> {
        self.with(|s| s.summary_rounds.clone())
    }

    pub fn advance_calls(&self) -> u32 {
        self.with(|s| s.advance_calls)
    }

    pub fn get_game_calls(&self) -> u32 {
        self.with(|s| s.get_game_calls)
    }

    pub fn submissions(&self) -> Vec<ProductionPlan> {
        self.with(|s| s.submissions.clone())
    }

    fn poll_failure(&self) -> Option<Error> {
        self.with(|s| {
            if let Some(make) = s.poll_fatal {
                return Some(make());
            }
            if s.transient_poll_failures > 0 {
                s.transient_poll_failures -= 1;
                return Some(Error::Failed {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                    message: "upstream unavailable".into(),
                });
            }
            None
        })
    }
}

fn advance(s: &mut State) -> AdvanceOutcome {
    let previous_round = s.round;
    s.round += 1;
    if s.round > s.total_rounds {
        s.status = GameStatus::Finished;
    }
    AdvanceOutcome {
        previous_round,
        current_round: s.round,
        game_finished: s.status == GameStatus::Finished,
    }
}

impl GameApi for MockApi {
    async fn get_game(&self, game_id: GameId) -> Result<GameSession> {
        let delay = self.with(|s| {
            s.get_game_calls += 1;
            s.poll_delay
        });
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.poll_failure() {
            return Err(e);
        }
        Ok(self.with(|s| GameSession {
            id: game_id,
            name: "tea street".into(),
            max_players: 4,
            current_round: s.round,
            status: s.status,
            created_at: None,
        }))
    }

    async fn get_players(&self, _game_id: GameId) -> Result<Vec<Player>> {
        Ok(self.with(|s| s.players.clone()))
    }

    async fn get_player(&self, player_id: PlayerId) -> Result<Player> {
        self.with(|s| s.players.iter().find(|p| p.id == player_id).cloned())
            .ok_or(Error::NotFound)
    }

    async fn advance_round(&self, _game_id: GameId) -> Result<AdvanceOutcome> {
        self.with(|s| {
            s.advance_calls += 1;
            if s.fail_advance {
                return Err(Error::Rejected("round already advanced".into()));
            }
            Ok(advance(s))
        })
    }

    async fn get_round_summary(&self, _game_id: GameId, round: u32) -> Result<SettlementRecord> {
        let fail = self.with(|s| {
            s.summary_rounds.push(round);
            s.fail_summaries
        });
        if fail {
            return Err(Error::Failed {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                message: "summary not ready".into(),
            });
        }
        Ok(settlement(round))
    }

    async fn submit_production(&self, plan: &ProductionPlan) -> Result<ProductionSubmitResponse> {
        let delay = self.with(|s| s.submit_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| {
            if s.reject_submissions {
                return Err(Error::Rejected("insufficient cash".into()));
            }
            s.submissions.push(plan.clone());
            Ok(ProductionSubmitResponse {
                material_costs: None,
                all_players_submitted: s.all_submitted_on_submit,
            })
        })
    }
}
