#![deny(warnings)]

//! REST client for the game server.
//!
//! [`ApiClient`] speaks the server's JSON envelope (`{success, data, error}`)
//! and maps HTTP failures onto [`Error`]. The round synchronization code is
//! generic over [`GameApi`] so it can run against a stand-in server in tests.

pub mod client;

pub use client::{ApiClient, SESSION_HEADER};

use serde::{Deserialize, Serialize};
use std::future::Future;
use tea_core::{
    GameId, GameSession, Player, PlayerId, ProductionPlan, ProductionSubmitResponse,
    SettlementRecord, SummaryError,
};
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("session expired or missing")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("failed: {status}: {message}")]
    Failed {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("response carried no data")]
    EmptyResponse,
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid summary: {0}")]
    Summary(#[from] SummaryError),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
}

impl Error {
    /// 401 and 404 mean the session or the game no longer exists server-side.
    /// Retrying will not help; the caller should drop its session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Error::Unauthorized | Error::NotFound)
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of `POST /rounds/{game_id}/advance`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    #[serde(default)]
    pub previous_round: u32,
    #[serde(default)]
    pub current_round: u32,
    #[serde(default)]
    pub game_finished: bool,
}

/// The server operations the round protocol depends on.
pub trait GameApi: Send + Sync {
    /// `GET /games/{game_id}`
    fn get_game(&self, game_id: GameId) -> impl Future<Output = Result<GameSession>> + Send;

    /// `GET /games/{game_id}/players`
    fn get_players(&self, game_id: GameId) -> impl Future<Output = Result<Vec<Player>>> + Send;

    /// `GET /players/{player_id}`
    fn get_player(&self, player_id: PlayerId) -> impl Future<Output = Result<Player>> + Send;

    /// `POST /rounds/{game_id}/advance`
    fn advance_round(&self, game_id: GameId) -> impl Future<Output = Result<AdvanceOutcome>> + Send;

    /// `GET /rounds/{game_id}/{round}/summary`
    fn get_round_summary(
        &self,
        game_id: GameId,
        round: u32,
    ) -> impl Future<Output = Result<SettlementRecord>> + Send;

    /// `POST /production/submit`
    fn submit_production(
        &self,
        plan: &ProductionPlan,
    ) -> impl Future<Output = Result<ProductionSubmitResponse>> + Send;
}
