#![deny(warnings)]

//! Core domain and wire models for the milk tea shop battle client.
//!
//! This crate defines the serializable types the game server reports (games,
//! players, round summaries) and the client-local round lifecycle types, with
//! validation helpers for the invariants the client can check on its own.

mod config;

pub use config::{ClientConfig, ConfigError, API_BASE_URL_ENV};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Server-assigned game identifier.
pub type GameId = u64;
/// Server-assigned player identifier.
pub type PlayerId = u64;

/// Lifecycle of a game room as reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Lobby: players are still joining.
    Waiting,
    /// Rounds are being played.
    InProgress,
    /// Terminal: no further rounds.
    Finished,
}

fn first_round() -> u32 {
    1
}

fn round_or_first<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(Option::<u32>::deserialize(d)?.unwrap_or_else(first_round))
}

/// Authoritative game state, cached by the client between polls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: GameId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub max_players: u32,
    /// Round currently being played. Missing or null means round 1.
    #[serde(default = "first_round", deserialize_with = "round_or_first")]
    pub current_round: u32,
    pub status: GameStatus,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl GameSession {
    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }
}

/// Whether a player is still trading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    #[default]
    Active,
    Bankrupt,
}

/// A participant in a game room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub game_id: GameId,
    #[serde(default)]
    pub name: String,
    /// Cash on hand.
    #[serde(default)]
    pub cash: Decimal,
    #[serde(default)]
    pub is_ready: bool,
    #[serde(default)]
    pub turn_order: u32,
    #[serde(default)]
    pub status: PlayerStatus,
}

/// Client-local position in the round lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Decisions for the current round may be submitted.
    #[default]
    Planning,
    /// This client submitted; other players are still deciding.
    Waiting,
    /// A settlement is on screen.
    Summary,
    /// Game over. Absorbing.
    Finished,
}

impl RoundPhase {
    pub fn is_terminal(self) -> bool {
        self == RoundPhase::Finished
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoundPhase::Planning => "planning",
            RoundPhase::Waiting => "waiting",
            RoundPhase::Summary => "summary",
            RoundPhase::Finished => "finished",
        }
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The per-round decision panels, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStepKey {
    Shop,
    Employees,
    Market,
    Research,
    Production,
}

impl DecisionStepKey {
    pub const ALL: [DecisionStepKey; 5] = [
        DecisionStepKey::Shop,
        DecisionStepKey::Employees,
        DecisionStepKey::Market,
        DecisionStepKey::Research,
        DecisionStepKey::Production,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DecisionStepKey::Shop => "shop",
            DecisionStepKey::Employees => "employees",
            DecisionStepKey::Market => "market",
            DecisionStepKey::Research => "research",
            DecisionStepKey::Production => "production",
        }
    }

    /// Status a step starts each round with.
    pub fn initial_status(self) -> DecisionStepStatus {
        match self {
            DecisionStepKey::Shop => DecisionStepStatus::InProgress,
            _ => DecisionStepStatus::Pending,
        }
    }
}

impl fmt::Display for DecisionStepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionStepKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DecisionStepKey::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownStep(s.to_string()))
    }
}

/// Progress marker shown on a decision panel tab.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStepStatus {
    Locked,
    Pending,
    InProgress,
    Completed,
    Waiting,
}

/// One line of a production plan: how much productivity goes to a product and at what price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Production {
    pub product_id: u64,
    pub productivity: u32,
    pub price: Decimal,
}

/// Body of `POST /production/submit`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductionPlan {
    pub player_id: PlayerId,
    pub round_number: u32,
    pub productions: Vec<Production>,
}

/// Cost breakdown for one raw material.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialCostDetail {
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub discount_rate: Option<Decimal>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialCosts {
    #[serde(default)]
    pub tea: Option<MaterialCostDetail>,
    #[serde(default)]
    pub milk: Option<MaterialCostDetail>,
    #[serde(default)]
    pub fruit: Option<MaterialCostDetail>,
    #[serde(default)]
    pub ingredient: Option<MaterialCostDetail>,
    #[serde(default)]
    pub total_cost: Decimal,
}

/// Response to a production plan submission.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionSubmitResponse {
    #[serde(default)]
    pub material_costs: Option<MaterialCosts>,
    /// True when this submission was the last one the round was waiting for.
    #[serde(default)]
    pub all_players_submitted: bool,
}

/// Customers generated for a round, split by spending tier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFlow {
    #[serde(default)]
    pub round_number: u32,
    #[serde(default)]
    pub high_tier_customers: u32,
    #[serde(default)]
    pub low_tier_customers: u32,
}

/// How many customers of each tier were actually served.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    #[serde(default)]
    pub high_tier_served: Option<u32>,
    #[serde(default)]
    pub low_tier_served: Option<u32>,
}

/// A product as named in a summary line. The server currently sends the product id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    Id(u64),
    Name(String),
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductRef::Id(id) => write!(f, "product #{id}"),
            ProductRef::Name(name) => f.write_str(name),
        }
    }
}

/// Sales of one product by one player in a settled round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductionLine {
    pub product_name: ProductRef,
    #[serde(default)]
    pub produced: u32,
    #[serde(default)]
    pub sold: u32,
    #[serde(default)]
    pub sold_to_high: u32,
    #[serde(default)]
    pub sold_to_low: u32,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub revenue: Decimal,
}

/// One player's outcome for a settled round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRoundSummary {
    pub player_id: PlayerId,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub total_revenue: Decimal,
    #[serde(default)]
    pub total_sold: u32,
    #[serde(default)]
    pub round_profit: Decimal,
    #[serde(default)]
    pub productions: Vec<ProductionLine>,
}

impl PlayerRoundSummary {
    /// Nickname, then player name, then the numeric id.
    pub fn display_name(&self) -> String {
        if !self.nickname.trim().is_empty() {
            return self.nickname.clone();
        }
        match &self.player_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("#{}", self.player_id),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SummaryPayload {
    Players(Vec<PlayerRoundSummary>),
    Detailed {
        #[serde(default)]
        round_number: Option<u32>,
        #[serde(default)]
        players: Vec<PlayerRoundSummary>,
        #[serde(default)]
        customer_flow: Option<CustomerFlow>,
        #[serde(default)]
        allocation_result: Option<AllocationResult>,
    },
}

/// Errors decoding a round summary payload.
#[derive(Debug, Error, PartialEq)]
pub enum SummaryError {
    /// The payload matched neither the bare-array nor the object form.
    #[error("malformed round summary: {0}")]
    Malformed(String),
    /// The server returned a summary with no players.
    #[error("round {0} summary has no player data")]
    Empty(u32),
}

/// Server-computed outcome of one round for every player. Shown once, never cached.
#[derive(Clone, Debug, PartialEq)]
pub struct SettlementRecord {
    pub round_number: u32,
    pub players: Vec<PlayerRoundSummary>,
    pub customer_flow: Option<CustomerFlow>,
    pub allocation: Option<AllocationResult>,
    /// Payload exactly as received.
    pub raw: serde_json::Value,
}

impl SettlementRecord {
    /// Decode the summary for `round`. Accepts either a bare player array or
    /// an object carrying `players` alongside customer flow data.
    pub fn from_payload(round: u32, raw: serde_json::Value) -> Result<Self, SummaryError> {
        let payload: SummaryPayload = serde_json::from_value(raw.clone())
            .map_err(|e| SummaryError::Malformed(e.to_string()))?;
        let (players, customer_flow, allocation) = match payload {
            SummaryPayload::Players(players) => (players, None, None),
            SummaryPayload::Detailed {
                round_number,
                players,
                customer_flow,
                allocation_result,
            } => {
                if let Some(reported) = round_number {
                    if reported != round {
                        warn!(requested = round, reported, "summary round mismatch");
                    }
                }
                (players, customer_flow, allocation_result)
            }
        };
        if players.is_empty() {
            return Err(SummaryError::Empty(round));
        }
        Ok(Self {
            round_number: round,
            players,
            customer_flow,
            allocation,
            raw,
        })
    }
}

/// Validation errors for client-side invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Rounds are numbered from 1.
    #[error("round {0} is out of range")]
    RoundOutOfRange(u32),
    /// A production plan needs at least one line.
    #[error("production plan is empty")]
    EmptyPlan,
    /// At least one line must allocate productivity.
    #[error("production plan allocates no productivity")]
    NoProductivity,
    /// Prices must be non-negative.
    #[error("negative price for product {0}")]
    NegativePrice(u64),
    /// Each product may appear once per plan.
    #[error("duplicate product in plan: {0}")]
    DuplicateProduct(u64),
    /// Unrecognized decision step name.
    #[error("unknown decision step: {0}")]
    UnknownStep(String),
}

/// Validate a game snapshot.
pub fn validate_game(game: &GameSession) -> Result<(), ValidationError> {
    if game.current_round == 0 {
        return Err(ValidationError::RoundOutOfRange(0));
    }
    Ok(())
}

/// Validate a production plan before it is submitted.
pub fn validate_plan(plan: &ProductionPlan) -> Result<(), ValidationError> {
    if plan.round_number == 0 {
        return Err(ValidationError::RoundOutOfRange(plan.round_number));
    }
    if plan.productions.is_empty() {
        return Err(ValidationError::EmptyPlan);
    }
    let mut seen = BTreeSet::new();
    for p in &plan.productions {
        if p.price < Decimal::ZERO {
            return Err(ValidationError::NegativePrice(p.product_id));
        }
        if !seen.insert(p.product_id) {
            return Err(ValidationError::DuplicateProduct(p.product_id));
        }
    }
    if plan.productions.iter().all(|p| p.productivity == 0) {
        return Err(ValidationError::NoProductivity);
    }
    Ok(())
}
