#![deny(warnings)]

//! Settlement arithmetic for the milk tea shop battle client.
//!
//! This crate turns a [`SettlementRecord`] into what a settlement screen shows:
//! - Players ranked by round profit
//! - Round totals (cups sold, revenue)
//! - Customers left unserved per spending tier
//! - Per-product sales detail
//!
//! and ranks the final standings by cash when a game ends.

use rust_decimal::Decimal;
use tea_core::{AllocationResult, CustomerFlow, Player, PlayerId, PlayerRoundSummary, SettlementRecord};
use tracing::debug;

/// A player's line in the round ranking.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedPlayer {
    /// 1-based position.
    pub rank: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub total_sold: u32,
    pub total_revenue: Decimal,
    pub round_profit: Decimal,
}

/// Sum over all players in a round.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RoundTotals {
    pub sold: u64,
    pub revenue: Decimal,
}

/// Customers generated but not served, per tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnmetDemand {
    pub high: Option<u32>,
    pub low: Option<u32>,
}

/// One product sold by one player.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductRow {
    pub player: String,
    pub product: String,
    pub price: Decimal,
    pub produced: u32,
    pub sold_high: u32,
    pub sold_low: u32,
    pub sold_total: u32,
}

/// Final position of a player when the game is over.
#[derive(Clone, Debug, PartialEq)]
pub struct Standing {
    pub rank: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub cash: Decimal,
}

/// Rank players by round profit, highest first. Ties keep server order.
///
/// Example:
/// let ranked = rank_by_profit(&record.players);
/// assert_eq!(ranked[0].rank, 1);
pub fn rank_by_profit(players: &[PlayerRoundSummary]) -> Vec<RankedPlayer> {
    let mut sorted: Vec<&PlayerRoundSummary> = players.iter().collect();
    sorted.sort_by(|a, b| b.round_profit.cmp(&a.round_profit));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, p)| RankedPlayer {
            rank: i + 1,
            player_id: p.player_id,
            name: p.display_name(),
            total_sold: p.total_sold,
            total_revenue: p.total_revenue,
            round_profit: p.round_profit,
        })
        .collect()
}

/// Total cups sold and total revenue across players.
pub fn round_totals(players: &[PlayerRoundSummary]) -> RoundTotals {
    players.iter().fold(RoundTotals::default(), |acc, p| RoundTotals {
        sold: acc.sold.saturating_add(u64::from(p.total_sold)),
        revenue: acc.revenue + p.total_revenue,
    })
}

/// Unserved customers per tier: `max(customers - served, 0)`.
///
/// Only computed when both the customer flow and the allocation result are
/// known; a served count missing from the allocation counts as zero.
pub fn unmet_demand(flow: Option<&CustomerFlow>, allocation: Option<&AllocationResult>) -> UnmetDemand {
    match (flow, allocation) {
        (Some(flow), Some(alloc)) => UnmetDemand {
            high: Some(
                flow.high_tier_customers
                    .saturating_sub(alloc.high_tier_served.unwrap_or(0)),
            ),
            low: Some(
                flow.low_tier_customers
                    .saturating_sub(alloc.low_tier_served.unwrap_or(0)),
            ),
        },
        _ => UnmetDemand::default(),
    }
}

/// Flatten per-product sales, players in profit-ranking order.
pub fn product_rows(players: &[PlayerRoundSummary]) -> Vec<ProductRow> {
    let mut sorted: Vec<&PlayerRoundSummary> = players.iter().collect();
    sorted.sort_by(|a, b| b.round_profit.cmp(&a.round_profit));
    sorted
        .into_iter()
        .flat_map(|p| {
            let name = p.display_name();
            p.productions.iter().map(move |line| ProductRow {
                player: name.clone(),
                product: line.product_name.to_string(),
                price: line.price,
                produced: line.produced,
                sold_high: line.sold_to_high,
                sold_low: line.sold_to_low,
                sold_total: line.sold,
            })
        })
        .collect()
}

/// Rank players by remaining cash, highest first. The first entry is the winner.
pub fn final_standings(players: &[Player]) -> Vec<Standing> {
    let mut sorted: Vec<&Player> = players.iter().collect();
    sorted.sort_by(|a, b| b.cash.cmp(&a.cash));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, p)| Standing {
            rank: i + 1,
            player_id: p.id,
            name: p.name.clone(),
            cash: p.cash,
        })
        .collect()
}

/// Everything a settlement screen displays for one round.
#[derive(Clone, Debug, PartialEq)]
pub struct SettlementReport {
    pub round_number: u32,
    pub ranking: Vec<RankedPlayer>,
    pub totals: RoundTotals,
    pub customer_flow: Option<CustomerFlow>,
    pub unmet: UnmetDemand,
    pub products: Vec<ProductRow>,
}

impl SettlementReport {
    pub fn build(record: &SettlementRecord) -> Self {
        let report = Self {
            round_number: record.round_number,
            ranking: rank_by_profit(&record.players),
            totals: round_totals(&record.players),
            customer_flow: record.customer_flow.clone(),
            unmet: unmet_demand(record.customer_flow.as_ref(), record.allocation.as_ref()),
            products: product_rows(&record.players),
        };
        debug!(
            round = report.round_number,
            players = report.ranking.len(),
            sold = report.totals.sold,
            "settlement report built"
        );
        report
    }

    /// Leader of the round, if any player is listed.
    pub fn leader(&self) -> Option<&RankedPlayer> {
        self.ranking.first()
    }
}
