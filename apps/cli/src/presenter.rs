//! Plain-text rendering for the terminal.

use chrono::Local;
use round_sync::{NoticeLevel, Presenter};
use std::fmt::Write;
use tea_core::RoundPhase;
use tea_econ::{SettlementReport, Standing};

pub struct TerminalPresenter;

fn stamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Multi-line settlement table.
pub fn render_settlement(report: &SettlementReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== Round {} settlement ==", report.round_number);
    let _ = writeln!(out, "{:>3}  {:<16} {:>6} {:>10} {:>10}", "#", "player", "sold", "revenue", "profit");
    for p in &report.ranking {
        let _ = writeln!(
            out,
            "{:>3}  {:<16} {:>6} {:>10} {:>10}",
            p.rank, p.name, p.total_sold, p.total_revenue, p.round_profit
        );
    }
    let _ = writeln!(
        out,
        "total: {} cups sold, revenue {}",
        report.totals.sold, report.totals.revenue
    );
    if let Some(flow) = &report.customer_flow {
        let _ = writeln!(
            out,
            "customers: high {} (unserved {}), low {} (unserved {})",
            flow.high_tier_customers,
            unmet(report.unmet.high),
            flow.low_tier_customers,
            unmet(report.unmet.low)
        );
    }
    for row in &report.products {
        let _ = writeln!(
            out,
            "  {} / {} @ {}: made {}, sold {} (high {}, low {})",
            row.player, row.product, row.price, row.produced, row.sold_total, row.sold_high, row.sold_low
        );
    }
    out.push_str("type `ok` to continue");
    out
}

fn unmet(value: Option<u32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn render_standings(standings: &[Standing]) -> String {
    let mut out = String::from("== Final standings ==\n");
    for s in standings {
        let _ = writeln!(out, "{:>3}  {:<16} {:>12}", s.rank, s.name, s.cash);
    }
    match standings.first() {
        Some(winner) => {
            let _ = write!(out, "winner: {}", winner.name);
        }
        None => out.push_str("no players"),
    }
    out
}

impl Presenter for TerminalPresenter {
    fn settlement_shown(&mut self, report: &SettlementReport) {
        println!("{}", render_settlement(report));
    }

    fn phase_changed(&mut self, round: u32, phase: RoundPhase) {
        println!("[{}] round {round}: {phase}", stamp());
    }

    fn notice(&mut self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => println!("[{}] {message}", stamp()),
            NoticeLevel::Warning => eprintln!("[{}] warning: {message}", stamp()),
            NoticeLevel::Error => eprintln!("[{}] error: {message}", stamp()),
        }
    }

    fn loading_changed(&mut self, loading: bool) {
        if loading {
            println!("[{}] loading...", stamp());
        }
    }

    fn game_over(&mut self, standings: &[Standing]) {
        println!("{}", render_standings(standings));
    }
}
