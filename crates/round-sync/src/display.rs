//! Settlement display and the presentation seam.

use std::collections::VecDeque;
use tea_core::{RoundPhase, SettlementRecord};
use tea_econ::{SettlementReport, Standing};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Whatever renders the game: a terminal, a window, a test recorder.
pub trait Presenter {
    /// A settlement went on screen. Called once per round.
    fn settlement_shown(&mut self, report: &SettlementReport);

    fn phase_changed(&mut self, round: u32, phase: RoundPhase);

    /// Transient message such as a failed poll or a refused action.
    fn notice(&mut self, level: NoticeLevel, message: &str);

    fn loading_changed(&mut self, _loading: bool) {}

    /// Final cash ranking, once the game is over.
    fn game_over(&mut self, _standings: &[Standing]) {}
}

/// The settlement currently on screen, plus any that arrived behind it.
#[derive(Debug, Default)]
pub struct SettlementView {
    current: Option<SettlementReport>,
    queued: VecDeque<SettlementReport>,
}

impl SettlementView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the report for `record`. Returns it if it went on screen now;
    /// if another settlement is still visible it waits its turn.
    pub fn show(&mut self, record: &SettlementRecord) -> Option<&SettlementReport> {
        let report = SettlementReport::build(record);
        if let Some(visible) = &self.current {
            debug!(
                visible = visible.round_number,
                queued = report.round_number,
                "settlement queued behind the visible one"
            );
            self.queued.push_back(report);
            return None;
        }
        info!(round = report.round_number, "showing settlement");
        self.current = Some(report);
        self.current.as_ref()
    }

    pub fn current(&self) -> Option<&SettlementReport> {
        self.current.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.current.is_some()
    }

    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    /// Dismiss the visible settlement. Returns its round.
    pub fn acknowledge(&mut self) -> Option<u32> {
        self.current.take().map(|r| r.round_number)
    }

    /// Put the next queued settlement on screen, if nothing is visible.
    pub fn promote_next(&mut self) -> Option<&SettlementReport> {
        if self.current.is_none() {
            self.current = self.queued.pop_front();
        }
        self.current.as_ref()
    }
}

/// Phase to enter once the settlement for `acked_round` is dismissed.
///
/// The game is over when that was the last round, when the server is already
/// past the last round, or when the server says so.
pub fn next_phase_after_ack(
    acked_round: u32,
    server_round: u32,
    total_rounds: u32,
    game_finished: bool,
) -> RoundPhase {
    if game_finished || acked_round >= total_rounds || server_round > total_rounds {
        RoundPhase::Finished
    } else {
        RoundPhase::Planning
    }
}
