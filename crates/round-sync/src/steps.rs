//! Per-round decision panel progress.

use std::collections::BTreeMap;
use tea_core::{DecisionStepKey, DecisionStepStatus};

/// Which decision panel is open and how far each one has got.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionSteps {
    active: DecisionStepKey,
    statuses: BTreeMap<DecisionStepKey, DecisionStepStatus>,
    last_completed: Option<DecisionStepKey>,
}

impl Default for DecisionSteps {
    fn default() -> Self {
        Self {
            active: DecisionStepKey::Shop,
            statuses: DecisionStepKey::ALL
                .into_iter()
                .map(|k| (k, k.initial_status()))
                .collect(),
            last_completed: None,
        }
    }
}

impl DecisionSteps {
    pub fn active(&self) -> DecisionStepKey {
        self.active
    }

    pub fn status(&self, key: DecisionStepKey) -> DecisionStepStatus {
        self.statuses
            .get(&key)
            .copied()
            .unwrap_or_else(|| key.initial_status())
    }

    /// Steps in display order with their status.
    pub fn iter(&self) -> impl Iterator<Item = (DecisionStepKey, DecisionStepStatus)> + '_ {
        self.statuses.iter().map(|(k, s)| (*k, *s))
    }

    pub fn last_completed(&self) -> Option<DecisionStepKey> {
        self.last_completed
    }

    pub fn set_active(&mut self, key: DecisionStepKey) {
        self.active = key;
    }

    pub fn set_status(&mut self, key: DecisionStepKey, status: DecisionStepStatus) {
        if status == DecisionStepStatus::Completed {
            self.last_completed = Some(key);
        }
        self.statuses.insert(key, status);
    }

    /// Overwrite statuses from a saved snapshot. Unlisted steps keep theirs.
    pub fn hydrate<I>(&mut self, statuses: I)
    where
        I: IntoIterator<Item = (DecisionStepKey, DecisionStepStatus)>,
    {
        for (key, status) in statuses {
            self.set_status(key, status);
        }
    }

    pub fn mark_all_completed(&mut self) {
        for key in DecisionStepKey::ALL {
            self.statuses.insert(key, DecisionStepStatus::Completed);
        }
        self.last_completed = Some(DecisionStepKey::Production);
    }

    /// Every step waits for the round to settle.
    pub fn mark_waiting(&mut self) {
        for status in self.statuses.values_mut() {
            *status = DecisionStepStatus::Waiting;
        }
    }

    pub fn all_completed(&self) -> bool {
        self.statuses
            .values()
            .all(|s| matches!(s, DecisionStepStatus::Completed | DecisionStepStatus::Waiting))
    }

    /// Back to the start of a round: shop open, everything else pending.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_round_opens_shop() {
        let steps = DecisionSteps::default();
        assert_eq!(steps.active(), DecisionStepKey::Shop);
        assert_eq!(steps.status(DecisionStepKey::Shop), DecisionStepStatus::InProgress);
        assert_eq!(steps.status(DecisionStepKey::Market), DecisionStepStatus::Pending);
        assert!(!steps.all_completed());
    }

    #[test]
    fn completing_a_step_is_remembered() {
        let mut steps = DecisionSteps::default();
        steps.set_status(DecisionStepKey::Employees, DecisionStepStatus::Completed);
        assert_eq!(steps.last_completed(), Some(DecisionStepKey::Employees));
        steps.set_status(DecisionStepKey::Market, DecisionStepStatus::InProgress);
        assert_eq!(steps.last_completed(), Some(DecisionStepKey::Employees));
    }

    #[test]
    fn waiting_then_reset() {
        let mut steps = DecisionSteps::default();
        steps.set_active(DecisionStepKey::Production);
        steps.mark_all_completed();
        steps.mark_waiting();
        assert!(steps.iter().all(|(_, s)| s == DecisionStepStatus::Waiting));
        assert!(steps.all_completed());
        steps.reset();
        assert_eq!(steps, DecisionSteps::default());
    }

    #[test]
    fn hydrate_overrides_listed_steps() {
        let mut steps = DecisionSteps::default();
        steps.hydrate([
            (DecisionStepKey::Shop, DecisionStepStatus::Completed),
            (DecisionStepKey::Research, DecisionStepStatus::Locked),
        ]);
        assert_eq!(steps.status(DecisionStepKey::Shop), DecisionStepStatus::Completed);
        assert_eq!(steps.status(DecisionStepKey::Research), DecisionStepStatus::Locked);
        assert_eq!(steps.status(DecisionStepKey::Market), DecisionStepStatus::Pending);
        assert_eq!(steps.iter().count(), DecisionStepKey::ALL.len());
    }
}
