//! Per-key refresh state.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of a cache key.
///
/// `Uninitialized -> Refreshing -> Ready -> Refreshing -> ...`, with `Failed`
/// when the last cycle failed. A failed key keeps serving its previous
/// snapshot, if any.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    #[default]
    Uninitialized,
    Refreshing,
    Ready,
    Failed,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    pub state: RefreshState,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Cycles skipped because another one for the key was still running.
    pub suppressed: u64,
}

impl KeyStatus {
    pub(crate) fn begin(&mut self) {
        self.state = RefreshState::Refreshing;
    }

    pub(crate) fn succeed(&mut self, at: DateTime<Utc>) {
        self.state = RefreshState::Ready;
        self.last_success = Some(at);
        self.last_error = None;
        self.consecutive_failures = 0;
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.state = RefreshState::Failed;
        self.last_error = Some(error);
        self.consecutive_failures += 1;
    }

    /// A cancelled cycle leaves the key as the previous cycle left it.
    pub(crate) fn abandon(&mut self) {
        self.state = if self.consecutive_failures > 0 {
            RefreshState::Failed
        } else if self.last_success.is_some() {
            RefreshState::Ready
        } else {
            RefreshState::Uninitialized
        };
    }

    pub fn is_ready(&self) -> bool {
        self.last_success.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut status = KeyStatus::default();
        assert_eq!(status.state, RefreshState::Uninitialized);

        status.begin();
        assert_eq!(status.state, RefreshState::Refreshing);
        status.abandon();
        assert_eq!(status.state, RefreshState::Uninitialized);

        status.begin();
        status.succeed(Utc::now());
        assert_eq!(status.state, RefreshState::Ready);

        status.begin();
        status.fail("timeout".to_string());
        status.begin();
        status.fail("timeout".to_string());
        assert_eq!(status.state, RefreshState::Failed);
        assert_eq!(status.consecutive_failures, 2);
        assert!(status.is_ready());

        status.begin();
        status.abandon();
        assert_eq!(status.state, RefreshState::Failed);

        status.succeed(Utc::now());
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.last_error, None);
    }
}
