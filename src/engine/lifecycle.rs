use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::EngineError;

/// Run states: `Idle -> Running -> {Completed, Cancelled, Aborted}`.
/// `Aborted` is entered from `Idle` on a fatal pre-flight error, or from
/// `Running` when the candidate source fails before reaching its end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Aborted,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Idle, RunState::Running)
                | (RunState::Idle, RunState::Aborted)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::Cancelled)
                | (RunState::Running, RunState::Aborted)
        )
    }

    /// Moves to `next`, rejecting any transition the lifecycle does not allow.
    pub fn advance(self, next: RunState) -> Result<RunState, EngineError> {
        if !self.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self,
                to: next,
            });
        }
        debug!(from = self.label(), to = next.label(), "run state");
        Ok(next)
    }

    /// Process exit code for a finished run.
    pub fn exit_code(self) -> i32 {
        match self {
            RunState::Cancelled => 2,
            RunState::Aborted => 1,
            RunState::Idle | RunState::Running | RunState::Completed => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
            RunState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Cooperative cancellation. The caller's signal (e.g. Ctrl-C) is shared and
/// never reset; each run also gets a private one for its deadline. Advisory
/// only: it stops new pulls, in-flight requests still run to their own timeout.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            // the sender lives in self, so changed() cannot fail while we wait
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Fires the signal once `after` has elapsed.
    pub fn cancel_after(&self, after: Duration) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            tracing::info!(?after, "run deadline reached, cancelling");
            signal.cancel();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        assert!(RunState::Idle.can_transition_to(RunState::Running));
        assert!(RunState::Idle.can_transition_to(RunState::Aborted));
        assert!(RunState::Running.can_transition_to(RunState::Cancelled));
        assert!(RunState::Running.can_transition_to(RunState::Aborted));
        assert!(!RunState::Completed.can_transition_to(RunState::Running));
        assert!(!RunState::Idle.can_transition_to(RunState::Completed));
    }

    #[test]
    fn advance_rejects_illegal_moves() {
        let running = RunState::Idle.advance(RunState::Running).unwrap();
        assert_eq!(running.advance(RunState::Completed).unwrap(), RunState::Completed);
        let err = RunState::Completed.advance(RunState::Running).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: RunState::Completed,
                to: RunState::Running
            }
        ));
        assert_eq!(err.to_string(), "invalid run state transition: completed -> running");
    }

    #[test]
    fn exit_codes() {
        assert_eq!(RunState::Completed.exit_code(), 0);
        assert_eq!(RunState::Aborted.exit_code(), 1);
        assert_eq!(RunState::Cancelled.exit_code(), 2);
    }

    #[tokio::test]
    async fn cancelled_resolves_for_late_and_early_waiters() {
        let signal = CancelSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        assert!(!signal.is_cancelled());
        signal.cancel();
        waiter.await.unwrap();
        // already cancelled: returns immediately
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn deadline_cancels() {
        let signal = CancelSignal::new();
        let handle = signal.cancel_after(Duration::from_millis(20));
        tokio::time::timeout(Duration::from_secs(2), signal.cancelled())
            .await
            .unwrap();
        handle.await.unwrap();
    }
}
