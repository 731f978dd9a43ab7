use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::{AssistantBackend, BackendError, Run, RunStatus};
use crate::clock::Clock;

/// Where a run is after (possibly) waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Queued or in progress.
    Polling(Run),
    Completed(Run),
    Failed(Run),
    /// Terminal but neither completed nor failed (`cancelled`, `expired`, …).
    Ended(Run),
    /// Still active when the maximum wait elapsed.
    TimedOut { waited: Duration },
}

impl PollState {
    pub fn from_run(run: Run) -> Self {
        match run.status {
            RunStatus::Queued | RunStatus::InProgress => PollState::Polling(run),
            RunStatus::Completed => PollState::Completed(run),
            RunStatus::Failed => PollState::Failed(run),
            RunStatus::Other(_) => PollState::Ended(run),
        }
    }
}

/// Re-reads a run on a fixed interval until it leaves the active states or
/// `max_wait` elapses.
pub struct RunPoller<'a> {
    backend: &'a dyn AssistantBackend,
    clock: &'a dyn Clock,
    interval: Duration,
    max_wait: Duration,
}

impl<'a> RunPoller<'a> {
    pub fn new(
        backend: &'a dyn AssistantBackend,
        clock: &'a dyn Clock,
        interval: Duration,
        max_wait: Duration,
    ) -> Self {
        Self {
            backend,
            clock,
            interval,
            max_wait,
        }
    }

    /// Drive `run` to a non-polling state within `max_wait`, including time
    /// spent inside status reads. Backend errors are returned as-is.
    pub async fn wait(&self, session_id: &str, run: Run) -> Result<PollState, BackendError> {
        let started = self.clock.now();
        let mut state = PollState::from_run(run);

        loop {
            let run = match state {
                PollState::Polling(run) => run,
                done => return Ok(done),
            };

            let waited = self.clock.now().saturating_duration_since(started);
            if waited >= self.max_wait {
                return Ok(PollState::TimedOut { waited });
            }

            // Never sleep past the deadline.
            self.clock
                .sleep(self.interval.min(self.max_wait - waited))
                .await;

            // A stalled read is bounded by whatever wait is left.
            let left = self
                .max_wait
                .saturating_sub(self.clock.now().saturating_duration_since(started));
            let next = tokio::select! {
                biased;
                next = self.backend.get_run(session_id, &run.id) => next?,
                _ = self.clock.sleep(left) => {
                    let waited = self.clock.now().saturating_duration_since(started);
                    warn!(run = %run.id, ?waited, "run status read did not return before the deadline");
                    return Ok(PollState::TimedOut { waited });
                }
            };
            debug!(run = %next.id, status = %next.status, "polled run");
            state = PollState::from_run(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Role, SessionMessage};
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports `in_progress` for the first `active_polls` reads, then `final_status`.
    struct ScriptedRuns {
        active_polls: usize,
        final_status: &'static str,
        polls: AtomicUsize,
    }

    fn run(status: &str) -> Run {
        Run {
            id: "run_1".into(),
            status: RunStatus::parse(status),
            last_error: None,
        }
    }

    #[async_trait]
    impl AssistantBackend for ScriptedRuns {
        async fn append_message(&self, _: &str, _: Role, _: &str) -> Result<(), BackendError> {
            Ok(())
        }
        async fn start_run(&self, _: &str, _: &str) -> Result<Run, BackendError> {
            Ok(run("queued"))
        }
        async fn get_run(&self, _: &str, _: &str) -> Result<Run, BackendError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n < self.active_polls {
                Ok(run("in_progress"))
            } else {
                Ok(run(self.final_status))
            }
        }
        async fn latest_message(&self, _: &str) -> Result<Option<SessionMessage>, BackendError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn terminal_run_is_returned_without_polling() {
        let backend = ScriptedRuns {
            active_polls: 0,
            final_status: "completed",
            polls: AtomicUsize::new(0),
        };
        let clock = ManualClock::new();
        let poller = RunPoller::new(&backend, &clock, Duration::from_millis(500), Duration::from_secs(5));

        let state = poller.wait("thread", run("completed")).await.unwrap();
        assert!(matches!(state, PollState::Completed(_)));
        assert_eq!(backend.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn polls_until_completed() {
        let backend = ScriptedRuns {
            active_polls: 3,
            final_status: "completed",
            polls: AtomicUsize::new(0),
        };
        let clock = ManualClock::new();
        let poller = RunPoller::new(&backend, &clock, Duration::from_millis(500), Duration::from_secs(60));

        let state = poller.wait("thread", run("queued")).await.unwrap();
        assert!(matches!(state, PollState::Completed(_)));
        assert_eq!(backend.polls.load(Ordering::SeqCst), 4);
        assert_eq!(clock.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn never_terminal_run_times_out() {
        let backend = ScriptedRuns {
            active_polls: usize::MAX,
            final_status: "completed",
            polls: AtomicUsize::new(0),
        };
        let clock = ManualClock::new();
        let poller = RunPoller::new(&backend, &clock, Duration::from_millis(500), Duration::from_secs(2));

        let state = poller.wait("thread", run("queued")).await.unwrap();
        assert_eq!(
            state,
            PollState::TimedOut {
                waited: Duration::from_secs(2)
            }
        );
        assert_eq!(backend.polls.load(Ordering::SeqCst), 4);
    }

    /// Status reads never return.
    struct StalledRuns;

    #[async_trait]
    impl AssistantBackend for StalledRuns {
        async fn append_message(&self, _: &str, _: Role, _: &str) -> Result<(), BackendError> {
            Ok(())
        }
        async fn start_run(&self, _: &str, _: &str) -> Result<Run, BackendError> {
            Ok(run("queued"))
        }
        async fn get_run(&self, _: &str, _: &str) -> Result<Run, BackendError> {
            std::future::pending::<Result<Run, BackendError>>().await
        }
        async fn latest_message(&self, _: &str) -> Result<Option<SessionMessage>, BackendError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn stalled_status_read_times_out() {
        let clock = ManualClock::new();
        let poller = RunPoller::new(&StalledRuns, &clock, Duration::from_millis(500), Duration::from_secs(2));

        let state = tokio::time::timeout(Duration::from_secs(5), poller.wait("thread", run("queued")))
            .await
            .expect("wait must be bounded")
            .unwrap();
        assert_eq!(
            state,
            PollState::TimedOut {
                waited: Duration::from_secs(2)
            }
        );
    }

    #[tokio::test]
    async fn stalled_status_read_times_out_in_real_time() {
        let poller = RunPoller::new(
            &StalledRuns,
            &crate::clock::TokioClock,
            Duration::from_millis(20),
            Duration::from_millis(200),
        );

        let state = tokio::time::timeout(Duration::from_secs(2), poller.wait("thread", run("queued")))
            .await
            .expect("wait must be bounded")
            .unwrap();
        assert!(matches!(state, PollState::TimedOut { waited } if waited >= Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn unknown_terminal_status_ends() {
        let backend = ScriptedRuns {
            active_polls: 1,
            final_status: "expired",
            polls: AtomicUsize::new(0),
        };
        let clock = ManualClock::new();
        let poller = RunPoller::new(&backend, &clock, Duration::from_millis(500), Duration::from_secs(60));

        match poller.wait("thread", run("queued")).await.unwrap() {
            PollState::Ended(r) => assert_eq!(r.status.as_str(), "expired"),
            other => panic!("unexpected state: {other:?}"),
        }
    }
}
