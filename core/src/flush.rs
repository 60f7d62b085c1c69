//! Flush-with-retry
//!
//! A commit that hits the store lock is re-attempted after a fixed delay,
//! indefinitely. The retry is an explicit state machine: the timer event is
//! the only way out of `RetryScheduled`, so attempts never overlap.

use crate::error::Result;
use crate::event::{EngineEvent, EventSender};
use crate::session::Session;
use crate::store::Store;
use std::time::Duration;

/// Event-loop timer facility
pub trait Timer {
    /// Post `event` back to the loop once `delay` has elapsed
    fn schedule_after(&self, delay: Duration, event: EngineEvent);
}

/// Timer backed by the tokio runtime; falls back to a sleeper thread when
/// called outside one.
#[derive(Debug, Clone)]
pub struct TokioTimer {
    events: EventSender,
}

impl TokioTimer {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl Timer for TokioTimer {
    fn schedule_after(&self, delay: Duration, event: EngineEvent) {
        let events = self.events.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(event);
                });
            }
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    let _ = events.send(event);
                });
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushState {
    /// Nothing outstanding
    #[default]
    Committed,
    /// A commit attempt is running or about to
    PendingFirstAttempt,
    /// Waiting for the retry timer
    RetryScheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Committed,
    /// Store was locked; the timer will bring us back after this delay
    RetryScheduled(Duration),
    /// A retry is already pending and will pick up this change too
    AlreadyScheduled,
}

#[derive(Debug)]
pub struct FlushScheduler {
    state: FlushState,
    delay: Duration,
    retries: u64,
}

impl FlushScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: FlushState::Committed,
            delay,
            retries: 0,
        }
    }

    pub fn state(&self) -> FlushState {
        self.state
    }

    /// Lock failures seen since the last successful commit
    pub fn retries(&self) -> u64 {
        self.retries
    }

    pub fn attempt(&mut self, store: &mut dyn Store, timer: &dyn Timer) -> Result<FlushOutcome> {
        if self.state == FlushState::RetryScheduled {
            return Ok(FlushOutcome::AlreadyScheduled);
        }
        self.state = FlushState::PendingFirstAttempt;
        match store.commit() {
            Ok(()) => {
                self.state = FlushState::Committed;
                self.retries = 0;
                Ok(FlushOutcome::Committed)
            }
            Err(e) if e.is_retryable() => {
                self.state = FlushState::RetryScheduled;
                self.retries += 1;
                timer.schedule_after(self.delay, EngineEvent::FlushRetry);
                Ok(FlushOutcome::RetryScheduled(self.delay))
            }
            Err(e) => {
                self.state = FlushState::Committed;
                Err(e)
            }
        }
    }

    /// Timer fired; returns whether a retry attempt is due
    pub fn on_retry_timer(&mut self) -> bool {
        if self.state == FlushState::RetryScheduled {
            self.state = FlushState::PendingFirstAttempt;
            true
        } else {
            false
        }
    }
}

impl Session {
    /// Commit pending index mutations, scheduling a retry while locked
    pub fn flush(&mut self) -> Result<()> {
        match self.flush.attempt(&mut *self.store, &*self.timer)? {
            FlushOutcome::Committed => log::debug!("index flushed"),
            FlushOutcome::RetryScheduled(delay) => {
                log::warn!("index locked, retry {} in {:?}", self.flush.retries(), delay);
                self.notify(format!(
                    "index locked, will try again in {} secs",
                    delay.as_secs()
                ));
            }
            FlushOutcome::AlreadyScheduled => log::debug!("flush already scheduled"),
        }
        Ok(())
    }

    pub(crate) fn retry_flush(&mut self) -> Result<()> {
        if self.flush.on_retry_timer() {
            self.flush()
        } else {
            log::debug!("stale flush timer ignored");
            Ok(())
        }
    }

    pub fn flush_state(&self) -> FlushState {
        self.flush.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::IndexFile;
    use crate::store::MemoryStore;
    use crate::testing::ManualTimer;
    use crate::error::NotchError;

    #[test]
    fn test_commit_succeeds_first_time() {
        let mut store = MemoryStore::new(IndexFile::default());
        let timer = ManualTimer::new();
        let mut scheduler = FlushScheduler::new(Duration::from_secs(2));
        let outcome = scheduler.attempt(&mut store, &timer).unwrap();
        assert_eq!(outcome, FlushOutcome::Committed);
        assert_eq!(scheduler.state(), FlushState::Committed);
        assert!(timer.scheduled().is_empty());
    }

    #[test]
    fn test_lock_schedules_single_retry() {
        let mut store = MemoryStore::new(IndexFile::default()).with_failing_commits(1);
        let timer = ManualTimer::new();
        let mut scheduler = FlushScheduler::new(Duration::from_secs(3));

        let outcome = scheduler.attempt(&mut store, &timer).unwrap();
        assert_eq!(outcome, FlushOutcome::RetryScheduled(Duration::from_secs(3)));
        assert_eq!(scheduler.state(), FlushState::RetryScheduled);

        // no overlapping attempt while the timer is pending
        let outcome = scheduler.attempt(&mut store, &timer).unwrap();
        assert_eq!(outcome, FlushOutcome::AlreadyScheduled);
        assert_eq!(timer.scheduled().len(), 1);

        assert!(scheduler.on_retry_timer());
        assert!(!scheduler.on_retry_timer());
        let outcome = scheduler.attempt(&mut store, &timer).unwrap();
        assert_eq!(outcome, FlushOutcome::Committed);
        assert_eq!(store.commits(), 1);
        assert_eq!(scheduler.retries(), 0);
    }

    #[test]
    fn test_retries_indefinitely() {
        let mut store = MemoryStore::new(IndexFile::default()).with_failing_commits(50);
        let timer = ManualTimer::new();
        let mut scheduler = FlushScheduler::new(Duration::from_secs(1));
        let mut outcome = scheduler.attempt(&mut store, &timer).unwrap();
        while outcome != FlushOutcome::Committed {
            assert!(scheduler.on_retry_timer());
            outcome = scheduler.attempt(&mut store, &timer).unwrap();
        }
        assert_eq!(timer.scheduled().len(), 50);
    }

    struct BrokenStore;

    impl Store for BrokenStore {
        fn query(&self, _: &str) -> Result<Vec<crate::store::ThreadSummary>> {
            Ok(Vec::new())
        }
        fn count(&self, _: &str) -> Result<usize> {
            Ok(0)
        }
        fn thread(&self, _: &crate::store::ThreadId) -> Result<Option<crate::store::ThreadSummary>> {
            Ok(None)
        }
        fn messages(&self, _: &crate::store::ThreadId) -> Result<Vec<crate::store::MessageSummary>> {
            Ok(Vec::new())
        }
        fn mutate_tags(
            &mut self,
            _: &crate::store::ThreadId,
            _: &crate::store::TagSet,
            _: &crate::store::TagSet,
        ) -> Result<()> {
            Ok(())
        }
        fn commit(&mut self) -> Result<()> {
            Err(NotchError::Io(std::io::Error::other("disk full")))
        }
        fn list_all_tags(&self) -> Result<crate::store::TagSet> {
            Ok(Default::default())
        }
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let timer = ManualTimer::new();
        let mut scheduler = FlushScheduler::new(Duration::from_secs(1));
        let err = scheduler.attempt(&mut BrokenStore, &timer).unwrap_err();
        assert!(matches!(err, NotchError::Io(_)));
        assert_eq!(scheduler.state(), FlushState::Committed);
        assert!(timer.scheduled().is_empty());
    }
}
