//! Events that re-enter the engine loop from outside it
//!
//! Workers and timers never touch session state; they post one of these
//! tokens and the loop thread acts on it.

use crate::process::ExitStatus;
use std::fmt;
use tokio::sync::mpsc;

/// Identifies one in-flight asynchronous external command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A background process exited; `Err` carries the spawn failure
    ProcessExited {
        task: TaskId,
        outcome: Result<ExitStatus, String>,
    },
    /// The flush retry delay elapsed
    FlushRetry,
}

pub type EventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
