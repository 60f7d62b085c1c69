//! Index store contract
//!
//! The engine never owns thread or message data; it holds [`ThreadId`]
//! handles and re-queries the store whenever a view needs fresh state.

pub mod memory;
pub mod query;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub use memory::MemoryStore;

pub type TagSet = BTreeSet<String>;

/// Handle of a thread in the index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of a search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub subject: String,
    pub authors: Vec<String>,
    pub tags: TagSet,
    pub total_messages: usize,
}

/// One message of a thread view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    pub id: String,
    pub from: String,
    pub date: String,
    pub tags: TagSet,
}

/// Narrow contract the engine drives the backing index through.
///
/// All calls happen on the loop thread; the store does its own locking
/// against other processes and reports it through `NotchError::Locked`.
pub trait Store {
    /// Threads with at least one message matching `query`
    fn query(&self, query: &str) -> Result<Vec<ThreadSummary>>;

    /// Number of messages matching `query`
    fn count(&self, query: &str) -> Result<usize>;

    fn thread(&self, id: &ThreadId) -> Result<Option<ThreadSummary>>;

    fn messages(&self, id: &ThreadId) -> Result<Vec<MessageSummary>>;

    /// Fails with `NotchError::ReadOnly` without touching anything
    fn mutate_tags(&mut self, id: &ThreadId, add: &TagSet, remove: &TagSet) -> Result<()>;

    /// Fails with `NotchError::Locked` while another writer holds the index
    fn commit(&mut self) -> Result<()>;

    fn list_all_tags(&self) -> Result<TagSet>;

    fn is_read_only(&self) -> bool {
        false
    }
}

pub fn tag_set<I, S>(tags: I) -> TagSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tags.into_iter().map(Into::into).collect()
}
