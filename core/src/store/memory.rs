//! In-memory index with optional YAML persistence
//!
//! Mutations apply to the working state immediately; `commit` writes the
//! working state back to the index file. A `<index>.lock` file held by
//! another process makes the commit fail with `Locked`.

use super::query::{self, MessageFields};
use super::{MessageSummary, Store, TagSet, ThreadId, ThreadSummary};
use crate::error::{NotchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexFile {
    #[serde(default)]
    pub threads: Vec<StoredThread>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredThread {
    pub id: ThreadId,
    pub subject: String,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub from: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub tags: TagSet,
}

impl StoredThread {
    fn tags(&self) -> TagSet {
        self.messages
            .iter()
            .flat_map(|m| m.tags.iter().cloned())
            .collect()
    }

    fn summary(&self) -> ThreadSummary {
        let mut authors: Vec<String> = Vec::new();
        for msg in &self.messages {
            let name = display_name(&msg.from);
            if !authors.contains(&name) {
                authors.push(name);
            }
        }
        ThreadSummary {
            id: self.id.clone(),
            subject: self.subject.clone(),
            authors,
            tags: self.tags(),
            total_messages: self.messages.len(),
        }
    }

    fn matching_messages(&self, query: &query::Query) -> usize {
        self.messages
            .iter()
            .filter(|msg| {
                query.matches(&MessageFields {
                    thread: self.id.as_str(),
                    subject: &self.subject,
                    from: &msg.from,
                    tags: &msg.tags,
                })
            })
            .count()
    }
}

fn display_name(from: &str) -> String {
    match from.split_once('<') {
        Some((name, _)) if !name.trim().is_empty() => name.trim().trim_matches('"').to_string(),
        _ => from.trim().trim_matches(|c| c == '<' || c == '>').to_string(),
    }
}

pub struct MemoryStore {
    index: IndexFile,
    path: Option<PathBuf>,
    read_only: bool,
    failing_commits: usize,
    commits: usize,
}

impl MemoryStore {
    pub fn new(index: IndexFile) -> Self {
        Self {
            index,
            path: None,
            read_only: false,
            failing_commits: 0,
            commits: 0,
        }
    }

    /// Open a YAML index file; a missing file starts an empty index there
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let index = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                IndexFile::default()
            } else {
                serde_yml::from_str(&content)?
            }
        } else {
            IndexFile::default()
        };
        log::info!(
            "opened index {} with {} threads",
            path.display(),
            index.threads.len()
        );
        Ok(Self {
            path: Some(path),
            ..Self::new(index)
        })
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Make the next `n` commits fail with `Locked`
    pub fn with_failing_commits(mut self, n: usize) -> Self {
        self.failing_commits = n;
        self
    }

    /// Number of successful commits
    pub fn commits(&self) -> usize {
        self.commits
    }

    fn lock_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn find(&self, id: &ThreadId) -> Option<&StoredThread> {
        self.index.threads.iter().find(|t| &t.id == id)
    }

    fn write_back(&self, path: &Path) -> Result<()> {
        if Self::lock_path(path).exists() {
            return Err(NotchError::Locked);
        }
        let content = serde_yml::to_string(&self.index)?;
        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Store for MemoryStore {
    fn query(&self, query: &str) -> Result<Vec<ThreadSummary>> {
        let parsed = query::parse(query)?;
        Ok(self
            .index
            .threads
            .iter()
            .filter(|t| t.matching_messages(&parsed) > 0)
            .map(StoredThread::summary)
            .collect())
    }

    fn count(&self, query: &str) -> Result<usize> {
        let parsed = query::parse(query)?;
        Ok(self
            .index
            .threads
            .iter()
            .map(|t| t.matching_messages(&parsed))
            .sum())
    }

    fn thread(&self, id: &ThreadId) -> Result<Option<ThreadSummary>> {
        Ok(self.find(id).map(StoredThread::summary))
    }

    fn messages(&self, id: &ThreadId) -> Result<Vec<MessageSummary>> {
        Ok(self
            .find(id)
            .map(|t| {
                t.messages
                    .iter()
                    .map(|m| MessageSummary {
                        id: m.id.clone(),
                        from: m.from.clone(),
                        date: m.date.clone(),
                        tags: m.tags.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn mutate_tags(&mut self, id: &ThreadId, add: &TagSet, remove: &TagSet) -> Result<()> {
        if self.read_only {
            return Err(NotchError::ReadOnly);
        }
        let thread = self
            .index
            .threads
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| NotchError::validation(format!("no such thread: {}", id)))?;
        for msg in &mut thread.messages {
            for tag in remove {
                msg.tags.remove(tag);
            }
            msg.tags.extend(add.iter().cloned());
        }
        log::debug!("thread {}: +{:?} -{:?}", id, add, remove);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.failing_commits > 0 {
            self.failing_commits -= 1;
            return Err(NotchError::Locked);
        }
        if let Some(path) = &self.path {
            if !self.read_only {
                self.write_back(path)?;
            }
        }
        self.commits += 1;
        Ok(())
    }

    fn list_all_tags(&self) -> Result<TagSet> {
        Ok(self.index.threads.iter().flat_map(|t| t.tags()).collect())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
