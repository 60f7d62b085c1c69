//! Buffers: the stacked views of the UI
//!
//! The variant set is closed, so buffers are a sum type rather than a trait
//! object. Every variant keeps only view-local state and the handles it was
//! opened for; thread data is re-read from the store on `rebuild`.

use crate::error::Result;
use crate::mail::Mail;
use crate::store::{MessageSummary, Store, TagSet, ThreadId, ThreadSummary};
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Search,
    SingleThread,
    Envelope,
    BufferList,
    TagList,
}

impl BufferKind {
    pub fn name(&self) -> &'static str {
        match self {
            BufferKind::Search => "search",
            BufferKind::SingleThread => "thread",
            BufferKind::Envelope => "envelope",
            BufferKind::BufferList => "bufferlist",
            BufferKind::TagList => "taglist",
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub enum Buffer {
    Search(SearchBuffer),
    SingleThread(ThreadBuffer),
    Envelope(EnvelopeBuffer),
    BufferList(BufferListBuffer),
    TagList(TagListBuffer),
}

impl Buffer {
    pub fn kind(&self) -> BufferKind {
        match self {
            Buffer::Search(_) => BufferKind::Search,
            Buffer::SingleThread(_) => BufferKind::SingleThread,
            Buffer::Envelope(_) => BufferKind::Envelope,
            Buffer::BufferList(_) => BufferKind::BufferList,
            Buffer::TagList(_) => BufferKind::TagList,
        }
    }

    /// One-line description used by the buffer list and the status bar
    pub fn title(&self) -> String {
        match self {
            Buffer::Search(b) => format!("search for \"{}\" ({})", b.query, b.result_count),
            Buffer::SingleThread(b) => format!("thread \"{}\"", b.subject),
            Buffer::Envelope(b) => format!(
                "envelope to {}",
                b.mail.get("To").filter(|to| !to.is_empty()).unwrap_or("(nobody)")
            ),
            Buffer::BufferList(_) => "buffer list".to_string(),
            Buffer::TagList(b) => format!("tag list ({} tags)", b.tags.len()),
        }
    }

    pub fn rebuild(&mut self, store: &dyn Store) -> Result<()> {
        match self {
            Buffer::Search(b) => b.rebuild(store),
            Buffer::SingleThread(b) => b.rebuild(store),
            Buffer::TagList(b) => b.rebuild(store),
            Buffer::Envelope(_) | Buffer::BufferList(_) => Ok(()),
        }
    }

    pub fn selected_thread(&self) -> Option<ThreadId> {
        match self {
            Buffer::Search(b) => b.selected_line().map(|line| line.id.clone()),
            Buffer::SingleThread(b) => Some(b.thread.clone()),
            _ => None,
        }
    }

    pub fn selected(&self) -> usize {
        match self {
            Buffer::Search(b) => b.selected,
            Buffer::SingleThread(b) => b.selected,
            Buffer::BufferList(b) => b.selected,
            Buffer::TagList(b) => b.selected,
            Buffer::Envelope(_) => 0,
        }
    }

    /// Move the cursor by `delta` rows, clamped to `len` rows
    pub fn move_selection(&mut self, delta: isize, len: usize) {
        let slot = match self {
            Buffer::Search(b) => &mut b.selected,
            Buffer::SingleThread(b) => &mut b.selected,
            Buffer::BufferList(b) => &mut b.selected,
            Buffer::TagList(b) => &mut b.selected,
            Buffer::Envelope(_) => return,
        };
        *slot = clamp_offset(*slot, delta, len);
    }

    /// Rows the buffer shows, for buffers that own their rows
    pub fn row_count(&self) -> Option<usize> {
        match self {
            Buffer::Search(b) => Some(b.lines.len()),
            Buffer::SingleThread(b) => Some(b.messages.len()),
            Buffer::TagList(b) => Some(b.tags.len()),
            Buffer::Envelope(_) | Buffer::BufferList(_) => None,
        }
    }
}

fn clamp_offset(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let target = current as isize + delta;
    target.clamp(0, len as isize - 1) as usize
}

#[derive(Debug, Clone)]
pub struct SearchBuffer {
    pub query: String,
    pub lines: Vec<ThreadSummary>,
    /// Messages matching the query, as last displayed
    pub result_count: usize,
    pub selected: usize,
}

impl SearchBuffer {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            lines: Vec::new(),
            result_count: 0,
            selected: 0,
        }
    }

    pub fn rebuild(&mut self, store: &dyn Store) -> Result<()> {
        self.lines = store.query(&self.query)?;
        self.result_count = store.count(&self.query)?;
        self.selected = clamp_offset(self.selected, 0, self.lines.len());
        Ok(())
    }

    pub fn selected_line(&self) -> Option<&ThreadSummary> {
        self.lines.get(self.selected)
    }

    pub fn line_index(&self, id: &ThreadId) -> Option<usize> {
        self.lines.iter().position(|line| &line.id == id)
    }

    /// Re-read a single row in place
    pub fn rebuild_line(&mut self, id: &ThreadId, store: &dyn Store) -> Result<()> {
        if let Some(idx) = self.line_index(id) {
            if let Some(fresh) = store.thread(id)? {
                self.lines[idx] = fresh;
            }
        }
        Ok(())
    }

    /// Drop a row and subtract its messages from the displayed count
    pub fn remove_line(&mut self, id: &ThreadId) -> Option<ThreadSummary> {
        let idx = self.line_index(id)?;
        let line = self.lines.remove(idx);
        self.result_count = self.result_count.saturating_sub(line.total_messages);
        self.selected = clamp_offset(self.selected, 0, self.lines.len());
        Some(line)
    }
}

#[derive(Debug, Clone)]
pub struct ThreadBuffer {
    pub thread: ThreadId,
    pub subject: String,
    pub tags: TagSet,
    pub messages: Vec<MessageSummary>,
    pub selected: usize,
}

impl ThreadBuffer {
    pub fn new(thread: ThreadId) -> Self {
        Self {
            thread,
            subject: String::new(),
            tags: TagSet::new(),
            messages: Vec::new(),
            selected: 0,
        }
    }

    pub fn rebuild(&mut self, store: &dyn Store) -> Result<()> {
        if let Some(summary) = store.thread(&self.thread)? {
            self.subject = summary.subject;
            self.tags = summary.tags;
        }
        self.messages = store.messages(&self.thread)?;
        self.selected = clamp_offset(self.selected, 0, self.messages.len());
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvelopeBuffer {
    pub mail: Mail,
}

impl EnvelopeBuffer {
    pub fn new(mail: Mail) -> Self {
        Self { mail }
    }
}

/// Lists the registry itself; rows are read from the registry at draw time
#[derive(Debug, Clone, Default)]
pub struct BufferListBuffer {
    /// Only list buffers whose kind name contains this text
    pub filter: Option<String>,
    pub selected: usize,
}

impl BufferListBuffer {
    pub fn new(filter: Option<String>) -> Self {
        Self {
            filter,
            selected: 0,
        }
    }

    pub fn accepts(&self, kind: BufferKind) -> bool {
        self.filter
            .as_deref()
            .map_or(true, |f| kind.name().contains(f))
    }
}

#[derive(Debug, Clone)]
pub struct TagListBuffer {
    pub filter: Option<Regex>,
    pub tags: Vec<String>,
    pub selected: usize,
}

impl TagListBuffer {
    pub fn new(filter: Option<Regex>) -> Self {
        Self {
            filter,
            tags: Vec::new(),
            selected: 0,
        }
    }

    pub fn rebuild(&mut self, store: &dyn Store) -> Result<()> {
        self.tags = store
            .list_all_tags()?
            .into_iter()
            .filter(|tag| self.filter.as_ref().map_or(true, |re| re.is_match(tag)))
            .collect();
        self.selected = clamp_offset(self.selected, 0, self.tags.len());
        Ok(())
    }

    pub fn selected_tag(&self) -> Option<&str> {
        self.tags.get(self.selected).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::IndexFile;
    use crate::store::MemoryStore;

    fn store() -> MemoryStore {
        let index: IndexFile = serde_yml::from_str(
            r#"
threads:
  - id: a
    subject: first
    messages:
      - { id: m1, from: x@example.org, tags: [inbox, unread] }
      - { id: m2, from: y@example.org, tags: [inbox] }
  - id: b
    subject: second
    messages:
      - { id: m3, from: z@example.org, tags: [inbox] }
"#,
        )
        .unwrap();
        MemoryStore::new(index)
    }

    #[test]
    fn test_search_rebuild_and_remove_line() {
        let store = store();
        let mut search = SearchBuffer::new("tag:inbox");
        search.rebuild(&store).unwrap();
        assert_eq!(search.lines.len(), 2);
        assert_eq!(search.result_count, 3);

        search.selected = 1;
        let removed = search.remove_line(&ThreadId::new("a")).unwrap();
        assert_eq!(removed.total_messages, 2);
        assert_eq!(search.result_count, 1);
        assert_eq!(search.selected, 0);
        assert!(search.remove_line(&ThreadId::new("a")).is_none());
    }

    #[test]
    fn test_thread_buffer_reads_tags_from_store() {
        let store = store();
        let mut thread = ThreadBuffer::new(ThreadId::new("a"));
        thread.rebuild(&store).unwrap();
        assert_eq!(thread.subject, "first");
        assert!(thread.tags.contains("unread"));
        assert_eq!(thread.messages.len(), 2);
    }

    #[test]
    fn test_taglist_filter() {
        let store = store();
        let mut list = TagListBuffer::new(Some(Regex::new("^un").unwrap()));
        list.rebuild(&store).unwrap();
        assert_eq!(list.tags, vec!["unread"]);
    }

    #[test]
    fn test_move_selection_clamps() {
        let mut buffer = Buffer::Search(SearchBuffer::new("*"));
        buffer.move_selection(5, 3);
        assert_eq!(buffer.selected(), 2);
        buffer.move_selection(-10, 3);
        assert_eq!(buffer.selected(), 0);
        buffer.move_selection(1, 0);
        assert_eq!(buffer.selected(), 0);
    }
}
