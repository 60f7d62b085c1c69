//! Buffer registry and focus model
//!
//! Buffers are kept in insertion order, which is also the cycling order.
//! Focus is a [`BufferId`], never a copy of the buffer. Whenever the
//! registry is non-empty, `current` names a live member.

use crate::buffer::{Buffer, BufferKind, BufferListBuffer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct BufferRegistry {
    buffers: Vec<(BufferId, Buffer)>,
    current: Option<BufferId>,
    /// One-level back-pointer used when the current buffer closes
    previous: Option<BufferId>,
    next_id: u64,
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn contains(&self, id: BufferId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BufferId, &Buffer)> {
        self.buffers.iter().map(|(id, b)| (*id, b))
    }

    pub fn get(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.iter().find(|(i, _)| *i == id).map(|(_, b)| b)
    }

    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut Buffer> {
        self.buffers
            .iter_mut()
            .find(|(i, _)| *i == id)
            .map(|(_, b)| b)
    }

    pub fn current_id(&self) -> Option<BufferId> {
        self.current
    }

    pub fn current(&self) -> Option<&Buffer> {
        self.current.and_then(|id| self.get(id))
    }

    pub fn current_mut(&mut self) -> Option<&mut Buffer> {
        let id = self.current?;
        self.get_mut(id)
    }

    fn index_of(&self, id: BufferId) -> Option<usize> {
        self.buffers.iter().position(|(i, _)| *i == id)
    }

    /// Append a buffer and focus it
    pub fn open(&mut self, buffer: Buffer) -> BufferId {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        log::debug!("open {} buffer {}", buffer.kind(), id);
        self.buffers.push((id, buffer));
        self.previous = self.current;
        self.current = Some(id);
        id
    }

    /// Remove a buffer; closing the focused one re-focuses the previous
    /// buffer if it is still open, else the nearest remaining neighbour.
    pub fn close(&mut self, id: BufferId) -> Option<Buffer> {
        let idx = self.index_of(id)?;
        let (_, buffer) = self.buffers.remove(idx);
        log::debug!("close {} buffer {}", buffer.kind(), id);

        if self.previous == Some(id) {
            self.previous = None;
        }
        if self.current == Some(id) {
            self.current = match self.previous.take() {
                Some(prev) if self.contains(prev) => Some(prev),
                _ if self.buffers.is_empty() => None,
                _ => Some(self.buffers[idx.saturating_sub(1).min(self.buffers.len() - 1)].0),
            };
        }
        Some(buffer)
    }

    /// Focus an existing buffer; returns false (and changes nothing) if absent
    pub fn focus(&mut self, id: BufferId) -> bool {
        if !self.contains(id) {
            return false;
        }
        if self.current != Some(id) {
            self.previous = self.current;
            self.current = Some(id);
        }
        true
    }

    /// Focus the buffer `offset` places away from the current one, wrapping
    pub fn focus_by_offset(&mut self, offset: isize) {
        let n = self.buffers.len();
        if n <= 1 {
            return;
        }
        let Some(idx) = self.current.and_then(|id| self.index_of(id)) else {
            return;
        };
        let target = (idx as isize + offset).rem_euclid(n as isize) as usize;
        let id = self.buffers[target].0;
        self.focus(id);
    }

    /// Last buffer of `kind` satisfying `predicate`
    pub fn find<F>(&self, kind: BufferKind, predicate: F) -> Option<BufferId>
    where
        F: Fn(&Buffer) -> bool,
    {
        self.buffers
            .iter()
            .rev()
            .find(|(_, b)| b.kind() == kind && predicate(b))
            .map(|(id, _)| *id)
    }

    /// Rows of a buffer list, in registry order
    pub fn listed(&self, list: &BufferListBuffer) -> Vec<BufferId> {
        self.buffers
            .iter()
            .filter(|(_, b)| list.accepts(b.kind()))
            .map(|(id, _)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{EnvelopeBuffer, SearchBuffer};

    fn search(query: &str) -> Buffer {
        Buffer::Search(SearchBuffer::new(query))
    }

    #[test]
    fn test_open_focuses_new_buffer() {
        let mut registry = BufferRegistry::new();
        let a = registry.open(search("a"));
        assert_eq!(registry.current_id(), Some(a));
        let b = registry.open(search("b"));
        assert_eq!(registry.current_id(), Some(b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_close_current_returns_to_previous() {
        let mut registry = BufferRegistry::new();
        let a = registry.open(search("a"));
        let b = registry.open(search("b"));
        let c = registry.open(search("c"));
        registry.focus(a);
        registry.close(a);
        assert_eq!(registry.current_id(), Some(c));
        registry.close(c);
        // back-pointer is gone, nearest neighbour takes over
        assert_eq!(registry.current_id(), Some(b));
        registry.close(b);
        assert_eq!(registry.current_id(), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_close_other_keeps_focus() {
        let mut registry = BufferRegistry::new();
        let a = registry.open(search("a"));
        let b = registry.open(search("b"));
        registry.close(a);
        assert_eq!(registry.current_id(), Some(b));
        assert!(registry.close(a).is_none());
    }

    #[test]
    fn test_focus_absent_is_noop() {
        let mut registry = BufferRegistry::new();
        let a = registry.open(search("a"));
        registry.close(a);
        let b = registry.open(search("b"));
        assert!(!registry.focus(a));
        assert_eq!(registry.current_id(), Some(b));
    }

    #[test]
    fn test_focus_by_offset_wraps() {
        let mut registry = BufferRegistry::new();
        let a = registry.open(search("a"));
        let b = registry.open(search("b"));
        let c = registry.open(search("c"));
        registry.focus_by_offset(1);
        assert_eq!(registry.current_id(), Some(a));
        registry.focus_by_offset(-1);
        assert_eq!(registry.current_id(), Some(c));
        registry.focus_by_offset(-4);
        assert_eq!(registry.current_id(), Some(b));
        registry.focus_by_offset(3);
        assert_eq!(registry.current_id(), Some(b));
    }

    #[test]
    fn test_focus_by_offset_small_registries() {
        let mut registry = BufferRegistry::new();
        registry.focus_by_offset(1);
        assert_eq!(registry.current_id(), None);
        let a = registry.open(search("a"));
        registry.focus_by_offset(7);
        registry.focus_by_offset(-3);
        assert_eq!(registry.current_id(), Some(a));
    }

    #[test]
    fn test_find_by_kind_and_predicate() {
        let mut registry = BufferRegistry::new();
        let first = registry.open(search("tag:inbox"));
        registry.open(Buffer::Envelope(EnvelopeBuffer::default()));
        let second = registry.open(search("tag:inbox"));
        let found = registry.find(BufferKind::Search, |b| {
            matches!(b, Buffer::Search(s) if s.query == "tag:inbox")
        });
        assert_eq!(found, Some(second));
        registry.close(second);
        let found = registry.find(BufferKind::Search, |_| true);
        assert_eq!(found, Some(first));
        assert!(registry.find(BufferKind::TagList, |_| true).is_none());
    }

    #[test]
    fn test_listed_applies_kind_filter() {
        let mut registry = BufferRegistry::new();
        let a = registry.open(search("a"));
        registry.open(Buffer::Envelope(EnvelopeBuffer::default()));
        let list = registry.open(Buffer::BufferList(BufferListBuffer::new(None)));
        assert_eq!(registry.listed(&BufferListBuffer::new(None)).len(), 3);
        let only_search = BufferListBuffer::new(Some("search".to_string()));
        assert_eq!(registry.listed(&only_search), vec![a]);
        let only_lists = BufferListBuffer::new(Some("list".to_string()));
        assert_eq!(registry.listed(&only_lists), vec![list]);
    }

    #[test]
    fn test_random_operations_keep_focus_valid() {
        // deterministic pseudo-random walk over open/close/focus_by_offset
        let mut registry = BufferRegistry::new();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..2000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            match seed % 4 {
                0 | 1 => {
                    registry.open(search("q"));
                }
                2 => {
                    let ids: Vec<BufferId> = registry.iter().map(|(id, _)| id).collect();
                    if !ids.is_empty() {
                        let victim = ids[(seed as usize / 4) % ids.len()];
                        registry.close(victim);
                    }
                }
                _ => registry.focus_by_offset((seed % 11) as isize - 5),
            }
            match registry.current_id() {
                Some(id) => assert!(registry.contains(id)),
                None => assert!(registry.is_empty()),
            }
        }
    }
}
