//! Tag mutation and view reconciliation
//!
//! Every change goes mutate → flush → reconcile. A read-only store fails
//! the mutate step and nothing after it runs.

use super::parse::split_tags;
use super::selected_thread;
use crate::buffer::Buffer;
use crate::error::{OptionExt, Result};
use crate::render::TagCompleter;
use crate::session::Session;
use crate::store::{tag_set, TagSet, ThreadId, ThreadSummary};

fn target(session: &Session, thread: Option<ThreadId>) -> Result<(ThreadId, ThreadSummary)> {
    let thread = match thread {
        Some(thread) => thread,
        None => selected_thread(session)?,
    };
    let summary = session
        .store
        .thread(&thread)?
        .ok_or_invalid(format!("no such thread: {}", thread))?;
    Ok((thread, summary))
}

pub(super) fn toggle(session: &mut Session, tag: String, thread: Option<ThreadId>) -> Result<()> {
    let (thread, summary) = target(session, thread)?;
    let (add, remove) = if summary.tags.contains(&tag) {
        (TagSet::new(), tag_set([tag]))
    } else {
        (tag_set([tag]), TagSet::new())
    };
    change_tags(session, &thread, &add, &remove)
}

/// Make `tags` the exact tag set of every message in the thread
pub(super) fn retag(session: &mut Session, tags: Vec<String>, thread: Option<ThreadId>) -> Result<()> {
    let (thread, summary) = target(session, thread)?;
    let wanted: TagSet = tags.into_iter().collect();
    let remove: TagSet = summary.tags.difference(&wanted).cloned().collect();
    log::info!("retag {}: {:?}", thread, wanted);
    change_tags(session, &thread, &wanted, &remove)
}

pub(super) fn retag_prompt(session: &mut Session) -> Result<()> {
    let (thread, summary) = target(session, None)?;
    let initial = summary.tags.iter().cloned().collect::<Vec<_>>().join(",");
    let completer = TagCompleter::new(session.store.list_all_tags()?);
    let Some(answer) = session.prompt("retag:", &initial, Some(&completer))? else {
        return Ok(());
    };
    retag(session, split_tags(&answer), Some(thread))
}

fn change_tags(session: &mut Session, thread: &ThreadId, add: &TagSet, remove: &TagSet) -> Result<()> {
    session.store.mutate_tags(thread, add, remove)?;
    session.flush()?;
    reconcile(session, thread)
}

/// Bring the current buffer in line with the thread's new tags.
///
/// A search row is rebuilt in place and dropped once the thread stops
/// matching the buffer's query. Threads that start matching are not added.
fn reconcile(session: &mut Session, thread: &ThreadId) -> Result<()> {
    let store = &*session.store;
    match session.buffers.current_mut() {
        Some(Buffer::Search(search)) => {
            search.rebuild_line(thread, store)?;
            let still_matching = format!("({}) AND thread:{}", search.query, thread);
            if store.count(&still_matching)? == 0 {
                log::debug!("remove {} from search {}", thread, search.query);
                search.remove_line(thread);
            }
        }
        Some(Buffer::SingleThread(view)) if &view.thread == thread => view.rebuild(store)?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::buffer::Buffer;
    use crate::error::NotchError;
    use crate::store::tag_set;
    use crate::testing::TestSession;

    fn inbox_rows(t: &TestSession) -> Vec<String> {
        match t.session.buffers().current() {
            Some(Buffer::Search(search)) => search
                .lines
                .iter()
                .map(|line| line.id.as_str().to_string())
                .collect(),
            other => panic!("unexpected buffer {:?}", other),
        }
    }

    #[test]
    fn test_toggle_twice_restores_tags() {
        let mut t = TestSession::new();
        t.apply("search tag:inbox");
        t.select_thread("t2");
        let before = t.thread_tags("t2");
        t.apply("toggletag todo");
        assert!(t.thread_tags("t2").contains("todo"));
        t.apply("toggletag todo");
        assert_eq!(t.thread_tags("t2"), before);
        assert!(t.session.notifications().is_empty());
    }

    #[test]
    fn test_toggle_off_query_tag_removes_row() {
        let mut t = TestSession::new();
        t.apply("search tag:inbox");
        t.select_thread("t1");
        t.apply("toggletag inbox");
        assert_eq!(inbox_rows(&t), vec!["t2"]);
        match t.session.buffers().current() {
            Some(Buffer::Search(search)) => assert_eq!(search.result_count, 1),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_retag_sets_exact_tags() {
        let mut t = TestSession::new();
        t.apply("search tag:inbox");
        t.select_thread("t1");
        t.apply("retag inbox,todo");
        assert_eq!(t.thread_tags("t1"), tag_set(["inbox", "todo"]));
        assert_eq!(inbox_rows(&t), vec!["t1", "t2"]);
    }

    #[test]
    fn test_retag_prompt_prefills_current_tags() {
        let mut t = TestSession::new();
        t.apply("search tag:inbox");
        t.select_thread("t1");
        t.renderer.answer(Some("inbox,important"));
        t.apply("retagprompt");
        let prompts = t.renderer.prompts();
        assert_eq!(prompts[0], ("retag:".to_string(), "inbox,unread".to_string()));
        assert_eq!(t.thread_tags("t1"), tag_set(["important", "inbox"]));
    }

    #[test]
    fn test_cancelled_retag_prompt_changes_nothing() {
        let mut t = TestSession::new();
        t.apply("search tag:inbox");
        t.select_thread("t1");
        t.renderer.answer(None);
        t.apply("retagprompt");
        assert_eq!(t.thread_tags("t1"), tag_set(["inbox", "unread"]));
        assert_eq!(t.commits(), 0);
    }

    #[test]
    fn test_toggle_without_selection_is_validation_error() {
        let mut t = TestSession::new();
        t.apply("bufferlist");
        let err = t.session.run_command(crate::command::parse("toggletag x").unwrap());
        assert!(matches!(err, Err(NotchError::Validation { .. })));
        assert_eq!(t.thread_tags("t1"), tag_set(["inbox", "unread"]));
    }
}
