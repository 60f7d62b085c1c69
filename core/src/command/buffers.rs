//! Commands that open, close and navigate buffers

use super::selected_thread;
use crate::buffer::{Buffer, BufferKind, BufferListBuffer, SearchBuffer, TagListBuffer, ThreadBuffer};
use crate::error::{NotchError, OptionExt, Result};
use crate::registry::BufferId;
use crate::session::Session;
use crate::store::{tag_set, TagSet, ThreadId};
use regex::Regex;

pub(super) fn search(session: &mut Session, query: String, force_new: bool) -> Result<()> {
    if query.trim().is_empty() {
        return Err(NotchError::validation("search needs a query"));
    }
    if !force_new {
        let existing = session.buffers.find(BufferKind::Search, |b| {
            matches!(b, Buffer::Search(s) if s.query == query)
        });
        if let Some(id) = existing {
            log::debug!("reusing search buffer {} for {}", id, query);
            session.buffers.focus(id);
            return Ok(());
        }
    }
    session.open_buffer(Buffer::Search(SearchBuffer::new(query)))?;
    Ok(())
}

pub(super) fn open_thread(session: &mut Session, thread: Option<ThreadId>) -> Result<()> {
    let thread = match thread {
        Some(thread) => thread,
        None => selected_thread(session)?,
    };
    let summary = session
        .store
        .thread(&thread)?
        .ok_or_invalid(format!("no such thread: {}", thread))?;
    log::info!("open thread view for {}", thread);
    let id = session.open_buffer(Buffer::SingleThread(ThreadBuffer::new(thread.clone())))?;

    if summary.tags.contains("unread") && !session.store.is_read_only() {
        session
            .store
            .mutate_tags(&thread, &TagSet::new(), &tag_set(["unread"]))?;
        session.flush()?;
        let store = &*session.store;
        if let Some(buffer) = session.buffers.get_mut(id) {
            buffer.rebuild(store)?;
        }
    }
    Ok(())
}

/// Buffer selected in the current buffer list
fn selected_listed(session: &Session) -> Result<BufferId> {
    match session.buffers.current() {
        Some(Buffer::BufferList(list)) => session
            .buffers
            .listed(list)
            .get(list.selected)
            .copied()
            .ok_or_invalid("no buffer selected"),
        _ => Err(NotchError::validation("not a buffer list")),
    }
}

pub(super) fn close(session: &mut Session, buffer: Option<BufferId>, focussed: bool) -> Result<()> {
    let target = match (focussed, buffer) {
        (true, _) => selected_listed(session)?,
        (false, Some(id)) => id,
        (false, None) => session
            .buffers
            .current_id()
            .ok_or_invalid("no buffer to close")?,
    };
    session
        .buffers
        .close(target)
        .ok_or_buffer_missing(format!("buffer {}", target))?;
    if session.buffers.is_empty() {
        session.shutdown();
    }
    Ok(())
}

pub(super) fn focus(session: &mut Session, buffer: Option<BufferId>) -> Result<()> {
    let target = match buffer {
        Some(id) => id,
        None => selected_listed(session)?,
    };
    if session.buffers.focus(target) {
        Ok(())
    } else {
        Err(NotchError::BufferNotFound {
            description: format!("buffer {}", target),
        })
    }
}

pub(super) fn buffer_list(session: &mut Session, filter: Option<String>) -> Result<()> {
    let existing = session.buffers.find(BufferKind::BufferList, |_| true);
    match existing {
        Some(id) => {
            session.buffers.focus(id);
            if let Some(Buffer::BufferList(list)) = session.buffers.get_mut(id) {
                list.filter = filter;
                list.selected = 0;
            }
        }
        None => {
            session.open_buffer(Buffer::BufferList(BufferListBuffer::new(filter)))?;
        }
    }
    Ok(())
}

pub(super) fn tag_list(session: &mut Session, filter: Option<Regex>) -> Result<()> {
    session.open_buffer(Buffer::TagList(TagListBuffer::new(filter)))?;
    Ok(())
}

fn current_search(session: &mut Session) -> Result<&mut SearchBuffer> {
    match session.buffers.current_mut() {
        Some(Buffer::Search(search)) => Ok(search),
        _ => Err(NotchError::validation("not a search buffer")),
    }
}

pub(super) fn refine(session: &mut Session, query: String) -> Result<()> {
    let store = &*session.store;
    let search = match session.buffers.current_mut() {
        Some(Buffer::Search(search)) => search,
        _ => return Err(NotchError::validation("not a search buffer")),
    };
    if search.query == query {
        return Ok(());
    }
    let previous = std::mem::replace(&mut search.query, query);
    if let Err(e) = search.rebuild(store) {
        search.query = previous;
        return Err(e);
    }
    Ok(())
}

pub(super) fn refine_prompt(session: &mut Session) -> Result<()> {
    let start = format!("refine {}", current_search(session)?.query);
    session.command_prompt(&start)
}

pub(super) fn help(session: &mut Session, name: &str) -> Result<()> {
    let text = super::help_text(name).ok_or_else(|| NotchError::UnknownCommand {
        name: name.to_string(),
    })?;
    session.notify(format!("{}: {}", name, text));
    Ok(())
}

pub(super) fn logs(session: &mut Session, count: usize) -> Result<()> {
    let mut lines = crate::logger::recent(count);
    if lines.is_empty() {
        session.notify("no log records");
        return Ok(());
    }
    lines.reverse();
    session.notify(lines.join("\n"));
    Ok(())
}
