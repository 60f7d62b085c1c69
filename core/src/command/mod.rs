//! Commands: one user- or program-triggered action each
//!
//! A [`Command`] is built fresh per invocation, either by [`parse`] from a
//! command line or directly by another command. Construction never does
//! I/O. [`Command::apply`] consumes the command, so every instance is
//! applied at most once.

mod buffers;
mod envelope;
mod external;
mod parse;
mod tags;

pub use parse::parse;

use crate::buffer::Buffer;
use crate::error::{OptionExt, Result};
use crate::process::{ExternalCommand, FailureHandler};
use crate::registry::BufferId;
use crate::session::Session;
use crate::store::ThreadId;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;

/// Names accepted by the command line parser
pub const COMMAND_NAMES: &[&str] = &[
    "bclose",
    "bfocus",
    "bnext",
    "bprevious",
    "bufferlist",
    "compose",
    "edit",
    "exit",
    "flush",
    "help",
    "logs",
    "openthread",
    "prompt",
    "reedit",
    "refine",
    "refineprompt",
    "refresh",
    "retag",
    "retagprompt",
    "search",
    "send",
    "set",
    "shellescape",
    "taglist",
    "toggletag",
];

/// What to run once an asynchronous step has succeeded
pub enum Continuation {
    Command(Box<Command>),
    Callback(Box<dyn FnOnce(&mut Session) -> Result<()>>),
}

impl Continuation {
    pub fn command(kind: CommandKind) -> Self {
        Self::Command(Box::new(Command::new(kind)))
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(&mut Session) -> Result<()> + 'static,
    {
        Self::Callback(Box::new(f))
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(cmd) => f.debug_tuple("Command").field(cmd).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Where a re-read draft goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftTarget {
    NewEnvelope,
    /// Replace the mail of this envelope; falls back to a new one if closed
    Envelope(BufferId),
}

#[derive(Debug)]
pub enum CommandKind {
    Exit,
    Search {
        query: String,
        force_new: bool,
    },
    /// Defaults to the thread selected in the current buffer
    OpenThread {
        thread: Option<ThreadId>,
    },
    Prompt {
        start: String,
    },
    Refresh,
    External(ExternalCommand),
    Edit {
        path: PathBuf,
        /// `None` uses `spawn_editor`
        spawn: Option<bool>,
        refocus: bool,
        on_success: Option<Continuation>,
        on_failure: Option<FailureHandler>,
    },
    BufferClose {
        buffer: Option<BufferId>,
        /// Close the buffer selected in the current buffer list
        focussed: bool,
    },
    BufferNext,
    BufferPrevious,
    BufferFocus {
        buffer: Option<BufferId>,
    },
    BufferList {
        filter: Option<String>,
    },
    TagList {
        filter: Option<Regex>,
    },
    Compose {
        headers: Vec<(String, String)>,
    },
    Flush,
    ToggleTag {
        tag: String,
        thread: Option<ThreadId>,
    },
    RetagPrompt,
    Retag {
        tags: Vec<String>,
        thread: Option<ThreadId>,
    },
    Refine {
        query: String,
    },
    RefinePrompt,
    Send,
    Reedit,
    Set {
        key: String,
        value: String,
    },
    Help {
        name: String,
    },
    Logs {
        count: usize,
    },
    /// Read a draft back from its scratch file
    LoadDraft {
        path: PathBuf,
        target: DraftTarget,
    },
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Exit => "exit",
            Self::Search { .. } => "search",
            Self::OpenThread { .. } => "openthread",
            Self::Prompt { .. } => "prompt",
            Self::Refresh => "refresh",
            Self::External(_) => "shellescape",
            Self::Edit { .. } => "edit",
            Self::BufferClose { .. } => "bclose",
            Self::BufferNext => "bnext",
            Self::BufferPrevious => "bprevious",
            Self::BufferFocus { .. } => "bfocus",
            Self::BufferList { .. } => "bufferlist",
            Self::TagList { .. } => "taglist",
            Self::Compose { .. } => "compose",
            Self::Flush => "flush",
            Self::ToggleTag { .. } => "toggletag",
            Self::RetagPrompt => "retagprompt",
            Self::Retag { .. } => "retag",
            Self::Refine { .. } => "refine",
            Self::RefinePrompt => "refineprompt",
            Self::Send => "send",
            Self::Reedit => "reedit",
            Self::Set { .. } => "set",
            Self::Help { .. } => "help",
            Self::Logs { .. } => "logs",
            Self::LoadDraft { .. } => "loaddraft",
        }
    }
}

/// Help text of a command name
pub fn help_text(name: &str) -> Option<&'static str> {
    let text = match name {
        "exit" => "shut down cleanly",
        "search" => "open a search buffer, reusing one with the same query (--new forces a new one)",
        "openthread" => "open the selected thread in a new buffer",
        "prompt" => "open the command prompt",
        "refresh" => "rebuild the current buffer",
        "shellescape" => "run an external command (--spawn: new terminal, --thread: in background)",
        "edit" => "edit a file with the configured editor (--spawn: new terminal)",
        "bclose" => "close the current buffer (--focussed: the one selected in the buffer list)",
        "bnext" => "focus the next buffer",
        "bprevious" => "focus the previous buffer",
        "bfocus" => "focus the buffer selected in the buffer list",
        "bufferlist" => "list open buffers",
        "taglist" => "list all tags, optionally filtered by a regex",
        "compose" => "write a new mail",
        "flush" => "write pending changes to the index, retrying while it is locked",
        "toggletag" => "toggle a tag on the selected thread",
        "retagprompt" => "edit the tags of the selected thread",
        "retag" => "set the tags of the selected thread (comma separated)",
        "refine" => "change the query of the current search buffer",
        "refineprompt" => "edit the query of the current search buffer",
        "send" => "send the mail in the current envelope",
        "reedit" => "edit the mail in the current envelope again",
        "set" => "set a header of the mail in the current envelope",
        "help" => "show help for a command",
        "logs" => "show the latest log records",
        "loaddraft" => "read an edited draft back",
        _ => return None,
    };
    Some(text)
}

/// A command bound to its parameters and optional hooks
#[derive(Debug)]
pub struct Command {
    pub kind: CommandKind,
    /// Shell command run before `apply`; failure aborts the command
    pub prehook: Option<String>,
    /// Shell command run after a successful `apply`
    pub posthook: Option<String>,
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            prehook: None,
            posthook: None,
        }
    }

    pub fn with_prehook(mut self, hook: impl Into<String>) -> Self {
        self.prehook = Some(hook.into());
        self
    }

    pub fn with_posthook(mut self, hook: impl Into<String>) -> Self {
        self.posthook = Some(hook.into());
        self
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn help(&self) -> &'static str {
        help_text(self.name()).unwrap_or_default()
    }

    /// Reserved for an undo stack; no command is undoable yet
    pub fn undoable(&self) -> bool {
        false
    }

    pub fn apply(self, session: &mut Session) -> Result<()> {
        match self.kind {
            CommandKind::Exit => {
                session.shutdown();
                Ok(())
            }
            CommandKind::Search { query, force_new } => buffers::search(session, query, force_new),
            CommandKind::OpenThread { thread } => buffers::open_thread(session, thread),
            CommandKind::Prompt { start } => session.command_prompt(&start),
            CommandKind::Refresh => session.rebuild_current(),
            CommandKind::External(cmd) => session.run_external(cmd),
            CommandKind::Edit {
                path,
                spawn,
                refocus,
                on_success,
                on_failure,
            } => external::edit(session, path, spawn, refocus, on_success, on_failure),
            CommandKind::BufferClose { buffer, focussed } => {
                buffers::close(session, buffer, focussed)
            }
            CommandKind::BufferNext => {
                session.buffers.focus_by_offset(1);
                Ok(())
            }
            CommandKind::BufferPrevious => {
                session.buffers.focus_by_offset(-1);
                Ok(())
            }
            CommandKind::BufferFocus { buffer } => buffers::focus(session, buffer),
            CommandKind::BufferList { filter } => buffers::buffer_list(session, filter),
            CommandKind::TagList { filter } => buffers::tag_list(session, filter),
            CommandKind::Compose { headers } => envelope::compose(session, headers),
            CommandKind::Flush => session.flush(),
            CommandKind::ToggleTag { tag, thread } => tags::toggle(session, tag, thread),
            CommandKind::RetagPrompt => tags::retag_prompt(session),
            CommandKind::Retag { tags: new_tags, thread } => tags::retag(session, new_tags, thread),
            CommandKind::Refine { query } => buffers::refine(session, query),
            CommandKind::RefinePrompt => buffers::refine_prompt(session),
            CommandKind::Send => envelope::send(session),
            CommandKind::Reedit => envelope::reedit(session),
            CommandKind::Set { key, value } => envelope::set_header(session, key, value),
            CommandKind::Help { name } => buffers::help(session, &name),
            CommandKind::Logs { count } => buffers::logs(session, count),
            CommandKind::LoadDraft { path, target } => envelope::load_draft(session, path, target),
        }
    }
}

/// Thread selected in the current buffer
pub(crate) fn selected_thread(session: &Session) -> Result<ThreadId> {
    session
        .buffers
        .current()
        .and_then(Buffer::selected_thread)
        .ok_or_invalid("no thread selected")
}

impl From<CommandKind> for Command {
    fn from(kind: CommandKind) -> Self {
        Self::new(kind)
    }
}
