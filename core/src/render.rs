//! Renderer contract, notifications and prompt completion

use crate::error::Result;
use crate::registry::BufferRegistry;
use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub at: DateTime<Local>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Local::now(),
        }
    }
}

/// Everything a renderer needs for one frame
pub struct View<'a> {
    pub buffers: &'a BufferRegistry,
    pub notifications: &'a [Notification],
}

/// Terminal side of the engine.
///
/// `pause`/`resume` bracket synchronous subprocesses that need the terminal.
/// `prompt` blocks until the user answers; `Ok(None)` means cancelled.
pub trait Renderer {
    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    fn draw(&mut self, view: &View<'_>) -> Result<()>;
    fn prompt(
        &mut self,
        prefix: &str,
        text: &str,
        completer: Option<&dyn Completer>,
    ) -> Result<Option<String>>;
}

/// Completion candidates replace the whole prompt text
pub trait Completer {
    fn complete(&self, text: &str) -> Vec<String>;
}

/// Completes against a fixed list of strings
#[derive(Debug, Clone, Default)]
pub struct StringlistCompleter {
    items: Vec<String>,
}

impl StringlistCompleter {
    pub fn new(items: Vec<String>) -> Self {
        Self { items }
    }
}

impl Completer for StringlistCompleter {
    fn complete(&self, text: &str) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| item.starts_with(text))
            .cloned()
            .collect()
    }
}

/// Completes the first word of a command line against command names
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandCompleter;

impl Completer for CommandCompleter {
    fn complete(&self, text: &str) -> Vec<String> {
        if text.contains(char::is_whitespace) {
            return Vec::new();
        }
        crate::command::COMMAND_NAMES
            .iter()
            .filter(|name| name.starts_with(text))
            .map(|name| name.to_string())
            .collect()
    }
}

/// Completes the last entry of a comma separated tag list
#[derive(Debug, Clone, Default)]
pub struct TagCompleter {
    tags: Vec<String>,
}

impl TagCompleter {
    pub fn new(tags: impl IntoIterator<Item = String>) -> Self {
        Self {
            tags: tags.into_iter().collect(),
        }
    }
}

impl Completer for TagCompleter {
    fn complete(&self, text: &str) -> Vec<String> {
        let (head, last) = match text.rfind(',') {
            Some(idx) => text.split_at(idx + 1),
            None => ("", text),
        };
        self.tags
            .iter()
            .filter(|tag| tag.starts_with(last))
            .map(|tag| format!("{}{}", head, tag))
            .collect()
    }
}
