//! Key bindings
//!
//! Keys are named the way they are written in the `[bindings]` config
//! section: printable characters as themselves, everything else by name
//! (`enter`, `tab`, `shift tab`, `up`, ...), with a `ctrl ` prefix for
//! control chords.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use notch_core::BufferKind;
use std::collections::{BTreeMap, HashMap};

/// What a key does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Apply a command line
    Command(String),
    /// Move the cursor of the current buffer
    Move(isize),
    /// Search for the tag under the cursor of a tag list
    SelectTag,
}

const GLOBAL: &[(&str, &str)] = &[
    (":", "prompt"),
    ("q", "exit"),
    ("x", "bclose"),
    ("tab", "bnext"),
    ("shift tab", "bprevious"),
    (";", "bufferlist"),
    ("T", "taglist"),
    ("@", "refresh"),
    ("m", "compose"),
    ("/", "prompt search "),
    ("$", "flush"),
];

const SEARCH: &[(&str, &str)] = &[
    ("enter", "openthread"),
    ("a", "toggletag inbox"),
    ("&", "toggletag killed"),
    ("s", "toggletag unread"),
    ("l", "retagprompt"),
    ("|", "refineprompt"),
];

const THREAD: &[(&str, &str)] = &[
    ("a", "toggletag inbox"),
    ("s", "toggletag unread"),
    ("l", "retagprompt"),
];

const BUFFER_LIST: &[(&str, &str)] = &[("enter", "bfocus"), ("d", "bclose --focussed")];

const ENVELOPE: &[(&str, &str)] = &[("y", "send"), ("e", "reedit")];

fn commands(table: &[(&str, &str)]) -> HashMap<String, Action> {
    table
        .iter()
        .map(|(key, line)| (key.to_string(), Action::Command(line.to_string())))
        .collect()
}

pub struct Keymap {
    global: HashMap<String, Action>,
    modes: HashMap<BufferKind, HashMap<String, Action>>,
    overrides: HashMap<String, Action>,
}

impl Keymap {
    /// Default bindings with `bindings` (key -> command line) on top
    pub fn new(bindings: &BTreeMap<String, String>) -> Self {
        let mut global = commands(GLOBAL);
        for key in ["j", "down"] {
            global.insert(key.to_string(), Action::Move(1));
        }
        for key in ["k", "up"] {
            global.insert(key.to_string(), Action::Move(-1));
        }
        global.insert("page down".to_string(), Action::Move(10));
        global.insert("page up".to_string(), Action::Move(-10));

        let mut tag_list = HashMap::new();
        tag_list.insert("enter".to_string(), Action::SelectTag);

        let mut modes = HashMap::new();
        modes.insert(BufferKind::Search, commands(SEARCH));
        modes.insert(BufferKind::SingleThread, commands(THREAD));
        modes.insert(BufferKind::BufferList, commands(BUFFER_LIST));
        modes.insert(BufferKind::TagList, tag_list);
        modes.insert(BufferKind::Envelope, commands(ENVELOPE));

        let overrides = bindings
            .iter()
            .map(|(key, line)| (key.trim().to_string(), Action::Command(line.clone())))
            .collect();

        Self {
            global,
            modes,
            overrides,
        }
    }

    /// Configured bindings win, then the current buffer's mode, then globals
    pub fn lookup(&self, mode: Option<BufferKind>, key: &str) -> Option<&Action> {
        self.overrides
            .get(key)
            .or_else(|| mode.and_then(|m| self.modes.get(&m)).and_then(|map| map.get(key)))
            .or_else(|| self.global.get(key))
    }
}

/// Name of a key press as used in bindings; `None` for keys we never bind
pub fn key_name(key: &KeyEvent) -> Option<String> {
    let name = match key.code {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "enter".to_string(),
        KeyCode::Tab => "tab".to_string(),
        KeyCode::BackTab => "shift tab".to_string(),
        KeyCode::Esc => "esc".to_string(),
        KeyCode::Backspace => "backspace".to_string(),
        KeyCode::Delete => "delete".to_string(),
        KeyCode::Up => "up".to_string(),
        KeyCode::Down => "down".to_string(),
        KeyCode::Left => "left".to_string(),
        KeyCode::Right => "right".to_string(),
        KeyCode::Home => "home".to_string(),
        KeyCode::End => "end".to_string(),
        KeyCode::PageUp => "page up".to_string(),
        KeyCode::PageDown => "page down".to_string(),
        KeyCode::F(n) => format!("f{}", n),
        _ => return None,
    };
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        Some(format!("ctrl {}", name))
    } else if key.modifiers.contains(KeyModifiers::ALT) {
        Some(format!("meta {}", name))
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_key_names() {
        assert_eq!(key_name(&key(KeyCode::Char('T'), KeyModifiers::SHIFT)).unwrap(), "T");
        assert_eq!(
            key_name(&key(KeyCode::Char('r'), KeyModifiers::CONTROL)).unwrap(),
            "ctrl r"
        );
        assert_eq!(key_name(&key(KeyCode::BackTab, KeyModifiers::SHIFT)).unwrap(), "shift tab");
        assert_eq!(key_name(&key(KeyCode::F(5), KeyModifiers::NONE)).unwrap(), "f5");
        assert!(key_name(&key(KeyCode::Null, KeyModifiers::NONE)).is_none());
    }

    #[test]
    fn test_mode_bindings_shadow_globals() {
        let keymap = Keymap::new(&BTreeMap::new());
        assert_eq!(
            keymap.lookup(Some(BufferKind::Search), "enter"),
            Some(&Action::Command("openthread".to_string()))
        );
        assert_eq!(
            keymap.lookup(Some(BufferKind::BufferList), "enter"),
            Some(&Action::Command("bfocus".to_string()))
        );
        assert_eq!(
            keymap.lookup(Some(BufferKind::TagList), "enter"),
            Some(&Action::SelectTag)
        );
        assert_eq!(
            keymap.lookup(Some(BufferKind::Envelope), "q"),
            Some(&Action::Command("exit".to_string()))
        );
        assert_eq!(keymap.lookup(None, "j"), Some(&Action::Move(1)));
        assert!(keymap.lookup(Some(BufferKind::Envelope), "enter").is_none());
    }

    #[test]
    fn test_configured_bindings_override() {
        let mut bindings = BTreeMap::new();
        bindings.insert("a".to_string(), "toggletag archived".to_string());
        bindings.insert("ctrl r".to_string(), "refresh".to_string());
        let keymap = Keymap::new(&bindings);
        assert_eq!(
            keymap.lookup(Some(BufferKind::Search), "a"),
            Some(&Action::Command("toggletag archived".to_string()))
        );
        assert_eq!(
            keymap.lookup(None, "ctrl r"),
            Some(&Action::Command("refresh".to_string()))
        );
    }
}
