//! Command line parsing
//!
//! `name [--flag ...] [argument text]`. Everything is validated here so a
//! malformed line fails before any command runs.

use super::{Command, CommandKind};
use crate::error::{NotchError, OptionExt, Result};
use crate::process::ExternalCommand;
use crate::store::ThreadId;
use regex::Regex;
use std::path::PathBuf;

const DEFAULT_LOG_COUNT: usize = 10;

/// Leading `--flags` of an argument string plus the remaining text
struct Args<'a> {
    flags: Vec<&'a str>,
    rest: &'a str,
}

impl<'a> Args<'a> {
    fn new(mut text: &'a str) -> Self {
        let mut flags = Vec::new();
        loop {
            text = text.trim_start();
            let Some(stripped) = text.strip_prefix("--") else {
                break;
            };
            let end = stripped.find(char::is_whitespace).unwrap_or(stripped.len());
            flags.push(&stripped[..end]);
            text = &stripped[end..];
        }
        Self { flags, rest: text }
    }

    fn flag(&mut self, name: &str) -> bool {
        let before = self.flags.len();
        self.flags.retain(|f| *f != name);
        self.flags.len() != before
    }

    fn text(&self) -> &'a str {
        self.rest.trim()
    }

    fn optional(&self) -> Option<String> {
        Some(self.text()).filter(|t| !t.is_empty()).map(str::to_string)
    }

    fn required(&self, message: &str) -> Result<String> {
        self.optional().ok_or_invalid(message)
    }

    fn none(&self, command: &str) -> Result<()> {
        if self.text().is_empty() {
            Ok(())
        } else {
            Err(NotchError::validation(format!("{} takes no arguments", command)))
        }
    }

    fn finish(self, command: &str) -> Result<()> {
        match self.flags.first() {
            None => Ok(()),
            Some(flag) => Err(NotchError::validation(format!(
                "unknown option --{} for {}",
                flag, command
            ))),
        }
    }
}

pub fn parse(line: &str) -> Result<Command> {
    let line = line.trim_start();
    let (name, raw) = match line.split_once(char::is_whitespace) {
        Some((name, raw)) => (name, raw),
        None => (line.trim_end(), ""),
    };
    if name.is_empty() {
        return Err(NotchError::validation("empty command line"));
    }

    // prompt keeps its start text verbatim, trailing spaces included
    if name == "prompt" {
        return Ok(Command::new(CommandKind::Prompt {
            start: raw.trim_start().to_string(),
        }));
    }

    let mut args = Args::new(raw);
    let kind = match name {
        "exit" => {
            args.none(name)?;
            CommandKind::Exit
        }
        "search" => {
            let force_new = args.flag("new");
            let query = args.required("search needs a query")?;
            CommandKind::Search { query, force_new }
        }
        "openthread" => CommandKind::OpenThread {
            thread: args.optional().map(ThreadId::new),
        },
        "refresh" => {
            args.none(name)?;
            CommandKind::Refresh
        }
        "shellescape" => {
            let spawn = args.flag("spawn");
            let in_thread = args.flag("thread");
            let command_line = args.required("shellescape needs a command")?;
            CommandKind::External(
                ExternalCommand::new(command_line)
                    .spawn(spawn)
                    .in_thread(in_thread),
            )
        }
        "edit" => {
            let spawn = args.flag("spawn").then_some(true);
            let path = args.required("edit needs a file")?;
            CommandKind::Edit {
                path: PathBuf::from(path),
                spawn,
                refocus: true,
                on_success: None,
                on_failure: None,
            }
        }
        "bclose" => {
            let focussed = args.flag("focussed");
            args.none(name)?;
            CommandKind::BufferClose {
                buffer: None,
                focussed,
            }
        }
        "bnext" => {
            args.none(name)?;
            CommandKind::BufferNext
        }
        "bprevious" => {
            args.none(name)?;
            CommandKind::BufferPrevious
        }
        "bfocus" => {
            args.none(name)?;
            CommandKind::BufferFocus { buffer: None }
        }
        "bufferlist" => CommandKind::BufferList {
            filter: args.optional(),
        },
        "taglist" => {
            let filter = args
                .optional()
                .map(|re| {
                    Regex::new(&re).map_err(|e| {
                        NotchError::validation(format!("invalid tag filter: {}", e))
                    })
                })
                .transpose()?;
            CommandKind::TagList { filter }
        }
        "compose" => CommandKind::Compose {
            headers: parse_headers(args.text())?,
        },
        "flush" => {
            args.none(name)?;
            CommandKind::Flush
        }
        "toggletag" => {
            let tag = args.required("toggletag needs a tag")?;
            if tag.contains(char::is_whitespace) {
                return Err(NotchError::validation("toggletag takes a single tag"));
            }
            CommandKind::ToggleTag { tag, thread: None }
        }
        "retagprompt" => {
            args.none(name)?;
            CommandKind::RetagPrompt
        }
        "retag" => CommandKind::Retag {
            tags: split_tags(args.text()),
            thread: None,
        },
        "refine" => CommandKind::Refine {
            query: args.required("refine needs a query")?,
        },
        "refineprompt" => {
            args.none(name)?;
            CommandKind::RefinePrompt
        }
        "send" => {
            args.none(name)?;
            CommandKind::Send
        }
        "reedit" => {
            args.none(name)?;
            CommandKind::Reedit
        }
        "set" => {
            let text = args.required("set needs a header name")?;
            let (key, value) = match text.split_once(char::is_whitespace) {
                Some((key, value)) => (key.to_string(), value.trim().to_string()),
                None => (text, String::new()),
            };
            CommandKind::Set { key, value }
        }
        "help" => {
            let name = args.required("help needs a command name")?;
            if super::help_text(&name).is_none() {
                return Err(NotchError::UnknownCommand { name });
            }
            CommandKind::Help { name }
        }
        "logs" => {
            let count = match args.optional() {
                Some(n) => n
                    .parse()
                    .map_err(|_| NotchError::validation(format!("not a number: {}", n)))?,
                None => DEFAULT_LOG_COUNT,
            };
            CommandKind::Logs { count }
        }
        _ => {
            return Err(NotchError::UnknownCommand {
                name: name.to_string(),
            })
        }
    };
    args.finish(name)?;
    Ok(Command::new(kind))
}

/// `Key=Value` words, shell quoted
fn parse_headers(text: &str) -> Result<Vec<(String, String)>> {
    let words = shell_words::split(text)
        .map_err(|e| NotchError::validation(format!("bad header list: {}", e)))?;
    words
        .into_iter()
        .map(|word| match word.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(NotchError::validation(format!(
                "expected Key=Value, got '{}'",
                word
            ))),
        })
        .collect()
}

pub(super) fn split_tags(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(line: &str) -> CommandKind {
        parse(line).unwrap().kind
    }

    #[test]
    fn test_search_with_flag() {
        match kind("search --new tag:inbox AND tag:unread") {
            CommandKind::Search { query, force_new } => {
                assert_eq!(query, "tag:inbox AND tag:unread");
                assert!(force_new);
            }
            other => panic!("unexpected {:?}", other),
        }
        match kind("search  tag:inbox ") {
            CommandKind::Search { query, force_new } => {
                assert_eq!(query, "tag:inbox");
                assert!(!force_new);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(parse("search"), Err(NotchError::Validation { .. })));
        assert!(matches!(parse("   "), Err(NotchError::Validation { .. })));
        assert!(matches!(parse("exit now"), Err(NotchError::Validation { .. })));
        assert!(matches!(parse("search --frob x"), Err(NotchError::Validation { .. })));
        assert!(matches!(parse("taglist (["), Err(NotchError::Validation { .. })));
        assert!(matches!(parse("compose To"), Err(NotchError::Validation { .. })));
        assert!(matches!(parse("logs many"), Err(NotchError::Validation { .. })));
        assert!(matches!(
            parse("frobnicate"),
            Err(NotchError::UnknownCommand { .. })
        ));
        assert!(matches!(
            parse("help frobnicate"),
            Err(NotchError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn test_prompt_keeps_trailing_space() {
        match kind("prompt search ") {
            CommandKind::Prompt { start } => assert_eq!(start, "search "),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_shellescape_flags() {
        match kind("shellescape --thread --spawn mutt -f 'my box'") {
            CommandKind::External(cmd) => {
                assert_eq!(cmd.command_line, "mutt -f 'my box'");
                assert!(cmd.spawn);
                assert!(cmd.in_thread);
                assert!(cmd.refocus);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_compose_headers() {
        match kind("compose To=you@example.org Subject=\"lunch plans\"") {
            CommandKind::Compose { headers } => assert_eq!(
                headers,
                vec![
                    ("To".to_string(), "you@example.org".to_string()),
                    ("Subject".to_string(), "lunch plans".to_string()),
                ]
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_retag_and_set() {
        match kind("retag inbox, todo,,") {
            CommandKind::Retag { tags, thread } => {
                assert_eq!(tags, vec!["inbox", "todo"]);
                assert!(thread.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
        match kind("retag") {
            CommandKind::Retag { tags, .. } => assert!(tags.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
        match kind("set Subject hello there") {
            CommandKind::Set { key, value } => {
                assert_eq!(key, "Subject");
                assert_eq!(value, "hello there");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_names_round_trip() {
        for line in [
            "exit",
            "refresh",
            "bnext",
            "bprevious",
            "bfocus",
            "bclose --focussed",
            "bufferlist",
            "taglist ^un",
            "flush",
            "toggletag inbox",
            "retagprompt",
            "refine tag:todo",
            "refineprompt",
            "send",
            "reedit",
            "help search",
            "logs 3",
            "edit --spawn /tmp/draft",
            "openthread",
        ] {
            let cmd = parse(line).unwrap();
            assert_eq!(cmd.name(), line.split_whitespace().next().unwrap());
            assert!(!cmd.help().is_empty());
            assert!(!cmd.undoable());
        }
    }
}
