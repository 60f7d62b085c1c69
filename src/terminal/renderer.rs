//! The terminal implementation of the engine's renderer
//!
//! Prompts read keys synchronously. While a prompt is open, or while the
//! terminal is lent to another program, the input listener is gated off so
//! the two never compete for events.

use super::setup::{self, Tui};
use super::ui::{self, PromptLine, Screen};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use notch_core::render::{Completer, Renderer, View};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared switch telling the input listener whether it may read events
#[derive(Debug, Clone)]
pub struct InputGate(Arc<AtomicBool>);

impl InputGate {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self, open: bool) {
        self.0.store(open, Ordering::SeqCst);
    }
}

pub struct TerminalRenderer {
    terminal: Tui,
    gate: InputGate,
    screen: Screen,
}

impl TerminalRenderer {
    pub fn new(terminal: Tui, gate: InputGate) -> Self {
        Self {
            terminal,
            gate,
            screen: Screen::default(),
        }
    }

    fn paint(&mut self, prompt: Option<&PromptLine>) -> std::io::Result<()> {
        self.terminal
            .draw(|frame| ui::render(frame, &self.screen, prompt))?;
        Ok(())
    }

    fn read_prompt(
        &mut self,
        line: &mut PromptLine,
        completer: Option<&dyn Completer>,
    ) -> std::io::Result<Option<String>> {
        let mut completion: Option<Completion> = None;
        loop {
            self.paint(Some(&*line))?;
            let key = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => key,
                Event::Paste(text) => {
                    completion = None;
                    for c in text.chars().filter(|c| !c.is_control()) {
                        line.insert(c);
                    }
                    continue;
                }
                _ => continue,
            };

            if key.code == KeyCode::Tab {
                if let Some(completer) = completer {
                    let state = completion.get_or_insert_with(|| Completion {
                        candidates: completer.complete(&line.text),
                        original: line.text.clone(),
                        next: 0,
                    });
                    line.replace(state.advance());
                }
                continue;
            }
            completion = None;

            match edit(line, key) {
                PromptStep::Continue => {}
                PromptStep::Accept => return Ok(Some(line.text.clone())),
                PromptStep::Cancel => return Ok(None),
            }
        }
    }
}

/// Tab cycles through candidates and finally back to the typed text
struct Completion {
    candidates: Vec<String>,
    original: String,
    next: usize,
}

impl Completion {
    fn advance(&mut self) -> String {
        let total = self.candidates.len() + 1;
        let pick = self.next % total;
        self.next += 1;
        self.candidates
            .get(pick)
            .cloned()
            .unwrap_or_else(|| self.original.clone())
    }
}

enum PromptStep {
    Continue,
    Accept,
    Cancel,
}

impl PromptLine {
    fn new(prefix: &str, text: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            text: text.to_string(),
            cursor: text.chars().count(),
        }
    }

    fn byte_index(&self, cursor: usize) -> usize {
        self.text
            .char_indices()
            .nth(cursor)
            .map_or(self.text.len(), |(idx, _)| idx)
    }

    fn insert(&mut self, c: char) {
        let idx = self.byte_index(self.cursor);
        self.text.insert(idx, c);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let idx = self.byte_index(self.cursor);
            self.text.remove(idx);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let idx = self.byte_index(self.cursor);
            self.text.remove(idx);
        }
    }

    fn replace(&mut self, text: String) {
        self.cursor = text.chars().count();
        self.text = text;
    }
}

fn edit(line: &mut PromptLine, key: KeyEvent) -> PromptStep {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Enter => return PromptStep::Accept,
        KeyCode::Esc => return PromptStep::Cancel,
        KeyCode::Char('c') | KeyCode::Char('g') if ctrl => return PromptStep::Cancel,
        KeyCode::Char('a') if ctrl => line.cursor = 0,
        KeyCode::Char('e') if ctrl => line.cursor = line.text.chars().count(),
        KeyCode::Char('u') if ctrl => line.replace(String::new()),
        KeyCode::Char(c) if !ctrl => line.insert(c),
        KeyCode::Backspace => line.backspace(),
        KeyCode::Delete => line.delete(),
        KeyCode::Left => line.cursor = line.cursor.saturating_sub(1),
        KeyCode::Right => line.cursor = (line.cursor + 1).min(line.text.chars().count()),
        KeyCode::Home => line.cursor = 0,
        KeyCode::End => line.cursor = line.text.chars().count(),
        _ => {}
    }
    PromptStep::Continue
}

impl Renderer for TerminalRenderer {
    fn pause(&mut self) -> notch_core::Result<()> {
        self.gate.set(false);
        setup::release()?;
        Ok(())
    }

    fn resume(&mut self) -> notch_core::Result<()> {
        setup::acquire()?;
        self.terminal.clear()?;
        self.paint(None)?;
        self.gate.set(true);
        Ok(())
    }

    fn draw(&mut self, view: &View<'_>) -> notch_core::Result<()> {
        self.screen = Screen::capture(view);
        self.paint(None)?;
        Ok(())
    }

    fn prompt(
        &mut self,
        prefix: &str,
        text: &str,
        completer: Option<&dyn Completer>,
    ) -> notch_core::Result<Option<String>> {
        self.gate.set(false);
        let mut line = PromptLine::new(prefix, text);
        let answer = self.read_prompt(&mut line, completer);
        self.gate.set(true);
        self.paint(None)?;
        log::debug!("prompt {:?} answered: {:?}", prefix, answer.as_ref().ok());
        Ok(answer?)
    }
}
