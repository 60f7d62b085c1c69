//! Event loop module
//!
//! Multiplexes engine events (completed external commands, flush retries)
//! with terminal input and ticks, and redraws after each round. Everything
//! touching the session happens here, on one thread.

use super::UiEvent;
use crate::keymap::{self, Action, Keymap};
use anyhow::Result;
use crossterm::event::{Event as CrosstermEvent, KeyEvent, KeyEventKind};
use notch_core::event::EventReceiver;
use notch_core::{Buffer, Session};
use tokio::sync::mpsc;

/// Run until the session shuts down or both channels close
pub async fn run(
    session: &mut Session,
    engine_rx: &mut EventReceiver,
    ui_rx: &mut mpsc::UnboundedReceiver<UiEvent>,
    keymap: &Keymap,
) -> Result<()> {
    session.redraw()?;

    while session.is_running() {
        tokio::select! {
            Some(event) = engine_rx.recv() => {
                log::debug!("engine event: {:?}", event);
                session.handle_event(event)?;
            }
            Some(event) = ui_rx.recv() => match event {
                UiEvent::Input(CrosstermEvent::Key(key)) => handle_key(session, keymap, key)?,
                UiEvent::Input(_) | UiEvent::Tick => {}
            },
            else => break,
        }

        // completions may have queued up while a prompt blocked the loop
        session.process_pending_events(engine_rx)?;
        if session.is_running() {
            session.redraw()?;
        }
    }
    Ok(())
}

fn handle_key(session: &mut Session, keymap: &Keymap, key: KeyEvent) -> Result<()> {
    if key.kind != KeyEventKind::Press {
        return Ok(());
    }
    let Some(name) = keymap::key_name(&key) else {
        return Ok(());
    };
    let mode = session.buffers().current().map(Buffer::kind);
    let Some(action) = keymap.lookup(mode, &name) else {
        log::debug!("unbound key: {}", name);
        return Ok(());
    };

    match action {
        Action::Command(line) => session.apply_command_line(line)?,
        Action::Move(delta) => move_selection(session, *delta),
        Action::SelectTag => {
            let tag = match session.buffers().current() {
                Some(Buffer::TagList(list)) => list.selected_tag().map(str::to_string),
                _ => None,
            };
            if let Some(tag) = tag {
                session.apply_command_line(&format!("search tag:{}", tag))?;
            }
        }
    }
    Ok(())
}

fn move_selection(session: &mut Session, delta: isize) {
    let registry = session.buffers_mut();
    let rows = match registry.current() {
        Some(Buffer::BufferList(list)) => registry.listed(list).len(),
        Some(buffer) => buffer.row_count().unwrap_or(0),
        None => return,
    };
    if let Some(buffer) = registry.current_mut() {
        buffer.move_selection(delta, rows);
    }
}
