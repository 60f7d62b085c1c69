//! Interactive frontend
//!
//! Sets up the terminal, starts the input and tick listeners and hands the
//! session to the event loop.

pub mod event_loop;
pub mod renderer;
pub mod setup;
pub mod ui;

use crate::keymap::Keymap;
use anyhow::{Context, Result};
use crossterm::event::{self, Event as CrosstermEvent};
use notch_core::{Config, MemoryStore, Session};
use renderer::{InputGate, TerminalRenderer};
use std::time::Duration;
use tokio::sync::mpsc;

/// Events produced by the terminal side
#[derive(Debug)]
pub enum UiEvent {
    Input(CrosstermEvent),
    Tick,
}

pub async fn run(config: Config, store: MemoryStore, initial_search: String) -> Result<()> {
    let keymap = Keymap::new(&config.bindings);
    let (terminal, _guard) = setup::init_terminal().context("Failed to set up terminal")?;

    let gate = InputGate::new();
    let (engine_tx, mut engine_rx) = notch_core::event::channel();
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    spawn_input_listener(ui_tx.clone(), gate.clone());
    spawn_ticker(ui_tx);

    let renderer = TerminalRenderer::new(terminal, gate);
    let mut session = Session::new(config, Box::new(store), Box::new(renderer), engine_tx);

    session.apply_command_line(&format!("search {}", initial_search))?;
    event_loop::run(&mut session, &mut engine_rx, &mut ui_rx, &keymap).await?;

    if session.pending_tasks() > 0 {
        log::warn!("exiting with {} commands still running", session.pending_tasks());
    }
    Ok(())
}

/// Forward terminal input while the gate is open
fn spawn_input_listener(tx: mpsc::UnboundedSender<UiEvent>, gate: InputGate) {
    tokio::spawn(async move {
        loop {
            if gate.is_open() && event::poll(Duration::from_millis(10)).unwrap_or(false) {
                // the renderer may have taken over while we polled
                if gate.is_open() {
                    match event::read() {
                        Ok(ev) => {
                            if tx.send(UiEvent::Input(ev)).is_err() {
                                break;
                            }
                        }
                        Err(e) => log::warn!("failed to read terminal input: {}", e),
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });
}

/// Periodic redraw so notifications expire on screen
fn spawn_ticker(tx: mpsc::UnboundedSender<UiEvent>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if tx.send(UiEvent::Tick).is_err() {
                break;
            }
        }
    });
}
