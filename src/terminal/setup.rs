//! Terminal setup and teardown
//!
//! Handles raw mode and the alternate screen, both at startup (with
//! cleanup via `TerminalGuard`) and around programs that borrow the
//! terminal, such as an editor.

use crossterm::{
    cursor::Show,
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;

pub type Tui = Terminal<CrosstermBackend<io::Stdout>>;

/// RAII guard that ensures terminal cleanup on drop
pub struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Best-effort cleanup, suppress all errors
        let _ = release();
    }
}

/// Initialize terminal in raw mode with alternate screen
pub fn init_terminal() -> io::Result<(Tui, TerminalGuard)> {
    acquire()?;
    let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    Ok((terminal, TerminalGuard))
}

/// Hand the terminal to another program
pub fn release() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableBracketedPaste, Show)
}

/// Take the terminal back after `release`
pub fn acquire() -> io::Result<()> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen, EnableBracketedPaste)
}
