//! notch-core: the command and buffer engine of the notch mail reader
//!
//! The [`Session`] owns a registry of [`Buffer`]s over an external index
//! [`Store`] and applies [`Command`]s against them. External programs,
//! timers and the terminal are reached through narrow traits so the engine
//! runs the same under the terminal frontend and under test doubles.

pub mod account;
pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod flush;
pub mod logger;
pub mod mail;
pub mod process;
pub mod registry;
pub mod render;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-exports for convenience
pub use buffer::{Buffer, BufferKind};
pub use command::{Command, CommandKind, Continuation};
pub use config::Config;
pub use error::{NotchError, Result};
pub use event::EngineEvent;
pub use registry::{BufferId, BufferRegistry};
pub use render::Renderer;
pub use session::Session;
pub use store::{MemoryStore, Store};
