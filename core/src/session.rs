//! The session controller
//!
//! Owns the buffer registry, the store and every other collaborator, and is
//! the only path through which commands reach them. All methods run on the
//! loop thread.
//!
//! Errors are contained at the command boundary: `apply_command`,
//! `apply_command_line` and `handle_event` turn environmental failures into
//! notifications and only let contract violations (`is_fatal`) escape.

use crate::account::{AccountManager, AccountResolver};
use crate::buffer::Buffer;
use crate::command::{self, Command, Continuation};
use crate::config::Config;
use crate::error::{NotchError, Result};
use crate::event::{EngineEvent, EventReceiver, EventSender, TaskId};
use crate::flush::{FlushScheduler, Timer, TokioTimer};
use crate::process::{PendingExternalTask, ProcessLauncher, ShellLauncher};
use crate::registry::{BufferId, BufferRegistry};
use crate::render::{
    CommandCompleter, Completer, Notification, NotificationLevel, Renderer, View,
};
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;

/// Notifications kept for display
const MAX_NOTIFICATIONS: usize = 5;

pub struct Session {
    pub(crate) config: Config,
    pub(crate) buffers: BufferRegistry,
    pub(crate) store: Box<dyn Store>,
    pub(crate) renderer: Box<dyn Renderer>,
    pub(crate) accounts: Box<dyn AccountResolver>,
    pub(crate) launcher: Arc<dyn ProcessLauncher>,
    pub(crate) timer: Box<dyn Timer>,
    pub(crate) events: EventSender,
    pub(crate) flush: FlushScheduler,
    pub(crate) pending: HashMap<TaskId, PendingExternalTask>,
    next_task: u64,
    notifications: Vec<Notification>,
    running: bool,
}

impl Session {
    /// Create a session with production defaults for accounts (from the
    /// config), process launching and timers.
    pub fn new(
        config: Config,
        store: Box<dyn Store>,
        renderer: Box<dyn Renderer>,
        events: EventSender,
    ) -> Self {
        let accounts = AccountManager::from_config(&config.accounts);
        let flush = FlushScheduler::new(config.flush_retry_delay());
        Self {
            buffers: BufferRegistry::new(),
            store,
            renderer,
            accounts: Box::new(accounts),
            launcher: Arc::new(ShellLauncher),
            timer: Box::new(TokioTimer::new(events.clone())),
            events,
            flush,
            pending: HashMap::new(),
            next_task: 0,
            notifications: Vec::new(),
            running: true,
            config,
        }
    }

    pub fn with_accounts(mut self, accounts: Box<dyn AccountResolver>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_timer(mut self, timer: Box<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn buffers(&self) -> &BufferRegistry {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut BufferRegistry {
        &mut self.buffers
    }

    pub fn store(&self) -> &dyn Store {
        &*self.store
    }

    pub fn accounts(&self) -> &dyn AccountResolver {
        &*self.accounts
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn clear_notifications(&mut self) {
        self.notifications.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn shutdown(&mut self) {
        log::info!("shutting down with {} pending tasks", self.pending.len());
        self.running = false;
    }

    pub(crate) fn next_task_id(&mut self) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        id
    }

    // =========================================================================
    // Notifications & rendering
    // =========================================================================

    pub fn notify(&mut self, message: impl Into<String>) {
        self.push_notification(Notification::new(NotificationLevel::Info, message));
    }

    pub fn notify_error(&mut self, message: impl Into<String>) {
        self.push_notification(Notification::new(NotificationLevel::Error, message));
    }

    fn push_notification(&mut self, notification: Notification) {
        log::info!("notify: {}", notification.message);
        self.notifications.push(notification);
        if self.notifications.len() > MAX_NOTIFICATIONS {
            let excess = self.notifications.len() - MAX_NOTIFICATIONS;
            self.notifications.drain(..excess);
        }
    }

    pub fn redraw(&mut self) -> Result<()> {
        let view = View {
            buffers: &self.buffers,
            notifications: &self.notifications,
        };
        self.renderer.draw(&view)
    }

    /// Ask the user for a line of text; `Ok(None)` when cancelled
    pub fn prompt(
        &mut self,
        prefix: &str,
        text: &str,
        completer: Option<&dyn Completer>,
    ) -> Result<Option<String>> {
        self.renderer.prompt(prefix, text, completer)
    }

    /// Read a command line from the user and run it
    pub fn command_prompt(&mut self, start: &str) -> Result<()> {
        let Some(line) = self.prompt(":", start, Some(&CommandCompleter))? else {
            return Ok(());
        };
        if line.trim().is_empty() {
            return Ok(());
        }
        let cmd = command::parse(&line)?;
        self.run_command(cmd)
    }

    // =========================================================================
    // Buffers
    // =========================================================================

    /// Build a buffer from the store and focus it
    pub fn open_buffer(&mut self, mut buffer: Buffer) -> Result<BufferId> {
        buffer.rebuild(&*self.store)?;
        Ok(self.buffers.open(buffer))
    }

    pub fn rebuild_current(&mut self) -> Result<()> {
        let store = &*self.store;
        if let Some(buffer) = self.buffers.current_mut() {
            buffer.rebuild(store)?;
        }
        Ok(())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Apply a command at the error boundary
    pub fn apply_command(&mut self, cmd: Command) -> Result<()> {
        let result = self.run_command(cmd);
        self.contain(result)
    }

    /// Parse and apply a command line at the error boundary
    pub fn apply_command_line(&mut self, line: &str) -> Result<()> {
        let result = command::parse(line).and_then(|cmd| self.run_command(cmd));
        self.contain(result)
    }

    /// Apply a command with its hooks, propagating errors to the caller.
    ///
    /// This is how commands compose: a command applying another command
    /// sees the inner failure and can stop.
    pub fn run_command(&mut self, mut cmd: Command) -> Result<()> {
        let name = cmd.name();
        let prehook = cmd
            .prehook
            .take()
            .or_else(|| self.config.hook(&format!("pre_{}", name)).map(str::to_string));
        let posthook = cmd
            .posthook
            .take()
            .or_else(|| self.config.hook(&format!("post_{}", name)).map(str::to_string));

        if let Some(hook) = prehook {
            self.run_hook(&hook)?;
        }
        log::debug!("apply {}", name);
        cmd.apply(self)?;
        if let Some(hook) = posthook {
            if let Err(e) = self.run_hook(&hook) {
                log::warn!("posthook of {} failed: {}", name, e);
            }
        }
        Ok(())
    }

    fn run_hook(&mut self, command_line: &str) -> Result<()> {
        log::debug!("running hook: {}", command_line);
        let status = self.launcher.run_quiet(command_line)?;
        if status.success() {
            Ok(())
        } else {
            Err(NotchError::ProcessFailure {
                command: command_line.to_string(),
                code: status.code,
            })
        }
    }

    pub(crate) fn run_continuation(&mut self, continuation: Continuation) -> Result<()> {
        match continuation {
            Continuation::Command(cmd) => self.run_command(*cmd),
            Continuation::Callback(callback) => callback(self),
        }
    }

    /// Handle one event posted by a worker or timer
    pub fn handle_event(&mut self, event: EngineEvent) -> Result<()> {
        let result = match event {
            EngineEvent::ProcessExited { task, outcome } => self.complete_external(task, outcome),
            EngineEvent::FlushRetry => self.retry_flush(),
        };
        self.contain(result)
    }

    /// Drain every event already waiting on `events` without blocking
    pub fn process_pending_events(&mut self, events: &mut EventReceiver) -> Result<usize> {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle_event(event)?;
            handled += 1;
        }
        Ok(handled)
    }

    fn contain(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => {
                log::error!("fatal: {}", e);
                Err(e)
            }
            Err(e) => {
                log::warn!("command failed: {}", e);
                self.notify_error(e.user_message());
                Ok(())
            }
        }
    }
}
