//! External process execution
//!
//! Synchronous commands hand the terminal to the child and block the loop.
//! Asynchronous commands run on a short-lived worker thread whose only
//! output is an [`EngineEvent::ProcessExited`] token; the continuation then
//! runs on the loop thread when the session consumes that token.

use crate::command::Continuation;
use crate::error::{NotchError, Result};
use crate::event::{EngineEvent, TaskId};
use crate::registry::BufferId;
use crate::session::Session;
use std::fmt;
use std::io::{self, Write};
use std::process::Stdio;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// `None` when the child was killed by a signal
    pub code: Option<i32>,
}

impl ExitStatus {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Runs command lines; shared with worker threads
pub trait ProcessLauncher: Send + Sync {
    /// Run through the shell, inheriting the terminal
    fn run(&self, command_line: &str) -> io::Result<ExitStatus>;

    /// Run through the shell with all standard streams discarded
    fn run_quiet(&self, command_line: &str) -> io::Result<ExitStatus>;

    /// Run the split command line directly with `input` piped to its stdin
    fn run_with_input(&self, command_line: &str, input: &str) -> io::Result<ExitStatus>;
}

/// Production launcher. User command lines go through `sh -c`, so pipes,
/// `&&` and variables work; piped commands are split with shell-words and
/// started without a shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellLauncher;

impl ShellLauncher {
    fn shell(command_line: &str) -> io::Result<std::process::Command> {
        if command_line.trim().is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command line"));
        }
        let mut cmd = std::process::Command::new("sh");
        cmd.arg("-c").arg(command_line);
        Ok(cmd)
    }

    fn direct(command_line: &str) -> io::Result<std::process::Command> {
        let argv = shell_words::split(command_line)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;
        let mut cmd = std::process::Command::new(program);
        cmd.args(args);
        Ok(cmd)
    }
}

impl ProcessLauncher for ShellLauncher {
    fn run(&self, command_line: &str) -> io::Result<ExitStatus> {
        let status = Self::shell(command_line)?.status()?;
        Ok(status.into())
    }

    fn run_quiet(&self, command_line: &str) -> io::Result<ExitStatus> {
        let status = Self::shell(command_line)?
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        Ok(status.into())
    }

    fn run_with_input(&self, command_line: &str, input: &str) -> io::Result<ExitStatus> {
        let mut child = Self::direct(command_line)?
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let written = match child.stdin.take() {
            Some(mut stdin) => match stdin.write_all(input.as_bytes()) {
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    // child exited without reading everything; its status decides
                    log::debug!("{} closed stdin early", command_line);
                    Ok(())
                }
                other => other,
            },
            None => Ok(()),
        };
        // stdin is closed by now, so the child sees EOF
        let status = child.wait()?;
        written?;
        Ok(status.into())
    }
}

/// Runs on the loop thread when an external command fails to start
/// ([`NotchError::SpawnFailure`]) or exits unsuccessfully
/// ([`NotchError::ProcessFailure`]). Without one, only start failures are
/// notified.
pub struct FailureHandler(Box<dyn FnOnce(&mut Session, NotchError) -> Result<()>>);

impl FailureHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&mut Session, NotchError) -> Result<()> + 'static,
    {
        Self(Box::new(f))
    }

    fn call(self, session: &mut Session, err: NotchError) -> Result<()> {
        (self.0)(session, err)
    }
}

impl fmt::Debug for FailureHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FailureHandler(..)")
    }
}

/// Parameters of one external command invocation
#[derive(Debug)]
pub struct ExternalCommand {
    pub command_line: String,
    /// Run inside a new terminal (`terminal_cmd` prefix)
    pub spawn: bool,
    /// Run on a worker thread instead of blocking the loop
    pub in_thread: bool,
    /// Refocus the calling buffer after a successful run
    pub refocus: bool,
    /// Piped to stdin; the command line is then started without a shell
    pub input: Option<String>,
    pub on_success: Option<Continuation>,
    /// Replaces the default reporting of a failed run
    pub on_failure: Option<FailureHandler>,
}

impl ExternalCommand {
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            spawn: false,
            in_thread: false,
            refocus: true,
            input: None,
            on_success: None,
            on_failure: None,
        }
    }

    pub fn spawn(mut self, spawn: bool) -> Self {
        self.spawn = spawn;
        self
    }

    pub fn in_thread(mut self, in_thread: bool) -> Self {
        self.in_thread = in_thread;
        self
    }

    pub fn refocus(mut self, refocus: bool) -> Self {
        self.refocus = refocus;
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn on_success(mut self, continuation: Continuation) -> Self {
        self.on_success = Some(continuation);
        self
    }

    pub fn on_failure(mut self, handler: FailureHandler) -> Self {
        self.on_failure = Some(handler);
        self
    }
}

/// Loop-side half of an in-flight asynchronous command
#[derive(Debug)]
pub struct PendingExternalTask {
    pub command_line: String,
    pub on_success: Option<Continuation>,
    pub on_failure: Option<FailureHandler>,
    pub refocus_to: Option<BufferId>,
}

fn launch(
    launcher: &dyn ProcessLauncher,
    command_line: &str,
    input: Option<&str>,
) -> std::result::Result<ExitStatus, String> {
    match input {
        Some(input) => launcher.run_with_input(command_line, input),
        None => launcher.run(command_line),
    }
    .map_err(|e| e.to_string())
}

impl Session {
    pub fn run_external(&mut self, cmd: ExternalCommand) -> Result<()> {
        let command_line = if cmd.spawn {
            format!("{} {}", self.config.general.terminal_cmd, cmd.command_line)
        } else {
            cmd.command_line
        };
        let refocus_to = if cmd.refocus {
            self.buffers.current_id()
        } else {
            None
        };
        log::info!("calling external command: {}", command_line);

        let pending = PendingExternalTask {
            command_line,
            on_success: cmd.on_success,
            on_failure: cmd.on_failure,
            refocus_to,
        };

        if cmd.in_thread {
            self.spawn_worker(pending, cmd.input)
        } else {
            self.renderer.pause()?;
            let outcome = launch(
                &*self.launcher,
                &pending.command_line,
                cmd.input.as_deref(),
            );
            self.renderer.resume()?;
            self.finish_external(pending, outcome)
        }
    }

    fn spawn_worker(&mut self, pending: PendingExternalTask, input: Option<String>) -> Result<()> {
        let task = self.next_task_id();
        let launcher = Arc::clone(&self.launcher);
        let events = self.events.clone();
        let command_line = pending.command_line.clone();

        self.pending.insert(task, pending);
        let spawned = std::thread::Builder::new()
            .name(format!("notch-{}", task))
            .spawn(move || {
                let outcome = launch(&*launcher, &command_line, input.as_deref());
                // loop gone means the session ended; nothing left to notify
                let _ = events.send(EngineEvent::ProcessExited { task, outcome });
            });
        if let Err(e) = spawned {
            self.pending.remove(&task);
            return Err(NotchError::Io(e));
        }
        log::debug!("started {}", task);
        Ok(())
    }

    /// Consume a completion token on the loop thread
    pub(crate) fn complete_external(
        &mut self,
        task: TaskId,
        outcome: std::result::Result<ExitStatus, String>,
    ) -> Result<()> {
        let pending = self.pending.remove(&task).ok_or_else(|| {
            NotchError::unexpected(format!("completion for unknown {}", task))
        })?;
        self.finish_external(pending, outcome)
    }

    fn finish_external(
        &mut self,
        pending: PendingExternalTask,
        outcome: std::result::Result<ExitStatus, String>,
    ) -> Result<()> {
        let failure = match outcome {
            Ok(status) if status.success() => None,
            Ok(status) => {
                let err = NotchError::ProcessFailure {
                    command: pending.command_line,
                    code: status.code,
                };
                log::info!("{}", err);
                Some(err)
            }
            Err(reason) => {
                let err = NotchError::SpawnFailure {
                    command: pending.command_line,
                    reason,
                };
                log::error!("{}", err);
                Some(err)
            }
        };
        if let Some(err) = failure {
            match pending.on_failure {
                Some(handler) => return handler.call(self, err),
                // the child reports its own diagnostics
                None if matches!(err, NotchError::ProcessFailure { .. }) => {}
                None => self.notify_error(err.user_message()),
            }
            return Ok(());
        }

        if let Some(continuation) = pending.on_success {
            self.run_continuation(continuation)?;
        }
        if let Some(id) = pending.refocus_to {
            if self.buffers.focus(id) {
                log::debug!("refocused {}", id);
            }
        }
        Ok(())
    }

    /// Number of asynchronous commands still running
    pub fn pending_tasks(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status() {
        assert!(ExitStatus::from_code(0).success());
        assert!(!ExitStatus::from_code(1).success());
        assert!(!ExitStatus { code: None }.success());
    }

    #[test]
    fn test_shell_launcher_rejects_empty_line() {
        let err = ShellLauncher.run("   ").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let err = ShellLauncher.run_quiet("").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let err = ShellLauncher
            .run_with_input("sendmail 'unterminated", "")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_launcher_reports_exit_codes() {
        assert!(ShellLauncher.run_quiet("true").unwrap().success());
        assert_eq!(ShellLauncher.run_quiet("false").unwrap().code, Some(1));
        let status = ShellLauncher
            .run_with_input("grep -q needle", "hay\nneedle\n")
            .unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_lines_go_through_the_shell() {
        assert_eq!(ShellLauncher.run_quiet("true && false").unwrap().code, Some(1));
        assert!(ShellLauncher.run_quiet("exit 3 | cat").unwrap().success());
        assert_eq!(ShellLauncher.run_quiet("exit $((2 + 5))").unwrap().code, Some(7));
        assert_eq!(
            ShellLauncher.run_quiet("test \"$HOME\" = '$HOME'").unwrap().code,
            Some(1)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_child_ignoring_stdin_still_reports_status() {
        let mail = "x".repeat(4 << 20);
        assert!(ShellLauncher.run_with_input("true", &mail).unwrap().success());
        let status = ShellLauncher.run_with_input("false", &mail).unwrap();
        assert_eq!(status.code, Some(1));
    }
}
