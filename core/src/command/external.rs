//! Editor invocation

use super::Continuation;
use crate::error::Result;
use crate::process::{ExternalCommand, FailureHandler};
use crate::session::Session;
use std::path::PathBuf;

/// Open `path` in the configured editor. A spawned editor gets its own
/// terminal and runs in the background; otherwise it takes over ours.
pub(super) fn edit(
    session: &mut Session,
    path: PathBuf,
    spawn: Option<bool>,
    refocus: bool,
    on_success: Option<Continuation>,
    on_failure: Option<FailureHandler>,
) -> Result<()> {
    let general = &session.config.general;
    let spawn = spawn.unwrap_or(general.spawn_editor);
    let command_line = format!(
        "{} {}",
        general.editor_cmd,
        shell_words::quote(&path.to_string_lossy())
    );
    let mut cmd = ExternalCommand::new(command_line)
        .spawn(spawn)
        .in_thread(spawn)
        .refocus(refocus);
    if let Some(continuation) = on_success {
        cmd = cmd.on_success(continuation);
    }
    if let Some(handler) = on_failure {
        cmd = cmd.on_failure(handler);
    }
    session.run_external(cmd)
}
