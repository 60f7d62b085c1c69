//! Compose, re-edit and send
//!
//! Drafts round-trip through a scratch file: write, edit, and on a clean
//! editor exit read back into an envelope buffer. Everything that can fail
//! before the editor starts (identity, prompts) fails before the file
//! exists, and a failed editor run deletes it.

use super::{Command, CommandKind, Continuation, DraftTarget};
use crate::account::Account;
use crate::buffer::{Buffer, EnvelopeBuffer};
use crate::error::{NotchError, Result};
use crate::mail::{parse_address, Mail};
use crate::process::{ExternalCommand, FailureHandler};
use crate::registry::BufferId;
use crate::render::StringlistCompleter;
use crate::session::Session;
use std::io::Write;
use std::path::{Path, PathBuf};

pub(super) fn compose(session: &mut Session, headers: Vec<(String, String)>) -> Result<()> {
    let account = choose_account(session)?;
    let mut mail = Mail::new();
    mail.set("From", account.from_header());
    for (key, value) in headers {
        if !key.eq_ignore_ascii_case("From") {
            mail.set(&key, value);
        }
    }

    if !mail.contains("To") {
        let to = ask(session, "To>")?;
        mail.set("To", to);
    }
    if session.config.general.ask_subject && !mail.contains("Subject") {
        let subject = ask(session, "Subject>")?;
        mail.set("Subject", subject);
    }

    let path = write_draft(&mail)?;
    edit_draft(session, path, DraftTarget::NewEnvelope)
}

fn ask(session: &mut Session, prefix: &str) -> Result<String> {
    session
        .prompt(prefix, "", None)?
        .ok_or(NotchError::CancelledPrompt)
}

fn choose_account(session: &mut Session) -> Result<Account> {
    let mut accounts = session.accounts.list_accounts();
    match accounts.len() {
        0 => Err(NotchError::validation("no accounts set")),
        1 => Ok(accounts.remove(0)),
        _ => {
            let completer = StringlistCompleter::new(
                accounts.iter().map(|a| a.address.clone()).collect(),
            );
            loop {
                let answer = session
                    .prompt("From>", "", Some(&completer))?
                    .ok_or(NotchError::CancelledPrompt)?;
                if let Some(account) = session.accounts.resolve(&parse_address(&answer)) {
                    return Ok(account);
                }
                session.notify("couldn't find a matching account. (<esc> cancels)");
            }
        }
    }
}

fn write_draft(mail: &Mail) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("notch-")
        .suffix(".mail")
        .tempfile()?;
    file.write_all(mail.render().as_bytes())?;
    let (_, path) = file.keep().map_err(|e| NotchError::Io(e.error))?;
    log::debug!("draft written to {}", path.display());
    Ok(path)
}

fn edit_draft(session: &mut Session, path: PathBuf, target: DraftTarget) -> Result<()> {
    let load = Continuation::command(CommandKind::LoadDraft {
        path: path.clone(),
        target,
    });
    let draft = path.clone();
    let discard = FailureHandler::new(move |session, err| {
        remove_draft(&draft);
        if let NotchError::SpawnFailure { .. } = err {
            session.notify_error(err.user_message());
        }
        Ok(())
    });
    session.run_command(Command::new(CommandKind::Edit {
        path,
        spawn: None,
        refocus: false,
        on_success: Some(load),
        on_failure: Some(discard),
    }))
}

pub(super) fn load_draft(session: &mut Session, path: PathBuf, target: DraftTarget) -> Result<()> {
    let mail = Mail::parse(&std::fs::read_to_string(&path)?);
    remove_draft(&path);

    match target {
        DraftTarget::Envelope(id) if session.buffers.contains(id) => {
            match session.buffers.get_mut(id) {
                Some(Buffer::Envelope(envelope)) => envelope.mail = mail,
                _ => {
                    return Err(NotchError::unexpected(format!(
                        "draft target {} is not an envelope",
                        id
                    )))
                }
            }
            session.buffers.focus(id);
        }
        DraftTarget::Envelope(id) => {
            log::info!("envelope {} closed while editing, opening a new one", id);
            session.open_buffer(Buffer::Envelope(EnvelopeBuffer::new(mail)))?;
        }
        DraftTarget::NewEnvelope => {
            session.open_buffer(Buffer::Envelope(EnvelopeBuffer::new(mail)))?;
        }
    }
    Ok(())
}

fn remove_draft(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("could not remove draft {}: {}", path.display(), e);
    }
}

fn current_envelope(session: &mut Session) -> Result<(BufferId, &mut Mail)> {
    let id = session.buffers.current_id();
    match (id, session.buffers.current_mut()) {
        (Some(id), Some(Buffer::Envelope(envelope))) => Ok((id, &mut envelope.mail)),
        _ => Err(NotchError::validation("not an envelope")),
    }
}

pub(super) fn reedit(session: &mut Session) -> Result<()> {
    let (id, mail) = current_envelope(session)?;
    let path = write_draft(mail)?;
    edit_draft(session, path, DraftTarget::Envelope(id))
}

pub(super) fn set_header(session: &mut Session, key: String, value: String) -> Result<()> {
    let (_, mail) = current_envelope(session)?;
    mail.set(&key, value);
    Ok(())
}

/// Pipe the current envelope to its account's sendmail command on a worker
/// thread. The envelope closes only once the command has succeeded.
pub(super) fn send(session: &mut Session) -> Result<()> {
    let (id, mail) = current_envelope(session)?;
    let address = parse_address(mail.get("From").unwrap_or_default());
    let rendered = mail.render();

    let Some(account) = session.accounts.resolve(&address) else {
        session.notify_error(format!("failed to send: no account set up for {}", address));
        return Ok(());
    };

    log::info!("sending mail from {} via {}", account.address, account.sendmail_command);
    let sent = Continuation::callback(move |session| {
        if session.buffers.contains(id) {
            session.run_command(Command::new(CommandKind::BufferClose {
                buffer: Some(id),
                focussed: false,
            }))?;
        }
        session.notify("mail send successful");
        Ok(())
    });
    let failed = FailureHandler::new(|session, err| {
        let reason = match err {
            NotchError::SpawnFailure { reason, .. } => reason,
            other => other.to_string(),
        };
        session.notify_error(format!("failed to send: {}", reason));
        Ok(())
    });
    session.run_external(
        ExternalCommand::new(account.sendmail_command)
            .in_thread(true)
            .refocus(false)
            .input(rendered)
            .on_success(sent)
            .on_failure(failed),
    )
}

#[cfg(test)]
mod tests {
    use crate::account::Account;
    use crate::buffer::Buffer;
    use crate::config::Config;
    use crate::mail::Mail;
    use crate::testing::{self, TestSession};

    fn envelope_mail(t: &TestSession) -> Mail {
        match t.session.buffers().current() {
            Some(Buffer::Envelope(envelope)) => envelope.mail.clone(),
            other => panic!("unexpected buffer {:?}", other),
        }
    }

    fn two_accounts() -> TestSession {
        TestSession::builder()
            .accounts(vec![
                Account::new("me@example.org", "Me"),
                Account::new("me@work.example", "Me at work"),
            ])
            .build()
    }

    #[test]
    fn test_compose_without_accounts_fails_early() {
        let mut t = TestSession::builder().accounts(Vec::new()).build();
        t.apply("compose");
        assert_eq!(t.session.notifications()[0].message, "no accounts set");
        assert!(t.launcher.calls().is_empty());
        assert!(t.renderer.prompts().is_empty());
    }

    #[test]
    fn test_compose_opens_envelope_from_edited_draft() {
        let mut t = TestSession::new();
        t.launcher.edit_with("vi", |text| format!("{}hello\n", text));
        t.renderer.answer(Some("you@example.org"));
        t.renderer.answer(Some("lunch"));
        t.apply("compose");

        let mail = envelope_mail(&t);
        assert_eq!(mail.get("From"), Some("Me <me@example.org>"));
        assert_eq!(mail.get("To"), Some("you@example.org"));
        assert_eq!(mail.get("Subject"), Some("lunch"));
        assert_eq!(mail.body(), "hello\n");
        assert_eq!(t.renderer.pauses(), 1);
        assert_eq!(t.renderer.resumes(), 1);
        assert!(!testing::draft_path(&t.launcher.calls()[0]).exists());
    }

    #[test]
    fn test_compose_skips_prompts_for_given_headers() {
        let mut config = Config::default();
        config.general.ask_subject = false;
        let mut t = TestSession::builder().config(config).build();
        t.apply("compose To=you@example.org");
        assert!(t.renderer.prompts().is_empty());
        assert_eq!(envelope_mail(&t).get("To"), Some("you@example.org"));
    }

    #[test]
    fn test_cancelled_prompt_aborts_before_draft() {
        let mut t = TestSession::new();
        t.renderer.answer(None);
        t.apply("compose");
        assert_eq!(t.session.notifications()[0].message, "canceled");
        assert!(t.launcher.calls().is_empty());
        assert!(t.session.buffers().is_empty());
    }

    #[test]
    fn test_compose_asks_for_sender_until_it_matches() {
        let mut t = two_accounts();
        t.renderer.answer(Some("stranger@example.org"));
        t.renderer.answer(Some("Work <me@work.example>"));
        t.apply("compose To=a@b.c Subject=x");
        let prompts = t.renderer.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts.iter().all(|(prefix, _)| prefix == "From>"));
        assert_eq!(
            t.session.notifications()[0].message,
            "couldn't find a matching account. (<esc> cancels)"
        );
        assert_eq!(envelope_mail(&t).get("From"), Some("Me at work <me@work.example>"));
    }

    #[test]
    fn test_cancelled_sender_prompt() {
        let mut t = two_accounts();
        t.renderer.answer(None);
        t.apply("compose To=a@b.c Subject=x");
        assert!(t.session.buffers().is_empty());
        assert_eq!(t.session.notifications()[0].message, "canceled");
    }

    #[test]
    fn test_failed_editor_opens_nothing() {
        let mut t = TestSession::new();
        t.launcher.set_exit_code("vi", 1);
        t.apply("compose To=a@b.c Subject=x");
        assert!(t.session.buffers().is_empty());
        assert!(t.session.notifications().is_empty());
        assert!(!testing::draft_path(&t.launcher.calls()[0]).exists());
    }

    #[test]
    fn test_missing_editor_discards_draft() {
        let mut t = TestSession::new();
        t.launcher.fail_to_spawn("vi");
        t.apply("compose To=a@b.c Subject=x");
        assert!(t.session.buffers().is_empty());
        let message = &t.session.notifications()[0].message;
        assert!(message.starts_with("failed to run vi "), "{}", message);
        assert!(!testing::draft_path(&t.launcher.calls()[0]).exists());
    }

    #[test]
    fn test_failed_reedit_keeps_envelope() {
        let mut t = TestSession::new();
        t.apply("compose To=a@b.c Subject=x");
        t.launcher.set_exit_code("vi", 1);
        t.apply("reedit");
        assert_eq!(t.session.buffers().len(), 1);
        assert_eq!(envelope_mail(&t).get("Subject"), Some("x"));
        assert!(!testing::draft_path(&t.launcher.calls()[1]).exists());
    }

    #[test]
    fn test_reedit_updates_existing_envelope() {
        let mut t = TestSession::new();
        t.apply("compose To=a@b.c Subject=x");
        let envelope = t.session.buffers().current_id().unwrap();
        t.launcher
            .edit_with("vi", |text| text.replace("Subject: x", "Subject: y"));
        t.apply("reedit");
        assert_eq!(t.session.buffers().len(), 1);
        assert_eq!(t.session.buffers().current_id(), Some(envelope));
        assert_eq!(envelope_mail(&t).get("Subject"), Some("y"));
    }

    #[test]
    fn test_set_header() {
        let mut t = TestSession::new();
        t.apply("compose To=a@b.c Subject=x");
        t.apply("set Subject a better subject");
        t.apply("set Cc c@d.e");
        let mail = envelope_mail(&t);
        assert_eq!(mail.get("Subject"), Some("a better subject"));
        assert_eq!(mail.get("Cc"), Some("c@d.e"));
    }

    #[test]
    fn test_send_pipes_mail_and_closes_envelope() {
        let mut t = TestSession::new();
        t.apply("search tag:inbox");
        t.apply("compose To=a@b.c Subject=x");
        t.apply("send");
        assert_eq!(t.session.buffers().len(), 2);
        assert_eq!(t.session.pending_tasks(), 1);

        t.wait_for_event();
        assert_eq!(t.session.buffers().len(), 1);
        assert_eq!(t.session.notifications()[0].message, "mail send successful");
        let (command, input) = t.launcher.inputs().pop().unwrap();
        assert_eq!(command, "sendmail -t");
        assert!(input.starts_with("From: Me <me@example.org>\n"));
    }

    #[test]
    fn test_send_runs_off_the_loop_thread() {
        let mut t = TestSession::new();
        t.apply("compose To=a@b.c Subject=x");
        t.apply("send");
        t.wait_for_event();
        let threads = t.launcher.threads();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0], std::thread::current().id());
        assert_ne!(threads[1], std::thread::current().id());
        assert_eq!(t.renderer.pauses(), 1);
    }

    #[test]
    fn test_envelope_closed_while_sending() {
        let mut t = TestSession::new();
        t.apply("search tag:inbox");
        t.apply("compose To=a@b.c Subject=x");
        t.apply("send");
        t.apply("bclose");
        t.wait_for_event();
        assert_eq!(t.session.buffers().len(), 1);
        assert_eq!(t.session.notifications()[0].message, "mail send successful");
    }

    #[test]
    fn test_send_failure_keeps_envelope() {
        let mut t = TestSession::new();
        t.launcher.set_exit_code("sendmail", 75);
        t.apply("compose To=a@b.c Subject=x");
        t.apply("send");
        t.wait_for_event();
        assert_eq!(t.session.buffers().len(), 1);
        assert_eq!(
            t.session.notifications()[0].message,
            "failed to send: sendmail -t exited with code 75"
        );
    }

    #[test]
    fn test_send_from_unknown_account() {
        let mut t = TestSession::new();
        t.apply("compose To=a@b.c Subject=x");
        t.apply("set From Someone <someone@else.org>");
        t.apply("send");
        assert_eq!(
            t.session.notifications()[0].message,
            "failed to send: no account set up for someone@else.org"
        );
        assert!(t.launcher.inputs().is_empty());
    }

    #[test]
    fn test_envelope_commands_need_envelope() {
        let mut t = TestSession::new();
        t.apply("search tag:inbox");
        t.apply("send");
        assert_eq!(t.session.notifications()[0].message, "not an envelope");
    }
}
