//! Test doubles and fixtures
//!
//! Shared by the unit tests and the integration tests under `core/tests/`.
//! Everything here records what the engine asked of it so tests can assert
//! on the exact sequence of side effects.

use crate::account::{Account, AccountManager};
use crate::buffer::Buffer;
use crate::config::Config;
use crate::error::Result;
use crate::event::{self, EngineEvent, EventReceiver};
use crate::flush::Timer;
use crate::process::{ExitStatus, ProcessLauncher};
use crate::render::{Completer, Renderer, View};
use crate::session::Session;
use crate::store::memory::{IndexFile, StoredMessage, StoredThread};
use crate::store::{
    tag_set, MemoryStore, MessageSummary, Store, TagSet, ThreadId, ThreadSummary,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

// =============================================================================
// Fixtures
// =============================================================================

fn message(id: &str, from: &str, tags: &[&str]) -> StoredMessage {
    StoredMessage {
        id: id.to_string(),
        from: from.to_string(),
        date: "2024-03-01".to_string(),
        tags: tag_set(tags.iter().copied()),
    }
}

/// Three threads: `t1` (2 messages, inbox + unread), `t2` (1 message,
/// inbox) and `t3` (1 message, lists)
pub fn inbox_index() -> IndexFile {
    IndexFile {
        threads: vec![
            StoredThread {
                id: ThreadId::new("t1"),
                subject: "Lunch on friday".to_string(),
                messages: vec![
                    message("m1@example.org", "Alice <alice@example.org>", &["inbox", "unread"]),
                    message("m2@example.org", "Bob <bob@example.org>", &["inbox"]),
                ],
            },
            StoredThread {
                id: ThreadId::new("t2"),
                subject: "Release notes".to_string(),
                messages: vec![message("m3@example.org", "carol@example.org", &["inbox"])],
            },
            StoredThread {
                id: ThreadId::new("t3"),
                subject: "Weekly digest".to_string(),
                messages: vec![message("m4@example.org", "news@example.org", &["lists"])],
            },
        ],
    }
}

pub fn inbox_store() -> MemoryStore {
    MemoryStore::new(inbox_index())
}

/// Config with a fixed editor and terminal regardless of the environment
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.general.editor_cmd = "vi".to_string();
    config.general.terminal_cmd = "term -e".to_string();
    config
}

/// File argument of an editor command line
pub fn draft_path(command_line: &str) -> PathBuf {
    shell_words::split(command_line)
        .ok()
        .and_then(|words| words.last().cloned())
        .map(PathBuf::from)
        .unwrap_or_default()
}

// =============================================================================
// Store
// =============================================================================

/// A [`MemoryStore`] the test keeps a handle to after handing it to a session
#[derive(Clone)]
pub struct SharedStore(Rc<RefCell<MemoryStore>>);

impl SharedStore {
    pub fn new(store: MemoryStore) -> Self {
        Self(Rc::new(RefCell::new(store)))
    }

    pub fn commits(&self) -> usize {
        self.0.borrow().commits()
    }
}

impl Store for SharedStore {
    fn query(&self, query: &str) -> Result<Vec<ThreadSummary>> {
        self.0.borrow().query(query)
    }

    fn count(&self, query: &str) -> Result<usize> {
        self.0.borrow().count(query)
    }

    fn thread(&self, id: &ThreadId) -> Result<Option<ThreadSummary>> {
        self.0.borrow().thread(id)
    }

    fn messages(&self, id: &ThreadId) -> Result<Vec<MessageSummary>> {
        self.0.borrow().messages(id)
    }

    fn mutate_tags(&mut self, id: &ThreadId, add: &TagSet, remove: &TagSet) -> Result<()> {
        self.0.borrow_mut().mutate_tags(id, add, remove)
    }

    fn commit(&mut self) -> Result<()> {
        self.0.borrow_mut().commit()
    }

    fn list_all_tags(&self) -> Result<TagSet> {
        self.0.borrow().list_all_tags()
    }

    fn is_read_only(&self) -> bool {
        self.0.borrow().is_read_only()
    }
}

// =============================================================================
// Renderer
// =============================================================================

#[derive(Default)]
struct RendererState {
    answers: VecDeque<Option<String>>,
    prompts: Vec<(String, String)>,
    frames: Vec<Vec<String>>,
    pauses: usize,
    resumes: usize,
}

/// Answers prompts from a script; an exhausted script cancels
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    state: Rc<RefCell<RendererState>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer to the next prompt; `None` cancels it
    pub fn answer(&self, answer: Option<&str>) {
        self.state
            .borrow_mut()
            .answers
            .push_back(answer.map(str::to_string));
    }

    /// `(prefix, initial text)` of every prompt shown
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.state.borrow().prompts.clone()
    }

    /// Buffer titles of every drawn frame
    pub fn frames(&self) -> Vec<Vec<String>> {
        self.state.borrow().frames.clone()
    }

    pub fn pauses(&self) -> usize {
        self.state.borrow().pauses
    }

    pub fn resumes(&self) -> usize {
        self.state.borrow().resumes
    }
}

impl Renderer for RecordingRenderer {
    fn pause(&mut self) -> Result<()> {
        self.state.borrow_mut().pauses += 1;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.state.borrow_mut().resumes += 1;
        Ok(())
    }

    fn draw(&mut self, view: &View<'_>) -> Result<()> {
        let titles = view.buffers.iter().map(|(_, b)| b.title()).collect();
        self.state.borrow_mut().frames.push(titles);
        Ok(())
    }

    fn prompt(
        &mut self,
        prefix: &str,
        text: &str,
        _completer: Option<&dyn Completer>,
    ) -> Result<Option<String>> {
        let mut state = self.state.borrow_mut();
        state.prompts.push((prefix.to_string(), text.to_string()));
        Ok(state.answers.pop_front().flatten())
    }
}

// =============================================================================
// Timer
// =============================================================================

#[derive(Default)]
struct TimerState {
    history: Vec<(Duration, EngineEvent)>,
    queue: VecDeque<EngineEvent>,
}

/// Holds scheduled events until the test fires them
#[derive(Clone, Default)]
pub struct ManualTimer {
    state: Rc<RefCell<TimerState>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request ever made, fired or not
    pub fn scheduled(&self) -> Vec<(Duration, EngineEvent)> {
        self.state.borrow().history.clone()
    }

    /// Remove and return the events not fired yet
    pub fn take_due(&self) -> Vec<EngineEvent> {
        self.state.borrow_mut().queue.drain(..).collect()
    }
}

impl Timer for ManualTimer {
    fn schedule_after(&self, delay: Duration, event: EngineEvent) {
        let mut state = self.state.borrow_mut();
        state.history.push((delay, event.clone()));
        state.queue.push_back(event);
    }
}

// =============================================================================
// Process launcher
// =============================================================================

type Action = Box<dyn Fn(&str) -> i32 + Send + Sync>;

#[derive(Default)]
struct LauncherState {
    calls: Vec<String>,
    inputs: Vec<(String, String)>,
    exit_codes: Vec<(String, i32)>,
    failures: Vec<String>,
    actions: Vec<(String, Action)>,
    threads: Vec<std::thread::ThreadId>,
}

/// Scripted launcher. Command lines are matched by prefix, most recent
/// rule first; unmatched commands exit with 0.
#[derive(Default)]
pub struct FakeLauncher {
    state: Mutex<LauncherState>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LauncherState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_exit_code(&self, prefix: &str, code: i32) {
        self.lock().exit_codes.push((prefix.to_string(), code));
    }

    /// Make spawning matching commands fail with an I/O error
    pub fn fail_to_spawn(&self, prefix: &str) {
        self.lock().failures.push(prefix.to_string());
    }

    /// Act as an editor: rewrite the file named last on the command line
    pub fn edit_with<F>(&self, prefix: &str, edit: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let action: Action = Box::new(move |command_line| {
            let path = draft_path(command_line);
            match std::fs::read_to_string(&path) {
                Ok(text) => match std::fs::write(&path, edit(&text)) {
                    Ok(()) => 0,
                    Err(_) => 1,
                },
                Err(_) => 1,
            }
        });
        self.lock().actions.push((prefix.to_string(), action));
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// `(command line, stdin)` of every `run_with_input`
    pub fn inputs(&self) -> Vec<(String, String)> {
        self.lock().inputs.clone()
    }

    /// Threads each command ran on, in call order
    pub fn threads(&self) -> Vec<std::thread::ThreadId> {
        self.lock().threads.clone()
    }

    fn execute(state: &mut LauncherState, command_line: &str) -> io::Result<ExitStatus> {
        state.calls.push(command_line.to_string());
        state.threads.push(std::thread::current().id());
        if state.failures.iter().any(|p| command_line.starts_with(p)) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
        }
        if let Some((_, action)) = state
            .actions
            .iter()
            .rev()
            .find(|(p, _)| command_line.starts_with(p))
        {
            return Ok(ExitStatus::from_code(action(command_line)));
        }
        let code = state
            .exit_codes
            .iter()
            .rev()
            .find(|(p, _)| command_line.starts_with(p))
            .map_or(0, |(_, code)| *code);
        Ok(ExitStatus::from_code(code))
    }
}

impl ProcessLauncher for FakeLauncher {
    fn run(&self, command_line: &str) -> io::Result<ExitStatus> {
        Self::execute(&mut self.lock(), command_line)
    }

    fn run_quiet(&self, command_line: &str) -> io::Result<ExitStatus> {
        Self::execute(&mut self.lock(), command_line)
    }

    fn run_with_input(&self, command_line: &str, input: &str) -> io::Result<ExitStatus> {
        let mut state = self.lock();
        state
            .inputs
            .push((command_line.to_string(), input.to_string()));
        Self::execute(&mut state, command_line)
    }
}

// =============================================================================
// Session harness
// =============================================================================

/// A session wired to doubles, with handles to all of them
pub struct TestSession {
    pub session: Session,
    pub store: SharedStore,
    pub renderer: RecordingRenderer,
    pub timer: ManualTimer,
    pub launcher: Arc<FakeLauncher>,
    pub events: EventReceiver,
}

pub struct TestSessionBuilder {
    config: Config,
    store: MemoryStore,
    accounts: Vec<Account>,
}

impl TestSessionBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: MemoryStore) -> Self {
        self.store = store;
        self
    }

    pub fn accounts(mut self, accounts: Vec<Account>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn build(self) -> TestSession {
        let store = SharedStore::new(self.store);
        let renderer = RecordingRenderer::new();
        let timer = ManualTimer::new();
        let launcher = Arc::new(FakeLauncher::new());
        let (tx, events) = event::channel();
        let session = Session::new(
            self.config,
            Box::new(store.clone()),
            Box::new(renderer.clone()),
            tx,
        )
        .with_accounts(Box::new(AccountManager::new(self.accounts)))
        .with_launcher(launcher.clone())
        .with_timer(Box::new(timer.clone()));
        TestSession {
            session,
            store,
            renderer,
            timer,
            launcher,
            events,
        }
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSession {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TestSessionBuilder {
        TestSessionBuilder {
            config: test_config(),
            store: inbox_store(),
            accounts: vec![Account::new("me@example.org", "Me")],
        }
    }

    /// Apply a command line at the error boundary; panics on fatal errors
    pub fn apply(&mut self, line: &str) {
        if let Err(e) = self.session.apply_command_line(line) {
            panic!("fatal error applying '{}': {}", line, e);
        }
    }

    pub fn thread_tags(&self, id: &str) -> TagSet {
        self.store
            .thread(&ThreadId::new(id))
            .ok()
            .flatten()
            .map(|t| t.tags)
            .unwrap_or_default()
    }

    /// Move the selection of the current search buffer onto a thread
    pub fn select_thread(&mut self, id: &str) {
        let id = ThreadId::new(id);
        if let Some(Buffer::Search(search)) = self.session.buffers_mut().current_mut() {
            if let Some(idx) = search.line_index(&id) {
                search.selected = idx;
                return;
            }
        }
        panic!("thread {} is not shown in the current buffer", id);
    }

    pub fn commits(&self) -> usize {
        self.store.commits()
    }

    /// Fire every pending timer event; returns how many fired
    pub fn fire_timers(&mut self) -> usize {
        let due = self.timer.take_due();
        let fired = due.len();
        for event in due {
            if let Err(e) = self.session.handle_event(event) {
                panic!("fatal error handling timer event: {}", e);
            }
        }
        fired
    }

    /// Handle events already posted by workers
    pub fn drain_events(&mut self) -> usize {
        match self.session.process_pending_events(&mut self.events) {
            Ok(handled) => handled,
            Err(e) => panic!("fatal error handling events: {}", e),
        }
    }

    /// Block until a worker posts an event, then handle it
    pub fn wait_for_event(&mut self) -> EngineEvent {
        let Some(event) = self.events.blocking_recv() else {
            panic!("event channel closed");
        };
        if let Err(e) = self.session.handle_event(event.clone()) {
            panic!("fatal error handling {:?}: {}", event, e);
        }
        event
    }
}
