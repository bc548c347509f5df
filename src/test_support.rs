//! Test doubles shared across unit and integration tests.
//!
//! Every double records what it was asked to do in a [`Journal`] so tests
//! can assert on ordering across collaborators, which is how lifecycle
//! serialisation is verified.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use camino::Utf8Path;

use crate::command::{CommandFuture, CommandOutput, CommandRunner};
use crate::metadata::{MetadataError, MetadataStore};
use crate::mount::{AccountCredentials, MountBackend, MountError, MountFuture};
use crate::share::{ShareError, ShareFuture, ShareService};
use crate::volume::{VolumeMetadata, VolumeOptions};

fn lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    mutex
        .lock()
        .unwrap_or_else(|err| panic!("lock poisoned: {context}: {err}"))
}

/// Ordered log of collaborator calls shared between doubles.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.entries, "journal.record").push(entry.into());
    }

    /// Snapshot of every entry so far.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries, "journal.entries").clone()
    }

    /// Position of the first entry equal to `entry`.
    #[must_use]
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|candidate| candidate == entry)
    }
}

/// In-memory metadata store with injectable failures.
#[derive(Clone, Debug, Default)]
pub struct MemoryMetadataStore {
    state: Arc<Mutex<StoreState>>,
    journal: Journal,
}

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<String, VolumeMetadata>,
    fail_put: bool,
    fail_get: bool,
    fail_delete: bool,
    put_calls: u32,
}

impl MemoryMetadataStore {
    /// Creates an empty store writing to its own journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store writing to `journal`.
    #[must_use]
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Arc::default(),
            journal,
        }
    }

    /// Seeds a record for `name`.
    pub fn insert(&self, name: &str, account: &str, share: &str) {
        let record = VolumeMetadata {
            account: account.to_owned(),
            created_at: chrono::Utc::now(),
            options: VolumeOptions::for_share(share),
            raw_options: BTreeMap::from([(String::from("share"), share.to_owned())]),
        };
        lock(&self.state, "insert")
            .records
            .insert(name.to_owned(), record);
    }

    /// Returns the stored record for `name`, if any.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<VolumeMetadata> {
        lock(&self.state, "record").records.get(name).cloned()
    }

    /// Makes every subsequent `put` fail.
    pub fn fail_put(&self) {
        lock(&self.state, "fail_put").fail_put = true;
    }

    /// Makes every subsequent `get` fail with an I/O error.
    pub fn fail_get(&self) {
        lock(&self.state, "fail_get").fail_get = true;
    }

    /// Makes every subsequent `delete` fail with an I/O error.
    pub fn fail_delete(&self) {
        lock(&self.state, "fail_delete").fail_delete = true;
    }

    /// Number of `put` calls, including failed ones.
    #[must_use]
    pub fn put_calls(&self) -> u32 {
        lock(&self.state, "put_calls").put_calls
    }

    fn io_failure(name: &str) -> MetadataError {
        MetadataError::Io {
            path: camino::Utf8PathBuf::from(format!("memory/{name}.json")),
            message: String::from("injected failure"),
        }
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn put(&self, name: &str, record: &VolumeMetadata) -> Result<(), MetadataError> {
        self.journal.record(format!("metadata.put:{name}"));
        let mut state = lock(&self.state, "put");
        state.put_calls += 1;
        if state.fail_put {
            return Err(Self::io_failure(name));
        }
        state.records.insert(name.to_owned(), record.clone());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<VolumeMetadata, MetadataError> {
        self.journal.record(format!("metadata.get:{name}"));
        let state = lock(&self.state, "get");
        if state.fail_get {
            return Err(Self::io_failure(name));
        }
        state
            .records
            .get(name)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound {
                name: name.to_owned(),
            })
    }

    fn list(&self) -> Result<Vec<String>, MetadataError> {
        Ok(lock(&self.state, "list").records.keys().cloned().collect())
    }

    fn delete(&self, name: &str) -> Result<(), MetadataError> {
        self.journal.record(format!("metadata.delete:{name}"));
        let mut state = lock(&self.state, "delete");
        if state.fail_delete {
            return Err(Self::io_failure(name));
        }
        state
            .records
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| MetadataError::NotFound {
                name: name.to_owned(),
            })
    }
}

/// How a double should behave when called.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Behaviour {
    /// Succeed immediately.
    #[default]
    Succeed,
    /// Return an error immediately.
    Fail,
    /// Never complete.
    Hang,
}

/// Share service double tracking which shares exist.
#[derive(Clone, Debug, Default)]
pub struct RecordingShares {
    state: Arc<Mutex<SharesState>>,
    journal: Journal,
}

#[derive(Debug, Default)]
struct SharesState {
    existing: BTreeSet<String>,
    behaviour: Behaviour,
    delay: Option<Duration>,
    ensure_calls: Vec<String>,
    delete_calls: Vec<String>,
}

impl RecordingShares {
    /// Creates a service with no shares.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service writing to `journal`.
    #[must_use]
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Arc::default(),
            journal,
        }
    }

    /// Sets how subsequent calls behave.
    pub fn set_behaviour(&self, behaviour: Behaviour) {
        lock(&self.state, "set_behaviour").behaviour = behaviour;
    }

    /// Delays every call by `delay` before it takes effect.
    pub fn set_delay(&self, delay: Duration) {
        lock(&self.state, "set_delay").delay = Some(delay);
    }

    /// Returns whether `share` currently exists.
    #[must_use]
    pub fn exists(&self, share: &str) -> bool {
        lock(&self.state, "exists").existing.contains(share)
    }

    /// Shares passed to `ensure_exists`, in call order.
    #[must_use]
    pub fn ensure_calls(&self) -> Vec<String> {
        lock(&self.state, "ensure_calls").ensure_calls.clone()
    }

    /// Shares passed to `delete_if_exists`, in call order.
    #[must_use]
    pub fn delete_calls(&self) -> Vec<String> {
        lock(&self.state, "delete_calls").delete_calls.clone()
    }

    async fn call(&self, action: &'static str, share: &str) -> Result<bool, ShareError> {
        self.journal.record(format!("share.{action}.begin:{share}"));
        let (behaviour, delay) = {
            let mut state = lock(&self.state, "call");
            if action == "ensure" {
                state.ensure_calls.push(share.to_owned());
            } else {
                state.delete_calls.push(share.to_owned());
            }
            (state.behaviour, state.delay)
        };
        if let Some(pause) = delay {
            tokio::time::sleep(pause).await;
        }
        let outcome = match behaviour {
            Behaviour::Hang => std::future::pending().await,
            Behaviour::Fail => Err(ShareError::Transport {
                message: String::from("injected share failure"),
            }),
            Behaviour::Succeed => {
                let mut state = lock(&self.state, "apply");
                if action == "ensure" {
                    Ok(state.existing.insert(share.to_owned()))
                } else {
                    Ok(state.existing.remove(share))
                }
            }
        };
        self.journal.record(format!("share.{action}.end:{share}"));
        outcome
    }
}

impl ShareService for RecordingShares {
    fn ensure_exists<'a>(&'a self, share: &'a str) -> ShareFuture<'a> {
        Box::pin(self.call("ensure", share))
    }

    fn delete_if_exists<'a>(&'a self, share: &'a str) -> ShareFuture<'a> {
        Box::pin(self.call("delete", share))
    }
}

/// A recorded `bind` call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BindCall {
    /// Account used to authenticate.
    pub account: String,
    /// Share that was bound.
    pub share: String,
    /// Local path the share was bound at.
    pub path: String,
}

/// Mount backend double recording binds and unbinds.
#[derive(Clone, Debug, Default)]
pub struct RecordingMounter {
    state: Arc<Mutex<MounterState>>,
    journal: Journal,
}

#[derive(Debug, Default)]
struct MounterState {
    bind_behaviour: Behaviour,
    unbind_behaviour: Behaviour,
    binds: Vec<BindCall>,
    unbinds: Vec<String>,
}

impl RecordingMounter {
    /// Creates a mounter that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mounter writing to `journal`.
    #[must_use]
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Arc::default(),
            journal,
        }
    }

    /// Sets how subsequent binds behave.
    pub fn set_bind_behaviour(&self, behaviour: Behaviour) {
        lock(&self.state, "set_bind_behaviour").bind_behaviour = behaviour;
    }

    /// Sets how subsequent unbinds behave.
    pub fn set_unbind_behaviour(&self, behaviour: Behaviour) {
        lock(&self.state, "set_unbind_behaviour").unbind_behaviour = behaviour;
    }

    /// Recorded bind calls.
    #[must_use]
    pub fn binds(&self) -> Vec<BindCall> {
        lock(&self.state, "binds").binds.clone()
    }

    /// Recorded unbind paths.
    #[must_use]
    pub fn unbinds(&self) -> Vec<String> {
        lock(&self.state, "unbinds").unbinds.clone()
    }
}

async fn settle(behaviour: Behaviour, program: &str) -> Result<(), MountError> {
    match behaviour {
        Behaviour::Succeed => Ok(()),
        Behaviour::Fail => Err(MountError::CommandFailure {
            program: program.to_owned(),
            command: program.to_owned(),
            status_text: String::from("32"),
            output: String::from("injected failure"),
        }),
        Behaviour::Hang => std::future::pending().await,
    }
}

impl MountBackend for RecordingMounter {
    fn bind<'a>(
        &'a self,
        credentials: &'a AccountCredentials,
        options: &'a VolumeOptions,
        path: &'a Utf8Path,
    ) -> MountFuture<'a> {
        Box::pin(async move {
            self.journal.record(format!("mount.bind:{path}"));
            let behaviour = {
                let mut state = lock(&self.state, "bind");
                state.binds.push(BindCall {
                    account: credentials.name.clone(),
                    share: options.share.clone(),
                    path: path.to_string(),
                });
                state.bind_behaviour
            };
            settle(behaviour, "mount").await
        })
    }

    fn unbind<'a>(&'a self, path: &'a Utf8Path) -> MountFuture<'a> {
        Box::pin(async move {
            self.journal.record(format!("mount.unbind:{path}"));
            let behaviour = {
                let mut state = lock(&self.state, "unbind");
                state.unbinds.push(path.to_string());
                state.unbind_behaviour
            };
            settle(behaviour, "umount").await
        })
    }
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations, "invocations").clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with generic stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "failure");
    }

    /// Pushes a fully specified output.
    pub fn push_output(&self, code: Option<i32>, stdout: &str, stderr: &str) {
        lock(&self.responses, "push_output").push_back(CommandOutput {
            code,
            stdout: stdout.to_owned(),
            stderr: stderr.to_owned(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> CommandFuture<'a> {
        Box::pin(async move {
            lock(&self.invocations, "run").push(CommandInvocation {
                program: program.to_owned(),
                args: args.to_vec(),
            });
            let response = lock(&self.responses, "run").pop_front();
            Ok(response.unwrap_or_else(|| panic!("no scripted response for {program}")))
        })
    }
}

/// Raw creation options containing only `share`.
#[must_use]
pub fn share_options(share: &str) -> HashMap<String, String> {
    HashMap::from([(String::from("share"), share.to_owned())])
}
