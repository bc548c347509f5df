//! Shared fixtures for lifecycle BDD scenarios.

use std::sync::Arc;
use std::time::Duration;

use azfile_driver::test_support::{RecordingMounter, RecordingShares};
use azfile_driver::{AccountCredentials, DriverSettings, FileMetadataStore, VolumeDriver};
use camino::Utf8PathBuf;
use rstest::fixture;
use tempfile::TempDir;

pub type ScenarioDriver = VolumeDriver<RecordingShares, RecordingMounter, FileMetadataStore>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StepOutcome {
    Success(Option<Utf8PathBuf>),
    Failure(String),
}

#[derive(Clone, Debug)]
pub struct LifecycleContext {
    pub workspace: Arc<TempDir>,
    pub account: String,
    pub remove_shares: bool,
    pub purge_metadata: bool,
    pub shares: RecordingShares,
    pub mounter: RecordingMounter,
    pub outcome: Option<StepOutcome>,
}

#[fixture]
pub fn lifecycle_context() -> LifecycleContext {
    let workspace = TempDir::new().unwrap_or_else(|err| panic!("tempdir should be created: {err}"));
    LifecycleContext {
        workspace: Arc::new(workspace),
        account: String::from("acct"),
        remove_shares: false,
        purge_metadata: false,
        shares: RecordingShares::new(),
        mounter: RecordingMounter::new(),
        outcome: None,
    }
}

impl LifecycleContext {
    fn workspace_path(&self, leaf: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.workspace.path().join(leaf))
            .unwrap_or_else(|path| panic!("workspace path should be UTF-8: {}", path.display()))
    }

    pub fn mount_root(&self) -> Utf8PathBuf {
        self.workspace_path("mnt")
    }

    pub fn metadata_root(&self) -> Utf8PathBuf {
        self.workspace_path("metadata")
    }

    pub fn mountpoint(&self, name: &str) -> Utf8PathBuf {
        self.mount_root().join(name)
    }

    pub fn open_store(&self) -> FileMetadataStore {
        FileMetadataStore::open(self.metadata_root())
            .unwrap_or_else(|err| panic!("metadata store should open: {err}"))
    }

    /// Builds a driver over the shared doubles. The metadata store is
    /// reopened each time; its state lives on disk.
    pub fn driver(&self) -> ScenarioDriver {
        VolumeDriver::new(
            self.shares.clone(),
            self.mounter.clone(),
            self.open_store(),
            DriverSettings {
                credentials: AccountCredentials::new(self.account.as_str(), "c2VjcmV0LWtleQ=="),
                mount_root: self.mount_root(),
                remove_shares: self.remove_shares,
                purge_metadata: self.purge_metadata,
                backend_timeout: Duration::from_secs(2),
            },
        )
    }
}
