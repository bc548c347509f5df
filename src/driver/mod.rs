//! Volume lifecycle manager.
//!
//! [`VolumeDriver`] coordinates the share service, the metadata store, and
//! the mount backend. A single lock serialises every operation across all
//! volume names, so metadata read-decide-write sequences and mountpoint
//! creation/removal never interleave. Backend calls are bounded by the
//! configured timeout; nothing is retried or rolled back.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::metadata::{MetadataError, MetadataStore};
use crate::mount::{AccountCredentials, MountBackend};
use crate::share::ShareService;
use crate::volume::{MountLayout, VolumeMetadata, validate_volume_name};

mod error;

pub use error::DriverError;

/// Permission bits for freshly created mountpoint directories.
pub const MOUNTPOINT_MODE: u32 = 0o700;

/// Immutable configuration injected into a [`VolumeDriver`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DriverSettings {
    /// Account identity stamped on new volumes and used for mounting.
    pub credentials: AccountCredentials,
    /// Directory below which mountpoints are created.
    pub mount_root: Utf8PathBuf,
    /// Delete the backing share when a volume is removed.
    pub remove_shares: bool,
    /// Delete the metadata record when a volume is removed.
    pub purge_metadata: bool,
    /// Upper bound for each share, mount, or unmount call.
    pub backend_timeout: Duration,
}

/// Summary of a stored volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeInfo {
    /// Volume name.
    pub name: String,
    /// Deterministic mountpoint for the volume.
    pub mountpoint: Utf8PathBuf,
    /// When the volume was created.
    pub created_at: DateTime<Utc>,
    /// Backing share.
    pub share: String,
    /// Owning storage account.
    pub account: String,
}

impl VolumeInfo {
    fn new(name: &str, mountpoint: Utf8PathBuf, record: &VolumeMetadata) -> Self {
        Self {
            name: name.to_owned(),
            mountpoint,
            created_at: record.created_at,
            share: record.share().to_owned(),
            account: record.account.clone(),
        }
    }
}

/// Orchestrates volume create, path, mount, unmount, and remove.
#[derive(Debug)]
pub struct VolumeDriver<S, M, D> {
    lock: Mutex<()>,
    shares: S,
    mounter: M,
    store: D,
    settings: DriverSettings,
    layout: MountLayout,
}

impl<S, M, D> VolumeDriver<S, M, D>
where
    S: ShareService,
    M: MountBackend,
    D: MetadataStore,
{
    /// Creates a driver from its collaborators and settings.
    #[must_use]
    pub fn new(shares: S, mounter: M, store: D, settings: DriverSettings) -> Self {
        let layout = MountLayout::new(settings.mount_root.clone());
        Self {
            lock: Mutex::new(()),
            shares,
            mounter,
            store,
            settings,
            layout,
        }
    }

    /// Settings the driver was built with.
    #[must_use]
    pub const fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Mountpoint for `name` without taking the lock.
    #[must_use]
    pub fn mountpoint(&self, name: &str) -> Utf8PathBuf {
        self.layout.path_for(name)
    }

    /// Validates `options`, ensures the backing share exists, and records
    /// the volume.
    ///
    /// Re-creating a volume with the same share and account rewrites its
    /// options and keeps the original creation time.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidOptions`] before any side effect when
    /// validation fails, [`DriverError::BackendUnavailable`] when the share
    /// cannot be ensured, and [`DriverError::MetadataWriteFailed`] when the
    /// record cannot be stored. The last case leaves the share in place.
    #[tracing::instrument(name = "create", skip_all, fields(operation = "create", volume = %name, options = ?options))]
    pub async fn create(
        &self,
        name: &str,
        options: &HashMap<String, String>,
    ) -> Result<(), DriverError> {
        let _guard = self.lock.lock().await;
        debug!("request accepted");
        self.create_locked(name, options).await.inspect_err(log_failure)
    }

    /// Returns the mountpoint for `name`. Never fails and performs no I/O;
    /// the volume need not exist.
    #[tracing::instrument(name = "path", skip_all, fields(operation = "path", volume = %name))]
    pub async fn path(&self, name: &str) -> Utf8PathBuf {
        let _guard = self.lock.lock().await;
        debug!("request accepted");
        self.mountpoint(name)
    }

    /// Creates the mountpoint and binds the volume's share to it.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::LocalPathUnavailable`],
    /// [`DriverError::VolumeNotFound`], [`DriverError::ForeignVolume`], or
    /// [`DriverError::MountFailed`] depending on the failing step. The
    /// mountpoint directory may remain after a later step fails.
    #[tracing::instrument(name = "mount", skip_all, fields(operation = "mount", volume = %name))]
    pub async fn mount(&self, name: &str) -> Result<Utf8PathBuf, DriverError> {
        let _guard = self.lock.lock().await;
        debug!("request accepted");
        self.mount_locked(name).await.inspect_err(log_failure)
    }

    /// Unbinds the volume and removes its mountpoint directory.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::UnmountFailed`] when unbinding fails, in which
    /// case the directory is left in place, or [`DriverError::CleanupFailed`]
    /// when the directory cannot be removed after a successful unbind.
    #[tracing::instrument(name = "unmount", skip_all, fields(operation = "unmount", volume = %name))]
    pub async fn unmount(&self, name: &str) -> Result<(), DriverError> {
        let _guard = self.lock.lock().await;
        debug!("request accepted");
        self.unmount_locked(name).await.inspect_err(log_failure)
    }

    /// Removes a volume according to the configured share and metadata
    /// policies.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::VolumeNotFound`] when no record exists,
    /// [`DriverError::BackendUnavailable`] when share deletion fails, and
    /// [`DriverError::MetadataDeleteFailed`] when purging the record fails.
    #[tracing::instrument(name = "remove", skip_all, fields(operation = "remove", volume = %name))]
    pub async fn remove(&self, name: &str) -> Result<(), DriverError> {
        let _guard = self.lock.lock().await;
        debug!("request accepted");
        self.remove_locked(name).await.inspect_err(log_failure)
    }

    /// Describes a stored volume.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::VolumeNotFound`] when no record exists.
    #[tracing::instrument(name = "get", skip_all, fields(operation = "get", volume = %name))]
    pub async fn get(&self, name: &str) -> Result<VolumeInfo, DriverError> {
        let _guard = self.lock.lock().await;
        debug!("request accepted");
        self.get_locked(name).inspect_err(log_failure)
    }

    /// Describes every stored volume, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MetadataReadFailed`] when the store cannot be
    /// enumerated or a listed record cannot be read.
    #[tracing::instrument(name = "list", skip_all, fields(operation = "list"))]
    pub async fn list(&self) -> Result<Vec<VolumeInfo>, DriverError> {
        let _guard = self.lock.lock().await;
        debug!("request accepted");
        self.list_locked().inspect_err(log_failure)
    }

    async fn create_locked(
        &self,
        name: &str,
        options: &HashMap<String, String>,
    ) -> Result<(), DriverError> {
        check_name(name)?;
        let mut record = self.store.validate(options).map_err(|err| match err {
            MetadataError::InvalidOptions(message) => DriverError::InvalidOptions(message),
            other => DriverError::InvalidOptions(other.to_string()),
        })?;
        record.account.clone_from(&self.settings.credentials.name);
        record.created_at = Utc::now();

        let existing = match self.store.get(name) {
            Ok(existing) => Some(existing),
            Err(MetadataError::NotFound { .. }) => None,
            Err(err) => return Err(DriverError::MetadataReadFailed(err.to_string())),
        };
        if let Some(current) = &existing {
            if current.account != record.account || current.share() != record.share() {
                return Err(DriverError::VolumeConflict {
                    name: name.to_owned(),
                    share: current.share().to_owned(),
                    account: current.account.clone(),
                });
            }
            debug!("volume already recorded; refreshing options");
            record.created_at = current.created_at;
        }

        self.ensure_share(record.share()).await?;
        self.store
            .put(name, &record)
            .map_err(|err| DriverError::MetadataWriteFailed(err.to_string()))
    }

    async fn mount_locked(&self, name: &str) -> Result<Utf8PathBuf, DriverError> {
        check_name(name)?;
        let path = self.mountpoint(name);
        create_mountpoint(&path).await?;

        let record = self.load(name)?;
        if record.account != self.settings.credentials.name {
            return Err(DriverError::ForeignVolume {
                account: record.account,
            });
        }

        let bind = self
            .mounter
            .bind(&self.settings.credentials, &record.options, &path);
        match self.bounded(bind).await {
            Ok(Ok(())) => {
                info!(share = record.share(), path = %path, "mounted azure file share");
                Ok(path)
            }
            Ok(Err(err)) => Err(DriverError::MountFailed(err.to_string())),
            Err(elapsed) => Err(DriverError::MountFailed(elapsed)),
        }
    }

    async fn unmount_locked(&self, name: &str) -> Result<(), DriverError> {
        check_name(name)?;
        let path = self.mountpoint(name);
        match self.bounded(self.mounter.unbind(&path)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(DriverError::UnmountFailed(err.to_string())),
            Err(elapsed) => return Err(DriverError::UnmountFailed(elapsed)),
        }
        remove_mountpoint(&path).await
    }

    async fn remove_locked(&self, name: &str) -> Result<(), DriverError> {
        check_name(name)?;
        let record = self.load(name)?;
        let share = record.share();

        if self.settings.remove_shares {
            match self.bounded(self.shares.delete_if_exists(share)).await {
                Ok(Ok(true)) => info!(share, "removed azure file share"),
                Ok(Ok(false)) => debug!(share, "azure file share already absent"),
                Ok(Err(err)) => return Err(backend_error("removing", share, err.to_string())),
                Err(elapsed) => return Err(backend_error("removing", share, elapsed)),
            }
        } else {
            debug!(share, "not removing share upon volume removal");
        }

        if self.settings.purge_metadata {
            match self.store.delete(name) {
                Ok(()) | Err(MetadataError::NotFound { .. }) => {}
                Err(err) => return Err(DriverError::MetadataDeleteFailed(err.to_string())),
            }
        }
        Ok(())
    }

    fn get_locked(&self, name: &str) -> Result<VolumeInfo, DriverError> {
        check_name(name)?;
        let record = self.load(name)?;
        Ok(VolumeInfo::new(name, self.mountpoint(name), &record))
    }

    fn list_locked(&self) -> Result<Vec<VolumeInfo>, DriverError> {
        let names = self
            .store
            .list()
            .map_err(|err| DriverError::MetadataReadFailed(err.to_string()))?;
        names
            .iter()
            .map(|name| {
                let record = self
                    .store
                    .get(name)
                    .map_err(|err| DriverError::MetadataReadFailed(err.to_string()))?;
                Ok(VolumeInfo::new(name, self.mountpoint(name), &record))
            })
            .collect()
    }

    async fn ensure_share(&self, share: &str) -> Result<(), DriverError> {
        match self.bounded(self.shares.ensure_exists(share)).await {
            Ok(Ok(true)) => {
                info!(share, "created azure file share");
                Ok(())
            }
            Ok(Ok(false)) => {
                debug!(share, "azure file share already exists");
                Ok(())
            }
            Ok(Err(err)) => Err(backend_error("creating", share, err.to_string())),
            Err(elapsed) => Err(backend_error("creating", share, elapsed)),
        }
    }

    fn load(&self, name: &str) -> Result<VolumeMetadata, DriverError> {
        self.store.get(name).map_err(|err| match err {
            MetadataError::NotFound { name: missing } => DriverError::VolumeNotFound { name: missing },
            other => DriverError::MetadataReadFailed(other.to_string()),
        })
    }

    /// Runs `call` under the backend timeout. The outer error is the rendered
    /// timeout message.
    async fn bounded<T>(&self, call: impl Future<Output = T>) -> Result<T, String> {
        let limit = self.settings.backend_timeout;
        timeout(limit, call)
            .await
            .map_err(|_| format!("timed out after {}s", limit.as_secs_f64()))
    }
}

fn check_name(name: &str) -> Result<(), DriverError> {
    validate_volume_name(name).map_err(|err| DriverError::InvalidVolumeName(err.to_string()))
}

fn backend_error(action: &str, share: &str, message: String) -> DriverError {
    DriverError::BackendUnavailable {
        action: action.to_owned(),
        share: share.to_owned(),
        message,
    }
}

async fn create_mountpoint(path: &Utf8Path) -> Result<(), DriverError> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(MOUNTPOINT_MODE);
    builder
        .create(path)
        .await
        .map_err(|err| DriverError::LocalPathUnavailable {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

async fn remove_mountpoint(path: &Utf8Path) -> Result<(), DriverError> {
    match tokio::fs::remove_dir(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(DriverError::CleanupFailed {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

fn log_failure(err: &DriverError) {
    error!("{err}");
}
