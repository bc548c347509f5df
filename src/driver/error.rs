//! Error taxonomy for volume lifecycle operations.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors returned by [`super::VolumeDriver`] operations.
///
/// The rendered message is what the plugin transport hands back to the
/// container host, so each variant reads as a complete sentence fragment.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DriverError {
    /// Creation options were rejected by the metadata store.
    #[error("error validating metadata: {0}")]
    InvalidOptions(String),
    /// The volume name cannot be mapped to a single mountpoint directory.
    #[error("invalid volume name: {0}")]
    InvalidVolumeName(String),
    /// A volume with this name already exists with a different backing share.
    #[error("volume '{name}' already exists for share '{share}' on account '{account}'")]
    VolumeConflict {
        /// Volume name.
        name: String,
        /// Share recorded for the existing volume.
        share: String,
        /// Account recorded for the existing volume.
        account: String,
    },
    /// The remote share service failed or timed out.
    #[error("error {action} azure file share '{share}': {message}")]
    BackendUnavailable {
        /// Share operation in progress (`creating` or `removing`).
        action: String,
        /// Share being managed.
        share: String,
        /// Underlying failure.
        message: String,
    },
    /// Persisting the metadata record failed.
    #[error("error saving metadata: {0}")]
    MetadataWriteFailed(String),
    /// Reading the metadata record failed for a reason other than absence.
    #[error("could not fetch metadata: {0}")]
    MetadataReadFailed(String),
    /// Deleting the metadata record failed.
    #[error("error removing metadata: {0}")]
    MetadataDeleteFailed(String),
    /// No metadata record exists for the volume.
    #[error("could not fetch metadata: volume '{name}' not found")]
    VolumeNotFound {
        /// Volume name that was looked up.
        name: String,
    },
    /// The local mountpoint directory could not be created.
    #[error("could not create mount point {path}: {message}")]
    LocalPathUnavailable {
        /// Mountpoint path.
        path: Utf8PathBuf,
        /// OS error message.
        message: String,
    },
    /// The volume was created from a different storage account.
    #[error("volume hosted on a different account ('{account}') cannot mount")]
    ForeignVolume {
        /// Account recorded in the volume's metadata.
        account: String,
    },
    /// Binding the share failed or timed out.
    #[error("mount failed: {0}")]
    MountFailed(String),
    /// Unbinding the share failed or timed out.
    #[error("unmount failed: {0}")]
    UnmountFailed(String),
    /// The mountpoint directory could not be removed after unbinding.
    #[error("error removing mountpoint {path}: {message}")]
    CleanupFailed {
        /// Mountpoint path.
        path: Utf8PathBuf,
        /// OS error message.
        message: String,
    },
}
