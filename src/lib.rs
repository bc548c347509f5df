//! Core library for the Azure File Docker volume plugin.
//!
//! The crate maps logical volume names to Azure File shares, records
//! ownership metadata on the host, and binds shares to local mountpoints
//! on demand. [`VolumeDriver`] orchestrates the share service, metadata
//! store, and mount backend behind a single lock; the [`plugin`] module
//! serves it over the Docker volume plugin protocol.

pub mod command;
pub mod config;
pub mod driver;
pub mod logging;
pub mod metadata;
pub mod mount;
pub mod plugin;
pub mod share;
pub mod test_support;
pub mod volume;

pub use command::{CommandOutput, CommandRunner, ProcessCommandRunner, SpawnError};
pub use config::{ConfigError, DriverConfig};
pub use driver::{DriverError, DriverSettings, VolumeDriver, VolumeInfo};
pub use metadata::{FileMetadataStore, MetadataError, MetadataStore};
pub use mount::{AccountCredentials, CifsMounter, MountBackend, MountError};
pub use share::{AzureFileShares, ShareError, ShareService};
pub use volume::{MountLayout, VolumeMetadata, VolumeOptions};
