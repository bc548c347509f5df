//! Volume records and the mountpoint naming convention.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default permission bits applied to files and directories on the share.
pub const DEFAULT_MODE: u32 = 0o777;

/// Validated creation options for a volume.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VolumeOptions {
    /// Name of the remote file share backing the volume.
    pub share: String,
    /// Permission bits for files on the mounted share.
    #[serde(default = "default_mode")]
    pub file_mode: u32,
    /// Permission bits for directories on the mounted share.
    #[serde(default = "default_mode")]
    pub dir_mode: u32,
    /// Owner applied to every file on the mounted share.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    /// Group applied to every file on the mounted share.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

const fn default_mode() -> u32 {
    DEFAULT_MODE
}

impl VolumeOptions {
    /// Options for `share` with permissive modes and no ownership override.
    #[must_use]
    pub fn for_share(share: impl Into<String>) -> Self {
        Self {
            share: share.into(),
            file_mode: DEFAULT_MODE,
            dir_mode: DEFAULT_MODE,
            uid: None,
            gid: None,
        }
    }
}

/// Durable per-volume record.
///
/// The `(account, share)` pair is fixed when the record is first written.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VolumeMetadata {
    /// Storage account that owns the backing share.
    pub account: String,
    /// UTC timestamp stamped by the create operation.
    pub created_at: DateTime<Utc>,
    /// Normalised creation options.
    pub options: VolumeOptions,
    /// Raw caller-supplied options, kept for inspection.
    #[serde(default)]
    pub raw_options: BTreeMap<String, String>,
}

impl VolumeMetadata {
    /// Name of the backing share.
    #[must_use]
    pub fn share(&self) -> &str {
        &self.options.share
    }
}

/// Raised when a volume name cannot be used as a mountpoint or store key.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VolumeNameError {
    /// The name is empty or only whitespace.
    #[error("volume name must not be empty")]
    Empty,
    /// The name would resolve outside its own directory.
    #[error("volume name '{0}' is not a single path component")]
    NotAComponent(String),
    /// The name starts with a dot, which the metadata store reserves.
    #[error("volume name '{0}' must not start with '.'")]
    LeadingDot(String),
}

/// Checks that `name` maps to exactly one directory below a root.
///
/// # Errors
///
/// Returns [`VolumeNameError`] when the name is empty, is `.` or `..`,
/// contains a path separator or NUL byte, or starts with a dot.
pub fn validate_volume_name(name: &str) -> Result<(), VolumeNameError> {
    if name.trim().is_empty() {
        return Err(VolumeNameError::Empty);
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(VolumeNameError::NotAComponent(name.to_owned()));
    }
    if name.starts_with('.') {
        return Err(VolumeNameError::LeadingDot(name.to_owned()));
    }
    Ok(())
}

/// Maps volume names onto directories below a fixed root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MountLayout {
    root: Utf8PathBuf,
}

impl MountLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory holding every mountpoint.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Mountpoint for `name`. Pure; the volume need not exist.
    #[must_use]
    pub fn path_for(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("data1")]
    #[case("my-volume_2")]
    #[case("with.dots")]
    fn accepts_single_component_names(#[case] name: &str) {
        assert!(validate_volume_name(name).is_ok());
    }

    #[rstest]
    #[case("", VolumeNameError::Empty)]
    #[case("   ", VolumeNameError::Empty)]
    #[case("..", VolumeNameError::NotAComponent(String::from("..")))]
    #[case(".", VolumeNameError::NotAComponent(String::from(".")))]
    #[case("a/b", VolumeNameError::NotAComponent(String::from("a/b")))]
    #[case(".hidden", VolumeNameError::LeadingDot(String::from(".hidden")))]
    fn rejects_names_that_escape_the_root(#[case] name: &str, #[case] expected: VolumeNameError) {
        assert_eq!(validate_volume_name(name), Err(expected));
    }

    #[test]
    fn path_for_joins_root_and_name() {
        let layout = MountLayout::new("/var/run/azurefile");
        assert_eq!(layout.path_for("data1"), "/var/run/azurefile/data1");
        assert_eq!(layout.path_for("data1"), layout.path_for("data1"));
        assert_ne!(layout.path_for("data1"), layout.path_for("data2"));
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let metadata = VolumeMetadata {
            account: String::from("acct"),
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
            options: VolumeOptions::for_share("docshare"),
            raw_options: BTreeMap::from([(String::from("share"), String::from("docshare"))]),
        };
        let json = serde_json::to_string(&metadata).expect("serialise");
        let parsed: VolumeMetadata = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(parsed, metadata);
        assert_eq!(parsed.share(), "docshare");
    }
}
