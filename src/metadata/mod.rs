//! Durable per-volume metadata keyed by volume name.
//!
//! [`FileMetadataStore`] keeps one JSON document per volume below a root
//! directory. Writes land in a temporary sibling first and are renamed into
//! place, so a reader never observes a half-written record.

use std::collections::{BTreeMap, HashMap};
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::volume::VolumeMetadata;

mod options;

pub use options::{OPTION_DIR_MODE, OPTION_FILE_MODE, OPTION_GID, OPTION_SHARE, OPTION_UID};

const RECORD_EXTENSION: &str = "json";

/// Errors raised by metadata stores.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MetadataError {
    /// Creation options were rejected.
    #[error("{0}")]
    InvalidOptions(String),
    /// No record exists for the volume.
    #[error("volume '{name}' not found")]
    NotFound {
        /// Volume name that was looked up.
        name: String,
    },
    /// File system access failed.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// A stored record could not be decoded or encoded.
    #[error("malformed metadata in {path}: {message}")]
    Malformed {
        /// Path of the offending record.
        path: Utf8PathBuf,
        /// Decoder error message.
        message: String,
    },
}

/// Validates creation options and persists volume records.
pub trait MetadataStore: Send + Sync {
    /// Turns raw creation options into a metadata record.
    ///
    /// The returned record carries an empty `account` and the current time;
    /// the caller stamps both before persisting.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::InvalidOptions`] for unknown keys, a missing
    /// or empty `share`, or malformed values.
    fn validate(&self, options: &HashMap<String, String>) -> Result<VolumeMetadata, MetadataError> {
        validate_options(options)
    }

    /// Stores `record` under `name`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] when the record cannot be written.
    fn put(&self, name: &str, record: &VolumeMetadata) -> Result<(), MetadataError>;

    /// Loads the record stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::NotFound`] when no record exists.
    fn get(&self, name: &str) -> Result<VolumeMetadata, MetadataError>;

    /// Returns every stored volume name, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Io`] when the store cannot be enumerated.
    fn list(&self) -> Result<Vec<String>, MetadataError>;

    /// Deletes the record stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::NotFound`] when no record exists.
    fn delete(&self, name: &str) -> Result<(), MetadataError>;
}

/// Shared option validation used by every store.
///
/// # Errors
///
/// Returns [`MetadataError::InvalidOptions`] describing the first problem.
pub fn validate_options(options: &HashMap<String, String>) -> Result<VolumeMetadata, MetadataError> {
    let parsed = options::parse(options).map_err(MetadataError::InvalidOptions)?;
    Ok(VolumeMetadata {
        account: String::new(),
        created_at: Utc::now(),
        options: parsed,
        raw_options: options
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<BTreeMap<_, _>>(),
    })
}

/// Stores volume records as JSON files in a directory.
#[derive(Debug)]
pub struct FileMetadataStore {
    root: Utf8PathBuf,
    dir: Dir,
}

impl FileMetadataStore {
    /// Opens (creating if needed) the store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Io`] when the directory cannot be created or
    /// opened.
    pub fn open(root_path: impl Into<Utf8PathBuf>) -> Result<Self, MetadataError> {
        let root = root_path.into();
        Dir::create_ambient_dir_all(&root, ambient_authority()).map_err(|err| io_error(&root, &err))?;
        let dir = Dir::open_ambient_dir(&root, ambient_authority()).map_err(|err| io_error(&root, &err))?;
        Ok(Self { root, dir })
    }

    /// Directory holding the records.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn record_path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(record_file_name(name))
    }
}

impl MetadataStore for FileMetadataStore {
    fn put(&self, name: &str, record: &VolumeMetadata) -> Result<(), MetadataError> {
        let file_name = record_file_name(name);
        let path = self.record_path(name);
        let rendered = serde_json::to_vec_pretty(record).map_err(|err| MetadataError::Malformed {
            path: path.clone(),
            message: err.to_string(),
        })?;

        let staging = format!(".{file_name}.{}.tmp", Uuid::new_v4().simple());
        self.dir
            .write(&staging, rendered)
            .map_err(|err| io_error(&self.root.join(&staging), &err))?;
        if let Err(err) = self.dir.rename(&staging, &self.dir, &file_name) {
            self.dir.remove_file(&staging).ok();
            return Err(io_error(&path, &err));
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Result<VolumeMetadata, MetadataError> {
        let path = self.record_path(name);
        let contents = match self.dir.read(record_file_name(name)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(MetadataError::NotFound {
                    name: name.to_owned(),
                });
            }
            Err(err) => return Err(io_error(&path, &err)),
        };
        serde_json::from_slice(&contents).map_err(|err| MetadataError::Malformed {
            path,
            message: err.to_string(),
        })
    }

    fn list(&self) -> Result<Vec<String>, MetadataError> {
        let entries = self.dir.entries().map_err(|err| io_error(&self.root, &err))?;
        let mut names = Vec::new();
        for entry in entries {
            let dir_entry = entry.map_err(|err| io_error(&self.root, &err))?;
            let file_name = dir_entry.file_name().map_err(|err| io_error(&self.root, &err))?;
            if file_name.starts_with('.') {
                continue;
            }
            let file_path = Utf8Path::new(&file_name);
            if file_path.extension() != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = file_path.file_stem() {
                names.push(stem.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<(), MetadataError> {
        match self.dir.remove_file(record_file_name(name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(MetadataError::NotFound {
                name: name.to_owned(),
            }),
            Err(err) => Err(io_error(&self.record_path(name), &err)),
        }
    }
}

fn record_file_name(name: &str) -> String {
    format!("{name}.{RECORD_EXTENSION}")
}

fn io_error(path: &Utf8Path, err: &io::Error) -> MetadataError {
    MetadataError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests;
