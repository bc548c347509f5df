//! CIFS mount and unmount invocation for Azure File shares.
//!
//! The mount helper is shelled out rather than calling `mount(2)` directly:
//! `mount.cifs` resolves the host name and rewrites the option string before
//! it reaches the kernel.

use std::ffi::OsString;
use std::future::Future;
use std::pin::Pin;

use camino::Utf8Path;
use shell_escape::unix::escape;
use thiserror::Error;

use crate::command::{CommandOutput, CommandRunner, ProcessCommandRunner};
use crate::volume::VolumeOptions;

/// SMB protocol version requested from the server.
pub const SMB_VERSION: &str = "3.0";

/// Domain suffix for Azure File endpoints.
pub const FILE_ENDPOINT_SUFFIX: &str = "file.core.windows.net";

const REDACTED: &str = "<redacted>";

/// Storage account name and key used to authenticate the mount.
#[derive(Clone, Eq, PartialEq)]
pub struct AccountCredentials {
    /// Storage account name.
    pub name: String,
    /// Base64 encoded storage account key.
    pub key: String,
}

impl AccountCredentials {
    /// Creates credentials from an account name and key.
    #[must_use]
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AccountCredentials")
            .field("name", &self.name)
            .field("key", &REDACTED)
            .finish()
    }
}

/// Errors raised while binding or unbinding a share.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MountError {
    /// The mount or unmount helper could not be started.
    #[error("failed to run {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// OS error message.
        message: String,
    },
    /// The helper exited unsuccessfully.
    #[error("{program} exited with status {status_text}\ncommand: {command}\noutput={output:?}")]
    CommandFailure {
        /// Program that failed.
        program: String,
        /// Rendered invocation with secrets redacted.
        command: String,
        /// Human readable exit status.
        status_text: String,
        /// Combined stdout and stderr.
        output: String,
    },
}

/// Future returned by [`MountBackend`] operations.
pub type MountFuture<'a> = Pin<Box<dyn Future<Output = Result<(), MountError>> + Send + 'a>>;

/// Binds and unbinds remote shares at local paths.
pub trait MountBackend: Send + Sync {
    /// Mounts `options.share` from the credentials' account at `path`.
    fn bind<'a>(
        &'a self,
        credentials: &'a AccountCredentials,
        options: &'a VolumeOptions,
        path: &'a Utf8Path,
    ) -> MountFuture<'a>;

    /// Unmounts whatever is bound at `path`.
    fn unbind<'a>(&'a self, path: &'a Utf8Path) -> MountFuture<'a>;
}

/// Mount backend that invokes `mount -t cifs` and `umount`.
#[derive(Clone, Debug)]
pub struct CifsMounter<R: CommandRunner> {
    runner: R,
    mount_bin: String,
    umount_bin: String,
}

impl CifsMounter<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    #[must_use]
    pub fn with_process_runner() -> Self {
        Self::new(ProcessCommandRunner)
    }
}

impl<R: CommandRunner> CifsMounter<R> {
    /// Creates a mounter using the system `mount` and `umount` binaries.
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            mount_bin: String::from("mount"),
            umount_bin: String::from("umount"),
        }
    }

    /// Overrides the binaries used for mounting and unmounting.
    #[must_use]
    pub fn with_binaries(mut self, mount_bin: impl Into<String>, umount_bin: impl Into<String>) -> Self {
        self.mount_bin = mount_bin.into();
        self.umount_bin = umount_bin.into();
        self
    }

    async fn invoke(&self, program: &str, args: Vec<OsString>, secret: Option<&str>) -> Result<(), MountError> {
        let output = self
            .runner
            .run(program, &args)
            .await
            .map_err(|err| MountError::Spawn {
                program: err.program,
                message: err.message,
            })?;
        if output.is_success() {
            return Ok(());
        }
        Err(command_failure(program, &args, &output, secret))
    }
}

impl<R: CommandRunner> MountBackend for CifsMounter<R> {
    fn bind<'a>(
        &'a self,
        credentials: &'a AccountCredentials,
        options: &'a VolumeOptions,
        path: &'a Utf8Path,
    ) -> MountFuture<'a> {
        Box::pin(async move {
            let args = mount_args(credentials, options, path);
            self.invoke(&self.mount_bin, args, Some(&credentials.key)).await
        })
    }

    fn unbind<'a>(&'a self, path: &'a Utf8Path) -> MountFuture<'a> {
        Box::pin(async move {
            let args = vec![OsString::from(path.as_str())];
            self.invoke(&self.umount_bin, args, None).await
        })
    }
}

/// UNC source for a share, e.g. `//acct.file.core.windows.net/docs`.
#[must_use]
pub fn share_source(account: &str, share: &str) -> String {
    format!("//{account}.{FILE_ENDPOINT_SUFFIX}/{share}")
}

/// Comma-separated `-o` option string for `mount.cifs`.
#[must_use]
pub fn mount_option_string(credentials: &AccountCredentials, options: &VolumeOptions) -> String {
    let mut rendered = format!(
        "vers={SMB_VERSION},username={},password={},dir_mode={:04o},file_mode={:04o}",
        credentials.name, credentials.key, options.dir_mode, options.file_mode
    );
    if let Some(uid) = options.uid {
        rendered.push_str(&format!(",uid={uid}"));
    }
    if let Some(gid) = options.gid {
        rendered.push_str(&format!(",gid={gid}"));
    }
    rendered
}

fn mount_args(credentials: &AccountCredentials, options: &VolumeOptions, path: &Utf8Path) -> Vec<OsString> {
    vec![
        OsString::from("-t"),
        OsString::from("cifs"),
        OsString::from(share_source(&credentials.name, &options.share)),
        OsString::from(path.as_str()),
        OsString::from("-o"),
        OsString::from(mount_option_string(credentials, options)),
        OsString::from("--verbose"),
    ]
}

fn command_failure(
    program: &str,
    args: &[OsString],
    output: &CommandOutput,
    secret: Option<&str>,
) -> MountError {
    MountError::CommandFailure {
        program: program.to_owned(),
        command: redact(&render_command(program, args), secret),
        status_text: output.status_text(),
        output: redact(&output.combined(), secret),
    }
}

fn render_command(program: &str, args: &[OsString]) -> String {
    let mut rendered = String::from(program);
    for arg in args {
        rendered.push(' ');
        let lossy = arg.to_string_lossy().into_owned();
        rendered.push_str(escape(lossy.into()).as_ref());
    }
    rendered
}

fn redact(text: &str, secret: Option<&str>) -> String {
    match secret {
        Some(value) if !value.is_empty() => text.replace(value, REDACTED),
        _ => text.to_owned(),
    }
}
