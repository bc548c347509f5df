//! Remote file share management.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

mod azure;
mod signing;

pub use azure::{AzureFileShares, DEFAULT_API_VERSION};

/// Errors raised by share services.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ShareError {
    /// The service could not be reached or the response was unreadable.
    #[error("share service request failed: {message}")]
    Transport {
        /// Transport error message.
        message: String,
    },
    /// The service answered with an unexpected status.
    #[error("share service rejected {action} of '{share}' with status {status}: {message}")]
    Rejected {
        /// Operation attempted (`create` or `delete`).
        action: String,
        /// Share the request targeted.
        share: String,
        /// HTTP status code.
        status: u16,
        /// Response body returned by the service.
        message: String,
    },
    /// Account credentials are unusable.
    #[error("invalid storage credentials: {0}")]
    Credentials(String),
}

/// Future returned by [`ShareService`] operations.
pub type ShareFuture<'a> = Pin<Box<dyn Future<Output = Result<bool, ShareError>> + Send + 'a>>;

/// Idempotent management of remote shares.
pub trait ShareService: Send + Sync {
    /// Creates `share` if it does not exist. Resolves to `true` when the
    /// share was created by this call.
    fn ensure_exists<'a>(&'a self, share: &'a str) -> ShareFuture<'a>;

    /// Deletes `share` if it exists. Resolves to `true` when the share was
    /// deleted by this call.
    fn delete_if_exists<'a>(&'a self, share: &'a str) -> ShareFuture<'a>;
}
