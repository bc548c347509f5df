//! Azure Files REST client for share creation and deletion.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::signing::ShareRequest;
use super::{ShareError, ShareFuture, ShareService};
use crate::mount::{AccountCredentials, FILE_ENDPOINT_SUFFIX};

/// Storage service version sent with every request.
pub const DEFAULT_API_VERSION: &str = "2019-02-02";

const UNREADABLE_BODY: &str = "<unreadable body>";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ShareAction {
    Create,
    Delete,
}

impl ShareAction {
    const fn method(self) -> &'static str {
        match self {
            Self::Create => "PUT",
            Self::Delete => "DELETE",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }

    /// Maps a response status to "changed by this call", "already in the
    /// desired state", or `None` for anything unexpected.
    fn interpret(self, status: StatusCode) -> Option<bool> {
        match (self, status.as_u16()) {
            (Self::Create, 201) | (Self::Delete, 202) => Some(true),
            (Self::Create, 409) | (Self::Delete, 404) => Some(false),
            _ => None,
        }
    }
}

/// Share service backed by the Azure Files REST API.
#[derive(Clone, Debug)]
pub struct AzureFileShares {
    credentials: AccountCredentials,
    endpoint: String,
    api_version: String,
}

impl AzureFileShares {
    /// Creates a client for the account's public file endpoint.
    #[must_use]
    pub fn new(credentials: AccountCredentials) -> Self {
        let endpoint = format!("https://{}.{FILE_ENDPOINT_SUFFIX}", credentials.name);
        Self::with_endpoint(credentials, endpoint)
    }

    /// Creates a client that talks to `endpoint` instead of the public
    /// service, e.g. a storage emulator.
    #[must_use]
    pub fn with_endpoint(credentials: AccountCredentials, endpoint: impl Into<String>) -> Self {
        Self {
            credentials,
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
            api_version: String::from(DEFAULT_API_VERSION),
        }
    }

    fn share_url(&self, share: &str) -> String {
        format!("{}/{share}?restype=share", self.endpoint)
    }

    async fn send(&self, action: ShareAction, share: &str) -> Result<bool, ShareError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let authorization = ShareRequest {
            verb: action.method(),
            account: &self.credentials.name,
            share,
            date: &date,
            version: &self.api_version,
        }
        .authorization(&self.credentials.key)?;

        let method = match action {
            ShareAction::Create => Method::PUT,
            ShareAction::Delete => Method::DELETE,
        };
        let response = HTTP_CLIENT
            .request(method, self.share_url(share))
            .header("x-ms-date", &date)
            .header("x-ms-version", &self.api_version)
            .header("Authorization", authorization)
            .send()
            .await
            .map_err(|err| ShareError::Transport {
                message: err.to_string(),
            })?;

        let status = response.status();
        if let Some(changed) = action.interpret(status) {
            return Ok(changed);
        }

        let message = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                debug!(share, error = %err, "could not read share service response body");
                String::from(UNREADABLE_BODY)
            }
        };
        Err(ShareError::Rejected {
            action: String::from(action.label()),
            share: share.to_owned(),
            status: status.as_u16(),
            message,
        })
    }
}

impl ShareService for AzureFileShares {
    fn ensure_exists<'a>(&'a self, share: &'a str) -> ShareFuture<'a> {
        Box::pin(self.send(ShareAction::Create, share))
    }

    fn delete_if_exists<'a>(&'a self, share: &'a str) -> ShareFuture<'a> {
        Box::pin(self.send(ShareAction::Delete, share))
    }
}
