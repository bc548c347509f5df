//! Docker volume plugin transport.
//!
//! Exposes a [`VolumeDriver`] over the plugin protocol: JSON `POST`
//! requests on a Unix socket, one endpoint per lifecycle operation.
//! Failures answer with HTTP 500 and the lifecycle error's message in
//! `Err`.

use std::future::Future;
use std::io;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{debug, info};

use crate::driver::{DriverError, VolumeDriver};
use crate::metadata::MetadataStore;
use crate::mount::MountBackend;
use crate::share::ShareService;

mod types;

pub use types::{
    ActivateResponse, Capabilities, CapabilitiesResponse, CreateRequest, ErrResponse, GetResponse,
    ListResponse, MountpointResponse, NameRequest, VolumeDescription,
};

/// Scope advertised through `/VolumeDriver.Capabilities`.
pub const VOLUME_SCOPE: &str = "local";

/// Errors answered to the plugin host.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PluginError {
    /// The lifecycle operation failed.
    #[error(transparent)]
    Driver(#[from] DriverError),
    /// The request body was not valid JSON for the endpoint.
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

impl IntoResponse for PluginError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Driver(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ErrResponse {
                err: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Errors raised while binding or running the plugin socket.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ServeError {
    /// The socket directory could not be prepared.
    #[error("could not prepare socket directory {path}: {message}")]
    SocketDirectory {
        /// Directory that failed.
        path: Utf8PathBuf,
        /// OS error message.
        message: String,
    },
    /// A stale socket could not be removed.
    #[error("could not remove stale socket {path}: {message}")]
    StaleSocket {
        /// Socket path.
        path: Utf8PathBuf,
        /// OS error message.
        message: String,
    },
    /// Binding the listener failed.
    #[error("could not listen on {path}: {message}")]
    Bind {
        /// Socket path.
        path: Utf8PathBuf,
        /// OS error message.
        message: String,
    },
    /// The server stopped with an I/O error.
    #[error("plugin server failed: {0}")]
    Server(String),
}

type SharedDriver<S, M, D> = Arc<VolumeDriver<S, M, D>>;

/// Builds the plugin protocol router around `driver`.
pub fn router<S, M, D>(driver: SharedDriver<S, M, D>) -> Router
where
    S: ShareService + 'static,
    M: MountBackend + 'static,
    D: MetadataStore + 'static,
{
    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/VolumeDriver.Capabilities", post(capabilities))
        .route("/VolumeDriver.Create", post(create::<S, M, D>))
        .route("/VolumeDriver.Remove", post(remove::<S, M, D>))
        .route("/VolumeDriver.Mount", post(mount::<S, M, D>))
        .route("/VolumeDriver.Path", post(path::<S, M, D>))
        .route("/VolumeDriver.Unmount", post(unmount::<S, M, D>))
        .route("/VolumeDriver.Get", post(get::<S, M, D>))
        .route("/VolumeDriver.List", post(list::<S, M, D>))
        .with_state(driver)
}

/// Serves the plugin protocol on `socket_path` until `shutdown` resolves.
///
/// A socket file left behind by a previous run is replaced, and the
/// socket is removed again on a clean shutdown.
///
/// # Errors
///
/// Returns [`ServeError`] when the socket cannot be prepared or bound, or
/// when the server fails while running.
pub async fn serve<S, M, D>(
    driver: SharedDriver<S, M, D>,
    socket_path: &Utf8Path,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServeError>
where
    S: ShareService + 'static,
    M: MountBackend + 'static,
    D: MetadataStore + 'static,
{
    if let Some(parent) = socket_path.parent().filter(|dir| !dir.as_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| ServeError::SocketDirectory {
                path: parent.to_path_buf(),
                message: err.to_string(),
            })?;
    }
    match tokio::fs::remove_file(socket_path).await {
        Ok(()) => debug!(socket = %socket_path, "removed stale plugin socket"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(ServeError::StaleSocket {
                path: socket_path.to_path_buf(),
                message: err.to_string(),
            });
        }
    }

    let listener = UnixListener::bind(socket_path).map_err(|err| ServeError::Bind {
        path: socket_path.to_path_buf(),
        message: err.to_string(),
    })?;
    info!(socket = %socket_path, "volume plugin listening");

    axum::serve(listener, router(driver))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| ServeError::Server(err.to_string()))?;

    if let Err(err) = tokio::fs::remove_file(socket_path).await {
        debug!(socket = %socket_path, error = %err, "plugin socket already gone");
    }
    info!("volume plugin stopped");
    Ok(())
}

/// Parses a request body. Docker sends no body for some endpoints, so an
/// empty body decodes as the default value.
fn decode<T>(body: &Bytes) -> Result<T, PluginError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| PluginError::MalformedRequest(err.to_string()))
}

async fn activate() -> Json<ActivateResponse> {
    Json(ActivateResponse {
        implements: vec![String::from("VolumeDriver")],
    })
}

async fn capabilities() -> Json<CapabilitiesResponse> {
    Json(CapabilitiesResponse {
        capabilities: Capabilities {
            scope: String::from(VOLUME_SCOPE),
        },
    })
}

async fn create<S, M, D>(
    State(driver): State<SharedDriver<S, M, D>>,
    body: Bytes,
) -> Result<Json<ErrResponse>, PluginError>
where
    S: ShareService,
    M: MountBackend,
    D: MetadataStore,
{
    let request: CreateRequest = decode(&body)?;
    let options = request.opts.unwrap_or_default();
    driver.create(&request.name, &options).await?;
    Ok(Json(ErrResponse::default()))
}

async fn remove<S, M, D>(
    State(driver): State<SharedDriver<S, M, D>>,
    body: Bytes,
) -> Result<Json<ErrResponse>, PluginError>
where
    S: ShareService,
    M: MountBackend,
    D: MetadataStore,
{
    let request: NameRequest = decode(&body)?;
    driver.remove(&request.name).await?;
    Ok(Json(ErrResponse::default()))
}

async fn mount<S, M, D>(
    State(driver): State<SharedDriver<S, M, D>>,
    body: Bytes,
) -> Result<Json<MountpointResponse>, PluginError>
where
    S: ShareService,
    M: MountBackend,
    D: MetadataStore,
{
    let request: NameRequest = decode(&body)?;
    let mountpoint = driver.mount(&request.name).await?;
    Ok(Json(MountpointResponse {
        mountpoint: mountpoint.into_string(),
        err: String::new(),
    }))
}

async fn path<S, M, D>(
    State(driver): State<SharedDriver<S, M, D>>,
    body: Bytes,
) -> Result<Json<MountpointResponse>, PluginError>
where
    S: ShareService,
    M: MountBackend,
    D: MetadataStore,
{
    let request: NameRequest = decode(&body)?;
    let mountpoint = driver.path(&request.name).await;
    Ok(Json(MountpointResponse {
        mountpoint: mountpoint.into_string(),
        err: String::new(),
    }))
}

async fn unmount<S, M, D>(
    State(driver): State<SharedDriver<S, M, D>>,
    body: Bytes,
) -> Result<Json<ErrResponse>, PluginError>
where
    S: ShareService,
    M: MountBackend,
    D: MetadataStore,
{
    let request: NameRequest = decode(&body)?;
    driver.unmount(&request.name).await?;
    Ok(Json(ErrResponse::default()))
}

async fn get<S, M, D>(
    State(driver): State<SharedDriver<S, M, D>>,
    body: Bytes,
) -> Result<Json<GetResponse>, PluginError>
where
    S: ShareService,
    M: MountBackend,
    D: MetadataStore,
{
    let request: NameRequest = decode(&body)?;
    let info = driver.get(&request.name).await?;
    Ok(Json(GetResponse {
        volume: Some(info.into()),
        err: String::new(),
    }))
}

async fn list<S, M, D>(
    State(driver): State<SharedDriver<S, M, D>>,
) -> Result<Json<ListResponse>, PluginError>
where
    S: ShareService,
    M: MountBackend,
    D: MetadataStore,
{
    let volumes = driver.list().await?;
    Ok(Json(ListResponse {
        volumes: volumes.into_iter().map(VolumeDescription::from).collect(),
        err: String::new(),
    }))
}
