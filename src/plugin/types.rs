//! Wire types for the Docker volume plugin protocol.
//!
//! Field names follow the protocol's `PascalCase` JSON keys.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::driver::VolumeInfo;

/// Body of `/VolumeDriver.Create`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRequest {
    /// Volume name.
    pub name: String,
    /// Driver options passed with `docker volume create -o`.
    #[serde(default)]
    pub opts: Option<HashMap<String, String>>,
}

/// Body of the requests that only name a volume.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct NameRequest {
    /// Volume name.
    pub name: String,
    /// Caller identifier sent with mount and unmount.
    #[serde(default, rename = "ID")]
    pub id: Option<String>,
}

/// Response carrying only the error field.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrResponse {
    /// Empty on success.
    #[serde(rename = "Err")]
    pub err: String,
}

/// Response of `/VolumeDriver.Mount` and `/VolumeDriver.Path`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountpointResponse {
    /// Local directory backing the volume.
    pub mountpoint: String,
    /// Empty on success.
    pub err: String,
}

/// Volume as described by `Get` and `List`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeDescription {
    /// Volume name.
    pub name: String,
    /// Local directory backing the volume.
    pub mountpoint: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Driver specific details.
    pub status: BTreeMap<String, String>,
}

impl From<VolumeInfo> for VolumeDescription {
    fn from(info: VolumeInfo) -> Self {
        Self {
            name: info.name,
            mountpoint: info.mountpoint.into_string(),
            created_at: info.created_at.to_rfc3339(),
            status: BTreeMap::from([
                (String::from("account"), info.account),
                (String::from("share"), info.share),
            ]),
        }
    }
}

/// Response of `/VolumeDriver.Get`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetResponse {
    /// The requested volume.
    pub volume: Option<VolumeDescription>,
    /// Empty on success.
    pub err: String,
}

/// Response of `/VolumeDriver.List`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListResponse {
    /// Every stored volume.
    pub volumes: Vec<VolumeDescription>,
    /// Empty on success.
    pub err: String,
}

/// Response of `/Plugin.Activate`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    /// Plugin subsystems implemented.
    pub implements: Vec<String>,
}

/// Response of `/VolumeDriver.Capabilities`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    /// Advertised capabilities.
    pub capabilities: Capabilities,
}

/// Volume scope advertised to the host.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Capabilities {
    /// `local`: volumes are tracked per host.
    pub scope: String,
}
