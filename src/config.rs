//! Configuration loading via `ortho-config`.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::driver::DriverSettings;
use crate::mount::AccountCredentials;

/// Driver configuration derived from defaults, configuration files,
/// environment variables, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "AZFILE",
    discovery(
        app_name = "azfile-driver",
        env_var = "AZFILE_CONFIG_PATH",
        config_file_name = "azfile-driver.toml",
        dotfile_name = ".azfile-driver.toml",
        project_file_name = "azfile-driver.toml"
    )
)]
pub struct DriverConfig {
    /// Storage account hosting the file shares. Required.
    pub account_name: String,
    /// Base64 encoded storage account key. Required.
    pub account_key: String,
    /// Directory below which volumes are mounted.
    #[ortho_config(default = "/var/run/docker/volumes/azurefile".to_owned())]
    pub mount_root: String,
    /// Directory holding per-volume metadata records.
    #[ortho_config(default = "/etc/docker/plugins/azurefile/volumes".to_owned())]
    pub metadata_root: String,
    /// Unix socket the plugin listens on.
    #[ortho_config(default = "/run/docker/plugins/azurefile.sock".to_owned())]
    pub socket_path: String,
    /// Delete the backing share when a volume is removed.
    #[ortho_config(default = false)]
    pub remove_shares: bool,
    /// Delete the metadata record when a volume is removed.
    #[ortho_config(default = false)]
    pub purge_metadata: bool,
    /// Upper bound, in seconds, for each share, mount, or unmount call.
    #[ortho_config(default = 60)]
    pub backend_timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl DriverConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to azfile-driver.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("azfile-driver")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidTimeout`] when the timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.account_name,
            &FieldMetadata::new("storage account name", "AZFILE_ACCOUNT_NAME", "account_name"),
        )?;
        Self::require_field(
            &self.account_key,
            &FieldMetadata::new("storage account key", "AZFILE_ACCOUNT_KEY", "account_key"),
        )?;
        Self::require_field(
            &self.mount_root,
            &FieldMetadata::new("mount root", "AZFILE_MOUNT_ROOT", "mount_root"),
        )?;
        Self::require_field(
            &self.metadata_root,
            &FieldMetadata::new("metadata root", "AZFILE_METADATA_ROOT", "metadata_root"),
        )?;
        Self::require_field(
            &self.socket_path,
            &FieldMetadata::new("plugin socket path", "AZFILE_SOCKET_PATH", "socket_path"),
        )?;
        if self.backend_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Storage account credentials.
    #[must_use]
    pub fn credentials(&self) -> AccountCredentials {
        AccountCredentials::new(self.account_name.trim(), self.account_key.trim())
    }

    /// Immutable settings injected into the lifecycle manager.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn driver_settings(&self) -> Result<DriverSettings, ConfigError> {
        self.validate()?;
        Ok(DriverSettings {
            credentials: self.credentials(),
            mount_root: Utf8PathBuf::from(self.mount_root.trim()),
            remove_shares: self.remove_shares,
            purge_metadata: self.purge_metadata,
            backend_timeout: Duration::from_secs(self.backend_timeout_secs),
        })
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Raised when the backend timeout is zero.
    #[error("backend_timeout_secs must be greater than zero")]
    InvalidTimeout,
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn valid_config() -> DriverConfig {
        DriverConfig {
            account_name: String::from("acct"),
            account_key: String::from("c2VjcmV0LWtleQ=="),
            mount_root: String::from("/var/run/docker/volumes/azurefile"),
            metadata_root: String::from("/etc/docker/plugins/azurefile/volumes"),
            socket_path: String::from("/run/docker/plugins/azurefile.sock"),
            remove_shares: false,
            purge_metadata: false,
            backend_timeout_secs: 60,
        }
    }

    #[rstest]
    #[case("AZFILE_ACCOUNT_NAME", "account_name")]
    #[case("AZFILE_ACCOUNT_KEY", "account_key")]
    fn missing_credentials_produce_actionable_errors(
        valid_config: DriverConfig,
        #[case] env_var: &str,
        #[case] toml_key: &str,
    ) {
        let mut cfg = valid_config;
        if toml_key == "account_name" {
            cfg.account_name = String::from("  ");
        } else {
            cfg.account_key = String::new();
        }

        let Err(ConfigError::MissingField(message)) = cfg.validate() else {
            panic!("expected MissingField error");
        };
        assert!(message.contains(env_var), "{message}");
        assert!(message.contains(toml_key), "{message}");
        assert!(message.contains("azfile-driver.toml"), "{message}");
    }

    #[rstest]
    fn zero_timeout_is_rejected(valid_config: DriverConfig) {
        let cfg = DriverConfig {
            backend_timeout_secs: 0,
            ..valid_config
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidTimeout));
    }

    #[rstest]
    fn driver_settings_carry_policy_and_credentials(valid_config: DriverConfig) {
        let cfg = DriverConfig {
            remove_shares: true,
            backend_timeout_secs: 5,
            ..valid_config
        };

        let settings = cfg.driver_settings().expect("valid settings");

        assert_eq!(settings.credentials, AccountCredentials::new("acct", "c2VjcmV0LWtleQ=="));
        assert_eq!(settings.mount_root, "/var/run/docker/volumes/azurefile");
        assert!(settings.remove_shares);
        assert!(!settings.purge_metadata);
        assert_eq!(settings.backend_timeout, Duration::from_secs(5));
    }
}
