// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration management for Kea-Bootstrap
//!
//! Every constant the bootstrap run depends on (upstream repository,
//! endpoints, timeouts, certificate contact) lives here with a default, so a
//! missing `bootstrap.toml` reproduces the stock behaviour.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BootstrapError, Result};

/// Main configuration structure for the bootstrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Version of the configuration format
    #[serde(default = "default_version")]
    pub version: String,

    /// Playbook workspace configuration
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Network probe configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Certificate dry-run configuration
    #[serde(default)]
    pub certificate: CertificateConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the playbook lives and where it comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace directory; `~/ansible-vpn` when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Upstream playbook repository
    #[serde(default = "default_repo_url")]
    pub repo_url: String,
}

/// Endpoints and timeouts for the soft network probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Cloud metadata endpoint used for instance detection
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,

    /// Public IP lookup service
    #[serde(default = "default_public_ip_url")]
    pub public_ip_url: String,

    /// Timeout for the metadata probe in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Timeout for public IP and DNS lookups in seconds
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,
}

/// Certificate dry-run parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateConfig {
    /// Contact address handed to the issuer
    #[serde(default = "default_contact_email")]
    pub contact_email: String,

    /// Domain used for the dry run, which happens before the real domain is known
    #[serde(default = "default_placeholder_domain")]
    pub placeholder_domain: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when neither --verbose nor --debug is given
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dir: None,
            repo_url: default_repo_url(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            metadata_url: default_metadata_url(),
            public_ip_url: default_public_ip_url(),
            probe_timeout_secs: default_probe_timeout(),
            lookup_timeout_secs: default_lookup_timeout(),
        }
    }
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            contact_email: default_contact_email(),
            placeholder_domain: default_placeholder_domain(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace: WorkspaceConfig::default(),
            network: NetworkConfig::default(),
            certificate: CertificateConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BootstrapError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.workspace.repo_url.trim().is_empty() {
            return Err(BootstrapError::InvalidConfig {
                message: "workspace.repo_url cannot be empty".to_string(),
            });
        }

        if self.network.probe_timeout_secs == 0 || self.network.lookup_timeout_secs == 0 {
            return Err(BootstrapError::InvalidConfig {
                message: "network timeouts must be greater than zero".to_string(),
            });
        }

        if !self.certificate.contact_email.contains('@') {
            return Err(BootstrapError::InvalidConfig {
                message: format!(
                    "certificate.contact_email is not an e-mail address: {}",
                    self.certificate.contact_email
                ),
            });
        }

        if self.certificate.placeholder_domain.is_empty() {
            return Err(BootstrapError::InvalidConfig {
                message: "certificate.placeholder_domain cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Resolve the workspace directory, defaulting to `$HOME/ansible-vpn`
    pub fn workspace_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.workspace.dir {
            return Ok(dir.clone());
        }

        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .ok_or(BootstrapError::HomeNotFound)?;
        Ok(PathBuf::from(home).join(DEFAULT_WORKSPACE_NAME))
    }
}

impl NetworkConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

/// Directory name of the workspace under the home directory
pub const DEFAULT_WORKSPACE_NAME: &str = "ansible-vpn";

/// Commented default file written by `bootstrap init`
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# SPDX-License-Identifier: AGPL-3.0-or-later
# Kea-Bootstrap Configuration

version = "1.0"

[workspace]
# dir = "/home/user/ansible-vpn"
repo_url = "https://github.com/notthebee/ansible-vpn"

[network]
metadata_url = "http://169.254.169.254/latest/meta-data/ami-id"
public_ip_url = "https://api.ipify.org"
probe_timeout_secs = 5
lookup_timeout_secs = 10

[certificate]
contact_email = "root@localhost.com"
placeholder_domain = "example.com"

[logging]
level = "warn"
"#;

// Default value functions

fn default_version() -> String {
    "1.0".to_string()
}

fn default_repo_url() -> String {
    "https://github.com/notthebee/ansible-vpn".to_string()
}

fn default_metadata_url() -> String {
    "http://169.254.169.254/latest/meta-data/ami-id".to_string()
}

fn default_public_ip_url() -> String {
    "https://api.ipify.org".to_string()
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_lookup_timeout() -> u64 {
    10
}

fn default_contact_email() -> String {
    "root@localhost.com".to_string()
}

fn default_placeholder_domain() -> String {
    "example.com".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}
