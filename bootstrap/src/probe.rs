// SPDX-License-Identifier: AGPL-3.0-or-later
//! Host environment probing
//!
//! Determines what kind of host we are running on (distribution family,
//! architecture), whether commands need `sudo`, and a few soft network facts.
//! Nothing here is fatal: unknown values degrade to "unsupported" or `None`.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::config::{Config, NetworkConfig};

const OS_RELEASE_PATHS: [&str; 2] = ["/etc/os-release", "/usr/lib/os-release"];

/// Raw `uname(2)` fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Uname {
    pub sysname: String,
    pub nodename: String,
    pub release: String,
    pub version: String,
    pub machine: String,
}

impl Uname {
    /// Read the running kernel's identification
    pub fn current() -> Self {
        match nix::sys::utsname::uname() {
            Ok(uts) => Self {
                sysname: uts.sysname().to_string_lossy().into_owned(),
                nodename: uts.nodename().to_string_lossy().into_owned(),
                release: uts.release().to_string_lossy().into_owned(),
                version: uts.version().to_string_lossy().into_owned(),
                machine: uts.machine().to_string_lossy().into_owned(),
            },
            Err(e) => {
                debug!(error = %e, "uname failed");
                Self {
                    sysname: std::env::consts::OS.to_string(),
                    machine: std::env::consts::ARCH.to_string(),
                    ..Self::default()
                }
            }
        }
    }
}

/// Description of the host operating system, read once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsDescriptor {
    /// Kernel name, e.g. `Linux`
    pub system: String,
    /// Kernel release
    pub release: String,
    /// Kernel version string
    pub version: String,
    /// Machine architecture, e.g. `x86_64` or `aarch64`
    pub machine: String,
    /// Distribution identifier (`ID` in os-release), e.g. `ubuntu`
    pub platform: String,
    /// Distribution version (`VERSION_ID` in os-release), e.g. `9.3`
    pub version_id: String,
    /// The untouched uname tuple
    pub uname: Uname,
}

impl OsDescriptor {
    /// Probe the running host
    pub fn detect() -> Self {
        let os_release = OS_RELEASE_PATHS
            .iter()
            .find_map(|path| std::fs::read_to_string(path).ok())
            .unwrap_or_default();
        Self::from_parts(Uname::current(), &os_release)
    }

    /// Build a descriptor from a uname tuple and os-release contents
    pub fn from_parts(uname: Uname, os_release: &str) -> Self {
        let fields = parse_os_release(os_release);
        Self {
            system: uname.sysname.clone(),
            release: uname.release.clone(),
            version: uname.version.clone(),
            machine: uname.machine.clone(),
            platform: fields.get("ID").cloned().unwrap_or_default(),
            version_id: fields.get("VERSION_ID").cloned().unwrap_or_default(),
            uname,
        }
    }

    pub fn family(&self) -> PlatformFamily {
        PlatformFamily::from_platform(&self.platform)
    }

    /// Major version of the distribution, if it has a numeric one
    pub fn major_version(&self) -> Option<u32> {
        self.version_id.split('.').next()?.trim().parse().ok()
    }

    pub fn is_arm64(&self) -> bool {
        self.machine == "aarch64"
    }
}

/// Parse `KEY=value` lines of an os-release file, unquoting values
pub fn parse_os_release(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Package-management family of the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    /// Debian and Ubuntu (apt)
    Debian,
    /// CentOS, Rocky, AlmaLinux and Fedora (dnf)
    Rpm,
    /// Anything else; nothing gets installed
    Unsupported,
}

impl PlatformFamily {
    /// Classify a distribution identifier, ignoring case
    pub fn from_platform(platform: &str) -> Self {
        match platform.to_lowercase().as_str() {
            "debian" | "ubuntu" => Self::Debian,
            "centos" | "rocky" | "almalinux" | "fedora" => Self::Rpm,
            _ => Self::Unsupported,
        }
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debian => "debian",
            Self::Rpm => "rpm",
            Self::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// How privileged commands must be launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Elevation {
    /// Already running as root
    None,
    /// Prefix commands with `sudo -E`, adding `-H` when `set_home` is set
    Sudo { set_home: bool },
}

impl Elevation {
    /// Decide from the effective UID and whether extra CLI arguments were given
    pub fn detect(has_extra_args: bool) -> Self {
        Self::for_user(nix::unistd::Uid::effective().is_root(), has_extra_args)
    }

    pub fn for_user(is_root: bool, has_extra_args: bool) -> Self {
        if is_root {
            Self::None
        } else {
            Self::Sudo {
                set_home: has_extra_args,
            }
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Self::Sudo { .. })
    }

    /// Command prefix, empty when no elevation is needed
    pub fn prefix(&self) -> Vec<&'static str> {
        match self {
            Self::None => Vec::new(),
            Self::Sudo {
                set_home: false,
            } => vec!["sudo", "-E"],
            Self::Sudo {
                set_home: true,
            } => vec!["sudo", "-E", "-H"],
        }
    }
}

impl fmt::Display for Elevation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none (running as root)"),
            Self::Sudo { .. } => f.write_str(&self.prefix().join(" ")),
        }
    }
}

fn http_client(timeout: Duration) -> Option<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| debug!(error = %e, "Failed to build HTTP client"))
        .ok()
}

/// Whether the cloud metadata endpoint answers at all
pub async fn is_cloud_instance(network: &NetworkConfig) -> bool {
    let Some(client) = http_client(network.probe_timeout()) else {
        return false;
    };

    match client.get(&network.metadata_url).send().await {
        Ok(_) => true,
        Err(e) => {
            debug!(url = %network.metadata_url, error = %e, "Metadata endpoint not reachable");
            false
        }
    }
}

/// Public address of this host as seen by the lookup service
pub async fn public_ip(network: &NetworkConfig) -> Option<String> {
    let client = http_client(network.lookup_timeout())?;

    let response = client
        .get(&network.public_ip_url)
        .send()
        .await
        .map_err(|e| debug!(url = %network.public_ip_url, error = %e, "Public IP lookup failed"))
        .ok()?;
    let body = response.text().await.ok()?;
    let ip = body.trim();

    if ip.is_empty() {
        None
    } else {
        Some(ip.to_string())
    }
}

/// First IPv4 address `domain` resolves to
pub async fn resolve_domain(domain: &str, timeout: Duration) -> Option<IpAddr> {
    match tokio::time::timeout(timeout, tokio::net::lookup_host((domain, 0))).await {
        Ok(Ok(addrs)) => addrs.map(|addr| addr.ip()).find(IpAddr::is_ipv4),
        Ok(Err(e)) => {
            debug!(domain = %domain, error = %e, "DNS resolution failed");
            None
        }
        Err(_) => {
            debug!(domain = %domain, "DNS resolution timed out");
            None
        }
    }
}

/// Everything `bootstrap probe` reports
#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub os: OsDescriptor,
    pub family: PlatformFamily,
    pub elevation: Elevation,
    pub cloud_instance: bool,
    pub public_ip: Option<String>,
}

impl HostReport {
    pub async fn gather(config: &Config, has_extra_args: bool) -> Self {
        let os = OsDescriptor::detect();
        Self {
            family: os.family(),
            elevation: Elevation::detect(has_extra_args),
            cloud_instance: is_cloud_instance(&config.network).await,
            public_ip: public_ip(&config.network).await,
            os,
        }
    }
}
