// SPDX-License-Identifier: AGPL-3.0-or-later
//! System package preparation
//!
//! One [`SystemPreparer`] per platform family. The family is decided once by
//! the prober; unsupported platforms get a preparer that installs nothing.

use std::fmt;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::Context;
use crate::error::Result;
use crate::probe::{OsDescriptor, PlatformFamily};
use crate::runner::Invocation;

const DEBIAN_PACKAGES: &[&str] = &[
    "sudo",
    "software-properties-common",
    "dnsutils",
    "curl",
    "git",
    "locales",
    "rsync",
    "apparmor",
    "python3",
    "python3-setuptools",
    "python3-apt",
    "python3-venv",
    "python3-pip",
    "aptitude",
    "direnv",
    "iptables",
];

const DEBIAN_ARM64_PACKAGES: &[&str] = &["gcc", "python3-dev", "libffi-dev", "libssl-dev", "make"];

const RPM_BASE_PACKAGES: &[&str] = &[
    "sudo",
    "bind-utils",
    "curl",
    "git",
    "rsync",
    "https://kojipkgs.fedoraproject.org//vol/fedora_koji_archive02/packages/direnv/2.12.2/1.fc28/x86_64/direnv-2.12.2-1.fc28.x86_64.rpm",
];

const RPM_EL9_PACKAGES: &[&str] = &["python3", "python3-setuptools", "python3-pip", "python3-firewall"];

const RPM_LEGACY_PACKAGES: &[&str] = &[
    "python39",
    "python39-setuptools",
    "python39-pip",
    "python3-firewall",
    "kmod-wireguard",
    "https://ftp.gwdg.de/pub/linux/elrepo/elrepo/el8/x86_64/RPMS/kmod-wireguard-1.0.20220627-4.el8_7.elrepo.x86_64.rpm",
];

const APT_FORCE_OPTIONS: [&str; 3] = ["-o", "Dpkg::Options::=--force-confold", "-fuy"];

/// A package by repository name or by direct package-file URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Package {
    Name(String),
    Url(String),
}

impl Package {
    pub fn parse(spec: &str) -> Self {
        if spec.starts_with("https://") || spec.starts_with("http://") {
            Self::Url(spec.to_string())
        } else {
            Self::Name(spec.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Name(s) | Self::Url(s) => s,
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered list of packages handed to a single install command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageList {
    packages: Vec<Package>,
}

impl PackageList {
    pub fn from_specs(specs: &[&str]) -> Self {
        let mut list = Self::default();
        list.extend(specs);
        list
    }

    pub fn extend(&mut self, specs: &[&str]) {
        self.packages.extend(specs.iter().map(|s| Package::parse(s)));
    }

    /// Base packages for apt hosts
    pub fn debian() -> Self {
        Self::from_specs(DEBIAN_PACKAGES)
    }

    /// Extra build dependencies needed on 64-bit ARM
    pub fn debian_arm64() -> Self {
        Self::from_specs(DEBIAN_ARM64_PACKAGES)
    }

    /// Packages for dnf hosts; EL9 ships a newer Python triplet
    pub fn rpm(major_version: Option<u32>) -> Self {
        let mut list = Self::from_specs(RPM_BASE_PACKAGES);
        if major_version == Some(9) {
            list.extend(RPM_EL9_PACKAGES);
        } else {
            list.extend(RPM_LEGACY_PACKAGES);
        }
        list
    }

    pub fn to_args(&self) -> Vec<String> {
        self.packages.iter().map(|p| p.as_str().to_string()).collect()
    }
}

/// Installs the baseline packages for one platform family
#[async_trait]
pub trait SystemPreparer: Send + Sync {
    async fn prepare(&self, ctx: &mut Context<'_>) -> Result<()>;
}

/// Select the preparer matching the host
pub fn preparer_for(os: &OsDescriptor) -> Box<dyn SystemPreparer> {
    match os.family() {
        PlatformFamily::Debian => Box::new(DebianPreparer {
            arm64: os.is_arm64(),
        }),
        PlatformFamily::Rpm => Box::new(RpmPreparer {
            major_version: os.major_version(),
        }),
        PlatformFamily::Unsupported => Box::new(UnsupportedPreparer {
            platform: os.platform.clone(),
        }),
    }
}

/// apt-based hosts (Debian, Ubuntu)
#[derive(Debug)]
pub struct DebianPreparer {
    pub arm64: bool,
}

#[async_trait]
impl SystemPreparer for DebianPreparer {
    async fn prepare(&self, ctx: &mut Context<'_>) -> Result<()> {
        let packages = PackageList::debian().to_args();
        info!(packages = packages.len(), arm64 = self.arm64, "Installing apt dependencies");

        let env = ctx.env.scoped("DEBIAN_FRONTEND", "noninteractive");
        let apt_get = |action: &str| {
            Invocation::new("apt-get")
                .args(APT_FORCE_OPTIONS)
                .arg(action)
                .envs(&env)
                .elevated(&ctx.elevation)
        };

        let steps = [
            Invocation::new("apt")
                .args(["update", "-y"])
                .envs(&env)
                .elevated(&ctx.elevation),
            apt_get("dist-upgrade"),
            apt_get("install").args(packages),
            apt_get("autoremove"),
        ];
        for step in &steps {
            ctx.runner.run(step).await?;
        }

        if self.arm64 {
            let arm = Invocation::new("apt")
                .args(["install", "-fuy"])
                .args(PackageList::debian_arm64().to_args())
                .envs(&env)
                .elevated(&ctx.elevation);
            ctx.runner.run(&arm).await?;
        }

        Ok(())
    }
}

/// dnf-based hosts (CentOS, Rocky, AlmaLinux, Fedora)
#[derive(Debug)]
pub struct RpmPreparer {
    pub major_version: Option<u32>,
}

#[async_trait]
impl SystemPreparer for RpmPreparer {
    async fn prepare(&self, ctx: &mut Context<'_>) -> Result<()> {
        let packages = PackageList::rpm(self.major_version).to_args();
        info!(
            packages = packages.len(),
            major_version = ?self.major_version,
            "Installing dnf dependencies"
        );

        let steps = [
            ctx.command("dnf").args(["update", "-y"]),
            ctx.command("dnf").args(["install", "-y", "epel-release"]),
            ctx.command("dnf").args(["install", "-y"]).args(packages),
        ];
        for step in steps {
            ctx.runner.run(&step.elevated(&ctx.elevation)).await?;
        }

        Ok(())
    }
}

/// Platforms we do not know how to prepare
#[derive(Debug)]
pub struct UnsupportedPreparer {
    pub platform: String,
}

#[async_trait]
impl SystemPreparer for UnsupportedPreparer {
    async fn prepare(&self, _ctx: &mut Context<'_>) -> Result<()> {
        warn!(
            platform = %self.platform,
            "Unsupported platform, skipping package installation"
        );
        Ok(())
    }
}
