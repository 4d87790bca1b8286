// SPDX-License-Identifier: AGPL-3.0-or-later
//! External command invocation
//!
//! Every collaborator (apt, dnf, git, pip, certbot, ansible-*) is reached
//! through an [`Invocation`] handed to a [`CommandRunner`]. Environment
//! changes never touch the process environment: they live in an
//! [`EnvOverlay`] that is applied to each child.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{BootstrapError, Result};
use crate::probe::Elevation;

/// Environment variables applied on top of the inherited environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Put `dir` in front of the search path seen by children.
    ///
    /// Starts from the overlay's own `PATH` if one was set, otherwise from the
    /// inherited one.
    pub fn prepend_path(&mut self, dir: &Path) -> Result<()> {
        let current: OsString = match self.vars.get("PATH") {
            Some(path) => OsString::from(path),
            None => std::env::var_os("PATH").unwrap_or_default(),
        };

        let mut entries = vec![dir.to_path_buf()];
        entries.extend(std::env::split_paths(&current));

        let joined = std::env::join_paths(entries).map_err(|e| BootstrapError::InvalidConfig {
            message: format!("cannot add {} to PATH: {}", dir.display(), e),
        })?;
        self.set("PATH", joined.to_string_lossy().into_owned());
        Ok(())
    }

    /// Set `key` until the returned guard is dropped.
    ///
    /// The previous value (or absence) is restored on drop, including when the
    /// scope is left through `?`.
    pub fn scoped(&mut self, key: impl Into<String>, value: impl Into<String>) -> ScopedVar<'_> {
        let key = key.into();
        let previous = self.vars.insert(key.clone(), value.into());
        ScopedVar {
            overlay: self,
            key,
            previous,
        }
    }
}

/// Guard returned by [`EnvOverlay::scoped`]
pub struct ScopedVar<'a> {
    overlay: &'a mut EnvOverlay,
    key: String,
    previous: Option<String>,
}

impl Deref for ScopedVar<'_> {
    type Target = EnvOverlay;

    fn deref(&self) -> &EnvOverlay {
        &*self.overlay
    }
}

impl Drop for ScopedVar<'_> {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => {
                self.overlay.vars.insert(self.key.clone(), value);
            }
            None => {
                self.overlay.vars.remove(&self.key);
            }
        }
    }
}

/// A single external command, fully described before it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Apply every variable of `overlay` to this command
    pub fn envs(mut self, overlay: &EnvOverlay) -> Self {
        self.env
            .extend(overlay.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }

    /// Wrap the command in the privilege-elevation prefix, if any
    pub fn elevated(mut self, elevation: &Elevation) -> Self {
        let prefix = elevation.prefix();
        if let Some((sudo, flags)) = prefix.split_first() {
            let mut args: Vec<String> = flags.iter().map(|f| f.to_string()).collect();
            args.push(std::mem::take(&mut self.program));
            args.append(&mut self.args);
            self.program = sudo.to_string();
            self.args = args;
        }
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// True when `arg` is one of the arguments
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Something that can execute an [`Invocation`]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion; a non-zero exit is an error
    async fn run(&self, invocation: &Invocation) -> Result<()>;
}

/// Runs commands on the host with inherited stdio
///
/// Stdio is inherited because several collaborators (`ansible-playbook
/// --ask-vault-pass`, `sudo`) read from the terminal themselves.
pub struct SystemRunner {
    /// Whether to run in dry-run mode (no actual execution)
    dry_run: bool,
}

impl SystemRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<()> {
        if self.dry_run {
            println!("[DRY RUN] Would execute: {}", invocation);
            return Ok(());
        }

        info!(command = %invocation, cwd = ?invocation.cwd(), "Executing command");

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);

        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        command.stdin(Stdio::inherit());
        command.stdout(Stdio::inherit());
        command.stderr(Stdio::inherit());

        let status = command.status().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BootstrapError::CommandNotFound {
                    command: invocation.program.clone(),
                }
            } else {
                BootstrapError::IoError(e)
            }
        })?;

        if status.success() {
            debug!(command = %invocation.program, "Command completed successfully");
            Ok(())
        } else {
            Err(BootstrapError::CommandFailed {
                command: invocation.to_string(),
                status: status.to_string(),
            })
        }
    }
}

/// Records invocations instead of running them
///
/// Any invocation whose command line contains one of the configured failure
/// patterns is recorded and then reported as failed.
#[derive(Default)]
pub struct RecordingRunner {
    invocations: Mutex<Vec<Invocation>>,
    failures: Vec<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every invocation whose command line contains `pattern`
    pub fn failing_on(mut self, pattern: impl Into<String>) -> Self {
        self.failures.push(pattern.into());
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Command lines of everything recorded so far
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<()> {
        let line = invocation.to_string();
        if let Ok(mut calls) = self.invocations.lock() {
            calls.push(invocation.clone());
        }

        if self.failures.iter().any(|p| line.contains(p.as_str())) {
            return Err(BootstrapError::CommandFailed {
                command: line,
                status: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scoped_var_released_on_drop() {
        let mut overlay = EnvOverlay::new();
        {
            let scoped = overlay.scoped("DEBIAN_FRONTEND", "noninteractive");
            assert_eq!(scoped.get("DEBIAN_FRONTEND"), Some("noninteractive"));
        }
        assert_eq!(overlay.get("DEBIAN_FRONTEND"), None);
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_scoped_var_restores_previous_value() {
        let mut overlay = EnvOverlay::new();
        overlay.set("LANG", "C");
        {
            let scoped = overlay.scoped("LANG", "en_US.UTF-8");
            assert_eq!(scoped.get("LANG"), Some("en_US.UTF-8"));
        }
        assert_eq!(overlay.get("LANG"), Some("C"));
    }

    #[test]
    fn test_scoped_var_released_on_early_return() {
        fn failing_step(overlay: &mut EnvOverlay) -> Result<()> {
            let _scoped = overlay.scoped("DEBIAN_FRONTEND", "noninteractive");
            Err(BootstrapError::HomeNotFound)
        }

        let mut overlay = EnvOverlay::new();
        assert!(failing_step(&mut overlay).is_err());
        assert_eq!(overlay.get("DEBIAN_FRONTEND"), None);
    }

    #[test]
    fn test_prepend_path_twice() {
        let mut overlay = EnvOverlay::new();
        overlay.set("PATH", "/usr/bin");
        overlay.prepend_path(Path::new("/opt/a")).unwrap();
        overlay.prepend_path(Path::new("/opt/b")).unwrap();
        assert_eq!(overlay.get("PATH"), Some("/opt/b:/opt/a:/usr/bin"));
    }

    #[test]
    fn test_invocation_elevated_sudo() {
        let invocation = Invocation::new("apt")
            .args(["update", "-y"])
            .elevated(&Elevation::Sudo {
                set_home: false,
            });
        assert_eq!(invocation.to_string(), "sudo -E apt update -y");

        let invocation = Invocation::new("apt").elevated(&Elevation::Sudo {
            set_home: true,
        });
        assert_eq!(invocation.to_string(), "sudo -E -H apt");
    }

    #[test]
    fn test_invocation_elevated_root_is_unchanged() {
        let invocation = Invocation::new("dnf").arg("update").elevated(&Elevation::None);
        assert_eq!(invocation.program(), "dnf");
        assert_eq!(invocation.to_string(), "dnf update");
    }

    #[test]
    fn test_invocation_env_from_overlay() {
        let mut overlay = EnvOverlay::new();
        overlay.set("VIRTUAL_ENV", "/ws/.venv");
        let invocation = Invocation::new("python").envs(&overlay);
        assert_eq!(invocation.env_var("VIRTUAL_ENV"), Some("/ws/.venv"));
        assert_eq!(invocation.env_var("PATH"), None);
    }

    #[tokio::test]
    async fn test_system_runner_success() {
        let runner = SystemRunner::new(false);
        assert!(runner.run(&Invocation::new("true")).await.is_ok());
    }

    #[tokio::test]
    async fn test_system_runner_failure_is_fatal() {
        let runner = SystemRunner::new(false);
        let err = runner.run(&Invocation::new("false")).await.unwrap_err();
        assert!(matches!(err, BootstrapError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_system_runner_missing_program() {
        let runner = SystemRunner::new(false);
        let err = runner
            .run(&Invocation::new("definitely-not-a-real-program-kea"))
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::CommandNotFound { .. }));
    }

    #[tokio::test]
    async fn test_system_runner_dry_run_skips_execution() {
        let runner = SystemRunner::new(true);
        assert!(runner.run(&Invocation::new("false")).await.is_ok());
    }

    #[tokio::test]
    async fn test_system_runner_applies_env_and_cwd() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("marker"), "").unwrap();

        let mut overlay = EnvOverlay::new();
        overlay.set("KEA_TEST_VALUE", "bar");

        let invocation = Invocation::new("sh")
            .arg("-c")
            .arg("test \"$KEA_TEST_VALUE\" = bar && test -f marker")
            .current_dir(temp_dir.path())
            .envs(&overlay);

        assert!(SystemRunner::new(false).run(&invocation).await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_runner_failure_pattern() {
        let runner = RecordingRunner::new().failing_on("git pull");
        assert!(runner.run(&Invocation::new("git").arg("status")).await.is_ok());
        assert!(runner.run(&Invocation::new("git").arg("pull")).await.is_err());
        assert_eq!(runner.command_lines(), vec!["git status", "git pull"]);
    }
}
