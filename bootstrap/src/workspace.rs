// SPDX-License-Identifier: AGPL-3.0-or-later
//! Playbook workspace layout

use std::path::{Path, PathBuf};

/// Interpreter environment directory, relative to the workspace
pub const VENV_DIR: &str = ".venv";
/// Plaintext user configuration; its presence marks a re-run
pub const CUSTOM_FILE: &str = "custom.yml";
/// Secrets, encrypted with ansible-vault before the first playbook run
pub const SECRET_FILE: &str = "secret.yml";
/// Playbook entry point
pub const PLAYBOOK_FILE: &str = "run.yml";
/// pip requirements shipped with the playbook
pub const PIP_REQUIREMENTS: &str = "requirements.txt";
/// ansible-galaxy requirements shipped with the playbook
pub const GALAXY_REQUIREMENTS: &str = "requirements.yml";

/// The local checkout of the playbook and everything generated inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a checkout is already present
    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.root.join(VENV_DIR)
    }

    pub fn venv_bin(&self) -> PathBuf {
        self.venv_dir().join("bin")
    }

    /// certbot as installed into the workspace venv, relative to the root
    pub fn certbot(&self) -> String {
        format!("{}/bin/certbot", VENV_DIR)
    }

    pub fn custom_file(&self) -> PathBuf {
        self.root.join(CUSTOM_FILE)
    }

    pub fn secret_file(&self) -> PathBuf {
        self.root.join(SECRET_FILE)
    }

    /// A previous run (or the user) already wrote `custom.yml`
    pub fn is_configured(&self) -> bool {
        self.custom_file().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths() {
        let workspace = Workspace::new("/home/user/ansible-vpn");
        assert_eq!(workspace.venv_dir(), PathBuf::from("/home/user/ansible-vpn/.venv"));
        assert_eq!(workspace.venv_bin(), PathBuf::from("/home/user/ansible-vpn/.venv/bin"));
        assert_eq!(workspace.custom_file(), PathBuf::from("/home/user/ansible-vpn/custom.yml"));
        assert_eq!(workspace.secret_file(), PathBuf::from("/home/user/ansible-vpn/secret.yml"));
        assert_eq!(workspace.certbot(), ".venv/bin/certbot");
    }

    #[test]
    fn test_is_configured() {
        let temp_dir = tempdir().unwrap();
        let workspace = Workspace::new(temp_dir.path());
        assert!(workspace.exists());
        assert!(!workspace.is_configured());

        std::fs::write(workspace.custom_file(), "username: \"kea\"\n").unwrap();
        assert!(workspace.is_configured());
    }

    #[test]
    fn test_missing_workspace() {
        let workspace = Workspace::new("/nonexistent/ansible-vpn");
        assert!(!workspace.exists());
        assert!(!workspace.is_configured());
    }
}
