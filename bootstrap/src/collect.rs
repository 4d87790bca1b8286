// SPDX-License-Identifier: AGPL-3.0-or-later
//! Interactive configuration collection
//!
//! Runs once per workspace. When `custom.yml` already exists the questions
//! are skipped and the playbook is started straight away instead.

use std::fmt;
use std::io::Write;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::Context;
use crate::error::Result;
use crate::prompt::{ask, confirm, Prompter};
use crate::workspace::{Workspace, PLAYBOOK_FILE};

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]*$").unwrap());
static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9.\-]+$").unwrap());

/// Passwords at or above this length are refused
pub const MAX_PASSWORD_LEN: usize = 60;

/// Lowercase letters and digits only; the empty name passes
pub fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

/// Lowercase letters, digits, dots and dashes
pub fn is_valid_domain(domain: &str) -> bool {
    DOMAIN_RE.is_match(domain)
}

/// Answers gathered from the operator
#[derive(Clone, PartialEq, Eq)]
pub struct UserConfiguration {
    pub username: String,
    pub password: String,
    /// AdGuard Home, Unbound and DNS-over-HTTPS
    pub adguard: bool,
    pub domain: String,
}

impl fmt::Debug for UserConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserConfiguration")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("adguard", &self.adguard)
            .field("domain", &self.domain)
            .finish()
    }
}

/// Plaintext variables stored in `custom.yml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomVars {
    pub username: String,
    pub root_host: String,
    pub enable_adguard_unbound_doh: bool,
}

/// Variables stored in `secret.yml`, encrypted before use
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVars {
    pub user_password: String,
}

impl From<&UserConfiguration> for CustomVars {
    fn from(config: &UserConfiguration) -> Self {
        Self {
            username: config.username.clone(),
            root_host: config.domain.clone(),
            enable_adguard_unbound_doh: config.adguard,
        }
    }
}

impl From<&UserConfiguration> for SecretVars {
    fn from(config: &UserConfiguration) -> Self {
        Self {
            user_password: config.password.clone(),
        }
    }
}

/// Result of the collection stage
#[derive(Debug)]
pub enum Collection {
    /// `custom.yml` existed; the playbook has been run directly
    AlreadyConfigured,
    /// Fresh answers, written to the workspace
    Collected(UserConfiguration),
}

/// Collect and persist the configuration, or run the playbook if it exists
pub async fn collect_configuration(
    ctx: &Context<'_>,
    prompter: &mut dyn Prompter,
    dry_run: bool,
) -> Result<Collection> {
    if ctx.workspace.is_configured() {
        prompter.say("custom.yml already exists. Running the playbook...");
        prompter.say("If you want to change something (e.g. username, domain name, etc.)");
        prompter.say("Please edit custom.yml or secret.yml manually, and then re-run this script");

        let playbook = ctx
            .workspace_command("ansible-playbook")
            .args(["--ask-vault-pass", PLAYBOOK_FILE]);
        ctx.runner.run(&playbook).await?;
        return Ok(Collection::AlreadyConfigured);
    }

    prompter.say("Welcome to ansible-vpn!");
    prompter.say("This script is interactive");
    prompter.say("If you prefer to fill in the custom.yml file manually,");
    prompter.say("press [Ctrl+C] to quit this script");

    let config = prompt_user_configuration(prompter)?;

    if dry_run {
        println!(
            "[DRY RUN] Would write {} and {}",
            ctx.workspace.custom_file().display(),
            ctx.workspace.secret_file().display()
        );
    } else {
        persist(&ctx.workspace, &config)?;
    }

    Ok(Collection::Collected(config))
}

/// Ask every question, re-prompting until each answer is valid
pub fn prompt_user_configuration(prompter: &mut dyn Prompter) -> Result<UserConfiguration> {
    let mut username = ask(prompter, "Enter your desired UNIX username", None)?;
    while !is_valid_username(&username) {
        prompter.say("Invalid username");
        prompter.say("Make sure the username only contains lowercase letters and numbers");
        username = ask(prompter, "Username", None)?;
    }

    let mut password = prompter.secret("Enter your user password: ")?;
    while password.chars().count() >= MAX_PASSWORD_LEN {
        prompter.say("The password is too long");
        prompter.say("OpenSSH does not support passwords longer than 72 characters");
        password = prompter.secret("Enter your user password: ")?;
    }

    // The length limit is not re-checked after a mismatch
    let mut confirmation = prompter.secret("Repeat password: ")?;
    while password != confirmation {
        prompter.say("The passwords don't match");
        password = prompter.secret("Enter your user password: ")?;
        confirmation = prompter.secret("Repeat password: ")?;
    }

    let adguard = confirm(
        prompter,
        "Would you like to enable Adguard, Unbound and DNS-over-HTTP for secure DNS resolution \
         with ad blocking functionality? [y/N]: ",
    )?;

    let mut domain = ask(prompter, "Enter your domain name", None)?;
    while !is_valid_domain(&domain) {
        prompter.say("Invalid domain name");
        domain = ask(prompter, "Domain name", None)?;
    }

    Ok(UserConfiguration {
        username,
        password,
        adguard,
        domain,
    })
}

/// Write `secret.yml` and `custom.yml` into the workspace
///
/// `custom.yml` marks the workspace as configured, so it is written last.
pub fn persist(workspace: &Workspace, config: &UserConfiguration) -> Result<()> {
    let secret = serde_yaml::to_string(&SecretVars::from(config))?;
    write_private(&workspace.secret_file(), &secret)?;

    let custom = serde_yaml::to_string(&CustomVars::from(config))?;
    std::fs::write(workspace.custom_file(), custom)?;

    info!(
        custom = %workspace.custom_file().display(),
        secret = %workspace.secret_file().display(),
        "Configuration written"
    );
    Ok(())
}

/// Create or truncate a file readable by the owner only
///
/// `mode` only applies on creation; an existing file is tightened before
/// anything is written to it.
fn write_private(path: &Path, contents: &str) -> Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}
