// SPDX-License-Identifier: AGPL-3.0-or-later
//! Python runtime provisioning
//!
//! Creates the workspace virtualenv once, puts it first on the search path
//! for every later command, and installs the playbook's pip and galaxy
//! requirements into it.

use std::path::PathBuf;

use tracing::info;

use crate::context::Context;
use crate::error::{BootstrapError, Result};
use crate::workspace::{GALAXY_REQUIREMENTS, PIP_REQUIREMENTS};

/// Interpreters tried in order
pub const INTERPRETER_CANDIDATES: [&str; 2] = ["python3.9", "python3"];

/// Find the first available interpreter on PATH
pub fn find_interpreter() -> Result<PathBuf> {
    INTERPRETER_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| BootstrapError::InterpreterNotFound {
            tried: INTERPRETER_CANDIDATES.join(", "),
        })
}

/// Create the virtualenv if needed and install the Python-side dependencies.
///
/// `interpreter` is only consulted when the venv does not exist yet.
/// Returns whether a new venv was created.
pub async fn provision_runtime(
    ctx: &mut Context<'_>,
    interpreter: impl FnOnce() -> Result<PathBuf>,
) -> Result<bool> {
    let venv = ctx.workspace.venv_dir();
    let created = if venv.is_dir() {
        info!(path = %venv.display(), "Reusing existing virtualenv");
        false
    } else {
        let python = interpreter()?;
        info!(python = %python.display(), path = %venv.display(), "Creating virtualenv");
        let create = ctx
            .command(python.to_string_lossy())
            .args(["-m", "venv"])
            .arg(venv.to_string_lossy());
        ctx.runner.run(&create).await?;
        true
    };

    activate(ctx)?;

    let steps = [
        ctx.command("python")
            .args(["-m", "pip", "install", "--upgrade", "pip"]),
        ctx.workspace_command("python")
            .args(["-m", "pip", "install", "-r", PIP_REQUIREMENTS]),
    ];
    for step in &steps {
        ctx.runner.run(step).await?;
    }

    Ok(created)
}

/// Install the roles and collections the playbook depends on
pub async fn install_galaxy_requirements(ctx: &Context<'_>) -> Result<()> {
    info!("Installing ansible-galaxy requirements");
    let galaxy = ctx
        .workspace_command("ansible-galaxy")
        .args(["install", "--force", "-r", GALAXY_REQUIREMENTS]);
    ctx.runner.run(&galaxy).await
}

/// Point `VIRTUAL_ENV` at the venv and put its `bin` first on PATH
fn activate(ctx: &mut Context<'_>) -> Result<()> {
    let venv = ctx.workspace.venv_dir();
    ctx.env.set("VIRTUAL_ENV", venv.to_string_lossy());
    ctx.env.prepend_path(&ctx.workspace.venv_bin())
}
