// SPDX-License-Identifier: AGPL-3.0-or-later
//! Secret sealing and playbook launch

use tracing::info;

use crate::context::Context;
use crate::error::Result;
use crate::prompt::{confirm, Prompter};
use crate::workspace::PLAYBOOK_FILE;

/// What the operator chose at the final prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchDecision {
    /// The playbook ran to completion
    Ran,
    /// The operator will run it later
    Declined,
}

/// Encrypt `secret.yml`, then offer to run the playbook
pub async fn seal_and_launch(ctx: &Context<'_>, prompter: &mut dyn Prompter) -> Result<LaunchDecision> {
    let secret = ctx.workspace.secret_file();
    info!(path = %secret.display(), "Encrypting secrets");
    let encrypt = ctx
        .command("ansible-vault")
        .arg("encrypt")
        .arg(secret.to_string_lossy());
    ctx.runner.run(&encrypt).await?;

    if !confirm(prompter, "Would you like to run the playbook now? [y/N]: ")? {
        prompter.say("You can run the playbook by executing the bootstrap again:");
        prompter.say(&format!("cd {} && bootstrap", ctx.workspace.root().display()));
        return Ok(LaunchDecision::Declined);
    }

    let mut playbook = ctx
        .workspace_command("ansible-playbook")
        .arg("--ask-vault-pass");
    if ctx.elevation.is_required() {
        prompter.say("Please enter your current sudo password now");
        playbook = playbook.arg("-K");
    }
    ctx.runner.run(&playbook.arg(PLAYBOOK_FILE)).await?;

    Ok(LaunchDecision::Ran)
}
