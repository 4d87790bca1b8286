// SPDX-License-Identifier: AGPL-3.0-or-later
//! Playbook checkout
//!
//! Clones the upstream playbook on first run and pulls it afterwards. The
//! pull runs with the workspace as its working directory; the bootstrapper's
//! own working directory is left alone.

use tracing::info;

use crate::context::Context;
use crate::error::Result;

/// Which path [`fetch_playbook`] took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAction {
    Cloned,
    Updated,
}

/// Clone `repo_url` into the workspace, or update the existing checkout
pub async fn fetch_playbook(ctx: &Context<'_>, repo_url: &str) -> Result<FetchAction> {
    let root = ctx.workspace.root();

    if ctx.workspace.exists() {
        info!(path = %root.display(), "Updating playbook checkout");
        ctx.runner
            .run(&ctx.workspace_command("git").arg("pull"))
            .await?;
        Ok(FetchAction::Updated)
    } else {
        info!(url = %repo_url, path = %root.display(), "Cloning playbook");
        let clone = ctx
            .command("git")
            .arg("clone")
            .arg(repo_url)
            .arg(root.to_string_lossy());
        ctx.runner.run(&clone).await?;
        Ok(FetchAction::Cloned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Elevation;
    use crate::runner::RecordingRunner;
    use crate::workspace::Workspace;
    use tempfile::tempdir;

    const REPO: &str = "https://github.com/notthebee/ansible-vpn";

    #[tokio::test]
    async fn test_clone_when_workspace_absent() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().join("ansible-vpn");
        let runner = RecordingRunner::new();
        let ctx = Context::new(&runner, Workspace::new(&root), Elevation::None);

        let action = fetch_playbook(&ctx, REPO).await.unwrap();

        assert_eq!(action, FetchAction::Cloned);
        assert_eq!(
            runner.command_lines(),
            vec![format!("git clone {} {}", REPO, root.display())]
        );
    }

    #[tokio::test]
    async fn test_existing_workspace_is_never_recloned() {
        let temp_dir = tempdir().unwrap();
        let runner = RecordingRunner::new();
        let ctx = Context::new(&runner, Workspace::new(temp_dir.path()), Elevation::None);

        assert_eq!(fetch_playbook(&ctx, REPO).await.unwrap(), FetchAction::Updated);
        assert_eq!(fetch_playbook(&ctx, REPO).await.unwrap(), FetchAction::Updated);

        let calls = runner.invocations();
        assert_eq!(calls.len(), 2);
        for call in calls {
            assert_eq!(call.to_string(), "git pull");
            assert_eq!(call.cwd(), Some(temp_dir.path()));
        }
    }

    #[tokio::test]
    async fn test_pull_failure_is_fatal() {
        let temp_dir = tempdir().unwrap();
        let runner = RecordingRunner::new().failing_on("git pull");
        let ctx = Context::new(&runner, Workspace::new(temp_dir.path()), Elevation::None);

        assert!(fetch_playbook(&ctx, REPO).await.is_err());
    }
}
