// SPDX-License-Identifier: AGPL-3.0-or-later
//! State shared by the bootstrap stages

use crate::probe::Elevation;
use crate::runner::{CommandRunner, EnvOverlay, Invocation};
use crate::workspace::Workspace;

/// What every stage needs to reach the host
pub struct Context<'a> {
    /// Executes external commands
    pub runner: &'a dyn CommandRunner,
    /// Where the playbook lives
    pub workspace: Workspace,
    /// How privileged commands are launched
    pub elevation: Elevation,
    /// Variables applied to every child; the venv stage extends it
    pub env: EnvOverlay,
}

impl<'a> Context<'a> {
    pub fn new(runner: &'a dyn CommandRunner, workspace: Workspace, elevation: Elevation) -> Self {
        Self {
            runner,
            workspace,
            elevation,
            env: EnvOverlay::new(),
        }
    }

    /// An invocation carrying the current overlay
    pub fn command(&self, program: impl Into<String>) -> Invocation {
        Invocation::new(program).envs(&self.env)
    }

    /// Like [`Context::command`], run from the workspace root
    pub fn workspace_command(&self, program: impl Into<String>) -> Invocation {
        self.command(program).current_dir(self.workspace.root())
    }
}
