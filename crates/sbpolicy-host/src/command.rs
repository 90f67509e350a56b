// External command runner shared by service control, firewall reload and
// the privileged install fallback.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::HostError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs programs directly or through `sudo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Runner {
    sudo: bool,
}

impl Runner {
    pub fn new(sudo: bool) -> Self {
        Self { sudo }
    }

    pub fn uses_sudo(self) -> bool {
        self.sudo
    }

    /// Run to completion. A non-zero exit is an error carrying stderr (or
    /// stdout when stderr is empty).
    pub async fn run(self, program: &str, args: &[&str]) -> Result<CommandOutput, HostError> {
        let (program, args) = self.argv(program, args);
        debug!(%program, ?args, "running command");

        let output = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| HostError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        if !output.status.success() {
            return Err(HostError::Command {
                program,
                status: output.status.to_string(),
                output: if stderr.is_empty() { stdout } else { stderr },
            });
        }
        Ok(CommandOutput { stdout, stderr })
    }

    fn argv(self, program: &str, args: &[&str]) -> (String, Vec<String>) {
        let args = args.iter().map(|arg| (*arg).to_owned());
        if self.sudo {
            (
                "sudo".to_owned(),
                std::iter::once(program.to_owned()).chain(args).collect(),
            )
        } else {
            (program.to_owned(), args.collect())
        }
    }
}
