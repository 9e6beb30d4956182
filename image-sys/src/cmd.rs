// SPDX-License-Identifier: GPL-3.0-only

//! External command execution

use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, SysError};

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub fn render(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, args.join(" "))
    }
}

/// Runs host commands on behalf of the mount code
pub trait CommandRunner: Send + Sync {
    /// Execute `command` and report its outcome whatever the exit status.
    ///
    /// Only a failure to start the process is an error.
    fn execute(&self, command: &str, args: &[String]) -> Result<CommandOutcome>;

    /// Execute `command`, treating a non-zero exit status as an error
    fn run(&self, command: &str, args: &[String]) -> Result<CommandOutcome> {
        let outcome = self.execute(command, args)?;
        if !outcome.success() {
            return Err(SysError::CommandFailed {
                command: outcome.command,
                exit_code: outcome.exit_code,
                stderr: outcome.stderr,
            });
        }
        Ok(outcome)
    }

    /// Block between retries of a failed command
    fn backoff(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// [`CommandRunner`] backed by `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommand;

impl CommandRunner for SystemCommand {
    fn execute(&self, command: &str, args: &[String]) -> Result<CommandOutcome> {
        let rendered = render(command, args);
        debug!("Running {}", rendered);

        let output =
            Command::new(command)
                .args(args)
                .output()
                .map_err(|error| SysError::CommandSpawn {
                    command: rendered.clone(),
                    reason: error.to_string(),
                })?;

        Ok(CommandOutcome {
            command: rendered,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        })
    }
}
