//! The `default` task: list what can be run.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;

/// Printed before the task table, whether or not the listing succeeded.
pub const HEADER: &str = "\n\tThis default task does nothing but generate this message. \
The available tasks are:\n\n";

const ERROR_NOTICE: &str =
    "An error was likely generated when invoking the task listing in the default task.\n";

const STDERR_NOTICE: &str =
    "Content has been written to the stderr stream when invoking the task listing in the default task.\n";

/// Spawn `lathe --tasks` and print its output under the header.
pub async fn run(config: &Path) -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate the lathe executable")?;

    let mut command = Command::new(exe);
    command.arg("--tasks").arg("--config").arg(config);

    print!("{}", list_tasks(command).await);
    Ok(())
}

/// Run the listing command and build the message to print.
///
/// Never fails: a spawn error, non-zero exit or stderr output add a notice
/// line, and the header is always present.
pub async fn list_tasks(mut command: Command) -> String {
    command.stdin(Stdio::null());

    let (stdout, stderr, failed) = match command.output().await {
        Ok(output) => (
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
            !output.status.success(),
        ),
        Err(e) => {
            tracing::debug!("Task listing could not be spawned: {}", e);
            (String::new(), String::new(), true)
        }
    };

    let mut message = String::new();
    if failed {
        message.push_str(ERROR_NOTICE);
    }
    if !stderr.is_empty() {
        message.push_str(STDERR_NOTICE);
    }
    message.push_str(HEADER);
    message.push_str(&stdout);
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn prints_listing_under_header() {
        let message = list_tasks(shell("echo build")).await;

        assert_eq!(message, format!("{}build\n", HEADER));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_listing_still_prints_header() {
        let message = list_tasks(shell("echo partial; echo oops >&2; exit 3")).await;

        assert!(message.starts_with(ERROR_NOTICE));
        assert!(message.contains(STDERR_NOTICE));
        assert!(message.contains(HEADER));
        assert!(message.ends_with("partial\n"));
    }

    #[tokio::test]
    async fn unspawnable_listing_still_prints_header() {
        let message = list_tasks(Command::new("lathe-definitely-missing-binary")).await;

        assert_eq!(message, format!("{}{}", ERROR_NOTICE, HEADER));
    }
}
