//! The production [`Executor`]: runs commands through the system shell.

use std::time::Duration;

use async_trait::async_trait;
use queuectl_core::Executor;
use tokio::process::Command;

/// Runs `command` via `sh -c`, the same entry point the original
/// implementation used (`subprocess.run(command, shell=True)`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellExecutor;

#[async_trait]
impl Executor for ShellExecutor {
    async fn run(&self, command: &str, timeout: Option<Duration>) -> (i32, String) {
        let spawn = Command::new("sh")
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output();

        let output = match timeout {
            Some(t) => match tokio::time::timeout(t, spawn).await {
                Ok(res) => res,
                Err(_) => return (1, format!("command timed out after {:?}", t)),
            },
            None => spawn.await,
        };

        match output {
            Ok(out) => {
                let code = out.status.code().unwrap_or(1);
                let err = String::from_utf8_lossy(&out.stderr).trim().to_string();
                (code, err)
            }
            Err(e) => (1, format!("spawn failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success_reports_zero() {
        let (code, _) = ShellExecutor.run("true", None).await;
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn failure_reports_nonzero() {
        let (code, _) = ShellExecutor.run("false", None).await;
        assert_ne!(code, 0);
    }

    #[tokio::test]
    async fn stderr_is_captured() {
        let (code, err) = ShellExecutor.run("echo boom 1>&2; exit 3", None).await;
        assert_eq!(code, 3);
        assert!(err.contains("boom"));
    }

    #[tokio::test]
    async fn missing_shell_binary_never_panics() {
        // A command that cannot possibly succeed but still exercises
        // the non-zero path without relying on `sh` itself missing.
        let (code, _) = ShellExecutor.run("exit 17", None).await;
        assert_eq!(code, 17);
    }
}
