//! Reads the most recent commit of the monitored codebase via git.

use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use vigil_core::ChangeHistoryConfig;
use vigil_llm::ChangeHistory;

/// Failure to read change history from git.
#[derive(Debug, Error)]
pub enum ChangeHistoryError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} exited with {status}: {stderr}")]
    GitFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Load the last commit line and its diff.
///
/// Never fails: when disabled, or when either git command fails, the history
/// is empty and the prompt simply omits the "Recent changes" section.
pub async fn load_change_history(config: &ChangeHistoryConfig) -> ChangeHistory {
    if !config.enabled {
        tracing::debug!("change history disabled");
        return ChangeHistory::default();
    }

    match read_last_change(config).await {
        Ok(history) => {
            tracing::info!(
                commit = history.commit.as_deref().unwrap_or_default(),
                diff_bytes = history.diff.len(),
                "loaded change history"
            );
            history
        }
        Err(e) => {
            tracing::warn!(
                repo_dir = %config.repo_dir.display(),
                error = %e,
                "failed to get git information"
            );
            ChangeHistory::default()
        }
    }
}

async fn read_last_change(config: &ChangeHistoryConfig) -> Result<ChangeHistory, ChangeHistoryError> {
    let commit = run_git(&config.repo_dir, &["log", "-1", "--pretty=format:%H %s"]).await?;

    let mut diff_args = vec!["diff", "HEAD~1", "--"];
    diff_args.extend(config.diff_paths.iter().map(String::as_str));
    let diff = run_git(&config.repo_dir, &diff_args).await?;

    Ok(ChangeHistory::new(commit.trim(), diff))
}

async fn run_git(dir: &Path, args: &[&str]) -> Result<String, ChangeHistoryError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ChangeHistoryError::GitFailed {
            command: args.first().copied().unwrap_or_default().to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
