//! CommandBackend: run an external program as the metric backend.
//!
//! The job is written to the program's stdin as JSON; the program prints a
//! JSON array of per-file results on stdout. Anything on stderr is kept for
//! the error message when the program fails.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{BackendError, ComputeJob, MetricBackend};
use crate::config::BackendConfig;
use crate::models::PerFileResult;

/// Maximum stderr kept in an error message.
const MAX_STDERR: usize = 4 * 1024;

/// Backend that shells out to a configured command.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Build from `[backend]`. Fails when no command is configured.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let program = config.command.as_deref().ok_or_else(|| {
            BackendError::NotConfigured("set [backend] command or MASKCMP_BACKEND".to_string())
        })?;
        Ok(Self::new(
            program,
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    async fn run(&self, input: Vec<u8>) -> Result<std::process::Output, BackendError> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::Spawn {
                command: self.program.clone(),
                source: e,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A backend that exits without reading its input is judged by its exit status.
            if let Err(e) = stdin.write_all(&input).await {
                debug!(error = %e, "backend closed stdin early");
            }
        }

        child.wait_with_output().await.map_err(|e| BackendError::Spawn {
            command: self.program.clone(),
            source: e,
        })
    }
}

#[async_trait]
impl MetricBackend for CommandBackend {
    async fn compute(&self, job: &ComputeJob) -> Result<Vec<PerFileResult>, BackendError> {
        let input = serde_json::to_vec(job).map_err(|e| BackendError::Parse(e.to_string()))?;
        debug!(
            program = %self.program,
            comparisons = job.comparisons.len(),
            files = job.common_files.len(),
            "running metric backend"
        );

        let output = tokio::time::timeout(self.timeout, self.run(input))
            .await
            .map_err(|_| BackendError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.trim().chars().take(MAX_STDERR).collect();
            return Err(BackendError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| BackendError::Parse(e.to_string()))
    }
}
