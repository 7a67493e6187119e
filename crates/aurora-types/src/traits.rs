//! CommandDelegate trait and the error taxonomy of delegate and executor failures.

use crate::{Capabilities, Instances, JobKey, JobSpec};

/// Synchronous backend for the six job operations (aurora client subprocess,
/// scheduler RPC, in-memory table, ...).
///
/// Shared by reference across concurrent callers under the synchronous and
/// thread-pool strategies, so implementations must tolerate concurrent calls.
/// No per-job exclusivity is provided by callers.
pub trait CommandDelegate: Send + Sync {
    /// Operations this delegate implements. Routes are only exposed for these.
    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    /// Keys of all jobs under `cluster/role`.
    fn list_jobs(&self, cluster: &str, role: &str) -> Result<Vec<String>, CommandError>;

    fn create_job(&self, key: &JobKey, spec: &JobSpec) -> Result<(), CommandError>;

    fn update_job(
        &self,
        key: &JobKey,
        spec: &JobSpec,
        instances: &Instances,
    ) -> Result<(), CommandError>;

    fn cancel_update(&self, key: &JobKey, spec: Option<&JobSpec>) -> Result<(), CommandError>;

    fn restart_job(
        &self,
        key: &JobKey,
        spec: Option<&JobSpec>,
        instances: &Instances,
    ) -> Result<(), CommandError>;

    /// Kill the job (or the selected instances); returns the keys that were removed.
    fn delete_job(
        &self,
        key: &JobKey,
        spec: Option<&JobSpec>,
        instances: &Instances,
    ) -> Result<Vec<String>, CommandError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The aurora client ran but reported failure.
    #[error("{context}")]
    Client { context: String, output: Vec<String> },
    /// The scheduler answered with a non-OK response code.
    #[error("scheduler rejected request: {code} ({message})")]
    Rejected { code: String, message: String },
    #[error("invalid job spec: {0}")]
    InvalidSpec(String),
    #[error("failed to invoke aurora client: {0}")]
    Invocation(String),
    #[error("delegate panicked: {0}")]
    Panicked(String),
    #[error("cannot marshal across worker boundary: {0}")]
    Marshal(String),
    #[error("worker failure: {0}")]
    Worker(String),
    #[error("request was dropped before it completed")]
    Dropped,
}

impl CommandError {
    /// Human-readable lines reported in the `errors` field. Never empty.
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            CommandError::Client { context, output } => {
                let mut lines = Vec::with_capacity(output.len() + 1);
                lines.push(context.clone());
                lines.extend(output.iter().cloned());
                lines
            }
            CommandError::Rejected { code, message } => vec![
                "Error reported by aurora client:".to_string(),
                format!("Response from scheduler: {} (message: {})", code, message),
            ],
            CommandError::InvalidSpec(msg) => {
                vec!["Failed to parse job spec".to_string(), msg.clone()]
            }
            other => vec![other.to_string()],
        }
    }
}
