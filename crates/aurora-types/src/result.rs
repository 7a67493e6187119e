//! Normalized command outcome shared by every execution strategy.

use crate::{CommandError, Operation};
use serde::{Deserialize, Serialize};

/// Operation-specific result payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    /// Job keys found by a list.
    Jobs(Vec<String>),
    /// Key of the job touched by create / update / cancel-update / restart.
    Job(String),
    /// Keys removed by a delete.
    Deleted(Vec<String>),
}

impl Payload {
    /// Payload reported alongside errors for the given operation.
    pub fn empty(op: Operation) -> Self {
        match op {
            Operation::ListJobs => Payload::Jobs(Vec::new()),
            Operation::DeleteJob => Payload::Deleted(Vec::new()),
            _ => Payload::Job(String::new()),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Payload::Jobs(v) | Payload::Deleted(v) => v.len(),
            Payload::Job(k) if k.is_empty() => 0,
            Payload::Job(_) => 1,
        }
    }
}

/// `(job_key, payload, errors)`: `errors == None` is success, anything else is failure.
///
/// The payload is only meaningful on success. A list or delete that matched
/// nothing is a success with an empty payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub job_key: String,
    pub payload: Payload,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
}

impl CommandResult {
    pub fn success(job_key: impl Into<String>, payload: Payload) -> Self {
        Self {
            job_key: job_key.into(),
            payload,
            errors: None,
        }
    }

    /// Failure with the operation's empty payload. An empty error list is
    /// replaced with a generic line so failure is never silent.
    pub fn failure(job_key: impl Into<String>, op: Operation, errors: Vec<String>) -> Self {
        let errors = if errors.is_empty() {
            vec![format!("{} failed without diagnostics", op)]
        } else {
            errors
        };
        Self {
            job_key: job_key.into(),
            payload: Payload::empty(op),
            errors: Some(errors),
        }
    }

    /// Map a delegate outcome onto the normalized shape.
    pub fn from_outcome(
        job_key: impl Into<String>,
        op: Operation,
        outcome: Result<Payload, CommandError>,
    ) -> Self {
        match outcome {
            Ok(payload) => Self::success(job_key, payload),
            Err(e) => Self::failure(job_key, op, e.diagnostics()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_none()
    }
}
