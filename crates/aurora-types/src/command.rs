//! Command model: the six job operations as a tagged, serializable command.

use crate::{CommandDelegate, CommandError, CommandResult, JobKey, Payload};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// One of the six job-lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListJobs,
    CreateJob,
    UpdateJob,
    CancelUpdate,
    RestartJob,
    DeleteJob,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::ListJobs,
        Operation::CreateJob,
        Operation::UpdateJob,
        Operation::CancelUpdate,
        Operation::RestartJob,
        Operation::DeleteJob,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListJobs => "list_jobs",
            Operation::CreateJob => "create_job",
            Operation::UpdateJob => "update_job",
            Operation::CancelUpdate => "cancel_update",
            Operation::RestartJob => "restart_job",
            Operation::DeleteJob => "delete_job",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of operations a delegate (and therefore an executor) exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(BTreeSet<Operation>);

impl Capabilities {
    pub fn all() -> Self {
        Self(Operation::ALL.into_iter().collect())
    }

    pub fn only(ops: impl IntoIterator<Item = Operation>) -> Self {
        Self(ops.into_iter().collect())
    }

    pub fn supports(&self, op: Operation) -> bool {
        self.0.contains(&op)
    }

    pub fn iter(&self) -> impl Iterator<Item = Operation> + '_ {
        self.0.iter().copied()
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// Job specification as received in the request body.
///
/// Held as raw bytes; it serializes only when the bytes are valid UTF-8, which
/// is what keeps a non-text spec from crossing a process boundary.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct JobSpec(Vec<u8>);

impl JobSpec {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy text view, for logging.
    pub fn lines_lossy(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0)
            .lines()
            .map(String::from)
            .collect()
    }
}

impl fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobSpec({} bytes)", self.0.len())
    }
}

impl From<&str> for JobSpec {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for JobSpec {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl Serialize for JobSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(&self.0) {
            Ok(text) => serializer.serialize_str(text),
            Err(e) => Err(serde::ser::Error::custom(format!(
                "job spec is not valid UTF-8 ({})",
                e
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for JobSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(JobSpec::from)
    }
}

/// Instance (shard) selector. Empty selects all instances.
///
/// Kept exactly as given: no sorting, no deduplication, no numeric parsing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instances(Vec<String>);

impl Instances {
    pub fn all() -> Self {
        Self(Vec::new())
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Comma-joined form used on the aurora command line (`1,2`).
    pub fn joined(&self) -> String {
        self.0.join(",")
    }
}

impl<S: Into<String>> FromIterator<S> for Instances {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A delegate call with its arguments, tagged by operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JobCommand {
    ListJobs {
        key: JobKey,
    },
    CreateJob {
        key: JobKey,
        spec: JobSpec,
    },
    UpdateJob {
        key: JobKey,
        spec: JobSpec,
        #[serde(default)]
        instances: Instances,
    },
    CancelUpdate {
        key: JobKey,
        #[serde(default)]
        spec: Option<JobSpec>,
    },
    RestartJob {
        key: JobKey,
        #[serde(default)]
        spec: Option<JobSpec>,
        #[serde(default)]
        instances: Instances,
    },
    DeleteJob {
        key: JobKey,
        #[serde(default)]
        spec: Option<JobSpec>,
        #[serde(default)]
        instances: Instances,
    },
}

impl JobCommand {
    pub fn operation(&self) -> Operation {
        match self {
            JobCommand::ListJobs { .. } => Operation::ListJobs,
            JobCommand::CreateJob { .. } => Operation::CreateJob,
            JobCommand::UpdateJob { .. } => Operation::UpdateJob,
            JobCommand::CancelUpdate { .. } => Operation::CancelUpdate,
            JobCommand::RestartJob { .. } => Operation::RestartJob,
            JobCommand::DeleteJob { .. } => Operation::DeleteJob,
        }
    }

    pub fn key(&self) -> &JobKey {
        match self {
            JobCommand::ListJobs { key }
            | JobCommand::CreateJob { key, .. }
            | JobCommand::UpdateJob { key, .. }
            | JobCommand::CancelUpdate { key, .. }
            | JobCommand::RestartJob { key, .. }
            | JobCommand::DeleteJob { key, .. } => key,
        }
    }

    /// Rendered key reported in the result (role key for list, full key otherwise).
    pub fn job_key(&self) -> String {
        self.key().to_string()
    }

    /// Failure result for this command, without running it.
    pub fn fail(&self, error: &CommandError) -> CommandResult {
        CommandResult::failure(self.job_key(), self.operation(), error.diagnostics())
    }

    /// Run the command against a delegate and normalize the outcome.
    pub fn apply(&self, delegate: &dyn CommandDelegate) -> CommandResult {
        let job_key = self.job_key();
        let outcome = match self {
            JobCommand::ListJobs { key } => delegate
                .list_jobs(key.cluster(), key.role_name())
                .map(Payload::Jobs),
            JobCommand::CreateJob { key, spec } => delegate
                .create_job(key, spec)
                .map(|()| Payload::Job(job_key.clone())),
            JobCommand::UpdateJob {
                key,
                spec,
                instances,
            } => delegate
                .update_job(key, spec, instances)
                .map(|()| Payload::Job(job_key.clone())),
            JobCommand::CancelUpdate { key, spec } => delegate
                .cancel_update(key, spec.as_ref())
                .map(|()| Payload::Job(job_key.clone())),
            JobCommand::RestartJob {
                key,
                spec,
                instances,
            } => delegate
                .restart_job(key, spec.as_ref(), instances)
                .map(|()| Payload::Job(job_key.clone())),
            JobCommand::DeleteJob {
                key,
                spec,
                instances,
            } => delegate
                .delete_job(key, spec.as_ref(), instances)
                .map(Payload::Deleted),
        };
        CommandResult::from_outcome(job_key, self.operation(), outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_utf8_spec_does_not_serialize() {
        let cmd = JobCommand::CreateJob {
            key: JobKey::full("c", "r", "e", "n"),
            spec: JobSpec::new(vec![0xff, 0xfe, 0x00]),
        };
        assert!(serde_json::to_string(&cmd).is_err());
    }

    #[test]
    fn command_survives_json_and_keeps_instance_order() {
        let cmd = JobCommand::DeleteJob {
            key: JobKey::full("c1", "roleA", "prod", "web"),
            spec: None,
            instances: ["2", "1", "2"].into_iter().collect(),
        };
        let line = serde_json::to_string(&cmd).unwrap();
        assert!(line.contains(r#""op":"delete_job""#));
        let back: JobCommand = serde_json::from_str(&line).unwrap();
        assert_eq!(back, cmd);
        match back {
            JobCommand::DeleteJob { instances, .. } => {
                assert_eq!(instances.as_slice(), &["2", "1", "2"]);
                assert_eq!(instances.joined(), "2,1,2");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn capabilities_subset() {
        let caps = Capabilities::only([Operation::ListJobs, Operation::DeleteJob]);
        assert!(caps.supports(Operation::ListJobs));
        assert!(!caps.supports(Operation::RestartJob));
        assert!(Capabilities::default().supports(Operation::RestartJob));
    }
}
