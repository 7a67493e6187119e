//! Scripted delegate for tests: canned outcomes, call recording, no scheduler.

use aurora_types::{
    Capabilities, CommandDelegate, CommandError, Instances, JobCommand, JobKey, JobSpec, Operation,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Stub delegate. By default every operation succeeds, list returns no jobs and
/// delete reports the job key as removed.
#[derive(Default)]
pub struct StubDelegate {
    capabilities: Option<Capabilities>,
    jobs: Vec<String>,
    nothing_to_delete: bool,
    failures: HashMap<Operation, CommandError>,
    panics: Vec<Operation>,
    latency: Option<Duration>,
    calls: Mutex<Vec<JobCommand>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(mut self, jobs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.jobs = jobs.into_iter().map(Into::into).collect();
        self
    }

    /// Delete reports zero removed jobs.
    pub fn with_nothing_to_delete(mut self) -> Self {
        self.nothing_to_delete = true;
        self
    }

    pub fn failing(mut self, op: Operation, error: CommandError) -> Self {
        self.failures.insert(op, error);
        self
    }

    pub fn panicking(mut self, op: Operation) -> Self {
        self.panics.push(op);
        self
    }

    /// Sleep this long inside every call (to observe pool concurrency).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<JobCommand> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter<T>(&self, command: JobCommand, ok: impl FnOnce() -> T) -> Result<T, CommandError> {
        let op = command.operation();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panics.contains(&op) {
            panic!("stub delegate told to panic on {}", op);
        }
        match self.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(ok()),
        }
    }
}

impl CommandDelegate for StubDelegate {
    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone().unwrap_or_default()
    }

    fn list_jobs(&self, cluster: &str, role: &str) -> Result<Vec<String>, CommandError> {
        self.enter(
            JobCommand::ListJobs {
                key: JobKey::role(cluster, role),
            },
            || self.jobs.clone(),
        )
    }

    fn create_job(&self, key: &JobKey, spec: &JobSpec) -> Result<(), CommandError> {
        self.enter(
            JobCommand::CreateJob {
                key: key.clone(),
                spec: spec.clone(),
            },
            || (),
        )
    }

    fn update_job(
        &self,
        key: &JobKey,
        spec: &JobSpec,
        instances: &Instances,
    ) -> Result<(), CommandError> {
        self.enter(
            JobCommand::UpdateJob {
                key: key.clone(),
                spec: spec.clone(),
                instances: instances.clone(),
            },
            || (),
        )
    }

    fn cancel_update(&self, key: &JobKey, spec: Option<&JobSpec>) -> Result<(), CommandError> {
        self.enter(
            JobCommand::CancelUpdate {
                key: key.clone(),
                spec: spec.cloned(),
            },
            || (),
        )
    }

    fn restart_job(
        &self,
        key: &JobKey,
        spec: Option<&JobSpec>,
        instances: &Instances,
    ) -> Result<(), CommandError> {
        self.enter(
            JobCommand::RestartJob {
                key: key.clone(),
                spec: spec.cloned(),
                instances: instances.clone(),
            },
            || (),
        )
    }

    fn delete_job(
        &self,
        key: &JobKey,
        spec: Option<&JobSpec>,
        instances: &Instances,
    ) -> Result<Vec<String>, CommandError> {
        self.enter(
            JobCommand::DeleteJob {
                key: key.clone(),
                spec: spec.cloned(),
                instances: instances.clone(),
            },
            || {
                if self.nothing_to_delete {
                    Vec::new()
                } else {
                    vec![key.to_string()]
                }
            },
        )
    }
}
