//! In-memory delegate: a process-local job table with scheduler-like responses.
//! Used for local runs and for exercising worker processes without a scheduler.

use aurora_types::{CommandDelegate, CommandError, Instances, JobKey, JobSpec};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const INVALID_REQUEST: &str = "INVALID_REQUEST";

#[derive(Debug, Clone)]
struct JobRecord {
    update_in_progress: bool,
    restarts: u32,
    killed_instances: BTreeSet<String>,
}

/// Job table keyed by full job key. Each worker process holds its own table.
#[derive(Debug, Default)]
pub struct InMemoryDelegate {
    jobs: RwLock<BTreeMap<String, JobRecord>>,
}

impl InMemoryDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of restarts recorded for a job, if it exists.
    pub fn restarts(&self, key: &JobKey) -> Option<u32> {
        self.read()
            .ok()
            .and_then(|jobs| jobs.get(&key.to_string()).map(|r| r.restarts))
    }

    /// Instances killed so far for a job that is still running.
    pub fn killed_instances(&self, key: &JobKey) -> Option<Vec<String>> {
        self.read().ok().and_then(|jobs| {
            jobs.get(&key.to_string())
                .map(|r| r.killed_instances.iter().cloned().collect())
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, JobRecord>>, CommandError> {
        self.jobs
            .read()
            .map_err(|_| CommandError::Invocation("job table lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, JobRecord>>, CommandError> {
        self.jobs
            .write()
            .map_err(|_| CommandError::Invocation("job table lock poisoned".to_string()))
    }
}

fn rejected(message: String) -> CommandError {
    CommandError::Rejected {
        code: INVALID_REQUEST.to_string(),
        message,
    }
}

fn check_spec(spec: &JobSpec) -> Result<(), CommandError> {
    if spec.is_empty() {
        return Err(CommandError::InvalidSpec("job spec is empty".to_string()));
    }
    Ok(())
}

impl CommandDelegate for InMemoryDelegate {
    fn list_jobs(&self, cluster: &str, role: &str) -> Result<Vec<String>, CommandError> {
        let prefix = format!("{}/", aurora_types::make_role_key(cluster, role));
        let jobs = self.read()?;
        let keys: Vec<String> = jobs
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        tracing::info!(prefix = %prefix, count = keys.len(), "listed in-memory jobs");
        Ok(keys)
    }

    fn create_job(&self, key: &JobKey, spec: &JobSpec) -> Result<(), CommandError> {
        check_spec(spec)?;
        let mut jobs = self.write()?;
        let k = key.to_string();
        if jobs.contains_key(&k) {
            return Err(rejected(format!("job {} already exists", k)));
        }
        jobs.insert(
            k,
            JobRecord {
                update_in_progress: false,
                restarts: 0,
                killed_instances: BTreeSet::new(),
            },
        );
        tracing::info!(key = %key, "created in-memory job");
        Ok(())
    }

    fn update_job(
        &self,
        key: &JobKey,
        spec: &JobSpec,
        instances: &Instances,
    ) -> Result<(), CommandError> {
        check_spec(spec)?;
        let mut jobs = self.write()?;
        let record = jobs
            .get_mut(&key.to_string())
            .ok_or_else(|| rejected(format!("no job found for {}", key)))?;
        record.update_in_progress = true;
        tracing::info!(key = %key, instances = %instances.joined(), "started in-memory update");
        Ok(())
    }

    fn cancel_update(&self, key: &JobKey, _spec: Option<&JobSpec>) -> Result<(), CommandError> {
        let mut jobs = self.write()?;
        let record = jobs
            .get_mut(&key.to_string())
            .ok_or_else(|| rejected(format!("no job found for {}", key)))?;
        if !record.update_in_progress {
            return Err(rejected(format!("no update in progress for {}", key)));
        }
        record.update_in_progress = false;
        Ok(())
    }

    fn restart_job(
        &self,
        key: &JobKey,
        _spec: Option<&JobSpec>,
        instances: &Instances,
    ) -> Result<(), CommandError> {
        let mut jobs = self.write()?;
        let record = jobs
            .get_mut(&key.to_string())
            .ok_or_else(|| rejected(format!("no job found for {}", key)))?;
        record.restarts += 1;
        tracing::info!(key = %key, instances = %instances.joined(), "restarted in-memory job");
        Ok(())
    }

    fn delete_job(
        &self,
        key: &JobKey,
        _spec: Option<&JobSpec>,
        instances: &Instances,
    ) -> Result<Vec<String>, CommandError> {
        let mut jobs = self.write()?;
        let k = key.to_string();
        if instances.is_all() {
            return Ok(jobs.remove(&k).map(|_| vec![k]).unwrap_or_default());
        }
        match jobs.get_mut(&k) {
            Some(record) => {
                record
                    .killed_instances
                    .extend(instances.as_slice().iter().cloned());
                Ok(vec![k])
            }
            None => Ok(Vec::new()),
        }
    }
}
