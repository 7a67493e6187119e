//! JobExecutor trait: the six operations, dispatched under some concurrency strategy.

use crate::Dispatch;
use aurora_types::{
    Capabilities, CommandDelegate, CommandError, CommandResult, Instances, JobCommand, JobKey,
    JobSpec,
};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Uniform front for a command delegate.
///
/// Arguments reach the delegate exactly as passed. Whatever happens below
/// (delegate error, panic, pool or worker failure), the dispatch resolves to a
/// `CommandResult`; failures are never retried.
pub trait JobExecutor: Send + Sync {
    /// Strategy name, for logs.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    fn dispatch(&self, command: JobCommand) -> Dispatch;

    /// Stop accepting work. Work already admitted finishes; queued work fails.
    fn close(&self) {}

    fn list_jobs(&self, cluster: &str, role: &str) -> Dispatch {
        self.dispatch(JobCommand::ListJobs {
            key: JobKey::role(cluster, role),
        })
    }

    fn create_job(&self, key: JobKey, spec: JobSpec) -> Dispatch {
        self.dispatch(JobCommand::CreateJob { key, spec })
    }

    fn update_job(&self, key: JobKey, spec: JobSpec, instances: Instances) -> Dispatch {
        self.dispatch(JobCommand::UpdateJob {
            key,
            spec,
            instances,
        })
    }

    fn cancel_update(&self, key: JobKey, spec: Option<JobSpec>) -> Dispatch {
        self.dispatch(JobCommand::CancelUpdate { key, spec })
    }

    fn restart_job(&self, key: JobKey, spec: Option<JobSpec>, instances: Instances) -> Dispatch {
        self.dispatch(JobCommand::RestartJob {
            key,
            spec,
            instances,
        })
    }

    fn delete_job(&self, key: JobKey, spec: Option<JobSpec>, instances: Instances) -> Dispatch {
        self.dispatch(JobCommand::DeleteJob {
            key,
            spec,
            instances,
        })
    }
}

/// Run `command` on `delegate`, turning a panic into a failure result.
pub fn invoke(delegate: &dyn CommandDelegate, command: &JobCommand) -> CommandResult {
    match catch_unwind(AssertUnwindSafe(|| command.apply(delegate))) {
        Ok(result) => {
            if let Some(ref errors) = result.errors {
                tracing::warn!(
                    op = %command.operation(),
                    key = %result.job_key,
                    errors = ?errors,
                    "delegate reported failure"
                );
            }
            result
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(
                op = %command.operation(),
                key = %command.key(),
                panic = %message,
                "delegate panicked"
            );
            command.fail(&CommandError::Panicked(message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
