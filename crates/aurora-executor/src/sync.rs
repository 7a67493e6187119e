//! Direct strategy: calls the delegate inline and returns the result.

use crate::{invoke, Dispatch, JobExecutor};
use aurora_types::{Capabilities, CommandDelegate, JobCommand};
use std::sync::Arc;

/// No pool and no concurrency bound. The caller is blocked for the whole
/// delegate call, so overlap comes only from the caller's own tasks.
pub struct SyncExecutor {
    delegate: Arc<dyn CommandDelegate>,
}

impl SyncExecutor {
    pub fn new(delegate: Arc<dyn CommandDelegate>) -> Self {
        tracing::info!("sync executor created");
        Self { delegate }
    }
}

impl JobExecutor for SyncExecutor {
    fn name(&self) -> &'static str {
        "sync"
    }

    fn capabilities(&self) -> Capabilities {
        self.delegate.capabilities()
    }

    fn dispatch(&self, command: JobCommand) -> Dispatch {
        tracing::info!(op = %command.operation(), key = %command.key(), "sync dispatch");
        Dispatch::Ready(invoke(self.delegate.as_ref(), &command))
    }
}
