//! Future shim over a synchronous delegate.
//!
//! Lets handlers written against asynchronous dispatch run on a delegate with no
//! concurrency of its own. The delegate runs inline on the caller and the
//! handle is resolved before `dispatch` returns; nothing is deferred to another
//! thread.

use crate::{invoke, promise, Dispatch, JobExecutor};
use aurora_types::{Capabilities, CommandDelegate, JobCommand};
use std::sync::Arc;

pub struct CallbackExecutor {
    delegate: Arc<dyn CommandDelegate>,
}

impl CallbackExecutor {
    pub fn new(delegate: Arc<dyn CommandDelegate>) -> Self {
        tracing::info!("callback executor created");
        Self { delegate }
    }
}

impl JobExecutor for CallbackExecutor {
    fn name(&self) -> &'static str {
        "callback"
    }

    fn capabilities(&self) -> Capabilities {
        self.delegate.capabilities()
    }

    fn dispatch(&self, command: JobCommand) -> Dispatch {
        tracing::info!(op = %command.operation(), key = %command.key(), "callback dispatch");
        let (promise, handle) = promise(&command);
        promise.resolve(invoke(self.delegate.as_ref(), &command));
        Dispatch::Pending(handle)
    }
}
