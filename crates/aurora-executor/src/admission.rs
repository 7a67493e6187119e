//! FIFO admission for the pools: one queue, one task taking permits in arrival order.

use crate::{promise, ExecutorHandle, Promise};
use aurora_types::{CommandError, CommandResult, JobCommand, Operation};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

/// Resolves one submitted command.
pub(crate) struct Completion {
    promise: Promise,
    job_key: String,
    op: Operation,
}

impl Completion {
    pub(crate) fn resolve(self, result: CommandResult) {
        self.promise.resolve(result);
    }

    pub(crate) fn fail(self, err: CommandError) {
        self.promise.resolve(CommandResult::failure(self.job_key, self.op, err.diagnostics()));
    }
}

struct Queued<T> {
    work: T,
    done: Completion,
}

/// Submissions go into an unbounded channel; a single admission task pops them
/// and waits for a permit before starting each one, so units start in the
/// order they were pushed. Once the semaphore is closed, every queued and
/// future unit fails with `closed`.
pub(crate) struct AdmissionQueue<T> {
    tx: mpsc::UnboundedSender<Queued<T>>,
    closed: &'static str,
}

impl<T: Send + 'static> AdmissionQueue<T> {
    /// Spawn the admission task on `runtime`. `start` receives each admitted
    /// unit with its permit and must not block; it spawns the actual work.
    pub(crate) fn spawn<F>(
        runtime: &Handle,
        permits: Arc<Semaphore>,
        closed: &'static str,
        start: F,
    ) -> Self
    where
        F: Fn(T, Completion, OwnedSemaphorePermit) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Queued<T>>();
        runtime.spawn(async move {
            while let Some(Queued { work, done }) = rx.recv().await {
                match Arc::clone(&permits).acquire_owned().await {
                    Ok(permit) => start(work, done, permit),
                    Err(_) => done.fail(CommandError::Worker(closed.to_string())),
                }
            }
            tracing::debug!(closed, "admission queue drained");
        });
        Self { tx, closed }
    }

    pub(crate) fn push(&self, command: &JobCommand, work: T) -> ExecutorHandle {
        let (promise, handle) = promise(command);
        let done = Completion {
            promise,
            job_key: command.job_key(),
            op: command.operation(),
        };
        if let Err(mpsc::error::SendError(queued)) = self.tx.send(Queued { work, done }) {
            queued.done.fail(CommandError::Worker(self.closed.to_string()));
        }
        handle
    }
}
