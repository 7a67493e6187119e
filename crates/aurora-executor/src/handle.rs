//! Single-resolution promise/handle pair for asynchronous dispatch.

use aurora_types::{CommandError, CommandResult, JobCommand, Operation};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Write side. Resolving consumes it, so a promise resolves at most once.
#[derive(Debug)]
pub struct Promise {
    tx: oneshot::Sender<CommandResult>,
}

impl Promise {
    pub fn resolve(self, result: CommandResult) {
        // The handle may already be gone if the request was abandoned.
        let _ = self.tx.send(result);
    }
}

/// Read side, owned by one request. Resolves to the delegate's result, or to a
/// failure result if the promise was dropped without resolving.
#[derive(Debug)]
pub struct ExecutorHandle {
    rx: oneshot::Receiver<CommandResult>,
    job_key: String,
    op: Operation,
}

impl ExecutorHandle {
    /// Take the result if it is already available.
    pub fn try_resolve(&mut self) -> Option<CommandResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(self.dropped()),
        }
    }

    fn dropped(&self) -> CommandResult {
        CommandResult::failure(
            self.job_key.clone(),
            self.op,
            CommandError::Dropped.diagnostics(),
        )
    }
}

impl Future for ExecutorHandle {
    type Output = CommandResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(this.dropped()),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// New promise/handle pair for `command`.
pub fn promise(command: &JobCommand) -> (Promise, ExecutorHandle) {
    let (tx, rx) = oneshot::channel();
    (
        Promise { tx },
        ExecutorHandle {
            rx,
            job_key: command.job_key(),
            op: command.operation(),
        },
    )
}

/// What an executor hands back: a result now, or a handle to await.
#[derive(Debug)]
pub enum Dispatch {
    Ready(CommandResult),
    Pending(ExecutorHandle),
}

impl Dispatch {
    pub async fn resolve(self) -> CommandResult {
        match self {
            Dispatch::Ready(result) => result,
            Dispatch::Pending(handle) => handle.await,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Dispatch::Pending(_))
    }
}
