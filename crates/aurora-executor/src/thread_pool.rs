//! Bounded worker-thread pool and the strategy built on it.

use crate::admission::AdmissionQueue;
use crate::{invoke, Dispatch, ExecutorHandle, JobExecutor, PoolError};
use aurora_types::{Capabilities, CommandDelegate, CommandError, CommandResult, JobCommand};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const DEFAULT_MAX_THREADS: usize = 4;

type Work = Box<dyn FnOnce() -> CommandResult + Send>;

/// Fixed-capacity pool of blocking threads.
///
/// At most `capacity` units run at once; further submissions wait in FIFO order
/// for a slot instead of being rejected. The capacity never changes.
pub struct ThreadPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    queue: AdmissionQueue<Work>,
}

impl ThreadPool {
    /// Must be called from within a tokio runtime, which then drives the pool.
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PoolError::NoRuntime(e.to_string()))?;
        let permits = Arc::new(Semaphore::new(capacity));
        let queue = AdmissionQueue::spawn(
            &runtime,
            Arc::clone(&permits),
            "thread pool closed",
            |work: Work, done, permit| {
                tokio::spawn(async move {
                    let _permit = permit;
                    match tokio::task::spawn_blocking(work).await {
                        Ok(result) => done.resolve(result),
                        Err(e) => {
                            tracing::error!(error = %e, "thread pool unit did not complete");
                            done.fail(CommandError::Panicked(e.to_string()));
                        }
                    }
                });
            },
        );
        Ok(Self {
            permits,
            capacity,
            queue,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units currently running (not counting queued ones).
    pub fn busy(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Queue `command` to run as `work` on a pool thread.
    pub fn submit<F>(&self, command: &JobCommand, work: F) -> ExecutorHandle
    where
        F: FnOnce() -> CommandResult + Send + 'static,
    {
        self.queue.push(command, Box::new(work))
    }

    pub fn close(&self) {
        self.permits.close();
    }
}

/// Runs each delegate call on the shared thread pool. The delegate is shared
/// by reference, so nothing is serialized; calls for the same job key may run
/// concurrently.
pub struct ThreadPoolExecutor {
    delegate: Arc<dyn CommandDelegate>,
    pool: ThreadPool,
}

impl ThreadPoolExecutor {
    pub fn new(delegate: Arc<dyn CommandDelegate>, pool: ThreadPool) -> Self {
        tracing::info!(threads = pool.capacity(), "thread-pool executor created");
        Self { delegate, pool }
    }
}

impl JobExecutor for ThreadPoolExecutor {
    fn name(&self) -> &'static str {
        "thread"
    }

    fn capabilities(&self) -> Capabilities {
        self.delegate.capabilities()
    }

    fn dispatch(&self, command: JobCommand) -> Dispatch {
        tracing::info!(
            op = %command.operation(),
            key = %command.key(),
            busy = self.pool.busy(),
            "thread pool dispatch"
        );
        let delegate = Arc::clone(&self.delegate);
        let handle = self.pool.submit(&command, {
            let command = command.clone();
            move || invoke(delegate.as_ref(), &command)
        });
        Dispatch::Pending(handle)
    }

    fn close(&self) {
        tracing::info!("closing thread pool");
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurora_delegate::StubDelegate;
    use aurora_types::{JobKey, JobSpec, Operation};
    use std::time::Duration;

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(ThreadPool::new(0), Err(PoolError::ZeroCapacity)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn excess_requests_queue_and_all_resolve() {
        let stub = Arc::new(StubDelegate::new().with_latency(Duration::from_millis(40)));
        let executor = ThreadPoolExecutor::new(stub.clone(), ThreadPool::new(2).unwrap());

        let dispatches: Vec<Dispatch> = (0..7)
            .map(|i| {
                executor.create_job(
                    JobKey::full("c1", "roleA", "prod", format!("web{}", i)),
                    JobSpec::from("spec"),
                )
            })
            .collect();
        assert!(dispatches.iter().all(Dispatch::is_pending));

        for (i, dispatch) in dispatches.into_iter().enumerate() {
            let res = dispatch.resolve().await;
            assert!(res.is_success(), "request {} failed: {:?}", i, res.errors);
            assert_eq!(res.job_key, format!("c1/roleA/prod/web{}", i));
        }
        assert_eq!(stub.calls().len(), 7);
        assert!(stub.max_concurrency() <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn single_slot_runs_in_submission_order() {
        let stub = Arc::new(StubDelegate::new().with_latency(Duration::from_millis(2)));
        let executor = ThreadPoolExecutor::new(stub.clone(), ThreadPool::new(1).unwrap());

        let names: Vec<String> = (0..16).map(|i| format!("j{:02}", i)).collect();
        let dispatches: Vec<Dispatch> = names
            .iter()
            .map(|name| {
                executor.create_job(
                    JobKey::full("c1", "roleA", "prod", name),
                    JobSpec::from("spec"),
                )
            })
            .collect();
        for dispatch in dispatches {
            assert!(dispatch.resolve().await.is_success());
        }

        let order: Vec<String> = stub
            .calls()
            .iter()
            .map(|c| c.key().name().unwrap_or_default().to_string())
            .collect();
        assert_eq!(order, names);
        assert_eq!(stub.max_concurrency(), 1);
    }

    #[test]
    fn needs_a_runtime() {
        assert!(matches!(ThreadPool::new(1), Err(PoolError::NoRuntime(_))));
    }

    #[tokio::test]
    async fn panicking_delegate_yields_failure() {
        let stub = Arc::new(StubDelegate::new().panicking(Operation::RestartJob));
        let executor = ThreadPoolExecutor::new(stub, ThreadPool::new(1).unwrap());
        let res = executor
            .restart_job(
                JobKey::full("c1", "roleA", "prod", "web"),
                None,
                Default::default(),
            )
            .resolve()
            .await;
        assert!(!res.is_success());
        let errors = res.errors.unwrap();
        assert!(errors[0].starts_with("delegate panicked"));
    }

    #[tokio::test]
    async fn closed_pool_fails_new_work() {
        let executor =
            ThreadPoolExecutor::new(Arc::new(StubDelegate::new()), ThreadPool::new(1).unwrap());
        executor.close();
        let res = executor.list_jobs("c1", "roleA").resolve().await;
        assert_eq!(res.job_key, "c1/roleA");
        assert_eq!(res.errors, Some(vec!["worker failure: thread pool closed".to_string()]));
    }
}
