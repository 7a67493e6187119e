//! Bounded pool of worker processes and the strategy built on it.
//!
//! Every command is marshalled to JSON before dispatch, so anything that cannot
//! cross the process boundary fails at submission as a normalized result.
//! Worker processes rebuild their own delegate from a [`DelegateConfig`] and
//! share no state with the gateway or each other.

use crate::admission::{AdmissionQueue, Completion};
use crate::worker::{WorkerReply, WorkerRequest};
use crate::{promise, Dispatch, ExecutorHandle, JobExecutor, PoolError};
use aurora_delegate::DelegateConfig;
use aurora_types::{Capabilities, CommandError, CommandResult, JobCommand};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Semaphore;
use uuid::Uuid;

pub const DEFAULT_MAX_PROCESSES: usize = 4;

/// Program and arguments that start one worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `<program> worker --delegate-config <json>`.
    pub fn for_delegate(
        program: impl Into<PathBuf>,
        delegate: &DelegateConfig,
    ) -> Result<Self, PoolError> {
        Ok(Self::new(program)
            .arg("worker")
            .arg("--delegate-config")
            .arg(delegate.to_arg()?))
    }

    fn display(&self) -> String {
        self.program.display().to_string()
    }
}

struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl WorkerProcess {
    fn spawn(command: &WorkerCommand) -> Result<Self, PoolError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PoolError::Spawn {
                program: command.display(),
                source,
            })?;
        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => return Err(PoolError::MissingPipes(command.display())),
        };
        tracing::info!(pid = ?child.id(), program = %command.display(), "worker process started");
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Send one request line and read one reply line.
    async fn call(&mut self, id: Uuid, line: &str) -> Result<CommandResult, CommandError> {
        let io_err = |e: std::io::Error| CommandError::Worker(format!("worker i/o failed: {}", e));
        self.stdin.write_all(line.as_bytes()).await.map_err(io_err)?;
        self.stdin.write_all(b"\n").await.map_err(io_err)?;
        self.stdin.flush().await.map_err(io_err)?;

        let mut reply = String::new();
        let read = self.stdout.read_line(&mut reply).await.map_err(io_err)?;
        if read == 0 {
            return Err(CommandError::Worker(
                "worker exited before answering".to_string(),
            ));
        }
        let reply: WorkerReply = serde_json::from_str(reply.trim_end())
            .map_err(|e| CommandError::Marshal(format!("undecodable worker reply: {}", e)))?;
        if reply.id() != Some(id) {
            return Err(CommandError::Worker(format!(
                "reply id {:?} does not match request {}",
                reply.id(),
                id
            )));
        }
        reply.into_result().map_err(CommandError::Marshal)
    }

    fn kill(mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "worker already gone");
        }
    }
}

/// Fixed number of long-lived worker processes.
///
/// At most `capacity` requests are in flight; excess submissions queue in FIFO
/// order. A worker that misbehaves is killed and replaced on next use.
pub struct ProcessPool {
    capacity: usize,
    permits: Arc<Semaphore>,
    idle: Arc<Mutex<Vec<WorkerProcess>>>,
    queue: AdmissionQueue<(Uuid, String)>,
}

impl ProcessPool {
    /// Start `capacity` workers. Must be called from within a tokio runtime.
    pub fn start(command: WorkerCommand, capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PoolError::NoRuntime(e.to_string()))?;
        let workers = (0..capacity)
            .map(|_| WorkerProcess::spawn(&command))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(procs = capacity, program = %command.display(), "process pool started");

        let permits = Arc::new(Semaphore::new(capacity));
        let idle = Arc::new(Mutex::new(workers));
        let queue = AdmissionQueue::spawn(&runtime, Arc::clone(&permits), "process pool closed", {
            let permits = Arc::clone(&permits);
            let idle = Arc::clone(&idle);
            move |(id, line): (Uuid, String), done, permit| {
                let permits = Arc::clone(&permits);
                let idle = Arc::clone(&idle);
                let command = command.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    run_on_worker(&command, &permits, &idle, id, &line, done).await;
                });
            }
        });
        Ok(Self {
            capacity,
            permits,
            idle,
            queue,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    fn idle_workers(&self) -> usize {
        self.idle.lock().map(|w| w.len()).unwrap_or_default()
    }

    /// Marshal `command` and queue it for the next free worker.
    pub fn submit(&self, command: JobCommand) -> ExecutorHandle {
        let id = Uuid::new_v4();
        match serde_json::to_string(&WorkerRequest {
            id,
            command: command.clone(),
        }) {
            Ok(line) => self.queue.push(&command, (id, line)),
            Err(e) => {
                tracing::warn!(error = %e, "cannot marshal command for worker");
                let (promise, handle) = promise(&command);
                promise.resolve(command.fail(&CommandError::Marshal(e.to_string())));
                handle
            }
        }
    }

    /// Stop admitting work and kill idle workers. Busy workers are killed as
    /// soon as their request completes.
    pub fn shutdown(&self) {
        self.permits.close();
        if let Ok(mut workers) = self.idle.lock() {
            for worker in workers.drain(..) {
                worker.kill();
            }
        }
        tracing::info!("process pool shut down");
    }
}

/// Run one admitted request on an idle worker, or on a fresh one when none is
/// idle. A worker goes back to the idle list only if it answered properly and
/// the pool is still open.
async fn run_on_worker(
    command: &WorkerCommand,
    permits: &Semaphore,
    idle: &Mutex<Vec<WorkerProcess>>,
    id: Uuid,
    line: &str,
    done: Completion,
) {
    let pooled = idle.lock().ok().and_then(|mut workers| workers.pop());
    let mut worker = match pooled {
        Some(worker) => worker,
        None => match WorkerProcess::spawn(command) {
            Ok(worker) => worker,
            Err(e) => {
                tracing::error!(error = %e, "cannot replace worker process");
                done.fail(CommandError::Worker(e.to_string()));
                return;
            }
        },
    };
    match worker.call(id, line).await {
        Ok(result) => {
            match idle.lock() {
                Ok(mut workers) if !permits.is_closed() => workers.push(worker),
                _ => worker.kill(),
            }
            done.resolve(result);
        }
        Err(e) => {
            tracing::error!(id = %id, error = %e, "worker process failed, discarding it");
            worker.kill();
            done.fail(e);
        }
    }
}

/// Runs each command in a worker process.
pub struct ProcessPoolExecutor {
    pool: ProcessPool,
    capabilities: Capabilities,
}

impl ProcessPoolExecutor {
    pub fn new(pool: ProcessPool, capabilities: Capabilities) -> Self {
        tracing::info!(procs = pool.capacity(), "process-pool executor created");
        Self { pool, capabilities }
    }
}

impl JobExecutor for ProcessPoolExecutor {
    fn name(&self) -> &'static str {
        "process"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    fn dispatch(&self, command: JobCommand) -> Dispatch {
        tracing::info!(op = %command.operation(), key = %command.key(), "process pool dispatch");
        Dispatch::Pending(self.pool.submit(command))
    }

    fn close(&self) {
        self.pool.shutdown();
    }
}
