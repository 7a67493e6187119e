//! Execution strategies for the Aurora REST gateway.
//!
//! One [`JobExecutor`] front over a synchronous `CommandDelegate`, four ways:
//! inline ([`SyncExecutor`]), inline behind a future ([`CallbackExecutor`]),
//! on a bounded thread pool ([`ThreadPoolExecutor`]) and on a bounded pool of
//! worker processes ([`ProcessPoolExecutor`]). All of them resolve to the same
//! normalized `CommandResult`.

mod admission;
mod callback;
mod error;
mod handle;
mod process_pool;
mod sync;
mod thread_pool;
mod trait_;
pub mod worker;

pub use callback::CallbackExecutor;
pub use error::PoolError;
pub use handle::{promise, Dispatch, ExecutorHandle, Promise};
pub use process_pool::{ProcessPool, ProcessPoolExecutor, WorkerCommand, DEFAULT_MAX_PROCESSES};
pub use sync::SyncExecutor;
pub use thread_pool::{ThreadPool, ThreadPoolExecutor, DEFAULT_MAX_THREADS};
pub use trait_::{invoke, JobExecutor};
