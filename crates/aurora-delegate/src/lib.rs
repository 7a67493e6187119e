//! Command delegates: the synchronous backends the gateway's executors wrap.

mod cli;
mod config;
mod memory;
#[cfg(feature = "test-util")]
pub mod mock;

pub use aurora_types::{CommandDelegate, CommandError};
pub use cli::{AuroraCliDelegate, SCHEDULER_OK};
pub use config::{DelegateConfig, DelegateConfigError};
pub use memory::InMemoryDelegate;

#[cfg(feature = "test-util")]
pub use mock::StubDelegate;
