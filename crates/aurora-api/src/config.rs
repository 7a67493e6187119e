//! Command line and environment configuration for the gateway binary.

use aurora_delegate::{DelegateConfig, DelegateConfigError};
use aurora_executor::{
    CallbackExecutor, JobExecutor, PoolError, ProcessPool, ProcessPoolExecutor, SyncExecutor,
    ThreadPool, ThreadPoolExecutor, WorkerCommand, DEFAULT_MAX_THREADS,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8888";
pub const DEFAULT_PREFIX: &str = "alpha";
pub const DEFAULT_AURORA_CMD: &str = "aurora";

#[derive(Debug, Parser)]
#[command(name = "aurora-rest", version, about = "REST gateway for Aurora job commands")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the HTTP API.
    Serve(ServeArgs),
    /// Run as a process-pool worker, reading requests on stdin.
    Worker(WorkerArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DelegateKind {
    /// Shell out to the Aurora command-line client.
    Cli,
    /// In-memory job table, for demos and tests.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    Sync,
    Callback,
    Thread,
    Process,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Sync => "sync",
            StrategyKind::Callback => "callback",
            StrategyKind::Thread => "thread",
            StrategyKind::Process => "process",
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "AURORA_REST_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: String,

    /// URL prefix for every API route.
    #[arg(long, env = "AURORA_REST_PREFIX", default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    #[arg(long, env = "AURORA_REST_DELEGATE", value_enum, default_value_t = DelegateKind::Cli)]
    pub delegate: DelegateKind,

    /// Aurora client executable used by the cli delegate.
    #[arg(long, env = "AURORA_CMD", default_value = DEFAULT_AURORA_CMD)]
    pub aurora_cmd: String,

    /// How commands are executed.
    #[arg(long, env = "AURORA_REST_STRATEGY", value_enum, default_value_t = StrategyKind::Thread)]
    pub strategy: StrategyKind,

    /// Worker threads or processes for the pooled strategies.
    #[arg(long, env = "AURORA_REST_PARALLEL", default_value_t = DEFAULT_MAX_THREADS)]
    pub parallel: usize,
}

#[derive(Debug, Clone, Args)]
pub struct WorkerArgs {
    /// Delegate to build, as JSON (e.g. `{"kind":"memory"}`).
    #[arg(long)]
    pub delegate_config: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid listen address {addr:?}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("parallel must be at least 1")]
    ZeroParallel,
    #[error(transparent)]
    Delegate(#[from] DelegateConfigError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Validated serve configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub listen: SocketAddr,
    /// Prefix without surrounding slashes; empty mounts the API at the root.
    pub prefix: String,
    pub delegate: DelegateConfig,
    pub strategy: StrategyKind,
    pub parallel: usize,
}

impl GatewayConfig {
    pub fn from_args(args: &ServeArgs) -> Result<Self, ConfigError> {
        let listen = args.listen.parse().map_err(|source| ConfigError::Listen {
            addr: args.listen.clone(),
            source,
        })?;
        if args.parallel == 0 {
            return Err(ConfigError::ZeroParallel);
        }
        let delegate = match args.delegate {
            DelegateKind::Cli => DelegateConfig::Cli {
                command: args.aurora_cmd.clone(),
            },
            DelegateKind::Memory => DelegateConfig::Memory,
        };
        delegate.validate()?;
        Ok(Self {
            listen,
            prefix: args.prefix.trim_matches('/').to_string(),
            delegate,
            strategy: args.strategy,
            parallel: args.parallel,
        })
    }
}

/// Build the configured executor. `worker_program` is the binary started for
/// process-pool workers; it must accept the `worker` subcommand.
pub fn build_executor(
    config: &GatewayConfig,
    worker_program: &Path,
) -> Result<Arc<dyn JobExecutor>, ConfigError> {
    let executor: Arc<dyn JobExecutor> = match config.strategy {
        StrategyKind::Sync => Arc::new(SyncExecutor::new(config.delegate.build()?)),
        StrategyKind::Callback => Arc::new(CallbackExecutor::new(config.delegate.build()?)),
        StrategyKind::Thread => Arc::new(ThreadPoolExecutor::new(
            config.delegate.build()?,
            ThreadPool::new(config.parallel)?,
        )),
        StrategyKind::Process => {
            let command = WorkerCommand::for_delegate(worker_program, &config.delegate)?;
            let pool = ProcessPool::start(command, config.parallel)?;
            Arc::new(ProcessPoolExecutor::new(
                pool,
                config.delegate.capabilities(),
            ))
        }
    };
    tracing::info!(
        strategy = config.strategy.as_str(),
        parallel = config.parallel,
        "executor built"
    );
    Ok(executor)
}
