#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool capacity must be at least 1")]
    ZeroCapacity,
    #[error("pool needs a tokio runtime: {0}")]
    NoRuntime(String),
    #[error("failed to spawn worker process {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("worker process {0} has no stdio pipes")]
    MissingPipes(String),
    #[error(transparent)]
    Delegate(#[from] aurora_delegate::DelegateConfigError),
}
