//! Aurora REST gateway: `serve` runs the HTTP API, `worker` runs one process-pool worker.

use aurora_api::config::{build_executor, Cli, Commands, GatewayConfig, ServeArgs, WorkerArgs};
use aurora_api::server::{self, AppState};
use aurora_delegate::DelegateConfig;
use aurora_executor::worker;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), BoxError> {
    // stdout is the reply channel for workers, so logs always go to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Commands::Serve(args) => serve(args),
        Commands::Worker(args) => run_worker(args),
    }
}

fn run_worker(args: WorkerArgs) -> Result<(), BoxError> {
    let delegate = DelegateConfig::from_arg(&args.delegate_config)?.build()?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    worker::serve(delegate.as_ref(), stdin.lock(), stdout.lock())?;
    Ok(())
}

fn serve(args: ServeArgs) -> Result<(), BoxError> {
    let config = GatewayConfig::from_args(&args)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let program = std::env::current_exe()?;
        let executor = build_executor(&config, &program)?;
        let state = Arc::new(AppState {
            executor: Arc::clone(&executor),
        });
        let app = server::router(&config.prefix, state);

        tracing::info!(
            "Aurora REST API listening on {} (prefix /{}, strategy {})",
            config.listen,
            config.prefix,
            executor.name()
        );
        axum::serve(
            tokio::net::TcpListener::bind(config.listen).await?,
            app.into_make_service(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        executor.close();
        tracing::info!("server stopped");
        Ok::<(), BoxError>(())
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
