use std::path::Path;

use ngas_subscription::start_server;
use ngas_subscription::utils::file_io::open_file_for_append;
use ngas_subscription::EngineBuilder;
use ngas_subscription::EngineConfig;
use ngas_subscription::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    let settings = EngineConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&settings.node.host_id, &settings.node.log_dir)?;

    let metrics_token = CancellationToken::new();
    if settings.monitoring.prometheus_enabled {
        let addr = settings.monitoring.metrics_addr();
        let token = metrics_token.clone();
        tokio::spawn(async move { start_server(addr, token).await });
    }

    let engine = EngineBuilder::new(settings).build()?;
    engine.start().await?;

    info!("Application started. Waiting for CTRL+C signal...");
    wait_for_shutdown_signal().await?;

    if let Err(e) = engine.shutdown().await {
        error!("engine shutdown failed: {:?}", e);
    }
    metrics_token.cancel();

    info!("Exiting program.");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }
    Ok(())
}

pub fn init_observability(
    host_id: &str,
    log_dir: &Path,
) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(&log_dir.join(format!("{host_id}/ngas-subscription.log")))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(env_filter());
    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(env_filter());
    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
