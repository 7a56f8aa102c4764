use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bucketdeck::config::{self, AppConfig};
use bucketdeck::console::{Console, ConsoleRenderer};
use bucketdeck::session::BucketSession;
use bucketdeck::store::SelectionStore;
use bucketdeck::transport::HttpTransport;

fn main() -> anyhow::Result<()> {
    // Load configuration (embedded defaults -> bucketdeck.toml -> env/.env)
    let app_cfg = config::load()?;

    // Logging (stderr + tägliche Datei-Rotation); stdout gehört der Konsole
    std::fs::create_dir_all(&app_cfg.logging.dir).ok();
    let (stderr_nb, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let file_appender = tracing_appender::rolling::daily(&app_cfg.logging.dir, &app_cfg.logging.file_prefix);
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,bucketdeck=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(stderr_nb),
        )
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Guards am Leben halten, damit Non-Blocking Writer korrekt flushen
    let _log_guards = (stderr_guard, file_guard);

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(run(app_cfg));
    // Der stdin-Reader blockiert einen Thread bis zur nächsten Zeile; nicht darauf warten.
    runtime.shutdown_timeout(Duration::from_millis(200));
    info!("bucketdeck stopped");
    result
}

async fn run(app_cfg: AppConfig) -> anyhow::Result<()> {
    let transport = HttpTransport::from_config(&app_cfg.backend)?;
    info!("Using storage backend at {}", transport.base_url());

    let mut store = SelectionStore::new();
    store.subscribe(Box::new(ConsoleRenderer::new(std::io::stdout())));
    let session = BucketSession::with_store(Arc::new(transport), store);
    let mut console = Console::new(session, app_cfg.ui.clone());

    let input = BufReader::new(tokio::io::stdin());
    let mut out = std::io::stdout();
    tokio::select! {
        res = console.run(input, &mut out) => res?,
        _ = shutdown_signal() => {}
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Exiting...");
}
