use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use investor_os::config::AppConfig;
use investor_os::guard::RouteGuard;
use investor_os::onboarding::{OnboardingRouteState, onboarding_routes};
use investor_os::store::{
    LibSqlBackend, LocalMarker, ProfileStore, RestProfileStore, RetryingStore,
};

/// Log to stderr, and to a daily rolling file when `log_dir` is set.
/// The returned guard must live as long as the process.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "investor-os.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📈 InvestorOS onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding/status", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let local = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Profile store ────────────────────────────────────────────────────
    let store: Arc<dyn ProfileStore> = match config.remote.clone() {
        Some(remote) => {
            eprintln!("   Profile store: {} (table {})", remote.base_url, remote.table);
            let rest = RestProfileStore::new(remote).context("Failed to build REST store")?;
            Arc::new(RetryingStore::new(rest, config.retry.clone()))
        }
        None => {
            eprintln!("   Profile store: local");
            let inner: Arc<dyn ProfileStore> = local.clone();
            Arc::new(RetryingStore::new(inner, config.retry.clone()))
        }
    };
    eprintln!(
        "   Retry: {} attempts, {:?}..{:?} backoff\n",
        config.retry.max_attempts, config.retry.base_backoff, config.retry.max_backoff
    );

    let marker: Arc<dyn LocalMarker> = local;
    let state = OnboardingRouteState::new(store, Some(marker), RouteGuard::new(&config.guard));
    let app = onboarding_routes(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Onboarding server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
