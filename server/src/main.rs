use std::process::ExitCode;
use std::sync::Arc;

use askpdf_core::config::Settings;
use askpdf_lib::{router, AppState};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("askpdf=info,askpdf_lib=info,askpdf_ai=info,askpdf_core=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {e}");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("configuration error: {} ({})", e, e.details.as_deref().unwrap_or("-"));
            return ExitCode::FAILURE;
        }
    };
    let state = match AppState::from_settings(&settings) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("startup failed: {} ({})", e, e.details.as_deref().unwrap_or("-"));
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(&settings.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("failed to bind {}: {e}", settings.bind_addr);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        "askpdf listening on {} (index dir {}, uploads dir {})",
        settings.bind_addr,
        settings.index_dir.display(),
        settings.upload_dir.display()
    );

    if let Err(e) = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
