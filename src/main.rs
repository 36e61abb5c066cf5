//! Research relay: binary entrypoint.
//! Boots the Axum HTTP server with the routing/fallback pipeline and metrics.

use research_relay::{build_state, metrics::Metrics, router, RelayConfig, SourceCatalog};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; `RELAY_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("research_relay=info,warn"));
    let json = std::env::var("RELAY_LOG_JSON").is_ok_and(|v| v == "1");

    // try_init: the hosting runtime may already have installed a subscriber.
    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = RelayConfig::load_default().map_err(shuttle_runtime::Error::Custom)?;
    let catalog = SourceCatalog::load_default().map_err(shuttle_runtime::Error::Custom)?;
    tracing::info!(
        max_retries = cfg.max_retries,
        default_source = %cfg.default_source,
        "relay config loaded"
    );

    let state = build_state(&cfg, catalog);
    let mut app = router(state);

    match Metrics::init() {
        Ok(metrics) => app = app.merge(metrics.router()),
        Err(e) => tracing::warn!(error = %e, "metrics recorder not installed"),
    }

    Ok(app.into())
}
