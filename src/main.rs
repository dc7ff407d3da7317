//! Aggregator service binary entrypoint.
//! Boots the Axum HTTP server: config, source registry, auth gate, and metrics.

use hometv_aggregator::{build_app, metrics::Metrics, AggregatorConfig, RegistryHandle};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs filtered by `RUST_LOG` (default: this crate at info, the rest at warn).
/// No-op when the runtime already installed a subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hometv_aggregator=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AggregatorConfig::load_default()?;
    let registry = RegistryHandle::load_default()?;
    tracing::info!(
        sources = registry.snapshot().len(),
        category_fanout = cfg.category.fanout,
        "aggregator configured"
    );

    let metrics = Metrics::init()?;
    let router = build_app(cfg, registry)?.merge(metrics.router());

    Ok(router.into())
}
