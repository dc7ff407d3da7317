// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;

use std::sync::Arc;

pub use crate::aggregate::Aggregator;
pub use crate::api::{router, AppState};
pub use crate::config::AggregatorConfig;
pub use crate::registry::{RegistryHandle, Source, SourceRegistry};

use crate::aggregate::HttpSourceClient;
use crate::auth::{JwtAuthorizer, OpenGate, SharedAuthorizer};

/// Wire config + registry into the HTTP router with the real upstream client.
pub fn build_app(cfg: AggregatorConfig, registry: RegistryHandle) -> anyhow::Result<axum::Router> {
    let client = HttpSourceClient::new(&cfg)?;
    let auth: SharedAuthorizer = if cfg.auth.required {
        Arc::new(JwtAuthorizer::from_secret(cfg.auth.jwt_secret.as_bytes()))
    } else {
        tracing::warn!(target: "auth", "auth.required = false; api is open");
        Arc::new(OpenGate)
    };
    let aggregator = Aggregator::new(Arc::new(registry.clone()), Arc::new(client), cfg);
    Ok(router(AppState::new(aggregator, registry, auth)))
}
