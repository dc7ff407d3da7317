// tests/common/mod.rs
//
// Shared doubles for integration tests:
// - ScriptedClient: in-memory SourceClient with per-source behaviour + call log
// - loopback upstreams (axum on 127.0.0.1:0) for the real HTTP client
// - JWT minting for the auth gate
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{routing::get, routing::MethodRouter, Json, Router};
use hometv_aggregator::aggregate::{QueryMode, QueryOutcome, Record, SourceClient, SourceFailure};
use hometv_aggregator::config::aggregator::Timeouts;
use hometv_aggregator::registry::{RegistryHandle, RegistrySnapshot, Source};
use hometv_aggregator::AggregatorConfig;
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

pub const TEST_SECRET: &str = "integration-test-secret";
/// `id` claim of tokens from [`mint_token`]; listed as admin in [`test_config`].
pub const TEST_ADMIN_ID: &str = "lx3k9";

pub enum Script {
    Titles(Vec<String>),
    Slow(Duration, Vec<String>),
    Fail(SourceFailure),
    Panic,
}

/// SourceClient double: answers from a per-key script and logs every call.
pub struct ScriptedClient {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<(String, &'static str)>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(mut self, key: &str, titles: &[&str]) -> Self {
        self.scripts.insert(key.into(), Script::Titles(owned(titles)));
        self
    }

    pub fn slow(mut self, key: &str, ms: u64, titles: &[&str]) -> Self {
        self.scripts
            .insert(key.into(), Script::Slow(Duration::from_millis(ms), owned(titles)));
        self
    }

    pub fn fail(mut self, key: &str, failure: SourceFailure) -> Self {
        self.scripts.insert(key.into(), Script::Fail(failure));
        self
    }

    pub fn panics(mut self, key: &str) -> Self {
        self.scripts.insert(key.into(), Script::Panic);
        self
    }

    /// Keys queried so far, in call order.
    pub fn called_keys(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn called_modes(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(|(_, m)| *m).collect()
    }
}

fn owned(titles: &[&str]) -> Vec<String> {
    titles.iter().map(|t| t.to_string()).collect()
}

fn records(source: &Source, titles: &[String]) -> Vec<Record> {
    titles
        .iter()
        .map(|t| Record::titled(t, &source.key, &source.name))
        .collect()
}

#[async_trait]
impl SourceClient for ScriptedClient {
    async fn query(&self, source: &Source, mode: &QueryMode) -> QueryOutcome {
        self.calls.lock().push((source.key.clone(), mode.label()));
        match self.scripts.get(&source.key) {
            Some(Script::Titles(t)) => QueryOutcome::Success(records(source, t)),
            Some(Script::Slow(d, t)) => {
                tokio::time::sleep(*d).await;
                QueryOutcome::Success(records(source, t))
            }
            Some(Script::Fail(f)) => QueryOutcome::Failure(f.clone()),
            Some(Script::Panic) => panic!("scripted panic for {}", source.key),
            None => QueryOutcome::Failure(SourceFailure::transport("unscripted source")),
        }
    }
}

pub fn source(key: &str, base: &str) -> Source {
    Source::new(key, &key.to_uppercase(), base).expect("valid test source")
}

/// Enabled sources with unroutable endpoints, for use with ScriptedClient.
pub fn scripted_sources(keys: &[&str]) -> Vec<Source> {
    keys.iter()
        .map(|k| source(k, &format!("http://{k}.invalid/api.php/provide/vod/")))
        .collect()
}

pub fn registry_of(sources: Vec<Source>) -> RegistryHandle {
    RegistryHandle::new(RegistrySnapshot::new(sources).expect("unique keys"))
}

/// Defaults with a short uniform timeout, a known JWT secret and one admin.
pub fn test_config(timeout_ms: u64) -> AggregatorConfig {
    let mut cfg = AggregatorConfig::default();
    cfg.timeouts = Timeouts::uniform(timeout_ms);
    cfg.auth.jwt_secret = TEST_SECRET.to_string();
    cfg.auth.admins = vec![TEST_ADMIN_ID.to_string()];
    cfg
}

// ---------- loopback upstreams ----------

/// Serve `app` on an ephemeral loopback port; returns `http://127.0.0.1:PORT`.
pub async fn spawn_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// An address nothing listens on (bound, then released).
pub async fn dead_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

/// Typical upstream body with items under `field`.
pub fn titles_body(field: &str, titles: &[&str]) -> Value {
    let items: Vec<Value> = titles
        .iter()
        .enumerate()
        .map(|(i, t)| json!({ "vod_id": i + 1, "vod_name": t, "type_name": "Movie" }))
        .collect();
    json!({ "code": 1, "msg": "ok", field: items })
}

pub fn static_json(body: Value) -> MethodRouter {
    get(move || {
        let b = body.clone();
        async move { Json(b) }
    })
}

pub fn slow_json(delay_ms: u64, body: Value) -> MethodRouter {
    get(move || {
        let b = body.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Json(b)
        }
    })
}

// ---------- auth ----------

pub fn mint_token(secret: &str) -> String {
    mint_token_for(secret, TEST_ADMIN_ID)
}

pub fn mint_token_for(secret: &str, id: &str) -> String {
    #[derive(serde::Serialize)]
    struct Claims {
        id: String,
        username: String,
        exp: u64,
    }
    let exp = (chrono::Utc::now().timestamp() + 7 * 86_400) as u64;
    encode(
        &Header::default(),
        &Claims {
            id: id.into(),
            username: "tester".into(),
            exp,
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode test jwt")
}
