// src/aggregate/client.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::aggregate::types::{QueryMode, QueryOutcome, Record, SourceFailure};
use crate::config::aggregator::{AggregatorConfig, Timeouts};
use crate::registry::Source;

/// Top-level fields an upstream may carry its item list under, in lookup order.
pub const LIST_FIELDS: [&str; 2] = ["list", "data"];

/// One call against one source. Implementations never fail the caller: every
/// problem is reported as [`QueryOutcome::Failure`], and no call is retried.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn query(&self, source: &Source, mode: &QueryMode) -> QueryOutcome;
}

/// reqwest-backed client speaking the `?ac=list|detail&...&out=json` protocol.
#[derive(Clone)]
pub struct HttpSourceClient {
    http: reqwest::Client,
    timeouts: Timeouts,
}

impl HttpSourceClient {
    pub fn new(cfg: &AggregatorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.http.user_agent.clone())
            .connect_timeout(cfg.connect_timeout())
            .build()
            .context("building upstream http client")?;
        Ok(Self {
            http,
            timeouts: cfg.timeouts.clone(),
        })
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    async fn fetch(
        &self,
        source: &Source,
        mode: &QueryMode,
        budget: Duration,
    ) -> Result<Vec<Record>, SourceFailure> {
        let resp = self
            .http
            .get(source.endpoint.clone())
            .query(&mode.query_pairs())
            .timeout(budget)
            .send()
            .await
            .map_err(|e| classify(e, budget))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceFailure::Transport {
                reason: format!("upstream answered {status}"),
                status: Some(status.as_u16()),
            });
        }

        let body = resp.bytes().await.map_err(|e| classify(e, budget))?;

        // A probe only cares that the source answered.
        if matches!(mode, QueryMode::Probe) {
            return Ok(Vec::new());
        }
        normalize_body(&body, source)
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn query(&self, source: &Source, mode: &QueryMode) -> QueryOutcome {
        crate::metrics::ensure_metrics_described();

        let budget = self.timeouts.for_mode(mode);
        let t0 = Instant::now();
        // reqwest enforces the budget too; this outer bound also covers body reads.
        let outcome = match tokio::time::timeout(budget, self.fetch(source, mode, budget)).await {
            Ok(Ok(records)) => QueryOutcome::Success(records),
            Ok(Err(failure)) => QueryOutcome::Failure(failure),
            Err(_) => QueryOutcome::Failure(SourceFailure::Timeout {
                after_ms: budget.as_millis() as u64,
            }),
        };
        let elapsed_ms = t0.elapsed().as_secs_f64() * 1_000.0;

        histogram!("source_query_ms", "mode" => mode.label()).record(elapsed_ms);
        counter!(
            "source_queries_total",
            "mode" => mode.label(),
            "outcome" => outcome.outcome_label()
        )
        .increment(1);

        match &outcome {
            QueryOutcome::Success(records) => tracing::debug!(
                target: "aggregate",
                source = %source.key,
                mode = mode.label(),
                records = records.len(),
                elapsed_ms,
                "source answered"
            ),
            QueryOutcome::Failure(failure) => tracing::warn!(
                target: "aggregate",
                source = %source.key,
                mode = mode.label(),
                error = %failure,
                elapsed_ms,
                "source failed"
            ),
        }
        outcome
    }
}

fn classify(e: reqwest::Error, budget: Duration) -> SourceFailure {
    if e.is_timeout() {
        SourceFailure::Timeout {
            after_ms: budget.as_millis() as u64,
        }
    } else if e.is_decode() {
        SourceFailure::malformed(e.to_string())
    } else {
        SourceFailure::Transport {
            reason: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        }
    }
}

/// Turn a raw upstream body into typed records.
///
/// The item list sits under `list`, or under `data` when `list` is absent or null.
/// Anything else is a malformed response. Non-object items are dropped.
pub fn normalize_body(body: &[u8], source: &Source) -> Result<Vec<Record>, SourceFailure> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SourceFailure::malformed(format!("body is not json: {e}")))?;
    let Value::Object(mut obj) = value else {
        return Err(SourceFailure::malformed("body is not a json object"));
    };

    let list = LIST_FIELDS
        .iter()
        .find_map(|field| obj.remove(*field).filter(|v| !v.is_null()));
    let items = match list {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(SourceFailure::malformed("list field is not an array")),
        None => return Err(SourceFailure::malformed("no list field in body")),
    };

    let total = items.len();
    let records: Vec<Record> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(Record::from_item(map, source)),
            _ => None,
        })
        .collect();
    if records.len() < total {
        tracing::debug!(
            target: "aggregate",
            source = %source.key,
            dropped = total - records.len(),
            "non-object items skipped"
        );
    }
    Ok(records)
}
