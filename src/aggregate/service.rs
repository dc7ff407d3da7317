// src/aggregate/service.rs
use metrics::counter;
use std::sync::Arc;

use crate::aggregate::anon_hash;
use crate::aggregate::client::SourceClient;
use crate::aggregate::fanout::fan_out;
use crate::aggregate::merge::{flatten, merge_with_stats};
use crate::aggregate::probe::{probe, scan_first_success};
use crate::aggregate::selector::SourceSelector;
use crate::aggregate::types::{AggregatedResult, LatencyProbe, QueryMode, QueryOutcome};
use crate::config::aggregator::AggregatorConfig;
use crate::error::AggregatorError;
use crate::registry::{Source, SourceRegistry};

/// The public operations of the aggregation engine.
///
/// Holds no per-request state; concurrent requests share only the registry
/// (read-only) and the client.
#[derive(Clone)]
pub struct Aggregator {
    registry: Arc<dyn SourceRegistry>,
    client: Arc<dyn SourceClient>,
    cfg: Arc<AggregatorConfig>,
}

impl Aggregator {
    pub fn new(
        registry: Arc<dyn SourceRegistry>,
        client: Arc<dyn SourceClient>,
        cfg: AggregatorConfig,
    ) -> Self {
        Self {
            registry,
            client,
            cfg: Arc::new(cfg),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.cfg
    }

    fn selector(&self) -> SourceSelector<'_> {
        SourceSelector::new(self.registry.as_ref())
    }

    async fn fan_out(&self, sources: &[Source], mode: &QueryMode) -> Vec<QueryOutcome> {
        fan_out(Arc::clone(&self.client), sources, mode).await
    }

    /// One page of a category from the first few enabled sources, deduplicated
    /// by title and capped. Always answers; empty when every source fails.
    pub async fn fetch_by_category(&self, type_id: u32, page: u32) -> AggregatedResult {
        let sources = self.selector().first_n(self.cfg.category.fanout);
        let mode = QueryMode::Category {
            type_id,
            page: page.max(1),
        };
        let outcomes = self.fan_out(&sources, &mode).await;
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        let (result, dropped) = merge_with_stats(outcomes, self.cfg.category.cap);

        counter!("aggregate_dedup_dropped_total").increment(dropped as u64);
        record_request("category", result.len());
        tracing::info!(
            target: "aggregate",
            type_id,
            page = page.max(1),
            sources = sources.len(),
            failed,
            dropped,
            records = result.len(),
            "category aggregated"
        );
        result
    }

    /// Keyword search across every enabled source.
    ///
    /// Unlike category listings, search results are neither deduplicated nor
    /// capped: the same title from two sources appears twice.
    pub async fn search(&self, term: &str) -> AggregatedResult {
        let term = term.trim();
        if term.is_empty() {
            return AggregatedResult::empty();
        }
        let sources = self.selector().all_enabled();
        let mode = QueryMode::Search {
            term: term.to_string(),
        };
        let outcomes = self.fan_out(&sources, &mode).await;
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        let result = AggregatedResult::from(flatten(outcomes));

        record_request("search", result.len());
        tracing::info!(
            target: "aggregate",
            term_id = %anon_hash(term),
            sources = sources.len(),
            failed,
            records = result.len(),
            "search aggregated"
        );
        result
    }

    /// Detail records from one source. Unknown keys and source failures are errors.
    pub async fn detail(
        &self,
        source_key: &str,
        id: &str,
    ) -> Result<AggregatedResult, AggregatorError> {
        let source = self.find(source_key)?;
        let mode = QueryMode::Detail { id: id.to_string() };
        let records = self
            .client
            .query(&source, &mode)
            .await
            .into_result()
            .map_err(|failure| AggregatorError::Source {
                key: source.key.clone(),
                failure,
            })?;
        record_request("detail", records.len());
        Ok(AggregatedResult::from(records))
    }

    /// Latency of one source. Unknown keys are errors; unreachable sources are not.
    pub async fn latency_check(&self, source_key: &str) -> Result<LatencyProbe, AggregatorError> {
        let source = self.find(source_key)?;
        let result = probe(self.client.as_ref(), &source).await;
        record_request("check", 0);
        Ok(result)
    }

    /// Featured feed: the first configured source that answers with anything wins.
    pub async fn hot(&self) -> AggregatedResult {
        let sources = self.selector().by_keys(&self.cfg.hot.sources);
        let mode = QueryMode::Hot {
            hours: self.cfg.hot.hours,
        };
        let records =
            scan_first_success(self.client.as_ref(), &sources, &mode, self.cfg.hot.cap).await;

        record_request("hot", records.len());
        tracing::info!(
            target: "aggregate",
            candidates = sources.len(),
            records = records.len(),
            "hot feed served"
        );
        AggregatedResult::from(records)
    }

    fn find(&self, source_key: &str) -> Result<Source, AggregatorError> {
        self.registry
            .find_source(source_key)
            .ok_or_else(|| AggregatorError::NotFound {
                key: source_key.to_string(),
            })
    }
}

fn record_request(op: &'static str, records: usize) {
    crate::metrics::ensure_metrics_described();
    counter!("aggregate_requests_total", "op" => op).increment(1);
    counter!("aggregate_records_total", "op" => op).increment(records as u64);
}
