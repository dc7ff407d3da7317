// src/aggregate/probe.rs
use std::time::Instant;

use crate::aggregate::client::SourceClient;
use crate::aggregate::types::{Latency, LatencyProbe, QueryMode, QueryOutcome, Record};
use crate::registry::Source;

/// Round-trip time of one minimal listing call, or `Unreachable` on any failure.
/// Bounded by the client's probe timeout.
pub async fn probe(client: &dyn SourceClient, source: &Source) -> LatencyProbe {
    let t0 = Instant::now();
    let outcome = client.query(source, &QueryMode::Probe).await;
    let latency = match outcome {
        QueryOutcome::Success(_) => Latency::Millis(t0.elapsed().as_millis() as u64),
        QueryOutcome::Failure(failure) => {
            tracing::info!(
                target: "aggregate",
                source = %source.key,
                error = %failure,
                "probe: source unreachable"
            );
            Latency::Unreachable
        }
    };
    LatencyProbe {
        source_key: source.key.clone(),
        latency,
    }
}

/// Query sources one at a time, in the given order, and return the first non-empty
/// success truncated to `cap`. Sources after the winner are never called.
/// Empty when every source fails or answers with nothing.
pub async fn scan_first_success(
    client: &dyn SourceClient,
    sources: &[Source],
    mode: &QueryMode,
    cap: usize,
) -> Vec<Record> {
    for source in sources {
        match client.query(source, mode).await {
            QueryOutcome::Success(mut records) if !records.is_empty() => {
                tracing::debug!(
                    target: "aggregate",
                    source = %source.key,
                    records = records.len(),
                    "scan: first usable source"
                );
                records.truncate(cap);
                return records;
            }
            QueryOutcome::Success(_) => {
                tracing::debug!(target: "aggregate", source = %source.key, "scan: empty answer, moving on");
            }
            QueryOutcome::Failure(failure) => {
                tracing::debug!(
                    target: "aggregate",
                    source = %source.key,
                    error = %failure,
                    "scan: source failed, moving on"
                );
            }
        }
    }
    Vec::new()
}
