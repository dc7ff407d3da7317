// src/aggregate/fanout.rs
use futures::future::join_all;
use std::sync::Arc;

use crate::aggregate::client::SourceClient;
use crate::aggregate::types::{QueryMode, QueryOutcome, SourceFailure};
use crate::registry::Source;

/// Query every source concurrently and return one outcome per source, in input order.
///
/// Every call is spawned as its own task before any of them is awaited, so a slow
/// source delays nothing but its own slot, and only up to the client's per-call
/// timeout. All calls settle before this returns; a failing (or panicking) source
/// turns into a `Failure` for that slot and never cancels its siblings. How many
/// sources take part is the selector's decision, not this function's.
///
/// Tasks are detached: if the caller goes away, calls already started still run
/// to completion or timeout.
pub async fn fan_out(
    client: Arc<dyn SourceClient>,
    sources: &[Source],
    mode: &QueryMode,
) -> Vec<QueryOutcome> {
    let tasks: Vec<_> = sources
        .iter()
        .cloned()
        .map(|source| {
            let client = Arc::clone(&client);
            let mode = mode.clone();
            let key = source.key.clone();
            let handle = tokio::spawn(async move { client.query(&source, &mode).await });
            (key, handle)
        })
        .collect();

    join_all(tasks.into_iter().map(|(key, handle)| async move {
        match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                tracing::error!(
                    target: "aggregate",
                    source = %key,
                    error = %join_err,
                    "source task aborted"
                );
                QueryOutcome::Failure(SourceFailure::transport(format!(
                    "source task aborted: {join_err}"
                )))
            }
        }
    }))
    .await
}
