// src/aggregate/merge.rs
//! Folding per-source outcomes into one answer. Pure: no I/O, never fails.

use std::collections::HashSet;

use crate::aggregate::types::{AggregatedResult, QueryOutcome, Record};

/// Successful records in source order, then item order. Failures contribute nothing.
pub fn flatten(outcomes: Vec<QueryOutcome>) -> Vec<Record> {
    outcomes
        .into_iter()
        .filter_map(|o| match o {
            QueryOutcome::Success(records) => Some(records),
            QueryOutcome::Failure(_) => None,
        })
        .flatten()
        .collect()
}

/// Keep the first record for every exact `title`; later ones are dropped whatever
/// their source. Titles compare byte-for-byte: no case folding, no trimming.
///
/// Returns the kept records and how many were dropped.
pub fn dedup_by_title(records: Vec<Record>) -> (Vec<Record>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut kept = Vec::with_capacity(records.len());
    let mut dropped = 0usize;
    for rec in records {
        if seen.insert(rec.title.clone()) {
            kept.push(rec);
        } else {
            dropped += 1;
        }
    }
    (kept, dropped)
}

/// Flatten, deduplicate by title, truncate to `cap`.
pub fn merge(outcomes: Vec<QueryOutcome>, cap: usize) -> AggregatedResult {
    merge_with_stats(outcomes, cap).0
}

/// Like [`merge`], also reporting how many duplicates were removed.
pub fn merge_with_stats(outcomes: Vec<QueryOutcome>, cap: usize) -> (AggregatedResult, usize) {
    let (mut records, dropped) = dedup_by_title(flatten(outcomes));
    records.truncate(cap);
    (AggregatedResult::from(records), dropped)
}
