// src/aggregate/types.rs
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::registry::Source;

/// Upstream item field carrying the display title used for deduplication.
pub const TITLE_FIELD: &str = "vod_name";

/// Latency reported when a source could not be reached within the probe budget.
pub const UNREACHABLE_LATENCY_MS: u64 = 9999;

/// What a single upstream call asks the source for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    /// One page of a category listing.
    Category { type_id: u32, page: u32 },
    /// Keyword search.
    Search { term: String },
    /// Detail lookup for one item id.
    Detail { id: String },
    /// Recently updated items, used by the featured feed.
    Hot { hours: u32 },
    /// Minimal listing used only to measure round-trip latency.
    Probe,
}

impl QueryMode {
    pub fn label(&self) -> &'static str {
        match self {
            QueryMode::Category { .. } => "category",
            QueryMode::Search { .. } => "search",
            QueryMode::Detail { .. } => "detail",
            QueryMode::Hot { .. } => "hot",
            QueryMode::Probe => "probe",
        }
    }

    /// Query-string pairs appended to the source endpoint.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            QueryMode::Category { type_id, page } => vec![
                ("ac", "list".to_string()),
                ("t", type_id.to_string()),
                ("pg", (*page).max(1).to_string()),
                ("out", "json".to_string()),
            ],
            QueryMode::Search { term } => vec![
                ("ac", "list".to_string()),
                ("wd", term.clone()),
                ("out", "json".to_string()),
            ],
            QueryMode::Detail { id } => vec![
                ("ac", "detail".to_string()),
                ("ids", id.clone()),
                ("out", "json".to_string()),
            ],
            QueryMode::Hot { hours } => vec![
                ("ac", "list".to_string()),
                ("pg", "1".to_string()),
                ("h", hours.to_string()),
                ("out", "json".to_string()),
            ],
            QueryMode::Probe => vec![("ac", "list".to_string()), ("pg", "1".to_string())],
        }
    }
}

/// Coarse failure classification, exposed to callers of single-source operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Timeout,
    Transport,
    Malformed,
}

/// Why one source did not produce records for one call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceFailure {
    #[error("timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("transport error: {reason}")]
    Transport {
        reason: String,
        /// Upstream HTTP status when the failure was a non-2xx answer.
        status: Option<u16>,
    },

    #[error("malformed response: {reason}")]
    Malformed { reason: String },
}

impl SourceFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            SourceFailure::Timeout { .. } => FailureKind::Timeout,
            SourceFailure::Transport { .. } => FailureKind::Transport,
            SourceFailure::Malformed { .. } => FailureKind::Malformed,
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        SourceFailure::Transport {
            reason: reason.into(),
            status: None,
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        SourceFailure::Malformed {
            reason: reason.into(),
        }
    }
}

/// A normalized content item with its provenance attached.
///
/// Serializes as the upstream item with `site_key` / `site_name` added, so
/// clients keep seeing the fields the source returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(skip)]
    pub title: String,
    #[serde(rename = "site_key")]
    pub source_key: String,
    #[serde(rename = "site_name")]
    pub source_name: String,
    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl Record {
    /// Wrap one upstream item. Provenance fields already present upstream are replaced.
    pub fn from_item(mut item: Map<String, Value>, source: &Source) -> Self {
        item.remove("site_key");
        item.remove("site_name");
        let title = match item.get(TITLE_FIELD) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Self {
            title,
            source_key: source.key.clone(),
            source_name: source.name.clone(),
            raw: item,
        }
    }

    /// Minimal record carrying only a title, mostly useful for tests and fixtures.
    pub fn titled(title: &str, source_key: &str, source_name: &str) -> Self {
        let mut raw = Map::new();
        raw.insert(TITLE_FIELD.to_string(), Value::String(title.to_string()));
        Self {
            title: title.to_string(),
            source_key: source_key.to_string(),
            source_name: source_name.to_string(),
            raw,
        }
    }
}

/// Result of one source client invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Success(Vec<Record>),
    Failure(SourceFailure),
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Success(_))
    }

    pub fn records(&self) -> &[Record] {
        match self {
            QueryOutcome::Success(records) => records,
            QueryOutcome::Failure(_) => &[],
        }
    }

    pub fn into_result(self) -> Result<Vec<Record>, SourceFailure> {
        match self {
            QueryOutcome::Success(records) => Ok(records),
            QueryOutcome::Failure(failure) => Err(failure),
        }
    }

    pub(crate) fn outcome_label(&self) -> &'static str {
        match self {
            QueryOutcome::Success(_) => "success",
            QueryOutcome::Failure(f) => match f.kind() {
                FailureKind::Timeout => "timeout",
                FailureKind::Transport => "transport",
                FailureKind::Malformed => "malformed",
            },
        }
    }
}

/// Combined, ordered result handed back to callers as `{ "list": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedResult {
    #[serde(rename = "list")]
    pub records: Vec<Record>,
}

impl AggregatedResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.title.as_str()).collect()
    }
}

impl From<Vec<Record>> for AggregatedResult {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

/// Measured round-trip time, or the unreachable sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latency {
    Millis(u64),
    Unreachable,
}

impl Latency {
    pub fn as_millis(&self) -> u64 {
        match self {
            Latency::Millis(ms) => *ms,
            Latency::Unreachable => UNREACHABLE_LATENCY_MS,
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, Latency::Millis(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyProbe {
    pub source_key: String,
    pub latency: Latency,
}

impl Serialize for LatencyProbe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            key: &'a str,
            latency: u64,
            reachable: bool,
        }
        Wire {
            key: &self.source_key,
            latency: self.latency.as_millis(),
            reachable: self.latency.is_reachable(),
        }
        .serialize(serializer)
    }
}
