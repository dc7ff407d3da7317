// src/registry.rs
//! Read-only view of the configured content sources.
//!
//! Sources are owned by an external registry; the aggregator only ever reads an
//! immutable snapshot of them. The file-backed [`RegistryHandle`] is the in-process
//! stand-in: it loads `[[sources]]` from TOML or JSON and can swap in a freshly
//! loaded snapshot without disturbing requests that already hold the old one.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use url::Url;

pub const ENV_SOURCES_PATH: &str = "AGGREGATOR_SOURCES_PATH";
pub const DEFAULT_SOURCES_TOML: &str = "config/sources.toml";
pub const DEFAULT_SOURCES_JSON: &str = "config/sources.json";

/// One external content provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub key: String,
    pub name: String,
    pub endpoint: Url,
    pub enabled: bool,
}

impl Source {
    /// Enabled source with a validated endpoint.
    pub fn new(key: &str, name: &str, endpoint: &str) -> Result<Self> {
        let key = key.trim();
        if key.is_empty() {
            bail!("source key must not be empty");
        }
        let endpoint = Url::parse(endpoint.trim())
            .with_context(|| format!("source `{key}`: invalid endpoint `{endpoint}`"))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            bail!("source `{key}`: endpoint must be http(s), got `{}`", endpoint.scheme());
        }
        let name = match name.trim() {
            "" => key.to_string(),
            n => n.to_string(),
        };
        Ok(Self {
            key: key.to_string(),
            name,
            endpoint,
            enabled: true,
        })
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Read interface the aggregation core uses. Every call returns owned data
/// derived from one immutable snapshot.
pub trait SourceRegistry: Send + Sync {
    /// Enabled sources in registry order.
    fn list_enabled_sources(&self) -> Vec<Source>;

    /// Any registered source with this key, enabled or not.
    fn find_source(&self, key: &str) -> Option<Source>;

    /// Enabled sources for `keys`, in the order given. Unknown, disabled and
    /// repeated keys are silently skipped.
    fn find_sources_by_keys(&self, keys: &[String]) -> Vec<Source>;
}

/// Immutable list of sources, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    sources: Arc<Vec<Source>>,
}

impl RegistrySnapshot {
    /// Build a snapshot, rejecting duplicate keys.
    pub fn new(sources: Vec<Source>) -> Result<Self> {
        let mut seen = HashSet::new();
        for s in &sources {
            if !seen.insert(s.key.as_str()) {
                bail!("duplicate source key `{}`", s.key);
            }
        }
        Ok(Self {
            sources: Arc::new(sources),
        })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn all(&self) -> &[Source] {
        &self.sources
    }
}

impl SourceRegistry for RegistrySnapshot {
    fn list_enabled_sources(&self) -> Vec<Source> {
        self.sources.iter().filter(|s| s.enabled).cloned().collect()
    }

    fn find_source(&self, key: &str) -> Option<Source> {
        self.sources.iter().find(|s| s.key == key).cloned()
    }

    fn find_sources_by_keys(&self, keys: &[String]) -> Vec<Source> {
        let mut seen = HashSet::new();
        keys.iter()
            .filter(|k| seen.insert(k.as_str()))
            .filter_map(|k| self.sources.iter().find(|s| s.enabled && &s.key == k))
            .cloned()
            .collect()
    }
}

/// Shared handle over the current snapshot; reload swaps the whole list atomically.
#[derive(Clone)]
pub struct RegistryHandle {
    inner: Arc<RwLock<RegistrySnapshot>>,
    origin: Option<PathBuf>,
}

impl RegistryHandle {
    pub fn new(snapshot: RegistrySnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
            origin: None,
        }
    }

    /// Load from an explicit file and remember it for [`RegistryHandle::reload`].
    pub fn from_path(path: &Path) -> Result<Self> {
        let snapshot = load_sources_from(path)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(snapshot)),
            origin: Some(path.to_path_buf()),
        })
    }

    /// Load using env var + fallbacks:
    /// 1) $AGGREGATOR_SOURCES_PATH
    /// 2) config/sources.toml
    /// 3) config/sources.json
    ///
    /// With none present the registry starts empty.
    pub fn load_default() -> Result<Self> {
        match resolve_default_path()? {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::warn!(target: "registry", "no sources file found; registry is empty");
                Ok(Self::new(RegistrySnapshot::default()))
            }
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        match self.inner.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, snapshot: RegistrySnapshot) {
        match self.inner.write() {
            Ok(mut g) => *g = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// Re-read the backing file. Requests already holding a snapshot keep it.
    pub fn reload(&self) -> Result<usize> {
        let path = self
            .origin
            .as_ref()
            .ok_or_else(|| anyhow!("registry has no backing file to reload from"))?;
        let fresh = load_sources_from(path)?;
        let n = fresh.len();
        self.replace(fresh);
        tracing::info!(target: "registry", sources = n, path = %path.display(), "registry reloaded");
        Ok(n)
    }
}

impl SourceRegistry for RegistryHandle {
    fn list_enabled_sources(&self) -> Vec<Source> {
        self.snapshot().list_enabled_sources()
    }

    fn find_source(&self, key: &str) -> Option<Source> {
        self.snapshot().find_source(key)
    }

    fn find_sources_by_keys(&self, keys: &[String]) -> Vec<Source> {
        self.snapshot().find_sources_by_keys(keys)
    }
}

fn resolve_default_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_SOURCES_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_SOURCES_TOML, DEFAULT_SOURCES_JSON] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return Ok(Some(pb));
        }
    }
    Ok(None)
}

/// Load sources from a TOML or JSON file.
pub fn load_sources_from(path: &Path) -> Result<RegistrySnapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, &ext)
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    key: String,
    #[serde(default)]
    name: String,
    #[serde(alias = "endpoint")]
    api: String,
    #[serde(default = "default_active", alias = "enabled")]
    active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: Vec<SourceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonSources {
    Wrapped(SourcesFile),
    Bare(Vec<SourceEntry>),
}

pub fn parse_sources(s: &str, hint_ext: &str) -> Result<RegistrySnapshot> {
    let entries = if hint_ext == "json" {
        parse_json(s)?
    } else if hint_ext == "toml" {
        toml::from_str::<SourcesFile>(s)
            .context("parsing sources toml")?
            .sources
    } else {
        match toml::from_str::<SourcesFile>(s) {
            Ok(f) => f.sources,
            Err(_) => parse_json(s)?,
        }
    };

    let sources = entries
        .into_iter()
        .map(|e| {
            let src = Source::new(&e.key, &e.name, &e.api)?;
            Ok(if e.active { src } else { src.disabled() })
        })
        .collect::<Result<Vec<_>>>()?;
    RegistrySnapshot::new(sources)
}

fn parse_json(s: &str) -> Result<Vec<SourceEntry>> {
    let parsed: JsonSources = serde_json::from_str(s).context("parsing sources json")?;
    Ok(match parsed {
        JsonSources::Wrapped(f) => f.sources,
        JsonSources::Bare(v) => v,
    })
}
