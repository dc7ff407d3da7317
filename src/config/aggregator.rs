// src/config/aggregator.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::aggregate::types::QueryMode;

pub const ENV_CONFIG_PATH: &str = "AGGREGATOR_CONFIG_PATH";
pub const ENV_JWT_SECRET: &str = "AGGREGATOR_JWT_SECRET";
const DEFAULT_TOML: &str = "config/aggregator.toml";
const DEFAULT_JSON: &str = "config/aggregator.json";

fn default_list_ms() -> u64 {
    4000
}
fn default_search_ms() -> u64 {
    6000
}
fn default_detail_ms() -> u64 {
    6000
}
fn default_probe_ms() -> u64 {
    3000
}
fn default_hot_ms() -> u64 {
    3000
}

/// Per-mode budgets, enforced on every single upstream call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_list_ms")]
    pub list_ms: u64,
    #[serde(default = "default_search_ms")]
    pub search_ms: u64,
    #[serde(default = "default_detail_ms")]
    pub detail_ms: u64,
    #[serde(default = "default_probe_ms")]
    pub probe_ms: u64,
    #[serde(default = "default_hot_ms")]
    pub hot_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            list_ms: default_list_ms(),
            search_ms: default_search_ms(),
            detail_ms: default_detail_ms(),
            probe_ms: default_probe_ms(),
            hot_ms: default_hot_ms(),
        }
    }
}

impl Timeouts {
    pub fn for_mode(&self, mode: &QueryMode) -> Duration {
        let ms = match mode {
            QueryMode::Category { .. } => self.list_ms,
            QueryMode::Search { .. } => self.search_ms,
            QueryMode::Detail { .. } => self.detail_ms,
            QueryMode::Hot { .. } => self.hot_ms,
            QueryMode::Probe => self.probe_ms,
        };
        Duration::from_millis(ms)
    }

    /// Same budget for every mode; handy in tests.
    pub fn uniform(ms: u64) -> Self {
        Self {
            list_ms: ms,
            search_ms: ms,
            detail_ms: ms,
            probe_ms: ms,
            hot_ms: ms,
        }
    }

    fn sanitize(&mut self) {
        let d = Self::default();
        if self.list_ms == 0 {
            self.list_ms = d.list_ms;
        }
        if self.search_ms == 0 {
            self.search_ms = d.search_ms;
        }
        if self.detail_ms == 0 {
            self.detail_ms = d.detail_ms;
        }
        if self.probe_ms == 0 {
            self.probe_ms = d.probe_ms;
        }
        if self.hot_ms == 0 {
            self.hot_ms = d.hot_ms;
        }
    }
}

fn default_category_fanout() -> usize {
    3
}
fn default_category_cap() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// How many enabled sources a category request fans out to.
    #[serde(default = "default_category_fanout")]
    pub fanout: usize,
    #[serde(default = "default_category_cap")]
    pub cap: usize,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            fanout: default_category_fanout(),
            cap: default_category_cap(),
        }
    }
}

fn default_hot_sources() -> Vec<String> {
    vec!["ffzy".into(), "bfzy".into(), "lzi".into()]
}
fn default_hot_cap() -> usize {
    12
}
fn default_hot_hours() -> u32 {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotConfig {
    /// Preference order for the featured feed scan.
    #[serde(default = "default_hot_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_hot_cap")]
    pub cap: usize,
    #[serde(default = "default_hot_hours")]
    pub hours: u32,
}

impl Default for HotConfig {
    fn default() -> Self {
        Self {
            sources: default_hot_sources(),
            cap: default_hot_cap(),
            hours: default_hot_hours(),
        }
    }
}

fn default_user_agent() -> String {
    concat!("hometv-aggregator/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_connect_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_jwt_secret() -> String {
    "ENV".to_string()
}
fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the account service. "ENV" means: read AGGREGATOR_JWT_SECRET.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Caller ids (the token's `id` claim) allowed to use admin routes.
    #[serde(default)]
    pub admins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            required: default_required(),
            admins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub category: CategoryConfig,
    #[serde(default)]
    pub hot: HotConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AggregatorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading aggregator config from {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let cfg = if is_json {
            Self::from_json_str(&data)?
        } else {
            Self::from_toml_str(&data)?
        };
        cfg.finish()
    }

    /// Load using env var + fallbacks:
    /// 1) $AGGREGATOR_CONFIG_PATH
    /// 2) config/aggregator.toml
    /// 3) config/aggregator.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        for candidate in [DEFAULT_TOML, DEFAULT_JSON] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
        }
        Self::default().finish()
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing aggregator toml")
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("parsing aggregator json")
    }

    /// Resolve indirections and clamp nonsensical values.
    fn finish(mut self) -> Result<Self> {
        if self.auth.jwt_secret.trim().eq_ignore_ascii_case("env") {
            self.auth.jwt_secret = match env::var(ENV_JWT_SECRET) {
                Ok(v) => v,
                Err(_) if !self.auth.required => String::new(),
                Err(_) => anyhow::bail!("Missing {ENV_JWT_SECRET} env var"),
            };
        }
        if self.auth.required && self.auth.jwt_secret.is_empty() {
            anyhow::bail!("auth is required but no jwt secret is configured");
        }

        self.timeouts.sanitize();
        if self.category.fanout == 0 {
            self.category.fanout = default_category_fanout();
        }
        if self.http.connect_timeout_ms == 0 {
            self.http.connect_timeout_ms = default_connect_timeout_ms();
        }
        Ok(self)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.http.connect_timeout_ms)
    }
}
