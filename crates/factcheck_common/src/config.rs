//! Fact-check configuration.
//!
//! Config file: ~/.config/factcheck/config.toml or /etc/factcheck/config.toml.
//! Environment variables override file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Run-level limits for a single verification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Hard cap on provider queries for a whole run
    pub max_run_queries: u32,
    /// Hard cap on provider queries (and planned queries) per claim
    pub max_queries_per_claim: u32,
    /// Wall-clock deadline for a run
    pub timeout_ms: u64,
    /// Results requested from the provider per query
    pub results_per_claim: u32,
    pub freshness_default: String,
    /// Maximum evidence items kept per claim
    pub max_sources_per_claim: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            max_run_queries: 90,
            max_queries_per_claim: 5,
            timeout_ms: 240_000,
            results_per_claim: 12,
            freshness_default: "month".to_string(),
            max_sources_per_claim: 6,
        }
    }
}

impl VerificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_ms: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 15 * 60 * 1000,
            max_entries: 200,
        }
    }
}

/// Trusted-source policy. The version salts cache keys so a policy change
/// never serves results cached under the old one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowlistConfig {
    pub version: String,
    pub tlds: Vec<String>,
    pub news_domains: Vec<String>,
}

impl Default for AllowlistConfig {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            tlds: vec![".gov".to_string(), ".edu".to_string(), ".org".to_string()],
            news_domains: [
                "nytimes.com",
                "washingtonpost.com",
                "wsj.com",
                "cnn.com",
                "foxnews.com",
                "nbcnews.com",
                "cbsnews.com",
                "abcnews.go.com",
                "apnews.com",
                "npr.org",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    /// Per-attempt bound
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    /// Linear backoff unit: attempt N waits `backoff_ms * N`
    pub backoff_ms: u64,
    /// Result count used by the degraded (no livecrawl) retry
    pub degraded_count: u32,
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.you.com/v1/search".to_string(),
            api_key: None,
            request_timeout_ms: 20_000,
            max_retries: 2,
            backoff_ms: 300,
            degraded_count: 4,
            user_agent: "BiasLens/1.0".to_string(),
        }
    }
}

/// Verdict reasoning model endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactCheckConfig {
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub allowlist: AllowlistConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl FactCheckConfig {
    /// Get default user config path: ~/.config/factcheck/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("factcheck").join("config.toml"))
    }

    /// Get system config path: /etc/factcheck/config.toml
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/factcheck/config.toml")
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. `FACTCHECK_CONFIG` path
    /// 2. User config (~/.config/factcheck/config.toml)
    /// 3. System config (/etc/factcheck/config.toml)
    /// 4. Defaults
    ///
    /// Environment overrides are applied on top of whichever was found.
    pub fn load() -> Result<Self> {
        let mut config = match Self::locate() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(explicit) = std::env::var("FACTCHECK_CONFIG") {
            return Some(PathBuf::from(explicit));
        }
        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Some(user_path);
            }
        }
        let system_path = Self::system_config_path();
        if system_path.exists() {
            return Some(system_path);
        }
        None
    }

    /// Load configuration from a specific file, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: FactCheckConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function so tests can
    /// inject values without touching the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let v = &mut self.verification;
        override_num(&lookup, "MAX_RUN_QUERIES", &mut v.max_run_queries);
        override_num(&lookup, "MAX_QUERIES_PER_CLAIM", &mut v.max_queries_per_claim);
        override_num(&lookup, "VERIFICATION_TIMEOUT_MS", &mut v.timeout_ms);
        override_num(&lookup, "RESULTS_PER_CLAIM", &mut v.results_per_claim);
        for key in ["FRESHNESS_DEFAULT", "FACTCHECK_FRESHNESS"] {
            if let Some(value) = non_empty(&lookup, key) {
                v.freshness_default = value;
            }
        }

        override_num(&lookup, "CACHE_TTL_MS", &mut self.cache.ttl_ms);
        override_num(&lookup, "CACHE_MAX_ENTRIES", &mut self.cache.max_entries);

        if let Some(version) = non_empty(&lookup, "ALLOWLIST_VERSION") {
            self.allowlist.version = version;
        }
        if let Some(key) = non_empty(&lookup, "YOU_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(endpoint) = non_empty(&lookup, "LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Some(model) = non_empty(&lookup, "LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(key) = non_empty(&lookup, "LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.verification.max_run_queries == 0 {
            anyhow::bail!("verification.max_run_queries must be greater than zero");
        }
        if self.verification.max_queries_per_claim == 0 {
            anyhow::bail!("verification.max_queries_per_claim must be greater than zero");
        }
        if self.verification.max_sources_per_claim == 0 {
            anyhow::bail!("verification.max_sources_per_claim must be greater than zero");
        }
        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be greater than zero");
        }
        Ok(())
    }

    /// Copy with secrets replaced, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.search.api_key.is_some() {
            copy.search.api_key = Some("<redacted>".to_string());
        }
        if copy.llm.api_key.is_some() {
            copy.llm.api_key = Some("<redacted>".to_string());
        }
        copy
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn override_num<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = non_empty(lookup, key) {
        match raw.parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Ignoring unparseable {}={:?}", key, raw),
        }
    }
}
