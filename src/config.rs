//! TOML configuration parsing and validation.
//!
//! The configuration is read once at startup by [`load_config`] and passed
//! by reference afterwards. Confidence thresholds may additionally be
//! overridden from the environment; the overrides are applied here, during
//! loading, and never consulted again.
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/evh.sqlite"
//!
//! [retrieval]
//! target_count = 6
//! lambda = 0.7
//!
//! [confidence]
//! strong_hit_threshold = 0.62
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use evidence_harness_core::diversity::DiversityParams;
use evidence_harness_core::signals::{SignalThresholds, DEFAULT_LOW_CONFIDENCE_MARKER};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_target_count")]
    pub target_count: usize,
    #[serde(default = "default_lambda")]
    pub lambda: f64,
    #[serde(default = "default_min_candidates_for_mmr")]
    pub min_candidates_for_mmr: usize,
    #[serde(default = "default_dense_overfetch")]
    pub dense_overfetch: usize,
    #[serde(default = "default_lexical_overfetch")]
    pub lexical_overfetch: usize,
    #[serde(default = "default_substring_overfetch")]
    pub substring_overfetch: usize,
    #[serde(default = "default_dense_min_score")]
    pub dense_min_score: f64,
    #[serde(default = "default_substring_score")]
    pub substring_score: f64,
    #[serde(default = "default_adapter_timeout_ms")]
    pub adapter_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            target_count: default_target_count(),
            lambda: default_lambda(),
            min_candidates_for_mmr: default_min_candidates_for_mmr(),
            dense_overfetch: default_dense_overfetch(),
            lexical_overfetch: default_lexical_overfetch(),
            substring_overfetch: default_substring_overfetch(),
            dense_min_score: default_dense_min_score(),
            substring_score: default_substring_score(),
            adapter_timeout_ms: default_adapter_timeout_ms(),
        }
    }
}

fn default_target_count() -> usize {
    6
}
fn default_lambda() -> f64 {
    0.7
}
fn default_min_candidates_for_mmr() -> usize {
    3
}
fn default_dense_overfetch() -> usize {
    3
}
fn default_lexical_overfetch() -> usize {
    2
}
fn default_substring_overfetch() -> usize {
    1
}
fn default_dense_min_score() -> f64 {
    0.25
}
fn default_substring_score() -> f64 {
    0.05
}
fn default_adapter_timeout_ms() -> u64 {
    4000
}

impl RetrievalConfig {
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    /// Reranker parameters for a request asking for `target_count` results.
    pub fn diversity_params(&self, target_count: usize) -> DiversityParams {
        DiversityParams {
            lambda: self.lambda,
            k: target_count,
            min_candidates: self.min_candidates_for_mmr,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfidenceConfig {
    #[serde(default = "default_strong_hit_threshold")]
    pub strong_hit_threshold: f64,
    #[serde(default = "default_min_top_score")]
    pub min_top_score: f64,
    #[serde(default = "default_weak_bundle_avg")]
    pub weak_bundle_avg: f64,
    #[serde(default = "default_min_strong_hits")]
    pub min_strong_hits: usize,
    #[serde(default = "default_low_confidence_marker")]
    pub low_confidence_marker: String,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            strong_hit_threshold: default_strong_hit_threshold(),
            min_top_score: default_min_top_score(),
            weak_bundle_avg: default_weak_bundle_avg(),
            min_strong_hits: default_min_strong_hits(),
            low_confidence_marker: default_low_confidence_marker(),
        }
    }
}

fn default_strong_hit_threshold() -> f64 {
    0.62
}
fn default_min_top_score() -> f64 {
    0.55
}
fn default_weak_bundle_avg() -> f64 {
    0.5
}
fn default_min_strong_hits() -> usize {
    2
}
fn default_low_confidence_marker() -> String {
    DEFAULT_LOW_CONFIDENCE_MARKER.to_string()
}

impl ConfidenceConfig {
    pub fn thresholds(&self) -> SignalThresholds {
        SignalThresholds {
            strong_hit_threshold: self.strong_hit_threshold,
            min_top_score: self.min_top_score,
            weak_bundle_avg: self.weak_bundle_avg,
            min_strong_hits: self.min_strong_hits,
            low_confidence_marker: self.low_confidence_marker.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama, or an OpenAI-compatible gateway).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_input_chars() -> usize {
    8000
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

/// Read, override from the environment, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    apply_env_overrides(&mut config.confidence, |key| std::env::var(key).ok())?;
    validate(&config)?;

    Ok(config)
}

/// Apply `EVH_*` threshold overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(confidence: &mut ConfidenceConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("EVH_STRONG_HIT_THRESHOLD") {
        confidence.strong_hit_threshold = parse_override("EVH_STRONG_HIT_THRESHOLD", &v)?;
    }
    if let Some(v) = lookup("EVH_MIN_TOP_SCORE") {
        confidence.min_top_score = parse_override("EVH_MIN_TOP_SCORE", &v)?;
    }
    if let Some(v) = lookup("EVH_WEAK_BUNDLE_AVG") {
        confidence.weak_bundle_avg = parse_override("EVH_WEAK_BUNDLE_AVG", &v)?;
    }
    if let Some(v) = lookup("EVH_MIN_STRONG_HITS") {
        confidence.min_strong_hits = parse_override("EVH_MIN_STRONG_HITS", &v)?;
    }
    Ok(())
}

fn parse_override<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, value, e))
}

/// Check invariants that serde defaults cannot express.
pub fn validate(config: &Config) -> Result<()> {
    let r = &config.retrieval;

    if r.target_count < 1 {
        bail!("retrieval.target_count must be >= 1");
    }
    if !(0.0..=1.0).contains(&r.lambda) {
        bail!("retrieval.lambda must be in [0.0, 1.0]");
    }
    if r.dense_overfetch < 1 || r.lexical_overfetch < 1 || r.substring_overfetch < 1 {
        bail!("retrieval overfetch multipliers must be >= 1");
    }
    if !(-1.0..=1.0).contains(&r.dense_min_score) {
        bail!("retrieval.dense_min_score must be in [-1.0, 1.0]");
    }
    if r.adapter_timeout_ms == 0 {
        bail!("retrieval.adapter_timeout_ms must be > 0");
    }

    if config.embedding.max_input_chars == 0 {
        bail!("embedding.max_input_chars must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    Ok(())
}
