use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{AppError, AppResult};
use crate::models::{CategoryRule, RetentionPolicy, StrategyKind, UnmatchedPolicy};
use crate::output::OutputFormat;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where the raw playlist comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Remote playlist fetched with a single GET
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Local playlist; also the download cache and offline fallback when `url` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_fetch_timeout", with = "duration_serde::duration")]
    pub fetch_timeout: Duration,
    #[serde(default = "default_cache_downloads")]
    pub cache_downloads: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_strategy")]
    pub strategy: StrategyKind,
    /// Per-probe budget
    #[serde(default = "default_probe_timeout", with = "duration_serde::duration")]
    pub timeout: Duration,
    /// Worker ceiling; falls back to a per-strategy default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
    /// Overall deadline for the probing stage; derived from the input size when unset
    #[serde(
        default,
        with = "duration_serde::option_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub pipeline_timeout: Option<Duration>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub decode: DecodeConfig,
}

/// Settings for the external decode probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeConfig {
    #[serde(default = "default_ffprobe_command")]
    pub ffprobe_command: String,
    /// Bytes ffprobe may read before deciding on a format
    #[serde(default = "default_probesize")]
    pub probesize: u64,
    #[serde(default = "default_analyzeduration", with = "duration_serde::duration")]
    pub analyzeduration: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
    #[serde(default)]
    pub unmatched: UnmatchedPolicy,
    #[serde(default = "default_unclassified_label")]
    pub unclassified_label: String,
    /// Entries whose name contains any of these are dropped before classification
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    /// Collapse exact duplicate (name, url) pairs, keeping the first
    #[serde(default = "default_deduplicate")]
    pub deduplicate: bool,
    /// Ordered category table; the first matching category wins
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default)]
    pub retention: RetentionPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_output_title")]
    pub title: String,
    #[serde(default = "default_write_bom")]
    pub write_bom: bool,
    #[serde(default = "default_write_timestamp")]
    pub timestamp: bool,
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS)
}
fn default_cache_downloads() -> bool {
    DEFAULT_CACHE_DOWNLOADS
}
fn default_strategy() -> StrategyKind {
    StrategyKind::Tcp
}
fn default_probe_timeout() -> Duration {
    Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS)
}
fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
fn default_ffprobe_command() -> String {
    DEFAULT_FFPROBE_COMMAND.to_string()
}
fn default_probesize() -> u64 {
    DEFAULT_PROBESIZE_BYTES
}
fn default_analyzeduration() -> Duration {
    Duration::from_millis(DEFAULT_ANALYZEDURATION_MILLIS)
}
fn default_case_sensitive() -> bool {
    DEFAULT_CASE_SENSITIVE
}
fn default_unclassified_label() -> String {
    DEFAULT_UNCLASSIFIED_LABEL.to_string()
}
fn default_deduplicate() -> bool {
    DEFAULT_DEDUPLICATE
}
fn default_categories() -> Vec<CategoryRule> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(name, keywords)| CategoryRule::new(*name, keywords))
        .collect()
}
fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}
fn default_output_title() -> String {
    DEFAULT_OUTPUT_TITLE.to_string()
}
fn default_write_bom() -> bool {
    DEFAULT_WRITE_BOM
}
fn default_write_timestamp() -> bool {
    DEFAULT_WRITE_TIMESTAMP
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            file: None,
            fetch_timeout: default_fetch_timeout(),
            cache_downloads: default_cache_downloads(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            timeout: default_probe_timeout(),
            max_workers: None,
            pipeline_timeout: None,
            user_agent: default_user_agent(),
            decode: DecodeConfig::default(),
        }
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            ffprobe_command: default_ffprobe_command(),
            probesize: default_probesize(),
            analyzeduration: default_analyzeduration(),
        }
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            case_sensitive: default_case_sensitive(),
            unmatched: UnmatchedPolicy::default(),
            unclassified_label: default_unclassified_label(),
            exclude_keywords: Vec::new(),
            deduplicate: default_deduplicate(),
            categories: default_categories(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: OutputFormat::default(),
            title: default_output_title(),
            write_bom: default_write_bom(),
            timestamp: default_write_timestamp(),
        }
    }
}

impl ProbeConfig {
    /// Worker ceiling actually used for this run
    pub fn effective_max_workers(&self) -> usize {
        self.max_workers.unwrap_or(match self.strategy {
            StrategyKind::Tcp => DEFAULT_TCP_WORKERS,
            StrategyKind::Http => DEFAULT_HTTP_WORKERS,
            StrategyKind::Decode => DEFAULT_DECODE_WORKERS,
        })
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.timeout.is_zero() {
            return Err(AppError::configuration("probe.timeout must be greater than zero"));
        }
        if self.timeout > Duration::from_secs(MAX_PROBE_TIMEOUT_SECS) {
            return Err(AppError::configuration(format!(
                "probe.timeout must not exceed {MAX_PROBE_TIMEOUT_SECS}s"
            )));
        }
        match self.max_workers {
            Some(0) => {
                return Err(AppError::configuration("probe.max_workers must be at least 1"));
            }
            Some(workers) if workers > MAX_PROBE_WORKERS => {
                return Err(AppError::configuration(format!(
                    "probe.max_workers must not exceed {MAX_PROBE_WORKERS}"
                )));
            }
            _ => {}
        }
        if self.pipeline_timeout.is_some_and(|t| t.is_zero()) {
            return Err(AppError::configuration(
                "probe.pipeline_timeout must be greater than zero when set",
            ));
        }
        if self.strategy == StrategyKind::Decode {
            if self.decode.ffprobe_command.trim().is_empty() {
                return Err(AppError::configuration(
                    "probe.decode.ffprobe_command must not be empty",
                ));
            }
            let workers = self.effective_max_workers();
            if workers > MAX_RECOMMENDED_DECODE_WORKERS {
                warn!(
                    "Decode strategy configured with {} workers; each spawns an ffprobe process (recommended <= {})",
                    workers, MAX_RECOMMENDED_DECODE_WORKERS
                );
            }
        }
        Ok(())
    }
}

impl ClassificationConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.categories.is_empty() {
            return Err(AppError::configuration(
                "classification.categories must declare at least one category",
            ));
        }

        let mut seen = HashSet::new();
        for rule in &self.categories {
            if rule.name.trim().is_empty() {
                return Err(AppError::configuration("category names must not be blank"));
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(AppError::configuration(format!(
                    "duplicate category name '{}'",
                    rule.name
                )));
            }
            if rule.keywords.iter().all(|k| k.is_empty()) {
                warn!("Category '{}' has no keywords and will never match", rule.name);
            }
        }

        if self.unmatched == UnmatchedPolicy::Bucket {
            if self.unclassified_label.trim().is_empty() {
                return Err(AppError::configuration(
                    "classification.unclassified_label must not be blank",
                ));
            }
            if seen.contains(self.unclassified_label.as_str()) {
                return Err(AppError::configuration(format!(
                    "unclassified label '{}' collides with a declared category",
                    self.unclassified_label
                )));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and `IPTV_RANKER_*`
    /// environment variables, in increasing priority.
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = config_file {
            if path.exists() {
                info!("Loading configuration from {}", path.display());
            } else {
                info!(
                    "Configuration file {} not found, using defaults",
                    path.display()
                );
            }
            figment = figment.merge(Toml::file(path));
        }

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string on top of the defaults
    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string(contents))
            .extract()?;
        Ok(config)
    }

    /// Check every setting that would make a run meaningless. Called before any probing.
    pub fn validate(&self) -> AppResult<()> {
        self.probe.validate()?;
        self.classification.validate()?;
        if self.source.fetch_timeout.is_zero() {
            return Err(AppError::configuration(
                "source.fetch_timeout must be greater than zero",
            ));
        }
        Ok(())
    }

    /// The effective configuration rendered as TOML
    pub fn to_toml_string(&self) -> AppResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AppError::internal(format!("Failed to render configuration: {e}")))
    }
}
