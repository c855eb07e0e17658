//! Core data model shared by the parser, prober, scheduler and ranker.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::errors::ProbeError;

/// A single `(display name, access URL)` pair extracted from a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub url: String,
    /// `key="value"` pairs found on a tagged marker line, in source order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
}

impl Entry {
    pub fn new<N: Into<String>, U: Into<String>>(name: N, url: U) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Vec<(String, String)>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Look up a marker attribute by key
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// One named bucket and the keywords that route a channel into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new<N: Into<String>>(name: N, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// An entry tagged with the category it was assigned before probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEntry {
    /// Index of the entry in parse order; the ranking tie-break key
    pub position: usize,
    pub entry: Entry,
    pub category: String,
}

/// Which probe strategy to run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StrategyKind {
    /// Raw TCP connect timing
    Tcp,
    /// HTTP HEAD (ranged GET fallback) status check
    Http,
    /// External ffprobe decode attempt
    Decode,
}

/// What happens to entries no category matched.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UnmatchedPolicy {
    #[default]
    Drop,
    /// Route to a synthetic bucket appended after all declared categories
    Bucket,
}

/// Which probe results survive into the ranked playlist.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RetentionPolicy {
    /// Successful probes only
    #[default]
    Strict,
    /// Everything, successes first
    Inclusive,
}

/// Stream description reported by the decode strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub format_name: Option<String>,
    pub bit_rate: Option<u64>,
    pub video_codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub audio_codec: Option<String>,
}

impl MediaSummary {
    pub fn resolution(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{w}x{h}")),
            _ => None,
        }
    }
}

/// Result of a single probe as returned by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Reachable {
        latency: Duration,
        media: Option<MediaSummary>,
    },
    Failed {
        reason: ProbeError,
    },
}

impl ProbeOutcome {
    pub fn reachable(latency: Duration) -> Self {
        Self::Reachable {
            latency,
            media: None,
        }
    }

    pub fn failed(reason: ProbeError) -> Self {
        Self::Failed { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Reachable { .. })
    }

    /// Measured latency in milliseconds; `f64::INFINITY` for failures
    pub fn latency_millis(&self) -> f64 {
        match self {
            Self::Reachable { latency, .. } => latency.as_nanos() as f64 / 1_000_000.0,
            Self::Failed { .. } => f64::INFINITY,
        }
    }

    pub fn failure(&self) -> Option<&ProbeError> {
        match self {
            Self::Failed { reason } => Some(reason),
            Self::Reachable { .. } => None,
        }
    }

    pub fn media(&self) -> Option<&MediaSummary> {
        match self {
            Self::Reachable { media, .. } => media.as_ref(),
            Self::Failed { .. } => None,
        }
    }
}

/// Outcome of probing one classified entry. Created once by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub position: usize,
    pub entry: Entry,
    pub category: String,
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    pub fn new(classified: ClassifiedEntry, outcome: ProbeOutcome) -> Self {
        Self {
            position: classified.position,
            entry: classified.entry,
            category: classified.category,
            outcome,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn latency_millis(&self) -> f64 {
        self.outcome.latency_millis()
    }
}

/// One category of the final playlist, best entry first.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSection {
    pub category: String,
    pub results: Vec<ProbeResult>,
}

/// The final, per-category, latency-sorted set of surviving entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedPlaylist {
    pub sections: Vec<RankedSection>,
}

impl RankedPlaylist {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Number of entries across all sections
    pub fn entry_count(&self) -> usize {
        self.sections.iter().map(|s| s.results.len()).sum()
    }

    pub fn section(&self, category: &str) -> Option<&RankedSection> {
        self.sections.iter().find(|s| s.category == category)
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.category.as_str()).collect()
    }
}
