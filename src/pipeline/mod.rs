//! Single-pass ranking pipeline
//!
//! raw text → parse → dedupe → URL check → exclusion → classify → probe → rank
//!
//! Configuration problems are reported when the pipeline is built, before any
//! probing. Once built, a run never fails: anomalies are counted in
//! [`PipelineStats`] and an empty input simply produces an empty playlist.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::{AppResult, ProbeError};
use crate::ingestor::m3u_parser;
use crate::models::{Entry, ProbeResult, RankedPlaylist, RetentionPolicy};
use crate::services::{Classifier, ProbeScheduler, ProbeStrategy, build_strategy, rank};
use crate::utils::human_format::{format_duration, format_ratio};

/// Counters collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub parsed: usize,
    pub duplicates_removed: usize,
    pub rejected_empty_url: usize,
    pub excluded: usize,
    pub unmatched: usize,
    pub probed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub abandoned: usize,
    pub ranked: usize,
    pub elapsed_ms: u64,
}

impl PipelineStats {
    /// One-line human summary of the run
    pub fn summary(&self) -> String {
        format!(
            "parsed {} entries ({} duplicates, {} without URL, {} excluded, {} unmatched); \
             probed {}: {} reachable ({}), {} failed, {} abandoned; {} ranked in {}",
            self.parsed,
            self.duplicates_removed,
            self.rejected_empty_url,
            self.excluded,
            self.unmatched,
            self.probed,
            self.succeeded,
            format_ratio(self.succeeded, self.probed),
            self.failed,
            self.abandoned,
            self.ranked,
            format_duration(self.elapsed_ms)
        )
    }

    fn record_probes(&mut self, results: &[ProbeResult]) {
        self.probed = results.len();
        self.succeeded = results.iter().filter(|r| r.success()).count();
        self.abandoned = results
            .iter()
            .filter(|r| r.outcome.failure() == Some(&ProbeError::Abandoned))
            .count();
        self.failed = self.probed - self.succeeded - self.abandoned;
    }
}

/// The ranked playlist together with the statistics of the run that produced it
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub playlist: RankedPlaylist,
    pub stats: PipelineStats,
}

pub struct RankingPipeline {
    classifier: Classifier,
    scheduler: ProbeScheduler,
    retention: RetentionPolicy,
    exclude_keywords: Vec<String>,
    case_sensitive: bool,
    deduplicate: bool,
}

impl RankingPipeline {
    /// Validate the configuration and build the configured probe strategy
    pub fn from_config(config: &Config) -> AppResult<Self> {
        config.validate()?;
        let strategy = build_strategy(&config.probe)?;
        Self::build(config, strategy)
    }

    /// Validate the configuration and use the given strategy instead of the configured one
    pub fn with_strategy(config: &Config, strategy: Arc<dyn ProbeStrategy>) -> AppResult<Self> {
        config.validate()?;
        Self::build(config, strategy)
    }

    fn build(config: &Config, strategy: Arc<dyn ProbeStrategy>) -> AppResult<Self> {
        let classification = &config.classification;
        let classifier = Classifier::new(
            classification.categories.clone(),
            classification.case_sensitive,
            classification.unmatched,
            classification.unclassified_label.clone(),
        );
        let scheduler = ProbeScheduler::new(
            strategy,
            config.probe.timeout,
            config.probe.effective_max_workers(),
        )
        .with_pipeline_timeout(config.probe.pipeline_timeout);

        let exclude_keywords = classification
            .exclude_keywords
            .iter()
            .filter(|k| !k.is_empty())
            .map(|k| {
                if classification.case_sensitive {
                    k.clone()
                } else {
                    k.to_lowercase()
                }
            })
            .collect();

        Ok(Self {
            classifier,
            scheduler,
            retention: config.ranking.retention,
            exclude_keywords,
            case_sensitive: classification.case_sensitive,
            deduplicate: classification.deduplicate,
        })
    }

    fn is_excluded(&self, name: &str) -> bool {
        if self.exclude_keywords.is_empty() {
            return false;
        }
        if self.case_sensitive {
            self.exclude_keywords.iter().any(|k| name.contains(k.as_str()))
        } else {
            let name = name.to_lowercase();
            self.exclude_keywords.iter().any(|k| name.contains(k.as_str()))
        }
    }

    /// Run the whole pipeline over decoded playlist text.
    pub async fn run(&self, raw_text: &str, cancel: &CancellationToken) -> PipelineReport {
        let started = Instant::now();
        let mut stats = PipelineStats::default();

        let entries = m3u_parser::parse(raw_text);
        stats.parsed = entries.len();
        info!("Parsed {} entries", stats.parsed);

        let candidates = self.prepare(entries, &mut stats);
        let (classified, unmatched) = self.classifier.classify_all(candidates);
        stats.unmatched = unmatched;
        info!(
            "Classified {} entries ({} unmatched)",
            classified.len(),
            unmatched
        );

        let results = self.scheduler.run_all(classified, cancel).await;
        stats.record_probes(&results);

        let playlist = rank(results, &self.classifier.section_order(), self.retention);
        stats.ranked = playlist.entry_count();
        stats.elapsed_ms = started.elapsed().as_millis() as u64;

        info!("Pipeline complete: {}", stats.summary());
        PipelineReport { playlist, stats }
    }

    /// Deduplicate, drop entries without a URL and apply exclusions.
    /// Positions are assigned from parse order before anything is removed.
    fn prepare(&self, entries: Vec<Entry>, stats: &mut PipelineStats) -> Vec<(usize, Entry)> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut kept = Vec::with_capacity(entries.len());

        for (position, entry) in entries.into_iter().enumerate() {
            if self.deduplicate && !seen.insert((entry.name.clone(), entry.url.clone())) {
                debug!("Skipping duplicate entry '{}'", entry.name);
                stats.duplicates_removed += 1;
                continue;
            }
            if entry.url.trim().is_empty() {
                warn!("Skipping '{}': no URL", entry.name);
                stats.rejected_empty_url += 1;
                continue;
            }
            if self.is_excluded(&entry.name) {
                debug!("Excluding '{}'", entry.name);
                stats.excluded += 1;
                continue;
            }
            kept.push((position, entry));
        }

        if stats.duplicates_removed > 0 {
            info!("Removed {} duplicate entries", stats.duplicates_removed);
        }
        kept
    }
}
