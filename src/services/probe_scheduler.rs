//! Bounded concurrent probe execution
//!
//! Every classified entry is probed exactly once. At most `max_workers` probes
//! are in flight: a semaphore permit is acquired before each task is spawned
//! and released when the task ends, including when it is aborted. Each probe
//! runs under a hard deadline of `probe_timeout + grace`, so a strategy that
//! ignores its timeout still cannot hold a worker.
//!
//! The whole run is additionally bounded by an overall deadline and an
//! external [`CancellationToken`]. When either fires, outstanding probes are
//! aborted and reported as [`ProbeError::Abandoned`]; the scheduler always
//! returns exactly one result per input entry, in input order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::ProbeError;
use crate::models::{ClassifiedEntry, ProbeOutcome, ProbeResult};
use crate::services::stream_prober::ProbeStrategy;
use crate::utils::human_format::{format_duration, format_latency};
use crate::utils::url::UrlUtils;

/// Extra time a probe gets beyond its own timeout before it is dropped
pub const DEFAULT_PROBE_GRACE: Duration = Duration::from_millis(500);
/// Added on top of the derived overall deadline
pub const DEFAULT_DEADLINE_SLACK: Duration = Duration::from_secs(2);
const MAX_RUN_BUDGET: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const PROGRESS_LOG_INTERVAL: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    Completed,
    DeadlineExceeded,
    Cancelled,
}

pub struct ProbeScheduler {
    strategy: Arc<dyn ProbeStrategy>,
    probe_timeout: Duration,
    max_workers: usize,
    grace: Duration,
    pipeline_timeout: Option<Duration>,
}

impl ProbeScheduler {
    pub fn new(strategy: Arc<dyn ProbeStrategy>, probe_timeout: Duration, max_workers: usize) -> Self {
        Self {
            strategy,
            probe_timeout,
            max_workers,
            grace: DEFAULT_PROBE_GRACE,
            pipeline_timeout: None,
        }
    }

    /// Fix the overall deadline instead of deriving it from the input size
    pub fn with_pipeline_timeout(mut self, pipeline_timeout: Option<Duration>) -> Self {
        self.pipeline_timeout = pipeline_timeout;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Overall budget for probing `entry_count` entries.
    ///
    /// Unless configured explicitly this is one hard probe deadline per wave of
    /// `max_workers` probes, plus slack.
    pub fn overall_deadline(&self, entry_count: usize) -> Duration {
        let budget = match self.pipeline_timeout {
            Some(configured) => configured,
            None => {
                let waves = entry_count.div_ceil(self.max_workers.max(1));
                let waves = u32::try_from(waves).unwrap_or(u32::MAX);
                self.probe_timeout
                    .saturating_add(self.grace)
                    .checked_mul(waves)
                    .unwrap_or(MAX_RUN_BUDGET)
                    .saturating_add(DEFAULT_DEADLINE_SLACK)
            }
        };
        budget.min(MAX_RUN_BUDGET)
    }

    /// Probe every entry and return one result per entry, in input order.
    pub async fn run_all(
        &self,
        entries: Vec<ClassifiedEntry>,
        cancel: &CancellationToken,
    ) -> Vec<ProbeResult> {
        if entries.is_empty() {
            warn!("No entries to probe");
            return Vec::new();
        }
        if self.max_workers == 0 {
            warn!("max_workers is 0, skipping {} probes", entries.len());
            return Vec::new();
        }

        let total = entries.len();
        let budget = self.overall_deadline(total);
        let deadline = Instant::now() + budget;
        info!(
            "Probing {} entries with {} strategy ({} workers, {} per probe, {} overall)",
            total,
            self.strategy.kind(),
            self.max_workers,
            format_duration(self.probe_timeout.as_millis() as u64),
            format_duration(budget.as_millis() as u64)
        );

        let semaphore = Arc::new(Semaphore::new(self.max_workers.min(Semaphore::MAX_PERMITS)));
        let mut join_set: JoinSet<(usize, ProbeOutcome)> = JoinSet::new();
        let mut slots: Vec<Option<ProbeOutcome>> = vec![None; total];

        let run_end = {
            let work = self.dispatch_and_collect(&entries, &semaphore, &mut join_set, &mut slots);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => RunEnd::Cancelled,
                finished = tokio::time::timeout_at(deadline, work) => match finished {
                    Ok(()) => RunEnd::Completed,
                    Err(_) => RunEnd::DeadlineExceeded,
                },
            }
        };

        if run_end != RunEnd::Completed {
            match run_end {
                RunEnd::Cancelled => warn!("Probing cancelled, aborting outstanding probes"),
                _ => warn!(
                    "Probing exceeded its overall deadline of {}, aborting outstanding probes",
                    format_duration(budget.as_millis() as u64)
                ),
            }
            join_set.abort_all();
            while let Some(joined) = join_set.join_next().await {
                if let Ok((slot, outcome)) = joined {
                    slots[slot].get_or_insert(outcome);
                }
            }
        }

        let mut abandoned = 0;
        let results: Vec<ProbeResult> = entries
            .into_iter()
            .zip(slots)
            .map(|(classified, outcome)| {
                let outcome = outcome.unwrap_or_else(|| {
                    abandoned += 1;
                    ProbeOutcome::failed(ProbeError::Abandoned)
                });
                ProbeResult::new(classified, outcome)
            })
            .collect();

        let succeeded = results.iter().filter(|r| r.success()).count();
        info!(
            "Probing finished: {} reachable, {} failed, {} abandoned",
            succeeded,
            total - succeeded - abandoned,
            abandoned
        );
        results
    }

    /// Spawn one task per entry, gated by the semaphore, then drain the join set.
    async fn dispatch_and_collect(
        &self,
        entries: &[ClassifiedEntry],
        semaphore: &Arc<Semaphore>,
        join_set: &mut JoinSet<(usize, ProbeOutcome)>,
        slots: &mut [Option<ProbeOutcome>],
    ) {
        let probe_timeout = self.probe_timeout;
        let hard_deadline = self.probe_timeout.saturating_add(self.grace);
        let total = entries.len();
        let mut completed = 0usize;

        for (slot, classified) in entries.iter().enumerate() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Probe worker pool closed before all probes were dispatched");
                    break;
                }
            };

            let strategy = Arc::clone(&self.strategy);
            let url = classified.entry.url.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let outcome =
                    match tokio::time::timeout(hard_deadline, strategy.probe(&url, probe_timeout))
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => ProbeOutcome::failed(ProbeError::TimedOut),
                    };
                debug!(
                    "Probed {}: {}",
                    UrlUtils::obfuscate_credentials(&url),
                    match outcome.failure() {
                        Some(reason) => reason.to_string(),
                        None => format_latency(outcome.latency_millis()),
                    }
                );
                (slot, outcome)
            });

            // Harvest whatever already finished so the join set stays small
            while let Some(joined) = join_set.try_join_next() {
                completed += record(joined, slots);
            }
        }

        while let Some(joined) = join_set.join_next().await {
            completed += record(joined, slots);
            if completed % PROGRESS_LOG_INTERVAL == 0 {
                info!("Probed {}/{} entries", completed, total);
            }
        }
    }
}

fn record(
    joined: Result<(usize, ProbeOutcome), tokio::task::JoinError>,
    slots: &mut [Option<ProbeOutcome>],
) -> usize {
    match joined {
        Ok((slot, outcome)) => {
            slots[slot] = Some(outcome);
            1
        }
        Err(e) => {
            warn!("Probe task did not complete: {}", e);
            0
        }
    }
}
