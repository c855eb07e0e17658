//! Probe, rank and regroup IPTV playlist entries.
//!
//! A playlist is parsed into entries, each entry is classified into a category
//! by keyword, every classified entry is probed under a bounded time budget and
//! a bounded number of workers, and the reachable entries are written back out
//! grouped by category, fastest first.

pub mod config;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod services;
pub mod utils;

pub use config::Config;
pub use errors::{AppError, AppResult};
pub use pipeline::{PipelineReport, PipelineStats, RankingPipeline};
