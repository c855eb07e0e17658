//! Core services: classification, probing, scheduling and ranking.

pub mod classifier;
pub mod probe_scheduler;
pub mod ranker;
pub mod stream_prober;

pub use classifier::{Classifier, classify};
pub use probe_scheduler::ProbeScheduler;
pub use ranker::rank;
pub use stream_prober::{ProbeStrategy, build_strategy};
