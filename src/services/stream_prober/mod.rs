//! Stream probing strategies
//!
//! A strategy answers one question for one URL: is it reachable within the
//! budget, and how long did it take. Strategies never return errors; every
//! failure becomes [`ProbeOutcome::Failed`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ProbeConfig;
use crate::errors::AppResult;
use crate::models::{ProbeOutcome, StrategyKind};

pub mod ffprobe;
pub mod http;
pub mod tcp;

pub use ffprobe::FfprobeProbe;
pub use http::HttpStatusProbe;
pub use tcp::TcpConnectProbe;

/// Interchangeable probe algorithm
#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Probe a single URL; `timeout` bounds the whole attempt.
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
}

/// Build the strategy selected in the probe configuration
pub fn build_strategy(config: &ProbeConfig) -> AppResult<Arc<dyn ProbeStrategy>> {
    let strategy: Arc<dyn ProbeStrategy> = match config.strategy {
        StrategyKind::Tcp => Arc::new(TcpConnectProbe::new()),
        StrategyKind::Http => Arc::new(HttpStatusProbe::new(&config.user_agent)?),
        StrategyKind::Decode => Arc::new(FfprobeProbe::from_config(&config.decode)),
    };
    Ok(strategy)
}
