//! TCP connect timing

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpStream, lookup_host};
use tokio::time::Instant;
use tracing::trace;

use super::ProbeStrategy;
use crate::errors::ProbeError;
use crate::models::{ProbeOutcome, StrategyKind};
use crate::utils::url::UrlUtils;

/// Measures how long it takes to establish a TCP connection to the URL's host.
///
/// Resolution and connect share the timeout. The socket is closed as soon as
/// the connection is established.
#[derive(Debug, Default, Clone)]
pub struct TcpConnectProbe;

impl TcpConnectProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProbeStrategy for TcpConnectProbe {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Tcp
    }

    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        let Some((host, port)) = UrlUtils::host_port(url) else {
            return ProbeOutcome::failed(ProbeError::InvalidUrl(url.to_string()));
        };

        let started = Instant::now();
        match tokio::time::timeout(timeout, connect(&host, port)).await {
            Ok(Ok(stream)) => {
                let latency = started.elapsed();
                drop(stream);
                trace!("Connected to {}:{} in {:?}", host, port, latency);
                ProbeOutcome::reachable(latency)
            }
            Ok(Err(reason)) => ProbeOutcome::failed(reason),
            Err(_) => ProbeOutcome::failed(ProbeError::TimedOut),
        }
    }
}

/// Try every resolved address in order until one accepts
async fn connect(host: &str, port: u16) -> Result<TcpStream, ProbeError> {
    let addrs: Vec<_> = lookup_host((host, port))
        .await
        .map_err(|e| ProbeError::Resolve(format!("{host}: {e}")))?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(format!("{addr}: {e}")),
        }
    }

    Err(match last_error {
        Some(message) => ProbeError::Connect(message),
        None => ProbeError::Resolve(format!("{host}: no addresses")),
    })
}
