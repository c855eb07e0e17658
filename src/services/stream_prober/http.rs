//! HTTP status probing

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode, redirect};
use tokio::time::Instant;
use tracing::debug;

use super::ProbeStrategy;
use crate::errors::{AppResult, ProbeError};
use crate::models::{ProbeOutcome, StrategyKind};
use crate::utils::url::UrlUtils;

const MAX_REDIRECTS: usize = 10;
const FALLBACK_RANGE: &str = "bytes=0-1023";

/// Issues a HEAD request and falls back to a small ranged GET only when the
/// server answers 405 or 501 to HEAD. Any terminal 2xx status counts as
/// reachable; every other outcome is reported after a single attempt.
pub struct HttpStatusProbe {
    client: Client,
}

impl HttpStatusProbe {
    pub fn new(user_agent: &str) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client })
    }
}

fn reason_from(error: &reqwest::Error) -> ProbeError {
    if error.is_timeout() {
        ProbeError::TimedOut
    } else if error.is_builder() {
        ProbeError::InvalidUrl(error.to_string())
    } else if error.is_connect() {
        ProbeError::Connect(error.to_string())
    } else {
        ProbeError::Transport(error.to_string())
    }
}

#[async_trait]
impl ProbeStrategy for HttpStatusProbe {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Http
    }

    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        if !UrlUtils::is_http(url) {
            let scheme = UrlUtils::scheme(url).unwrap_or_else(|| url.to_string());
            return ProbeOutcome::failed(ProbeError::UnsupportedScheme(scheme));
        }

        let started = Instant::now();
        let deadline = started + timeout;

        match tokio::time::timeout(timeout, self.client.head(url).send()).await {
            Err(_) => return ProbeOutcome::failed(ProbeError::TimedOut),
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() {
                    return ProbeOutcome::reachable(started.elapsed());
                }
                if !matches!(
                    status,
                    StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
                ) {
                    return ProbeOutcome::failed(ProbeError::HttpStatus(status.as_u16()));
                }
                debug!(
                    "HEAD rejected with {} by {}, retrying with ranged GET",
                    status,
                    UrlUtils::obfuscate_credentials(url)
                );
            }
            // a transport failure is final; only an unsupported method earns the GET
            Ok(Err(e)) => return ProbeOutcome::failed(reason_from(&e)),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ProbeOutcome::failed(ProbeError::TimedOut);
        }

        let request = self.client.get(url).header(RANGE, FALLBACK_RANGE).send();
        match tokio::time::timeout(remaining, request).await {
            Err(_) => ProbeOutcome::failed(ProbeError::TimedOut),
            Ok(Err(e)) => ProbeOutcome::failed(reason_from(&e)),
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() {
                    ProbeOutcome::reachable(started.elapsed())
                } else {
                    ProbeOutcome::failed(ProbeError::HttpStatus(status.as_u16()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_non_http_scheme_is_rejected() {
        let probe = HttpStatusProbe::new("test-agent").unwrap();
        let outcome = probe
            .probe("rtp://239.3.1.241:8000", Duration::from_secs(1))
            .await;
        assert_eq!(
            outcome.failure(),
            Some(&ProbeError::UnsupportedScheme("rtp".to_string()))
        );
    }

    #[tokio::test]
    async fn test_refused_connection_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpStatusProbe::new("test-agent").unwrap();
        let outcome = probe
            .probe(&format!("http://{addr}/live"), Duration::from_secs(2))
            .await;
        assert!(!outcome.is_success());
        assert!(outcome.latency_millis().is_infinite());
    }
}
