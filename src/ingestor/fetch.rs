//! Raw playlist acquisition and text decoding
//!
//! The core pipeline only ever sees decoded text; everything about where the
//! bytes came from lives here.

use std::path::Path;
use std::time::Duration;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::errors::{AppError, AppResult, SourceError, SourceResult};
use crate::utils::url::UrlUtils;

/// Fetches the raw playlist from a URL, a local file, or the cached download
pub struct PlaylistFetcher {
    client: Client,
}

impl PlaylistFetcher {
    pub fn new(user_agent: &str, fetch_timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(fetch_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Acquire playlist text according to the source configuration.
    ///
    /// With a URL configured the playlist is downloaded (and cached to `file`
    /// when enabled). If the download fails and `file` exists, the local copy
    /// is used instead.
    pub async fn acquire(&self, source: &SourceConfig) -> AppResult<String> {
        match (&source.url, &source.file) {
            (Some(url), file) => match self.download(url).await {
                Ok(bytes) => {
                    if let Some(path) = file.as_deref()
                        && source.cache_downloads
                    {
                        if let Err(e) = write_cache(path, &bytes).await {
                            warn!("Failed to cache playlist to {}: {}", path.display(), e);
                        } else {
                            debug!("Cached playlist to {}", path.display());
                        }
                    }
                    Ok(decode_text(&bytes))
                }
                Err(e) => match file.as_deref() {
                    Some(path) if path.exists() => {
                        warn!(
                            "Download of {} failed ({}), falling back to {}",
                            UrlUtils::obfuscate_credentials(url),
                            e,
                            path.display()
                        );
                        read_local(path).await
                    }
                    _ => Err(e.into()),
                },
            },
            (None, Some(path)) => read_local(path).await,
            (None, None) => Err(AppError::configuration(
                "no playlist source configured: set source.url or source.file",
            )),
        }
    }

    async fn download(&self, url: &str) -> SourceResult<Vec<u8>> {
        let display_url = UrlUtils::obfuscate_credentials(url);
        info!("Downloading playlist from {}", display_url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout {
                    url: display_url.clone(),
                }
            } else {
                SourceError::Unavailable {
                    message: format!("request to {display_url} failed: {e}"),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!(
                    "{} - URL: {}",
                    status.canonical_reason().unwrap_or("Unknown"),
                    display_url
                ),
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout {
                    url: display_url.clone(),
                }
            } else {
                SourceError::Unavailable {
                    message: format!("failed to read response body: {e}"),
                }
            }
        })?;

        info!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

async fn read_local(path: &Path) -> AppResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::source_error(format!("failed to read {}: {}", path.display(), e)))?;
    info!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(decode_text(&bytes))
}

async fn write_cache(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}

/// Decode playlist bytes into text.
///
/// A byte order mark wins when present. Otherwise the encoding is guessed from
/// the content, which matters for the GBK-encoded lists many Chinese IPTV
/// sources still publish. Invalid sequences are replaced rather than rejected.
pub fn decode_text(bytes: &[u8]) -> String {
    let encoding = match Encoding::for_bom(bytes) {
        Some((encoding, _)) => encoding,
        None => {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        }
    };

    // decode() sniffs and strips the BOM itself
    let (text, used, had_errors) = encoding.decode(bytes);
    if used != UTF_8 {
        debug!("Decoded playlist as {}", used.name());
    }
    if had_errors {
        warn!(
            "Playlist contained bytes invalid for {}; they were replaced",
            used.name()
        );
    }
    text.into_owned()
}
