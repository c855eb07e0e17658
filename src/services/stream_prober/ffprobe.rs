//! Decode validation through an external `ffprobe` process

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

use super::ProbeStrategy;
use crate::config::DecodeConfig;
use crate::errors::ProbeError;
use crate::models::{MediaSummary, ProbeOutcome, StrategyKind};
use crate::utils::url::UrlUtils;

/// Runs `ffprobe` against the URL and treats a detected container format as success.
///
/// The child is spawned with `kill_on_drop`, so it is killed whenever the probe
/// future is dropped: on timeout, on cancellation and when the scheduler
/// aborts the task.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    command: String,
    probesize: u64,
    analyzeduration: Duration,
}

impl FfprobeProbe {
    pub fn new(command: impl Into<String>, probesize: u64, analyzeduration: Duration) -> Self {
        Self {
            command: command.into(),
            probesize,
            analyzeduration,
        }
    }

    pub fn from_config(config: &DecodeConfig) -> Self {
        Self::new(
            config.ffprobe_command.clone(),
            config.probesize,
            config.analyzeduration,
        )
    }

    fn command_for(&self, url: &str, timeout: Duration) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg("-rw_timeout")
        .arg(timeout.as_micros().to_string())
        .arg("-probesize")
        .arg(self.probesize.to_string())
        .arg("-analyzeduration")
        .arg(self.analyzeduration.as_micros().to_string())
        .arg("-i")
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ProbeStrategy for FfprobeProbe {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Decode
    }

    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();
        let child = match self.command_for(url, timeout).spawn() {
            Ok(child) => child,
            Err(e) => {
                return ProbeOutcome::failed(ProbeError::Spawn(format!("{}: {}", self.command, e)));
            }
        };

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ProbeOutcome::failed(ProbeError::Decode(e.to_string())),
            Err(_) => return ProbeOutcome::failed(ProbeError::TimedOut),
        };
        let latency = started.elapsed();

        if !output.status.success() {
            return ProbeOutcome::failed(ProbeError::Decode(format!(
                "ffprobe exited with {}",
                output.status
            )));
        }

        let data: serde_json::Value = match serde_json::from_slice(&output.stdout) {
            Ok(data) => data,
            Err(e) => {
                return ProbeOutcome::failed(ProbeError::Decode(format!(
                    "unreadable ffprobe output: {e}"
                )));
            }
        };

        match parse_media_summary(&data) {
            Some(media) => {
                debug!(
                    "Decoded {} as {:?} ({:?} {:?}, {:?})",
                    UrlUtils::obfuscate_credentials(url),
                    media.format_name,
                    media.video_codec,
                    media.resolution(),
                    media.audio_codec
                );
                ProbeOutcome::Reachable {
                    latency,
                    media: Some(media),
                }
            }
            None => ProbeOutcome::failed(ProbeError::Decode(
                "no container format detected".to_string(),
            )),
        }
    }
}

/// Extract the stream description from ffprobe's JSON output.
///
/// Returns `None` unless `format.format_name` is present.
pub fn parse_media_summary(data: &serde_json::Value) -> Option<MediaSummary> {
    let format = data.get("format").and_then(|v| v.as_object())?;
    let format_name = format
        .get("format_name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())?
        .to_string();
    let bit_rate = format
        .get("bit_rate")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok());

    let streams = data
        .get("streams")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    let first_of = |codec_type: &str| {
        streams
            .iter()
            .find(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some(codec_type))
    };

    let video = first_of("video");
    let audio = first_of("audio");
    let codec_name = |stream: Option<&serde_json::Value>| {
        stream
            .and_then(|s| s.get("codec_name"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };
    let dimension = |key: &str| {
        video
            .and_then(|s| s.get(key))
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
    };

    Some(MediaSummary {
        format_name: Some(format_name),
        bit_rate,
        video_codec: codec_name(video),
        width: dimension("width"),
        height: dimension("height"),
        audio_codec: codec_name(audio),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_summary_success() {
        let data = serde_json::json!({
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
                {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 2}
            ],
            "format": {"format_name": "mpegts", "bit_rate": "2128000"}
        });

        let media = parse_media_summary(&data).unwrap();
        assert_eq!(media.format_name.as_deref(), Some("mpegts"));
        assert_eq!(media.bit_rate, Some(2128000));
        assert_eq!(media.video_codec.as_deref(), Some("h264"));
        assert_eq!(media.resolution().as_deref(), Some("1920x1080"));
        assert_eq!(media.audio_codec.as_deref(), Some("aac"));
    }

    #[test]
    fn test_parse_media_summary_audio_only() {
        let data = serde_json::json!({
            "streams": [{"codec_type": "audio", "codec_name": "mp2"}],
            "format": {"format_name": "mpegts"}
        });
        let media = parse_media_summary(&data).unwrap();
        assert_eq!(media.video_codec, None);
        assert_eq!(media.resolution(), None);
        assert_eq!(media.audio_codec.as_deref(), Some("mp2"));
    }

    #[test]
    fn test_parse_media_summary_requires_format_name() {
        assert!(parse_media_summary(&serde_json::json!({})).is_none());
        assert!(parse_media_summary(&serde_json::json!({"format": {}})).is_none());
        assert!(
            parse_media_summary(&serde_json::json!({"error": {"code": 1, "string": "refused"}}))
                .is_none()
        );
    }

    #[test]
    fn test_command_arguments() {
        let probe = FfprobeProbe::new("ffprobe", 512, Duration::from_millis(500));
        let cmd = probe.command_for("http://a/1.ts", Duration::from_secs(5));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-v", "quiet", "-print_format", "json", "-show_format", "-show_streams",
                "-rw_timeout", "5000000", "-probesize", "512", "-analyzeduration", "500000",
                "-i", "http://a/1.ts",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failure() {
        let probe = FfprobeProbe::new(
            "definitely-not-an-installed-ffprobe",
            512,
            Duration::from_millis(500),
        );
        let outcome = probe.probe("http://a/1.ts", Duration::from_secs(1)).await;
        assert!(matches!(outcome.failure(), Some(ProbeError::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_without_output_is_not_success() {
        let probe = FfprobeProbe::new("true", 512, Duration::from_millis(500));
        let outcome = probe.probe("http://a/1.ts", Duration::from_secs(5)).await;
        assert!(matches!(outcome.failure(), Some(ProbeError::Decode(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let probe = FfprobeProbe::new("false", 512, Duration::from_millis(500));
        let outcome = probe.probe("http://a/1.ts", Duration::from_secs(5)).await;
        assert!(matches!(outcome.failure(), Some(ProbeError::Decode(_))));
    }
}
