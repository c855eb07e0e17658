//! Rendering of a ranked playlist
//!
//! - `flat`: `# <title> - <timestamp>` header, then one `# <category>` block per
//!   section with `name,url` lines
//! - `m3u`: extended M3U with `group-title` set to the category
//! - `json`: full report including latencies, failure reasons and run statistics

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::OutputConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{MediaSummary, RankedPlaylist};
use crate::pipeline::PipelineStats;

pub mod writer;

pub use writer::write_output;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    /// `name,url` lines grouped under `# category` headers
    #[default]
    Flat,
    M3u,
    Json,
}

impl OutputFormat {
    /// A byte order mark would make the JSON report unparseable for most readers
    pub fn allows_bom(&self) -> bool {
        !matches!(self, OutputFormat::Json)
    }
}

/// Everything a renderer needs besides the playlist itself
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub format: OutputFormat,
    pub title: String,
    pub generated_at: Option<DateTime<Local>>,
}

impl RenderOptions {
    pub fn from_config(config: &OutputConfig) -> Self {
        Self {
            format: config.format,
            title: config.title.clone(),
            generated_at: config.timestamp.then(Local::now),
        }
    }
}

pub fn render(
    playlist: &RankedPlaylist,
    stats: &PipelineStats,
    options: &RenderOptions,
) -> AppResult<String> {
    match options.format {
        OutputFormat::Flat => Ok(render_flat(playlist, options)),
        OutputFormat::M3u => Ok(render_m3u(playlist)),
        OutputFormat::Json => render_json(playlist, stats, options),
    }
}

fn render_flat(playlist: &RankedPlaylist, options: &RenderOptions) -> String {
    let mut lines = Vec::with_capacity(playlist.entry_count() + playlist.sections.len() * 2 + 1);
    lines.push(match options.generated_at {
        Some(at) => format!("# {} - {}", options.title, at.format(TIMESTAMP_FORMAT)),
        None => format!("# {}", options.title),
    });

    for section in &playlist.sections {
        lines.push(String::new());
        lines.push(format!("# {}", section.category));
        for result in &section.results {
            lines.push(format!("{},{}", result.entry.name, result.entry.url));
        }
    }

    let mut content = lines.join("\n");
    content.push('\n');
    content
}

fn render_m3u(playlist: &RankedPlaylist) -> String {
    let mut content = String::from("#EXTM3U\n");

    for section in &playlist.sections {
        for result in &section.results {
            let mut attributes: Vec<(&str, &str)> = result
                .entry
                .attributes
                .iter()
                .filter(|(key, _)| key != "group-title")
                .map(|(key, value)| (key.as_str(), value.as_str()))
                .collect();
            attributes.push(("group-title", section.category.as_str()));

            content.push_str("#EXTINF:-1");
            for (key, value) in attributes {
                content.push_str(&format!(" {key}=\"{value}\""));
            }
            content.push(',');
            content.push_str(&result.entry.name);
            content.push('\n');
            content.push_str(&result.entry.url);
            content.push('\n');
        }
    }

    content
}

#[derive(Serialize)]
struct JsonReport<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_at: Option<DateTime<Local>>,
    stats: &'a PipelineStats,
    sections: Vec<JsonSection<'a>>,
}

#[derive(Serialize)]
struct JsonSection<'a> {
    category: &'a str,
    entries: Vec<JsonEntry<'a>>,
}

#[derive(Serialize)]
struct JsonEntry<'a> {
    name: &'a str,
    url: &'a str,
    success: bool,
    latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<&'a MediaSummary>,
}

fn render_json(
    playlist: &RankedPlaylist,
    stats: &PipelineStats,
    options: &RenderOptions,
) -> AppResult<String> {
    let report = JsonReport {
        title: &options.title,
        generated_at: options.generated_at,
        stats,
        sections: playlist
            .sections
            .iter()
            .map(|section| JsonSection {
                category: &section.category,
                entries: section
                    .results
                    .iter()
                    .map(|result| JsonEntry {
                        name: &result.entry.name,
                        url: &result.entry.url,
                        success: result.success(),
                        latency_ms: Some(result.latency_millis()).filter(|l| l.is_finite()),
                        failure: result.outcome.failure().map(|reason| reason.to_string()),
                        failure_kind: result.outcome.failure().map(|reason| reason.kind()),
                        media: result.outcome.media(),
                    })
                    .collect(),
            })
            .collect(),
    };

    let mut content = serde_json::to_string_pretty(&report)
        .map_err(|e| AppError::internal(format!("Failed to serialize report: {e}")))?;
    content.push('\n');
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProbeError;
    use crate::models::{ClassifiedEntry, Entry, ProbeOutcome, ProbeResult, RankedSection};
    use chrono::TimeZone;
    use std::time::Duration;

    fn sample_playlist() -> RankedPlaylist {
        let cctv = ProbeResult::new(
            ClassifiedEntry {
                position: 0,
                entry: Entry::new("CCTV1 综合", "tcp://10.0.0.1:80").with_attributes(vec![
                    ("tvg-id".to_string(), "cctv1".to_string()),
                    ("group-title".to_string(), "old".to_string()),
                ]),
                category: "CCTV".to_string(),
            },
            ProbeOutcome::reachable(Duration::from_millis(5)),
        );
        let satellite = ProbeResult::new(
            ClassifiedEntry {
                position: 1,
                entry: Entry::new("湖南卫视", "tcp://10.0.0.2:80"),
                category: "Satellite".to_string(),
            },
            ProbeOutcome::reachable(Duration::from_millis(2)),
        );
        let dead = ProbeResult::new(
            ClassifiedEntry {
                position: 2,
                entry: Entry::new("东方卫视", "tcp://10.0.0.4:80"),
                category: "Satellite".to_string(),
            },
            ProbeOutcome::failed(ProbeError::TimedOut),
        );
        RankedPlaylist {
            sections: vec![
                RankedSection {
                    category: "CCTV".to_string(),
                    results: vec![cctv],
                },
                RankedSection {
                    category: "Satellite".to_string(),
                    results: vec![satellite, dead],
                },
            ],
        }
    }

    fn options(format: OutputFormat) -> RenderOptions {
        RenderOptions {
            format,
            title: "Best".to_string(),
            generated_at: Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).single(),
        }
    }

    #[test]
    fn test_render_flat() {
        let content = render(
            &sample_playlist(),
            &PipelineStats::default(),
            &options(OutputFormat::Flat),
        )
        .unwrap();
        assert_eq!(
            content,
            "# Best - 2024-05-06 07:08:09\n\n# CCTV\nCCTV1 综合,tcp://10.0.0.1:80\n\n# Satellite\n湖南卫视,tcp://10.0.0.2:80\n东方卫视,tcp://10.0.0.4:80\n"
        );
    }

    #[test]
    fn test_render_flat_without_timestamp() {
        let mut opts = options(OutputFormat::Flat);
        opts.generated_at = None;
        let content = render(&RankedPlaylist::default(), &PipelineStats::default(), &opts).unwrap();
        assert_eq!(content, "# Best\n");
    }

    #[test]
    fn test_render_m3u_replaces_group_title() {
        let content = render(
            &sample_playlist(),
            &PipelineStats::default(),
            &options(OutputFormat::M3u),
        )
        .unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(
            lines[1],
            "#EXTINF:-1 tvg-id=\"cctv1\" group-title=\"CCTV\",CCTV1 综合"
        );
        assert_eq!(lines[2], "tcp://10.0.0.1:80");
        assert_eq!(lines[3], "#EXTINF:-1 group-title=\"Satellite\",湖南卫视");
    }

    #[test]
    fn test_render_json_reports_failures() {
        let content = render(
            &sample_playlist(),
            &PipelineStats::default(),
            &options(OutputFormat::Json),
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        let satellite = &value["sections"][1]["entries"];
        assert_eq!(satellite[0]["success"], true);
        assert_eq!(satellite[0]["latency_ms"].as_f64(), Some(2.0));
        assert_eq!(satellite[1]["success"], false);
        assert!(satellite[1]["latency_ms"].is_null());
        assert_eq!(satellite[1]["failure"], "timed out");
        assert_eq!(satellite[1]["failure_kind"], "timeout");
        assert!(satellite[0].get("failure_kind").is_none());
        assert_eq!(value["title"], "Best");
    }

    #[test]
    fn test_format_parsing_and_bom_rules() {
        assert_eq!("M3U".parse::<OutputFormat>().unwrap(), OutputFormat::M3u);
        assert!(OutputFormat::Flat.allows_bom());
        assert!(!OutputFormat::Json.allows_bom());
    }
}
