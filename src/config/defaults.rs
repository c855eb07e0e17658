/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Source defaults
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CACHE_DOWNLOADS: bool = true;

// Probe defaults
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 1;
pub const DEFAULT_TCP_WORKERS: usize = 50;
pub const DEFAULT_HTTP_WORKERS: usize = 32;
pub const DEFAULT_DECODE_WORKERS: usize = 5;
/// Decode probes spawn a process each; above this a warning is logged
pub const MAX_RECOMMENDED_DECODE_WORKERS: usize = 16;
pub const DEFAULT_TCP_PORT: u16 = 80;
/// Upper bound accepted for `probe.timeout`
pub const MAX_PROBE_TIMEOUT_SECS: u64 = 60 * 60;
/// Upper bound accepted for `probe.max_workers`
pub const MAX_PROBE_WORKERS: usize = 65_536;

// Decode (ffprobe) defaults
pub const DEFAULT_FFPROBE_COMMAND: &str = "ffprobe";
pub const DEFAULT_PROBESIZE_BYTES: u64 = 512;
pub const DEFAULT_ANALYZEDURATION_MILLIS: u64 = 500;

// Classification defaults
pub const DEFAULT_CASE_SENSITIVE: bool = false;
pub const DEFAULT_UNCLASSIFIED_LABEL: &str = "Unclassified";
pub const DEFAULT_DEDUPLICATE: bool = true;

// Output defaults
pub const DEFAULT_OUTPUT_PATH: &str = "best_multicast.txt";
pub const DEFAULT_OUTPUT_TITLE: &str = "IPTV 最优组播列表";
pub const DEFAULT_WRITE_BOM: bool = true;
pub const DEFAULT_WRITE_TIMESTAMP: bool = true;

/// Category table used when the configuration does not declare one
pub const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    ("📺央视频道", &["CCTV", "央视"]),
    ("📡卫视频道", &["卫视", "湖南", "北京", "东方", "山东", "四川"]),
    ("🌊港·澳·台", &["香港", "港", "澳门", "台湾"]),
];

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "IPTV_RANKER_";
