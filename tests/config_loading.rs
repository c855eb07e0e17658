//! Layered configuration loading: defaults, TOML file, environment

use std::io::Write;
use std::time::Duration;

use serial_test::serial;
use tempfile::NamedTempFile;

use iptv_ranker::{
    config::Config,
    models::{RetentionPolicy, StrategyKind, UnmatchedPolicy},
    output::OutputFormat,
};

const SAMPLE_CONFIG: &str = r#"
[source]
url = "http://example.com/playlist.m3u"
file = "cache/playlist.m3u"
fetch_timeout = "20s"

[probe]
strategy = "http"
timeout = "800ms"
max_workers = 12

[classification]
unmatched = "bucket"
unclassified_label = "Other"
exclude_keywords = ["测试"]

[[classification.categories]]
name = "CCTV"
keywords = ["CCTV", "央视"]

[[classification.categories]]
name = "Satellite"
keywords = ["卫视"]

[ranking]
retention = "inclusive"

[output]
path = "out/best.m3u"
format = "m3u"
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_load_reads_toml_file() {
    let file = write_config(SAMPLE_CONFIG);
    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(
        config.source.url.as_deref(),
        Some("http://example.com/playlist.m3u")
    );
    assert_eq!(config.source.fetch_timeout, Duration::from_secs(20));
    assert_eq!(config.probe.strategy, StrategyKind::Http);
    assert_eq!(config.probe.timeout, Duration::from_millis(800));
    assert_eq!(config.probe.effective_max_workers(), 12);
    assert_eq!(config.classification.unmatched, UnmatchedPolicy::Bucket);
    assert_eq!(config.classification.categories.len(), 2);
    assert_eq!(config.classification.categories[0].keywords, vec!["CCTV", "央视"]);
    assert_eq!(config.ranking.retention, RetentionPolicy::Inclusive);
    assert_eq!(config.output.format, OutputFormat::M3u);
    // untouched sections keep their defaults
    assert!(config.output.write_bom);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let file = write_config(SAMPLE_CONFIG);

    // SAFETY: serialized with every other test that touches the environment
    unsafe {
        std::env::set_var("IPTV_RANKER_PROBE__MAX_WORKERS", "7");
        std::env::set_var("IPTV_RANKER_OUTPUT__TITLE", "Nightly");
    }
    let result = Config::load(Some(file.path()));
    unsafe {
        std::env::remove_var("IPTV_RANKER_PROBE__MAX_WORKERS");
        std::env::remove_var("IPTV_RANKER_OUTPUT__TITLE");
    }

    let config = result.unwrap();
    assert_eq!(config.probe.max_workers, Some(7));
    assert_eq!(config.output.title, "Nightly");
    assert_eq!(config.probe.strategy, StrategyKind::Http);
}

#[test]
#[serial]
fn test_effective_config_round_trips_through_toml() {
    let file = write_config(SAMPLE_CONFIG);
    let config = Config::load(Some(file.path())).unwrap();

    let rendered = config.to_toml_string().unwrap();
    let reparsed = Config::from_toml_str(&rendered).unwrap();
    assert_eq!(reparsed, config);
}

#[test]
#[serial]
fn test_invalid_values_are_rejected_by_validate() {
    let file = write_config("[probe]\ntimeout = 0\n");
    let config = Config::load(Some(file.path())).unwrap();
    assert!(config.validate().unwrap_err().is_configuration());
}

#[test]
#[serial]
fn test_malformed_file_is_a_load_error() {
    let file = write_config("[probe\nstrategy = ");
    assert!(Config::load(Some(file.path())).is_err());
}
