use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use iptv_ranker::{
    config::Config,
    ingestor::PlaylistFetcher,
    models::{RetentionPolicy, StrategyKind, UnmatchedPolicy},
    output::{OutputFormat, RenderOptions, render, write_output},
    pipeline::RankingPipeline,
};

#[derive(Parser)]
#[command(name = "iptv-ranker")]
#[command(version)]
#[command(about = "Probe IPTV playlist entries and keep the fastest ones, grouped by category")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", value_name = "FILE")]
    config: PathBuf,

    /// Playlist URL to download (overrides config file)
    #[arg(short, long, value_name = "URL")]
    url: Option<String>,

    /// Local playlist file; used as the download cache when a URL is also set
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file path
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (flat, m3u, json)
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<OutputFormat>,

    /// Probe strategy (tcp, http, decode)
    #[arg(short, long, value_name = "STRATEGY")]
    strategy: Option<StrategyKind>,

    /// Per-probe timeout, e.g. "800ms" or "2s"
    #[arg(short, long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Maximum number of concurrent probes
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Keep only reachable entries (strict) or everything, reachable first (inclusive)
    #[arg(long, value_name = "POLICY")]
    retention: Option<RetentionPolicy>,

    /// Drop unmatched entries or collect them in an extra section (drop, bucket)
    #[arg(long, value_name = "POLICY")]
    unmatched: Option<UnmatchedPolicy>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply_to(&self, config: &mut Config) {
        match (&self.url, &self.input) {
            (Some(url), input) => {
                config.source.url = Some(url.clone());
                if let Some(input) = input {
                    config.source.file = Some(input.clone());
                }
            }
            (None, Some(input)) => {
                config.source.url = None;
                config.source.file = Some(input.clone());
            }
            (None, None) => {}
        }
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(strategy) = self.strategy {
            config.probe.strategy = strategy;
        }
        if let Some(timeout) = self.timeout {
            config.probe.timeout = timeout;
        }
        if let Some(workers) = self.workers {
            config.probe.max_workers = Some(workers);
        }
        if let Some(retention) = self.retention {
            config.ranking.retention = retention;
        }
        if let Some(unmatched) = self.unmatched {
            config.classification.unmatched = unmatched;
        }
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let log_filter = format!("iptv_ranker={log_level}");
    let registry = tracing_subscriber::registry().with(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()),
    );

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    info!("Starting iptv-ranker v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(Some(cli.config.as_path()))?;
    cli.apply_to(&mut config);
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let pipeline = RankingPipeline::from_config(&config)?;
    let fetcher = PlaylistFetcher::new(&config.probe.user_agent, config.source.fetch_timeout)?;
    let raw_text = fetcher.acquire(&config.source).await?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping probes and keeping partial results");
                cancel.cancel();
            }
        }
    });

    let report = pipeline.run(&raw_text, &cancel).await;
    if report.playlist.is_empty() {
        warn!("No entries survived probing; writing an empty playlist");
    }

    let options = RenderOptions::from_config(&config.output);
    let content = render(&report.playlist, &report.stats, &options)?;
    let with_bom = config.output.write_bom && config.output.format.allows_bom();
    write_output(&config.output.path, &content, with_bom).await?;

    info!(
        "Wrote {} entries in {} sections to {}",
        report.stats.ranked,
        report.playlist.sections.len(),
        config.output.path.display()
    );
    Ok(())
}
