use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod output;

use crate::config::{AppConfig, ConfigManager};
use crate::output::OutputFormat;
use mediamatch_core::{
    Matcher, RetryingProvider, ScanOrchestrator, ScanQueue, SearchCache, TmdbProvider,
};

#[derive(Parser)]
#[command(name = "mediamatch")]
#[command(author, version, about = "Scan media libraries and match files against TMDB", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan directories and match discovered files
    Scan {
        /// Directories to scan (overrides configured roots)
        paths: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Extension allow-list override (no dot, can be repeated)
        #[arg(short = 'e', long = "ext", value_name = "EXT")]
        extensions: Vec<String>,

        /// Directory name patterns to ignore (can be repeated)
        #[arg(long = "ignore", value_name = "PATTERN")]
        ignore_patterns: Vec<String>,

        /// Matcher worker pool size
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Auto-accept confidence threshold (0.0 to 1.0)
        #[arg(long)]
        threshold: Option<f64>,

        /// Disable progress display
        #[arg(long)]
        no_progress: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the configuration file path
    Path,
    /// Print the effective configuration (defaults, file, and environment)
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Debug)
            .filter_module("mediamatch_core", log::LevelFilter::Debug)
            .filter_module("mediamatch_cli", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Commands::Scan {
            paths,
            format,
            extensions,
            ignore_patterns,
            concurrency,
            threshold,
            no_progress,
        } => {
            let manager = ConfigManager::new();
            let mut config = manager
                .load()
                .context("Failed to load configuration")?;
            apply_overrides(
                &mut config,
                paths,
                extensions,
                ignore_patterns,
                concurrency,
                threshold,
            );
            scan_command(config, format, no_progress).await
        }
        Commands::Config { command } => config_command(command),
    }
}

fn apply_overrides(
    config: &mut AppConfig,
    paths: Vec<PathBuf>,
    extensions: Vec<String>,
    ignore_patterns: Vec<String>,
    concurrency: Option<usize>,
    threshold: Option<f64>,
) {
    if !paths.is_empty() {
        config.scan.roots = paths;
    }
    if !extensions.is_empty() {
        config.scan.allowed_extensions = extensions;
    }
    if !ignore_patterns.is_empty() {
        config.scan.ignore_patterns = ignore_patterns;
    }
    if let Some(concurrency) = concurrency {
        config.scan.match_concurrency = concurrency;
    }
    if let Some(threshold) = threshold {
        config.matching.auto_accept_threshold = threshold;
    }
}

async fn scan_command(config: AppConfig, format: OutputFormat, no_progress: bool) -> Result<()> {
    if config.scan.roots.is_empty() {
        bail!("No scan roots given. Pass one or more directories, or set scan.roots in the config file.");
    }
    if config.provider.api_key.is_empty() {
        bail!(
            "No TMDB API key configured. Set MEDIAMATCH_PROVIDER__API_KEY or add \
             provider.api_key to {}",
            ConfigManager::new().get_config_path().display()
        );
    }

    let provider = TmdbProvider::new(config.provider.clone())
        .context("Failed to initialize the TMDB provider")?;
    let provider = RetryingProvider::new(provider, config.provider.retry.clone());
    let cache = Arc::new(SearchCache::new(Arc::new(provider), config.cache.clone()));
    let matcher = Arc::new(Matcher::new(cache.clone(), config.matching.clone()));
    let queue = Arc::new(ScanQueue::new());
    let orchestrator = ScanOrchestrator::new(matcher, queue.clone(), config.scan.clone());

    let handle = orchestrator.scan().context("Failed to start the scan")?;
    let progress = handle.progress().clone();

    let bar = if no_progress || !config.output.progress_enabled {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    };

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                bar.set_message(format!(
                    "discovered {}, matched {}",
                    progress.discovered(),
                    progress.matched()
                ));
                if handle.is_finished() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                bar.set_message("cancelling, letting in-flight matches finish...");
                handle.cancel();
            }
        }
    }
    handle.wait().await;
    bar.finish_and_clear();

    let items = queue.items();
    output::render(&items, format)?;

    if format == OutputFormat::Text {
        let stats = cache.stats().await;
        println!(
            "{}",
            format!(
                "provider cache: {} hits, {} misses ({:.0}% hit rate)",
                stats.hits,
                stats.misses,
                stats.hit_rate() * 100.0
            )
            .dimmed()
        );
    }
    Ok(())
}

fn config_command(command: ConfigCommand) -> Result<()> {
    let manager = ConfigManager::new();
    match command {
        ConfigCommand::Path => {
            println!("{}", manager.get_config_path().display());
            if !manager.get_config_path().exists() {
                eprintln!("{}", "(file does not exist yet)".dimmed());
            }
        }
        ConfigCommand::Show => {
            let config = manager.load()?;
            print!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to render configuration")?
            );
        }
    }
    Ok(())
}
