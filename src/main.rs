//! Sickness Align CLI
//!
//! Builds a labelled, time-aligned dataset from simulator sickness recordings.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sickness_align::{
    config::Config,
    core::OutOfRangePolicy,
    pipeline,
    report::{create_shared_stats, SharedRunStats},
    VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sickness-align")]
#[command(version = VERSION)]
#[command(about = "Align self-reported sickness ratings with simulator sensor streams", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align every self-report event with its sensor window
    Align {
        /// Raw dataset root
        #[arg(long)]
        data: Option<PathBuf>,

        /// Output directory for artifacts and the metadata table
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Seconds before each event
        #[arg(long)]
        lookback: Option<u32>,

        /// Seconds after each event
        #[arg(long)]
        lookahead: Option<u32>,

        /// Worker threads per session
        #[arg(long)]
        workers: Option<usize>,

        /// Keep events with out-of-range scores, leaving them unclassified
        #[arg(long)]
        keep_unclassified: bool,
    },

    /// Write the group consensus score log of every participant
    Consensus {
        /// Raw dataset root
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Suggest severity bands from the quartiles of consensus scores
    Bands {
        /// Raw dataset root
        #[arg(long)]
        data: Option<PathBuf>,

        /// Store the suggested bands in the configuration file
        #[arg(long)]
        save: bool,
    },

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let config = if let Some(path) = &cli.config {
        Config::load_from(path).with_context(|| format!("loading {}", path.display()))?
    } else {
        Config::load().context("loading configuration")?
    };

    match cli.command {
        Commands::Align {
            data,
            output,
            lookback,
            lookahead,
            workers,
            keep_unclassified,
        } => {
            let mut config = config;
            if let Some(data) = data {
                config.data_root = data;
            }
            if let Some(output) = output {
                config.output_root = output;
            }
            if let Some(lookback) = lookback {
                config.window.lookback_secs = lookback;
            }
            if let Some(lookahead) = lookahead {
                config.window.lookahead_secs = lookahead;
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if keep_unclassified {
                config.severity.out_of_range = OutOfRangePolicy::Unclassified;
            }
            config.validate()?;
            cmd_align(&config)
        }
        Commands::Consensus { data } => {
            let mut config = config;
            if let Some(data) = data {
                config.data_root = data;
            }
            cmd_consensus(&config)
        }
        Commands::Bands { data, save } => {
            let mut config = config;
            if let Some(data) = data {
                config.data_root = data;
            }
            cmd_bands(config, save, &config_path)
        }
        Commands::Config { init } => cmd_config(&config, init, &config_path),
    }
}

fn cmd_align(config: &Config) -> anyhow::Result<()> {
    println!("Sickness Align v{VERSION}");
    println!();
    println!("  Data root: {}", config.data_root.display());
    println!("  Output root: {}", config.output_root.display());
    println!(
        "  Window: {}s before, {}s after",
        config.window.lookback_secs, config.window.lookahead_secs
    );
    println!("  Streams: {}", config.streams.len());
    println!("  Workers: {}", config.workers);
    println!();
    println!("Press Ctrl+C to stop after the current session");
    println!();

    let stats: SharedRunStats = create_shared_stats();
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    pipeline::run_alignment(config, &stats, &running)
        .with_context(|| format!("aligning {}", config.data_root.display()))?;

    if !running.load(Ordering::SeqCst) {
        warn!("Run interrupted; metadata covers the sessions processed so far");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_consensus(config: &Config) -> anyhow::Result<()> {
    let written = pipeline::run_consensus(config)
        .with_context(|| format!("computing consensus in {}", config.data_root.display()))?;
    println!("Wrote {written} consensus log(s)");
    Ok(())
}

fn cmd_bands(mut config: Config, save: bool, config_path: &Path) -> anyhow::Result<()> {
    let bands = pipeline::run_bands(&config)
        .with_context(|| format!("deriving bands from {}", config.data_root.display()))?;

    println!("Suggested severity bands:");
    println!("  low:    {:.3}", bands.low);
    println!("  medium: {:.3}", bands.medium);
    println!("  high:   {:.3}", bands.high);

    if save {
        config.severity.bands = bands;
        config.save_to(config_path)?;
        info!(path = %config_path.display(), "Bands saved");
    }
    Ok(())
}

fn cmd_config(config: &Config, init: bool, config_path: &Path) -> anyhow::Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", config_path.display());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);

    if init {
        config.save_to(config_path)?;
        println!();
        println!("Saved to {}", config_path.display());
    }
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
