//! flamezone: flame graph tracing demo host
//!
//! Runs a synthetic multi-threaded workload through the flamezone
//! instrumentation macros and writes the recorded zones as a Chrome Tracing
//! JSON file.

mod config;
mod workload;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::Config;
use workload::Workload;

/// Record a synthetic workload as a flame graph trace
#[derive(Parser)]
#[command(name = "flamezone")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to .flamezone directory or config file (default: search for .flamezone/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workload and write the trace file
    Run {
        /// Number of worker threads
        #[arg(long)]
        threads: Option<usize>,

        /// Zones opened by each worker
        #[arg(long)]
        zones: Option<usize>,

        /// Milliseconds spent inside each zone
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Category attached to every zone
        #[arg(long)]
        category: Option<String>,

        /// Trace file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write single-line JSON
        #[arg(long)]
        compact: bool,

        /// Extra metadata entry as title=value (repeatable)
        #[arg(long = "meta", value_name = "TITLE=VALUE")]
        meta: Vec<String>,
    },

    /// Initialize a new .flamezone directory with config file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize logging to stderr.
fn init_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter(verbose))
        .init();
}

/// Initialize logging to daily rotated files in `logs_dir`.
fn init_file_logging(logs_dir: &Path, verbose: bool) {
    if let Err(e) = std::fs::create_dir_all(logs_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        // Fall back to stderr logging
        init_logging(verbose);
        return;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, "flamezone.log");

    // Use non-blocking writer to avoid blocking on log writes
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard would stop logging
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(env_filter(verbose))
        .init();
}

/// Load config from an explicit path or auto-discover `.flamezone/config.toml`.
///
/// Returns the config and the `.flamezone` directory it came from, if any.
fn load_config(override_path: Option<&PathBuf>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = override_path {
        let config_file = if path.is_dir() {
            path.join(config::CONFIG_FILE)
        } else {
            path.clone()
        };
        let config_dir = config_file.parent().unwrap_or(path).to_path_buf();
        let config = Config::from_file(&config_file)?;
        return Ok((config, Some(config_dir)));
    }

    match Config::find_and_load()? {
        Some((config, dir)) => Ok((config, Some(dir))),
        None => Ok((Config::default(), None)),
    }
}

/// Parse a `title=value` metadata argument.
fn parse_meta(arg: &str) -> Result<(String, String)> {
    let (title, value) = arg
        .split_once('=')
        .with_context(|| format!("Invalid metadata '{}', expected TITLE=VALUE", arg))?;
    if title.is_empty() {
        anyhow::bail!("Invalid metadata '{}', title cannot be empty", arg);
    }
    Ok((title.to_string(), value.to_string()))
}

/// Resolve a relative log directory against the `.flamezone` directory.
fn resolve_logs_dir(dir: &Path, config_dir: Option<&Path>) -> PathBuf {
    match config_dir {
        Some(base) if dir.is_relative() => base.join(dir),
        _ => dir.to_path_buf(),
    }
}

/// Run the workload and flush the trace.
#[cfg_attr(not(feature = "profiler"), allow(unused_variables))]
fn run(config: &Config, extra_metadata: &[(String, String)]) {
    let workload = Workload::from(&config.workload);
    info!(
        threads = workload.threads,
        zones_per_thread = workload.zones_per_thread,
        output = %config.output.path.display(),
        "Starting workload"
    );

    let profiler = flamezone::profiler!(flamezone::WriterConfig {
        output_path: config.output.path.clone(),
        enabled: true,
        pretty: config.output.pretty,
    });

    flamezone::metadata!(profiler, "run_id", uuid::Uuid::new_v4().to_string());
    flamezone::metadata!(profiler, "started_at", chrono::Utc::now().to_rfc3339());
    for entry in &config.metadata {
        flamezone::metadata!(profiler, &entry.title, &entry.value);
    }
    for (title, value) in extra_metadata {
        flamezone::metadata!(profiler, title, value);
    }

    let report = workload::run(&profiler, &workload);
    info!(
        zones = report.zones,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Workload finished"
    );

    finish(profiler);
}

#[cfg(feature = "profiler")]
fn finish(profiler: flamezone::Profiler) {
    match profiler.flush() {
        Ok(summary) => match summary.path {
            Some(path) => info!(
                spans = summary.spans,
                metadata = summary.metadata,
                "Wrote {}",
                path.display()
            ),
            None => info!("Trace output disabled, nothing written"),
        },
        Err(e) => tracing::warn!("Trace file not written: {}", e),
    }
}

#[cfg(not(feature = "profiler"))]
fn finish(_profiler: flamezone::Profiler) {
    info!("Built without the profiler feature, no trace written");
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            threads,
            zones,
            duration_ms,
            category,
            output,
            compact,
            meta,
        } => {
            let (mut config, config_dir) = load_config(cli.config.as_ref())?;

            match &config.logging.dir {
                Some(dir) => init_file_logging(
                    &resolve_logs_dir(dir, config_dir.as_deref()),
                    cli.verbose,
                ),
                None => init_logging(cli.verbose),
            }
            match &config_dir {
                Some(dir) => info!("Loaded config from {}", dir.display()),
                None => tracing::debug!("No .flamezone/config.toml found, using defaults"),
            }

            // Command line flags win over the config file
            if let Some(threads) = threads {
                config.workload.threads = threads;
            }
            if let Some(zones) = zones {
                config.workload.zones_per_thread = zones;
            }
            if let Some(duration_ms) = duration_ms {
                config.workload.zone_duration_ms = duration_ms;
            }
            if let Some(category) = category {
                config.workload.category = category;
            }
            if let Some(output) = output {
                config.output.path = output;
            }
            if compact {
                config.output.pretty = false;
            }

            let errors = config.validate();
            if !errors.is_empty() {
                for e in &errors {
                    tracing::error!("{}", e);
                }
                anyhow::bail!("Invalid configuration ({} errors)", errors.len());
            }

            let extra_metadata = meta
                .iter()
                .map(|m| parse_meta(m))
                .collect::<Result<Vec<_>>>()?;

            run(&config, &extra_metadata);
        }

        Commands::Init { force } => {
            init_logging(cli.verbose);

            let flamezone_dir = PathBuf::from(config::FLAMEZONE_DIR);
            let config_path = flamezone_dir.join(config::CONFIG_FILE);

            if config_path.exists() && !force {
                anyhow::bail!(".flamezone/config.toml already exists. Use --force to overwrite.");
            }

            if !flamezone_dir.exists() {
                std::fs::create_dir_all(&flamezone_dir)?;
                info!("Created {}/", flamezone_dir.display());
            }

            let contents = format!(
                "# flamezone configuration\n\
                 # Add trace metadata with [[metadata]] tables:\n\
                 #\n\
                 # [[metadata]]\n\
                 # title = \"build\"\n\
                 # value = \"debug\"\n\n{}",
                Config::default().to_toml()?
            );
            std::fs::write(&config_path, contents)
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
            info!("Created {}", config_path.display());
        }
    }

    Ok(())
}
