//! Cluster Forge
//!
//! Command-line front end: `configure` writes a new cluster directory and
//! `reconfigure` rewrites the configuration of an existing one.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cluster_forge::architecture::config_path;
use cluster_forge::transmogrifier::pipeline;
use cluster_forge::{Cluster, ConfigureArgs, Configurator, Error, ReconfigureArgs};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Cluster Forge - Postgres/BDR/PGD cluster configuration compiler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate config.yml for a new cluster
    Configure {
        /// Directory to create; its name becomes the cluster name
        cluster_dir: PathBuf,

        /// Overwrite an existing, non-empty cluster directory
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        options: ConfigureArgs,
    },

    /// Change the configuration of an existing cluster
    Reconfigure {
        cluster_dir: PathBuf,

        /// Print the changes that would be made and exit
        #[arg(long, conflicts_with = "check")]
        describe: bool,

        /// Run the checks only and exit
        #[arg(long)]
        check: bool,

        /// Write the new configuration here instead of replacing config.yml
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Machine-readable output for --describe
        #[arg(long, requires = "describe")]
        json: bool,

        #[command(flatten)]
        changes: ReconfigureArgs,
    },
}

// =============================================================================
// Main
// =============================================================================

fn main() {
    let args = Args::parse();

    init_logging(&args);

    if let Err(err) = run(args.command) {
        eprintln!("Error: {:#}", err);
        let code = err
            .downcast_ref::<Error>()
            .map(Error::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Configure {
            cluster_dir,
            force,
            options,
        } => {
            info!("Configuring {} ({})", cluster_dir.display(), options.architecture);
            let cluster = Configurator::new(options)?.configure(&cluster_dir, force)?;
            println!(
                "{} configured with {} instances",
                cluster.name,
                cluster.instances.len()
            );
            Ok(())
        }
        Command::Reconfigure {
            cluster_dir,
            describe,
            check,
            output,
            json,
            changes,
        } => reconfigure(&cluster_dir, describe, check, output, json, &changes),
    }
}

fn reconfigure(
    cluster_dir: &Path,
    describe: bool,
    check: bool,
    output: Option<PathBuf>,
    json: bool,
    changes: &ReconfigureArgs,
) -> anyhow::Result<()> {
    let config = config_path(cluster_dir);
    let mut cluster = Cluster::from_yaml(&config)
        .with_context(|| format!("Failed to load {}", config.display()))?;
    let transmogrifiers = pipeline::transmogrifiers_from_args(changes)?;

    if describe {
        if json {
            let changes: Vec<serde_json::Value> = transmogrifiers
                .iter()
                .filter(|t| t.is_applicable(&cluster))
                .map(|t| {
                    serde_json::json!({
                        "transmogrifier": t.kind().name(),
                        "description": t.description(&cluster).to_string(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&changes)?);
        } else {
            print!("{}", pipeline::describe(&cluster, &transmogrifiers));
        }
        return Ok(());
    }

    if check {
        let result = pipeline::check(&cluster, &transmogrifiers)?;
        print!("{}", result);
        if result.has_errors() {
            return Err(Error::Transmogrifier(format!(
                "{} check(s) failed",
                result.errors.len()
            ))
            .into());
        }
        return Ok(());
    }

    let result = pipeline::apply(&mut cluster, &transmogrifiers)?;
    for warning in &result.warnings {
        warn!("{}", warning);
    }

    match output {
        Some(path) => cluster.write(&path)?,
        None => {
            let backup = backup_path(&config);
            std::fs::copy(&config, &backup)
                .with_context(|| format!("Failed to back up {}", config.display()))?;
            info!("Saved previous configuration as {}", backup.display());
            cluster.write(&config)?;
        }
    }
    Ok(())
}

/// `config.yml.<YYYYMMDDTHHMMSS>.bak` next to `config`
fn backup_path(config: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%dT%H%M%S");
    let name = config
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config.yml".to_string());
    config.with_file_name(format!("{}.{}.bak", name, stamp))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
