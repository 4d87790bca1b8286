// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kea-Bootstrap: host bootstrapper for the ansible-vpn playbook

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kea_bootstrap::{
    collect::is_valid_domain,
    config::DEFAULT_CONFIG_TEMPLATE,
    probe::{self, Elevation, HostReport, OsDescriptor},
    prompt::TermPrompter,
    runner::SystemRunner,
    workspace::Workspace,
    Bootstrap, Config, Outcome,
};

/// Kea-Bootstrap: prepares a host and runs the ansible-vpn playbook
///
/// Installs system packages, checks out the playbook, provisions its Python
/// runtime, asks for your settings and launches the playbook.
#[derive(Parser, Debug)]
#[command(name = "bootstrap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "bootstrap.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Print external commands instead of running them
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON format
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bootstrap this host (the default)
    Run,

    /// Show what was detected about this host
    Probe {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Check that a domain resolves to this host
    CheckDomain {
        /// Domain name, e.g. vpn.example.org
        domain: String,
    },

    /// Show configuration
    Config,

    /// Initialize a new bootstrap configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Any argument at all switches sudo to -H
    let has_extra_args = std::env::args_os().len() > 1;
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new(configured_log_level(&cli.config))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.debug)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.as_ref().unwrap_or(&Commands::Run) {
        Commands::Version => {
            println!("Kea-Bootstrap v{}", env!("CARGO_PKG_VERSION"));
            println!("Host bootstrapper for the ansible-vpn playbook");
            Ok(())
        }

        Commands::Init { force } => init_config(&cli.config, *force),

        Commands::Config => show_config(&cli.config),

        Commands::Probe { format } => probe_host(&cli.config, *format, has_extra_args).await,

        Commands::CheckDomain { domain } => check_domain(&cli.config, domain).await,

        Commands::Run => run_bootstrap(&cli.config, cli.dry_run, has_extra_args).await,
    }
}

/// Log level from the config file, without failing on a broken file
fn configured_log_level(config_path: &Path) -> String {
    Config::load_or_default(config_path)
        .map(|config| config.logging.level)
        .unwrap_or_else(|_| "warn".to_string())
}

fn load_config(config_path: &Path) -> anyhow::Result<Config> {
    Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

/// Initialize a new configuration file
fn init_config(config_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(config_path, DEFAULT_CONFIG_TEMPLATE)?;
    info!("Created configuration file: {}", config_path.display());
    println!("Created configuration file: {}", config_path.display());
    Ok(())
}

/// Show the current configuration
fn show_config(config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("No configuration file found. Using defaults:");
        println!();
    }

    let config = load_config(config_path)?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Print the host report
async fn probe_host(
    config_path: &Path,
    format: OutputFormat,
    has_extra_args: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let report = HostReport::gather(&config, has_extra_args).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Host:");
            println!("  System: {} {}", report.os.system, report.os.release);
            println!("  Machine: {}", report.os.machine);
            println!(
                "  Platform: {} {} ({})",
                report.os.platform, report.os.version_id, report.family
            );
            println!("  Elevation: {}", report.elevation);
            println!("  Cloud instance: {}", report.cloud_instance);
            println!(
                "  Public IP: {}",
                report.public_ip.as_deref().unwrap_or("unavailable")
            );
        }
    }

    Ok(())
}

/// Compare a domain's A record with this host's public address
async fn check_domain(config_path: &Path, domain: &str) -> anyhow::Result<()> {
    if !is_valid_domain(domain) {
        anyhow::bail!(
            "Invalid domain name '{}': use lowercase letters, digits, dots and dashes",
            domain
        );
    }

    let config = load_config(config_path)?;
    let resolved = probe::resolve_domain(domain, config.network.lookup_timeout()).await;
    let public_ip = probe::public_ip(&config.network).await;

    println!(
        "{} resolves to: {}",
        domain,
        resolved.map_or_else(|| "nothing".to_string(), |ip| ip.to_string())
    );
    println!(
        "Public IP of this host: {}",
        public_ip.as_deref().unwrap_or("unavailable")
    );

    match (resolved, public_ip) {
        (Some(resolved), Some(public)) if resolved.to_string() == public => {
            println!("The domain points to this host");
        }
        (Some(_), Some(_)) => {
            warn!(domain = %domain, "Domain does not point to this host");
            println!("The domain does not point to this host yet");
        }
        _ => println!("Could not compare addresses"),
    }

    Ok(())
}

/// Run the full bootstrap
async fn run_bootstrap(config_path: &Path, dry_run: bool, has_extra_args: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let workspace = Workspace::new(config.workspace_dir()?);
    let os = OsDescriptor::detect();
    let elevation = Elevation::detect(has_extra_args);

    if dry_run {
        println!("[DRY RUN] Bootstrapping {}", workspace.root().display());
    }

    let runner = SystemRunner::new(dry_run);
    let mut prompter = TermPrompter::new();

    let report = Bootstrap::new(&config, os, workspace, elevation, &runner, &mut prompter)
        .dry_run(dry_run)
        .run()
        .await?;

    match report.outcome {
        Outcome::AlreadyConfigured | Outcome::Launched => {
            println!("Bootstrap completed successfully");
        }
        Outcome::Declined => {
            println!("Bootstrap completed; the playbook has not been run");
        }
    }
    info!(
        duration_ms = report.total_duration_ms,
        cloud_instance = report.cloud_instance,
        "Finished"
    );

    Ok(())
}
