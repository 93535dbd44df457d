use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hostlog::agent::{self, SystemSources};
use hostlog::config::{Config, Overrides};
use hostlog::runner::InterruptibleSleeper;
use log::{error, info, warn};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Command-line arguments for the host metrics agent
#[derive(Parser, Debug)]
#[command(
    name = "hostlog",
    about = "Periodic host metrics collection agent",
    long_about = "Samples performance counters, drive usage, error-level system events and \
                  network adapter traffic at a fixed interval, appends every sample to a CSV \
                  log and optionally mails an alert when a threshold is reached."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        global = true,
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        global = true,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log performance counters, drive usage and system events
    System {
        #[command(flatten)]
        common: CommonArgs,

        /// Alert when total CPU usage reaches this percentage
        #[arg(long, value_name = "PERCENT")]
        cpu_threshold: Option<f64>,

        /// Alert when a drive's used space reaches this percentage
        #[arg(long, value_name = "PERCENT")]
        disk_threshold: Option<f64>,

        /// Event log to monitor (repeatable): system, user, kernel or a unit name
        #[arg(long = "event-log", value_name = "LOG")]
        event_logs: Vec<String>,
    },
    /// Log network adapter traffic
    Network {
        #[command(flatten)]
        common: CommonArgs,

        /// Adapter name or index to log (repeatable); all adapters when omitted
        #[arg(long = "adapter", value_name = "NAME|INDEX")]
        adapters: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Seconds between two cycles
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,

    /// Number of cycles to run; runs until interrupted when omitted
    #[arg(long, value_name = "COUNT")]
    iterations: Option<u32>,

    /// Directory for the CSV logs
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

impl Cli {
    /// Validate the CLI arguments
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in Config::load
            if config_path.exists() && !config_path.is_file() {
                return Err(format!(
                    "Configuration path is not a file: {}",
                    config_path.display()
                ));
            }
        }
        Ok(())
    }

    fn overrides(&self) -> Overrides {
        match &self.command {
            Command::System {
                common,
                cpu_threshold,
                disk_threshold,
                event_logs,
            } => Overrides {
                cpu_threshold: *cpu_threshold,
                disk_threshold: *disk_threshold,
                event_logs: event_logs.clone(),
                ..common.overrides()
            },
            Command::Network { common, adapters } => Overrides {
                adapters: adapters.clone(),
                ..common.overrides()
            },
        }
    }
}

impl CommonArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            interval_seconds: self.interval,
            iterations: self.iterations,
            output_dir: self.output_dir.clone(),
            ..Default::default()
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config
        .apply(cli.overrides())
        .context("Invalid command-line value")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<()> {
    cli.validate().map_err(anyhow::Error::msg)?;
    let config = load_config(cli)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), stopping after the current cycle...");
        handler_stop.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to install SIGINT handler: {}", e);
    }
    let sleeper = Box::new(InterruptibleSleeper::new(Arc::clone(&stop)));

    let mut runner = match cli.command {
        Command::System { .. } => {
            let dispatcher = agent::alert_dispatcher(&config)?;
            agent::system_runner(
                &config,
                SystemSources::host(),
                Rc::new(dispatcher),
                sleeper,
                stop,
            )?
        }
        Command::Network { .. } => {
            agent::network_runner(&config, agent::host_adapters(), sleeper, stop)?
        }
    };

    runner.run();
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting hostlog");

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }

    info!("hostlog stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_system_overrides() {
        let cli = Cli::parse_from([
            "hostlog",
            "system",
            "--interval",
            "5",
            "--cpu-threshold",
            "0",
            "--event-log",
            "system",
            "--event-log",
            "kernel",
        ]);

        let overrides = cli.overrides();

        assert_eq!(overrides.interval_seconds, Some(5));
        assert_eq!(overrides.cpu_threshold, Some(0.0));
        assert_eq!(overrides.disk_threshold, None);
        assert_eq!(overrides.event_logs, vec!["system", "kernel"]);
        assert!(overrides.adapters.is_empty());
    }

    #[test]
    fn test_network_overrides() {
        let cli = Cli::parse_from([
            "hostlog",
            "--verbose",
            "network",
            "--adapter",
            "eth0",
            "--adapter",
            "3",
            "--iterations",
            "2",
        ]);

        let overrides = cli.overrides();

        assert!(cli.verbose);
        assert_eq!(overrides.adapters, vec!["eth0", "3"]);
        assert_eq!(overrides.iterations, Some(2));
    }

    #[test]
    fn test_cli_validation_with_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let cli = Cli::parse_from([
            "hostlog",
            "--config",
            dir.path().to_str().unwrap(),
            "system",
        ]);

        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_cli_validation_with_missing_file() {
        let cli = Cli::parse_from(["hostlog", "--config", "/nonexistent/hostlog.toml", "system"]);

        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_threshold_fails_to_load() {
        let cli = Cli::parse_from(["hostlog", "system", "--disk-threshold", "150"]);

        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_zero_interval_fails_to_load() {
        let cli = Cli::parse_from(["hostlog", "network", "--interval", "0"]);

        assert!(load_config(&cli).is_err());
    }
}
