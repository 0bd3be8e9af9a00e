//! Binary entrypoint for the credbridge service.
//!
//! Commands:
//! - `run [--port <path>]` (default) - listen for credentials until interrupted
//! - `init [--force]` - write a starter `credbridge.toml`
//!
//! See the library crate docs for module-level details: `credbridge::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};

use credbridge::config::Config;

#[derive(Parser)]
#[command(name = "credbridge")]
#[command(about = "Apply WiFi credentials received from a provisioning board over serial")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path; built-in defaults are used when it does not exist
    #[arg(short, long, default_value = "credbridge.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for provisioned credentials (default)
    Run {
        /// Serial device of the provisioning board (e.g., /dev/ttyACM0)
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run { port: None }) {
        Commands::Init { force } => {
            init_logging(&Config::default(), cli.verbose);
            if !force && tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                warn!(
                    "Configuration file {} already exists; use --force to overwrite",
                    cli.config
                );
                return Ok(());
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Run { port } => {
            let mut config = Config::load_or_default(&cli.config).await?;
            if let Some(port) = port {
                config.serial.port = port;
            }
            config.validate()?;
            init_logging(&config, cli.verbose);
            info!("Starting credbridge v{}", env!("CARGO_PKG_VERSION"));
            run(config).await?;
        }
    }

    Ok(())
}

#[cfg(feature = "serial")]
async fn run(config: Config) -> Result<()> {
    use credbridge::listener::CredentialListener;
    use credbridge::serial::{SerialSession, SystemConnector};

    let session = SerialSession::new(
        config.serial.settings(),
        config.serial.retry_policy(),
        SystemConnector,
    );
    let mut listener = CredentialListener::new(
        session,
        config.network.configurator(),
        config.serial.timing(),
    );
    let mut shutdown = credbridge::shutdown::listen_for_signals();
    listener.run(&mut shutdown).await?;
    Ok(())
}

#[cfg(not(feature = "serial"))]
async fn run(_config: Config) -> Result<()> {
    log::error!("credbridge was built without the 'serial' feature; no device can be opened");
    std::process::exit(2);
}

fn init_logging(config: &Config, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .logging
            .level_filter()
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    if let Some(ref file) = config.logging.file {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
        {
            Ok(f) => {
                let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));

                // Mirror to the console only when attached to a terminal
                let is_tty = atty::is(atty::Stream::Stdout);

                builder.format(move |fmt, record| {
                    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                    let line = format!("{} [{}] {}", ts, record.level(), record.args());

                    if let Ok(mut guard) = write_mutex.lock() {
                        let _ = writeln!(guard, "{}", line);
                    }

                    if is_tty {
                        writeln!(fmt, "{}", line)
                    } else {
                        Ok(())
                    }
                });
            }
            Err(e) => {
                eprintln!("Cannot open log file {}: {} (logging to console)", file, e);
                builder.format(|fmt, record| {
                    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                    writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
                });
            }
        }
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
