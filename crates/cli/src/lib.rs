pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use routey_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "routey",
    about = "Routey operator CLI",
    long_about = "Inspect branch routing decisions, effective configuration, and delivery readiness.",
    after_help = "Examples:\n  routey route \"metro manila\"\n  routey config\n  routey doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Resolve a free-text location against the production routing tables")]
    Route {
        location: String,
        #[arg(long, help = "Treat the location as routing-pending")]
        pending: bool,
    },
    #[command(about = "Inspect effective configuration values with token redaction")]
    Config,
    #[command(about = "Validate configuration and routing table invariants")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Command::Route { location, pending } => commands::route::run(&location, pending),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn init_tracing() {
    let (level, format) = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => (config.logging.level, config.logging.format),
        Err(_) => ("info".to_string(), LogFormat::Compact),
    };

    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    // A second init (tests, repeated calls) is not an error worth surfacing.
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}
