pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use festa_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "festa",
    about = "Festa booking lifecycle operator CLI",
    long_about = "Operate the booking lifecycle store: migrations, readiness checks, provider calendars and the elapsed-reservation sweep.",
    after_help = "Examples:\n  festa migrate\n  festa doctor --json\n  festa calendar --provider P-1 --date 2025-06-01\n  festa finish-elapsed --now 2025-06-01T23:00"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Path to a festa.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the database URL")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "Override the log level")]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, DB connectivity and schema version")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Show a provider's hourly occupancy for one day")]
    Calendar {
        #[arg(long, help = "Provider id")]
        provider: String,
        #[arg(long, help = "Day to show, YYYY-MM-DD")]
        date: String,
    },
    #[command(about = "Finish confirmed reservations whose event has ended")]
    FinishElapsed {
        #[arg(long, help = "Reference time, YYYY-MM-DDTHH:MM (defaults to now)")]
        now: Option<String>,
    },
}

impl GlobalArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                log_level: self.log_level.clone(),
                enforce_on_confirm: None,
            },
        }
    }
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    // stdout carries the command payload.
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.global.load_options();

    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(&options),
        Command::Doctor { json } => commands::doctor::run(&options, json),
        Command::Config => commands::config::run(&options),
        Command::Calendar { provider, date } => {
            commands::calendar::run(&options, &provider, &date)
        }
        Command::FinishElapsed { now } => commands::finish_elapsed::run(&options, now.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
