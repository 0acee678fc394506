pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use shopmate_core::config::{LogFormat, LoggingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "shopmate",
    about = "Shopmate operator CLI",
    long_about = "Run sales-assistant turns against seeded fixtures, inspect configuration, and preview the demo catalog.",
    after_help = "Examples:\n  shopmate turn --message \"show me all products\"\n  shopmate config\n  shopmate seed"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one shopper message through the pipeline against seeded fixtures")]
    Turn {
        #[arg(long, help = "The shopper message for this turn")]
        message: String,
        #[arg(long, default_value = "demo-session", help = "Session identifier")]
        session: String,
        #[arg(long, default_value = "demo", help = "Site/tenant identifier")]
        site: String,
        #[arg(
            long,
            default_value = "Happy to help! Let me pull up some options. [search_products: laptop]",
            help = "Scripted model reply (markers trigger actions)"
        )]
        reply: String,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Print the deterministic demo catalog used by `turn`")]
    Seed,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Turn { message, session, site, reply } => {
            commands::turn::run(&message, &session, &site, &reply)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Seed => commands::seed::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the global tracing subscriber from the logging section. Safe to
/// call once per process; later calls are ignored.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(logging.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if result.is_err() {
        tracing::debug!(event_name = "cli.tracing.already_initialized", "subscriber already set");
    }
}
