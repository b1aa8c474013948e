pub mod commands;

use cartwise_core::config::{AppConfig, LoadOptions, LogFormat};
use cartwise_core::knowledge::BuildJob;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "cartwise",
    about = "Cartwise operator CLI",
    long_about = "Operate the Cartwise recommendation pipeline: schema migrations, demo data, \
                  knowledge builds, readiness checks and config inspection.",
    after_help = "Examples:\n  cartwise migrate\n  cartwise seed\n  cartwise build --job all\n  cartwise status"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic grocery demo catalog and order history")]
    Seed,
    #[command(about = "Mine settled orders and rewrite the knowledge artifacts")]
    Build {
        #[arg(
            long,
            default_value = "all",
            help = "Which artifacts to rebuild: all, associations or popularity"
        )]
        job: BuildJob,
    },
    #[command(about = "Load the knowledge artifacts and report what would be served")]
    Status,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

/// Logs go to stderr so stdout stays a single JSON payload.
fn init_logging() {
    use tracing::Level;

    let Ok(config) = AppConfig::load(LoadOptions::default()) else {
        return;
    };
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::WARN);
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
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Build { job } => commands::build::run(job),
        Command::Status => commands::status::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
