pub mod commands;
pub mod outbox;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser, Subcommand};
use reliefpath_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};
use tracing::Level;

use crate::commands::apply::ApplyTarget;

#[derive(Debug, Parser)]
#[command(
    name = "reliefpath",
    about = "Reliefpath operator CLI",
    long_about = "Score relief eligibility, drive guided applications, and inspect runtime readiness.",
    after_help = "Examples:\n  reliefpath evaluate --profile household.json\n  reliefpath apply --program penalty_abatement --script actions.json\n  reliefpath doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "List relief programs in catalog order")]
    Programs,
    #[command(about = "Rank relief programs for a JSON circumstance profile")]
    Evaluate {
        #[arg(long, help = "Path to a JSON profile")]
        profile: PathBuf,
        #[arg(long, help = "Also store the profile under this id")]
        save_as: Option<String>,
    },
    #[command(
        about = "Apply a JSON action script to a new or stored application session",
        group(ArgGroup::new("target").required(true).args(["program", "session"]))
    )]
    Apply {
        #[arg(long, help = "Start a new session for this program id")]
        program: Option<String>,
        #[arg(long, help = "Continue the stored session with this id")]
        session: Option<String>,
        #[arg(long, help = "Path to a JSON array of workflow actions")]
        script: PathBuf,
    },
    #[command(about = "Show a stored session with its current step and visible fields")]
    Show {
        #[arg(long)]
        session: String,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, program catalog integrity, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Programs => commands::programs::run(),
        Command::Evaluate { profile, save_as } => {
            commands::evaluate::run(&profile, save_as.as_deref())
        }
        Command::Apply { program, session, script } => {
            let target = match (program.as_deref(), session.as_deref()) {
                (_, Some(session)) => ApplyTarget::Session(session),
                (Some(program), None) => ApplyTarget::Program(program),
                (None, None) => {
                    return finish(commands::CommandResult::failure(
                        "apply",
                        "invalid_input",
                        "either --program or --session is required",
                        6,
                    ));
                }
            };
            commands::apply::run(target, &script)
        }
        Command::Show { session } => commands::show::run(&session),
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    finish(result)
}

fn finish(result: commands::CommandResult) -> ExitCode {
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single JSON document per command.
/// A config that fails to load falls back to defaults here; the command
/// itself reports the failure.
fn init_logging() {
    let logging = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    if let Err(error) = install_subscriber(&logging) {
        eprintln!("{error:#}");
    }
}

fn install_subscriber(logging: &LoggingConfig) -> anyhow::Result<()> {
    let level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|error| anyhow::anyhow!(error).context("failed to initialise logging"))
}
