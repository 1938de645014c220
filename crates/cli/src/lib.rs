pub mod bootstrap;
pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "orderdesk",
    about = "Orderdesk operator CLI",
    long_about = "Operate the order change proposal pipeline: migrations, seed data, config \
                  inspection, intake processing, and proposal resolution.",
    after_help = "Examples:\n  orderdesk migrate\n  orderdesk seed\n  orderdesk process --event intake.json --extraction extraction.json\n  orderdesk resolve --proposal <id> --action accept"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset (idempotent)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and database connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run the intake pipeline for one intake event")]
    Process {
        #[arg(long, help = "Path to an intake event JSON file")]
        event: PathBuf,
        #[arg(
            long,
            help = "Path to a pre-extracted outcome JSON file; skips the live oracle and \
                    relies on the deterministic intent rules"
        )]
        extraction: Option<PathBuf>,
    },
    #[command(about = "Accept or reject a pending proposal")]
    Resolve {
        #[arg(long, help = "Proposal id")]
        proposal: String,
        #[arg(long, value_parser = ["accept", "reject"], help = "Review action")]
        action: String,
        #[arg(long, help = "Reviewer notes")]
        notes: Option<String>,
        #[arg(long, default_value = "operator@cli", help = "Reviewer identity for the audit trail")]
        reviewed_by: String,
        #[arg(long, help = "Path to reviewer-edited submitted lines (JSON array)")]
        lines: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Process { event, extraction } => commands::process::run(&event, extraction.as_deref()),
        Command::Resolve { proposal, action, notes, reviewed_by, lines } => {
            commands::resolve::run(&proposal, &action, notes, &reviewed_by, lines.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
