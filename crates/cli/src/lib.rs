pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::check_expiry::CheckExpiryArgs;
use commands::export::{ExportArgs, ExportKind};
use commands::quote::QuoteArgs;

#[derive(Debug, Parser)]
#[command(
    name = "policydesk",
    about = "PolicyDesk operator CLI",
    long_about = "Operate the PolicyDesk back office: migrations, demo data, config inspection, expiry checks, exports and quote runs.",
    after_help = "Examples:\n  policydesk doctor --json\n  policydesk check-expiry --lead-days 7\n  policydesk quote --agent AGT-elif --customer CUS-seed-ayse --policy-type Kasko"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo agents, customers and policies")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, insurer sources, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Report active policies that end exactly the lead time from today")]
    CheckExpiry {
        #[arg(long, help = "Date to check from (YYYY-MM-DD), defaults to today")]
        today: Option<NaiveDate>,
        #[arg(long, help = "Days ahead to look, defaults to expiry.lead_days")]
        lead_days: Option<u32>,
    },
    #[command(about = "Export the agent's customers or policies as CSV")]
    Export {
        #[arg(value_enum)]
        kind: ExportKind,
        #[arg(long, help = "Acting agent id")]
        agent: String,
        #[arg(long, help = "Write the CSV to this file instead of the outcome message")]
        output: Option<PathBuf>,
    },
    #[command(about = "Request quotes from every configured insurer for one customer")]
    Quote {
        #[arg(long, help = "Acting agent id")]
        agent: String,
        #[arg(long, help = "Customer id")]
        customer: String,
        #[arg(long, help = "Kasko, Trafik or DASK")]
        policy_type: String,
    },
}

/// Diagnostics go to stderr so stdout carries only the command outcome.
/// `RUST_LOG=info` surfaces per-policy expiry notices.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::CheckExpiry { today, lead_days } => {
            commands::check_expiry::run(CheckExpiryArgs { today, lead_days })
        }
        Command::Export { kind, agent, output } => {
            commands::export::run(ExportArgs { kind, agent, output })
        }
        Command::Quote { agent, customer, policy_type } => {
            commands::quote::run(QuoteArgs { agent, customer, policy_type })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
