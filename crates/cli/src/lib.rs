pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "kopi",
    about = "Kopi assistant operator CLI",
    long_about = "Prepare the kopi database, load the product catalog, inspect configuration, and chat with the assistant from a terminal.",
    after_help = "Examples:\n  kopi migrate\n  kopi seed\n  kopi ingest data/products.jsonl\n  kopi doctor --json\n  kopi ask --session demo \"What is 12 * 3?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic outlet dataset and verify every row is present")]
    Seed,
    #[command(about = "Index a JSON-lines drinkware catalog into the product store")]
    Ingest {
        #[arg(help = "Path to the scraped catalog, one JSON object per line")]
        path: PathBuf,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Check config, database, outlet fixtures and completion provider readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Send one message to the assistant and print its reply")]
    Ask {
        #[arg(long, default_value = "cli", help = "Conversation thread to continue")]
        session: String,
        #[arg(help = "Message text")]
        message: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Ingest { path } => commands::ingest::run(&path),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { session, message } => commands::ask::run(&session, &message),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
