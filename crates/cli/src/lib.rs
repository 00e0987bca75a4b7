pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

pub const DEFAULT_QUESTION: &str = "Show me info for Riva Food Market.";

#[derive(Debug, Parser)]
#[command(
    name = "querybot",
    about = "Ask questions about Anne Arundel County food facilities",
    long_about = "Turn a natural-language question into a SELECT against the facility table, \
                  run it, and summarize the rows.",
    after_help = "Examples:\n  querybot ask \"Who owns Riva Food Market?\"\n  querybot doctor --json\n  querybot config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Answer one question against the facility table")]
    Ask {
        #[arg(default_value = DEFAULT_QUESTION, help = "Question in plain English")]
        question: String,
        #[arg(long, help = "Wrap the answer in the JSON command envelope")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model credentials, and database connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Create the local SQLite facility table")]
    Migrate,
    #[command(about = "Load the sample facility rows into the local SQLite table")]
    Seed,
}

pub fn run() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ask { question, json } => commands::ask::run(&question, json),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
