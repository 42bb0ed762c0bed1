// ABOUTME: Entry point for the opkssh CLI
// ABOUTME: Parses arguments, sets up logging, and reports failures with hints

use clap::Parser;
use colored::Colorize;
use opkssh_cli::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    opkssh_cli::logging::init(cli.verbose);

    match opkssh_cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            if let Some(hint) = opkssh_cli::hint_for(&err) {
                eprintln!("{} {}", "Hint:".yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}
