//! rangeforge CLI entry point.

use clap::Parser;

use rangeforge::cli::args::{Cli, Commands};
use rangeforge::cli::commands;
use rangeforge::error::RangeforgeError;
use rangeforge::observability::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Plan(args) => commands::plan::run(args),
        Commands::Provision(args) => commands::provision::run(args).await,
    };

    if let Err(error) = result {
        // Stage failures already printed their issue blocks.
        if !matches!(error, RangeforgeError::StageFailed { .. }) {
            eprintln!("Error: {error}");
        }
        std::process::exit(error.exit_code());
    }
}
