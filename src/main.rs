use clap::Parser;
use log::error;
use std::process::ExitCode;

use feedback_tally::commands::{self, Cli};
use feedback_tally::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = commands::run(cli, config).await {
        error!("Command failed: {}", e);
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
