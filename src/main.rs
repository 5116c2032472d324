//! IgnitionLab Desktop - Main Entry Point
//!
//! Command-line client for the IgnitionLab Dynamics workshop backend.

use clap::Parser;
use tracing::info;

use ignitionlab_lib::{
    commands::{self, Cli},
    config::Config,
    logging, AppState,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }

    // Initialize logging
    logging::init(&config.log_dir(), cli.verbose);
    info!("IgnitionLab client starting against {}", config.api_base_url);

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Restore the previous session before any command decides anything
    state.session.initialize().await;

    if let Err(e) = commands::execute(cli.command, &state).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
