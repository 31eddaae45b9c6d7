// challenge-stats binary - CLI dispatch, logging and server lifecycle

use anyhow::{Context, Result};
use challenge_stats::cli::{handle_config, Cli, Commands};
use challenge_stats::clock::SystemClock;
use challenge_stats::config::Config;
use challenge_stats::handler::StatsHandler;
use challenge_stats::store::StatsStore;
use challenge_stats::{cgi, logging, server, startup};
use clap::Parser;
use std::sync::Arc;

/// Wire the store and handler from configuration
fn build_handler(config: &Config) -> StatsHandler {
    let clock = Arc::new(SystemClock::new(config.clock.timezone));
    let store = StatsStore::new(config.data_dir.clone(), clock, config.store.options());
    StatsHandler::new(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config management never touches the store or logging
    if let Some(Commands::Config { show, reset, path }) = &cli.command {
        return handle_config(&cli, *show, *reset, *path);
    }

    let config = match cli.config() {
        Ok(config) => config,
        // A CGI caller still expects an HTTP response on stdout
        Err(e) if matches!(cli.command, Some(Commands::Cgi)) => {
            eprintln!("Error: {:#}", e);
            return cgi::write_failure(&e, &mut std::io::stdout().lock());
        }
        Err(e) => return Err(e),
    };

    // The guard must be kept alive for the duration of the program to ensure logs flush
    let _file_guard = logging::init(&config.logging);

    let handler = build_handler(&config);

    match cli.command {
        Some(Commands::Cgi) => cgi::run(&handler),
        _ => serve(config, handler).await,
    }
}

/// Run the HTTP server until Ctrl+C
async fn serve(config: Config, handler: StatsHandler) -> Result<()> {
    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    startup::print_startup(&config);
    startup::log_startup(&config);

    // Create shutdown channel for graceful server shutdown
    // This is a oneshot channel - it can only send one signal
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let mut server = tokio::spawn(server::start_server(
        config.bind_addr,
        handler,
        shutdown_rx,
    ));

    tokio::select! {
        // Server exited on its own (bind failure, serve error)
        result = &mut server => {
            return result.context("Server task panicked")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
        }
    }

    tracing::info!("Shutting down...");

    // If the send fails, the server has already shut down (which is fine)
    let _ = shutdown_tx.send(());
    server.await.context("Server task panicked")??;

    tracing::info!("Shutdown complete");
    Ok(())
}
