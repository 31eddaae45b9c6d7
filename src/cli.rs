// CLI module - command-line argument parsing and handlers
//
// Subcommands:
// - serve (default): run the HTTP server
// - cgi: handle one request from the CGI environment
// - config --show | --path | --reset: configuration management

use crate::config::{Config, VERSION};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// challenge-stats - per-user challenge statistics over HTTP
#[derive(Debug, Parser)]
#[command(name = "challenge-stats")]
#[command(version = VERSION)]
#[command(about = "Per-user challenge statistics store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Address to bind the HTTP server to (overrides config and env)
    #[arg(long, global = true)]
    pub bind: Option<SocketAddr>,

    /// Directory for stats files (overrides config and env)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Handle a single request from the CGI environment
    Cgi,

    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

impl Cli {
    /// Effective configuration with this invocation's overrides applied
    pub fn config(&self) -> Result<Config> {
        Ok(Config::from_env()?.with_overrides(self.bind, self.data_dir.clone()))
    }
}

/// Handle `config` subcommand flags
pub fn handle_config(cli: &Cli, show: bool, reset: bool, path: bool) -> Result<()> {
    if path {
        let path = Config::config_path().context("Could not determine config path")?;
        println!("{}", path.display());
    } else if show {
        println!("# Effective configuration (flags > env > file > defaults)");
        println!();
        print!("{}", cli.config()?.to_toml());
    } else if reset {
        Config::default()
            .save()
            .context("Failed to write config file")?;
        if let Some(path) = Config::config_path() {
            println!("Config reset to defaults: {}", path.display());
        }
    } else {
        // No flag provided, show help
        println!("Usage: challenge-stats config [--show|--reset|--path]");
        println!();
        println!("Options:");
        println!("  --show    Display effective configuration");
        println!("  --reset   Reset config file to defaults");
        println!("  --path    Show config file path");
    }
    Ok(())
}
