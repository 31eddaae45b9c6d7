// Startup module - displays banner and module status
//
// Shows version info, where the config came from, and which optional
// behaviours are switched on before the server starts taking requests.

use crate::config::{Config, VERSION};

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// Module status for display
pub struct ModuleStatus {
    pub name: &'static str,
    pub enabled: bool,
    pub description: &'static str,
}

/// Get status of all modules based on config
pub fn get_module_status(config: &Config) -> Vec<ModuleStatus> {
    vec![
        ModuleStatus {
            name: "store",
            enabled: true, // Core, always on
            description: "Per-challenge JSON files",
        },
        ModuleStatus {
            name: "atomic",
            enabled: config.store.atomic_writes,
            description: "Temp file + rename writes",
        },
        ModuleStatus {
            name: "locks",
            enabled: config.store.serialize_writes,
            description: "Per-challenge write queue",
        },
        ModuleStatus {
            name: "file-log",
            enabled: config.logging.file_enabled,
            description: "JSON log files",
        },
    ]
}

/// Print the startup banner to stderr
pub fn print_startup(config: &Config) {
    use colors::*;

    eprintln!();
    eprintln!("  {BOLD}{CYAN}challenge-stats{RESET} {DIM}v{VERSION}{RESET}");
    eprintln!("  {DIM}Per-user challenge statistics over HTTP{RESET}");
    eprintln!();

    // Config file status
    if let Some(path) = Config::config_path() {
        if path.exists() {
            eprintln!("  {DIM}Config:{RESET} {GREEN}✓{RESET} {}", path.display());
        } else {
            eprintln!("  {DIM}Config:{RESET} {DIM}(using defaults){RESET}");
        }
    }
    eprintln!("  {DIM}Data:{RESET}   {}", config.data_dir.display());
    eprintln!("  {DIM}Clock:{RESET}  {}", config.clock.timezone.as_str());
    eprintln!();

    for module in get_module_status(config) {
        let (icon, style) = if module.enabled {
            (format!("{GREEN}✓{RESET}"), "")
        } else {
            (format!("{DIM}○{RESET}"), DIM)
        };
        eprintln!(
            "    {icon} {style}{:<10}{RESET} {DIM}{}{RESET}",
            module.name, module.description
        );
    }

    eprintln!();
    eprintln!(
        "  {MAGENTA}▸{RESET} Listening on {BOLD}http://{}{}{RESET}",
        config.bind_addr,
        crate::server::STATS_ROUTE
    );
    eprintln!();
}

/// Mirror the banner into the log so file logs record the startup state
pub fn log_startup(config: &Config) {
    tracing::info!("challenge-stats v{}", VERSION);
    tracing::info!("Data directory: {}", config.data_dir.display());
    for module in get_module_status(config) {
        let icon = if module.enabled { "✓" } else { "○" };
        tracing::info!("  {} {} - {}", icon, module.name, module.description);
    }
}
