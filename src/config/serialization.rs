//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

impl Config {
    /// Serialize config to TOML string (single source of truth for format)
    pub fn to_toml(&self) -> String {
        format!(
            r#"# challenge-stats configuration

# HTTP bind address (env: CHALLENGE_STATS_BIND)
bind_addr = "{bind}"

# Directory for stats_<challenge>.json files (env: CHALLENGE_STATS_DATA_DIR)
data_dir = {data_dir:?}

# Calendar used for "today" when a request names no challenge: utc, local
[clock]
timezone = "{timezone}"

# Stats file durability
# atomic_writes: write a temp file and rename it into place
# serialize_writes: queue concurrent writes to the same challenge (in-process only)
[store]
atomic_writes = {atomic}
serialize_writes = {serialize}

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = {log_level:?}
# File logging (in addition to stderr)
file_enabled = {log_file_enabled}
file_dir = {log_file_dir:?}
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = {log_file_prefix:?}
"#,
            bind = self.bind_addr,
            data_dir = self.data_dir.display().to_string(),
            timezone = self.clock.timezone.as_str(),
            atomic = self.store.atomic_writes,
            serialize = self.store.serialize_writes,
            log_level = self.logging.level,
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = self.logging.file_dir.display().to_string(),
            log_file_rotation = self.logging.file_rotation,
            log_file_prefix = self.logging.file_prefix,
        )
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = Self::config_path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config path",
            ));
        };

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, self.to_toml())
    }
}
