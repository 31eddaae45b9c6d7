//! Stats storage and clock configuration

use serde::Deserialize;

use crate::clock::Timezone;
use crate::store::StoreOptions;

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Durability settings for stats files
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Write via temp file + rename so readers never see a half-written file
    pub atomic_writes: bool,
    /// Queue concurrent writes to the same challenge (this process only)
    pub serialize_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            atomic_writes: true,
            serialize_writes: true,
        }
    }
}

/// Store settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileStore {
    pub atomic_writes: Option<bool>,
    pub serialize_writes: Option<bool>,
}

impl StoreConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileStore>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            atomic_writes: file.atomic_writes.unwrap_or(defaults.atomic_writes),
            serialize_writes: file.serialize_writes.unwrap_or(defaults.serialize_writes),
        }
    }

    pub fn options(&self) -> StoreOptions {
        StoreOptions {
            atomic_writes: self.atomic_writes,
            serialize_writes: self.serialize_writes,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Clock
// ─────────────────────────────────────────────────────────────────────────────

/// Which calendar "today" (the default challenge) comes from
#[derive(Debug, Clone, Default)]
pub struct ClockConfig {
    pub timezone: Timezone,
}

#[derive(Debug, Deserialize, Default)]
pub struct FileClock {
    pub timezone: Option<String>,
}

impl ClockConfig {
    pub fn from_file(file: Option<FileClock>) -> Self {
        let file = file.unwrap_or_default();

        Self {
            timezone: file
                .timezone
                .map(|s| Timezone::from_str(&s))
                .unwrap_or_default(),
        }
    }
}
