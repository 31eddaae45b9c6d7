//! Time source for the default challenge date
//!
//! "Today" is whatever the clock says it is. Production uses the system clock
//! (UTC unless configured otherwise); tests pin a date with `FixedClock`.

use chrono::{Local, NaiveDate, Utc};

/// Calendar date format used for challenge ids (`YYYY-MM-DD`)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which calendar the system clock reads "today" from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Timezone {
    #[default]
    Utc,
    Local,
}

impl Timezone {
    /// Parse timezone string from config
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "local" => Self::Local,
            _ => Self::Utc, // Default to UTC for unknown values
        }
    }

    /// Convert to string for TOML serialization
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utc => "utc",
            Self::Local => "local",
        }
    }
}

/// Source of the current calendar date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;

    /// Today's date formatted as a challenge id
    fn today_id(&self) -> String {
        self.today().format(DATE_FORMAT).to_string()
    }
}

/// Wall-clock time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    timezone: Timezone,
}

impl SystemClock {
    pub fn new(timezone: Timezone) -> Self {
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        match self.timezone {
            Timezone::Utc => Utc::now().date_naive(),
            Timezone::Local => Local::now().date_naive(),
        }
    }
}

/// Clock pinned to a single date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
