//! challenge-stats - per-user statistics store for daily challenges
//!
//! Clients fetch aggregate or per-user statistics and submit updated
//! statistics for a user, scoped to a challenge identified by a date string.
//!
//! Architecture:
//! - [`store`]: one JSON file per challenge id in the data directory
//! - [`handler`]: method routing, validation and the load-replace-save merge
//! - [`server`] / [`cgi`]: axum HTTP transport and one-shot CGI adapter
//! - [`clock`]: injected source of "today" for the default challenge

pub mod cgi;
pub mod cli;
pub mod clock;
pub mod config;
pub mod handler;
pub mod logging;
pub mod server;
pub mod startup;
pub mod store;
