//! # tote-cli
//!
//! Command-line front end for the tote bundler.
//!
//! ## Commands
//!
//! - `tote build` bundles the configured entries into chunk files
//! - `tote library` builds each entry as a link library and writes its manifest
//! - `tote check` loads and validates the configuration without writing anything
//!
//! Configuration is layered: defaults, then `tote.toml` / `tote.config.json`,
//! then `TOTE_*` environment variables, then command-line flags.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result};
