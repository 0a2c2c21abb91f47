//! Command-line interface definition for tote.
//!
//! # Command Structure
//!
//! - `tote build` - Bundle entries into chunks
//! - `tote library` - Build link libraries and their manifests
//! - `tote check` - Configuration validation

mod commands;

use clap::Parser;

pub use commands::{BuildArgs, CheckArgs, Command, ConfigArgs, LibraryArgs, parse_entry};

/// Tote - a module bundler with chunk splitting and link libraries
#[derive(Parser, Debug)]
#[command(
    name = "tote",
    version,
    about = "A module bundler with chunk splitting and link libraries",
    long_about = "Tote resolves a project's module graph from named entries, runs transforms\n\
                  on a bounded worker pool, splits the graph into entry, shared and grouped\n\
                  chunks and writes them through a configurable emit pipeline."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    ///
    /// Shows per-module resolution, transform and chunk assignment.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
