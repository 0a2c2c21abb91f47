use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Available tote subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bundle the configured entries
    ///
    /// Resolves and transforms every reachable module, splits the graph into
    /// chunks and writes them to the output directory together with
    /// `tote-manifest.json`.
    Build(BuildArgs),

    /// Build each entry as a link library
    ///
    /// Writes one self-registering artifact per entry plus a manifest that
    /// other builds list under `externals` to reference instead of bundle it.
    Library(LibraryArgs),

    /// Validate configuration without building
    ///
    /// Checks option values, patterns and templates, and that entry files and
    /// external manifests exist.
    Check(CheckArgs),
}

/// Where to load configuration from.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Path to a config file
    ///
    /// Defaults to `tote.toml` or `tote.config.json` in the current directory.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Arguments for the build command
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Entry chunk as NAME=SPECIFIER (repeatable)
    ///
    /// Replaces the entries from the config file. Without a config file these
    /// are the whole configuration.
    ///
    /// Examples:
    ///   tote build --entry main=./src/index.js
    ///   tote build --entry app=./src/app.js --entry admin=./src/admin.js
    #[arg(short, long, value_name = "NAME=SPEC", value_parser = parse_entry)]
    pub entry: Vec<(String, String)>,

    /// Output directory for chunk files
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Number of transform workers
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: Option<u64>,

    /// Minify scripts, stylesheets and JSON before writing
    #[arg(long)]
    pub minify: bool,

    /// Remove the output directory before building
    #[arg(long)]
    pub clean: bool,
}

/// Arguments for the library command
#[derive(Args, Debug, Default)]
pub struct LibraryArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output directory for artifacts and manifests
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

/// Arguments for the check command
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Also resolve and transform the module graph
    ///
    /// Reports every unresolvable specifier and failing transform without
    /// writing any output.
    #[arg(long)]
    pub graph: bool,
}

/// Parse `NAME=SPECIFIER`.
pub fn parse_entry(value: &str) -> Result<(String, String), String> {
    let (name, specifier) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=SPECIFIER, got '{value}'"))?;
    let (name, specifier) = (name.trim(), specifier.trim());
    if name.is_empty() {
        return Err(format!("entry '{value}' has an empty chunk name"));
    }
    if specifier.is_empty() {
        return Err(format!("entry '{name}' has an empty specifier"));
    }
    Ok((name.to_string(), specifier.to_string()))
}
