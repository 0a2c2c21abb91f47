//! Logging setup for the tote CLI.
//!
//! Level is decided in this order:
//! 1. `--verbose`: debug for tote crates
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`
//! 4. info for tote crates, warnings for everything else
//!
//! Logs go to stderr so build output on stdout stays clean.

use tote_bundler::LogLevel;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const TOTE_CRATES: &[&str] = &["tote_bundler", "tote_config", "tote_graph", "tote_cli"];

/// Initialize the tracing subscriber. Call once, before any logging.
///
/// ```rust,no_run
/// use tote_cli::logger::init_logger;
///
/// init_logger(false, false, false);
/// tracing::info!("starting build");
/// ```
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(filter_for(verbose, quiet), no_color);
}

/// Initialize with an explicit filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && should_use_colors())
        .without_time()
        .compact();

    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    let level = LogLevel::from_flags(verbose, quiet);
    if level == LogLevel::Info
        && let Ok(filter) = EnvFilter::try_from_default_env()
    {
        return filter;
    }
    EnvFilter::new(directives(level))
}

/// `level` for tote's own crates; dependencies never go below warn.
fn directives(level: LogLevel) -> String {
    let mut directives: Vec<String> = TOTE_CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect();
    directives.push(level.min(LogLevel::Warn).to_string());
    directives.join(",")
}

/// `NO_COLOR` wins over `FORCE_COLOR`; otherwise ask the terminal.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_keep_dependencies_at_warn() {
        assert_eq!(
            directives(LogLevel::Info),
            "tote_bundler=info,tote_config=info,tote_graph=info,tote_cli=info,warn"
        );
    }

    #[test]
    fn quiet_directives_are_errors_only() {
        assert_eq!(
            directives(LogLevel::Error),
            "tote_bundler=error,tote_config=error,tote_graph=error,tote_cli=error,error"
        );
    }

    #[test]
    fn verbose_filter_enables_debug() {
        assert!(filter_for(true, false).to_string().contains("tote_bundler=debug"));
    }
}
