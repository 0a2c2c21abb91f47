//! Subscriber setup for programs that embed tote.
//!
//! Only available with the `logging` feature. Without it the crate just
//! emits `tracing` events and leaves the subscriber to the caller.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    /// Build phases and summaries.
    #[default]
    Info,
    /// Per-module resolution, transform and chunk assignment.
    Debug,
}

/// Accepted spellings, canonical name first.
const NAMES: &[(LogLevel, &[&str])] = &[
    (LogLevel::Silent, &["off", "silent", "none"]),
    (LogLevel::Error, &["error"]),
    (LogLevel::Warn, &["warn", "warning"]),
    (LogLevel::Info, &["info"]),
    (LogLevel::Debug, &["debug", "verbose"]),
];

impl LogLevel {
    /// Level for the usual `--verbose` / `--quiet` pair; verbose wins.
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => LogLevel::Debug,
            (false, true) => LogLevel::Error,
            (false, false) => LogLevel::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        NAMES
            .iter()
            .find(|(level, _)| *level == self)
            .and_then(|(_, names)| names.first().copied())
            .unwrap_or("info")
    }

    fn level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Silent => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        NAMES
            .iter()
            .find(|(_, names)| names.iter().any(|name| name.eq_ignore_ascii_case(wanted)))
            .map(|(level, _)| *level)
            .ok_or_else(|| format!("unknown log level '{wanted}'"))
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn install(filter: EnvFilter) -> bool {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).without_time())
        .try_init()
        .is_ok()
}

/// Install a global subscriber at `level`; `RUST_LOG` directives are layered
/// on top. Returns `false` when a subscriber was already installed.
///
/// ```rust,no_run
/// use tote_bundler::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::from_flags(true, false));
/// ```
pub fn init_logging(level: LogLevel) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(level.level_filter().into())
        .from_env_lossy();
    install(filter)
}

/// Install a global subscriber configured only by `RUST_LOG`, info when unset.
pub fn init_logging_from_env() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LogLevel::Info.level_filter().into()));
    install(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_aliases_parse() {
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(" NONE ".parse::<LogLevel>(), Ok(LogLevel::Silent));
        assert_eq!("Verbose".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("trace".parse::<LogLevel>().is_err());
    }

    #[test]
    fn display_uses_the_canonical_name() {
        assert_eq!(LogLevel::Silent.to_string(), "off");
        assert_eq!(LogLevel::default().to_string(), "info");
        for (level, _) in NAMES {
            assert_eq!(level.as_str().parse::<LogLevel>(), Ok(*level));
        }
    }

    #[test]
    fn verbose_wins_over_quiet() {
        assert_eq!(LogLevel::from_flags(true, true), LogLevel::Debug);
        assert_eq!(LogLevel::from_flags(false, true), LogLevel::Error);
        assert!(LogLevel::from_flags(false, false) > LogLevel::Warn);
    }

    #[test]
    fn second_install_reports_false() {
        init_logging(LogLevel::Silent);
        assert!(!init_logging_from_env());
    }
}
