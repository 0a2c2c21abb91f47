//! Terminal output: status messages, spinners and the build summary.
//!
//! Everything goes to stderr. `--quiet` silences all of it except errors;
//! `--no-color`, `NO_COLOR` and non-terminal stderr disable styling.

mod format;
mod messages;
mod spinner;

use std::sync::atomic::{AtomicBool, Ordering};

pub use format::{format_duration, format_size, print_build_summary, print_library_summary, summary_rows};
pub use messages::{error, info, success, warning};
pub use spinner::Spinner;

static COLOR: AtomicBool = AtomicBool::new(false);
static QUIET: AtomicBool = AtomicBool::new(false);

/// Detect color support and record the output flags. Call once from main.
pub fn init_output(no_color: bool, quiet: bool) {
    COLOR.store(!no_color && crate::logger::should_use_colors(), Ordering::Relaxed);
    QUIET.store(quiet, Ordering::Relaxed);
}

pub(crate) fn colors_enabled() -> bool {
    COLOR.load(Ordering::Relaxed)
}

pub(crate) fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Check if running in a CI environment.
pub(crate) fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS"]
        .iter()
        .any(|var| std::env::var_os(var).is_some())
}

/// Spinners only make sense on an interactive, non-CI terminal.
pub(crate) fn animations_enabled() -> bool {
    !is_quiet() && !is_ci() && console::user_attended_stderr()
}
