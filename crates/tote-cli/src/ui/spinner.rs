//! Spinner for phases without a known length.

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Duration;

/// Falls back to a plain status line when stderr is not interactive.
pub struct Spinner {
    pb: Option<ProgressBar>,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        if !super::animations_enabled() {
            super::info(message);
            return Self { pb: None };
        }

        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["◐", "◓", "◑", "◒"]);
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb: Some(pb) }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(pb) = &self.pb {
            pb.set_message(message.to_string());
        }
    }

    pub fn finish(&self, message: &str) {
        match &self.pb {
            Some(pb) => pb.finish_with_message(format!("{} {}", "✓".green(), message)),
            None => super::success(message),
        }
    }

    pub fn fail(&self, message: &str) {
        match &self.pb {
            Some(pb) => pb.finish_with_message(format!("{} {}", "✗".red(), message)),
            None => super::error(message),
        }
    }
}
