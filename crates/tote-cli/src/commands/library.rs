//! `tote library`.

use std::time::Instant;

use tote_bundler::Bundler;
use tote_config::validate_fs;

use crate::cli::LibraryArgs;
use crate::commands::utils::{load_config, plural};
use crate::error::Result;
use crate::ui;

/// Build every entry as a link library and write one manifest per entry.
pub async fn execute(args: LibraryArgs) -> Result<()> {
    let started = Instant::now();
    let cwd = std::env::current_dir()?;

    let mut config = load_config(&args.config, &[], &cwd)?;
    if let Some(out_dir) = &args.out_dir {
        config.output_dir = out_dir.clone();
    }
    validate_fs(&config, &cwd)?;

    let bundler = Bundler::new(config)?;
    let spinner = ui::Spinner::new("Building link libraries...");

    match bundler.build_library().await {
        Ok(report) => {
            spinner.finish(&format!(
                "Built {} in {}",
                plural(report.libraries.len(), "library", "libraries"),
                ui::format_duration(started.elapsed())
            ));
            ui::print_library_summary(&report);
            Ok(())
        }
        Err(failure) => {
            spinner.fail("Library build failed");
            Err(failure.into())
        }
    }
}
