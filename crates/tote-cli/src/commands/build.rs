//! `tote build`.

use std::time::Instant;

use tote_bundler::Bundler;
use tote_config::{BuildConfig, EmitStage, validate_fs};

use crate::cli::BuildArgs;
use crate::commands::utils::{load_config, plural};
use crate::error::Result;
use crate::ui;

/// Execute the build command.
///
/// 1. Load configuration (CLI > env > file > defaults)
/// 2. Validate it, including that entry files and manifests exist
/// 3. Build, then print the file table
///
/// Any build error fails the command; all of them are reported.
pub async fn execute(args: BuildArgs) -> Result<()> {
    let started = Instant::now();
    let cwd = std::env::current_dir()?;

    let mut config = load_config(&args.config, &args.entry, &cwd)?;
    apply_overrides(&mut config, &args);
    validate_fs(&config, &cwd)?;

    let entries = config.entry.len();
    let bundler = Bundler::new(config)?;
    let spinner = ui::Spinner::new(&format!("Building {}...", plural(entries, "entry", "entries")));

    match bundler.build().await {
        Ok(report) => {
            spinner.finish(&format!(
                "Built {} in {}",
                plural(report.chunks.len(), "chunk", "chunks"),
                ui::format_duration(started.elapsed())
            ));
            ui::print_build_summary(&report);
            Ok(())
        }
        Err(failure) => {
            spinner.fail("Build failed");
            Err(failure.into())
        }
    }
}

/// Apply command-line flags on top of the loaded configuration.
pub fn apply_overrides(config: &mut BuildConfig, args: &BuildArgs) {
    if let Some(out_dir) = &args.out_dir {
        config.output_dir = out_dir.clone();
    }
    if let Some(workers) = args.workers {
        config.worker_count = Some(workers as usize);
    }
    if args.clean {
        config.clean = true;
    }
    // Minify runs before extraction and compression.
    if args.minify && !config.emit_stages.contains(&EmitStage::Minify) {
        config.emit_stages.insert(0, EmitStage::Minify);
    }
}
