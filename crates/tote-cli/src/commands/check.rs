//! `tote check`.
//!
//! Validates configuration without writing output.

use tote_bundler::Bundler;
use tote_config::validate_fs;

use crate::cli::CheckArgs;
use crate::commands::utils::{load_config, plural};
use crate::error::Result;
use crate::ui;

/// Execute the check command.
///
/// With `--graph` the module graph is also built, so unresolvable
/// specifiers and failing transforms are reported too, and import cycles
/// are listed as warnings.
pub async fn execute(args: CheckArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = load_config(&args.config, &[], &cwd)?;
    validate_fs(&config, &cwd)?;

    ui::success("Configuration is valid");
    for (name, value) in &config.entry {
        ui::info(&format!("  {} -> {}", name, value.specifiers().join(", ")));
    }
    if !config.externals.is_empty() {
        ui::info(&plural(config.externals.len(), "external", "externals"));
    }
    if !config.emit_stages.is_empty() {
        let stages: Vec<&str> = config.emit_stages.iter().map(|s| s.name()).collect();
        ui::info(&format!("Emit stages: {}", stages.join(" -> ")));
    }

    if args.graph {
        let bundler = Bundler::new(config)?;
        let spinner = ui::Spinner::new("Resolving module graph...");
        match bundler.graph().await {
            Ok(graph) => {
                spinner.finish(&format!(
                    "Resolved {}",
                    plural(graph.len(), "module", "modules")
                ));
                for cycle in graph.cycles() {
                    let path: Vec<String> =
                        cycle.iter().map(|id| id.display_relative(bundler.root())).collect();
                    ui::warning(&format!("Import cycle: {}", path.join(" -> ")));
                }
            }
            Err(error) => {
                spinner.fail("Module graph has errors");
                return Err(error.into());
            }
        }
    }

    Ok(())
}
