//! Formatting utilities for sizes, durations and build summaries.

use console::Term;
use owo_colors::OwoColorize;
use std::time::Duration;
use tote_bundler::{BuildReport, LibraryReport, OutputFile};

use super::{colors_enabled, is_quiet};

/// Format a byte count with the largest fitting unit.
///
/// ```
/// use tote_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(1024), "1.00 KB");
/// assert_eq!(format_size(1_048_576), "1.00 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;
    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// ```
/// use std::time::Duration;
/// use tote_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// One `(file, chunk, size)` row per written file, in report order.
/// Compressed siblings are marked.
pub fn summary_rows(files: &[OutputFile]) -> Vec<(String, String, String)> {
    files
        .iter()
        .map(|file| {
            let mut size = format_size(file.size);
            if file.compressed {
                size.push_str(" (gzip)");
            }
            (file.path.display().to_string(), file.chunk.clone(), size)
        })
        .collect()
}

fn print_table(files: &[OutputFile]) {
    let rows = summary_rows(files);
    let path_width = rows.iter().map(|(path, _, _)| path.len()).max().unwrap_or(0);
    let chunk_width = rows.iter().map(|(_, chunk, _)| chunk.len()).max().unwrap_or(0);

    for (path, chunk, size) in rows {
        if colors_enabled() {
            eprintln!(
                "  {} {:path_width$}  {:chunk_width$}  {}",
                "▸".blue(),
                path.bright_white().bold(),
                chunk.dimmed(),
                size.dimmed()
            );
        } else {
            eprintln!("  ▸ {path:path_width$}  {chunk:chunk_width$}  {size}");
        }
    }
}

fn rule() -> String {
    let width = Term::stderr().size().1 as usize;
    "─".repeat(width.clamp(20, 80))
}

/// Print the written files and totals to stderr.
pub fn print_build_summary(report: &BuildReport) {
    if is_quiet() {
        return;
    }

    let title = "Build Summary";
    if colors_enabled() {
        eprintln!("\n{}", title.bold().underline());
    } else {
        eprintln!("\n{title}");
    }
    eprintln!("{}", rule());
    print_table(&report.files);
    eprintln!("{}", rule());

    let total = format_size(report.total_size());
    let duration = format_duration(report.duration);
    let counts = format!("{} module(s), {} chunk(s)", report.modules, report.chunks.len());
    if colors_enabled() {
        eprintln!("  {} {} in {} ({})", "Total:".bold(), total.green(), duration.green(), counts);
    } else {
        eprintln!("  Total: {total} in {duration} ({counts})");
    }
}

/// Print each library's artifact, binding and manifest to stderr.
pub fn print_library_summary(report: &LibraryReport) {
    if is_quiet() {
        return;
    }

    eprintln!();
    print_table(&report.files);
    for library in &report.libraries {
        let manifest = &library.manifest;
        let line = format!(
            "{} -> {} ({} binding(s), manifest {})",
            manifest.library_name,
            manifest.global_binding_name,
            manifest.bindings.len(),
            library.manifest_path.display()
        );
        if colors_enabled() {
            eprintln!("  {} {}", "◆".cyan(), line);
        } else {
            eprintln!("  ◆ {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tote_bundler::ContentType;

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(1), "1 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(2_147_483_648), "2.00 GB");
    }

    #[test]
    fn format_duration_units() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn summary_rows_mark_compressed_files() {
        let files = vec![
            OutputFile {
                path: PathBuf::from("main.js"),
                size: 2048,
                chunk: "main".to_string(),
                content_type: ContentType::Script,
                compressed: false,
            },
            OutputFile {
                path: PathBuf::from("main.js.gz"),
                size: 300,
                chunk: "main".to_string(),
                content_type: ContentType::Script,
                compressed: true,
            },
        ];
        let rows = summary_rows(&files);
        assert_eq!(
            rows[0],
            ("main.js".to_string(), "main".to_string(), "2.00 KB".to_string())
        );
        assert_eq!(rows[1].2, "300 B (gzip)");
    }
}
