//! Dependency scanning.
//!
//! Specifiers are found with regular expressions over the transformed
//! source rather than a full parse: transforms are opaque and may emit
//! code in any dialect, and a scan only needs the string literal each
//! import form points at.
//!
//! Scripts are wrapped in CommonJS factories, so only `require()` and
//! dynamic `import()` count as dependencies. Static `import`/`export`
//! statements are reported by [`find_module_syntax`] instead.

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;
use tote_graph::ContentType;

static SCRIPT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"\brequire\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
        r#"\bimport\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

static STYLESHEET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r#"@import\s+(?:url\(\s*)?["']([^"'\n]+)["']"#]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

// Statement-position `import x`, `import {`, `import '...'`, `export default`,
// `export {`. Leaves `import(`, `import.meta` and `exports.x` alone.
static MODULE_SYNTAX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*(?:import(?:[ \t]+[\w$*{"']|[ \t]*[*{"'])|export(?:[ \t]+[\w$*{]|[ \t]*[*{]))"#).ok()
});

/// First line of `source` holding a static `import` or `export` statement,
/// as a 1-based line number and the trimmed line.
pub fn find_module_syntax(source: &str) -> Option<(usize, &str)> {
    let found = MODULE_SYNTAX.as_ref()?.find(source)?;
    let line_start = source[..found.start()].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[found.start()..]
        .find('\n')
        .map_or(source.len(), |i| found.start() + i);
    let line = source[..found.start()].matches('\n').count() + 1;
    Some((line, source[line_start..line_end].trim()))
}

/// Import specifiers in `source`, in order of first appearance.
///
/// Remote URLs and data URIs in stylesheets are left to the browser.
pub fn scan_dependencies(source: &str, content_type: ContentType) -> Vec<String> {
    let patterns: &[Regex] = match content_type {
        ContentType::Script => &SCRIPT_PATTERNS,
        ContentType::Stylesheet => &STYLESHEET_PATTERNS,
        ContentType::Json | ContentType::Asset => return Vec::new(),
    };

    let mut found: Vec<(usize, &str)> = patterns
        .iter()
        .flat_map(|re| re.captures_iter(source))
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.start(), m.as_str()))
        .filter(|(_, specifier)| !is_remote(specifier))
        .collect();
    found.sort_by_key(|(position, _)| *position);

    let mut seen = FxHashSet::default();
    found
        .into_iter()
        .filter(|(_, specifier)| seen.insert(*specifier))
        .map(|(_, specifier)| specifier.to_string())
        .collect()
}

fn is_remote(specifier: &str) -> bool {
    specifier.starts_with("http://")
        || specifier.starts_with("https://")
        || specifier.starts_with("//")
        || specifier.starts_with("data:")
}
