//! Built-in loaders available to config-file transform rules.

use anyhow::Context;
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use tote_graph::ContentType;

use super::{TransformContext, TransformOutput};

/// Parse the stylesheet and print it back in normalized form.
///
/// Malformed CSS is an error rather than passed through.
pub fn css_loader(cx: &TransformContext<'_>, content: Vec<u8>) -> anyhow::Result<TransformOutput> {
    let source = String::from_utf8(content).context("stylesheet is not valid UTF-8")?;
    let filename = cx.id.path_string().into_owned();
    let stylesheet = StyleSheet::parse(
        &source,
        ParserOptions {
            filename: filename.clone(),
            ..Default::default()
        },
    )
    .map_err(|e| anyhow::anyhow!("failed to parse CSS from {filename}: {e}"))?;

    let printed = stylesheet
        .to_css(PrinterOptions::default())
        .map_err(|e| anyhow::anyhow!("failed to print CSS from {filename}: {e}"))?;

    Ok(TransformOutput::new(printed.code.into_bytes()).with_content_type(ContentType::Stylesheet))
}

/// Validate JSON; the module exports the parsed value.
pub fn json_loader(_cx: &TransformContext<'_>, content: Vec<u8>) -> anyhow::Result<TransformOutput> {
    let value: serde_json::Value = serde_json::from_slice(&content).context("invalid JSON")?;
    let normalized = serde_json::to_vec(&value)?;
    Ok(TransformOutput::new(normalized).with_content_type(ContentType::Json))
}

/// Export the file's text as a string.
pub fn text_loader(_cx: &TransformContext<'_>, content: Vec<u8>) -> anyhow::Result<TransformOutput> {
    let text = String::from_utf8_lossy(&content);
    let literal = serde_json::to_vec(&text)?;
    Ok(TransformOutput::new(literal).with_content_type(ContentType::Json))
}
