//! Emit stages.
//!
//! A stage takes the artifacts produced so far for one chunk and returns the
//! new artifact list. Stages run in configuration order; an empty pipeline
//! writes the rendered chunk unchanged.

use std::fmt;
use std::io::Write as _;

use anyhow::{Context, anyhow};
use flate2::Compression;
use flate2::write::GzEncoder;
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;
use tote_config::{DEFAULT_COMPRESS_TEST, EmitStage, FilenameTemplate, TemplateValues};
use tote_graph::ContentType;
use tracing::{debug, warn};

use super::render::{ModuleSegment, Segment, concat, json};
use crate::chunk::Chunk;
use crate::Result;

/// One file produced for a chunk, before it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Path relative to the output directory.
    pub filename: String,
    pub content_type: ContentType,
    pub body: ArtifactBody,
    pub compressed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactBody {
    Segments(Vec<Segment>),
    Bytes(Vec<u8>),
}

impl Artifact {
    pub fn rendered(filename: impl Into<String>, content_type: ContentType, segments: Vec<Segment>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            body: ArtifactBody::Segments(segments),
            compressed: false,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.body {
            ArtifactBody::Segments(segments) => concat(segments).into_bytes(),
            ArtifactBody::Bytes(bytes) => bytes.clone(),
        }
    }
}

/// Chunk metadata visible to stages.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub chunk: &'a Chunk,
    pub build_hash: &'a str,
}

impl StageContext<'_> {
    fn values<'v>(&'v self, content_hash: &'v str) -> TemplateValues<'v> {
        TemplateValues {
            name: &self.chunk.name,
            hash: self.build_hash,
            content_hash,
        }
    }
}

pub trait Stage: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn apply(&self, artifacts: Vec<Artifact>, cx: &StageContext<'_>) -> anyhow::Result<Vec<Artifact>>;
}

/// Build the stage for one configuration entry.
pub fn compile(stage: &EmitStage) -> Result<Box<dyn Stage>> {
    Ok(match stage {
        EmitStage::Minify => Box::new(Minify),
        EmitStage::ExtractByType { content_type, filename } => Box::new(ExtractByType {
            content_type: *content_type,
            filename: match filename {
                Some(template) => template.clone(),
                None => FilenameTemplate::parse(&format!("[name].{}", content_type.output_extension()))?,
            },
        }),
        EmitStage::Compress { threshold, test } => {
            let pattern = test.as_deref().unwrap_or(DEFAULT_COMPRESS_TEST);
            let test = Regex::new(pattern).map_err(|e| tote_config::ConfigError::InvalidPattern {
                field: "emitStages.compress.test".to_string(),
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            Box::new(Compress {
                threshold: *threshold,
                test,
            })
        }
    })
}

/// Minifies every module body according to its content type.
#[derive(Debug)]
pub struct Minify;

impl Stage for Minify {
    fn name(&self) -> &str {
        "minify"
    }

    fn apply(&self, mut artifacts: Vec<Artifact>, _cx: &StageContext<'_>) -> anyhow::Result<Vec<Artifact>> {
        for artifact in &mut artifacts {
            let ArtifactBody::Segments(segments) = &mut artifact.body else {
                continue;
            };
            for segment in segments.iter_mut() {
                let Segment::Module(module) = segment else {
                    continue;
                };
                module.body = match module.content_type {
                    ContentType::Script => minify_script(&module.body),
                    ContentType::Stylesheet => minify_css(&module.body),
                    ContentType::Json => minify_json(&module.body),
                    ContentType::Asset => continue,
                }
                .with_context(|| format!("cannot minify {}", module.id))?;
            }
        }
        Ok(artifacts)
    }
}

fn minify_script(source: &str) -> anyhow::Result<String> {
    if source.trim().is_empty() {
        return Ok(String::new());
    }
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if let Some(error) = parsed.errors.first() {
        return Err(anyhow!("{error}"));
    }
    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).minify(&allocator, &mut program);
    Ok(Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code)
}

fn minify_css(source: &str) -> anyhow::Result<String> {
    let mut sheet = StyleSheet::parse(source, ParserOptions::default()).map_err(|e| anyhow!("{e}"))?;
    sheet.minify(MinifyOptions::default()).map_err(|e| anyhow!("{e}"))?;
    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| anyhow!("{e}"))?;
    Ok(printed.code)
}

fn minify_json(source: &str) -> anyhow::Result<String> {
    let value: serde_json::Value = serde_json::from_str(source)?;
    Ok(value.to_string())
}

/// Moves module bodies of one content type into a sibling file.
///
/// Extracted modules stay in the primary artifact as empty factories so
/// `require` of them still succeeds; the primary loads the sibling through
/// `tote.stylesheet` before its modules are defined.
#[derive(Debug)]
pub struct ExtractByType {
    content_type: ContentType,
    filename: FilenameTemplate,
}

impl Stage for ExtractByType {
    fn name(&self) -> &str {
        "extractByType"
    }

    fn apply(&self, artifacts: Vec<Artifact>, cx: &StageContext<'_>) -> anyhow::Result<Vec<Artifact>> {
        let mut out = Vec::with_capacity(artifacts.len() + 1);

        for mut artifact in artifacts {
            if artifact.content_type != ContentType::Script {
                out.push(artifact);
                continue;
            }
            let ArtifactBody::Segments(segments) = &mut artifact.body else {
                out.push(artifact);
                continue;
            };

            let mut extracted = String::new();
            for segment in segments.iter_mut() {
                let Segment::Module(module) = segment else {
                    continue;
                };
                if module.content_type != self.content_type {
                    continue;
                }
                extracted.push_str(&format!("/* {} */\n", module.id));
                extracted.push_str(&module.body);
                if !module.body.ends_with('\n') {
                    extracted.push('\n');
                }
                *module = ModuleSegment {
                    id: std::mem::take(&mut module.id),
                    content_type: ContentType::Script,
                    body: String::new(),
                    deps: std::mem::take(&mut module.deps),
                };
            }

            if extracted.is_empty() {
                out.push(artifact);
                continue;
            }

            let content_hash = blake3::hash(extracted.as_bytes()).to_hex().to_string();
            let filename = self.filename.render(&cx.values(&content_hash));
            if filename == artifact.filename {
                return Err(anyhow!("extracted file would overwrite '{filename}'"));
            }

            // After the runtime prelude, ahead of `tote.define`.
            let at = segments
                .iter()
                .position(|segment| matches!(segment, Segment::Text(text) if text.starts_with("tote.define(")))
                .unwrap_or(0);
            segments.insert(at, Segment::Text(format!("tote.stylesheet({});\n", json(&filename))));

            debug!(chunk = %cx.chunk.name, file = %filename, "extracted {}", self.content_type);
            out.push(artifact);
            out.push(Artifact {
                filename,
                content_type: self.content_type,
                body: ArtifactBody::Bytes(extracted.into_bytes()),
                compressed: false,
            });
        }

        Ok(out)
    }
}

/// Adds a gzip sibling for every large enough artifact.
#[derive(Debug)]
pub struct Compress {
    threshold: u64,
    test: Regex,
}

impl Stage for Compress {
    fn name(&self) -> &str {
        "compress"
    }

    fn apply(&self, artifacts: Vec<Artifact>, cx: &StageContext<'_>) -> anyhow::Result<Vec<Artifact>> {
        let mut out = Vec::with_capacity(artifacts.len() * 2);
        for artifact in artifacts {
            let compressible = !artifact.compressed && self.test.is_match(&artifact.filename);
            let bytes = artifact.to_bytes();
            let size = bytes.len() as u64;

            let sibling = if compressible && size >= self.threshold {
                let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
                encoder.write_all(&bytes)?;
                Some(Artifact {
                    filename: format!("{}.gz", artifact.filename),
                    content_type: artifact.content_type,
                    body: ArtifactBody::Bytes(encoder.finish()?),
                    compressed: true,
                })
            } else {
                if compressible {
                    warn!(
                        chunk = %cx.chunk.name,
                        file = %artifact.filename,
                        size,
                        threshold = self.threshold,
                        "skipping compression below threshold"
                    );
                }
                None
            };

            out.push(artifact);
            out.extend(sibling);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKind;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn chunk() -> Chunk {
        Chunk::new("main", ChunkKind::Entry)
    }

    fn module(id: &str, content_type: ContentType, body: &str) -> Segment {
        Segment::Module(ModuleSegment {
            id: id.to_string(),
            content_type,
            body: body.to_string(),
            deps: "{}".to_string(),
        })
    }

    fn primary(segments: Vec<Segment>) -> Vec<Artifact> {
        vec![Artifact::rendered("main.js", ContentType::Script, segments)]
    }

    fn run(stage: &EmitStage, artifacts: Vec<Artifact>) -> anyhow::Result<Vec<Artifact>> {
        let chunk = chunk();
        let cx = StageContext {
            chunk: &chunk,
            build_hash: "0123456789abcdef0123456789abcdef",
        };
        compile(stage).unwrap().apply(artifacts, &cx)
    }

    #[test]
    fn compress_respects_threshold_and_keeps_original() {
        let stage = EmitStage::Compress {
            threshold: 1024,
            test: None,
        };

        let small = primary(vec![Segment::Text("x".repeat(500))]);
        let out = run(&stage, small).unwrap();
        assert_eq!(out.len(), 1);

        let large = primary(vec![Segment::Text("x".repeat(2000))]);
        let out = run(&stage, large).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].filename, "main.js");
        assert_eq!(out[1].filename, "main.js.gz");
        assert!(out[1].compressed);

        let mut decoded = String::new();
        GzDecoder::new(&out[1].to_bytes()[..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, "x".repeat(2000));
    }

    #[test]
    fn compress_skips_names_not_matching_test() {
        let stage = EmitStage::Compress {
            threshold: 1,
            test: Some(r"\.css$".to_string()),
        };
        let out = run(&stage, primary(vec![Segment::Text("x".repeat(100))])).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn extract_moves_stylesheets_to_sibling() {
        let stage = EmitStage::ExtractByType {
            content_type: ContentType::Stylesheet,
            filename: None,
        };
        let segments = vec![
            Segment::Text("prelude\n".to_string()),
            Segment::Text("tote.define(\"main\", {\n".to_string()),
            module("a.css", ContentType::Stylesheet, "a{color:red}"),
            module("a.js", ContentType::Script, "require('./a.css');"),
            Segment::Text("});\n".to_string()),
        ];

        let out = run(&stage, primary(segments)).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].filename, "main.css");
        assert_eq!(out[1].to_bytes(), b"/* a.css */\na{color:red}\n");

        let js = String::from_utf8(out[0].to_bytes()).unwrap();
        assert!(js.contains("prelude\ntote.stylesheet(\"main.css\");\ntote.define("));
        assert!(!js.contains("color:red"));
        assert!(js.contains("\"a.css\": [function (module, exports, require) {\n\n}, {}],"));
    }

    #[test]
    fn extract_without_matches_is_a_no_op() {
        let stage = EmitStage::ExtractByType {
            content_type: ContentType::Stylesheet,
            filename: None,
        };
        let input = primary(vec![module("a.js", ContentType::Script, "1;")]);
        assert_eq!(run(&stage, input.clone()).unwrap(), input);
    }

    #[test]
    fn minify_shrinks_each_module_body() {
        let segments = vec![
            module("a.js", ContentType::Script, "var answer = 40 + 2;\nmodule.exports = answer;\n"),
            module("a.css", ContentType::Stylesheet, "a {\n  color: red;\n}\n"),
            module("a.json", ContentType::Json, "{ \"a\" : 1 }"),
        ];
        let out = run(&EmitStage::Minify, primary(segments)).unwrap();
        let ArtifactBody::Segments(segments) = &out[0].body else {
            panic!("minify must keep segments");
        };
        let bodies: Vec<&str> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Module(m) => Some(m.body.as_str()),
                Segment::Text(_) => None,
            })
            .collect();
        assert!(bodies[0].len() < "var answer = 40 + 2;\nmodule.exports = answer;\n".len());
        assert!(!bodies[0].trim_end().contains('\n'), "{}", bodies[0]);
        assert_eq!(bodies[1], "a{color:red}");
        assert_eq!(bodies[2], "{\"a\":1}");
    }

    #[test]
    fn minify_reports_the_failing_module() {
        let err = run(
            &EmitStage::Minify,
            primary(vec![module("broken.js", ContentType::Script, "function (")]),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("broken.js"));
    }
}
