//! Chunk rendering.
//!
//! A chunk renders to a list of [`Segment`]s: runtime text plus one factory
//! per module. Stages rewrite segments in place and only the writer flattens
//! them to bytes, so stages can address individual module bodies without
//! reparsing the artifact.

use std::fmt::Write as _;
use std::path::Path;

use tote_graph::{ContentType, ExternalSlot, ModuleGraph, ResolvedTarget};

use crate::chunk::Chunk;

/// Module runtime shared by every chunk of an application build. Installs
/// `globalThis.tote` once; later chunks reuse it.
const APP_PRELUDE_START: &str = "(function (g) {\nif (g.tote) return;\ng.tote = (";
const APP_PRELUDE_END: &str = ")(g);\n})(globalThis);\n";

const RUNTIME: &str = r#"function (g) {
var modules = {}, cache = {}, chunks = {}, waiting = [];
function load(id) {
if (cache[id]) return cache[id].exports;
var entry = modules[id];
if (!entry) throw new Error("tote: unknown module " + id);
var module = cache[id] = { exports: {} };
entry[0].call(module.exports, module, module.exports, function (request) {
var target = entry[1][request];
if (target === undefined) throw new Error("tote: cannot find '" + request + "' from " + id);
return typeof target === "function" ? target() : load(target);
});
return module.exports;
}
function flush() {
waiting = waiting.filter(function (job) {
for (var i = 0; i < job.requires.length; i++) if (!chunks[job.requires[i]]) return true;
for (var j = 0; j < job.entries.length; j++) load(job.entries[j]);
return false;
});
}
return {
define: function (name, factories) {
for (var id in factories) if (!modules[id]) modules[id] = factories[id];
chunks[name] = true;
flush();
},
run: function (name, requires, entries) {
waiting.push({ name: name, requires: requires, entries: entries });
flush();
},
style: function (css) {
if (g.document) {
var el = g.document.createElement("style");
el.textContent = css;
g.document.head.appendChild(el);
}
return css;
},
stylesheet: function (href) {
if (g.document) {
var link = g.document.createElement("link");
link.rel = "stylesheet";
link.href = href;
g.document.head.appendChild(link);
}
},
expose: function (binding, ids) {
g[binding] = function (id) {
if (ids.indexOf(id) < 0) throw new Error("tote: " + binding + " does not expose " + id);
return load(id);
};
}
};
}"#;

/// How the chunk's runtime is installed and what runs at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode<'a> {
    /// Shared global runtime; entry chunks run their entry modules once
    /// every required chunk is defined.
    App,
    /// Private runtime; the entry modules are exposed under `binding`.
    Library { binding: &'a str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Module(ModuleSegment),
}

/// One module factory. `body` is the module's final content before wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSegment {
    pub id: String,
    pub content_type: ContentType,
    pub body: String,
    /// Rendered specifier → target object literal.
    pub deps: String,
}

impl ModuleSegment {
    fn write_to(&self, out: &mut String) {
        let _ = write!(out, "{}: [function (module, exports, require) {{\n", json(&self.id));
        match self.content_type {
            ContentType::Script => out.push_str(&self.body),
            ContentType::Stylesheet => {
                let _ = write!(out, "tote.style({});", json(&self.body));
            }
            ContentType::Json => {
                let _ = write!(out, "module.exports = {};", self.body.trim());
            }
            ContentType::Asset => {
                let _ = write!(out, "module.exports = {};", json(&self.body));
            }
        }
        let _ = write!(out, "\n}}, {}],\n", self.deps);
    }
}

/// Flatten segments into the artifact text.
pub fn concat(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Module(module) => module.write_to(&mut out),
        }
    }
    out
}

pub struct ChunkRenderer<'a> {
    graph: &'a ModuleGraph,
    root: &'a Path,
}

impl<'a> ChunkRenderer<'a> {
    pub fn new(graph: &'a ModuleGraph, root: &'a Path) -> Self {
        Self { graph, root }
    }

    pub fn render(&self, chunk: &Chunk, mode: RenderMode<'_>) -> Vec<Segment> {
        let mut segments = Vec::with_capacity(chunk.len() + 3);

        match mode {
            RenderMode::App => {
                segments.push(Segment::Text(format!("{APP_PRELUDE_START}{RUNTIME}{APP_PRELUDE_END}")));
            }
            RenderMode::Library { .. } => {
                segments.push(Segment::Text(format!("(function (g) {{\nvar tote = ({RUNTIME})(g);\n")));
            }
        }
        segments.push(Segment::Text(format!("tote.define({}, {{\n", json(&chunk.name))));

        for id in &chunk.modules {
            let Some(record) = self.graph.get(id) else {
                continue;
            };
            let mut deps = String::from("{");
            for (index, dep) in record.dependencies().iter().enumerate() {
                if index > 0 {
                    deps.push_str(", ");
                }
                let _ = write!(deps, "{}: ", json(&dep.specifier));
                match &dep.target {
                    ResolvedTarget::Module(target) => deps.push_str(&json(&target.display_relative(self.root))),
                    ResolvedTarget::External(slot) => deps.push_str(&external_accessor(slot)),
                }
            }
            deps.push('}');

            segments.push(Segment::Module(ModuleSegment {
                id: id.display_relative(self.root),
                content_type: record.content_type(),
                body: String::from_utf8_lossy(record.content()).into_owned(),
                deps,
            }));
        }

        segments.push(Segment::Text("});\n".to_string()));

        let entries = json_array(chunk.entry_modules.iter().map(|id| id.display_relative(self.root)));
        match mode {
            RenderMode::App if chunk.is_entry() => {
                segments.push(Segment::Text(format!(
                    "tote.run({}, {}, {entries});\n",
                    json(&chunk.name),
                    json_array(chunk.requires.iter().cloned()),
                )));
            }
            RenderMode::App => {}
            RenderMode::Library { binding } => {
                segments.push(Segment::Text(format!(
                    "tote.expose({}, {entries});\n}})(globalThis);\n",
                    json(binding)
                )));
            }
        }

        segments
    }
}

fn external_accessor(slot: &ExternalSlot) -> String {
    match &slot.request {
        Some(request) => format!(
            "function () {{ return globalThis[{}]({}); }}",
            json(&slot.global_binding_name),
            json(request)
        ),
        None => format!("function () {{ return globalThis[{}]; }}", json(&slot.global_binding_name)),
    }
}

pub(crate) fn json(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn json_array(values: impl Iterator<Item = String>) -> String {
    serde_json::Value::from(values.collect::<Vec<_>>()).to_string()
}
