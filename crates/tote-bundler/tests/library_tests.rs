//! Link-library builds and linking against them.

mod helpers;

use std::fs::OpenOptions;
use std::io::Write;

use helpers::{TestProject, assert_contains, assert_not_contains};
use serde_json::json;
use tote_bundler::{Error, ExternalSlot, LinkManifest, ResolvedTarget};

const REACT_SOURCE: &str = "module.exports = { createElement: function createElementImpl() {} };\n";

fn library_project() -> TestProject {
    let project = TestProject::new();
    project.write("node_modules/react/index.js", REACT_SOURCE);
    project
}

async fn build_react_library(project: &TestProject) -> LinkManifest {
    let report = project
        .bundler(json!({
            "entry": { "react": "react" },
            "outputDir": "lib"
        }))
        .build_library()
        .await
        .unwrap();
    assert_eq!(report.libraries.len(), 1);
    report.libraries[0].manifest.clone()
}

#[tokio::test(flavor = "multi_thread")]
async fn library_build_writes_a_verifiable_manifest() {
    let project = library_project();
    let manifest = build_react_library(&project).await;

    assert_eq!(manifest.library_name, "react");
    assert!(manifest.global_binding_name.starts_with("react_dll_"));
    assert_eq!(manifest.artifact.to_string_lossy(), "react.js");
    assert_eq!(manifest.bindings["react"], "node_modules/react/index.js");

    let on_disk: LinkManifest =
        serde_json::from_str(&project.read("lib/react.manifest.json")).unwrap();
    assert_eq!(on_disk, manifest);

    let artifact = std::fs::read(project.path("lib/react.js")).unwrap();
    assert_eq!(manifest.content_hash, blake3::hash(&artifact).to_hex().to_string());

    let js = project.read("lib/react.js");
    assert_contains(&js, &format!("tote.expose(\"{}\"", manifest.global_binding_name));
    assert_not_contains(&js, "tote.run(");
}

#[tokio::test(flavor = "multi_thread")]
async fn linked_library_is_referenced_not_bundled() {
    let project = library_project();
    let manifest = build_react_library(&project).await;
    project.write("src/index.js", "var React = require('react');\nmodule.exports = React;\n");

    let bundler = project.bundler(json!({
        "entry": { "main": "./src/index.js" },
        "externals": [{ "libraryName": "react", "manifestPath": "lib/react.manifest.json" }]
    }));

    let graph = bundler.graph().await.unwrap();
    assert_eq!(graph.len(), 1);
    let record = graph.modules().next().unwrap();
    match &record.dependencies()[0].target {
        ResolvedTarget::External(ExternalSlot {
            library_name,
            global_binding_name,
            ..
        }) => {
            assert_eq!(library_name, "react");
            assert_eq!(global_binding_name, &manifest.global_binding_name);
        }
        other => panic!("expected external slot, got {other:?}"),
    }

    bundler.build().await.unwrap();
    let main = project.read("dist/main.js");
    assert_contains(
        &main,
        &format!(
            "globalThis[\"{}\"](\"node_modules/react/index.js\")",
            manifest.global_binding_name
        ),
    );
    assert_not_contains(&main, "createElementImpl");
}

#[tokio::test(flavor = "multi_thread")]
async fn drifted_artifact_fails_before_resolution() {
    let project = library_project();
    build_react_library(&project).await;
    project.write("src/index.js", "require('./missing');\nrequire('react');\n");

    let mut artifact = OpenOptions::new()
        .append(true)
        .open(project.path("lib/react.js"))
        .unwrap();
    artifact.write_all(b"\n// patched\n").unwrap();

    let failure = project
        .bundler(json!({
            "entry": { "main": "./src/index.js" },
            "externals": [{ "libraryName": "react", "manifestPath": "lib/react.manifest.json" }]
        }))
        .build()
        .await
        .unwrap_err();

    // Only the mismatch: resolving './missing' never started.
    assert_eq!(failure.errors.len(), 1);
    assert!(matches!(failure.errors[0], Error::ManifestMismatch { .. }));
    assert!(!project.exists("dist/main.js"));
}

#[tokio::test(flavor = "multi_thread")]
async fn plain_globals_read_the_binding() {
    let project = TestProject::new();
    project.write("a.js", "var Vue = require('vue');\n");

    project
        .bundler(json!({
            "entry": { "main": "./a.js" },
            "externals": [{ "libraryName": "vue", "globalBindingName": "Vue" }]
        }))
        .build()
        .await
        .unwrap();

    assert_contains(
        &project.read("dist/main.js"),
        "\"vue\": function () { return globalThis[\"Vue\"]; }",
    );
}
