//! Shared test utilities for tote-bundler integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;
use tote_bundler::{BuildConfig, Bundler};

/// A throwaway project directory.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) -> &Self {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, content).expect("write fixture");
        self
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative))
            .unwrap_or_else(|e| panic!("read {relative}: {e}"))
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// Config from JSON with `root` pointing at this project.
    pub fn config(&self, mut value: Value) -> BuildConfig {
        value["root"] = Value::from(self.root().to_string_lossy().into_owned());
        BuildConfig::from_value(value).expect("valid test config")
    }

    pub fn bundler(&self, value: Value) -> Bundler {
        Bundler::new(self.config(value)).expect("bundler")
    }
}

/// Assert that `haystack` contains `needle`, printing a preview otherwise.
pub fn assert_contains(haystack: &str, needle: &str) {
    assert!(
        haystack.contains(needle),
        "expected output to contain '{}'.\npreview (first 800 chars): {}",
        needle,
        &haystack[..haystack.len().min(800)]
    );
}

pub fn assert_not_contains(haystack: &str, needle: &str) {
    assert!(
        !haystack.contains(needle),
        "expected output NOT to contain '{needle}'"
    );
}
