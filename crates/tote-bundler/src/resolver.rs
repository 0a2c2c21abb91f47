//! Specifier → module resolution.
//!
//! Order of precedence for a specifier:
//!
//! 1. a linked external library binding or a plain global external, which
//!    short-circuits everything else (the specifier is never read from disk)
//! 2. relative and absolute paths, against the importer's directory
//! 3. `resolve.alias` prefixes, then the `resolve.modules` directories
//!
//! File candidates are probed as-is, then with each configured extension,
//! then as a directory containing an `index` file. Results are memoized per
//! `(specifier, importer)`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use tote_config::{BuildConfig, ResolveConfig};
use tote_graph::{ExternalSlot, ModuleId, ResolvedTarget, Runtime};
use tracing::trace;

use crate::link::ExternalLinkResolver;
use crate::{Error, Result};

type MemoKey = (String, Option<ModuleId>);

/// Maps import specifiers to module ids or external slots.
///
/// Safe to share across tasks; the memo is a concurrent map.
#[derive(Debug)]
pub struct ModuleResolver {
    runtime: Arc<dyn Runtime>,
    root: PathBuf,
    options: ResolveConfig,
    links: Arc<ExternalLinkResolver>,
    globals: FxHashMap<String, ExternalSlot>,
    memo: DashMap<MemoKey, ResolvedTarget>,
}

impl ModuleResolver {
    /// Create a resolver.
    ///
    /// # Arguments
    ///
    /// * `runtime` - Filesystem seam used to probe candidate files
    /// * `root` - Project root; entries and `resolve.modules` are relative to it
    /// * `options` - Extensions, aliases and module directories
    /// * `links` - Loaded link manifests, consulted before the filesystem
    pub fn new(
        runtime: Arc<dyn Runtime>,
        root: impl Into<PathBuf>,
        options: ResolveConfig,
        links: Arc<ExternalLinkResolver>,
    ) -> Self {
        Self {
            runtime,
            root: root.into(),
            options,
            links,
            globals: FxHashMap::default(),
            memo: DashMap::new(),
        }
    }

    /// Resolver configured from a build config: resolve options plus every
    /// plain global external (those without a manifest).
    pub fn from_config(
        runtime: Arc<dyn Runtime>,
        root: impl Into<PathBuf>,
        config: &BuildConfig,
        links: Arc<ExternalLinkResolver>,
    ) -> Self {
        let mut resolver = Self::new(runtime, root, config.resolve.clone(), links);
        for external in config.externals.iter().filter(|e| e.manifest_path.is_none()) {
            if let Some(binding) = &external.global_binding_name {
                resolver = resolver.with_global(&external.library_name, binding);
            }
        }
        resolver
    }

    /// Treat `specifier` as a plain global provided by the page.
    pub fn with_global(mut self, specifier: &str, binding: &str) -> Self {
        self.globals
            .insert(specifier.to_string(), ExternalSlot::global(specifier, binding));
        self
    }

    /// Project root ids are reported relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `specifier` as imported by `importer`; entries pass `None` and
    /// resolve against the root.
    pub fn resolve(&self, specifier: &str, importer: Option<&ModuleId>) -> Result<ResolvedTarget> {
        let key = (specifier.to_string(), importer.cloned());
        if let Some(hit) = self.memo.get(&key) {
            return Ok(hit.clone());
        }

        let target = self.resolve_uncached(specifier, importer)?;
        trace!(specifier, target = ?target, "resolved");
        self.memo.insert(key, target.clone());
        Ok(target)
    }

    fn resolve_uncached(&self, specifier: &str, importer: Option<&ModuleId>) -> Result<ResolvedTarget> {
        if specifier.trim().is_empty() {
            return Err(Error::resolution(specifier, importer, "empty specifier"));
        }

        if let Some(slot) = self.links.is_linked(specifier) {
            return Ok(ResolvedTarget::External(slot));
        }
        if let Some(slot) = self.globals.get(specifier) {
            return Ok(ResolvedTarget::External(slot.clone()));
        }

        let (path_part, query) = match specifier.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (specifier, None),
        };

        let candidates = self.candidates(path_part, importer);
        if candidates.is_empty() {
            return Err(Error::resolution(
                specifier,
                importer,
                "bare specifier matches no alias or module directory",
            ));
        }

        let found = candidates
            .iter()
            .find_map(|base| self.probe(base))
            .ok_or_else(|| {
                Error::resolution(
                    specifier,
                    importer,
                    format!(
                        "no file matched (tried {})",
                        candidates
                            .iter()
                            .map(|c| c.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                )
            })?;

        let id = ModuleId::new(&found).map_err(|e| Error::resolution(specifier, importer, e.to_string()))?;
        Ok(ResolvedTarget::Module(match query {
            Some(query) => id.with_query(query),
            None => id,
        }))
    }

    /// Base paths to probe, most specific first.
    fn candidates(&self, specifier: &str, importer: Option<&ModuleId>) -> Vec<PathBuf> {
        if is_path_like(specifier) {
            let base = importer.map_or(self.root.as_path(), ModuleId::dir);
            return vec![base.join(specifier).clean()];
        }

        if let Some(target) = self.alias_target(specifier) {
            return vec![target];
        }

        self.options
            .modules
            .iter()
            .map(|dir| self.root.join(dir).join(specifier).clean())
            .collect()
    }

    fn alias_target(&self, specifier: &str) -> Option<PathBuf> {
        self.options.alias.iter().find_map(|(prefix, replacement)| {
            let rest = if specifier == prefix {
                ""
            } else {
                specifier.strip_prefix(prefix.as_str())?.strip_prefix('/')?
            };
            let base = self.root.join(replacement);
            let target = if rest.is_empty() { base } else { base.join(rest) };
            Some(target.clean())
        })
    }

    fn probe(&self, base: &Path) -> Option<PathBuf> {
        if self.runtime.is_file(base) {
            return Some(base.to_path_buf());
        }
        if let Some(found) = self.probe_extensions(base) {
            return Some(found);
        }
        if self.runtime.is_dir(base) {
            return self.probe_extensions(&base.join("index"));
        }
        None
    }

    fn probe_extensions(&self, base: &Path) -> Option<PathBuf> {
        self.options.extensions.iter().find_map(|ext| {
            let mut candidate = base.as_os_str().to_owned();
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            self.runtime.is_file(&candidate).then_some(candidate)
        })
    }
}

fn is_path_like(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tote_graph::runtime::test_utils::MemoryRuntime;

    fn resolver(runtime: MemoryRuntime) -> ModuleResolver {
        ModuleResolver::new(
            Arc::new(runtime),
            "/project",
            ResolveConfig::default(),
            Arc::new(ExternalLinkResolver::default()),
        )
    }

    fn module(target: ResolvedTarget) -> PathBuf {
        target.as_module().unwrap().as_path().to_path_buf()
    }

    #[test]
    fn resolves_relative_paths_with_extension_probing() {
        let runtime = MemoryRuntime::new("/project");
        runtime
            .add_file("src/a.js", "")
            .add_file("src/b.ts", "")
            .add_file("src/lib/index.js", "");
        let resolver = resolver(runtime);
        let importer = ModuleId::new("/project/src/a.js").unwrap();

        assert_eq!(module(resolver.resolve("./src/a.js", None).unwrap()), PathBuf::from("/project/src/a.js"));
        assert_eq!(module(resolver.resolve("./b", Some(&importer)).unwrap()), PathBuf::from("/project/src/b.ts"));
        assert_eq!(
            module(resolver.resolve("./lib", Some(&importer)).unwrap()),
            PathBuf::from("/project/src/lib/index.js")
        );
        assert_eq!(
            module(resolver.resolve("../src/./b", Some(&importer)).unwrap()),
            PathBuf::from("/project/src/b.ts")
        );
    }

    #[test]
    fn different_specifiers_collapse_to_one_id() {
        let runtime = MemoryRuntime::new("/project");
        runtime.add_file("src/a.js", "").add_file("src/b.js", "");
        let resolver = resolver(runtime);
        let importer = ModuleId::new("/project/src/a.js").unwrap();

        let one = resolver.resolve("./b", Some(&importer)).unwrap();
        let two = resolver.resolve("../src/b.js", Some(&importer)).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn query_is_kept_on_the_id() {
        let runtime = MemoryRuntime::new("/project");
        runtime.add_file("s.css", "");
        let target = resolver(runtime).resolve("./s.css?inline", None).unwrap();
        assert_eq!(target.as_module().unwrap().query(), Some("inline"));
    }

    #[test]
    fn bare_specifiers_use_aliases_then_module_dirs() {
        let runtime = MemoryRuntime::new("/project");
        runtime
            .add_file("node_modules/left-pad/index.js", "")
            .add_file("src/components/button.js", "");
        let mut options = ResolveConfig::default();
        options.alias.insert("@ui".to_string(), PathBuf::from("src/components"));
        let resolver = ModuleResolver::new(
            Arc::new(runtime),
            "/project",
            options,
            Arc::new(ExternalLinkResolver::default()),
        );

        assert_eq!(
            module(resolver.resolve("left-pad", None).unwrap()),
            PathBuf::from("/project/node_modules/left-pad/index.js")
        );
        assert_eq!(
            module(resolver.resolve("@ui/button", None).unwrap()),
            PathBuf::from("/project/src/components/button.js")
        );
    }

    #[test]
    fn globals_short_circuit_the_filesystem() {
        let runtime = MemoryRuntime::new("/project");
        runtime.add_file("node_modules/vue/index.js", "");
        let resolver = resolver(runtime).with_global("vue", "Vue");

        let target = resolver.resolve("vue", None).unwrap();
        let slot = target.as_external().unwrap();
        assert_eq!(slot.global_binding_name, "Vue");
        assert!(!slot.is_linked());
    }

    #[test]
    fn missing_files_are_resolution_errors() {
        let resolver = resolver(MemoryRuntime::new("/project"));
        let importer = ModuleId::new("/project/a.js").unwrap();
        let err = resolver.resolve("./nope", Some(&importer)).unwrap_err();
        match err {
            Error::Resolution { specifier, importer: Some(from), .. } => {
                assert_eq!(specifier, "./nope");
                assert_eq!(from, importer);
            }
            other => panic!("expected resolution error, got {other:?}"),
        }
    }

    #[test]
    fn results_are_memoized() {
        let runtime = MemoryRuntime::new("/project");
        runtime.add_file("a.js", "");
        let resolver = resolver(runtime.clone());
        let first = resolver.resolve("./a", None).unwrap();

        // An exact match appearing later does not change an earlier answer.
        runtime.add_file("a", "");
        assert_eq!(resolver.resolve("./a", None).unwrap(), first);
        assert_eq!(resolver.memo.len(), 1);
    }
}
