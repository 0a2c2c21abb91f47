use serde::{Deserialize, Serialize};

/// A dependency satisfied by a prebuilt library or a runtime global instead
/// of local source. External slots never get a `ModuleRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSlot {
    pub library_name: String,
    /// Name under which the prebuilt artifact registers itself at runtime.
    pub global_binding_name: String,
    /// Content hash recorded in the library manifest. `None` for plain globals.
    pub manifest_version_hash: Option<String>,
    /// Module id inside the library that the specifier maps to. `None` means
    /// the binding itself is the module value.
    pub request: Option<String>,
}

impl ExternalSlot {
    /// Slot backed by a link-library manifest entry.
    pub fn linked(
        library_name: impl Into<String>,
        global_binding_name: impl Into<String>,
        manifest_version_hash: impl Into<String>,
        request: impl Into<String>,
    ) -> Self {
        Self {
            library_name: library_name.into(),
            global_binding_name: global_binding_name.into(),
            manifest_version_hash: Some(manifest_version_hash.into()),
            request: Some(request.into()),
        }
    }

    /// Slot that reads a plain runtime global, e.g. `vue` → `Vue`.
    pub fn global(library_name: impl Into<String>, global_binding_name: impl Into<String>) -> Self {
        Self {
            library_name: library_name.into(),
            global_binding_name: global_binding_name.into(),
            manifest_version_hash: None,
            request: None,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.manifest_version_hash.is_some()
    }
}
