use std::fs;

use serde_json::json;
use tempfile::TempDir;
use tote_config::{
    BuildConfig, ConfigError, ConfigValidator, EmitStage, ExternalConfig, FsValidator, GroupingRule,
    SchemaValidator,
};
use tote_graph::ContentType;

fn config(value: serde_json::Value) -> BuildConfig {
    BuildConfig::from_value(value).unwrap()
}

#[test]
fn requires_entries() {
    let err = SchemaValidator.validate(&BuildConfig::default()).unwrap_err();
    assert!(matches!(err, ConfigError::NoEntries));
}

#[test]
fn rejects_empty_entry_lists() {
    let config = config(json!({ "entry": { "vendor": [] } }));
    assert!(matches!(
        SchemaValidator.validate(&config),
        Err(ConfigError::EmptyEntry(name)) if name == "vendor"
    ));
}

#[test]
fn rejects_bad_transform_pattern() {
    let config = config(json!({
        "entry": { "main": "./a.js" },
        "transforms": [{ "test": "(\\.css$", "loader": "css" }]
    }));
    assert!(matches!(
        SchemaValidator.validate(&config),
        Err(ConfigError::InvalidPattern { field, .. }) if field == "transforms[0].test"
    ));
}

#[test]
fn group_names_must_not_collide_with_entries() {
    let mut config = BuildConfig::new("styles", "./a.js");
    config
        .chunk_grouping_rules
        .push(GroupingRule::by_content_type("styles", ContentType::Stylesheet));
    assert!(matches!(
        SchemaValidator.validate(&config),
        Err(ConfigError::DuplicateChunkName(name)) if name == "styles"
    ));
}

#[test]
fn shared_chunk_name_must_be_unique_unless_duplicating() {
    let mut config = BuildConfig::new("shared", "./a.js");
    assert!(SchemaValidator.validate(&config).is_err());
    config.duplicate_shared_modules = true;
    assert!(SchemaValidator.validate(&config).is_ok());
}

#[test]
fn plain_externals_need_a_binding() {
    let mut config = BuildConfig::new("main", "./a.js");
    config.externals.push(ExternalConfig {
        library_name: "vue".to_string(),
        manifest_path: None,
        global_binding_name: None,
    });
    assert!(matches!(SchemaValidator.validate(&config), Err(ConfigError::InvalidValue { .. })));

    config.externals[0] = ExternalConfig::global("vue", "Vue");
    assert!(SchemaValidator.validate(&config).is_ok());
}

#[test]
fn compress_threshold_must_be_positive() {
    let mut config = BuildConfig::new("main", "./a.js");
    config.emit_stages.push(EmitStage::Compress { threshold: 0, test: None });
    assert!(SchemaValidator.validate(&config).is_err());
}

#[test]
fn worker_count_must_be_positive() {
    let mut config = BuildConfig::new("main", "./a.js");
    config.worker_count = Some(0);
    assert!(SchemaValidator.validate(&config).is_err());
}

#[test]
fn fs_validator_checks_entries_with_extension_probing() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/main.js"), "").unwrap();

    let validator = FsValidator::new(dir.path());
    assert!(validator.validate(&BuildConfig::new("main", "./src/main.js")).is_ok());
    assert!(validator.validate(&BuildConfig::new("main", "./src/main")).is_ok());
    // Bare specifiers are resolved later through module directories.
    assert!(validator.validate(&BuildConfig::new("vendor", "react")).is_ok());
    assert!(matches!(
        validator.validate(&BuildConfig::new("main", "./src/missing.js")),
        Err(ConfigError::EntryNotFound(_))
    ));
}

#[test]
fn fs_validator_checks_manifests() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.js"), "").unwrap();

    let mut config = BuildConfig::new("main", "./a.js");
    config.externals.push(ExternalConfig::linked("react", "react.manifest.json"));
    assert!(matches!(
        FsValidator::new(dir.path()).validate(&config),
        Err(ConfigError::ManifestNotFound(_))
    ));

    fs::write(dir.path().join("react.manifest.json"), "{}").unwrap();
    assert!(FsValidator::new(dir.path()).validate(&config).is_ok());
}

#[test]
fn only_stylesheets_can_be_extracted() {
    let mut config = BuildConfig::new("main", "./a.js");
    config.emit_stages.push(EmitStage::ExtractByType {
        content_type: ContentType::Json,
        filename: None,
    });
    assert!(SchemaValidator.validate(&config).is_err());

    config.emit_stages[0] = EmitStage::ExtractByType {
        content_type: ContentType::Stylesheet,
        filename: None,
    };
    assert!(SchemaValidator.validate(&config).is_ok());
}
