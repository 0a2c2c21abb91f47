//! # tote-config
//!
//! The explicit build configuration for tote, its layered loading
//! (defaults → config file → `TOTE_*` environment) and validation.
//!
//! ```
//! use tote_config::{BuildConfig, SchemaValidator, ConfigValidator};
//! use serde_json::json;
//!
//! let config = BuildConfig::from_value(json!({
//!     "entry": { "main": "./src/index.js" },
//!     "outputFilenamePattern": "[name].bundle.js"
//! }))
//! .unwrap();
//! SchemaValidator.validate(&config).unwrap();
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod template;
pub mod validation;

pub use config::*;
pub use discovery::{discover, ConfigDiscovery, CONFIG_FILE_NAMES};
pub use error::{ConfigError, Result};
pub use template::{FilenameTemplate, TemplateValues, DEFAULT_HASH_LENGTH};
pub use validation::{validate_fs, validate_schema, ConfigValidator, FsValidator, SchemaValidator};
