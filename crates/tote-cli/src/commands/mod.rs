//! Command implementations.
//!
//! - [`build`] - Bundle the configured entries
//! - [`library`] - Build link libraries and manifests
//! - [`check`] - Configuration validation
//!
//! Each command exposes an `execute` function taking its parsed arguments.

pub mod build;
pub mod check;
pub mod library;
pub(crate) mod utils;

pub use build::execute as build_execute;
pub use check::execute as check_execute;
pub use library::execute as library_execute;
