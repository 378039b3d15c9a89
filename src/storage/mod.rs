//! # Storage Layer
//!
//! File boundary for metastage: everything that touches disk lives here so
//! the domain pipeline stays pure.
//!
//! ## File Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Dependency edges | JSON array of query rows | given on the command line |
//! | Type catalog | JSON (`version`, `types`, `members`) | given on the command line |
//! | Config | TOML | `metastage.toml` (walks up from cwd) |
//! | Manifests | XML | `{out-dir}/{prefix}-all.xml`, `{prefix}-group-{n}.xml` |
//!
//! ## Key Types
//!
//! - [`Config`] - Project and global configuration
//! - [`EdgeRecord`] / [`CatalogFile`] - Raw input shapes
//! - [`ManifestWriter`] - Atomic manifest output

mod config;
mod input;
mod output;

pub use config::{
    Config, ConfigError, GlobalConfig, ManifestConfig, OutputFormat, ProjectConfig,
    ResolverConfig, CONFIG_FILE_NAME,
};
pub use input::{load_catalog, load_edges, parse_catalog, parse_edges, CatalogFile, EdgeRecord};
pub use output::{write_atomic, ManifestWriter};
