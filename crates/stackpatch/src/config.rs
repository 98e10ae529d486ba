//! Configuration types for template updates.
//!
//! All types implement [`serde::Deserialize`] so they can be loaded from a
//! TOML file. Every field is optional and falls back to the defaults below.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration.
//! - [`FormatConfig`] - Layout of nodes written without source formatting.
//! - [`LoadConfig`] - How documents are read.
//! - [`CatalogConfig`] - Where the offline image catalog lives.
//! - [`VersionsConfig`] - Retention of versioned resources.
//!
//! # Example
//!
//! ```
//! # use stackpatch::config::AppConfig;
//! let config: AppConfig = toml::from_str("[format]\nmapping_indent = 4\n").unwrap();
//! assert_eq!(config.format().mapping_indent(), 4);
//! assert_eq!(config.format().json_indent(), 2);
//! assert_eq!(config.versions().keep(), 1);
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use stackpatch_parser::{LoaderConfig, WriterConfig};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Writer layout section.
    #[serde(default)]
    format: FormatConfig,

    /// Loader section.
    #[serde(default)]
    loader: LoadConfig,

    /// Image catalog section.
    #[serde(default)]
    catalog: CatalogConfig,

    /// Versioned resource section.
    #[serde(default)]
    versions: VersionsConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] from its sections.
    ///
    /// # Arguments
    ///
    /// * `format` - Writer layout for new nodes.
    /// * `loader` - Loader settings.
    /// * `catalog` - Image catalog location.
    /// * `versions` - Versioned resource retention.
    pub fn new(
        format: FormatConfig,
        loader: LoadConfig,
        catalog: CatalogConfig,
        versions: VersionsConfig,
    ) -> Self {
        Self {
            format,
            loader,
            catalog,
            versions,
        }
    }

    pub fn format(&self) -> &FormatConfig {
        &self.format
    }

    pub fn loader(&self) -> &LoadConfig {
        &self.loader
    }

    pub fn catalog(&self) -> &CatalogConfig {
        &self.catalog
    }

    pub fn versions(&self) -> &VersionsConfig {
        &self.versions
    }

    /// Returns the settings passed to the document loader.
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig::new(self.loader.allow_duplicate_keys)
    }

    /// Returns the settings passed to the document writer.
    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig::new(
            self.format.mapping_indent,
            self.format.sequence_dash_offset,
            self.format.sequence_indent,
            self.format.json_indent,
        )
    }
}

/// Layout used for nodes that have no source formatting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    mapping_indent: usize,
    sequence_dash_offset: usize,
    sequence_indent: usize,
    json_indent: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        let defaults = WriterConfig::default();
        Self {
            mapping_indent: defaults.mapping_indent(),
            sequence_dash_offset: defaults.sequence_dash_offset(),
            sequence_indent: defaults.sequence_indent(),
            json_indent: defaults.json_indent(),
        }
    }
}

impl FormatConfig {
    pub fn mapping_indent(&self) -> usize {
        self.mapping_indent
    }

    pub fn sequence_dash_offset(&self) -> usize {
        self.sequence_dash_offset
    }

    pub fn sequence_indent(&self) -> usize {
        self.sequence_indent
    }

    pub fn json_indent(&self) -> usize {
        self.json_indent
    }
}

/// Loader settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Let a repeated mapping key replace the earlier value instead of
    /// failing the load.
    allow_duplicate_keys: bool,
}

impl LoadConfig {
    pub fn allow_duplicate_keys(&self) -> bool {
        self.allow_duplicate_keys
    }
}

/// Location of the offline image catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    /// Path of a TOML image catalog, see [`crate::catalog::StaticCatalog`].
    #[serde(default)]
    path: Option<PathBuf>,
}

impl CatalogConfig {
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Retention of versioned resources.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VersionsConfig {
    /// Number of family members left after a new version is added.
    keep: usize,
}

impl Default for VersionsConfig {
    fn default() -> Self {
        Self { keep: 1 }
    }
}

impl VersionsConfig {
    /// Returns the retention count, never less than one.
    pub fn keep(&self) -> usize {
        self.keep.max(1)
    }
}
