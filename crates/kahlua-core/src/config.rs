//! # Kahlua Configuration
//!
//! Central configuration for the Kahlua engine.
//! Supports loading from environment variables and programmatic defaults.

use crate::document::MergeStrategy;
use crate::loader::DEFAULT_PLUGIN_PREFIX;
use crate::output::OutputFormat;
use std::env;
use std::path::PathBuf;
use tracing::warn;

/// Global configuration for the Kahlua engine.
///
/// # Example
/// ```rust
/// use kahlua_core::{KahluaConfig, MergeStrategy};
///
/// // Load from environment
/// let config = KahluaConfig::from_env();
///
/// // Or customize
/// let config = KahluaConfig::default()
///     .with_merge_strategy(MergeStrategy::Deep)
///     .with_indent(4);
/// assert_eq!(config.indent, 4);
/// ```
#[derive(Debug, Clone)]
pub struct KahluaConfig {
    /// Prefix plugin identifiers are normalized to.
    /// Default: "kahlua-dsl-", Env: KAHLUA_PLUGIN_PREFIX
    pub plugin_prefix: String,

    /// Directories searched for script plugins given by relative identifier.
    /// Default: empty, Env: KAHLUA_PLUGIN_PATH (platform path list)
    pub plugin_paths: Vec<PathBuf>,

    /// How fragment sections are merged into the document.
    /// Default: shallow, Env: KAHLUA_MERGE=deep
    pub merge_strategy: MergeStrategy,

    /// Format of the generated text.
    /// Default: json, Env: KAHLUA_FORMAT=yaml
    pub output_format: OutputFormat,

    /// Spaces per indentation level for JSON output.
    /// Default: 2, Env: KAHLUA_INDENT=4
    pub indent: usize,

    /// Operation budget for each script evaluation. Zero means unlimited.
    /// Default: 0, Env: KAHLUA_MAX_OPERATIONS=1000000
    pub max_operations: u64,
}

impl Default for KahluaConfig {
    fn default() -> Self {
        Self {
            plugin_prefix: DEFAULT_PLUGIN_PREFIX.to_string(),
            plugin_paths: Vec::new(),
            merge_strategy: MergeStrategy::Shallow,
            output_format: OutputFormat::Json,
            indent: 2,
            max_operations: 0,
        }
    }
}

impl KahluaConfig {
    /// Create a new config from environment variables.
    /// Falls back to defaults for missing or unparsable variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = env::var("KAHLUA_PLUGIN_PREFIX") {
            config.plugin_prefix = v;
        }
        if let Some(v) = env::var_os("KAHLUA_PLUGIN_PATH") {
            config.plugin_paths = env::split_paths(&v).collect();
        }
        if let Ok(v) = env::var("KAHLUA_MERGE") {
            match v.parse() {
                Ok(strategy) => config.merge_strategy = strategy,
                Err(e) => warn!("Ignoring KAHLUA_MERGE: {}", e),
            }
        }
        if let Ok(v) = env::var("KAHLUA_FORMAT") {
            match v.parse() {
                Ok(format) => config.output_format = format,
                Err(e) => warn!("Ignoring KAHLUA_FORMAT: {}", e),
            }
        }
        if let Ok(v) = env::var("KAHLUA_INDENT") {
            if let Ok(n) = v.parse() {
                config.indent = n;
            }
        }
        if let Ok(v) = env::var("KAHLUA_MAX_OPERATIONS") {
            if let Ok(n) = v.parse() {
                config.max_operations = n;
            }
        }

        config
    }

    /// Builder: Set the plugin prefix.
    pub fn with_plugin_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.plugin_prefix = prefix.into();
        self
    }

    /// Builder: Add a script plugin search directory.
    pub fn with_plugin_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_paths.push(dir.into());
        self
    }

    /// Builder: Set the merge strategy.
    pub fn with_merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }

    /// Builder: Set the output format.
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Builder: Set the JSON indentation width.
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Builder: Set the script operation budget.
    pub fn with_max_operations(mut self, max_operations: u64) -> Self {
        self.max_operations = max_operations;
        self
    }
}
