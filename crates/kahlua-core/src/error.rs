//! Error types for Kahlua Core.

use crate::plugin::HookPoint;
use thiserror::Error;

/// Result type alias for Kahlua operations.
pub type Result<T> = std::result::Result<T, KahluaError>;

/// Main error type for the Kahlua engine.
#[derive(Debug, Error)]
pub enum KahluaError {
    /// Malformed plugin descriptor or plugin options.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Plugin identifier could not be resolved by any loader.
    #[error("Plugin '{0}' not found")]
    PluginNotFound(String),

    /// A fragment called a DSL command nobody registered.
    #[error("DSL command '{0}' is not bound")]
    UnknownCommand(String),

    /// The script evaluator rejected or failed to run a script.
    #[error("Script error: {0}")]
    Script(String),

    /// A fragment failed during evaluation. The run is aborted.
    #[error("Evaluation of fragment #{index} failed: {source}")]
    Evaluation {
        index: usize,
        #[source]
        source: Box<KahluaError>,
    },

    /// A plugin hook failed.
    #[error("Hook '{point}' of plugin '{plugin}' failed: {source}")]
    Hook {
        plugin: String,
        point: HookPoint,
        #[source]
        source: Box<KahluaError>,
    },

    /// A working section could not be merged into the document.
    #[error("Merge error: {0}")]
    Merge(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML serialization failed.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),
}

impl KahluaError {
    /// Whether this error aborted a run while evaluating a fragment.
    pub fn is_evaluation(&self) -> bool {
        matches!(self, KahluaError::Evaluation { .. })
    }

    /// Whether this error was raised while registering a plugin.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            KahluaError::Configuration(_) | KahluaError::PluginNotFound(_)
        )
    }
}
