//! # Kahlua Core
//!
//! Composes one structured document (JSON or YAML) from a sequence of
//! script fragments, extended by plugins.
//!
//! Each plugin contributes default document sections, DSL commands callable
//! from fragments, and lifecycle hooks (`init`, `beforeEach`, `afterEach`,
//! `finish`). Fragments are Rhai scripts that fill in the document sections;
//! their results are merged into one cumulative document.
//!
//! ## Example
//!
//! ```rust,ignore
//! use kahlua_core::Kahlua;
//! use serde_json::json;
//!
//! let mut kahlua = Kahlua::new();
//! kahlua.use_plugin("cfn", json!({ "region": "eu-west-1" }))?;
//! kahlua.load("templates/network.rhai")?;
//!
//! println!("{}", kahlua.generate()?);
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod document;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod lifecycle;
pub mod loader;
pub mod output;
pub mod plugin;
pub mod registry;
pub mod script;
pub mod script_plugin;

pub use config::KahluaConfig;
pub use context::CommandContext;
pub use dispatch::DslDispatcher;
pub use document::{Document, DocumentAssembler, MergeStrategy, WorkingDocument};
pub use engine::Kahlua;
pub use error::{KahluaError, Result};
pub use fragment::{Fragment, FragmentReader, FsFragmentReader};
pub use lifecycle::LifecycleRunner;
pub use loader::{ChainLoader, FactoryLoader, PluginLoader, DEFAULT_PLUGIN_PREFIX};
pub use output::OutputFormat;
pub use plugin::{DslCommand, Hook, HookPoint, PluginDescriptor, PluginSource};
pub use registry::PluginRegistry;
pub use script::{FragmentScript, RhaiEvaluator, ScriptEvaluator, CONTEXT_BINDING};
pub use script_plugin::ScriptPluginLoader;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        CommandContext, Document, HookPoint, Kahlua, KahluaConfig, KahluaError, PluginDescriptor,
        PluginLoader, Result,
    };
}
