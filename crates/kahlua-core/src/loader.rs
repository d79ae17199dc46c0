//! Plugin identifiers and loaders.
//!
//! A plugin given by identifier is normalized first: the final path segment
//! gets the plugin prefix unless it already carries it. `my-example`,
//! `kahlua-dsl-my-example` and `plugins/my-example` therefore all end in
//! `kahlua-dsl-my-example`. The normalized identifier is then handed to a
//! [`PluginLoader`].

use crate::plugin::PluginDescriptor;
use crate::{KahluaError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Prefix every plugin identifier is normalized to.
pub const DEFAULT_PLUGIN_PREFIX: &str = "kahlua-dsl-";

/// Prepend `prefix` to the final segment of `identifier` unless present.
pub fn resolve_plugin_id(identifier: &str, prefix: &str) -> Result<String> {
    let prefixed = |base: &str| {
        if base.starts_with(prefix) {
            base.to_string()
        } else {
            format!("{}{}", prefix, base)
        }
    };

    let (dir, base) = match identifier.rsplit_once('/') {
        Some((dir, base)) => (Some(dir), base),
        None => (None, identifier),
    };
    if base.trim().is_empty() {
        return Err(KahluaError::Configuration(format!(
            "plugin identifier '{}' has no name",
            identifier
        )));
    }

    Ok(match dir {
        Some(dir) => format!("{}/{}", dir, prefixed(base)),
        None => prefixed(base),
    })
}

/// Name a plugin loaded from a normalized identifier is registered under:
/// its final segment without extension.
pub fn plugin_name(resolved: &str) -> String {
    Path::new(resolved)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(resolved)
        .to_string()
}

/// Turns a normalized identifier into a descriptor.
pub trait PluginLoader: Send + Sync {
    /// Short label for logs.
    fn loader_type(&self) -> &str;

    /// Load the plugin. Return [`KahluaError::PluginNotFound`] when this
    /// loader does not know the identifier.
    fn load(&self, identifier: &str, options: &Value) -> Result<PluginDescriptor>;
}

/// Builds a descriptor from registration options.
pub type PluginFactory = Arc<dyn Fn(&Value) -> Result<PluginDescriptor> + Send + Sync>;

/// Loader for plugins compiled into the host program.
///
/// # Example
///
/// ```
/// use kahlua_core::{FactoryLoader, PluginDescriptor, PluginLoader};
/// use serde_json::json;
///
/// let loader = FactoryLoader::new().with_factory("cfn", |_options| {
///     Ok(PluginDescriptor::new().with_document("Resources", json!({})))
/// });
///
/// assert!(loader.load("kahlua-dsl-cfn", &json!({})).is_ok());
/// assert!(loader.load("lib/kahlua-dsl-cfn.rhai", &json!({})).is_ok());
/// ```
#[derive(Clone)]
pub struct FactoryLoader {
    prefix: String,
    factories: HashMap<String, PluginFactory>,
}

impl FactoryLoader {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PLUGIN_PREFIX)
    }

    /// Use a custom plugin prefix for factory names.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            factories: HashMap::new(),
        }
    }

    /// Register a factory. The name is normalized like an identifier.
    pub fn with_factory<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&Value) -> Result<PluginDescriptor> + Send + Sync + 'static,
    {
        let key = if name.starts_with(&self.prefix) {
            name.to_string()
        } else {
            format!("{}{}", self.prefix, name)
        };
        self.factories.insert(key, Arc::new(factory));
        self
    }

    /// Registered plugin names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FactoryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginLoader for FactoryLoader {
    fn loader_type(&self) -> &str {
        "factory"
    }

    fn load(&self, identifier: &str, options: &Value) -> Result<PluginDescriptor> {
        let name = plugin_name(identifier);
        let factory = self
            .factories
            .get(&name)
            .ok_or_else(|| KahluaError::PluginNotFound(identifier.to_string()))?;
        factory(options)
    }
}

/// Tries several loaders in order.
#[derive(Default)]
pub struct ChainLoader {
    loaders: Vec<Box<dyn PluginLoader>>,
}

impl ChainLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a loader to the chain.
    pub fn with_loader(mut self, loader: impl PluginLoader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }
}

impl PluginLoader for ChainLoader {
    fn loader_type(&self) -> &str {
        "chain"
    }

    fn load(&self, identifier: &str, options: &Value) -> Result<PluginDescriptor> {
        for loader in &self.loaders {
            match loader.load(identifier, options) {
                Err(KahluaError::PluginNotFound(_)) => {
                    debug!(
                        loader = loader.loader_type(),
                        identifier,
                        "Plugin not found, trying next loader"
                    );
                }
                other => return other,
            }
        }
        Err(KahluaError::PluginNotFound(identifier.to_string()))
    }
}
