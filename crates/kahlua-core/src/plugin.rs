//! Plugin descriptors.
//!
//! A plugin contributes three things to a run:
//!
//! - default document sections,
//! - DSL commands callable from fragments,
//! - lifecycle hooks fired around document construction.
//!
//! Commands and hooks receive the run's [`CommandContext`] as an explicit
//! first parameter, so state attached during `init` is visible to every
//! later command call of the same run.

use crate::context::CommandContext;
use crate::document::Document;
use crate::{KahluaError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name given to descriptors registered without one.
pub const ANONYMOUS_PLUGIN: &str = "(anonymous)";

/// A DSL command. Receives the shared context and positional arguments.
pub type DslCommand = Arc<dyn Fn(&mut CommandContext, &[Value]) -> Result<Value> + Send + Sync>;

/// A lifecycle hook. Receives the shared context and the document (or
/// working view) for the current stage, and acts by mutation.
pub type Hook = Arc<dyn Fn(&mut CommandContext, &mut Document) -> Result<()> + Send + Sync>;

/// Points in the generation lifecycle where hooks are fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// After the document is initialized, before any fragment.
    Init,
    /// Before each fragment is evaluated, with the working view.
    BeforeEach,
    /// After each fragment is evaluated, with the working view.
    AfterEach,
    /// After every fragment was merged.
    Finish,
}

impl HookPoint {
    pub const ALL: [HookPoint; 4] = [
        HookPoint::Init,
        HookPoint::BeforeEach,
        HookPoint::AfterEach,
        HookPoint::Finish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::Init => "init",
            HookPoint::BeforeEach => "beforeEach",
            HookPoint::AfterEach => "afterEach",
            HookPoint::Finish => "finish",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a plugin contributes to a run.
///
/// # Example
///
/// ```
/// use kahlua_core::PluginDescriptor;
/// use serde_json::{json, Value};
///
/// let plugin = PluginDescriptor::new()
///     .with_document("Resources", json!({}))
///     .with_command("repeat", |_ctx, args| {
///         let n = args.first().and_then(Value::as_u64).unwrap_or(0);
///         let item = args.get(1).cloned().unwrap_or(Value::Null);
///         Ok(Value::Array(vec![item; n as usize]))
///     });
///
/// assert_eq!(plugin.name, "(anonymous)");
/// assert!(plugin.dsl_commands.contains_key("repeat"));
/// ```
#[derive(Clone)]
pub struct PluginDescriptor {
    /// Declared name, used for introspection and as the state namespace.
    pub name: String,

    /// Commands bound onto the context under their map key.
    pub dsl_commands: HashMap<String, DslCommand>,

    /// Default top-level sections, in declaration order.
    pub default_document: Document,

    /// At most one hook per lifecycle point.
    pub hooks: HashMap<HookPoint, Hook>,
}

impl PluginDescriptor {
    /// Create an anonymous, empty descriptor.
    pub fn new() -> Self {
        Self::named(ANONYMOUS_PLUGIN)
    }

    /// Create an empty descriptor with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dsl_commands: HashMap::new(),
            default_document: Document::new(),
            hooks: HashMap::new(),
        }
    }

    /// Set the plugin name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declare a default section.
    pub fn with_document(mut self, section: impl Into<String>, value: Value) -> Self {
        self.default_document.insert(section.into(), value);
        self
    }

    /// Declare default sections from a JSON object such as
    /// `{"Resources": {}, "Outputs": {}}`.
    pub fn with_document_value(mut self, document: Value) -> Result<Self> {
        match document {
            Value::Object(sections) => {
                for (section, value) in sections {
                    self.default_document.insert(section, value);
                }
                Ok(self)
            }
            other => Err(KahluaError::Configuration(format!(
                "default document of plugin '{}' must be an object, got {}",
                self.name,
                json_kind(&other)
            ))),
        }
    }

    /// Add a DSL command.
    pub fn with_command<F>(mut self, name: impl Into<String>, command: F) -> Self
    where
        F: Fn(&mut CommandContext, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.dsl_commands.insert(name.into(), Arc::new(command));
        self
    }

    /// Add a hook, replacing any previous hook for the same point.
    pub fn with_hook<F>(mut self, point: HookPoint, hook: F) -> Self
    where
        F: Fn(&mut CommandContext, &mut Document) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.insert(point, Arc::new(hook));
        self
    }

    /// Look up the hook for a lifecycle point.
    pub fn hook(&self, point: HookPoint) -> Option<&Hook> {
        self.hooks.get(&point)
    }

    /// Command names, sorted.
    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.dsl_commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for PluginDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks: Vec<&str> = HookPoint::ALL
            .iter()
            .filter(|point| self.hooks.contains_key(point))
            .map(HookPoint::as_str)
            .collect();
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("dsl_commands", &self.command_names())
            .field("default_document", &self.default_document)
            .field("hooks", &hooks)
            .finish()
    }
}

/// The two ways a plugin can be handed to the engine.
#[derive(Debug, Clone)]
pub enum PluginSource {
    /// A short name or a filesystem path, resolved by a `PluginLoader`.
    Identifier(String),
    /// An already-built descriptor.
    Descriptor(PluginDescriptor),
}

impl From<&str> for PluginSource {
    fn from(identifier: &str) -> Self {
        PluginSource::Identifier(identifier.to_string())
    }
}

impl From<String> for PluginSource {
    fn from(identifier: String) -> Self {
        PluginSource::Identifier(identifier)
    }
}

impl From<PluginDescriptor> for PluginSource {
    fn from(descriptor: PluginDescriptor) -> Self {
        PluginSource::Descriptor(descriptor)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
