//! Shared command context for one generation run.
//!
//! Every DSL command call and every hook call of a run receives the same
//! `CommandContext`. Besides the bound commands it carries plugin state,
//! kept in one namespace per plugin so that plugins writing to the shared
//! object do not step on each other. By convention a plugin uses its own
//! name as namespace.

use crate::plugin::DslCommand;
use crate::{KahluaError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A command installed on the context, remembering who provided it.
#[derive(Clone)]
pub struct BoundCommand {
    /// Name of the plugin whose implementation won.
    pub plugin: String,
    command: DslCommand,
}

/// Receiver shared by all commands and hooks of a run.
#[derive(Clone, Default)]
pub struct CommandContext {
    commands: HashMap<String, BoundCommand>,
    state: HashMap<String, Map<String, Value>>,
}

impl CommandContext {
    /// Create an empty context with no commands and no state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a command, replacing any command with the same name.
    pub fn bind(
        &mut self,
        name: impl Into<String>,
        plugin: impl Into<String>,
        command: DslCommand,
    ) {
        self.commands.insert(
            name.into(),
            BoundCommand {
                plugin: plugin.into(),
                command,
            },
        );
    }

    /// Whether a command with this name is bound.
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// The binding for a command name.
    pub fn command(&self, name: &str) -> Option<&BoundCommand> {
        self.commands.get(name)
    }

    /// Names of all bound commands, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Call a bound command with this context as receiver.
    ///
    /// The command's return value is passed through unchanged.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let command = self
            .commands
            .get(name)
            .map(|bound| Arc::clone(&bound.command))
            .ok_or_else(|| KahluaError::UnknownCommand(name.to_string()))?;
        command(self, args)
    }

    /// Read a value from a namespace.
    pub fn get(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.state.get(namespace).and_then(|ns| ns.get(key))
    }

    /// Write a value into a namespace, returning the previous value.
    pub fn set(&mut self, namespace: &str, key: impl Into<String>, value: Value) -> Option<Value> {
        self.namespace_mut(namespace).insert(key.into(), value)
    }

    /// Remove a value from a namespace.
    pub fn remove(&mut self, namespace: &str, key: &str) -> Option<Value> {
        let ns = self.state.get_mut(namespace)?;
        let removed = ns.remove(key);
        if ns.is_empty() {
            self.state.remove(namespace);
        }
        removed
    }

    /// All state of one namespace.
    pub fn namespace(&self, namespace: &str) -> Option<&Map<String, Value>> {
        self.state.get(namespace)
    }

    /// Mutable state of one namespace, created on first access.
    pub fn namespace_mut(&mut self, namespace: &str) -> &mut Map<String, Value> {
        self.state.entry(namespace.to_string()).or_default()
    }

    /// Replace a whole namespace. An empty map removes it.
    pub fn replace_namespace(&mut self, namespace: &str, values: Map<String, Value>) {
        if values.is_empty() {
            self.state.remove(namespace);
        } else {
            self.state.insert(namespace.to_string(), values);
        }
    }

    /// Drop every value of a namespace.
    pub fn clear_namespace(&mut self, namespace: &str) -> Option<Map<String, Value>> {
        self.state.remove(namespace)
    }

    /// Whether any plugin state is currently attached.
    pub fn has_state(&self) -> bool {
        !self.state.is_empty()
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("commands", &self.command_names())
            .field("state", &self.state)
            .finish()
    }
}
