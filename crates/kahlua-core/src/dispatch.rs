//! Binding of DSL commands onto a fresh command context.

use crate::context::CommandContext;
use crate::registry::PluginRegistry;
use std::sync::Arc;
use tracing::debug;

/// Builds the per-run [`CommandContext`].
pub struct DslDispatcher;

impl DslDispatcher {
    /// Install every plugin's commands on a new context.
    ///
    /// Plugins are walked in registration order, so a later plugin's
    /// command fully replaces an earlier one with the same name.
    pub fn bind(registry: &PluginRegistry) -> CommandContext {
        let mut context = CommandContext::new();
        for plugin in registry.list() {
            for name in plugin.command_names() {
                if let Some(previous) = context.command(name) {
                    debug!(
                        command = name,
                        replaced = %previous.plugin,
                        by = %plugin.name,
                        "DSL command overridden"
                    );
                }
                let command = Arc::clone(&plugin.dsl_commands[name]);
                context.bind(name, plugin.name.as_str(), command);
            }
        }
        context
    }
}
