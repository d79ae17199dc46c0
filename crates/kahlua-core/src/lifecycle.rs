//! Firing of plugin lifecycle hooks.

use crate::context::CommandContext;
use crate::document::Document;
use crate::plugin::HookPoint;
use crate::registry::PluginRegistry;
use crate::{KahluaError, Result};
use tracing::debug;

/// Invokes plugin hooks at a lifecycle point.
pub struct LifecycleRunner;

impl LifecycleRunner {
    /// Call every plugin's hook for `point`, in registration order.
    ///
    /// Plugins without a hook for the point are skipped. Hooks run one after
    /// another against the same context and view, so each sees what the
    /// previous ones changed. The first failing hook stops the run.
    pub fn fire(
        point: HookPoint,
        registry: &PluginRegistry,
        context: &mut CommandContext,
        view: &mut Document,
    ) -> Result<()> {
        for plugin in registry.list() {
            let Some(hook) = plugin.hook(point) else {
                continue;
            };
            debug!(plugin = %plugin.name, hook = %point, "Firing hook");
            hook(context, view).map_err(|source| KahluaError::Hook {
                plugin: plugin.name.clone(),
                point,
                source: Box::new(source),
            })?;
        }
        Ok(())
    }
}
