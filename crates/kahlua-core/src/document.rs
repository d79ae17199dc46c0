//! The cumulative output document and its per-fragment working copies.

use crate::context::CommandContext;
use crate::plugin::json_kind;
use crate::registry::PluginRegistry;
use crate::{KahluaError, Result};
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::trace;

/// Top-level section name to section value, in construction order.
pub type Document = Map<String, Value>;

/// How a working section is folded into the document section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Assign each key of the working section onto the document section.
    /// Nested values are replaced wholesale.
    #[default]
    Shallow,
    /// Like `Shallow`, but nested objects present on both sides are merged
    /// recursively. Arrays and scalars are still replaced.
    Deep,
}

impl FromStr for MergeStrategy {
    type Err = KahluaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "shallow" => Ok(MergeStrategy::Shallow),
            "deep" => Ok(MergeStrategy::Deep),
            other => Err(KahluaError::Configuration(format!(
                "unknown merge strategy '{}'",
                other
            ))),
        }
    }
}

/// What a fragment sees: one empty object per document section, plus the
/// shared command context.
#[derive(Debug)]
pub struct WorkingDocument<'a> {
    /// Fresh section objects, filled in by the fragment.
    pub sections: Document,

    /// The run's shared context.
    pub context: &'a mut CommandContext,
}

impl<'a> WorkingDocument<'a> {
    /// A section of the working view.
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }
}

/// Builds, copies and merges documents.
pub struct DocumentAssembler {
    strategy: MergeStrategy,
}

impl DocumentAssembler {
    pub fn new(strategy: MergeStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Union of every plugin's default sections.
    ///
    /// Assigned plugin by plugin in registration order, so the last plugin
    /// declaring a section provides its initial value.
    pub fn init_root(registry: &PluginRegistry) -> Document {
        let mut document = Document::new();
        for plugin in registry.list() {
            for (section, value) in &plugin.default_document {
                document.insert(section.clone(), value.clone());
            }
        }
        document
    }

    /// Fresh working view for one fragment.
    pub fn new_working<'a>(
        document: &Document,
        context: &'a mut CommandContext,
    ) -> WorkingDocument<'a> {
        let sections = document
            .keys()
            .map(|section| (section.clone(), Value::Object(Map::new())))
            .collect();
        WorkingDocument { sections, context }
    }

    /// Fold the working sections into the document.
    ///
    /// Only sections already present in the document are considered. Keys
    /// the working section does not mention are left alone.
    pub fn merge_into(&self, document: &mut Document, working: &Document) -> Result<()> {
        for (section, target) in document.iter_mut() {
            let Some(source) = working.get(section) else {
                continue;
            };
            let source = match source {
                Value::Object(source) => source,
                other => {
                    return Err(KahluaError::Merge(format!(
                        "working section '{}' must be an object, got {}",
                        section,
                        json_kind(other)
                    )))
                }
            };
            if source.is_empty() {
                continue;
            }
            let target = match target {
                Value::Object(target) => target,
                other => {
                    return Err(KahluaError::Merge(format!(
                        "document section '{}' is {} and cannot receive keys",
                        section,
                        json_kind(other)
                    )))
                }
            };
            trace!(section = %section, keys = source.len(), "Merging section");
            match self.strategy {
                MergeStrategy::Shallow => assign(target, source),
                MergeStrategy::Deep => deep_assign(target, source),
            }
        }
        Ok(())
    }
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new(MergeStrategy::default())
    }
}

fn assign(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

fn deep_assign(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_assign(existing, incoming)
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
