//! Ordered store of plugin descriptors.
//!
//! Registration order is the only precedence rule in Kahlua: it decides
//! which command wins a name collision, which default section wins, and
//! the order hooks fire in.

use crate::plugin::PluginDescriptor;
use crate::script::CONTEXT_BINDING;
use crate::{KahluaError, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Pattern a DSL command name must match to be callable from fragments.
const COMMAND_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Rhai keywords and reserved words. A command under one of these names
/// parses as syntax, not as a method call on the context binding.
const RESERVED_WORDS: &[&str] = &[
    "true", "false", "let", "const", "if", "else", "switch", "do", "while", "until", "loop",
    "for", "in", "continue", "break", "return", "throw", "try", "catch", "fn", "private",
    "import", "export", "as", "global", "Fn", "call", "curry", "this", "is_shared", "print",
    "debug", "eval", "type_of", "is_def_fn", "is_def_var", "var", "static", "shared", "goto",
    "exit", "match", "case", "public", "protected", "new", "use", "with", "module", "package",
    "super", "thread", "spawn", "go", "await", "async", "sync", "yield", "default", "void",
    "null", "nil",
];

static COMMAND_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_command_regex() -> &'static Regex {
    COMMAND_REGEX
        .get_or_init(|| Regex::new(COMMAND_PATTERN).expect("Invalid command pattern regex"))
}

fn is_reserved(name: &str) -> bool {
    name == CONTEXT_BINDING || RESERVED_WORDS.contains(&name)
}

/// Plugins in registration order.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<PluginDescriptor>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a descriptor and append it.
    ///
    /// Duplicate plugin names are allowed; both plugins take part in the
    /// run and the later one wins every collision.
    pub fn register(&mut self, descriptor: PluginDescriptor) -> Result<()> {
        Self::validate(&descriptor)?;
        debug!(
            plugin = %descriptor.name,
            commands = descriptor.dsl_commands.len(),
            sections = descriptor.default_document.len(),
            hooks = descriptor.hooks.len(),
            "Registering plugin"
        );
        self.plugins.push(descriptor);
        Ok(())
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> &[PluginDescriptor] {
        &self.plugins
    }

    /// Declared names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn validate(descriptor: &PluginDescriptor) -> Result<()> {
        if descriptor.name.trim().is_empty() {
            return Err(KahluaError::Configuration(
                "plugin name must not be empty".to_string(),
            ));
        }

        for name in descriptor.dsl_commands.keys() {
            if !get_command_regex().is_match(name) {
                return Err(KahluaError::Configuration(format!(
                    "plugin '{}' declares DSL command '{}' which is not a valid identifier",
                    descriptor.name, name
                )));
            }
            if is_reserved(name) {
                return Err(KahluaError::Configuration(format!(
                    "plugin '{}' declares DSL command '{}' which is reserved",
                    descriptor.name, name
                )));
            }
        }

        for section in descriptor.default_document.keys() {
            if section.is_empty() {
                return Err(KahluaError::Configuration(format!(
                    "plugin '{}' declares an unnamed document section",
                    descriptor.name
                )));
            }
            if section == CONTEXT_BINDING {
                return Err(KahluaError::Configuration(format!(
                    "plugin '{}' declares document section '{}' which is reserved",
                    descriptor.name, section
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_register_keeps_order() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginDescriptor::named("b")).unwrap();
        registry.register(PluginDescriptor::named("a")).unwrap();
        registry.register(PluginDescriptor::named("b")).unwrap();

        assert_eq!(registry.names(), vec!["b", "a", "b"]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.list()[1].name, "a");
    }

    #[test]
    fn test_rejects_invalid_command_name() {
        let mut registry = PluginRegistry::new();
        let plugin = PluginDescriptor::named("bad")
            .with_command("not-valid", |_ctx, _args| Ok(Value::Null));

        let err = registry.register(plugin).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("not-valid"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejects_reserved_command_name() {
        let mut registry = PluginRegistry::new();
        let plugin = PluginDescriptor::named("bad")
            .with_command(CONTEXT_BINDING, |_ctx, _args| Ok(Value::Null));

        assert!(registry.register(plugin).is_err());
    }

    #[test]
    fn test_rejects_script_keywords_as_commands() {
        let mut registry = PluginRegistry::new();
        for keyword in ["if", "fn", "print", "eval", "this"] {
            let plugin = PluginDescriptor::named("bad")
                .with_command(keyword, |_ctx, _args| Ok(Value::Null));

            let err = registry.register(plugin).unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains(keyword));
        }
        assert!(registry.is_empty());

        let plugin = PluginDescriptor::named("ok")
            .with_command("iffy", |_ctx, _args| Ok(Value::Null));
        assert!(registry.register(plugin).is_ok());
    }

    #[test]
    fn test_rejects_section_named_like_context_binding() {
        let mut registry = PluginRegistry::new();
        let plugin = PluginDescriptor::named("bad")
            .with_document("Resources", json!({}))
            .with_document(CONTEXT_BINDING, json!({}));

        let err = registry.register(plugin).unwrap_err();
        assert!(err.is_configuration());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejects_empty_names() {
        let mut registry = PluginRegistry::new();
        assert!(registry.register(PluginDescriptor::named("  ")).is_err());

        let plugin = PluginDescriptor::named("p").with_document("", json!({}));
        assert!(registry.register(plugin).is_err());
    }
}
