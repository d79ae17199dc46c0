//! Plugins written as Rhai scripts.
//!
//! A plugin script is an ordinary Rhai file. Its functions are sorted into
//! the three plugin contributions by name:
//!
//! - `fn document()` returns the default sections as an object map.
//! - `fn init(doc)`, `fn before_each(doc)`, `fn after_each(doc)` and
//!   `fn finish(doc)` are hooks. If a hook returns an object map, it
//!   replaces the document (or working view) it was given.
//! - Every other public function not starting with `_` is a DSL command.
//!
//! Inside commands and hooks `this` is the plugin's own state namespace on
//! the command context, and `options()` returns the options the plugin was
//! registered with.
//!
//! ```text
//! fn document() { #{ Resources: #{} } }
//! fn init(doc) { this.value = options().value; }
//! fn finish(doc) { this.remove("value"); }
//! fn example_plugin_method() { if this.value == () { 100 } else { this.value } }
//! ```

use crate::context::CommandContext;
use crate::document::Document;
use crate::loader::{plugin_name, PluginLoader};
use crate::plugin::{HookPoint, PluginDescriptor};
use crate::script::{new_engine, script_error};
use crate::{KahluaError, Result};
use rhai::{CallFnOptions, Dynamic, Engine, FnAccess, Scope, AST};
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// File extension of plugin scripts.
pub const SCRIPT_EXTENSION: &str = "rhai";

fn hook_point(function: &str) -> Option<HookPoint> {
    match function {
        "init" => Some(HookPoint::Init),
        "before_each" => Some(HookPoint::BeforeEach),
        "after_each" => Some(HookPoint::AfterEach),
        "finish" => Some(HookPoint::Finish),
        _ => None,
    }
}

/// Loads plugins from Rhai script files.
///
/// An identifier resolves to the first existing file among `<id>`,
/// `<id>.rhai` and `<id>/<name>.rhai`. Relative identifiers are tried
/// against the working directory first, then each search path.
#[derive(Debug, Clone, Default)]
pub struct ScriptPluginLoader {
    search_paths: Vec<PathBuf>,
    max_operations: u64,
}

impl ScriptPluginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory to search relative identifiers in.
    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    /// Add several search directories.
    pub fn with_search_paths<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_paths.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Operation budget for plugin functions. Zero means unlimited.
    pub fn with_max_operations(mut self, max_operations: u64) -> Self {
        self.max_operations = max_operations;
        self
    }

    /// Find the script file for a normalized identifier.
    pub fn locate(&self, identifier: &str) -> Option<PathBuf> {
        let path = Path::new(identifier);
        let mut roots = vec![path.to_path_buf()];
        if path.is_relative() {
            roots.extend(self.search_paths.iter().map(|dir| dir.join(path)));
        }

        roots
            .iter()
            .flat_map(|root| candidates(root))
            .find(|candidate| candidate.is_file())
    }

    fn compile(&self, path: &Path, name: &str, options: &Value) -> Result<ScriptPlugin> {
        let source = std::fs::read_to_string(path)?;

        let mut engine = new_engine(self.max_operations);
        let options = rhai::serde::to_dynamic(options).map_err(|e| {
            KahluaError::Configuration(format!("options of plugin '{}': {}", name, e))
        })?;
        engine.register_fn("options", move || options.clone());

        let ast = engine.compile(&source).map_err(|e| {
            KahluaError::Configuration(format!("plugin script {}: {}", path.display(), e))
        })?;

        Ok(ScriptPlugin {
            namespace: name.to_string(),
            engine,
            ast,
        })
    }
}

fn candidates(root: &Path) -> Vec<PathBuf> {
    let mut with_extension = OsString::from(root.as_os_str());
    with_extension.push(".");
    with_extension.push(SCRIPT_EXTENSION);

    let mut found = vec![root.to_path_buf(), PathBuf::from(with_extension)];
    if let Some(stem) = root.file_name() {
        let mut file = OsString::from(stem);
        file.push(".");
        file.push(SCRIPT_EXTENSION);
        found.push(root.join(file));
    }
    found
}

impl PluginLoader for ScriptPluginLoader {
    fn loader_type(&self) -> &str {
        "script"
    }

    fn load(&self, identifier: &str, options: &Value) -> Result<PluginDescriptor> {
        let path = self
            .locate(identifier)
            .ok_or_else(|| KahluaError::PluginNotFound(identifier.to_string()))?;
        let name = plugin_name(identifier);
        debug!(plugin = %name, path = %path.display(), "Loading script plugin");

        let plugin = Arc::new(self.compile(&path, &name, options)?);
        plugin.describe(name)
    }
}

/// A compiled plugin script.
struct ScriptPlugin {
    namespace: String,
    engine: Engine,
    ast: AST,
}

impl ScriptPlugin {
    fn describe(self: Arc<Self>, name: String) -> Result<PluginDescriptor> {
        let functions: Vec<(String, usize)> = self
            .ast
            .iter_functions()
            .filter(|f| !matches!(f.access, FnAccess::Private))
            .map(|f| (f.name.to_string(), f.params.len()))
            .collect();

        let mut descriptor = PluginDescriptor::named(name);
        for (function, arity) in functions {
            if function.starts_with('_') {
                continue;
            }

            if function == "document" {
                if arity != 0 {
                    warn!(plugin = %self.namespace, "document() must not take parameters, ignored");
                    continue;
                }
                let sections = self.call_plain("document")?;
                descriptor = descriptor.with_document_value(sections)?;
                continue;
            }

            if let Some(point) = hook_point(&function) {
                if arity != 1 {
                    warn!(
                        plugin = %self.namespace,
                        hook = %point,
                        "hook must take one parameter, ignored"
                    );
                    continue;
                }
                let plugin = Arc::clone(&self);
                descriptor = descriptor
                    .with_hook(point, move |ctx, view| plugin.call_hook(ctx, &function, view));
                continue;
            }

            let plugin = Arc::clone(&self);
            let command = function.clone();
            descriptor = descriptor.with_command(function, move |ctx, args| {
                let args = args
                    .iter()
                    .map(rhai::serde::to_dynamic)
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(script_error)?;
                let result = plugin.call(ctx, &command, args)?;
                rhai::serde::from_dynamic(&result).map_err(script_error)
            });
        }

        Ok(descriptor)
    }

    /// Call a function without `this`, e.g. `document()`.
    fn call_plain(&self, function: &str) -> Result<Value> {
        let mut scope = Scope::new();
        let result = self
            .engine
            .call_fn_with_options::<Dynamic>(
                CallFnOptions::new().eval_ast(false),
                &mut scope,
                &self.ast,
                function,
                (),
            )
            .map_err(script_error)?;
        rhai::serde::from_dynamic(&result).map_err(script_error)
    }

    /// Call a function with `this` bound to the plugin's namespace.
    fn call(
        &self,
        ctx: &mut CommandContext,
        function: &str,
        args: Vec<Dynamic>,
    ) -> Result<Dynamic> {
        let state = ctx.namespace(&self.namespace).cloned().unwrap_or_default();
        let mut this = rhai::serde::to_dynamic(&state).map_err(script_error)?;

        let mut scope = Scope::new();
        let options = CallFnOptions::new().eval_ast(false).bind_this_ptr(&mut this);
        let result = self
            .engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, function, args)
            .map_err(script_error)?;

        let state: Map<String, Value> = rhai::serde::from_dynamic(&this).map_err(|e| {
            KahluaError::Script(format!(
                "plugin '{}' left `this` in an invalid state: {}",
                self.namespace, e
            ))
        })?;
        ctx.replace_namespace(&self.namespace, state);
        Ok(result)
    }

    fn call_hook(
        &self,
        ctx: &mut CommandContext,
        function: &str,
        view: &mut Document,
    ) -> Result<()> {
        let arg = rhai::serde::to_dynamic(&*view).map_err(script_error)?;
        let result = self.call(ctx, function, vec![arg])?;
        if result.is_map() {
            *view = rhai::serde::from_dynamic(&result).map_err(script_error)?;
        }
        Ok(())
    }
}
