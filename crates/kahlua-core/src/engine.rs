//! Kahlua Engine - the orchestrator that turns fragments into a document.
//!
//! A run goes through these stages, strictly in order:
//!
//! 1. bind every plugin's DSL commands onto a fresh command context,
//! 2. initialize the document from the plugins' default sections,
//! 3. fire `init` hooks,
//! 4. for each fragment: build a working view, fire `beforeEach`, evaluate
//!    the fragment, fire `afterEach`, merge the view into the document,
//! 5. fire `finish` hooks,
//! 6. return (or render) the document.
//!
//! The first error ends the run and no document is produced.

use crate::dispatch::DslDispatcher;
use crate::document::{Document, DocumentAssembler};
use crate::fragment::{Fragment, FragmentReader, FsFragmentReader};
use crate::lifecycle::LifecycleRunner;
use crate::loader::{plugin_name, resolve_plugin_id, PluginLoader};
use crate::output::render;
use crate::plugin::{json_kind, HookPoint, PluginDescriptor, PluginSource};
use crate::registry::PluginRegistry;
use crate::script::{RhaiEvaluator, ScriptEvaluator};
use crate::script_plugin::ScriptPluginLoader;
use crate::{KahluaConfig, KahluaError, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// The document generator.
///
/// # Example
///
/// ```rust
/// use kahlua_core::{Kahlua, PluginDescriptor};
/// use serde_json::{json, Value};
///
/// let mut kahlua = Kahlua::new();
/// kahlua
///     .use_descriptor(
///         PluginDescriptor::new()
///             .with_document("Resources", json!({}))
///             .with_command("repeat", |_ctx, args| {
///                 let n = args[0].as_u64().unwrap_or(0) as usize;
///                 Ok(Value::Array(vec![args[1].clone(); n]))
///             }),
///     )
///     .unwrap();
/// kahlua.add("Resources.Test = $.repeat(2, #{ a: 1 });");
///
/// let document = kahlua.generate_document().unwrap();
/// assert_eq!(document["Resources"]["Test"], json!([{ "a": 1 }, { "a": 1 }]));
/// ```
pub struct Kahlua {
    /// Plugins in registration order.
    registry: PluginRegistry,

    /// Fragments in append order.
    fragments: Vec<Fragment>,

    config: KahluaConfig,

    /// Resolves plugin identifiers.
    loader: Box<dyn PluginLoader>,

    /// Runs fragment scripts.
    evaluator: Box<dyn ScriptEvaluator>,

    /// Reads fragment files.
    reader: Box<dyn FragmentReader>,
}

impl Kahlua {
    /// Create an engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(KahluaConfig::default())
    }

    /// Create an engine configured from the environment.
    pub fn from_env() -> Self {
        Self::with_config(KahluaConfig::from_env())
    }

    /// Create an engine with the given configuration, loading plugins from
    /// Rhai scripts and fragments from the filesystem.
    pub fn with_config(config: KahluaConfig) -> Self {
        let loader = ScriptPluginLoader::new()
            .with_search_paths(config.plugin_paths.clone())
            .with_max_operations(config.max_operations);
        let evaluator = RhaiEvaluator::new().with_max_operations(config.max_operations);

        Self {
            registry: PluginRegistry::new(),
            fragments: Vec::new(),
            config,
            loader: Box::new(loader),
            evaluator: Box::new(evaluator),
            reader: Box::new(FsFragmentReader),
        }
    }

    /// Replace the plugin loader.
    pub fn with_loader(mut self, loader: impl PluginLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Replace the script evaluator.
    pub fn with_evaluator(mut self, evaluator: impl ScriptEvaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Replace the fragment reader.
    pub fn with_reader(mut self, reader: impl FragmentReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    pub fn config(&self) -> &KahluaConfig {
        &self.config
    }

    /// Register a plugin given by identifier or as a descriptor.
    ///
    /// Identifiers are normalized with the configured prefix and loaded with
    /// the configured loader, which receives `options`. The plugin is named
    /// after the normalized identifier. `null` options count as `{}`.
    #[instrument(skip(self, source, options))]
    pub fn register_plugin(
        &mut self,
        source: impl Into<PluginSource>,
        options: Value,
    ) -> Result<()> {
        let options = match options {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => options,
            other => {
                return Err(KahluaError::Configuration(format!(
                    "plugin options must be an object, got {}",
                    json_kind(&other)
                )))
            }
        };

        let descriptor = match source.into() {
            PluginSource::Identifier(identifier) => {
                let resolved = resolve_plugin_id(&identifier, &self.config.plugin_prefix)?;
                debug!(
                    identifier = %identifier,
                    resolved = %resolved,
                    loader = self.loader.loader_type(),
                    "Resolving plugin"
                );
                let mut descriptor = self.loader.load(&resolved, &options)?;
                descriptor.name = plugin_name(&resolved);
                descriptor
            }
            PluginSource::Descriptor(descriptor) => descriptor,
        };

        info!("Using plugin: {}", descriptor.name);
        self.registry.register(descriptor)
    }

    /// Register a plugin by short name or path.
    pub fn use_plugin(&mut self, identifier: &str, options: Value) -> Result<()> {
        self.register_plugin(identifier, options)
    }

    /// Register an already-built plugin.
    pub fn use_descriptor(&mut self, descriptor: PluginDescriptor) -> Result<()> {
        self.register_plugin(descriptor, Value::Null)
    }

    /// Names of registered plugins, in registration order.
    pub fn plugin_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Append a fragment given as text.
    pub fn add(&mut self, source: impl Into<String>) {
        self.fragments.push(Fragment::new(source));
    }

    /// Append a fragment read from a file.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let source = self.reader.read(path)?;
        debug!(path = %path.display(), "Loaded fragment");
        self.fragments.push(Fragment::new(source).with_origin(path));
        Ok(())
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Run all fragments and render the document in the configured format.
    pub fn generate(&self) -> Result<String> {
        let document = self.generate_document()?;
        render(&document, self.config.output_format, self.config.indent)
    }

    /// Run all fragments and return the assembled document.
    #[instrument(
        skip(self),
        fields(
            run_id = %Uuid::new_v4(),
            plugins = self.registry.len(),
            fragments = self.fragments.len()
        )
    )]
    pub fn generate_document(&self) -> Result<Document> {
        let assembler = DocumentAssembler::new(self.config.merge_strategy);

        let mut context = DslDispatcher::bind(&self.registry);
        let mut document = DocumentAssembler::init_root(&self.registry);
        debug!(
            sections = document.len(),
            commands = context.command_names().len(),
            "Document initialized"
        );

        LifecycleRunner::fire(HookPoint::Init, &self.registry, &mut context, &mut document)?;

        for (index, fragment) in self.fragments.iter().enumerate() {
            let mut working = DocumentAssembler::new_working(&document, &mut context);

            LifecycleRunner::fire(
                HookPoint::BeforeEach,
                &self.registry,
                &mut *working.context,
                &mut working.sections,
            )?;

            if let Err(source) = self.evaluator.evaluate(&fragment.source, &mut working) {
                error!(
                    fragment = index,
                    origin = %fragment.label(),
                    "Fragment evaluation failed: {}",
                    source
                );
                return Err(KahluaError::Evaluation {
                    index,
                    source: Box::new(source),
                });
            }

            LifecycleRunner::fire(
                HookPoint::AfterEach,
                &self.registry,
                &mut *working.context,
                &mut working.sections,
            )?;

            assembler.merge_into(&mut document, &working.sections)?;
        }

        LifecycleRunner::fire(HookPoint::Finish, &self.registry, &mut context, &mut document)?;

        info!("Generated document with {} sections", document.len());
        Ok(document)
    }
}

impl Default for Kahlua {
    fn default() -> Self {
        Self::new()
    }
}
