//! # Fragment scripts
//!
//! Fragments are written in Rhai. Each top-level document section is
//! visible as an object map variable, and the run's command context is
//! bound as `dsl`. The shorthand `$` is rewritten to `dsl` before
//! evaluation, so both of these call the same command:
//!
//! ```text
//! Resources.Test = $.repeat(3, #{ a: 1 });
//! Resources.Test = dsl.repeat(3, #{ a: 1 });
//! ```

use crate::context::CommandContext;
use crate::document::{Document, WorkingDocument};
use crate::{KahluaError, Result};
use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Variable name under which fragments reach the command context.
pub const CONTEXT_BINDING: &str = "dsl";

/// Runs fragment text against a working document.
///
/// Implementations must expose only the working sections and the context
/// binding to the script, and must report every failure instead of
/// swallowing it. Effects are observed through the working document.
///
/// Key order inside a section is up to the implementation. Top-level
/// section order is always kept.
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, script: &str, working: &mut WorkingDocument<'_>) -> Result<()>;
}

/// Pre-processor for fragment syntax.
pub struct FragmentScript;

impl FragmentScript {
    /// Rewrite the `$` shorthand into the context binding.
    ///
    /// String literals, character literals and comments are left as they
    /// are.
    pub fn preprocess(script: &str) -> String {
        let mut out = String::with_capacity(script.len() + 8);
        let mut chars = script.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '$' => out.push_str(CONTEXT_BINDING),
                '"' | '`' | '\'' => {
                    out.push(c);
                    while let Some(inner) = chars.next() {
                        out.push(inner);
                        if inner == '\\' {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        } else if inner == c {
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'/') => {
                    out.push(c);
                    for inner in chars.by_ref() {
                        out.push(inner);
                        if inner == '\n' {
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    out.push(c);
                    let mut prev = '\0';
                    for inner in chars.by_ref() {
                        out.push(inner);
                        if prev == '*' && inner == '/' {
                            break;
                        }
                        prev = inner;
                    }
                }
                _ => out.push(c),
            }
        }

        out
    }
}

/// Receiver object bound as `dsl` inside fragments.
#[derive(Clone)]
struct DslHandle {
    context: Arc<Mutex<CommandContext>>,
}

impl DslHandle {
    fn call(
        &mut self,
        name: &str,
        args: Vec<Dynamic>,
    ) -> std::result::Result<Dynamic, Box<EvalAltResult>> {
        let args = args
            .iter()
            .map(|arg| rhai::serde::from_dynamic::<Value>(arg))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut context = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        let result = context
            .invoke(name, &args)
            .map_err(|e| -> Box<EvalAltResult> { e.to_string().into() })?;
        rhai::serde::to_dynamic(&result)
    }
}

macro_rules! register_command {
    ($engine:expr, $name:expr $(, $arg:ident)*) => {{
        let command = $name.to_string();
        $engine.register_fn($name, move |handle: &mut DslHandle $(, $arg: Dynamic)*| {
            handle.call(&command, vec![$($arg),*])
        });
    }};
}

/// Build a Rhai engine with script output routed to tracing.
pub(crate) fn new_engine(max_operations: u64) -> Engine {
    let mut engine = Engine::new();
    if max_operations > 0 {
        engine.set_max_operations(max_operations);
    }
    engine.on_print(|text| info!(target: "kahlua::script", "{}", text));
    engine
}

pub(crate) fn script_error(err: impl std::fmt::Display) -> KahluaError {
    KahluaError::Script(err.to_string())
}

/// [`ScriptEvaluator`] backed by the Rhai scripting language.
///
/// Rhai object maps are ordered by key, so keys a fragment writes into a
/// section come back sorted rather than in assignment order. DSL commands
/// accept up to eight positional arguments.
#[derive(Debug, Clone, Default)]
pub struct RhaiEvaluator {
    max_operations: u64,
}

impl RhaiEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort scripts after this many operations. Zero means unlimited.
    pub fn with_max_operations(mut self, max_operations: u64) -> Self {
        self.max_operations = max_operations;
        self
    }

    fn build_engine(&self, commands: &[String]) -> Engine {
        let mut engine = new_engine(self.max_operations);
        engine.register_type_with_name::<DslHandle>("Dsl");
        for name in commands {
            let name = name.as_str();
            register_command!(engine, name);
            register_command!(engine, name, a);
            register_command!(engine, name, a, b);
            register_command!(engine, name, a, b, c);
            register_command!(engine, name, a, b, c, d);
            register_command!(engine, name, a, b, c, d, e);
            register_command!(engine, name, a, b, c, d, e, f);
            register_command!(engine, name, a, b, c, d, e, f, g);
            register_command!(engine, name, a, b, c, d, e, f, g, h);
        }
        engine
    }

    fn run(
        engine: &Engine,
        script: &str,
        sections: &mut Document,
        context: &Arc<Mutex<CommandContext>>,
    ) -> Result<()> {
        let mut scope = Scope::new();
        for (name, value) in sections.iter() {
            let value = rhai::serde::to_dynamic(value).map_err(script_error)?;
            scope.push_dynamic(name.clone(), value);
        }
        scope.push(
            CONTEXT_BINDING,
            DslHandle {
                context: Arc::clone(context),
            },
        );

        engine.run_with_scope(&mut scope, script).map_err(script_error)?;

        for (name, value) in sections.iter_mut() {
            if let Some(updated) = scope.get_value::<Dynamic>(name) {
                *value = rhai::serde::from_dynamic(&updated).map_err(script_error)?;
            }
        }
        Ok(())
    }
}

impl ScriptEvaluator for RhaiEvaluator {
    fn evaluate(&self, script: &str, working: &mut WorkingDocument<'_>) -> Result<()> {
        let script = FragmentScript::preprocess(script);
        debug!("Evaluating fragment ({} bytes)", script.len());

        let engine = self.build_engine(&working.context.command_names());

        // The context is moved behind a mutex for the duration of the script
        // and moved back afterwards, whatever the outcome.
        let shared = Arc::new(Mutex::new(std::mem::take(&mut *working.context)));
        let outcome = Self::run(&engine, &script, &mut working.sections, &shared);
        let mut restored = shared.lock().unwrap_or_else(PoisonError::into_inner);
        *working.context = std::mem::take(&mut *restored);
        outcome
    }
}
