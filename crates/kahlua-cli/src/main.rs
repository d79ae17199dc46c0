use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use kahlua_core::{HookPoint, Kahlua, KahluaConfig, MergeStrategy, OutputFormat};
use log::{debug, info};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra directory searched for script plugins (repeatable)
    #[arg(short = 'P', long = "plugin-dir", global = true)]
    plugin_dirs: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a document from fragment files
    Generate {
        /// Fragment files, evaluated in the given order
        #[arg(short, long = "fragment", required = true)]
        fragments: Vec<PathBuf>,

        /// Plugin to use (format: name or name={"json":"options"})
        #[arg(short, long)]
        plugin: Vec<String>,

        /// Output file path (optional, prints to stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (defaults to KAHLUA_FORMAT or json)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Merge strategy for fragment sections (defaults to KAHLUA_MERGE or shallow)
        #[arg(long, value_enum)]
        merge: Option<MergeArg>,
    },

    /// Load plugins and show what they contribute
    Plugins {
        /// Plugin to load (format: name or name={"json":"options"})
        #[arg(short, long, required = true)]
        plugin: Vec<String>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum FormatArg {
    Json,
    Yaml,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Yaml => OutputFormat::Yaml,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum MergeArg {
    Shallow,
    Deep,
}

impl From<MergeArg> for MergeStrategy {
    fn from(arg: MergeArg) -> Self {
        match arg {
            MergeArg::Shallow => MergeStrategy::Shallow,
            MergeArg::Deep => MergeStrategy::Deep,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenv().ok();

    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();

    let mut config = KahluaConfig::from_env();
    for dir in &cli.plugin_dirs {
        config = config.with_plugin_path(dir);
    }

    match &cli.command {
        Commands::Generate { fragments, plugin, output, format, merge } => {
            if let Some(format) = format {
                config = config.with_output_format((*format).into());
            }
            if let Some(merge) = merge {
                config = config.with_merge_strategy((*merge).into());
            }

            let mut kahlua = Kahlua::with_config(config);
            use_plugins(&mut kahlua, plugin)?;

            for path in fragments {
                info!("Reading fragment from {:?}", path);
                kahlua
                    .load(path)
                    .with_context(|| format!("Failed to load fragment {}", path.display()))?;
            }

            let result = kahlua.generate().context("Document generation failed")?;

            if let Some(out_path) = output {
                tokio::fs::write(out_path, &result)
                    .await
                    .context("Failed to write output file")?;
                info!("Success! Output written to {:?}", out_path);
            } else {
                println!("{}", result);
            }
        }
        Commands::Plugins { plugin } => {
            let mut kahlua = Kahlua::with_config(config);
            use_plugins(&mut kahlua, plugin)?;

            for descriptor in kahlua.registry().list() {
                println!("{}", descriptor.name);

                let sections: Vec<&str> =
                    descriptor.default_document.keys().map(String::as_str).collect();
                if !sections.is_empty() {
                    println!("  sections: {}", sections.join(", "));
                }

                let commands = descriptor.command_names();
                if !commands.is_empty() {
                    println!("  commands: {}", commands.join(", "));
                }

                let hooks: Vec<&str> = HookPoint::ALL
                    .iter()
                    .filter(|point| descriptor.hook(**point).is_some())
                    .map(|point| point.as_str())
                    .collect();
                if !hooks.is_empty() {
                    println!("  hooks: {}", hooks.join(", "));
                }
            }
        }
    }

    Ok(())
}

fn use_plugins(kahlua: &mut Kahlua, specs: &[String]) -> Result<()> {
    for spec in specs {
        let (identifier, options) = parse_plugin_arg(spec)?;
        debug!("Using plugin {} with options {}", identifier, options);
        kahlua
            .use_plugin(identifier, options)
            .with_context(|| format!("Failed to load plugin {}", identifier))?;
    }
    Ok(())
}

/// Split `name=json` into the identifier and its options.
fn parse_plugin_arg(spec: &str) -> Result<(&str, Value)> {
    match spec.split_once('=') {
        Some((identifier, options)) => {
            let options = serde_json::from_str(options)
                .with_context(|| format!("Invalid JSON options for plugin {}", identifier))?;
            Ok((identifier, options))
        }
        None => Ok((spec, Value::Null)),
    }
}
