//! Serialization of the finished document.

use crate::document::Document;
use crate::{KahluaError, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::str::FromStr;

/// Textual format of the generated document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = KahluaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(KahluaError::Configuration(format!("unknown output format '{}'", other))),
        }
    }
}

/// Render a document, keeping section and key order as constructed.
pub fn render(document: &Document, format: OutputFormat, indent: usize) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let indent = vec![b' '; indent];
            let formatter = PrettyFormatter::with_indent(&indent);
            let mut serializer = serde_json::Serializer::with_formatter(Vec::new(), formatter);
            document.serialize(&mut serializer)?;
            String::from_utf8(serializer.into_inner())
                .map_err(|e| {
                    KahluaError::Configuration(format!("rendered document is not UTF-8: {}", e))
                })
        }
        OutputFormat::Yaml => Ok(serde_yaml_ng::to_string(document)?),
    }
}
