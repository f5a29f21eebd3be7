// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiler configuration and artifact encoding.

use crate::graph::Graph;
use ordoplay_animgraph_runtime::GraphDefinition;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Encoding of the compiled definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human readable RON
    #[default]
    Ron,
    /// Compact bincode bytes
    Bincode,
}

impl OutputFormat {
    /// File extension for artifacts in this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ron => "ron",
            Self::Bincode => "bin",
        }
    }
}

/// Settings of the `animgraph_compile` tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Artifact encoding
    pub output_format: OutputFormat,
    /// Print the compiled node table after compiling
    pub print_node_table: bool,
    /// Pretty-print RON artifacts
    pub pretty: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Ron,
            print_node_table: false,
            pretty: true,
        }
    }
}

impl CompilerConfig {
    /// Load the configuration from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }

    /// Save the configuration to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Encode a compiled definition
    pub fn encode_definition(&self, definition: &GraphDefinition) -> Result<Vec<u8>, ConfigError> {
        match self.output_format {
            OutputFormat::Ron => {
                let content = if self.pretty {
                    ron::ser::to_string_pretty(definition, ron::ser::PrettyConfig::default())?
                } else {
                    ron::to_string(definition)?
                };
                Ok(content.into_bytes())
            }
            OutputFormat::Bincode => Ok(bincode::serialize(definition)?),
        }
    }
}

/// Load an authoring graph from a RON file
pub fn load_graph(path: &Path) -> Result<Graph, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(ron::from_str(&content)?)
}

/// Save an authoring graph to a RON file
pub fn save_graph(graph: &Graph, path: &Path) -> Result<(), ConfigError> {
    let content = ron::ser::to_string_pretty(graph, ron::ser::PrettyConfig::default())?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Error when reading or writing tool files
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// RON text could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Value could not be written as RON
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Value could not be written as bincode
    #[error("Binary encoding error: {0}")]
    Bincode(#[from] bincode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: CompilerConfig = ron::from_str("(output_format: Bincode)").unwrap();
        assert_eq!(config.output_format, OutputFormat::Bincode);
        assert!(config.pretty);
        assert!(!config.print_node_table);
    }

    #[test]
    fn test_config_file_round_trip() {
        let path = std::env::temp_dir().join(format!("animgraph_compile_{}.ron", uuid::Uuid::new_v4()));
        let config = CompilerConfig {
            output_format: OutputFormat::Bincode,
            print_node_table: true,
            pretty: false,
        };

        config.save(&path).unwrap();
        let loaded = CompilerConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
