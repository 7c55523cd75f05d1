//! Configuration file support
//!
//! Handles parsing of `.interop.toml` configuration files and
//! environment variable overrides.

use crate::error::{InteropError, InteropResult};
use crate::models::{AUTO_FORMAT, DEFAULT_EXPORT_FORMAT, ModuleOptions};
use crate::registry::ModuleRegistry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".interop.toml";

/// Environment variable for the default import format
pub const ENV_IMPORT_FORMAT: &str = "INTEROP_IMPORT_FORMAT";

/// Environment variable for the default export format
pub const ENV_EXPORT_FORMAT: &str = "INTEROP_EXPORT_FORMAT";

/// Import configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSection {
    /// Format used when the caller does not name one
    #[serde(default = "default_import_format")]
    pub default_format: String,
}

fn default_import_format() -> String {
    AUTO_FORMAT.to_string()
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            default_format: default_import_format(),
        }
    }
}

/// Export configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSection {
    /// Format used when the caller does not name one
    #[serde(default = "default_export_format")]
    pub default_format: String,
}

fn default_export_format() -> String {
    DEFAULT_EXPORT_FORMAT.to_string()
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            default_format: default_export_format(),
        }
    }
}

/// Main configuration structure
///
/// Represents the `.interop.toml` configuration file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteropConfig {
    #[serde(default)]
    pub import: ImportSection,

    #[serde(default)]
    pub export: ExportSection,

    /// Modules registered on top of the built-in ones, in file order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleOptions>,
}

impl InteropConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a workspace directory
    ///
    /// Looks for `.interop.toml` in the workspace directory.
    /// Falls back to defaults if not found.
    pub fn load(workspace_path: &Path) -> InteropResult<Self> {
        let config_path = workspace_path.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| InteropError::Config(format!("Failed to read config: {}", e)))?;

            Self::parse(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> InteropResult<Self> {
        toml::from_str(content)
            .map_err(|e| InteropError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a workspace directory
    pub fn save(&self, workspace_path: &Path) -> InteropResult<()> {
        let config_path = workspace_path.join(CONFIG_FILENAME);
        let content = self.to_toml()?;

        std::fs::write(&config_path, content)
            .map_err(|e| InteropError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> InteropResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| InteropError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(format) = std::env::var(ENV_IMPORT_FORMAT)
            && !format.trim().is_empty()
        {
            self.import.default_format = format.trim().to_string();
        }

        if let Ok(format) = std::env::var(ENV_EXPORT_FORMAT)
            && !format.trim().is_empty()
        {
            self.export.default_format = format.trim().to_string();
        }
    }

    /// Register every `[[modules]]` entry on `registry`, in file order
    pub fn register_modules(&self, registry: &ModuleRegistry) {
        for module in &self.modules {
            debug!(
                "Registering configured {} \"{}\"",
                module.module_type, module.format
            );
            registry.register_module(module.clone());
        }
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Notebook Interop SDK Configuration

[import]
# Format used when none is given: "auto" picks one from the file extension
default_format = "auto"

[export]
# Format used when none is given
default_format = "jex"

# Extra modules, registered after the built-in ones.
# "implementation" names an entry of the converter table.
[[modules]]
type = "exporter"
format = "notes_dump"
description = "Raw dump under another name"
target = "directory"
implementation = "ExporterRaw"
is_default = false

[[modules]]
type = "importer"
format = "notes_dump"
file_extensions = ["dump"]
sources = ["directory"]
implementation = "ImporterRaw"
"#
}
