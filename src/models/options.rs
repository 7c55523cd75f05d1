//! Run options and results for import/export runs

use super::item::{Container, ItemId};
use super::module::{FileSystemItem, ModuleMatch, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Import format value that triggers extension sniffing
pub const AUTO_FORMAT: &str = "auto";

/// Default export format
pub const DEFAULT_EXPORT_FORMAT: &str = "jex";

/// Options for a single import run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Source file or directory
    pub path: PathBuf,
    /// Module format, or `"auto"` to pick one from the file extension
    pub format: String,
    /// Body format requested from the importer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    /// Location kind used when resolving by implementation override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<FileSystemItem>,
    /// Container the imported items are placed into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_container_id: Option<ItemId>,
    /// Loaded destination container, filled in by the import pipeline
    #[serde(skip)]
    pub destination_container: Option<Container>,
    /// Explicit implementation name; bypasses format-based resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_override: Option<String>,
}

impl ImportOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: AUTO_FORMAT.to_string(),
            output_format: None,
            target: None,
            destination_container_id: None,
            destination_container: None,
            implementation_override: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = Some(output_format);
        self
    }

    pub fn with_destination(mut self, container_id: impl Into<ItemId>) -> Self {
        self.destination_container_id = Some(container_id.into());
        self
    }

    pub fn with_implementation(mut self, name: impl Into<String>) -> Self {
        self.implementation_override = Some(name.into());
        self
    }

    pub fn with_target(mut self, target: FileSystemItem) -> Self {
        self.target = Some(target);
        self
    }

    pub fn is_auto_format(&self) -> bool {
        self.format == AUTO_FORMAT
    }
}

/// Options for a single export run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Destination file or directory
    pub path: PathBuf,
    pub format: String,
    /// Export only these containers and their descendants (empty = all)
    #[serde(default)]
    pub source_container_ids: Vec<ItemId>,
    /// Export only these documents (empty = all)
    #[serde(default)]
    pub source_document_ids: Vec<ItemId>,
    /// Location kind the exporter should write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<FileSystemItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_override: Option<String>,
}

impl ExportOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: DEFAULT_EXPORT_FORMAT.to_string(),
            source_container_ids: Vec::new(),
            source_document_ids: Vec::new(),
            target: None,
            implementation_override: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_containers(mut self, ids: Vec<ItemId>) -> Self {
        self.source_container_ids = ids;
        self
    }

    pub fn with_documents(mut self, ids: Vec<ItemId>) -> Self {
        self.source_document_ids = ids;
        self
    }

    pub fn with_target(mut self, target: FileSystemItem) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_implementation(mut self, name: impl Into<String>) -> Self {
        self.implementation_override = Some(name.into());
        self
    }
}

/// Options of either run kind, as handed to path-based resolution and to
/// converters through their metadata
#[derive(Debug, Clone, PartialEq)]
pub enum RunOptions {
    Import(ImportOptions),
    Export(ExportOptions),
}

impl RunOptions {
    pub fn path(&self) -> &Path {
        match self {
            RunOptions::Import(o) => &o.path,
            RunOptions::Export(o) => &o.path,
        }
    }

    pub fn format(&self) -> &str {
        match self {
            RunOptions::Import(o) => &o.format,
            RunOptions::Export(o) => &o.format,
        }
    }

    pub fn implementation_override(&self) -> Option<&str> {
        match self {
            RunOptions::Import(o) => o.implementation_override.as_deref(),
            RunOptions::Export(o) => o.implementation_override.as_deref(),
        }
    }

    /// Discriminator for descriptor lookup: the target kind if one was given
    pub fn module_match(&self) -> ModuleMatch {
        let target = match self {
            RunOptions::Import(o) => o.target,
            RunOptions::Export(o) => o.target,
        };
        target.map(ModuleMatch::Target).unwrap_or_default()
    }
}

/// Outcome of a completed run.
///
/// An empty warning list means full success. Warnings are only ever appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[must_use = "run results carry warnings about skipped items"]
pub struct ImportExportResult {
    pub warnings: Vec<String>,
}

impl ImportExportResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
