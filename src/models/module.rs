//! Converter module descriptors
//!
//! A descriptor states what a converter module can do (type, format, file
//! extensions, location kind, output format) and how to build it. Descriptors
//! are created from [`ModuleOptions`] merged over per-type defaults.

use crate::error::InteropError;
use crate::resolver::Converter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Direction of a converter module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    Importer,
    Exporter,
}

impl ModuleType {
    /// Prefix used when computing implementation names
    pub fn class_prefix(&self) -> &'static str {
        match self {
            ModuleType::Importer => "Importer",
            ModuleType::Exporter => "Exporter",
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleType::Importer => write!(f, "importer"),
            ModuleType::Exporter => write!(f, "exporter"),
        }
    }
}

/// Kind of location a module reads from or writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSystemItem {
    File,
    Directory,
}

impl fmt::Display for FileSystemItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemItem::File => write!(f, "file"),
            FileSystemItem::Directory => write!(f, "directory"),
        }
    }
}

impl std::str::FromStr for FileSystemItem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(FileSystemItem::File),
            "directory" | "dir" => Ok(FileSystemItem::Directory),
            _ => Err(format!(
                "Unknown location kind: {}. Use 'file' or 'directory'.",
                s
            )),
        }
    }
}

/// Body format an importer produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "md")]
    Markdown,
    #[serde(rename = "html")]
    Html,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Markdown => write!(f, "md"),
            OutputFormat::Html => write!(f, "html"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            _ => Err(format!("Unknown output format: {}. Use 'md' or 'html'.", s)),
        }
    }
}

/// Zero-argument constructor for a custom converter
pub type InstanceFactory = Arc<dyn Fn() -> Result<Converter, InteropError> + Send + Sync>;

/// Full description of one converter module
#[derive(Clone)]
pub struct ModuleDescriptor {
    pub module_type: ModuleType,
    pub format: String,
    pub description: String,
    /// Lowercase extensions without the leading dot (importer sniffing only)
    pub file_extensions: Vec<String>,
    /// Location kinds an importer accepts
    pub sources: Vec<FileSystemItem>,
    /// Location kind an exporter writes
    pub target: Option<FileSystemItem>,
    pub output_format: OutputFormat,
    pub is_default: bool,
    /// Advisory: whether the exporter handles more than one document at once
    pub can_do_multi_export: bool,
    /// Implementation name to use instead of the computed one
    pub implementation_override: Option<String>,
    pub instance_factory: Option<InstanceFactory>,
}

impl ModuleDescriptor {
    /// Defaults for a module of the given type
    pub fn defaults(module_type: ModuleType) -> Self {
        match module_type {
            ModuleType::Importer => Self {
                module_type,
                format: String::new(),
                description: String::new(),
                file_extensions: Vec::new(),
                sources: vec![FileSystemItem::File],
                target: None,
                output_format: OutputFormat::Markdown,
                is_default: false,
                can_do_multi_export: false,
                implementation_override: None,
                instance_factory: None,
            },
            ModuleType::Exporter => Self {
                module_type,
                format: String::new(),
                description: String::new(),
                file_extensions: Vec::new(),
                sources: Vec::new(),
                target: Some(FileSystemItem::File),
                output_format: OutputFormat::Markdown,
                is_default: false,
                can_do_multi_export: true,
                implementation_override: None,
                instance_factory: None,
            },
        }
    }

    /// Whether this module reads from / writes to the given location kind
    pub fn handles_location(&self, kind: FileSystemItem) -> bool {
        self.target == Some(kind) || self.sources.contains(&kind)
    }

    /// Case-insensitive extension check; a leading dot is ignored
    pub fn has_file_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.file_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Whether two descriptors compete for the same `isDefault` slot
    pub(crate) fn same_group(&self, other: &ModuleDescriptor) -> bool {
        self.module_type == other.module_type
            && self.format == other.format
            && self.target == other.target
            && self.sources == other.sources
            && self.output_format == other.output_format
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("module_type", &self.module_type)
            .field("format", &self.format)
            .field("description", &self.description)
            .field("file_extensions", &self.file_extensions)
            .field("sources", &self.sources)
            .field("target", &self.target)
            .field("output_format", &self.output_format)
            .field("is_default", &self.is_default)
            .field("can_do_multi_export", &self.can_do_multi_export)
            .field("implementation_override", &self.implementation_override)
            .field(
                "instance_factory",
                &self.instance_factory.as_ref().map(|_| "<factory>"),
            )
            .finish()
    }
}

/// Caller-supplied module fields; unset fields fall back to the type defaults
#[derive(Clone, Serialize, Deserialize)]
pub struct ModuleOptions {
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<FileSystemItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<FileSystemItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_do_multi_export: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
    #[serde(skip)]
    pub instance_factory: Option<InstanceFactory>,
}

impl ModuleOptions {
    pub fn new(module_type: ModuleType, format: impl Into<String>) -> Self {
        Self {
            module_type,
            format: format.into(),
            description: None,
            file_extensions: None,
            sources: None,
            target: None,
            output_format: None,
            is_default: None,
            can_do_multi_export: None,
            implementation: None,
            instance_factory: None,
        }
    }

    pub fn importer(format: impl Into<String>) -> Self {
        Self::new(ModuleType::Importer, format)
    }

    pub fn exporter(format: impl Into<String>) -> Self {
        Self::new(ModuleType::Exporter, format)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn file_extensions(mut self, extensions: &[&str]) -> Self {
        self.file_extensions = Some(extensions.iter().map(|e| e.to_string()).collect());
        self
    }

    pub fn sources(mut self, sources: &[FileSystemItem]) -> Self {
        self.sources = Some(sources.to_vec());
        self
    }

    pub fn target(mut self, target: FileSystemItem) -> Self {
        self.target = Some(target);
        self
    }

    pub fn output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = Some(output_format);
        self
    }

    pub fn is_default(mut self, is_default: bool) -> Self {
        self.is_default = Some(is_default);
        self
    }

    pub fn can_do_multi_export(mut self, value: bool) -> Self {
        self.can_do_multi_export = Some(value);
        self
    }

    pub fn implementation(mut self, name: impl Into<String>) -> Self {
        self.implementation = Some(name.into());
        self
    }

    pub fn instance_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Converter, InteropError> + Send + Sync + 'static,
    {
        self.instance_factory = Some(Arc::new(factory));
        self
    }

    /// Merge these options over the defaults of their module type
    pub fn into_descriptor(self) -> ModuleDescriptor {
        let defaults = ModuleDescriptor::defaults(self.module_type);
        ModuleDescriptor {
            module_type: self.module_type,
            format: self.format,
            description: self.description.unwrap_or(defaults.description),
            file_extensions: self
                .file_extensions
                .map(|exts| {
                    exts.into_iter()
                        .map(|e| e.trim_start_matches('.').to_lowercase())
                        .collect()
                })
                .unwrap_or(defaults.file_extensions),
            sources: self.sources.unwrap_or(defaults.sources),
            target: self.target.or(defaults.target),
            output_format: self.output_format.unwrap_or(defaults.output_format),
            is_default: self.is_default.unwrap_or(defaults.is_default),
            can_do_multi_export: self
                .can_do_multi_export
                .unwrap_or(defaults.can_do_multi_export),
            implementation_override: self.implementation.or(defaults.implementation_override),
            instance_factory: self.instance_factory.or(defaults.instance_factory),
        }
    }
}

impl fmt::Debug for ModuleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleOptions")
            .field("module_type", &self.module_type)
            .field("format", &self.format)
            .field("file_extensions", &self.file_extensions)
            .field("sources", &self.sources)
            .field("target", &self.target)
            .field("output_format", &self.output_format)
            .field("is_default", &self.is_default)
            .field("implementation", &self.implementation)
            .finish_non_exhaustive()
    }
}

/// Discriminator used when several modules share a `(type, format)` pair.
///
/// A lookup uses either the location kind or the output format, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleMatch {
    /// Every module with the requested type and format is a candidate
    #[default]
    Any,
    /// Keep modules whose target or sources include this location kind
    Target(FileSystemItem),
    /// Keep modules producing this output format
    OutputFormat(OutputFormat),
}

impl ModuleMatch {
    pub fn accepts(&self, descriptor: &ModuleDescriptor) -> bool {
        match self {
            ModuleMatch::Any => true,
            ModuleMatch::Target(kind) => descriptor.handles_location(*kind),
            ModuleMatch::OutputFormat(format) => descriptor.output_format == *format,
        }
    }
}

impl fmt::Display for ModuleMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleMatch::Any => write!(f, "any target"),
            ModuleMatch::Target(kind) => write!(f, "target \"{}\"", kind),
            ModuleMatch::OutputFormat(format) => write!(f, "output \"{}\"", format),
        }
    }
}
