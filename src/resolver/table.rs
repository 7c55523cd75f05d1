//! Static table of converter implementations
//!
//! Maps implementation names to constructors. The table is filled once at
//! startup; registering a descriptor whose computed name has no entry here
//! fails at instantiation time with `InstantiationFailed`.

use super::Converter;
use crate::error::{InteropError, InteropResult};
use crate::formats::{enex, jex, markdown, raw};
use crate::models::ModuleType;
use std::collections::BTreeMap;

/// Zero-argument constructor stored in the table
pub type ConverterConstructor = fn() -> Converter;

/// Implementation name computed from module type and format.
///
/// The format is title-cased per `_`/`-` separated segment and prefixed by the
/// type: `("importer", "md_frontmatter")` gives `ImporterMdFrontmatter`.
pub fn implementation_name(module_type: ModuleType, format: &str) -> String {
    let mut name = String::from(module_type.class_prefix());
    for segment in format.split(['_', '-']).filter(|s| !s.is_empty()) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(&chars.as_str().to_lowercase());
        }
    }
    name
}

/// Name -> constructor table
#[derive(Debug, Clone, Default)]
pub struct ConverterTable {
    constructors: BTreeMap<String, ConverterConstructor>,
}

impl ConverterTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding every converter shipped with the SDK
    pub fn with_builtin_converters() -> Self {
        let mut table = Self::new();
        table.register("ExporterRaw", || Converter::exporter(raw::RawExporter::new()));
        table.register("ExporterJex", || Converter::exporter(jex::JexExporter::new()));
        table.register("ExporterMd", || {
            Converter::exporter(markdown::MarkdownExporter::new())
        });
        table.register("ExporterMdFrontmatter", || {
            Converter::exporter(markdown::MarkdownExporter::with_front_matter())
        });
        table.register("ImporterRaw", || Converter::importer(raw::RawImporter::new()));
        table.register("ImporterJex", || Converter::importer(jex::JexImporter::new()));
        table.register("ImporterMd", || {
            Converter::importer(markdown::MarkdownImporter::new())
        });
        table.register("ImporterMdFrontmatter", || {
            Converter::importer(markdown::MarkdownImporter::with_front_matter())
        });
        table.register("ImporterEnexToMd", || {
            Converter::importer(enex::EnexImporter::markdown())
        });
        table.register("ImporterEnexToHtml", || {
            Converter::importer(enex::EnexImporter::html())
        });
        table
    }

    /// Add or replace an implementation
    pub fn register(&mut self, name: impl Into<String>, constructor: ConverterConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered implementation names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Build a fresh instance of the named implementation
    pub fn construct(&self, name: &str) -> InteropResult<Converter> {
        let constructor = self.constructors.get(name).ok_or_else(|| {
            InteropError::InstantiationFailed(format!(
                "no converter implementation named \"{}\"",
                name
            ))
        })?;
        Ok(constructor())
    }
}
