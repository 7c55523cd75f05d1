//! Converter resolution
//!
//! Turns a module descriptor into a live converter. A descriptor is built
//! either by its own instance factory, by an explicit implementation name, or
//! by the name computed from its type and format (`ImporterMd`,
//! `ExporterMdFrontmatter`, ...), looked up in a [`ConverterTable`].

pub mod table;

use crate::error::{InteropError, InteropResult};
use crate::export::Exporter;
use crate::import::Importer;
use crate::models::{ModuleDescriptor, ModuleMatch, ModuleType, OutputFormat, RunOptions};
use crate::registry::ModuleRegistry;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub use table::{ConverterConstructor, ConverterTable, implementation_name};

/// Descriptor handed to a converter through `set_metadata`, together with
/// the run options when it was resolved from them
#[derive(Debug, Clone)]
pub struct ModuleMetadata {
    pub descriptor: ModuleDescriptor,
    pub options: Option<RunOptions>,
}

/// A live converter instance
pub enum Converter {
    Importer(Box<dyn Importer>),
    Exporter(Box<dyn Exporter>),
}

impl Converter {
    pub fn importer(importer: impl Importer + 'static) -> Self {
        Converter::Importer(Box::new(importer))
    }

    pub fn exporter(exporter: impl Exporter + 'static) -> Self {
        Converter::Exporter(Box::new(exporter))
    }

    pub fn module_type(&self) -> ModuleType {
        match self {
            Converter::Importer(_) => ModuleType::Importer,
            Converter::Exporter(_) => ModuleType::Exporter,
        }
    }

    pub fn set_metadata(&mut self, metadata: ModuleMetadata) {
        match self {
            Converter::Importer(importer) => importer.set_metadata(metadata),
            Converter::Exporter(exporter) => exporter.set_metadata(metadata),
        }
    }

    pub fn into_importer(self) -> InteropResult<Box<dyn Importer>> {
        match self {
            Converter::Importer(importer) => Ok(importer),
            Converter::Exporter(_) => Err(InteropError::InstantiationFailed(
                "expected an importer, got an exporter".to_string(),
            )),
        }
    }

    pub fn into_exporter(self) -> InteropResult<Box<dyn Exporter>> {
        match self {
            Converter::Exporter(exporter) => Ok(exporter),
            Converter::Importer(_) => Err(InteropError::InstantiationFailed(
                "expected an exporter, got an importer".to_string(),
            )),
        }
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Converter::Importer(_) => write!(f, "Converter::Importer(..)"),
            Converter::Exporter(_) => write!(f, "Converter::Exporter(..)"),
        }
    }
}

/// Resolves descriptors from a registry into converter instances
pub struct ModuleResolver {
    registry: Arc<ModuleRegistry>,
    table: ConverterTable,
}

impl ModuleResolver {
    pub fn new(registry: Arc<ModuleRegistry>, table: ConverterTable) -> Self {
        Self { registry, table }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn table(&self) -> &ConverterTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut ConverterTable {
        &mut self.table
    }

    /// Resolve by `(type, format)`, disambiguated by output format only.
    ///
    /// `None` means the default output format (Markdown).
    pub fn resolve_by_format(
        &self,
        module_type: ModuleType,
        format: &str,
        output_format: Option<OutputFormat>,
    ) -> InteropResult<Converter> {
        let discriminator = ModuleMatch::OutputFormat(output_format.unwrap_or_default());
        let descriptor = self
            .registry
            .find_module_by_format(module_type, format, discriminator)
            .ok_or_else(|| InteropError::ModuleNotFound {
                module_type: module_type.to_string(),
                format: format.to_string(),
                discriminator: discriminator.to_string(),
            })?;

        self.instantiate(descriptor, None, None)
    }

    /// Resolve from run options, disambiguated by target location kind only.
    ///
    /// An implementation override in `options` replaces the computed name, but
    /// the converter still receives the matched descriptor as metadata.
    pub fn resolve_by_path(
        &self,
        module_type: ModuleType,
        options: &RunOptions,
    ) -> InteropResult<Converter> {
        let discriminator = options.module_match();
        let descriptor = self
            .registry
            .find_module_by_format(module_type, options.format(), discriminator)
            .ok_or_else(|| InteropError::ModuleNotFound {
                module_type: module_type.to_string(),
                format: options.format().to_string(),
                discriminator: discriminator.to_string(),
            })?;

        let implementation = options.implementation_override().map(str::to_string);
        self.instantiate(descriptor, Some(options.clone()), implementation.as_deref())
    }

    /// First module of `module_type` accepting the extension (case-insensitive)
    pub fn module_by_file_extension(
        &self,
        module_type: ModuleType,
        extension: &str,
    ) -> Option<ModuleDescriptor> {
        self.registry.module_by_file_extension(module_type, extension)
    }

    fn instantiate(
        &self,
        descriptor: ModuleDescriptor,
        options: Option<RunOptions>,
        implementation: Option<&str>,
    ) -> InteropResult<Converter> {
        let mut converter = match (implementation, &descriptor.instance_factory) {
            (Some(name), _) => {
                debug!(
                    "Building {} \"{}\" from override {}",
                    descriptor.module_type, descriptor.format, name
                );
                self.table.construct(name)?
            }
            (None, Some(factory)) => {
                debug!(
                    "Building {} \"{}\" from its factory",
                    descriptor.module_type, descriptor.format
                );
                factory()?
            }
            (None, None) => {
                let name = descriptor
                    .implementation_override
                    .clone()
                    .unwrap_or_else(|| {
                        implementation_name(descriptor.module_type, &descriptor.format)
                    });
                debug!(
                    "Building {} \"{}\" as {}",
                    descriptor.module_type, descriptor.format, name
                );
                self.table.construct(&name)?
            }
        };

        if converter.module_type() != descriptor.module_type {
            return Err(InteropError::InstantiationFailed(format!(
                "module \"{}\" is declared as {} but its implementation is an {}",
                descriptor.format,
                descriptor.module_type,
                converter.module_type()
            )));
        }

        converter.set_metadata(ModuleMetadata {
            descriptor,
            options,
        });
        Ok(converter)
    }
}
