//! Import pipeline
//!
//! One straight pass: check the source exists, pick the format, load the
//! destination container, resolve the importer, `init`, `exec`.

use crate::error::{InteropError, InteropResult};
use crate::models::{ImportExportResult, ImportOptions, ModuleType, RunOptions};
use crate::service::InteropService;
use std::path::Path;
use tracing::info;

/// Lowercase extension of `path`, empty when there is none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

impl InteropService {
    /// Import `options.path` into the store
    pub async fn import(&self, mut options: ImportOptions) -> InteropResult<ImportExportResult> {
        if !self.storage().exists(&options.path).await? {
            return Err(InteropError::SourceNotFound(options.path.clone()));
        }

        if options.is_auto_format() {
            let extension = extension_of(&options.path);
            let module = self
                .resolver()
                .module_by_file_extension(ModuleType::Importer, &extension)
                .ok_or_else(|| InteropError::FormatUnspecified(options.path.clone()))?;
            options.format = module.format;
        }

        if let Some(container_id) = options.destination_container_id.clone() {
            let container = self
                .store()
                .load_container(&container_id)
                .await?
                .ok_or(InteropError::DestinationNotFound(container_id))?;
            options.destination_container = Some(container);
        }

        info!(
            "Importing {} as \"{}\"",
            options.path.display(),
            options.format
        );

        let converter = if options.implementation_override.is_some() {
            self.resolver()
                .resolve_by_path(ModuleType::Importer, &RunOptions::Import(options.clone()))?
        } else {
            self.resolver().resolve_by_format(
                ModuleType::Importer,
                &options.format,
                options.output_format,
            )?
        };
        let mut importer = converter.into_importer()?;

        importer.init(&options.path, &options).await?;
        let result = importer
            .exec(ImportExportResult::new(), self.store())
            .await?;

        info!(
            "Imported {} with {} warnings",
            options.path.display(),
            result.warnings.len()
        );

        Ok(result)
    }
}
