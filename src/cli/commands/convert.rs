//! `convert` command: import a source into a scratch store, export it again

use crate::cli::error::CliError;
use crate::config::InteropConfig;
use crate::models::{ExportOptions, ImportExportResult, ImportOptions, OutputFormat};
use crate::service::InteropService;
use crate::store::MemoryStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

/// Arguments for a conversion run
#[derive(Debug, Clone)]
pub struct ConvertArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Import format; the configured default (usually "auto") when unset
    pub from: Option<String>,
    /// Export format; the configured default (usually "jex") when unset
    pub to: Option<String>,
    /// Body format requested from the importer
    pub output_format: Option<OutputFormat>,
    /// Directory for attachment payloads; a temporary one is used when unset
    pub workdir: Option<PathBuf>,
    /// Directory holding `.interop.toml`
    pub config_dir: Option<PathBuf>,
}

/// Work directory for a run: `workdir` when given, else a temporary one that
/// is removed when the returned guard drops
async fn work_dir(workdir: Option<&Path>) -> Result<(PathBuf, Option<TempDir>), CliError> {
    match workdir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| CliError::IoError(format!("Cannot create {}: {}", dir.display(), e)))?;
            Ok((dir.to_path_buf(), None))
        }
        None => {
            let scratch = tempfile::Builder::new()
                .prefix("interop-")
                .tempdir()
                .map_err(|e| CliError::IoError(format!("Cannot create work directory: {}", e)))?;
            debug!("Using scratch work directory {}", scratch.path().display());
            Ok((scratch.path().to_path_buf(), Some(scratch)))
        }
    }
}

/// Handle the convert command
pub async fn handle_convert(args: &ConvertArgs) -> Result<ImportExportResult, CliError> {
    if !args.input.exists() {
        return Err(CliError::FileNotFound(args.input.clone()));
    }
    if args.input == args.output {
        return Err(CliError::InvalidArgument(
            "input and output must be different paths".to_string(),
        ));
    }

    let config_dir = args.config_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let config = InteropConfig::load(&config_dir)?;

    let (workdir, _scratch) = work_dir(args.workdir.as_deref()).await?;

    let store = Arc::new(MemoryStore::new(workdir.join("resources")));
    let service = InteropService::from_config(store, &config);

    let mut import = ImportOptions::new(&args.input).with_format(
        args.from
            .clone()
            .unwrap_or_else(|| config.import.default_format.clone()),
    );
    if let Some(output_format) = args.output_format {
        import = import.with_output_format(output_format);
    }
    let mut result = service.import(import).await?;

    let export = ExportOptions::new(&args.output).with_format(
        args.to
            .clone()
            .unwrap_or_else(|| config.export.default_format.clone()),
    );
    let exported = service.export(export).await?;
    result.warnings.extend(exported.warnings);

    info!(
        "Converted {} to {}",
        args.input.display(),
        args.output.display()
    );
    Ok(result)
}
