//! Fatal error type for import/export runs
//!
//! Anything that aborts a run before or outside per-item dispatch ends up here.
//! Per-item problems during an export are recorded as warnings instead.

use crate::export::ExportError;
use crate::import::ImportError;
use crate::storage::StorageError;
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Error that aborts an import or export run
#[derive(Error, Debug)]
pub enum InteropError {
    #[error("Cannot load \"{module_type}\" module for format \"{format}\" ({discriminator})")]
    ModuleNotFound {
        module_type: String,
        format: String,
        discriminator: String,
    },

    #[error("Cannot find \"{}\"", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Please specify import format for {}", .0.display())]
    FormatUnspecified(PathBuf),

    #[error("Cannot find destination container \"{0}\"")]
    DestinationNotFound(String),

    #[error("Failed to instantiate converter: {0}")]
    InstantiationFailed(String),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for pipeline operations
pub type InteropResult<T> = Result<T, InteropError>;
