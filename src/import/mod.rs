//! Import functionality
//!
//! Defines the importer lifecycle every import module implements and the
//! single-pass import pipeline ([`crate::InteropService::import`]).
//!
//! Built-in importers live in [`crate::formats`]:
//! - JEX (tar archive of the raw layout)
//! - Raw (directory with one JSON file per item)
//! - Markdown, with or without YAML front matter
//! - ENEX (Evernote export), as Markdown or HTML

pub mod pipeline;

use crate::models::{ImportExportResult, ImportOptions};
use crate::resolver::ModuleMetadata;
use crate::store::{ItemStore, StoreError};
use async_trait::async_trait;
use std::path::Path;

/// Error raised by an importer implementation
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Importer used before init()")]
    NotInitialized,
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::IoError(err.to_string())
    }
}

/// Lifecycle of an import module.
///
/// The pipeline calls `set_metadata`, then `init`, then `exec` exactly once.
#[async_trait]
pub trait Importer: Send {
    /// Receive the descriptor this instance was resolved from
    fn set_metadata(&mut self, metadata: ModuleMetadata);

    /// Prepare to read from `source_path`
    async fn init(&mut self, source_path: &Path, options: &ImportOptions)
    -> Result<(), ImportError>;

    /// Import everything into `store`, appending warnings to `result`
    async fn exec(
        &mut self,
        result: ImportExportResult,
        store: &dyn ItemStore,
    ) -> Result<ImportExportResult, ImportError>;
}
