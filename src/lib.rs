//! Notebook Interop SDK - import/export of notebook content
//!
//! Provides unified interfaces for:
//! - Module registry of importers and exporters (built-in and registered)
//! - Resolution of a format name to a converter instance
//! - Import and export pipelines over an item store
//! - Built-in formats: JEX archives, raw directories, Markdown (with or
//!   without front matter) and ENEX import
//!
//! The entry point is [`InteropService`]:
//!
//! ```no_run
//! use notebook_interop_sdk::{InteropService, MemoryStore};
//! use notebook_interop_sdk::models::{ExportOptions, ImportOptions};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), notebook_interop_sdk::InteropError> {
//! let service = InteropService::new(Arc::new(MemoryStore::new("/tmp/resources")));
//! let imported = service.import(ImportOptions::new("notes/todo.md")).await?;
//! assert!(imported.is_clean());
//! let result = service.export(ExportOptions::new("backup.jex")).await?;
//! for warning in &result.warnings {
//!     eprintln!("{}", warning);
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod formats;
pub mod import;
pub mod models;
pub mod registry;
pub mod resolver;
pub mod service;
pub mod storage;
pub mod store;

pub use config::InteropConfig;
pub use error::{InteropError, InteropResult};
pub use export::{ExportContext, ExportError, ExportQueueItem, Exporter};
pub use import::{ImportError, Importer};
pub use registry::{ModuleRegistry, RegistryEvent};
pub use resolver::{Converter, ConverterTable, ModuleMetadata, ModuleResolver};
pub use service::InteropService;
pub use storage::{LocalStorageBackend, StorageBackend, StorageError};
pub use store::{ItemStore, MemoryStore, StoreError};

// Re-export models
pub use models::{
    Attachment, Container, Document, ExportOptions, ImportExportResult, ImportOptions, Item,
    ItemId, ItemType, Label, LabelAssignment, ModuleDescriptor, ModuleOptions, ModuleType,
    OutputFormat,
};
