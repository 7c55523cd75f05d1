//! Export functionality
//!
//! Defines the exporter lifecycle, the export queue, and the shared export
//! context. The pipeline itself ([`crate::InteropService::export`]) collects
//! the items to export and dispatches them type by type.
//!
//! Built-in exporters live in [`crate::formats`]:
//! - JEX (tar archive of the raw layout)
//! - Raw (directory with one JSON file per item)
//! - Markdown, with or without YAML front matter

pub mod pipeline;
pub mod queue;

use crate::models::{Attachment, ExportOptions, Item, ItemId, ItemRef, ItemType};
use crate::resolver::ModuleMetadata;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use pipeline::dispatch_export;
pub use queue::collect_export_queue;

/// Error raised by an exporter implementation
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Export error: {0}")]
    ExportError(String),
    #[error("Exporter used before init()")]
    NotInitialized,
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::SerializationError(err.to_string())
    }
}

/// One entry of the export queue
#[derive(Debug, Clone, PartialEq)]
pub struct ExportQueueItem {
    pub item_type: ItemType,
    pub item: ItemRef,
}

impl ExportQueueItem {
    pub fn by_id(item_type: ItemType, id: impl Into<ItemId>) -> Self {
        Self {
            item_type,
            item: ItemRef::Id(id.into()),
        }
    }

    pub fn loaded(item: Item) -> Self {
        Self {
            item_type: item.item_type(),
            item: ItemRef::Loaded(Box::new(item)),
        }
    }

    pub fn id(&self) -> &str {
        self.item.id()
    }
}

/// State shared between the pipeline and the exporter during one run.
///
/// The pipeline records the payload path of every attachment it dispatches;
/// exporters may read it and add their own entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportContext {
    pub resource_paths: BTreeMap<ItemId, PathBuf>,
}

/// Lifecycle of an export module.
///
/// Call order for one run: `set_metadata`, `init`, then for each item type in
/// [`ItemType::EXPORT_ORDER`]: `prepare_for_processing_item_type` once,
/// followed by `update_context` + `process_resource` (attachments only) and
/// `process_item` per entry. `close` is called once at the end.
#[async_trait]
pub trait Exporter: Send {
    fn set_metadata(&mut self, metadata: ModuleMetadata);

    async fn init(&mut self, target_path: &Path, options: &ExportOptions)
    -> Result<(), ExportError>;

    /// Called once per item type with the whole queue, before any entry of
    /// that type is processed
    async fn prepare_for_processing_item_type(
        &mut self,
        _item_type: ItemType,
        _queue: &[ExportQueueItem],
    ) -> Result<(), ExportError> {
        Ok(())
    }

    fn update_context(&mut self, _context: &mut ExportContext) {}

    async fn process_resource(
        &mut self,
        _attachment: &Attachment,
        _payload_path: &Path,
    ) -> Result<(), ExportError> {
        Ok(())
    }

    async fn process_item(&mut self, item_type: ItemType, item: &Item) -> Result<(), ExportError>;

    async fn close(&mut self) -> Result<(), ExportError> {
        Ok(())
    }
}
