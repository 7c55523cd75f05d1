//! Item store abstraction
//!
//! The store owns the notebook items. Export runs read through it; importers
//! write into it. All operations are async so that database-backed stores can
//! implement the trait without blocking.

pub mod memory;

use crate::models::{Attachment, Container, Document, Label, LabelAssignment};
use async_trait::async_trait;
use std::path::PathBuf;

pub use memory::MemoryStore;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Referenced item does not exist
    #[error("Item not found: {0}")]
    NotFound(String),

    /// Item cannot be stored as given
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    /// Payload file could not be read or written
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Backend failure (lock poisoned, connection lost, ...)
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store interface used by the pipelines and the importers
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn load_container(&self, id: &str) -> StoreResult<Option<Container>>;

    async fn load_document(&self, id: &str) -> StoreResult<Option<Document>>;

    async fn load_attachment(&self, id: &str) -> StoreResult<Option<Attachment>>;

    async fn load_label(&self, id: &str) -> StoreResult<Option<Label>>;

    async fn load_label_assignment(&self, id: &str) -> StoreResult<Option<LabelAssignment>>;

    /// Every container, parents and children alike, in store order
    async fn all_containers(&self) -> StoreResult<Vec<Container>>;

    async fn all_labels(&self) -> StoreResult<Vec<Label>>;

    /// Documents directly inside `container_id`, in store order
    async fn documents_in_container(&self, container_id: &str) -> StoreResult<Vec<Document>>;

    /// Transitive descendants of `container_id`, excluding the container itself
    async fn descendant_container_ids(&self, container_id: &str) -> StoreResult<Vec<String>>;

    async fn all_label_assignments(&self) -> StoreResult<Vec<LabelAssignment>>;

    /// Absolute path of the attachment's payload file
    fn attachment_path(&self, attachment: &Attachment) -> PathBuf;

    async fn save_container(&self, container: Container) -> StoreResult<Container>;

    async fn save_document(&self, document: Document) -> StoreResult<Document>;

    /// Save the attachment and write its payload; `size` is updated from the payload.
    ///
    /// Attachments whose payload file name is not a plain file name are refused.
    async fn save_attachment(
        &self,
        attachment: Attachment,
        payload: &[u8],
    ) -> StoreResult<Attachment>;

    async fn save_label(&self, label: Label) -> StoreResult<Label>;

    async fn save_label_assignment(
        &self,
        assignment: LabelAssignment,
    ) -> StoreResult<LabelAssignment>;
}
