//! In-memory item store
//!
//! Keeps items in insertion order and writes attachment payloads to a
//! resource directory on disk, so exporters can copy them from a real path.

use super::{ItemStore, StoreError, StoreResult};
use crate::models::{Attachment, Container, Document, Label, LabelAssignment};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryState {
    containers: Vec<Container>,
    documents: Vec<Document>,
    attachments: Vec<Attachment>,
    labels: Vec<Label>,
    label_assignments: Vec<LabelAssignment>,
}

/// Item store backed by in-memory vectors
#[derive(Debug)]
pub struct MemoryStore {
    resource_dir: PathBuf,
    state: RwLock<MemoryState>,
}

/// Replace the element with the same id, or append
fn upsert<T: Clone>(items: &mut Vec<T>, item: T, id_of: impl Fn(&T) -> &str) -> T {
    let id = id_of(&item).to_string();
    match items.iter_mut().find(|existing| id_of(existing) == id) {
        Some(existing) => *existing = item.clone(),
        None => items.push(item.clone()),
    }
    item
}

impl MemoryStore {
    /// Create an empty store whose attachment payloads live in `resource_dir`
    pub fn new(resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            resource_dir: resource_dir.into(),
            state: RwLock::new(MemoryState::default()),
        }
    }

    pub fn resource_dir(&self) -> &Path {
        &self.resource_dir
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|e| StoreError::BackendError(format!("Store lock poisoned: {}", e)))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|e| StoreError::BackendError(format!("Store lock poisoned: {}", e)))
    }

    /// Number of documents currently held
    pub fn document_count(&self) -> usize {
        self.read().map(|s| s.documents.len()).unwrap_or(0)
    }

    /// All documents in insertion order
    pub fn documents(&self) -> StoreResult<Vec<Document>> {
        Ok(self.read()?.documents.clone())
    }

    /// All attachments in insertion order
    pub fn attachments(&self) -> StoreResult<Vec<Attachment>> {
        Ok(self.read()?.attachments.clone())
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn load_container(&self, id: &str) -> StoreResult<Option<Container>> {
        Ok(self.read()?.containers.iter().find(|c| c.id == id).cloned())
    }

    async fn load_document(&self, id: &str) -> StoreResult<Option<Document>> {
        Ok(self.read()?.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn load_attachment(&self, id: &str) -> StoreResult<Option<Attachment>> {
        Ok(self.read()?.attachments.iter().find(|a| a.id == id).cloned())
    }

    async fn load_label(&self, id: &str) -> StoreResult<Option<Label>> {
        Ok(self.read()?.labels.iter().find(|l| l.id == id).cloned())
    }

    async fn load_label_assignment(&self, id: &str) -> StoreResult<Option<LabelAssignment>> {
        Ok(self
            .read()?
            .label_assignments
            .iter()
            .find(|la| la.id == id)
            .cloned())
    }

    async fn all_containers(&self) -> StoreResult<Vec<Container>> {
        Ok(self.read()?.containers.clone())
    }

    async fn all_labels(&self) -> StoreResult<Vec<Label>> {
        Ok(self.read()?.labels.clone())
    }

    async fn documents_in_container(&self, container_id: &str) -> StoreResult<Vec<Document>> {
        Ok(self
            .read()?
            .documents
            .iter()
            .filter(|d| d.parent_id == container_id)
            .cloned()
            .collect())
    }

    async fn descendant_container_ids(&self, container_id: &str) -> StoreResult<Vec<String>> {
        let state = self.read()?;
        let mut descendants: Vec<String> = Vec::new();
        let mut pending: VecDeque<String> = VecDeque::from([container_id.to_string()]);

        while let Some(parent) = pending.pop_front() {
            for child in state
                .containers
                .iter()
                .filter(|c| c.parent_id.as_deref() == Some(parent.as_str()))
            {
                // Guards against parent cycles in corrupted data
                if child.id != container_id && !descendants.contains(&child.id) {
                    descendants.push(child.id.clone());
                    pending.push_back(child.id.clone());
                }
            }
        }

        Ok(descendants)
    }

    async fn all_label_assignments(&self) -> StoreResult<Vec<LabelAssignment>> {
        Ok(self.read()?.label_assignments.clone())
    }

    fn attachment_path(&self, attachment: &Attachment) -> PathBuf {
        self.resource_dir.join(attachment.payload_file_name())
    }

    async fn save_container(&self, container: Container) -> StoreResult<Container> {
        Ok(upsert(&mut self.write()?.containers, container, |c| c.id.as_str()))
    }

    async fn save_document(&self, document: Document) -> StoreResult<Document> {
        Ok(upsert(&mut self.write()?.documents, document, |d| d.id.as_str()))
    }

    async fn save_attachment(
        &self,
        mut attachment: Attachment,
        payload: &[u8],
    ) -> StoreResult<Attachment> {
        if !attachment.has_safe_payload_name() {
            return Err(StoreError::InvalidItem(format!(
                "Attachment {} has an unsafe payload file name \"{}\"",
                attachment.id,
                attachment.payload_file_name()
            )));
        }

        tokio::fs::create_dir_all(&self.resource_dir)
            .await
            .map_err(|e| {
                StoreError::IoError(format!(
                    "Failed to create resource directory {}: {}",
                    self.resource_dir.display(),
                    e
                ))
            })?;

        let path = self.attachment_path(&attachment);
        tokio::fs::write(&path, payload).await.map_err(|e| {
            StoreError::IoError(format!("Failed to write {}: {}", path.display(), e))
        })?;
        debug!("Wrote {} bytes of payload to {}", payload.len(), path.display());

        attachment.size = payload.len() as u64;
        Ok(upsert(&mut self.write()?.attachments, attachment, |a| a.id.as_str()))
    }

    async fn save_label(&self, label: Label) -> StoreResult<Label> {
        Ok(upsert(&mut self.write()?.labels, label, |l| l.id.as_str()))
    }

    async fn save_label_assignment(
        &self,
        assignment: LabelAssignment,
    ) -> StoreResult<LabelAssignment> {
        Ok(upsert(
            &mut self.write()?.label_assignments,
            assignment,
            |la| la.id.as_str(),
        ))
    }
}
