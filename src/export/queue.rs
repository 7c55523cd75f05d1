//! Export queue collection
//!
//! Walks the store and lists everything one export run has to emit. The
//! queue is built in store order; the pipeline regroups it by item type.

use super::ExportQueueItem;
use crate::models::{Item, ItemId, ItemType};
use crate::store::{ItemStore, StoreResult};
use std::collections::HashSet;
use tracing::debug;

/// Collect the export queue.
///
/// - `source_container_ids` limits the export to these containers and all
///   their descendants (empty = every container).
/// - `source_document_ids` limits the export to these documents (empty =
///   every document). When set, containers themselves are not queued.
///
/// Attachments linked from exported documents are queued once each, as are
/// the labels of every exported label assignment. Links to other documents
/// are not attachments and are left out.
pub async fn collect_export_queue(
    store: &dyn ItemStore,
    source_container_ids: &[ItemId],
    source_document_ids: &[ItemId],
) -> StoreResult<Vec<ExportQueueItem>> {
    let mut container_filter: Vec<ItemId> = source_container_ids.to_vec();
    for id in source_container_ids {
        container_filter.extend(store.descendant_container_ids(id).await?);
    }

    let mut queue = Vec::new();
    let mut exported_document_ids: HashSet<ItemId> = HashSet::new();
    let mut attachment_ids: Vec<ItemId> = Vec::new();

    for container in store.all_containers().await? {
        if !container_filter.is_empty() && !container_filter.contains(&container.id) {
            continue;
        }

        if source_document_ids.is_empty() {
            queue.push(ExportQueueItem::by_id(ItemType::Container, &container.id));
        }

        for document in store.documents_in_container(&container.id).await? {
            if !source_document_ids.is_empty() && !source_document_ids.contains(&document.id) {
                continue;
            }

            attachment_ids.extend(document.linked_item_ids());
            exported_document_ids.insert(document.id.clone());
            queue.push(ExportQueueItem::loaded(Item::Document(document)));
        }
    }

    let mut seen_links: HashSet<ItemId> = HashSet::new();
    let mut attachment_count = 0;
    for id in attachment_ids {
        if !seen_links.insert(id.clone()) || store.load_document(&id).await?.is_some() {
            continue;
        }
        queue.push(ExportQueueItem::by_id(ItemType::Attachment, id));
        attachment_count += 1;
    }

    let mut label_ids: Vec<ItemId> = Vec::new();
    for assignment in store.all_label_assignments().await? {
        if !exported_document_ids.contains(&assignment.document_id) {
            continue;
        }

        queue.push(ExportQueueItem::by_id(
            ItemType::LabelAssignment,
            &assignment.id,
        ));
        if !label_ids.contains(&assignment.label_id) {
            label_ids.push(assignment.label_id);
        }
    }

    for id in label_ids {
        queue.push(ExportQueueItem::by_id(ItemType::Label, id));
    }

    debug!(
        "Collected {} export entries ({} documents, {} attachments)",
        queue.len(),
        exported_document_ids.len(),
        attachment_count
    );

    Ok(queue)
}
