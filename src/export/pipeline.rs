//! Export pipeline
//!
//! Resolves the exporter, collects the queue, dispatches entries in
//! [`ItemType::EXPORT_ORDER`], and closes the exporter. A failing or missing
//! entry becomes a warning; it never aborts the run.

use super::{ExportContext, ExportQueueItem, Exporter, collect_export_queue};
use crate::error::InteropResult;
use crate::models::{
    ExportOptions, ImportExportResult, Item, ItemRef, ItemType, ModuleType, RunOptions,
};
use crate::service::InteropService;
use crate::store::{ItemStore, StoreResult};
use std::borrow::Cow;
use tracing::{error, info, warn};

impl InteropService {
    /// Export the selected items through the exporter for `options.format`
    pub async fn export(&self, options: ExportOptions) -> InteropResult<ImportExportResult> {
        info!(
            "Exporting to {} as \"{}\"",
            options.path.display(),
            options.format
        );

        let mut exporter = self
            .resolver()
            .resolve_by_path(ModuleType::Exporter, &RunOptions::Export(options.clone()))?
            .into_exporter()?;

        let queue = collect_export_queue(
            self.store(),
            &options.source_container_ids,
            &options.source_document_ids,
        )
        .await?;

        exporter.init(&options.path, &options).await?;
        let result = dispatch_export(exporter.as_mut(), self.store(), &queue).await?;

        info!(
            "Exported {} entries to {} with {} warnings",
            queue.len(),
            options.path.display(),
            result.warnings.len()
        );

        Ok(result)
    }
}

/// Load the object behind an id-only queue entry
async fn load_item(store: &dyn ItemStore, item_type: ItemType, id: &str) -> StoreResult<Option<Item>> {
    Ok(match item_type {
        ItemType::Container => store.load_container(id).await?.map(Item::Container),
        ItemType::Attachment => store.load_attachment(id).await?.map(Item::Attachment),
        ItemType::Document => store.load_document(id).await?.map(Item::Document),
        ItemType::Label => store.load_label(id).await?.map(Item::Label),
        ItemType::LabelAssignment => store
            .load_label_assignment(id)
            .await?
            .map(Item::LabelAssignment),
    })
}

fn missing_item_warning(item_type: ItemType, id: &str) -> String {
    match item_type {
        ItemType::Attachment => format!(
            "An attachment that does not exist is referenced in a document. The attachment was skipped. Attachment ID: {}",
            id
        ),
        _ => format!(
            "Cannot find {} with ID \"{}\". Item was skipped.",
            item_type, id
        ),
    }
}

fn encrypted_item_warning(item: &Item) -> String {
    let name = item
        .title()
        .filter(|title| !title.is_empty())
        .unwrap_or(item.id());
    format!(
        "This item is currently encrypted: {} \"{}\" ({}) and was not exported. You may wait for it to be decrypted and try again.",
        item.item_type(),
        name,
        item.id()
    )
}

/// Drive an initialised exporter through a collected queue, then close it.
///
/// Per-entry problems are returned as warnings. Errors from
/// `prepare_for_processing_item_type`, `close`, or the store are fatal.
pub async fn dispatch_export(
    exporter: &mut dyn Exporter,
    store: &dyn ItemStore,
    queue: &[ExportQueueItem],
) -> InteropResult<ImportExportResult> {
    let mut result = ImportExportResult::new();
    let mut context = ExportContext::default();

    for item_type in ItemType::EXPORT_ORDER {
        exporter
            .prepare_for_processing_item_type(item_type, queue)
            .await?;

        for entry in queue.iter().filter(|entry| entry.item_type == item_type) {
            let item: Cow<'_, Item> = match &entry.item {
                ItemRef::Loaded(item) => Cow::Borrowed(item.as_ref()),
                ItemRef::Id(id) => match load_item(store, item_type, id).await? {
                    Some(item) => Cow::Owned(item),
                    None => {
                        let message = missing_item_warning(item_type, id);
                        warn!("{}", message);
                        result.warn(message);
                        continue;
                    }
                },
            };

            if item.is_still_encrypted() {
                let message = encrypted_item_warning(&item);
                warn!("{}", message);
                result.warn(message);
                continue;
            }

            let mut outcome = Ok(());
            if let Item::Attachment(attachment) = item.as_ref() {
                let payload_path = store.attachment_path(attachment);
                context
                    .resource_paths
                    .insert(attachment.id.clone(), payload_path.clone());
                exporter.update_context(&mut context);
                outcome = exporter.process_resource(attachment, &payload_path).await;
            }
            if outcome.is_ok() {
                outcome = exporter.process_item(item_type, &item).await;
            }

            if let Err(e) = outcome {
                error!("Failed to export {} {}: {}", item_type, entry.id(), e);
                result.warn(e.to_string());
            }
        }
    }

    exporter.close().await?;
    Ok(result)
}
