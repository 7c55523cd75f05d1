//! Export pipeline tests: queue collection, dispatch order and warnings

use async_trait::async_trait;
use notebook_interop_sdk::export::{
    ExportContext, ExportError, ExportQueueItem, Exporter, collect_export_queue, dispatch_export,
};
use notebook_interop_sdk::models::{
    Attachment, Container, Document, ExportOptions, Item, ItemType, Label, LabelAssignment,
};
use notebook_interop_sdk::resolver::ModuleMetadata;
use notebook_interop_sdk::store::{ItemStore, MemoryStore};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Exporter that records every lifecycle call
#[derive(Default)]
struct RecordingExporter {
    calls: Arc<Mutex<Vec<String>>>,
    fail_on_title: Option<String>,
    fail_resources: bool,
}

impl RecordingExporter {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Exporter for RecordingExporter {
    fn set_metadata(&mut self, _metadata: ModuleMetadata) {}

    async fn init(&mut self, _target: &Path, _options: &ExportOptions) -> Result<(), ExportError> {
        self.record("init".to_string());
        Ok(())
    }

    async fn prepare_for_processing_item_type(
        &mut self,
        item_type: ItemType,
        _queue: &[ExportQueueItem],
    ) -> Result<(), ExportError> {
        self.record(format!("prepare {}", item_type));
        Ok(())
    }

    fn update_context(&mut self, context: &mut ExportContext) {
        self.record(format!("context {}", context.resource_paths.len()));
    }

    async fn process_resource(
        &mut self,
        attachment: &Attachment,
        _payload_path: &Path,
    ) -> Result<(), ExportError> {
        if self.fail_resources {
            return Err(ExportError::IoError(format!(
                "cannot copy payload of {}",
                attachment.title
            )));
        }
        self.record(format!("resource {}", attachment.title));
        Ok(())
    }

    async fn process_item(&mut self, item_type: ItemType, item: &Item) -> Result<(), ExportError> {
        let title = item.title().unwrap_or("-").to_string();
        if self.fail_on_title.as_deref() == Some(title.as_str()) {
            return Err(ExportError::ExportError(format!("cannot write {}", title)));
        }
        self.record(format!("item {} {}", item_type, title));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ExportError> {
        self.record("close".to_string());
        Ok(())
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    store: MemoryStore,
    folder: Container,
    document: Document,
    image: Attachment,
    label: Label,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(dir.path().join("resources"));

    let folder = store.save_container(Container::new("Folder")).await.unwrap();
    let image = store
        .save_attachment(Attachment::new("photo", "image/png", "png"), b"png-bytes")
        .await
        .unwrap();
    let document = store
        .save_document(Document::new(
            &folder.id,
            "Trip",
            format!("![photo](:/{})", image.id),
        ))
        .await
        .unwrap();
    let label = store.save_label(Label::new("travel")).await.unwrap();
    store
        .save_label_assignment(LabelAssignment::new(&document.id, &label.id))
        .await
        .unwrap();

    Fixture {
        _dir: dir,
        store,
        folder,
        document,
        image,
        label,
    }
}

mod dispatch_tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatch_follows_export_order() {
        let f = fixture().await;
        let queue = collect_export_queue(&f.store, &[], &[]).await.unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut exporter = RecordingExporter {
            calls: calls.clone(),
            ..Default::default()
        };
        let result = dispatch_export(&mut exporter, &f.store, &queue).await.unwrap();
        assert!(result.is_clean(), "unexpected warnings: {:?}", result.warnings);

        let calls = calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "prepare container",
                "item container Folder",
                "prepare attachment",
                "context 1",
                "resource photo",
                "item attachment photo",
                "prepare document",
                "item document Trip",
                "prepare label",
                "item label travel",
                "prepare label assignment",
                "item label assignment -",
                "close",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_item_becomes_warning() {
        let f = fixture().await;
        let queue = collect_export_queue(&f.store, &[], &[]).await.unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut exporter = RecordingExporter {
            calls: calls.clone(),
            fail_on_title: Some("Trip".to_string()),
            ..Default::default()
        };
        let result = dispatch_export(&mut exporter, &f.store, &queue).await.unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("cannot write Trip"));

        let calls = calls.lock().unwrap().clone();
        assert!(calls.contains(&"item label travel".to_string()));
        assert_eq!(calls.last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn test_failed_resource_skips_item_and_still_closes() {
        let f = fixture().await;
        let queue = collect_export_queue(&f.store, &[], &[]).await.unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut exporter = RecordingExporter {
            calls: calls.clone(),
            fail_resources: true,
            ..Default::default()
        };
        let result = dispatch_export(&mut exporter, &f.store, &queue).await.unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("cannot copy payload of photo"));

        let calls = calls.lock().unwrap().clone();
        assert!(!calls.iter().any(|call| call.starts_with("item attachment")));
        assert!(calls.contains(&"item document Trip".to_string()));
        assert_eq!(calls.iter().filter(|call| *call == "close").count(), 1);
        assert_eq!(calls.last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn test_document_links_are_not_missing_attachments() {
        let f = fixture().await;
        f.store
            .save_document(Document::new(
                &f.folder.id,
                "Index",
                format!("see [trip](:/{}) and ![photo](:/{})", f.document.id, f.image.id),
            ))
            .await
            .unwrap();

        let queue = collect_export_queue(&f.store, &[], &[]).await.unwrap();
        let attachments: Vec<&str> = queue
            .iter()
            .filter(|entry| entry.item_type == ItemType::Attachment)
            .map(ExportQueueItem::id)
            .collect();
        assert_eq!(attachments, vec![f.image.id.as_str()]);

        let mut exporter = RecordingExporter::default();
        let result = dispatch_export(&mut exporter, &f.store, &queue).await.unwrap();
        assert!(result.is_clean(), "unexpected warnings: {:?}", result.warnings);
    }

    #[tokio::test]
    async fn test_missing_attachment_warning_names_the_id() {
        let f = fixture().await;
        let ghost = "0123456789abcdef0123456789abcdef";
        f.store
            .save_document(Document::new(
                &f.folder.id,
                "Broken",
                format!("[gone](:/{})", ghost),
            ))
            .await
            .unwrap();

        let queue = collect_export_queue(&f.store, &[], &[]).await.unwrap();
        let mut exporter = RecordingExporter::default();
        let result = dispatch_export(&mut exporter, &f.store, &queue).await.unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains(ghost));
        assert!(result.warnings[0].contains("attachment"));
    }

    #[tokio::test]
    async fn test_encrypted_item_is_skipped_with_warning() {
        let f = fixture().await;
        let mut secret = Document::new(&f.folder.id, "Secret", "");
        secret.encryption_applied = true;
        f.store.save_document(secret).await.unwrap();

        let queue = collect_export_queue(&f.store, &[], &[]).await.unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut exporter = RecordingExporter {
            calls: calls.clone(),
            ..Default::default()
        };
        let result = dispatch_export(&mut exporter, &f.store, &queue).await.unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("encrypted"));
        assert!(result.warnings[0].contains("Secret"));
        assert!(
            !calls
                .lock()
                .unwrap()
                .contains(&"item document Secret".to_string())
        );
    }
}

mod queue_tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_limited_to_container_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());

        let a = store.save_container(Container::new("A")).await.unwrap();
        let b = store
            .save_container(Container::new("B").with_parent(&a.id))
            .await
            .unwrap();
        let r = store.save_container(Container::new("R")).await.unwrap();
        let shared = store
            .save_attachment(Attachment::new("shared", "text/plain", "txt"), b"x")
            .await
            .unwrap();
        let n1 = store
            .save_document(Document::new(&b.id, "N", format!("[s](:/{})", shared.id)))
            .await
            .unwrap();
        let n2 = store
            .save_document(Document::new(&a.id, "M", format!("[s](:/{})", shared.id)))
            .await
            .unwrap();
        store
            .save_document(Document::new(&r.id, "Outside", ""))
            .await
            .unwrap();

        let queue = collect_export_queue(&store, std::slice::from_ref(&a.id), &[])
            .await
            .unwrap();
        let ids: Vec<&str> = queue.iter().map(ExportQueueItem::id).collect();

        let position = |id: &str| ids.iter().position(|entry| *entry == id);
        let (Some(pos_a), Some(pos_b)) = (position(&a.id), position(&b.id)) else {
            panic!("containers missing from queue: {:?}", ids);
        };
        assert!(pos_a < pos_b, "A must be queued before B: {:?}", ids);
        assert!(!ids.contains(&r.id.as_str()));
        assert!(ids.contains(&n1.id.as_str()));
        assert!(ids.contains(&n2.id.as_str()));
        assert_eq!(
            queue
                .iter()
                .filter(|entry| entry.item_type == ItemType::Attachment)
                .count(),
            1
        );
        assert_eq!(queue.len(), 5);
    }

    #[tokio::test]
    async fn test_shared_label_is_queued_once() {
        let f = fixture().await;
        let second = f
            .store
            .save_document(Document::new(&f.folder.id, "Return trip", ""))
            .await
            .unwrap();
        f.store
            .save_label_assignment(LabelAssignment::new(&second.id, &f.label.id))
            .await
            .unwrap();

        let queue = collect_export_queue(&f.store, &[], &[]).await.unwrap();
        let count = |item_type: ItemType| {
            queue
                .iter()
                .filter(|entry| entry.item_type == item_type)
                .count()
        };

        assert_eq!(count(ItemType::Label), 1);
        assert_eq!(count(ItemType::LabelAssignment), 2);
        let label_entry = queue
            .iter()
            .find(|entry| entry.item_type == ItemType::Label)
            .unwrap();
        assert_eq!(label_entry.id(), f.label.id);
    }

    #[tokio::test]
    async fn test_queue_document_selection_skips_containers() {
        let f = fixture().await;
        let queue = collect_export_queue(&f.store, &[], std::slice::from_ref(&f.document.id))
            .await
            .unwrap();

        assert!(
            queue
                .iter()
                .all(|entry| entry.item_type != ItemType::Container)
        );
        let ids: Vec<&str> = queue.iter().map(ExportQueueItem::id).collect();
        assert!(ids.contains(&f.image.id.as_str()));
        assert!(ids.contains(&f.label.id.as_str()));
    }
}
