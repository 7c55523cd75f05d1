//! Integration tests for round-trip import/export through the service

use notebook_interop_sdk::models::{
    Attachment, Container, Document, ExportOptions, ImportOptions, Label, LabelAssignment,
    MarkupLanguage, OutputFormat,
};
use notebook_interop_sdk::store::{ItemStore, MemoryStore};
use notebook_interop_sdk::InteropService;
use std::path::Path;
use std::sync::Arc;

/// Store with one nested folder, a document linking an image, and a label
async fn populated_service(dir: &Path) -> (InteropService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(dir.join("source-resources")));

    let notebook = store.save_container(Container::new("Notebook")).await.unwrap();
    let folder = store
        .save_container(Container::new("Folder").with_parent(&notebook.id))
        .await
        .unwrap();
    let image = store
        .save_attachment(Attachment::new("photo.png", "image/png", "png"), b"png-bytes")
        .await
        .unwrap();
    let document = store
        .save_document(Document::new(
            &folder.id,
            "Trip",
            format!("Day one\n\n![photo](:/{})\n", image.id),
        ))
        .await
        .unwrap();
    let label = store.save_label(Label::new("travel")).await.unwrap();
    store
        .save_label_assignment(LabelAssignment::new(&document.id, &label.id))
        .await
        .unwrap();

    (InteropService::new(store.clone()), store)
}

fn fresh_service(dir: &Path) -> (InteropService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(dir.join("target-resources")));
    (InteropService::new(store.clone()), store)
}

/// The single imported document, its linked attachment payload, and its labels
async fn imported_trip(store: &MemoryStore) -> (Document, Vec<u8>, Vec<String>) {
    let documents = store.documents().unwrap();
    assert_eq!(documents.len(), 1);
    let document = documents[0].clone();

    let linked = document.linked_item_ids();
    assert_eq!(linked.len(), 1, "body: {}", document.body);
    let attachment = store.load_attachment(&linked[0]).await.unwrap().unwrap();
    let payload = std::fs::read(store.attachment_path(&attachment)).unwrap();

    let labels = store.all_labels().await.unwrap();
    let mut titles = Vec::new();
    for assignment in store.all_label_assignments().await.unwrap() {
        if assignment.document_id == document.id
            && let Some(label) = labels.iter().find(|l| l.id == assignment.label_id)
        {
            titles.push(label.title.clone());
        }
    }
    (document, payload, titles)
}

const ENEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE en-export SYSTEM "http://xml.evernote.com/pub/evernote-export3.dtd">
<en-export>
  <note>
    <title>Recipe</title>
    <content><![CDATA[<en-note><div>Mix <i>flour</i></div><div><en-media hash="e8c0e28b42bd2f48ea34ccdc6593f88a" type="image/png"/></div><div>Bake</div></en-note>]]></content>
    <created>20230301T120000Z</created>
    <tag>cooking</tag>
    <resource>
      <data encoding="base64">cG5nLWJ5dGVz</data>
      <mime>image/png</mime>
      <resource-attributes><file-name>cake.png</file-name></resource-attributes>
    </resource>
  </note>
</en-export>"#;

mod round_trip_tests {
    use super::*;

    #[tokio::test]
    async fn test_raw_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (source, _) = populated_service(dir.path()).await;
        let out = dir.path().join("raw-out");

        let result = source
            .export(ExportOptions::new(&out).with_format("raw"))
            .await
            .unwrap();
        assert!(result.is_clean(), "warnings: {:?}", result.warnings);
        assert!(out.join("resources").is_dir());

        let (target, store) = fresh_service(dir.path());
        let result = target
            .import(ImportOptions::new(&out).with_format("raw"))
            .await
            .unwrap();
        assert!(result.is_clean(), "warnings: {:?}", result.warnings);

        let (document, payload, labels) = imported_trip(&store).await;
        assert_eq!(document.title, "Trip");
        assert_eq!(payload, b"png-bytes");
        assert_eq!(labels, vec!["travel"]);

        // Hierarchy survives: Folder stays inside Notebook
        let containers = store.all_containers().await.unwrap();
        assert_eq!(containers.len(), 2);
        let notebook = containers.iter().find(|c| c.title == "Notebook").unwrap();
        let folder = containers.iter().find(|c| c.title == "Folder").unwrap();
        assert_eq!(notebook.parent_id, None);
        assert_eq!(folder.parent_id.as_deref(), Some(notebook.id.as_str()));
        assert_eq!(document.parent_id, folder.id);
    }

    #[tokio::test]
    async fn test_jex_round_trip_with_auto_format() {
        let dir = tempfile::tempdir().unwrap();
        let (source, _) = populated_service(dir.path()).await;
        let archive = dir.path().join("backup.jex");

        let result = source.export(ExportOptions::new(&archive)).await.unwrap();
        assert!(result.is_clean(), "warnings: {:?}", result.warnings);
        assert!(archive.is_file());

        let (target, store) = fresh_service(dir.path());
        let result = target.import(ImportOptions::new(&archive)).await.unwrap();
        assert!(result.is_clean(), "warnings: {:?}", result.warnings);

        let (document, payload, labels) = imported_trip(&store).await;
        assert!(document.body.starts_with("Day one"));
        assert_eq!(payload, b"png-bytes");
        assert_eq!(labels, vec!["travel"]);
    }

    #[tokio::test]
    async fn test_jex_import_into_destination() {
        let dir = tempfile::tempdir().unwrap();
        let (source, _) = populated_service(dir.path()).await;
        let archive = dir.path().join("backup.jex");
        let _ = source.export(ExportOptions::new(&archive)).await.unwrap();

        let (target, store) = fresh_service(dir.path());
        let inbox = store.save_container(Container::new("Inbox")).await.unwrap();
        let _ = target
            .import(ImportOptions::new(&archive).with_destination(&inbox.id))
            .await
            .unwrap();

        let containers = store.all_containers().await.unwrap();
        let notebook = containers.iter().find(|c| c.title == "Notebook").unwrap();
        assert_eq!(notebook.parent_id.as_deref(), Some(inbox.id.as_str()));
    }

    #[tokio::test]
    async fn test_markdown_export_layout_and_reimport() {
        let dir = tempfile::tempdir().unwrap();
        let (source, _) = populated_service(dir.path()).await;
        let out = dir.path().join("md-out");

        let result = source
            .export(ExportOptions::new(&out).with_format("md"))
            .await
            .unwrap();
        assert!(result.is_clean(), "warnings: {:?}", result.warnings);

        let trip = out.join("Notebook").join("Folder").join("Trip.md");
        let content = std::fs::read_to_string(&trip).unwrap();
        assert!(content.contains("![photo](../../_resources/photo.png)"), "{}", content);
        assert_eq!(
            std::fs::read(out.join("_resources").join("photo.png")).unwrap(),
            b"png-bytes"
        );

        let (target, store) = fresh_service(dir.path());
        let result = target.import(ImportOptions::new(&out).with_format("md")).await.unwrap();
        assert!(result.is_clean(), "warnings: {:?}", result.warnings);

        let (document, payload, labels) = imported_trip(&store).await;
        assert_eq!(document.title, "Trip");
        assert_eq!(payload, b"png-bytes");
        assert!(labels.is_empty());

        // md-out -> Notebook -> Folder
        let containers = store.all_containers().await.unwrap();
        let titles: Vec<&str> = containers.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["md-out", "Notebook", "Folder"]);
    }

    #[tokio::test]
    async fn test_front_matter_round_trip_keeps_tags_and_times() {
        let dir = tempfile::tempdir().unwrap();
        let (source, source_store) = populated_service(dir.path()).await;
        let original = source_store.documents().unwrap()[0].clone();
        let out = dir.path().join("fm-out");

        let result = source
            .export(ExportOptions::new(&out).with_format("md_frontmatter"))
            .await
            .unwrap();
        assert!(result.is_clean(), "warnings: {:?}", result.warnings);

        let content =
            std::fs::read_to_string(out.join("Notebook").join("Folder").join("Trip.md")).unwrap();
        assert!(content.starts_with("---\n"));
        assert!(content.contains("title: Trip"));
        assert!(content.contains("- travel"));

        let (target, store) = fresh_service(dir.path());
        let result = target
            .import(ImportOptions::new(&out).with_format("md_frontmatter"))
            .await
            .unwrap();
        assert!(result.is_clean(), "warnings: {:?}", result.warnings);

        let (document, payload, labels) = imported_trip(&store).await;
        assert_eq!(document.title, "Trip");
        assert_eq!(document.created_time, original.created_time);
        assert_eq!(payload, b"png-bytes");
        assert_eq!(labels, vec!["travel"]);
    }
}

mod export_selection_tests {
    use super::*;

    #[tokio::test]
    async fn test_links_between_documents_export_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let (service, store) = populated_service(dir.path()).await;
        let trip = store.documents().unwrap()[0].clone();
        store
            .save_document(Document::new(
                &trip.parent_id,
                "Index",
                format!("see [trip](:/{})\n", trip.id),
            ))
            .await
            .unwrap();

        let out = dir.path().join("md-out");
        let result = service
            .export(ExportOptions::new(&out).with_format("md"))
            .await
            .unwrap();
        assert!(result.is_clean(), "warnings: {:?}", result.warnings);

        let index = std::fs::read_to_string(out.join("Notebook").join("Folder").join("Index.md"))
            .unwrap();
        assert!(!index.contains(":/"), "{}", index);
    }

    #[tokio::test]
    async fn test_export_selected_documents_only() {
        let dir = tempfile::tempdir().unwrap();
        let (source, store) = populated_service(dir.path()).await;
        let other_parent = store.all_containers().await.unwrap()[0].id.clone();
        let other = store
            .save_document(Document::new(&other_parent, "Other", "not exported"))
            .await
            .unwrap();
        let trip_id = store
            .documents()
            .unwrap()
            .into_iter()
            .find(|d| d.title == "Trip")
            .unwrap()
            .id;
        let out = dir.path().join("raw-selected");

        let _ = source
            .export(
                ExportOptions::new(&out)
                    .with_format("raw")
                    .with_documents(vec![trip_id.clone()]),
            )
            .await
            .unwrap();

        assert!(out.join(format!("{}.json", trip_id)).is_file());
        assert!(!out.join(format!("{}.json", other.id)).exists());
    }

    #[tokio::test]
    async fn test_configured_module_reuses_builtin_implementation() {
        use notebook_interop_sdk::config::{InteropConfig, sample_config};

        let dir = tempfile::tempdir().unwrap();
        let (populated, store) = populated_service(dir.path()).await;
        drop(populated);

        let config = InteropConfig::parse(sample_config()).unwrap();
        let service = InteropService::from_config(store, &config);
        let out = dir.path().join("dump");

        let result = service
            .export(ExportOptions::new(&out).with_format("notes_dump"))
            .await
            .unwrap();
        assert!(result.is_clean(), "warnings: {:?}", result.warnings);
        assert!(out.join("resources").is_dir());
        let json_files = std::fs::read_dir(&out)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .count();
        // 2 containers, 1 attachment, 1 document, 1 label, 1 assignment
        assert_eq!(json_files, 6);
    }
}

mod enex_tests {
    use super::*;

    #[tokio::test]
    async fn test_enex_import_as_markdown_and_html() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Kitchen.enex");
        std::fs::write(&source, ENEX).unwrap();

        let (service, store) = fresh_service(dir.path());
        let result = service.import(ImportOptions::new(&source)).await.unwrap();
        assert!(result.is_clean(), "warnings: {:?}", result.warnings);

        let (document, payload, labels) = imported_trip(&store).await;
        assert_eq!(document.title, "Recipe");
        assert_eq!(document.markup_language, MarkupLanguage::Markdown);
        let image_id = &document.linked_item_ids()[0];
        assert_eq!(
            document.body,
            format!("Mix *flour*\n![cake.png](:/{})\nBake", image_id)
        );
        assert_eq!(payload, b"png-bytes");
        assert_eq!(labels, vec!["cooking"]);
        let containers = store.all_containers().await.unwrap();
        assert_eq!(containers[0].title, "Kitchen");

        let (service, store) = fresh_service(&dir.path().join("html"));
        let _ = service
            .import(
                ImportOptions::new(&source)
                    .with_format("enex")
                    .with_output_format(OutputFormat::Html),
            )
            .await
            .unwrap();
        let (document, _, _) = imported_trip(&store).await;
        assert_eq!(document.markup_language, MarkupLanguage::Html);
        let image_at = document.body.find("<img").unwrap();
        assert!(image_at < document.body.find("Bake").unwrap(), "{}", document.body);
        assert!(!document.body.contains("en-media"));
    }
}
