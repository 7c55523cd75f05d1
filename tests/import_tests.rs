//! Import pipeline tests: source checks, format sniffing, custom modules

use async_trait::async_trait;
use notebook_interop_sdk::import::{ImportError, Importer};
use notebook_interop_sdk::models::{
    Container, Document, FileSystemItem, ImportExportResult, ImportOptions, ModuleOptions,
    RunOptions,
};
use notebook_interop_sdk::resolver::{Converter, ModuleMetadata};
use notebook_interop_sdk::store::{ItemStore, MemoryStore};
use notebook_interop_sdk::{InteropError, InteropService};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

static OVERRIDE_RUNS: Mutex<Vec<(String, Option<PathBuf>)>> = Mutex::new(Vec::new());

/// Importer that writes one document titled after the module it was built for
#[derive(Default)]
struct ProbeImporter {
    metadata: Option<ModuleMetadata>,
    destination: Option<Container>,
}

#[async_trait]
impl Importer for ProbeImporter {
    fn set_metadata(&mut self, metadata: ModuleMetadata) {
        self.metadata = Some(metadata);
    }

    async fn init(&mut self, _source: &Path, options: &ImportOptions) -> Result<(), ImportError> {
        self.destination = options.destination_container.clone();
        Ok(())
    }

    async fn exec(
        &mut self,
        result: ImportExportResult,
        store: &dyn ItemStore,
    ) -> Result<ImportExportResult, ImportError> {
        let metadata = self.metadata.as_ref().ok_or(ImportError::NotInitialized)?;
        let parent = match &self.destination {
            Some(container) => container.clone(),
            None => store.save_container(Container::new("Probe")).await?,
        };
        store
            .save_document(Document::new(
                &parent.id,
                format!("probe:{}", metadata.descriptor.format),
                "",
            ))
            .await?;
        Ok(result)
    }
}

fn service(dir: &Path) -> (InteropService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(dir.join("resources")));
    (InteropService::new(store.clone()), store)
}

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(dir.path());

        let err = service
            .import(ImportOptions::new(dir.path().join("absent.md")))
            .await
            .unwrap_err();
        assert!(matches!(err, InteropError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_auto_format_needs_known_extension() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("notes.xyz");
        std::fs::write(&source, "text").unwrap();
        let (service, _) = service(dir.path());

        let err = service.import(ImportOptions::new(&source)).await.unwrap_err();
        assert!(matches!(err, InteropError::FormatUnspecified(_)));
        assert!(err.to_string().contains("Please specify import format"));
    }

    #[tokio::test]
    async fn test_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("notes.md");
        std::fs::write(&source, "text").unwrap();
        let (service, _) = service(dir.path());

        let err = service
            .import(ImportOptions::new(&source).with_format("csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, InteropError::ModuleNotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_destination_container() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("notes.md");
        std::fs::write(&source, "text").unwrap();
        let (service, _) = service(dir.path());

        let err = service
            .import(ImportOptions::new(&source).with_destination("ffffffffffffffffffffffffffffffff"))
            .await
            .unwrap_err();
        assert!(matches!(err, InteropError::DestinationNotFound(id) if id.starts_with("ffff")));
    }

    #[tokio::test]
    async fn test_auto_format_imports_markdown_into_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Shopping.md");
        std::fs::write(&source, "# Shopping\n\n- milk\n").unwrap();
        let (service, store) = service(dir.path());
        let inbox = store.save_container(Container::new("Inbox")).await.unwrap();

        let result = service
            .import(ImportOptions::new(&source).with_destination(&inbox.id))
            .await
            .unwrap();
        assert!(result.is_clean());

        let documents = store.documents().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].title, "Shopping");
        assert_eq!(documents[0].parent_id, inbox.id);
        assert!(documents[0].body.contains("- milk"));
        assert_eq!(store.all_containers().await.unwrap().len(), 1);
    }
}

mod custom_module_tests {
    use super::*;

    #[tokio::test]
    async fn test_registered_module_with_instance_factory() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("data.probe");
        std::fs::write(&source, "").unwrap();
        let (service, store) = service(dir.path());

        service.registry().register_module(
            ModuleOptions::importer("probe")
                .file_extensions(&["probe"])
                .sources(&[FileSystemItem::File])
                .instance_factory(|| Ok(Converter::importer(ProbeImporter::default()))),
        );

        let result = service.import(ImportOptions::new(&source)).await.unwrap();
        assert!(result.is_clean());

        let documents = store.documents().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].title, "probe:probe");
    }

    #[tokio::test]
    async fn test_implementation_override_keeps_matched_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("note.md");
        std::fs::write(&source, "body").unwrap();
        let store = Arc::new(MemoryStore::new(dir.path().join("resources")));
        let mut service = InteropService::new(store.clone());

        service
            .resolver_mut()
            .table_mut()
            .register("ImporterProbe", || {
                Converter::importer(OverrideProbe::default())
            });

        let _ = service
            .import(
                ImportOptions::new(&source)
                    .with_format("md")
                    .with_implementation("ImporterProbe"),
            )
            .await
            .unwrap();

        // The markdown importer did not run
        assert_eq!(store.document_count(), 0);

        let runs = OVERRIDE_RUNS.lock().unwrap().clone();
        assert_eq!(runs, vec![("md".to_string(), Some(source))]);
    }
}

/// Importer that records the metadata it was given
#[derive(Default)]
struct OverrideProbe {
    metadata: Option<ModuleMetadata>,
}

#[async_trait]
impl Importer for OverrideProbe {
    fn set_metadata(&mut self, metadata: ModuleMetadata) {
        self.metadata = Some(metadata);
    }

    async fn init(&mut self, _source: &Path, _options: &ImportOptions) -> Result<(), ImportError> {
        Ok(())
    }

    async fn exec(
        &mut self,
        result: ImportExportResult,
        _store: &dyn ItemStore,
    ) -> Result<ImportExportResult, ImportError> {
        let metadata = self.metadata.as_ref().ok_or(ImportError::NotInitialized)?;
        let path = match &metadata.options {
            Some(RunOptions::Import(options)) => Some(options.path.clone()),
            _ => None,
        };
        OVERRIDE_RUNS
            .lock()
            .unwrap()
            .push((metadata.descriptor.format.clone(), path));
        Ok(result)
    }
}

mod archive_safety_tests {
    use super::*;
    use notebook_interop_sdk::models::{Attachment, Item, is_valid_item_id};

    /// Append an entry whose name is written verbatim into the header
    fn append_verbatim(builder: &mut tar::Builder<Vec<u8>>, name: &str, data: &[u8]) {
        let mut header = tar::Header::new_old();
        let bytes = name.as_bytes();
        header.as_old_mut().name[..bytes.len()].copy_from_slice(bytes);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, data).unwrap();
    }

    #[tokio::test]
    async fn test_archive_ids_cannot_escape_resource_dir() {
        let dir = tempfile::tempdir().unwrap();
        let resources = dir.path().join("store").join("resources");
        let store = Arc::new(MemoryStore::new(&resources));
        let service = InteropService::new(store.clone());

        let mut attachment = Attachment::new("evil", "text/plain", "");
        attachment.id = "../escaped".to_string();
        let json = serde_json::to_string(&Item::Attachment(attachment)).unwrap();

        let mut builder = tar::Builder::new(Vec::new());
        append_verbatim(&mut builder, "evil.json", json.as_bytes());
        append_verbatim(&mut builder, "resources/../escaped", b"boom");
        let archive = dir.path().join("crafted.jex");
        std::fs::write(&archive, builder.into_inner().unwrap()).unwrap();

        let result = service.import(ImportOptions::new(&archive)).await.unwrap();

        assert!(!dir.path().join("store").join("escaped").exists());
        assert!(result.warnings.iter().any(|w| w.contains("malformed id")));

        let saved = store.attachments().unwrap();
        assert_eq!(saved.len(), 1);
        assert!(is_valid_item_id(&saved[0].id));
        assert!(store.attachment_path(&saved[0]).starts_with(&resources));
        assert_eq!(std::fs::read(store.attachment_path(&saved[0])).unwrap(), b"boom");
    }
}
