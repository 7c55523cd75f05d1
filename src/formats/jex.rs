//! JEX archive format
//!
//! A JEX file is an uncompressed tar archive holding the raw layout:
//! `<id>.json` per item and `resources/<id>[.ext]` per attachment payload.
//! The exporter appends entries as items arrive; the importer reads the whole
//! archive and hands it to [`RawItemSet`].

use super::raw::{RESOURCE_DIR, RawItemSet, item_file_name, serialize_item};
use super::source_title;
use crate::export::{ExportError, Exporter};
use crate::import::{ImportError, Importer};
use crate::models::{
    Attachment, ExportOptions, ImportExportResult, ImportOptions, Item, ItemType,
};
use crate::resolver::ModuleMetadata;
use crate::store::ItemStore;
use async_trait::async_trait;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn archive_mtime() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Append `data` to the archive under `name`
fn append_bytes(
    archive: &mut tar::Builder<File>,
    name: &str,
    data: &[u8],
) -> Result<(), ExportError> {
    let mut header = tar::Header::new_gnu();
    header
        .set_path(name)
        .map_err(|e| ExportError::ExportError(format!("Path error: {}", e)))?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(archive_mtime());
    header.set_cksum();

    archive
        .append(&header, data)
        .map_err(|e| ExportError::ExportError(format!("Archive append failed: {}", e)))
}

/// Writes items into a JEX archive
#[derive(Default)]
pub struct JexExporter {
    metadata: Option<ModuleMetadata>,
    archive: Option<tar::Builder<File>>,
    path: Option<PathBuf>,
    entries: usize,
}

impl JexExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&self) -> Option<&ModuleMetadata> {
        self.metadata.as_ref()
    }

    fn archive(&mut self) -> Result<&mut tar::Builder<File>, ExportError> {
        self.archive.as_mut().ok_or(ExportError::NotInitialized)
    }
}

#[async_trait]
impl Exporter for JexExporter {
    fn set_metadata(&mut self, metadata: ModuleMetadata) {
        self.metadata = Some(metadata);
    }

    async fn init(&mut self, target_path: &Path, _options: &ExportOptions) -> Result<(), ExportError> {
        if let Some(parent) = target_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = File::create(target_path).map_err(|e| {
            ExportError::IoError(format!(
                "Cannot create archive {}: {}",
                target_path.display(),
                e
            ))
        })?;
        self.archive = Some(tar::Builder::new(file));
        self.path = Some(target_path.to_path_buf());
        self.entries = 0;
        Ok(())
    }

    async fn process_resource(
        &mut self,
        attachment: &Attachment,
        payload_path: &Path,
    ) -> Result<(), ExportError> {
        let data = tokio::fs::read(payload_path).await.map_err(|e| {
            ExportError::IoError(format!(
                "Cannot read payload of attachment {} from {}: {}",
                attachment.id,
                payload_path.display(),
                e
            ))
        })?;
        let name = format!("{}/{}", RESOURCE_DIR, attachment.payload_file_name());
        append_bytes(self.archive()?, &name, &data)?;
        self.entries += 1;
        Ok(())
    }

    async fn process_item(&mut self, _item_type: ItemType, item: &Item) -> Result<(), ExportError> {
        let json = serialize_item(item)?;
        append_bytes(self.archive()?, &item_file_name(item.id()), json.as_bytes())?;
        self.entries += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ExportError> {
        let archive = self.archive.take().ok_or(ExportError::NotInitialized)?;
        archive
            .into_inner()
            .map_err(|e| ExportError::ExportError(format!("Archive finalization failed: {}", e)))?;

        if let Some(path) = &self.path {
            info!("Wrote {} entries to {}", self.entries, path.display());
        }
        Ok(())
    }
}

/// Split the raw layout out of an in-memory tar archive
fn read_archive(bytes: &[u8], result: &mut ImportExportResult) -> Result<RawItemSet, ImportError> {
    let mut set = RawItemSet::new();
    let mut archive = tar::Archive::new(Cursor::new(bytes));
    let entries = archive
        .entries()
        .map_err(|e| ImportError::ParseError(format!("Invalid archive: {}", e)))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| ImportError::ParseError(format!("Invalid archive entry: {}", e)))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry
            .path()
            .map_err(|e| ImportError::ParseError(format!("Invalid entry path: {}", e)))?
            .to_string_lossy()
            .replace('\\', "/");
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;

        if let Some(file_name) = path.strip_prefix(&format!("{}/", RESOURCE_DIR)) {
            set.add_payload(file_name, data);
        } else if path.ends_with(".json") && !path.contains('/') {
            let content = String::from_utf8_lossy(&data);
            set.add_item_json(&path, &content, result);
        } else {
            debug!("Ignoring archive entry {}", path);
        }
    }

    Ok(set)
}

/// Reads items from a JEX archive
#[derive(Debug, Default)]
pub struct JexImporter {
    metadata: Option<ModuleMetadata>,
    source: Option<PathBuf>,
    options: Option<ImportOptions>,
}

impl JexImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&self) -> Option<&ModuleMetadata> {
        self.metadata.as_ref()
    }
}

#[async_trait]
impl Importer for JexImporter {
    fn set_metadata(&mut self, metadata: ModuleMetadata) {
        self.metadata = Some(metadata);
    }

    async fn init(&mut self, source_path: &Path, options: &ImportOptions) -> Result<(), ImportError> {
        if !tokio::fs::metadata(source_path).await?.is_file() {
            return Err(ImportError::ValidationError(format!(
                "{} is not a file",
                source_path.display()
            )));
        }
        self.source = Some(source_path.to_path_buf());
        self.options = Some(options.clone());
        Ok(())
    }

    async fn exec(
        &mut self,
        mut result: ImportExportResult,
        store: &dyn ItemStore,
    ) -> Result<ImportExportResult, ImportError> {
        let (Some(source), Some(options)) = (&self.source, &self.options) else {
            return Err(ImportError::NotInitialized);
        };

        let bytes = tokio::fs::read(source).await?;
        let set = read_archive(&bytes, &mut result)?;
        info!("Read {} items from {}", set.len(), source.display());
        set.save(
            store,
            options.destination_container.as_ref(),
            &source_title(source, false),
            result,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Container;

    #[test]
    fn test_read_archive_splits_items_and_payloads() {
        let container = Container::new("Notes");
        let json = serde_json::to_string(&Item::Container(container.clone())).unwrap();

        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in [
            (item_file_name(&container.id), json.as_bytes().to_vec()),
            ("resources/abc.png".to_string(), vec![1, 2, 3]),
            ("nested/ignored.json".to_string(), b"{}".to_vec()),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_path(&name).unwrap();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, data.as_slice()).unwrap();
        }
        let bytes = builder.into_inner().unwrap();

        let mut result = ImportExportResult::new();
        let set = read_archive(&bytes, &mut result).unwrap();
        assert_eq!(set.len(), 1);
        assert!(result.is_clean());
    }

    #[test]
    fn test_read_archive_rejects_garbage() {
        let mut result = ImportExportResult::new();
        let garbage = vec![0xffu8; 10];
        // Too short to hold a header: either an error or an empty set
        match read_archive(&garbage, &mut result) {
            Ok(set) => assert!(set.is_empty()),
            Err(e) => assert!(matches!(e, ImportError::ParseError(_))),
        }
    }
}
