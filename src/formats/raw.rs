//! Raw directory format
//!
//! Layout:
//! - `<id>.json`: one item, internally tagged by `type`
//! - `resources/<id>[.ext]`: attachment payloads
//!
//! [`RawItemSet`] holds what was read from that layout and saves it into a
//! store; the JEX importer reuses it for the same layout inside a tar archive.

use super::source_title;
use crate::export::{ExportError, Exporter};
use crate::import::{ImportError, Importer};
use crate::models::item::ITEM_LINK_RE;
use crate::models::{
    Attachment, Container, ExportOptions, ImportExportResult, ImportOptions, Item, ItemId,
    ItemType, is_valid_item_id, new_item_id,
};
use crate::resolver::ModuleMetadata;
use crate::store::ItemStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Folder holding attachment payloads inside the raw layout
pub const RESOURCE_DIR: &str = "resources";

/// File name of an item inside the raw layout
pub fn item_file_name(id: &str) -> String {
    format!("{}.json", id)
}

/// Serialized form of an item as written to `<id>.json`
pub fn serialize_item(item: &Item) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(item)?)
}

/// Items and payloads read from a raw layout, not yet saved
#[derive(Debug, Default)]
pub struct RawItemSet {
    items: Vec<Item>,
    /// Payload bytes keyed by file name inside `resources/`
    payloads: HashMap<String, Vec<u8>>,
}

impl RawItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Parse one `<id>.json` file; unreadable items become warnings
    pub fn add_item_json(&mut self, file_name: &str, content: &str, result: &mut ImportExportResult) {
        match serde_json::from_str::<Item>(content) {
            Ok(item) => self.items.push(item),
            Err(e) => {
                let message = format!("Could not read item file {}: {}", file_name, e);
                warn!("{}", message);
                result.warn(message);
            }
        }
    }

    pub fn add_payload(&mut self, file_name: impl Into<String>, data: Vec<u8>) {
        self.payloads.insert(file_name.into(), data);
    }

    /// Save everything into `store`.
    ///
    /// Ids already present in the store, and ids that are not 32 hex
    /// characters, are replaced by fresh ones and all references (parents,
    /// assignments, `:/id` links) follow. Top-level
    /// containers go under `destination` when one is given. Documents whose
    /// container is neither imported nor stored go into a new container named
    /// `fallback_title`. Labels are matched by title against existing ones.
    pub async fn save(
        mut self,
        store: &dyn ItemStore,
        destination: Option<&Container>,
        fallback_title: &str,
        mut result: ImportExportResult,
    ) -> Result<ImportExportResult, ImportError> {
        let mut id_map: HashMap<ItemId, ItemId> = HashMap::new();
        for item in &self.items {
            if !is_valid_item_id(item.id()) {
                let message = format!(
                    "Imported {} has a malformed id \"{}\" and was given a new one",
                    item.item_type(),
                    item.id()
                );
                warn!("{}", message);
                result.warn(message);
                id_map.insert(item.id().to_string(), new_item_id());
            } else if item_exists(store, item).await? {
                id_map.insert(item.id().to_string(), new_item_id());
            }
        }

        let mut existing_labels: HashMap<String, ItemId> = store
            .all_labels()
            .await?
            .into_iter()
            .map(|label| (label.title.to_lowercase(), label.id))
            .collect();

        let mut containers = Vec::new();
        let mut attachments = Vec::new();
        let mut documents = Vec::new();
        let mut labels = Vec::new();
        let mut assignments = Vec::new();
        for item in self.items.drain(..) {
            match item {
                Item::Container(c) => containers.push(c),
                Item::Attachment(a) => attachments.push(a),
                Item::Document(d) => documents.push(d),
                Item::Label(l) => labels.push(l),
                Item::LabelAssignment(la) => assignments.push(la),
            }
        }

        let remap = |id: &str, id_map: &HashMap<ItemId, ItemId>| -> ItemId {
            id_map.get(id).cloned().unwrap_or_else(|| id.to_string())
        };

        // Containers, parents before children
        let imported_containers: HashSet<ItemId> =
            containers.iter().map(|c| remap(&c.id, &id_map)).collect();
        let mut saved_containers: HashSet<ItemId> = HashSet::new();
        let mut pending = containers;
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for mut container in pending {
                container.id = remap(&container.id, &id_map);
                let parent = container.parent_id.as_deref().map(|p| remap(p, &id_map));
                let parent_ready = match &parent {
                    Some(p) if imported_containers.contains(p) => saved_containers.contains(p),
                    _ => true,
                };
                if !parent_ready {
                    deferred.push(container);
                    continue;
                }

                container.parent_id = match parent {
                    Some(p) if imported_containers.contains(&p) => Some(p),
                    Some(p) if destination.is_none() => {
                        store.load_container(&p).await?.map(|existing| existing.id)
                    }
                    _ => destination.map(|d| d.id.clone()),
                };
                saved_containers.insert(container.id.clone());
                store.save_container(container).await?;
            }
            if deferred.len() == before {
                // Parent cycle: break it by saving the rest at the top
                for mut container in deferred {
                    container.parent_id = destination.map(|d| d.id.clone());
                    saved_containers.insert(container.id.clone());
                    store.save_container(container).await?;
                }
                break;
            }
            pending = deferred;
        }

        let mut known_labels: HashSet<ItemId> = HashSet::new();
        for mut label in labels {
            match existing_labels.get(&label.title.to_lowercase()) {
                Some(existing_id) => {
                    id_map.insert(label.id.clone(), existing_id.clone());
                    known_labels.insert(existing_id.clone());
                }
                None => {
                    label.id = remap(&label.id, &id_map);
                    existing_labels.insert(label.title.to_lowercase(), label.id.clone());
                    known_labels.insert(label.id.clone());
                    store.save_label(label).await?;
                }
            }
        }

        for mut attachment in attachments {
            let Some(payload) = self.payloads.remove(&attachment.payload_file_name()) else {
                let message = format!(
                    "Attachment \"{}\" ({}) has no payload and was skipped",
                    attachment.title, attachment.id
                );
                warn!("{}", message);
                result.warn(message);
                continue;
            };
            attachment.id = remap(&attachment.id, &id_map);
            if !attachment.has_safe_payload_name() {
                let message = format!(
                    "Attachment \"{}\" ({}) has an unusable file extension \"{}\" and was skipped",
                    attachment.title, attachment.id, attachment.file_extension
                );
                warn!("{}", message);
                result.warn(message);
                continue;
            }
            store.save_attachment(attachment, &payload).await?;
        }

        let mut fallback: Option<Container> = None;
        let mut saved_documents: HashSet<ItemId> = HashSet::new();
        for mut document in documents {
            document.id = remap(&document.id, &id_map);
            document.body = rewrite_links(&document.body, &id_map);
            let parent = remap(&document.parent_id, &id_map);
            document.parent_id = if saved_containers.contains(&parent)
                || store.load_container(&parent).await?.is_some()
            {
                parent
            } else if let Some(destination) = destination {
                destination.id.clone()
            } else {
                match &fallback {
                    Some(container) => container.id.clone(),
                    None => {
                        let container = store.save_container(Container::new(fallback_title)).await?;
                        let id = container.id.clone();
                        fallback = Some(container);
                        id
                    }
                }
            };
            saved_documents.insert(document.id.clone());
            store.save_document(document).await?;
        }

        for mut assignment in assignments {
            assignment.id = remap(&assignment.id, &id_map);
            assignment.document_id = remap(&assignment.document_id, &id_map);
            assignment.label_id = remap(&assignment.label_id, &id_map);
            if !saved_documents.contains(&assignment.document_id)
                || !known_labels.contains(&assignment.label_id)
            {
                debug!("Skipping dangling label assignment {}", assignment.id);
                continue;
            }
            store.save_label_assignment(assignment).await?;
        }

        if !id_map.is_empty() {
            info!("Assigned new ids to {} imported items", id_map.len());
        }

        Ok(result)
    }
}

async fn item_exists(store: &dyn ItemStore, item: &Item) -> Result<bool, ImportError> {
    let id = item.id();
    Ok(match item.item_type() {
        ItemType::Container => store.load_container(id).await?.is_some(),
        ItemType::Attachment => store.load_attachment(id).await?.is_some(),
        ItemType::Document => store.load_document(id).await?.is_some(),
        ItemType::Label => store.load_label(id).await?.is_some(),
        ItemType::LabelAssignment => store.load_label_assignment(id).await?.is_some(),
    })
}

/// Rewrite `:/id` links whose target received a new id
fn rewrite_links(body: &str, id_map: &HashMap<ItemId, ItemId>) -> String {
    if id_map.is_empty() {
        return body.to_string();
    }
    ITEM_LINK_RE
        .replace_all(body, |caps: &regex::Captures| {
            let id = caps[1].to_lowercase();
            match id_map.get(&id) {
                Some(new_id) => format!(":/{}", new_id),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Writes the raw layout into a directory
#[derive(Debug, Default)]
pub struct RawExporter {
    metadata: Option<ModuleMetadata>,
    dir: Option<PathBuf>,
}

impl RawExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&self) -> Option<&ModuleMetadata> {
        self.metadata.as_ref()
    }

    fn dir(&self) -> Result<&Path, ExportError> {
        self.dir.as_deref().ok_or(ExportError::NotInitialized)
    }
}

#[async_trait]
impl Exporter for RawExporter {
    fn set_metadata(&mut self, metadata: ModuleMetadata) {
        self.metadata = Some(metadata);
    }

    async fn init(&mut self, target_path: &Path, _options: &ExportOptions) -> Result<(), ExportError> {
        tokio::fs::create_dir_all(target_path.join(RESOURCE_DIR)).await?;
        self.dir = Some(target_path.to_path_buf());
        Ok(())
    }

    async fn process_resource(
        &mut self,
        attachment: &Attachment,
        payload_path: &Path,
    ) -> Result<(), ExportError> {
        let destination = self
            .dir()?
            .join(RESOURCE_DIR)
            .join(attachment.payload_file_name());
        tokio::fs::copy(payload_path, &destination).await.map_err(|e| {
            ExportError::IoError(format!(
                "Cannot copy payload of attachment {} from {}: {}",
                attachment.id,
                payload_path.display(),
                e
            ))
        })?;
        Ok(())
    }

    async fn process_item(&mut self, _item_type: ItemType, item: &Item) -> Result<(), ExportError> {
        let path = self.dir()?.join(item_file_name(item.id()));
        tokio::fs::write(&path, serialize_item(item)?).await?;
        Ok(())
    }
}

/// Reads the raw layout from a directory
#[derive(Debug, Default)]
pub struct RawImporter {
    metadata: Option<ModuleMetadata>,
    source: Option<PathBuf>,
    options: Option<ImportOptions>,
}

impl RawImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&self) -> Option<&ModuleMetadata> {
        self.metadata.as_ref()
    }
}

/// Read `<id>.json` files and `resources/` payloads from `dir`
async fn read_raw_dir(dir: &Path, result: &mut ImportExportResult) -> Result<RawItemSet, ImportError> {
    let mut set = RawItemSet::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file()
            || path.extension().and_then(|e| e.to_str()) != Some("json")
        {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        let content = tokio::fs::read_to_string(&path).await?;
        set.add_item_json(&file_name, &content, result);
    }

    let resource_dir = dir.join(RESOURCE_DIR);
    if tokio::fs::try_exists(&resource_dir).await? {
        let mut entries = tokio::fs::read_dir(&resource_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                let data = tokio::fs::read(entry.path()).await?;
                set.add_payload(entry.file_name().to_string_lossy().to_string(), data);
            }
        }
    }

    Ok(set)
}

#[async_trait]
impl Importer for RawImporter {
    fn set_metadata(&mut self, metadata: ModuleMetadata) {
        self.metadata = Some(metadata);
    }

    async fn init(&mut self, source_path: &Path, options: &ImportOptions) -> Result<(), ImportError> {
        if !tokio::fs::metadata(source_path).await?.is_dir() {
            return Err(ImportError::ValidationError(format!(
                "{} is not a directory",
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

        let set = read_raw_dir(source, &mut result).await?;
        info!("Read {} items from {}", set.len(), source.display());
        set.save(
            store,
            options.destination_container.as_ref(),
            &source_title(source, true),
            result,
        )
        .await
    }
}
