//! Markdown tree format
//!
//! Export layout:
//! - one directory per container, nested like the containers
//! - one `<title>.md` per document inside its container's directory
//! - attachment payloads in `_resources/` at the root
//!
//! `:/<id>` links to attachments and to other exported documents are turned
//! into relative paths. The front-matter variant prefixes each file with a
//! YAML header carrying title, timestamps, and tags.
//!
//! Import walks a file or a directory tree the other way round and turns
//! local files linked from documents into attachments.

use super::{
    LabelMatcher, mime_for_extension, parent_container, safe_file_name, source_title, unique_name,
};
use crate::export::{ExportError, ExportQueueItem, Exporter};
use crate::import::{ImportError, Importer};
use crate::models::item::ITEM_LINK_RE;
use crate::models::{
    Attachment, Container, Document, ExportOptions, ImportExportResult, ImportOptions, Item,
    ItemId, ItemRef, ItemType,
};
use crate::resolver::ModuleMetadata;
use crate::store::ItemStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Root folder for exported attachment payloads
pub const RESOURCE_FOLDER: &str = "_resources";

/// File extensions imported as documents
pub const DOCUMENT_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

/// Deepest container nesting followed when building export paths
const MAX_CONTAINER_DEPTH: usize = 64;

/// `[text](target)` and `![alt](target "title")` links
static MARKDOWN_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(!?\[[^\]]*\]\()([^)\s]+)((?:\s+"[^"]*")?\))"#)
        .expect("markdown link regex is valid")
});

/// YAML header of a Markdown file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "TagList::is_empty")]
    pub tags: TagList,
}

/// `tags:` written either as a list or as one comma separated string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagList {
    List(Vec<String>),
    Inline(String),
}

impl Default for TagList {
    fn default() -> Self {
        TagList::List(Vec::new())
    }
}

impl TagList {
    pub fn is_empty(&self) -> bool {
        self.to_vec().is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        match self {
            TagList::List(tags) => tags
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            TagList::Inline(tags) => tags
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

/// Split `text` into its YAML header and the remaining body.
///
/// Returns `None` for the header when the text does not start with a `---`
/// line closed by another `---` line.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(header), body.trim_start_matches(['\r', '\n']));
        }
        offset += line.len();
    }
    (None, text)
}

/// Render `front_matter` and `body` as one Markdown file
pub fn render_with_front_matter(
    front_matter: &FrontMatter,
    body: &str,
) -> Result<String, ExportError> {
    let yaml = serde_yaml::to_string(front_matter)
        .map_err(|e| ExportError::SerializationError(e.to_string()))?;
    Ok(format!("---\n{}---\n\n{}", yaml, body))
}

/// Relative link from a file in `from_dir` to `target`, both relative to the
/// export root, percent-encoded per segment
fn relative_link(from_dir: &Path, target: &Path) -> String {
    let depth = from_dir
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();
    let mut segments: Vec<String> = vec!["..".to_string(); depth];
    segments.extend(
        target
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(urlencoding::encode(&s.to_string_lossy()).into_owned()),
                _ => None,
            }),
    );
    segments.join("/")
}

/// Writes documents as a tree of Markdown files
#[derive(Debug, Default)]
pub struct MarkdownExporter {
    metadata: Option<ModuleMetadata>,
    front_matter: bool,
    root: Option<PathBuf>,
    /// Containers seen so far: id -> (title, parent)
    containers: HashMap<ItemId, (String, Option<ItemId>)>,
    /// Directory of each container, relative to the root
    container_dirs: HashMap<ItemId, PathBuf>,
    /// File of each document, relative to the root
    document_paths: HashMap<ItemId, PathBuf>,
    /// Lowercased names already used, per relative directory
    taken_names: HashMap<PathBuf, HashSet<String>>,
    /// Exported payload of each attachment, relative to the root
    resource_paths: HashMap<ItemId, PathBuf>,
    labels: HashMap<ItemId, String>,
    document_labels: HashMap<ItemId, Vec<ItemId>>,
    /// Documents held back until `close` (front-matter variant)
    pending: Vec<Document>,
}

impl MarkdownExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exporter adding a YAML front-matter header to every document
    pub fn with_front_matter() -> Self {
        Self {
            front_matter: true,
            ..Self::default()
        }
    }

    pub fn metadata(&self) -> Option<&ModuleMetadata> {
        self.metadata.as_ref()
    }

    fn root(&self) -> Result<&Path, ExportError> {
        self.root.as_deref().ok_or(ExportError::NotInitialized)
    }

    fn claim_name(&mut self, dir: &Path, stem: &str, extension: &str) -> PathBuf {
        let taken = self.taken_names.entry(dir.to_path_buf()).or_default();
        dir.join(unique_name(taken, stem, extension))
    }

    /// Directory of `container_id`, relative to the root; unknown containers
    /// map to the root itself
    fn container_dir(&mut self, container_id: &str) -> PathBuf {
        if let Some(dir) = self.container_dirs.get(container_id) {
            return dir.clone();
        }

        // Walk up to the first ancestor with a known directory
        let mut chain: Vec<ItemId> = Vec::new();
        let mut anchor: Option<PathBuf> = None;
        let mut current = Some(container_id.to_string());
        while let Some(id) = current.take() {
            if let Some(dir) = self.container_dirs.get(&id) {
                anchor = Some(dir.clone());
                break;
            }
            if !self.containers.contains_key(&id)
                || chain.contains(&id)
                || chain.len() >= MAX_CONTAINER_DEPTH
            {
                break;
            }
            current = self.containers.get(&id).and_then(|(_, parent)| parent.clone());
            chain.push(id);
        }

        let mut dir = anchor.unwrap_or_default();
        for id in chain.into_iter().rev() {
            let title = self
                .containers
                .get(&id)
                .map(|(title, _)| safe_file_name(title))
                .unwrap_or_default();
            dir = self.claim_name(&dir, &title, "");
            self.container_dirs.insert(id, dir.clone());
        }
        dir
    }

    fn document_path(&mut self, document: &Document) -> PathBuf {
        if let Some(path) = self.document_paths.get(&document.id) {
            return path.clone();
        }
        let dir = self.container_dir(&document.parent_id);
        let path = self.claim_name(&dir, &safe_file_name(&document.title), "md");
        self.document_paths.insert(document.id.clone(), path.clone());
        path
    }

    /// Body with `:/id` links pointing at exported files
    fn rewrite_body(&self, document_path: &Path, body: &str) -> String {
        let from_dir = document_path.parent().unwrap_or(Path::new(""));
        ITEM_LINK_RE
            .replace_all(body, |caps: &regex::Captures| {
                let id = caps[1].to_lowercase();
                match self
                    .resource_paths
                    .get(&id)
                    .or_else(|| self.document_paths.get(&id))
                {
                    Some(target) => relative_link(from_dir, target),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    async fn write_document(&mut self, document: &Document) -> Result<(), ExportError> {
        let relative = self.document_path(document);
        let body = self.rewrite_body(&relative, &document.body);

        let content = if self.front_matter {
            let tags: Vec<String> = self
                .document_labels
                .get(&document.id)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| self.labels.get(id).cloned())
                        .collect()
                })
                .unwrap_or_default();
            let front_matter = FrontMatter {
                title: Some(document.title.clone()),
                created: Some(document.created_time),
                updated: Some(document.updated_time),
                tags: TagList::List(tags),
            };
            render_with_front_matter(&front_matter, &body)?
        } else {
            body
        };

        let path = self.root()?.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl Exporter for MarkdownExporter {
    fn set_metadata(&mut self, metadata: ModuleMetadata) {
        self.metadata = Some(metadata);
    }

    async fn init(&mut self, target_path: &Path, _options: &ExportOptions) -> Result<(), ExportError> {
        tokio::fs::create_dir_all(target_path).await?;
        self.root = Some(target_path.to_path_buf());
        Ok(())
    }

    async fn prepare_for_processing_item_type(
        &mut self,
        item_type: ItemType,
        queue: &[ExportQueueItem],
    ) -> Result<(), ExportError> {
        if item_type != ItemType::Document {
            return Ok(());
        }

        // Claim every document path up front so links between documents
        // resolve no matter the processing order
        for entry in queue {
            if let ItemRef::Loaded(item) = &entry.item
                && let Item::Document(document) = item.as_ref()
            {
                self.document_path(document);
            }
        }

        let root = self.root()?.to_path_buf();
        let ids: Vec<ItemId> = self.containers.keys().cloned().collect();
        for id in ids {
            let dir = self.container_dir(&id);
            tokio::fs::create_dir_all(root.join(dir)).await?;
        }
        Ok(())
    }

    async fn process_resource(
        &mut self,
        attachment: &Attachment,
        payload_path: &Path,
    ) -> Result<(), ExportError> {
        let stem = Path::new(&attachment.title)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.trim().is_empty())
            .map(safe_file_name)
            .unwrap_or_else(|| attachment.id.clone());
        let relative = self.claim_name(
            Path::new(RESOURCE_FOLDER),
            &stem,
            &attachment.file_extension,
        );

        let destination = self.root()?.join(&relative);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(payload_path, &destination).await.map_err(|e| {
            ExportError::IoError(format!(
                "Cannot copy payload of attachment {} from {}: {}",
                attachment.id,
                payload_path.display(),
                e
            ))
        })?;
        self.resource_paths.insert(attachment.id.clone(), relative);
        Ok(())
    }

    async fn process_item(&mut self, _item_type: ItemType, item: &Item) -> Result<(), ExportError> {
        match item {
            Item::Container(container) => {
                self.containers.insert(
                    container.id.clone(),
                    (container.title.clone(), container.parent_id.clone()),
                );
            }
            Item::Document(document) if self.front_matter => {
                self.document_path(document);
                self.pending.push(document.clone());
            }
            Item::Document(document) => self.write_document(document).await?,
            Item::Label(label) => {
                self.labels.insert(label.id.clone(), label.title.clone());
            }
            Item::LabelAssignment(assignment) => {
                self.document_labels
                    .entry(assignment.document_id.clone())
                    .or_default()
                    .push(assignment.label_id.clone());
            }
            Item::Attachment(_) => {}
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ExportError> {
        let pending = std::mem::take(&mut self.pending);
        for document in &pending {
            self.write_document(document).await?;
        }

        if let Some(root) = &self.root {
            info!(
                "Wrote {} documents to {}",
                self.document_paths.len(),
                root.display()
            );
        }
        Ok(())
    }
}

/// Reads Markdown files and directory trees
#[derive(Debug, Default)]
pub struct MarkdownImporter {
    metadata: Option<ModuleMetadata>,
    front_matter: bool,
    source: Option<PathBuf>,
    options: Option<ImportOptions>,
}

/// State shared by every file of one import run
struct ImportRun<'a> {
    store: &'a dyn ItemStore,
    front_matter: bool,
    labels: LabelMatcher,
    /// Attachment id per linked file, so a file linked twice is stored once
    attachments: HashMap<PathBuf, ItemId>,
    documents: usize,
    result: ImportExportResult,
}

impl MarkdownImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Importer reading YAML front matter (title, tags, timestamps)
    pub fn with_front_matter() -> Self {
        Self {
            front_matter: true,
            ..Self::default()
        }
    }

    pub fn metadata(&self) -> Option<&ModuleMetadata> {
        self.metadata.as_ref()
    }
}

fn is_document_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DOCUMENT_EXTENSIONS.iter().any(|d| d.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Local file a link target points at, relative to `base_dir`
fn local_link_target(base_dir: &Path, target: &str) -> Option<PathBuf> {
    if target.contains("://")
        || target.starts_with(":/")
        || target.starts_with('#')
        || target.starts_with("mailto:")
        || target.starts_with("data:")
    {
        return None;
    }
    let target = target.split('#').next().unwrap_or(target);
    let decoded = urlencoding::decode(target).ok()?;
    Some(base_dir.join(&*decoded))
}

impl ImportRun<'_> {
    /// Store linked local files as attachments and point the links at them
    async fn link_attachments(&mut self, base_dir: &Path, body: &str) -> Result<String, ImportError> {
        let mut replacements: HashMap<String, ItemId> = HashMap::new();

        let targets: Vec<String> = MARKDOWN_LINK_RE
            .captures_iter(body)
            .map(|caps| caps[2].to_string())
            .collect();
        for target in targets {
            if replacements.contains_key(&target) {
                continue;
            }
            let Some(path) = local_link_target(base_dir, &target) else {
                continue;
            };
            if is_document_file(&path) || !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }
            let canonical = tokio::fs::canonicalize(&path).await?;
            if !tokio::fs::metadata(&canonical).await?.is_file() {
                continue;
            }

            let id = match self.attachments.get(&canonical) {
                Some(id) => id.clone(),
                None => {
                    let payload = tokio::fs::read(&canonical).await?;
                    let title = canonical
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    let extension = canonical
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("")
                        .to_string();
                    let attachment = Attachment::new(
                        title,
                        mime_for_extension(&extension),
                        extension.as_str(),
                    );
                    let saved = self.store.save_attachment(attachment, &payload).await?;
                    self.attachments.insert(canonical, saved.id.clone());
                    saved.id
                }
            };
            replacements.insert(target, id);
        }

        if replacements.is_empty() {
            return Ok(body.to_string());
        }
        Ok(MARKDOWN_LINK_RE
            .replace_all(body, |caps: &regex::Captures| match replacements.get(&caps[2]) {
                Some(id) => format!("{}:/{}{}", &caps[1], id, &caps[3]),
                None => caps[0].to_string(),
            })
            .into_owned())
    }

    async fn import_file(&mut self, path: &Path, container_id: &str) -> Result<(), ImportError> {
        let text = tokio::fs::read_to_string(path).await?;
        let mut title = source_title(path, false);
        let mut body = text.as_str();
        let mut front_matter = FrontMatter::default();

        if self.front_matter {
            let (header, rest) = split_front_matter(&text);
            if let Some(header) = header {
                body = rest;
                match serde_yaml::from_str::<FrontMatter>(header) {
                    Ok(parsed) => front_matter = parsed,
                    Err(e) => {
                        let message = format!(
                            "Invalid front matter in {}: {}",
                            path.display(),
                            e
                        );
                        warn!("{}", message);
                        self.result.warn(message);
                    }
                }
            }
        }
        if let Some(t) = front_matter.title.as_ref().filter(|t| !t.trim().is_empty()) {
            title = t.trim().to_string();
        }

        let base_dir = path.parent().unwrap_or(Path::new("."));
        let body = self.link_attachments(base_dir, body).await?;

        let mut document = Document::new(container_id, title, body);
        if let Some(created) = front_matter.created {
            document.created_time = created;
        }
        if let Some(updated) = front_matter.updated {
            document.updated_time = updated;
        }
        let document = self.store.save_document(document).await?;
        self.labels
            .assign(self.store, &document.id, &front_matter.tags.to_vec())
            .await?;
        self.documents += 1;
        Ok(())
    }

    async fn import_dir(&mut self, dir: &Path, container_id: &str) -> Result<(), ImportError> {
        let mut queue: VecDeque<(PathBuf, ItemId)> = VecDeque::new();
        queue.push_back((dir.to_path_buf(), container_id.to_string()));

        while let Some((dir, container_id)) = queue.pop_front() {
            let mut entries = Vec::new();
            let mut read_dir = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                entries.push(entry.path());
            }
            entries.sort();

            for path in entries {
                if is_hidden(&path) {
                    continue;
                }
                if tokio::fs::metadata(&path).await?.is_dir() {
                    if path.file_name().and_then(|n| n.to_str()) == Some(RESOURCE_FOLDER) {
                        continue;
                    }
                    let child = Container::new(source_title(&path, true)).with_parent(&container_id);
                    let child = self.store.save_container(child).await?;
                    queue.push_back((path, child.id));
                } else if is_document_file(&path) {
                    self.import_file(&path, &container_id).await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Importer for MarkdownImporter {
    fn set_metadata(&mut self, metadata: ModuleMetadata) {
        self.metadata = Some(metadata);
    }

    async fn init(&mut self, source_path: &Path, options: &ImportOptions) -> Result<(), ImportError> {
        let metadata = tokio::fs::metadata(source_path).await?;
        if metadata.is_file() && !is_document_file(source_path) {
            return Err(ImportError::ValidationError(format!(
                "{} is not a Markdown or text file",
                source_path.display()
            )));
        }
        self.source = Some(source_path.to_path_buf());
        self.options = Some(options.clone());
        Ok(())
    }

    async fn exec(
        &mut self,
        result: ImportExportResult,
        store: &dyn ItemStore,
    ) -> Result<ImportExportResult, ImportError> {
        let (Some(source), Some(options)) = (&self.source, &self.options) else {
            return Err(ImportError::NotInitialized);
        };

        let is_dir = tokio::fs::metadata(source).await?.is_dir();
        let parent = parent_container(store, options, &source_title(source, is_dir)).await?;

        let mut run = ImportRun {
            store,
            front_matter: self.front_matter,
            labels: LabelMatcher::new(),
            attachments: HashMap::new(),
            documents: 0,
            result,
        };
        if is_dir {
            run.import_dir(source, &parent.id).await?;
        } else {
            run.import_file(source, &parent.id).await?;
        }

        info!(
            "Imported {} documents and {} attachments from {}",
            run.documents,
            run.attachments.len(),
            source.display()
        );
        Ok(run.result)
    }
}
