//! Built-in converters
//!
//! Each submodule implements one family of formats:
//! - `raw`: directory with one JSON file per item plus a `resources/` folder
//! - `jex`: the raw layout inside an uncompressed tar archive
//! - `markdown`: plain Markdown trees, optionally with YAML front matter
//! - `enex`: Evernote XML exports (import only)
//!
//! The helpers below are shared by the importers.

pub mod enex;
pub mod jex;
pub mod markdown;
pub mod raw;

use crate::import::ImportError;
use crate::models::{Container, ImportOptions, ItemId, Label, LabelAssignment};
use crate::store::ItemStore;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Mime type for a file extension (without the dot)
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "json" => "application/json",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// File extension for a mime type, empty when unknown
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime.to_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/json" => "json",
        "text/plain" => "txt",
        "text/markdown" => "md",
        "text/html" => "html",
        "text/csv" => "csv",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "video/mp4" => "mp4",
        _ => "",
    }
}

/// Title turned into something usable as a file or directory name
pub fn safe_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        "Untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `name` made unique within `taken` by appending ` (n)` before the extension
pub fn unique_name(taken: &mut HashSet<String>, stem: &str, extension: &str) -> String {
    let with_extension = |s: &str| {
        if extension.is_empty() {
            s.to_string()
        } else {
            format!("{}.{}", s, extension)
        }
    };

    let mut candidate = with_extension(stem);
    let mut n = 1;
    while !taken.insert(candidate.to_lowercase()) {
        candidate = with_extension(&format!("{} ({})", stem, n));
        n += 1;
    }
    candidate
}

/// Name for a container created from `source_path`: the file stem for
/// files, the full name for directories
pub fn source_title(source_path: &Path, is_dir: bool) -> String {
    let name = if is_dir {
        source_path.file_name()
    } else {
        source_path.file_stem()
    };
    name.and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("Imported")
        .to_string()
}

/// Container imported items are placed into: the destination container when
/// one was given, otherwise a new top-level container titled `title`
pub async fn parent_container(
    store: &dyn ItemStore,
    options: &ImportOptions,
    title: &str,
) -> Result<Container, ImportError> {
    if let Some(destination) = &options.destination_container {
        return Ok(destination.clone());
    }

    let container = store.save_container(Container::new(title)).await?;
    debug!("Created container \"{}\" ({})", container.title, container.id);
    Ok(container)
}

/// Matches imported tag names against the store's labels by title
/// (case-insensitive), creating labels on demand
#[derive(Debug, Default)]
pub struct LabelMatcher {
    by_title: Option<HashMap<String, Label>>,
}

impl LabelMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label titled `title`, created when the store has none
    pub async fn label(&mut self, store: &dyn ItemStore, title: &str) -> Result<Label, ImportError> {
        if self.by_title.is_none() {
            let labels = store.all_labels().await?;
            self.by_title = Some(
                labels
                    .into_iter()
                    .map(|label| (label.title.to_lowercase(), label))
                    .collect(),
            );
        }

        let key = title.trim().to_lowercase();
        let by_title = self.by_title.get_or_insert_with(HashMap::new);
        if let Some(label) = by_title.get(&key) {
            return Ok(label.clone());
        }

        let label = store.save_label(Label::new(title.trim())).await?;
        by_title.insert(key, label.clone());
        Ok(label)
    }

    /// Attach every tag in `tags` to `document_id`; blank tags are ignored
    pub async fn assign(
        &mut self,
        store: &dyn ItemStore,
        document_id: &ItemId,
        tags: &[String],
    ) -> Result<(), ImportError> {
        let mut assigned: HashSet<ItemId> = HashSet::new();
        for tag in tags.iter().filter(|tag| !tag.trim().is_empty()) {
            let label = self.label(store, tag).await?;
            if assigned.insert(label.id.clone()) {
                store
                    .save_label_assignment(LabelAssignment::new(document_id.clone(), label.id))
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_mime_round_trip() {
        assert_eq!(mime_for_extension("PNG"), "image/png");
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("application/x-unknown"), "");
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("a/b: c?"), "a_b_ c_");
        assert_eq!(safe_file_name("  ..  "), "Untitled");
        assert_eq!(safe_file_name("Plain title"), "Plain title");
    }

    #[test]
    fn test_source_title() {
        assert_eq!(source_title(Path::new("/tmp/My Notes.enex"), false), "My Notes");
        assert_eq!(source_title(Path::new("/tmp/notes.d"), true), "notes.d");
    }

    #[test]
    fn test_unique_name() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name(&mut taken, "Note", "md"), "Note.md");
        assert_eq!(unique_name(&mut taken, "note", "md"), "note (1).md");
        assert_eq!(unique_name(&mut taken, "Note", "md"), "Note (2).md");
        assert_eq!(unique_name(&mut taken, "Note", ""), "Note");
    }

    #[tokio::test]
    async fn test_label_matcher_reuses_existing_title() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        let existing = store.save_label(Label::new("Work")).await.unwrap();

        let mut matcher = LabelMatcher::new();
        let found = matcher.label(&store, "work").await.unwrap();
        assert_eq!(found.id, existing.id);

        let created = matcher.label(&store, "Home").await.unwrap();
        let again = matcher.label(&store, "HOME").await.unwrap();
        assert_eq!(created.id, again.id);
        assert_eq!(store.all_labels().await.unwrap().len(), 2);
    }
}
