//! Notebook item models
//!
//! Defines the five item kinds that flow through an export:
//! - Container (notebook / folder, may nest)
//! - Document (note, belongs to exactly one container)
//! - Attachment (binary payload referenced from document bodies)
//! - Label (tag)
//! - LabelAssignment (document <-> label link)

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Item identifier (32 lowercase hex characters for generated ids)
pub type ItemId = String;

/// Generate a new item identifier
pub fn new_item_id() -> ItemId {
    Uuid::new_v4().simple().to_string()
}

/// Whether `id` has the shape of a generated id (32 hex characters)
pub fn is_valid_item_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Matches `:/<id>` links to other items inside a document body
pub(crate) static ITEM_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":/([0-9a-fA-F]{32})").expect("item link regex is valid"));

/// Kind of item held in a store or an export queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Container,
    Attachment,
    Document,
    Label,
    LabelAssignment,
}

impl ItemType {
    /// Order in which item types are dispatched to an exporter.
    ///
    /// Attachments come before the documents that embed them and labels come
    /// before the assignments that reference them.
    pub const EXPORT_ORDER: [ItemType; 5] = [
        ItemType::Container,
        ItemType::Attachment,
        ItemType::Document,
        ItemType::Label,
        ItemType::LabelAssignment,
    ];

    /// Human-readable kind name used in warnings
    pub fn name(&self) -> &'static str {
        match self {
            ItemType::Container => "container",
            ItemType::Attachment => "attachment",
            ItemType::Document => "document",
            ItemType::Label => "label",
            ItemType::LabelAssignment => "label assignment",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Markup language of a document body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupLanguage {
    #[default]
    Markdown,
    Html,
}

/// Container - hierarchical grouping node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: ItemId,
    /// Parent container, `None` for top-level containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,
    pub title: String,
    /// Set while the item is still encrypted at rest
    #[serde(default)]
    pub encryption_applied: bool,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
}

impl Container {
    /// Create a new top-level container
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_item_id(),
            parent_id: None,
            title: title.into(),
            encryption_applied: false,
            created_time: now,
            updated_time: now,
        }
    }

    /// Place this container under `parent_id`
    pub fn with_parent(mut self, parent_id: impl Into<ItemId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Document - a content item inside a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: ItemId,
    pub parent_id: ItemId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub markup_language: MarkupLanguage,
    #[serde(default)]
    pub encryption_applied: bool,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
}

impl Document {
    /// Create a new Markdown document in `parent_id`
    pub fn new(
        parent_id: impl Into<ItemId>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_item_id(),
            parent_id: parent_id.into(),
            title: title.into(),
            body: body.into(),
            markup_language: MarkupLanguage::Markdown,
            encryption_applied: false,
            created_time: now,
            updated_time: now,
        }
    }

    /// Ids of all items linked from the body as `:/<id>`, in first-seen order.
    ///
    /// Links point at attachments or at other documents; callers holding a
    /// store tell the two apart.
    pub fn linked_item_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = Vec::new();
        for caps in ITEM_LINK_RE.captures_iter(&self.body) {
            let id = caps[1].to_lowercase();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

/// Attachment - binary payload referenced by documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub mime: String,
    /// Extension of the payload file, without the leading dot
    #[serde(default)]
    pub file_extension: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub encryption_applied: bool,
    /// Set while the payload file itself is still encrypted
    #[serde(default)]
    pub encryption_blob_encrypted: bool,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
}

impl Attachment {
    /// Create a new attachment description (the payload is stored separately)
    pub fn new(
        title: impl Into<String>,
        mime: impl Into<String>,
        file_extension: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_item_id(),
            title: title.into(),
            mime: mime.into(),
            file_extension: file_extension.into().trim_start_matches('.').to_lowercase(),
            size: 0,
            encryption_applied: false,
            encryption_blob_encrypted: false,
            created_time: now,
            updated_time: now,
        }
    }

    /// File name of the payload: `<id>.<ext>`, or just `<id>` without an extension
    pub fn payload_file_name(&self) -> String {
        if self.file_extension.is_empty() {
            self.id.clone()
        } else {
            format!("{}.{}", self.id, self.file_extension)
        }
    }

    /// Whether the payload file name is a single plain path component
    pub fn has_safe_payload_name(&self) -> bool {
        let name = self.payload_file_name();
        !name.is_empty() && !name.contains("..") && !name.contains(['/', '\\'])
    }
}

/// Label - tag-like classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub encryption_applied: bool,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
}

impl Label {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_item_id(),
            title: title.into(),
            encryption_applied: false,
            created_time: now,
            updated_time: now,
        }
    }
}

/// LabelAssignment - links one document with one label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelAssignment {
    pub id: ItemId,
    pub document_id: ItemId,
    pub label_id: ItemId,
    #[serde(default)]
    pub encryption_applied: bool,
    pub created_time: DateTime<Utc>,
}

impl LabelAssignment {
    pub fn new(document_id: impl Into<ItemId>, label_id: impl Into<ItemId>) -> Self {
        Self {
            id: new_item_id(),
            document_id: document_id.into(),
            label_id: label_id.into(),
            encryption_applied: false,
            created_time: Utc::now(),
        }
    }
}

/// Any loaded item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Item {
    Container(Container),
    Attachment(Attachment),
    Document(Document),
    Label(Label),
    LabelAssignment(LabelAssignment),
}

impl Item {
    pub fn item_type(&self) -> ItemType {
        match self {
            Item::Container(_) => ItemType::Container,
            Item::Attachment(_) => ItemType::Attachment,
            Item::Document(_) => ItemType::Document,
            Item::Label(_) => ItemType::Label,
            Item::LabelAssignment(_) => ItemType::LabelAssignment,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Item::Container(c) => &c.id,
            Item::Attachment(a) => &a.id,
            Item::Document(d) => &d.id,
            Item::Label(l) => &l.id,
            Item::LabelAssignment(la) => &la.id,
        }
    }

    /// Title, for the kinds that carry one
    pub fn title(&self) -> Option<&str> {
        match self {
            Item::Container(c) => Some(&c.title),
            Item::Attachment(a) => Some(&a.title),
            Item::Document(d) => Some(&d.title),
            Item::Label(l) => Some(&l.title),
            Item::LabelAssignment(_) => None,
        }
    }

    /// Whether the item (or, for attachments, its payload) is still encrypted
    pub fn is_still_encrypted(&self) -> bool {
        match self {
            Item::Container(c) => c.encryption_applied,
            Item::Attachment(a) => a.encryption_applied || a.encryption_blob_encrypted,
            Item::Document(d) => d.encryption_applied,
            Item::Label(l) => l.encryption_applied,
            Item::LabelAssignment(la) => la.encryption_applied,
        }
    }
}

/// Reference to an item in an export queue: either a bare id or an
/// already-loaded object that must not be loaded again
#[derive(Debug, Clone, PartialEq)]
pub enum ItemRef {
    Id(ItemId),
    Loaded(Box<Item>),
}

impl ItemRef {
    pub fn id(&self) -> &str {
        match self {
            ItemRef::Id(id) => id,
            ItemRef::Loaded(item) => item.id(),
        }
    }
}
