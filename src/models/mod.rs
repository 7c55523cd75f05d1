//! Models module for the SDK
//!
//! Defines the notebook items moved by import/export runs, the converter
//! module descriptors, and the run options/results.

pub mod item;
pub mod module;
pub mod options;

pub use item::{
    Attachment, Container, Document, Item, ItemId, ItemRef, ItemType, Label, LabelAssignment,
    MarkupLanguage, is_valid_item_id, new_item_id,
};
pub use module::{
    FileSystemItem, InstanceFactory, ModuleDescriptor, ModuleMatch, ModuleOptions, ModuleType,
    OutputFormat,
};
pub use options::{
    AUTO_FORMAT, DEFAULT_EXPORT_FORMAT, ExportOptions, ImportExportResult, ImportOptions,
    RunOptions,
};
