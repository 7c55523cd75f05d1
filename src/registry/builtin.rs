//! Built-in module descriptors
//!
//! Order matters: it is the tie-break for extension sniffing and for
//! duplicate `(type, format)` pairs without a default.

use crate::models::{FileSystemItem, ModuleDescriptor, ModuleOptions, OutputFormat};

/// Descriptors for the converters shipped with the SDK
pub fn builtin_modules() -> Vec<ModuleDescriptor> {
    let importers = [
        ModuleOptions::importer("jex")
            .file_extensions(&["jex"])
            .sources(&[FileSystemItem::File])
            .description("Notebook Export File"),
        ModuleOptions::importer("md")
            .file_extensions(&["md", "markdown", "txt"])
            .sources(&[FileSystemItem::File, FileSystemItem::Directory])
            .description("Markdown"),
        ModuleOptions::importer("md_frontmatter")
            .file_extensions(&["md", "markdown", "txt"])
            .sources(&[FileSystemItem::File, FileSystemItem::Directory])
            .description("Markdown + Front Matter"),
        ModuleOptions::importer("raw")
            .sources(&[FileSystemItem::Directory])
            .description("Notebook Export Directory"),
        ModuleOptions::importer("enex")
            .file_extensions(&["enex"])
            .sources(&[FileSystemItem::File])
            .description("Evernote Export File (as Markdown)")
            .implementation("ImporterEnexToMd")
            .is_default(true),
        ModuleOptions::importer("enex")
            .file_extensions(&["enex"])
            .sources(&[FileSystemItem::File])
            .description("Evernote Export File (as HTML)")
            .implementation("ImporterEnexToHtml")
            .output_format(OutputFormat::Html),
    ];

    let exporters = [
        ModuleOptions::exporter("jex")
            .file_extensions(&["jex"])
            .target(FileSystemItem::File)
            .description("Notebook Export File"),
        ModuleOptions::exporter("raw")
            .target(FileSystemItem::Directory)
            .description("Notebook Export Directory"),
        ModuleOptions::exporter("md")
            .target(FileSystemItem::Directory)
            .description("Markdown"),
        ModuleOptions::exporter("md_frontmatter")
            .target(FileSystemItem::Directory)
            .description("Markdown + Front Matter"),
    ];

    importers
        .into_iter()
        .chain(exporters)
        .map(ModuleOptions::into_descriptor)
        .collect()
}
