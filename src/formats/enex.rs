//! Evernote export (ENEX) importer
//!
//! An ENEX file is an XML document holding `<note>` elements, each with a
//! title, an ENML body, timestamps, tags, and base64 encoded resources.
//! Notes become documents, tags become labels and resources become
//! attachments. Each `<en-media hash="…">` tag is replaced by a link to the
//! resource whose payload has that MD5; resources no tag refers to are linked
//! at the end of the body. The body is kept as HTML or reduced to Markdown
//! depending on the constructor used.

use super::{LabelMatcher, extension_for_mime, parent_container, source_title};
use crate::import::{ImportError, Importer};
use crate::models::{
    Attachment, Document, ImportExportResult, ImportOptions, MarkupLanguage, OutputFormat,
};
use crate::resolver::ModuleMetadata;
use crate::store::ItemStore;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDateTime, Utc};
use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Timestamp format used by ENEX (`20240115T103000Z`)
const ENEX_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

static EN_NOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<en-note[^>]*>(.*)</en-note>").expect("en-note regex is valid"));
static EN_MEDIA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<en-media([^>]*?)/>|<en-media([^>]*)>.*?</en-media>")
        .expect("en-media regex is valid")
});
static MEDIA_HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"hash="([0-9a-fA-F]+)""#).expect("media hash regex is valid"));
static BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("break regex is valid"));
static BLOCK_END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</(div|p|h[1-6]|li|tr|ul|ol|blockquote)>").expect("block regex is valid")
});
static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<h([1-6])[^>]*>").expect("heading regex is valid"));
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<li[^>]*>").expect("list item regex is valid"));
static BOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(b|strong)>").expect("bold regex is valid"));
static ITALIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(i|em)>").expect("italic regex is valid"));
static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#).expect("anchor regex is valid")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag regex is valid"));
static BLANK_LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank lines regex is valid"));

/// One `<resource>` of a note
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnexResource {
    /// Base64 payload as found in the file
    pub data: String,
    pub mime: String,
    pub file_name: Option<String>,
}

impl EnexResource {
    pub fn decode(&self) -> Result<Vec<u8>, ImportError> {
        let compact: String = self.data.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map_err(|e| ImportError::ParseError(format!("Invalid resource data: {}", e)))
    }

    /// File extension from the file name, else from the mime type
    pub fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(str::to_lowercase)
            .unwrap_or_else(|| extension_for_mime(&self.mime).to_string())
    }
}

/// One `<note>` of an ENEX file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnexNote {
    pub title: String,
    /// Raw ENML document
    pub content: String,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub resources: Vec<EnexResource>,
}

fn parse_enex_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), ENEX_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse every note of an ENEX document
pub fn parse_enex(xml: &str) -> Result<Vec<EnexNote>, ImportError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut notes = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut note: Option<EnexNote> = None;
    let mut resource: Option<EnexResource> = None;

    loop {
        let text = match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "note" => note = Some(EnexNote::default()),
                    "resource" => resource = Some(EnexResource::default()),
                    _ => {}
                }
                stack.push(name);
                continue;
            }
            Ok(Event::End(e)) => {
                match e.name().as_ref() {
                    b"resource" => {
                        if let (Some(note), Some(resource)) = (note.as_mut(), resource.take()) {
                            note.resources.push(resource);
                        }
                    }
                    b"note" => notes.extend(note.take()),
                    _ => {}
                }
                stack.pop();
                continue;
            }
            Ok(Event::Text(e)) => e
                .unescape()
                .map_err(|e| ImportError::ParseError(format!("Invalid text: {}", e)))?
                .into_owned(),
            Ok(Event::CData(e)) => String::from_utf8_lossy(&e.into_inner()).into_owned(),
            Ok(Event::Eof) => break,
            Ok(_) => continue,
            Err(e) => {
                return Err(ImportError::ParseError(format!(
                    "Invalid ENEX at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        };

        let Some(note) = note.as_mut() else {
            continue;
        };
        let field = stack.last().map(String::as_str).unwrap_or("");
        match (resource.as_mut(), field) {
            (Some(resource), "data") => resource.data.push_str(&text),
            (Some(resource), "mime") => resource.mime.push_str(text.trim()),
            (Some(resource), "file-name") => resource.file_name = Some(text.trim().to_string()),
            (Some(_), _) => {}
            (None, "title") => note.title.push_str(&text),
            (None, "content") => note.content.push_str(&text),
            (None, "created") => note.created = parse_enex_date(&text),
            (None, "updated") => note.updated = parse_enex_date(&text),
            (None, "tag") => note.tags.push(text.trim().to_string()),
            (None, _) => {}
        }
    }

    Ok(notes)
}

/// Lowercase hex MD5 of a decoded payload, as referenced by `<en-media hash>`
pub fn payload_hash(payload: &[u8]) -> String {
    format!("{:x}", Md5::digest(payload))
}

/// Inner HTML of the `<en-note>` element.
///
/// Each `<en-media>` tag is replaced by the entry of `media` keyed by its
/// hash; tags with an unknown hash are dropped.
fn enml_inner_html(content: &str, media: &HashMap<String, String>) -> String {
    let inner = EN_NOTE_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(content);
    EN_MEDIA_RE
        .replace_all(inner, |caps: &regex::Captures| {
            let attributes = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            MEDIA_HASH_RE
                .captures(attributes)
                .and_then(|hash| media.get(&hash[1].to_lowercase()))
                .cloned()
                .unwrap_or_default()
        })
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Reduce ENML markup to Markdown, placing `media` links where their tags sit
pub fn enml_to_markdown(content: &str, media: &HashMap<String, String>) -> String {
    let html = enml_inner_html(content, media);
    let text = BREAK_RE.replace_all(&html, "\n");
    let text = HEADING_RE.replace_all(&text, |caps: &regex::Captures| {
        let level: usize = caps[1].parse().unwrap_or(1);
        format!("\n{} ", "#".repeat(level))
    });
    let text = LIST_ITEM_RE.replace_all(&text, "- ");
    let text = BLOCK_END_RE.replace_all(&text, "\n");
    let text = BOLD_RE.replace_all(&text, "**");
    let text = ITALIC_RE.replace_all(&text, "*");
    let text = ANCHOR_RE.replace_all(&text, "[$2]($1)");
    let text = TAG_RE.replace_all(&text, "");
    let text = decode_entities(&text);

    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    BLANK_LINES_RE
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

fn is_image(attachment: &Attachment) -> bool {
    attachment.mime.starts_with("image/")
}

fn resource_link(attachment: &Attachment, markup: MarkupLanguage) -> String {
    match (markup, is_image(attachment)) {
        (MarkupLanguage::Markdown, true) => format!("![{}](:/{})", attachment.title, attachment.id),
        (MarkupLanguage::Markdown, false) => format!("[{}](:/{})", attachment.title, attachment.id),
        (MarkupLanguage::Html, true) => format!(
            "<img src=\":/{}\" alt=\"{}\"/>",
            attachment.id, attachment.title
        ),
        (MarkupLanguage::Html, false) => {
            format!("<a href=\":/{}\">{}</a>", attachment.id, attachment.title)
        }
    }
}

/// Imports ENEX files as Markdown or HTML documents
#[derive(Debug)]
pub struct EnexImporter {
    metadata: Option<ModuleMetadata>,
    output_format: OutputFormat,
    source: Option<PathBuf>,
    options: Option<ImportOptions>,
}

impl EnexImporter {
    pub fn new(output_format: OutputFormat) -> Self {
        Self {
            metadata: None,
            output_format,
            source: None,
            options: None,
        }
    }

    /// Importer producing Markdown bodies
    pub fn markdown() -> Self {
        Self::new(OutputFormat::Markdown)
    }

    /// Importer keeping the ENML body as HTML
    pub fn html() -> Self {
        Self::new(OutputFormat::Html)
    }

    pub fn metadata(&self) -> Option<&ModuleMetadata> {
        self.metadata.as_ref()
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    fn markup(&self) -> MarkupLanguage {
        match self.output_format {
            OutputFormat::Markdown => MarkupLanguage::Markdown,
            OutputFormat::Html => MarkupLanguage::Html,
        }
    }
}

#[async_trait]
impl Importer for EnexImporter {
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

        let xml = tokio::fs::read_to_string(source).await?;
        let notes = parse_enex(&xml)?;
        let parent = parent_container(store, options, &source_title(source, false)).await?;
        let markup = self.markup();
        let mut labels = LabelMatcher::new();
        let mut attachment_count = 0;

        for note in &notes {
            let mut media: HashMap<String, String> = HashMap::new();
            let mut links: Vec<(String, String)> = Vec::new();
            for resource in &note.resources {
                let payload = match resource.decode() {
                    Ok(payload) => payload,
                    Err(e) => {
                        let message = format!(
                            "Skipped a resource of note \"{}\": {}",
                            note.title, e
                        );
                        warn!("{}", message);
                        result.warn(message);
                        continue;
                    }
                };
                let extension = resource.extension();
                let title = resource
                    .file_name
                    .clone()
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| "untitled".to_string());
                let attachment = Attachment::new(title, resource.mime.clone(), extension);
                let hash = payload_hash(&payload);
                let attachment = store.save_attachment(attachment, &payload).await?;
                let link = resource_link(&attachment, markup);
                media.insert(hash, link.clone());
                links.push((attachment.id, link));
                attachment_count += 1;
            }

            let mut body = match markup {
                MarkupLanguage::Markdown => enml_to_markdown(&note.content, &media),
                MarkupLanguage::Html => enml_inner_html(&note.content, &media),
            };
            // Resources no `<en-media>` tag placed
            let links: Vec<String> = links
                .into_iter()
                .filter(|(id, _)| !body.contains(id.as_str()))
                .map(|(_, link)| link)
                .collect();
            if !links.is_empty() {
                let separator = match markup {
                    MarkupLanguage::Markdown => "\n\n",
                    MarkupLanguage::Html => "\n",
                };
                if !body.is_empty() {
                    body.push_str(separator);
                }
                body.push_str(&links.join(separator));
            }

            let title = if note.title.trim().is_empty() {
                "Untitled".to_string()
            } else {
                note.title.trim().to_string()
            };
            let mut document = Document::new(parent.id.clone(), title, body);
            document.markup_language = markup;
            if let Some(created) = note.created {
                document.created_time = created;
            }
            document.updated_time = note.updated.unwrap_or(document.created_time);
            let document = store.save_document(document).await?;
            labels.assign(store, &document.id, &note.tags).await?;
            debug!("Imported note \"{}\"", document.title);
        }

        info!(
            "Imported {} notes and {} resources from {}",
            notes.len(),
            attachment_count,
            source.display()
        );
        Ok(result)
    }
}
