//! Ingestion boundary: extractor registry, text normalization and directory walking.
//!
//! Format-specific parsing (PDF, DOCX, OCR, bibliography files, ...) is plugged
//! in through [`Extractor`]; only plain-text formats ship here. Every extractor
//! funnels its raw text through [`normalize_document`] so the engine can rely on
//! the paragraph and marker invariants of [`DocumentRecord`].

use chrono::Utc;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::traits::Extractor;
use crate::types::{DocumentRecord, StructuredInfo, FORMULA_MARKER, TABLE_MARKER};
use crate::{Error, Result};

/// Extensions that belong to the literature collection, whether or not an
/// extractor is registered for them.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "txt", "md", "docx", "pptx", "xlsx", "pdf", "caj", "enw", "ris", "tex", "jpg", "png",
];

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static PAGE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"第\s*\d+\s*页").expect("valid regex"));
static TABLE_CELLS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\|\s*.+\s*\||\+-+\+").expect("valid regex"));
static FORMULA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[^$]+\$|\\\(.*\\\)|\\\[.*\\\]").expect("valid regex"));

/// Split raw text on blank lines and clean every paragraph, dropping empties.
pub fn split_paragraphs(raw: &str) -> Vec<String> {
    PARAGRAPH_BREAK
        .split(raw)
        .map(clean_paragraph)
        .filter(|p| !p.is_empty())
        .collect()
}

fn clean_paragraph(paragraph: &str) -> String {
    let without_pages = PAGE_NUMBER.replace_all(paragraph, "");
    WHITESPACE.replace_all(&without_pages, " ").trim().to_string()
}

/// Prefix a paragraph with the table or formula marker when it looks like one.
/// Tables win when a paragraph matches both.
pub fn tag_paragraph(paragraph: &str) -> String {
    if TABLE_CELLS.is_match(paragraph) {
        format!("{TABLE_MARKER}{paragraph}")
    } else if FORMULA.is_match(paragraph) {
        format!("{FORMULA_MARKER}{paragraph}")
    } else {
        paragraph.to_string()
    }
}

/// Build the normalized record for `path` from its extracted raw text.
pub fn normalize_document(path: &Path, raw: &str, file_size: u64) -> DocumentRecord {
    let paragraphs = split_paragraphs(raw);
    let content = paragraphs.iter().map(|p| tag_paragraph(p)).collect::<Vec<_>>().join("\n\n");
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

    let mut structured_info = StructuredInfo::new();
    structured_info.insert("file_type".into(), format!(".{}", extension.to_lowercase()).into());
    structured_info.insert("file_size".into(), file_size.into());
    structured_info.insert("processing_time".into(), Utc::now().to_rfc3339().into());

    DocumentRecord {
        title: path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
        content,
        paragraphs,
        format_source: extension.to_uppercase(),
        file_path: path.to_string_lossy().to_string(),
        structured_info,
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase())
}

/// Reads UTF-8 text files, falling back to lossy decoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn extensions(&self) -> &[&'static str] {
        &["txt", "md", "tex"]
    }

    fn extract(&self, path: &Path) -> Result<DocumentRecord> {
        let bytes = fs::read(path)?;
        let raw = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).to_string(),
        };
        Ok(normalize_document(path, &raw, fs::metadata(path)?.len()))
    }
}

/// Extension → extractor lookup.
#[derive(Clone)]
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn empty() -> Self {
        Self { by_extension: HashMap::new() }
    }

    /// Registry with the built-in plain-text extractor.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(PlainTextExtractor));
        registry
    }

    /// Later registrations replace earlier ones for the same extension.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        for ext in extractor.extensions() {
            self.by_extension.insert(ext.to_string(), Arc::clone(&extractor));
        }
    }

    pub fn resolve(&self, path: &Path) -> Option<&Arc<dyn Extractor>> {
        extension_of(path).and_then(|ext| self.by_extension.get(&ext))
    }

    pub fn extract(&self, path: &Path) -> Result<DocumentRecord> {
        match self.resolve(path) {
            Some(extractor) => extractor.extract(path),
            None => Err(Error::UnsupportedFormat(path.display().to_string())),
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[derive(Default)]
pub struct DataProcessor {
    registry: ExtractorRegistry,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_registry(registry: ExtractorRegistry) -> Self { Self { registry } }

    pub fn registry_mut(&mut self) -> &mut ExtractorRegistry { &mut self.registry }

    pub fn process_file(&self, path: &Path) -> Result<DocumentRecord> {
        self.registry.extract(path)
    }

    /// Extract every collection file under `data_dir`, in path order.
    ///
    /// Files that fail to extract, or whose format has no registered
    /// extractor, are logged and skipped.
    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<DocumentRecord>> {
        if !data_dir.is_dir() {
            return Err(Error::NotFound(format!("input directory {}", data_dir.display())));
        }
        let files = self.list_supported_files(data_dir);
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no supported documents found");
            return Ok(vec![]);
        }
        let mut records = Vec::with_capacity(files.len());
        for (file_index, file_path) in files.iter().enumerate() {
            if self.registry.resolve(file_path).is_none() {
                warn!(file = %file_path.display(), "no extractor registered for format, skipping");
                continue;
            }
            info!("Processing file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            match self.process_file(file_path) {
                Ok(record) => records.push(record),
                Err(e) => warn!(file = %file_path.display(), error = %e, "failed to process document"),
            }
        }
        info!("Processed {} of {} files", records.len(), files.len());
        Ok(records)
    }

    fn list_supported_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            match extension_of(path) {
                Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => files.push(path.to_path_buf()),
                _ => debug!(file = %path.display(), "ignoring file outside the collection formats"),
            }
        }
        files.sort();
        files
    }
}

/// Export a normalized record as `<stem>.json` under `dir`.
pub fn write_processed(dir: &Path, record: &DocumentRecord) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let stem = Path::new(&record.file_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| record.title.clone());
    let out = dir.join(format!("{stem}.json"));
    fs::write(&out, serde_json::to_vec_pretty(record)?)?;
    Ok(out)
}
