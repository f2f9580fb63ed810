use std::fs;
use std::path::Path;
use std::sync::Arc;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::{Figment, Jail};
use tempfile::TempDir;

use litdb_core::config::{Config, Settings};
use litdb_core::data_processor::{normalize_document, write_processed, DataProcessor, ExtractorRegistry};
use litdb_core::traits::Extractor;
use litdb_core::types::{ContentFilter, DocumentRecord, FORMULA_MARKER, TABLE_MARKER};
use litdb_core::Error;

#[test]
fn process_directory_picks_up_plain_text_formats() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("b.md"), "# Deep learning\n\nBody text").unwrap();
    fs::write(dir.join("a.txt"), "Short text").unwrap();
    fs::write(dir.join("notes.rs"), "fn main() {}").unwrap();

    let processor = DataProcessor::new();
    let records = processor.process_directory(dir).expect("process");

    assert_eq!(records.len(), 2, "only collection formats are extracted");
    assert_eq!(records[0].title, "a.txt");
    assert_eq!(records[0].format_source, "TXT");
    assert_eq!(records[0].content, "Short text");
    assert_eq!(records[1].title, "b.md");
    assert_eq!(records[1].paragraphs, vec!["# Deep learning".to_string(), "Body text".to_string()]);
}

#[test]
fn formats_without_an_extractor_are_skipped() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("scan.pdf"), b"%PDF-1.4").unwrap();
    fs::write(tmp.path().join("paper.txt"), "machine learning").unwrap();

    let records = DataProcessor::new().process_directory(tmp.path()).expect("process");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "paper.txt");
}

#[test]
fn missing_directory_is_reported() {
    let tmp = TempDir::new().unwrap();
    let err = DataProcessor::new().process_directory(&tmp.path().join("nope")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

struct RisStub;

impl Extractor for RisStub {
    fn extensions(&self) -> &[&'static str] { &["ris"] }

    fn extract(&self, path: &Path) -> litdb_core::Result<DocumentRecord> {
        let mut record = normalize_document(path, "Attention is all you need", 0);
        record.title = "Attention".to_string();
        Ok(record)
    }
}

#[test]
fn registered_extractors_resolve_by_extension() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ref.RIS");
    fs::write(&path, "TY  - JOUR").unwrap();

    let mut registry = ExtractorRegistry::with_defaults();
    assert!(matches!(registry.extract(&path), Err(Error::UnsupportedFormat(_))));
    registry.register(Arc::new(RisStub));
    let record = registry.extract(&path).expect("extract");
    assert_eq!(record.title, "Attention");
    assert_eq!(record.format_source, "RIS");
}

#[test]
fn normalization_tags_tables_and_formulas() {
    let raw = "Intro paragraph\n\n| model | acc |\n| CNN | 95.2% |\n\nloss $L = x^2$";
    let record = normalize_document(Path::new("/data/raw/ml.txt"), raw, raw.len() as u64);

    assert_eq!(record.paragraphs.len(), 3);
    let tagged: Vec<&str> = record.content.split("\n\n").collect();
    assert_eq!(tagged[0], "Intro paragraph");
    assert!(tagged[1].starts_with(TABLE_MARKER));
    assert!(tagged[2].starts_with(FORMULA_MARKER));
    assert!(ContentFilter::Table.matches(&record));
    assert!(ContentFilter::Formula.matches(&record));
    assert_eq!(record.structured_info["file_size"], serde_json::json!(raw.len()));
    assert_eq!(record.structured_info["file_type"], serde_json::json!(".txt"));
}

#[test]
fn processed_records_are_exported_as_json() {
    let tmp = TempDir::new().unwrap();
    let record = normalize_document(Path::new("/data/raw/survey.md"), "text", 4);
    let out = write_processed(&tmp.path().join("processed"), &record).expect("write");
    assert!(out.ends_with("survey.json"));
    let back: DocumentRecord = serde_json::from_slice(&fs::read(out).unwrap()).unwrap();
    assert_eq!(back, record);
}

#[test]
fn content_filter_parses_english_and_chinese_labels() {
    assert_eq!("table".parse::<ContentFilter>().unwrap(), ContentFilter::Table);
    assert_eq!("含公式".parse::<ContentFilter>().unwrap(), ContentFilter::Formula);
    assert_eq!("全部".parse::<ContentFilter>().unwrap(), ContentFilter::None);
    assert!("charts".parse::<ContentFilter>().is_err());
}

#[test]
fn config_merges_file_and_env_over_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
                [data]
                index_dir = "/var/lib/litdb"

                [search]
                top_k = 8
            "#,
        )?;
        jail.set_env("APP_CACHE__ENABLED", "false");

        let config = Config::load().map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.search.top_k, 8);
        assert!(!settings.cache.enabled);
        assert_eq!(settings.embedding.provider, "hash");
        assert_eq!(settings.cache_dir(), Path::new("/var/lib/litdb/cache"));
        let top_k: usize = config.get("search.top_k").map_err(|e| e.to_string())?;
        assert_eq!(top_k, 8);
        Ok(())
    });
}

#[test]
fn invalid_settings_are_rejected() {
    let figment = Figment::from(Serialized::defaults(Settings::default()))
        .merge(Toml::string("[embedding]\nprovider = \"candle\""))
        .merge(Env::prefixed("LITDB_TEST_UNUSED_"));
    let err = Config::from_figment(figment).settings().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}
