//! Domain types shared by the lexical, vector and hybrid engines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Prefix put in front of paragraphs detected as tabular.
pub const TABLE_MARKER: &str = "【表格】";
/// Prefix put in front of paragraphs detected as mathematical.
pub const FORMULA_MARKER: &str = "【公式】";

/// Dense 0-based position of a document inside a snapshot.
pub type DocId = usize;
pub type StructuredInfo = BTreeMap<String, serde_json::Value>;

/// The unit of retrieval.
///
/// - `title`: display name, derived from the source file name
/// - `content`: normalized body; tabular/mathematical paragraphs carry
///   [`TABLE_MARKER`] / [`FORMULA_MARKER`]
/// - `paragraphs`: the untagged non-empty paragraphs, in order
/// - `format_source`: short code of the originating format (`PDF`, `RIS`, ...)
/// - `file_path`: stable external key of the document
/// - `structured_info`: auxiliary metadata, opaque to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub paragraphs: Vec<String>,
    pub format_source: String,
    pub file_path: String,
    #[serde(default)]
    pub structured_info: StructuredInfo,
}

impl DocumentRecord {
    /// Text fed to both the embedder and the lexical index.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }

    pub fn has_table(&self) -> bool {
        self.content.contains(TABLE_MARKER)
    }

    pub fn has_formula(&self) -> bool {
        self.content.contains(FORMULA_MARKER)
    }
}

/// Post-ranking predicate on structurally marked paragraph types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFilter {
    #[default]
    None,
    Table,
    Formula,
}

impl ContentFilter {
    pub fn matches(self, doc: &DocumentRecord) -> bool {
        match self {
            ContentFilter::None => true,
            ContentFilter::Table => doc.has_table(),
            ContentFilter::Formula => doc.has_formula(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentFilter::None => "none",
            ContentFilter::Table => "table",
            ContentFilter::Formula => "formula",
        }
    }
}

impl fmt::Display for ContentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentFilter {
    type Err = Error;

    /// Accepts the English names as well as the collection's Chinese labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "all" | "全部" => Ok(ContentFilter::None),
            "table" | "表格" | "含表格" => Ok(ContentFilter::Table),
            "formula" | "公式" | "含公式" => Ok(ContentFilter::Formula),
            other => Err(Error::InvalidArgument(format!("unknown content filter '{other}'"))),
        }
    }
}

/// One ranked hit, carrying the resolved record for caller convenience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub score: f32,
    pub document: DocumentRecord,
}
