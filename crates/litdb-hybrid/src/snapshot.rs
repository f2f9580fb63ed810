//! Immutable in-memory state of one built corpus.

use std::collections::BTreeMap;

use litdb_core::types::{DocId, DocumentRecord};
use litdb_core::{Error, Result};
use litdb_text::LexicalIndex;
use litdb_vector::FlatIpIndex;

/// Documents plus both indices, rank-matched by document id.
///
/// Never mutated after construction; a rebuild produces a new one.
pub struct Snapshot {
    generation: u64,
    documents: Vec<DocumentRecord>,
    doc_id_to_index: BTreeMap<String, DocId>,
    vectors: FlatIpIndex,
    lexical: LexicalIndex,
}

impl Snapshot {
    pub(crate) fn new(
        generation: u64,
        documents: Vec<DocumentRecord>,
        doc_id_to_index: BTreeMap<String, DocId>,
        vectors: FlatIpIndex,
        lexical: LexicalIndex,
    ) -> Self {
        Self { generation, documents, doc_id_to_index, vectors, lexical }
    }

    /// Rehydrate from persisted parts, rebuilding the lexical half from the document texts.
    pub(crate) fn assemble(
        generation: u64,
        documents: Vec<DocumentRecord>,
        doc_id_to_index: BTreeMap<String, DocId>,
        vectors: FlatIpIndex,
    ) -> Result<Self> {
        let texts: Vec<String> = documents.iter().map(DocumentRecord::embedding_text).collect();
        let lexical = LexicalIndex::build(&texts)?;
        Ok(Self::new(generation, documents, doc_id_to_index, vectors, lexical))
    }

    pub fn generation(&self) -> u64 { self.generation }

    pub fn documents(&self) -> &[DocumentRecord] { &self.documents }

    pub fn doc_id_to_index(&self) -> &BTreeMap<String, DocId> { &self.doc_id_to_index }

    pub fn vectors(&self) -> &FlatIpIndex { &self.vectors }

    pub fn lexical(&self) -> &LexicalIndex { &self.lexical }

    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    pub fn document(&self, id: DocId) -> Option<&DocumentRecord> { self.documents.get(id) }

    pub fn lookup(&self, file_path: &str) -> Option<(DocId, &DocumentRecord)> {
        let id = *self.doc_id_to_index.get(file_path)?;
        self.documents.get(id).map(|doc| (id, doc))
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("generation", &self.generation)
            .field("documents", &self.documents.len())
            .field("dim", &self.vectors.dim())
            .finish()
    }
}

/// `file_path -> position`, rejecting collisions.
pub fn index_mapping(documents: &[DocumentRecord]) -> Result<BTreeMap<String, DocId>> {
    let mut mapping = BTreeMap::new();
    for (id, doc) in documents.iter().enumerate() {
        if mapping.insert(doc.file_path.clone(), id).is_some() {
            return Err(Error::DuplicateFilePath(doc.file_path.clone()));
        }
    }
    Ok(mapping)
}

/// True when `mapping` is a bijection from the documents' paths onto `0..documents.len()`.
pub(crate) fn mapping_is_consistent(documents: &[DocumentRecord], mapping: &BTreeMap<String, DocId>) -> bool {
    mapping.len() == documents.len()
        && mapping
            .iter()
            .all(|(path, &id)| documents.get(id).is_some_and(|doc| &doc.file_path == path))
}
