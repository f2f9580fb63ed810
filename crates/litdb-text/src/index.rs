use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, TantivyError, Term};
use tracing::debug;

use litdb_core::types::DocId;
use litdb_core::{Error, Result};

use crate::tokenizer::{build_schema, register_tokenizer, tokenize, DOC_ID_FIELD, TEXT_FIELD};

const WRITER_HEAP_BYTES: usize = 50_000_000;

fn lexical_err(e: TantivyError) -> Error {
	Error::Lexical(e.to_string())
}

/// BM25 scorer over the token streams of a whole corpus.
///
/// Document ids are the positions of the texts passed to [`LexicalIndex::build`].
pub struct LexicalIndex {
	searcher: Searcher,
	doc_id_field: Field,
	text_field: Field,
	num_docs: usize,
}

impl LexicalIndex {
	pub fn build<S: AsRef<str>>(texts: &[S]) -> Result<Self> {
		if texts.is_empty() { return Err(Error::EmptyCorpus); }
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let doc_id_field = schema.get_field(DOC_ID_FIELD).map_err(lexical_err)?;
		let text_field = schema.get_field(TEXT_FIELD).map_err(lexical_err)?;

		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(lexical_err)?;
		for (doc_id, text) in texts.iter().enumerate() {
			writer.add_document(doc!(
				doc_id_field => doc_id as u64,
				text_field => text.as_ref().to_string(),
			)).map_err(lexical_err)?;
		}
		writer.commit().map_err(lexical_err)?;

		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(lexical_err)?;
		let searcher = reader.searcher();
		debug!(docs = texts.len(), "lexical index built");
		Ok(Self { searcher, doc_id_field, text_field, num_docs: texts.len() })
	}

	pub fn len(&self) -> usize { self.num_docs }

	pub fn is_empty(&self) -> bool { self.num_docs == 0 }

	/// Score every document against pre-tokenized query terms.
	///
	/// The returned vector is indexed by document id and covers the whole
	/// corpus; documents sharing no term with the query score zero.
	pub fn score(&self, query_tokens: &[String]) -> Result<Vec<f32>> {
		let mut scores = vec![0.0f32; self.num_docs];
		if query_tokens.is_empty() { return Ok(scores); }

		let clauses: Vec<(Occur, Box<dyn Query>)> = query_tokens
			.iter()
			.map(|token| {
				let term = Term::from_field_text(self.text_field, token);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		let query = BooleanQuery::new(clauses);
		let top_docs = self.searcher.search(&query, &TopDocs::with_limit(self.num_docs)).map_err(lexical_err)?;
		for (score, addr) in top_docs {
			let doc: TantivyDocument = self.searcher.doc(addr).map_err(lexical_err)?;
			let doc_id = doc
				.get_first(self.doc_id_field)
				.and_then(|v| v.as_u64())
				.ok_or_else(|| Error::Lexical("stored doc_id missing".into()))? as DocId;
			if let Some(slot) = scores.get_mut(doc_id) { *slot = score; }
		}
		Ok(scores)
	}

	/// Tokenize `query` with the index analyzer, then [`score`](Self::score) it.
	pub fn score_text(&self, query: &str) -> Result<Vec<f32>> {
		self.score(&tokenize(query))
	}
}
