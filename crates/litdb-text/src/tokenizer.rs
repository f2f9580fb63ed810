use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, INDEXED, STORED};
use std::str::CharIndices;

use tantivy::tokenizer::{LowerCaser, TextAnalyzer, Token, TokenStream, Tokenizer};
use tantivy::Index;

pub const ANALYZER_NAME: &str = "litdb_whitespace_lower";
pub const DOC_ID_FIELD: &str = "doc_id";
pub const TEXT_FIELD: &str = "text";

/// Splits on every Unicode whitespace character (U+3000, U+00A0, ...), not
/// only the ASCII ones tantivy's `WhitespaceTokenizer` knows.
#[derive(Clone, Default)]
pub struct UnicodeWhitespaceTokenizer {
	token: Token,
}

pub struct UnicodeWhitespaceTokenStream<'a> {
	text: &'a str,
	chars: CharIndices<'a>,
	token: &'a mut Token,
}

impl Tokenizer for UnicodeWhitespaceTokenizer {
	type TokenStream<'a> = UnicodeWhitespaceTokenStream<'a>;

	fn token_stream<'a>(&'a mut self, text: &'a str) -> UnicodeWhitespaceTokenStream<'a> {
		self.token.reset();
		UnicodeWhitespaceTokenStream { text, chars: text.char_indices(), token: &mut self.token }
	}
}

impl UnicodeWhitespaceTokenStream<'_> {
	fn token_end(&mut self) -> usize {
		(&mut self.chars)
			.find(|(_, c)| c.is_whitespace())
			.map(|(offset, _)| offset)
			.unwrap_or(self.text.len())
	}
}

impl TokenStream for UnicodeWhitespaceTokenStream<'_> {
	fn advance(&mut self) -> bool {
		self.token.text.clear();
		self.token.position = self.token.position.wrapping_add(1);
		while let Some((offset_from, c)) = self.chars.next() {
			if !c.is_whitespace() {
				let offset_to = self.token_end();
				self.token.offset_from = offset_from;
				self.token.offset_to = offset_to;
				self.token.text.push_str(&self.text[offset_from..offset_to]);
				return true;
			}
		}
		false
	}

	fn token(&self) -> &Token {
		self.token
	}

	fn token_mut(&mut self) -> &mut Token {
		self.token
	}
}

/// Lower-case, whitespace-split analyzer shared by indexing and querying.
pub fn build_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(UnicodeWhitespaceTokenizer::default())
		.filter(LowerCaser)
		.build()
}

/// Normalize text into the lexical tokens the index stores.
pub fn tokenize(text: &str) -> Vec<String> {
	let mut analyzer = build_analyzer();
	let mut stream = analyzer.token_stream(text);
	let mut tokens = Vec::new();
	while stream.advance() {
		tokens.push(stream.token().text.clone());
	}
	tokens
}

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _doc_id_field = schema_builder.add_u64_field(DOC_ID_FIELD, INDEXED | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(ANALYZER_NAME).set_index_option(IndexRecordOption::WithFreqs);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	let _text_field = schema_builder.add_text_field(TEXT_FIELD, text_options);
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(ANALYZER_NAME, build_analyzer());
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lowercases_and_splits_on_whitespace() {
		assert_eq!(tokenize("  Deep\tLearning\nCNN-RNN "), vec!["deep", "learning", "cnn-rnn"]);
	}

	#[test]
	fn splits_on_ideographic_and_no_break_spaces() {
		assert_eq!(tokenize("机器学习\u{3000}研究进展"), vec!["机器学习", "研究进展"]);
		assert_eq!(tokenize("Deep\u{00A0}Learning"), vec!["deep", "learning"]);
		assert_eq!(tokenize("\u{3000}\u{00A0} "), Vec::<String>::new());
	}

	#[test]
	fn keeps_cjk_runs_intact() {
		assert_eq!(tokenize("机器学习 研究进展"), vec!["机器学习", "研究进展"]);
	}
}
