use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const ANALYZER_NAME: &str = "text_with_stopwords";

/// Analyzer for the `text_plain` field, which keeps stop words so a query made
/// only of stop words can still match.
pub const PLAIN_ANALYZER_NAME: &str = "text_plain";

pub const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having","i","me","my","we","our","you","your","about","tell","please",
];

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _id_field = schema_builder.add_text_field("id", STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(ANALYZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	let _text_field = schema_builder.add_text_field("text", text_options);
	let plain_indexing = TextFieldIndexing::default().set_tokenizer(PLAIN_ANALYZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let _plain_field = schema_builder.add_text_field("text_plain", TextOptions::default().set_indexing_options(plain_indexing));
	schema_builder.build()
}

pub fn build_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| (*s).to_string())))
		.build()
}

pub fn build_plain_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default()).filter(LowerCaser).build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(ANALYZER_NAME, build_analyzer());
	index.tokenizers().register(PLAIN_ANALYZER_NAME, build_plain_analyzer());
}

/// Edit distance allowed for a keyword, following the usual "AUTO" fuzziness:
/// exact for 1-2 chars, one edit for 3-5, two edits beyond.
pub fn fuzzy_distance(term: &str) -> u8 {
	match term.chars().count() {
		0..=2 => 0,
		3..=5 => 1,
		_ => 2,
	}
}
