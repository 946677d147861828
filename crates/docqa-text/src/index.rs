use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::{TextAnalyzer, TokenStream};
use tantivy::{doc, Index, IndexReader, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

use docqa_core::types::{Chunk, ChunkId, RankedCandidate};
use docqa_core::{Error, Result};

use crate::tantivy_utils::{build_analyzer, build_plain_analyzer, build_schema, fuzzy_distance, register_tokenizer};

fn index_err(e: impl Display) -> Error {
	Error::Index(e.to_string())
}

fn collect_tokens(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
	let mut stream = analyzer.token_stream(text);
	let mut tokens: Vec<String> = Vec::new();
	while stream.advance() {
		let token = stream.token().text.clone();
		if !tokens.contains(&token) { tokens.push(token); }
	}
	tokens
}

/// In-memory BM25 keyword index over `Chunk::text` with fuzzy term matching.
pub struct KeywordIndex {
	index: Index,
	reader: IndexReader,
	id_field: Field,
	text_field: Field,
	plain_field: Field,
	chunks: HashMap<ChunkId, Arc<Chunk>>,
}

impl KeywordIndex {
	pub fn new() -> Result<Self> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let id_field = schema.get_field("id").map_err(index_err)?;
		let text_field = schema.get_field("text").map_err(index_err)?;
		let plain_field = schema.get_field("text_plain").map_err(index_err)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(index_err)?;
		Ok(Self { index, reader, id_field, text_field, plain_field, chunks: HashMap::new() })
	}

	pub fn len(&self) -> usize { self.chunks.len() }

	pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

	/// Add or replace chunks; a chunk with an existing id replaces the old one.
	pub fn index(&mut self, chunks: &[Arc<Chunk>]) -> Result<()> {
		if chunks.is_empty() { return Ok(()); }
		let mut index_writer = self.index.writer_with_num_threads(1, 20_000_000).map_err(index_err)?;
		for c in chunks {
			index_writer.delete_term(Term::from_field_text(self.id_field, &c.id));
			index_writer.add_document(doc!(
				self.id_field => c.id.clone(),
				self.text_field => c.text.clone(),
				self.plain_field => c.text.clone(),
			)).map_err(index_err)?;
			self.chunks.insert(c.id.clone(), Arc::clone(c));
		}
		index_writer.commit().map_err(index_err)?;
		self.reader.reload().map_err(index_err)?;
		debug!(indexed = chunks.len(), total = self.chunks.len(), "keyword index committed");
		Ok(())
	}

	/// Query keywords after stop-word and punctuation removal.
	///
	/// Falls back to every lowercased word, punctuation still stripped, when
	/// all of them were stop words.
	pub fn keywords(query: &str) -> Vec<String> {
		Self::analyzed(query).1
	}

	/// Keywords plus whether they came from the stop-word-keeping fallback.
	fn analyzed(query: &str) -> (bool, Vec<String>) {
		let keywords = collect_tokens(&mut build_analyzer(), query);
		if keywords.is_empty() { (true, collect_tokens(&mut build_plain_analyzer(), query)) } else { (false, keywords) }
	}

	/// Ranked keyword hits; each keyword is an optional clause matched exactly
	/// (BM25) or within its fuzzy edit distance. Fallback keywords are matched
	/// against the field that still indexes stop words.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<RankedCandidate>> {
		let (plain, keywords) = Self::analyzed(query);
		if keywords.is_empty() || k == 0 { return Ok(Vec::new()); }
		let field = if plain { self.plain_field } else { self.text_field };

		let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
		for kw in &keywords {
			let term = Term::from_field_text(field, kw);
			clauses.push((Occur::Should, Box::new(TermQuery::new(term.clone(), IndexRecordOption::WithFreqs))));
			let distance = fuzzy_distance(kw);
			if distance > 0 { clauses.push((Occur::Should, Box::new(FuzzyTermQuery::new(term, distance, true)))); }
		}
		let q = BooleanQuery::new(clauses);

		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&q, &TopDocs::with_limit(k)).map_err(index_err)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(index_err)?;
			let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) else { continue };
			if let Some(chunk) = self.chunks.get(id) { hits.push((Arc::clone(chunk), Some(score))); }
		}
		Ok(RankedCandidate::rank_list(hits))
	}
}
