//! Keyword retrieval over the knowledge store.
//!
//! A document is relevant when any significant query word occurs in its
//! content. Results keep store order and are not ranked; this is a stand-in
//! until documents carry embeddings.

use std::sync::LazyLock;

use regex::Regex;

use frontdesk_core::types::KnowledgeDocument;

/// Words shorter than this are treated as noise ("how", "is", "the").
pub const MIN_TOKEN_CHARS: usize = 4;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[[:alnum:]]+").expect("Invalid word regex"));

/// Lowercased alphanumeric words of `query` with at least
/// [`MIN_TOKEN_CHARS`] characters, deduplicated in first-seen order.
pub fn tokenize(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut tokens: Vec<String> = Vec::new();
    for m in WORD_RE.find_iter(&lowered) {
        let word = m.as_str();
        if word.chars().count() >= MIN_TOKEN_CHARS && !tokens.iter().any(|t| t == word) {
            tokens.push(word.to_string());
        }
    }
    tokens
}

/// Select up to `limit` documents whose content contains any query token.
pub fn retrieve<'a>(
    query: &str,
    documents: &'a [KnowledgeDocument],
    limit: usize,
) -> Vec<&'a KnowledgeDocument> {
    let tokens = tokenize(query);
    if tokens.is_empty() || limit == 0 {
        return Vec::new();
    }

    documents
        .iter()
        .filter(|doc| {
            let content = doc.content.to_lowercase();
            tokens.iter().any(|t| content.contains(t.as_str()))
        })
        .take(limit)
        .collect()
}
