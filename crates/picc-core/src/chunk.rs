//! Content hashing and sentence-boundary chunking.
//!
//! [`content_hash`] is the deduplication key for scraped documents.
//! [`chunk_text`] greedily packs whole sentences into chunks of at most
//! `target_size` characters; a single sentence longer than the target
//! becomes its own oversized chunk and is never truncated.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::ContentChunk;

/// Approximate chars-per-token ratio used for `token_count`.
const CHARS_PER_TOKEN: usize = 4;

/// Characters of chunk text mixed into [`chunk_hash`].
const CHUNK_HASH_PREFIX_CHARS: usize = 50;

/// SHA-256 of `text`, lowercase hex.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Identity hash for one chunk: parent hash, index, and a text prefix.
pub fn chunk_hash(content_hash: &str, index: usize, text: &str) -> String {
    let prefix: String = text.chars().take(CHUNK_HASH_PREFIX_CHARS).collect();
    self::content_hash(&format!("{}-{}-{}", content_hash, index, prefix))
}

pub fn estimate_tokens(text: &str) -> i64 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as i64
}

/// Split on sentence terminators (`.`, `!`, `?`) followed by whitespace.
///
/// The terminator stays with its sentence; the whitespace run after it is
/// dropped. Empty pieces are skipped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let next_is_space = chars.peek().map(|(_, n)| n.is_whitespace()).unwrap_or(false);
        if !next_is_space {
            continue;
        }
        let end = i + c.len_utf8();
        let piece = text[start..end].trim();
        if !piece.is_empty() {
            sentences.push(piece);
        }
        while let Some((_, n)) = chars.peek() {
            if !n.is_whitespace() {
                break;
            }
            chars.next();
        }
        start = chars.peek().map(|(j, _)| *j).unwrap_or(text.len());
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Pack sentences into chunks of at most `target_size` characters.
///
/// Chunks joined with a single space reproduce the whitespace-normalized
/// input. Returns an empty vector for blank input.
pub fn chunk_text(text: &str, target_size: usize) -> Vec<String> {
    let target = target_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();

        if current_len > 0 && current_len + 1 + sentence_len > target {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(sentence);
        current_len += sentence_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Chunk a stored document's text into rows ready for batch insertion.
pub fn build_chunks(
    content_id: &str,
    content_hash: &str,
    text: &str,
    target_size: usize,
) -> Vec<ContentChunk> {
    chunk_text(text, target_size)
        .into_iter()
        .enumerate()
        .map(|(index, text)| ContentChunk {
            id: Uuid::new_v4().to_string(),
            content_id: content_id.to_string(),
            chunk_index: index as i64,
            chunk_hash: chunk_hash(content_hash, index, &text),
            token_count: estimate_tokens(&text),
            text,
        })
        .collect()
}
