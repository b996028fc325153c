#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ingest::{Chunk, LoadedDocument};

/// Lower bound on characters per token, used when text has few word breaks
const CHARS_PER_TOKEN: usize = 4;

/// Configuration for document chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens
    pub target_chunk_size: usize,
    /// Maximum chunk size in tokens before forced splitting
    pub max_chunk_size: usize,
    /// Minimum chunk size in tokens (smaller chunks will be merged)
    pub min_chunk_size: usize,
    /// Overlap size in tokens between adjacent chunks
    pub overlap_size: usize,
    /// Whether to break at sentence boundaries when possible
    pub sentence_boundary_splitting: bool,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            target_chunk_size: 650,
            max_chunk_size: 1000,
            min_chunk_size: 100,
            overlap_size: 50,
            sentence_boundary_splitting: true,
        }
    }
}

/// Split a loaded document into overlapping, position-tagged chunks.
///
/// The split points depend only on the document text and `config`, so
/// re-ingesting an unchanged file yields identical chunks.
#[inline]
pub fn chunk_document(document: &LoadedDocument, config: &ChunkingConfig) -> Vec<Chunk> {
    let text = normalize_text(&document.text);
    if text.trim().is_empty() {
        return Vec::new();
    }

    let splits = if estimate_token_count(&text) <= config.target_chunk_size {
        vec![text.trim().to_string()]
    } else {
        split_by_semantics(&text, config)
    };

    let mut pieces = merge_small_pieces(splits, config);
    if config.overlap_size > 0 {
        add_overlap(&mut pieces, config.overlap_size);
    }

    let chunks: Vec<Chunk> = pieces
        .into_iter()
        .enumerate()
        .map(|(position, text)| Chunk {
            text,
            source_document: document.name.clone(),
            position,
        })
        .collect();

    debug!(
        "Chunked document '{}' into {} chunks (avg {} tokens)",
        document.name,
        chunks.len(),
        chunks
            .iter()
            .map(|c| estimate_token_count(&c.text))
            .sum::<usize>()
            / chunks.len().max(1)
    );

    chunks
}

/// PDF extraction yields CR/LF line endings and form feeds between pages
fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{c}', "\n\n")
}

/// Split content using semantic boundaries
fn split_by_semantics(content: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut splits = Vec::new();
    let mut current_split = String::new();
    let mut current_token_count = 0;

    for paragraph in content.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        let paragraph_tokens = estimate_token_count(paragraph);

        let pieces = if paragraph_tokens > config.max_chunk_size {
            if config.sentence_boundary_splitting {
                split_by_sentences(paragraph, config)
            } else {
                split_by_words(paragraph, config.target_chunk_size)
            }
        } else {
            vec![paragraph.to_string()]
        };

        for piece in pieces {
            let piece_tokens = estimate_token_count(&piece);
            if current_token_count + piece_tokens > config.target_chunk_size
                && !current_split.trim().is_empty()
            {
                splits.push(current_split.trim().to_string());
                current_split.clear();
                current_token_count = 0;
            }

            current_split.push_str(&piece);
            current_split.push_str("\n\n");
            current_token_count += piece_tokens;
        }
    }

    if !current_split.trim().is_empty() {
        splits.push(current_split.trim().to_string());
    }

    splits
}

/// Split text by sentences, falling back to words for oversized sentences
fn split_by_sentences(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut splits = Vec::new();
    let mut current_split = String::new();
    let mut current_token_count = 0;

    let sentences = text
        .split_inclusive(['.', '!', '?', '。', '！', '？'])
        .map(str::trim)
        .filter(|s| !s.is_empty());

    for sentence in sentences {
        let sentence_tokens = estimate_token_count(sentence);

        if sentence_tokens > config.max_chunk_size {
            if !current_split.trim().is_empty() {
                splits.push(current_split.trim().to_string());
                current_split.clear();
                current_token_count = 0;
            }
            splits.extend(split_by_words(sentence, config.target_chunk_size));
            continue;
        }

        if current_token_count + sentence_tokens > config.target_chunk_size
            && !current_split.trim().is_empty()
        {
            splits.push(current_split.trim().to_string());
            current_split.clear();
            current_token_count = 0;
        }

        current_split.push_str(sentence);
        current_split.push(' ');
        current_token_count += sentence_tokens;
    }

    if !current_split.trim().is_empty() {
        splits.push(current_split.trim().to_string());
    }

    splits
}

/// Split text by words as a last resort
fn split_by_words(text: &str, target_tokens: usize) -> Vec<String> {
    let mut splits = Vec::new();
    let mut current_split = String::new();
    let mut current_token_count = 0;

    for word in text.split_whitespace() {
        let word_tokens = estimate_token_count(word).max(1);

        if word_tokens > target_tokens {
            if !current_split.trim().is_empty() {
                splits.push(current_split.trim().to_string());
                current_split.clear();
                current_token_count = 0;
            }
            splits.extend(split_by_chars(word, target_tokens));
            continue;
        }

        if current_token_count + word_tokens > target_tokens && !current_split.is_empty() {
            splits.push(current_split.trim().to_string());
            current_split.clear();
            current_token_count = 0;
        }

        current_split.push_str(word);
        current_split.push(' ');
        current_token_count += word_tokens;
    }

    if !current_split.trim().is_empty() {
        splits.push(current_split.trim().to_string());
    }

    splits
}

/// Cut an unbroken run of text (URLs, encoded blobs, unspaced scripts) on char boundaries
fn split_by_chars(word: &str, target_tokens: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks((target_tokens * CHARS_PER_TOKEN).max(1))
        .map(|piece| piece.iter().collect())
        .collect()
}

/// Merge pieces below the minimum size into their predecessor
fn merge_small_pieces(pieces: Vec<String>, config: &ChunkingConfig) -> Vec<String> {
    let mut merged: Vec<(String, usize)> = Vec::with_capacity(pieces.len());

    for piece in pieces {
        let tokens = estimate_token_count(&piece);
        if let Some((last, last_tokens)) = merged.last_mut() {
            if (tokens < config.min_chunk_size || *last_tokens < config.min_chunk_size)
                && *last_tokens + tokens <= config.max_chunk_size
            {
                last.push_str("\n\n");
                last.push_str(&piece);
                *last_tokens += tokens;
                continue;
            }
        }
        merged.push((piece, tokens));
    }

    merged.into_iter().map(|(piece, _)| piece).collect()
}

/// Prefix every piece after the first with the tail of its predecessor
fn add_overlap(pieces: &mut [String], overlap_tokens: usize) {
    for i in (1..pieces.len()).rev() {
        let overlap_text = extract_overlap_text(&pieces[i - 1], overlap_tokens);
        if !overlap_text.is_empty() {
            pieces[i] = format!("{}\n\n{}", overlap_text, pieces[i]);
        }
    }
}

/// Extract overlap text from the end of a chunk
fn extract_overlap_text(content: &str, overlap_tokens: usize) -> String {
    let words: Vec<&str> = content.split_whitespace().collect();
    let word_count = (overlap_tokens as f64 * 0.75) as usize; // Rough word-to-token ratio

    if word_count == 0 || words.len() <= word_count {
        return String::new();
    }

    words[words.len() - word_count..].join(" ")
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();
    let word_estimate = (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize;

    // Text without spaces still costs tokens
    word_estimate.max(text.chars().count() / CHARS_PER_TOKEN)
}
