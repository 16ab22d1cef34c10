//! C1: TokenEstimator — counts tokens, truncates to a budget, and
//! splits long text into overlapping chunks.
//!
//! Grounded on the teacher's `estimate_tokens`/`truncate_to_token_budget`
//! (`caliber-context::lib`), replacing the teacher's crude
//! `len * 0.75` heuristic with a real cl100k_base-compatible tokenizer
//! (`tiktoken-rs`), detected once and falling back to `ceil(len/4.0)`
//! per §4.1 when unavailable.

use once_cell::sync::Lazy;
use ragweave_core::{RagError, RagResult};
use regex::Regex;
use tiktoken_rs::CoreBPE;

static TOKENIZER: Lazy<Option<CoreBPE>> = Lazy::new(|| match tiktoken_rs::cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(err) => {
        tracing::warn!(error = %err, "cl100k_base tokenizer unavailable, falling back to character-length estimate");
        None
    }
});

static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("sentence boundary regex is valid"));

/// Estimates the token count of `text`. Uses the BPE tokenizer when
/// available; otherwise `ceil(len / 4.0)`. Empty text is always 0.
pub fn estimate(text: &str) -> i32 {
    if text.is_empty() {
        return 0;
    }
    match TOKENIZER.as_ref() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len() as i32,
        None => (text.len() as f64 / 4.0).ceil() as i32,
    }
}

/// Converts a token budget into an approximate character budget, used
/// when we need to slice text without re-encoding it token-by-token.
fn approx_chars_for_tokens(tokens: i32) -> usize {
    match TOKENIZER.as_ref() {
        // cl100k_base averages roughly 4 characters per token for
        // English prose; without the real tokenizer we already size
        // budgets in units of 4 characters, so reuse that ratio here.
        Some(_) => (tokens as f64 * 4.0).ceil().max(0.0) as usize,
        None => (tokens as f64 * 4.0).ceil().max(0.0) as usize,
    }
}

fn safe_truncate(text: &str, max_bytes: usize) -> &str {
    if max_bytes >= text.len() {
        return text;
    }
    let mut boundary = max_bytes;
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    &text[..boundary]
}

/// Truncates `text` to fit within `max_tokens`. Appends `"..."` only
/// when truncation actually occurred, reserving one token for the
/// ellipsis. Prefers a sentence boundary in the back half of the
/// allowed range, then a word boundary, then a hard cut.
pub fn truncate_to_limit(text: &str, max_tokens: i32) -> String {
    if max_tokens <= 0 || text.is_empty() {
        return String::new();
    }
    if estimate(text) <= max_tokens {
        return text.to_string();
    }

    let budget_chars = approx_chars_for_tokens(max_tokens - 1).max(1);
    let window = safe_truncate(text, budget_chars.min(text.len()));

    let half = window.len() / 2;
    if let Some(cut) = SENTENCE_BOUNDARY
        .find_iter(window)
        .map(|m| m.end())
        .filter(|&end| end >= half)
        .last()
    {
        return format!("{}...", &window[..cut].trim_end());
    }

    let eighty_pct = window.len() * 8 / 10;
    if let Some(cut) = window
        .char_indices()
        .filter(|&(i, c)| c.is_whitespace() && i >= eighty_pct)
        .map(|(i, _)| i)
        .next_back()
    {
        return format!("{}...", window[..cut].trim_end());
    }

    format!("{}...", window.trim_end())
}

/// Splits `text` into an ordered sequence of chunks, each at most
/// `max_tokens`, preferring sentence-boundary splits. Consecutive
/// chunks overlap by reusing the trailing `overlap` tokens of the
/// previous chunk. `overlap >= max_tokens` is an invalid argument — an
/// overlap that consumes the whole budget can never make progress.
pub fn chunk_text(text: &str, max_tokens: i32, overlap: i32) -> RagResult<Vec<String>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    if overlap >= max_tokens {
        return Err(RagError::InvalidArgument(format!(
            "overlap ({overlap}) must be less than max_tokens ({max_tokens})"
        )));
    }

    let sentences: Vec<&str> = split_sentences(text);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0i32;

    for sentence in sentences {
        let sentence_tokens = estimate(sentence);

        if sentence_tokens > max_tokens {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            chunks.extend(split_oversized(sentence, max_tokens, overlap));
            continue;
        }

        if current_tokens + sentence_tokens > max_tokens && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;
            if overlap > 0 {
                let previous = chunks.last().expect("just pushed a chunk");
                let overlap_text = trailing_tokens(previous, overlap);
                current_tokens = estimate(&overlap_text);
                current = overlap_text;
            }
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(sentence);
        current_tokens += sentence_tokens;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    Ok(chunks)
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BOUNDARY.find_iter(text) {
        sentences.push(text[start..m.end()].trim());
        start = m.end();
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences.retain(|s| !s.is_empty());
    sentences
}

/// Recursively splits a single sentence that alone exceeds `max_tokens`
/// into character-based slices, still honoring `overlap`.
fn split_oversized(sentence: &str, max_tokens: i32, overlap: i32) -> Vec<String> {
    let mut result = Vec::new();
    let budget_chars = approx_chars_for_tokens(max_tokens).max(1);
    let overlap_chars = approx_chars_for_tokens(overlap);
    let step = budget_chars.saturating_sub(overlap_chars).max(1);

    let bytes = sentence.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        let mut end = (start + budget_chars).min(bytes.len());
        while end > start && !sentence.is_char_boundary(end) {
            end -= 1;
        }
        result.push(sentence[start..end].trim().to_string());
        if end >= bytes.len() {
            break;
        }
        let mut next_start = start + step;
        while next_start < bytes.len() && !sentence.is_char_boundary(next_start) {
            next_start += 1;
        }
        start = next_start.max(start + 1);
    }
    result
}

/// Returns an approximation of the trailing `tokens` worth of `text`,
/// used to seed the overlap of the next chunk.
fn trailing_tokens(text: &str, tokens: i32) -> String {
    let chars = approx_chars_for_tokens(tokens).min(text.len());
    let start = text.len() - chars;
    safe_truncate(&text[start..], chars).to_string()
}

/// Splits `max_tokens` into `(chunk, entity, relation)` integer budgets
/// per the configured ratios. Ratios that don't sum to 1.0 ± 0.01 are
/// the caller's responsibility to warn about (§4.1); this function
/// proceeds regardless.
pub fn budget_allocation(
    max_tokens: i32,
    chunk_ratio: f32,
    entity_ratio: f32,
    relation_ratio: f32,
) -> (i32, i32, i32) {
    let chunk = (max_tokens as f32 * chunk_ratio).floor() as i32;
    let entity = (max_tokens as f32 * entity_ratio).floor() as i32;
    let relation = (max_tokens as f32 * relation_ratio).floor() as i32;
    (chunk, entity, relation)
}
