//! Sentence-aware chunking of refined transcripts

/// Default maximum chunk length in characters
pub const DEFAULT_CHUNK_CHARS: usize = 900;

/// Split text into roughly sentence-sized chunks.
///
/// Sentences are accumulated until adding the next one would exceed
/// `max_chars`; breaks happen only at sentence boundaries, so a single
/// oversized sentence becomes its own chunk.
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut current_length = 0usize;

    for sentence in split_sentences(text) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let sentence_len = sentence.chars().count();
        if current_length + sentence_len + 1 > max_chars && !buffer.is_empty() {
            chunks.push(buffer.join(" "));
            buffer = vec![sentence];
            current_length = sentence_len;
        } else {
            buffer.push(sentence);
            current_length += sentence_len + 1;
        }
    }
    if !buffer.is_empty() {
        chunks.push(buffer.join(" "));
    }
    chunks
}

/// Split on sentence-terminating punctuation followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut prev_terminator = false;

    for (idx, ch) in text.char_indices() {
        if prev_terminator && ch.is_whitespace() {
            sentences.push(&text[start..idx]);
            start = idx + ch.len_utf8();
        }
        prev_terminator = matches!(ch, '.' | '!' | '?');
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}
