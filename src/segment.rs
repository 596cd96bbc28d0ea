use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph regex"));

// Terminal punctuation keeps any closing quotes or brackets that follow it.
static SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([^.!?]+[.!?]+["'”’)\]]*)|([^.!?]+$)"#).expect("sentence regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split text into sentences with whitespace normalized to single spaces.
/// Blank lines always end a sentence, punctuated or not.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for paragraph in PARAGRAPH_BREAK.split(text) {
        for m in SENTENCE.find_iter(paragraph) {
            let s = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            if !s.is_empty() {
                sentences.push(s);
            }
        }
    }
    sentences
}

/// Group sentences into narration chunks.
///
/// A sentence joins the open buffer unless that would push the buffer past
/// `max_words`; the buffer is emitted as soon as it holds at least
/// `min_words`. Sentences are never split, so a single sentence longer than
/// `max_words` becomes a chunk of its own.
pub fn segment(text: &str, min_words: usize, max_words: usize) -> Vec<TextChunk> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        if !text.trim().is_empty() {
            warn!("No sentences found in non-empty text; emitting it as one chunk");
            return vec![make_chunk(0, text.split_whitespace().collect::<Vec<_>>().join(" "))];
        }
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_words = 0;
    for sentence in sentences {
        let words = word_count(&sentence);
        if buffer_words > 0 && buffer_words + words > max_words {
            chunks.push(make_chunk(chunks.len(), std::mem::take(&mut buffer)));
            buffer_words = 0;
        }
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(&sentence);
        buffer_words += words;
        // close at min_words; max_words only bounds what may be appended
        if buffer_words >= min_words {
            chunks.push(make_chunk(chunks.len(), std::mem::take(&mut buffer)));
            buffer_words = 0;
        }
    }
    if !buffer.trim().is_empty() {
        chunks.push(make_chunk(chunks.len(), buffer));
    }
    debug!(
        "Segmented {} words into {} chunks (min {}, max {})",
        word_count(text),
        chunks.len(),
        min_words,
        max_words
    );
    chunks
}

fn make_chunk(index: usize, text: String) -> TextChunk {
    TextChunk {
        index,
        word_count: word_count(&text),
        text,
    }
}
