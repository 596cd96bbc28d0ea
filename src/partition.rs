use crate::config::PartitionConfig;
use crate::segment::split_sentences;
use crate::story::StoryRecord;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct StoryPart {
    pub index: usize,
    pub total: usize,
    pub title: String,
    pub sentences: Vec<String>,
}

impl StoryPart {
    /// Narration text: the title, then this part's sentences.
    pub fn text(&self) -> String {
        let title = self.title.trim();
        let body = self.sentences.join(" ");
        if title.is_empty() {
            return body;
        }
        let sep = if title.ends_with(['.', '!', '?']) { "" } else { "." };
        format!("{title}{sep}\n\n{body}")
    }

    pub fn is_multi_part(&self) -> bool {
        self.total > 1
    }
}

pub fn estimate_seconds(words: usize, words_per_minute: f64) -> f64 {
    words as f64 / words_per_minute * 60.0
}

pub struct StoryPartitioner<'a> {
    config: &'a PartitionConfig,
}

impl<'a> StoryPartitioner<'a> {
    pub fn new(config: &'a PartitionConfig) -> Self {
        Self { config }
    }

    /// Split a story whose estimated narration exceeds the cap into up to
    /// `max_parts` parts of contiguous sentences. Every part but the last
    /// gets `sentences / parts` sentences; the last takes the rest, so it is
    /// the longest and may still run over the cap.
    pub fn partition(&self, story: &StoryRecord, words_per_minute: f64) -> Vec<StoryPart> {
        let max_duration = self.config.max_duration;
        let max_parts = self.config.max_parts.max(1);
        let sentences = split_sentences(&story.full_story);
        let estimate = estimate_seconds(story.word_count(), words_per_minute);

        if estimate <= max_duration || sentences.len() <= 1 {
            return vec![StoryPart {
                index: 0,
                total: 1,
                title: story.title.clone(),
                sentences,
            }];
        }

        let ideal = (estimate / max_duration).floor() as usize + 1;
        if ideal > max_parts {
            warn!(
                "Story '{}' needs ~{} parts at {:.0}s each, capped at {}; later parts will run long",
                story.title, ideal, max_duration, max_parts
            );
        }
        let parts = ideal.min(max_parts).min(sentences.len());
        info!(
            "Splitting '{}' (~{:.0}s) into {} parts",
            story.title, estimate, parts
        );

        // the last part absorbs the remainder
        let base = sentences.len() / parts;
        let mut rest = sentences.into_iter();
        (0..parts)
            .map(|index| {
                let take = if index + 1 == parts { usize::MAX } else { base };
                StoryPart {
                    index,
                    total: parts,
                    title: story.title.clone(),
                    sentences: rest.by_ref().take(take).collect(),
                }
            })
            .collect()
    }
}
