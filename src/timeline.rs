//! Places narration clips and their captions on one time axis.

use crate::config::TimelineConfig;
use crate::narration::TimedChunk;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub timed: TimedChunk,
    pub narration_start: f64,
    pub caption_start: f64,
    pub caption_end: f64,
}

impl TimelineEntry {
    pub fn caption_duration(&self) -> f64 {
        self.caption_end - self.caption_start
    }

    pub fn narration_end(&self) -> f64 {
        self.narration_start + self.timed.audio_duration
    }
}

#[derive(Debug, Clone)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
    /// "Part X of Y" card shown at time 0 for multi-part stories.
    pub part_label: Option<Caption>,
    /// Silence before the first narration clip.
    pub lead_in: f64,
    pub transition_gap: f64,
    /// Length of the concatenated narration track, lead-in included.
    pub narration_duration: f64,
}

impl Timeline {
    pub fn captions(&self) -> Vec<Caption> {
        self.part_label
            .iter()
            .cloned()
            .chain(self.entries.iter().map(|e| Caption {
                start: e.caption_start,
                end: e.caption_end,
                text: e.timed.chunk.text.clone(),
            }))
            .collect()
    }

    pub fn narration_clips(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.timed.audio.clone()).collect()
    }

    /// Overall span once a background of the given length is laid under it.
    pub fn total_duration(&self, background: f64) -> f64 {
        self.narration_duration.max(background)
    }

    /// Drop trailing entries whose narration would end after `cap`.
    /// The first entry is always kept. Returns how many were dropped.
    pub fn truncate_to(&mut self, cap: f64) -> usize {
        let keep = self
            .entries
            .iter()
            .position(|e| e.narration_end() > cap + 1e-9)
            .unwrap_or(self.entries.len())
            .max(1)
            .min(self.entries.len());
        let dropped = self.entries.len() - keep;
        self.entries.truncate(keep);
        self.narration_duration = self
            .entries
            .last()
            .map(|e| e.narration_end())
            .unwrap_or(0.0);
        dropped
    }
}

pub struct TimelineBuilder<'a> {
    config: &'a TimelineConfig,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(config: &'a TimelineConfig) -> Self {
        Self { config }
    }

    /// Lay chunks out back to back. `part` is `(index, total)`, zero-based
    /// index; a label and lead-in are added only when `total > 1`.
    pub fn build(&self, chunks: Vec<TimedChunk>, part: Option<(usize, usize)>) -> Timeline {
        let cfg = self.config;
        let (part_label, lead_in) = match part {
            Some((index, total)) if total > 1 => (
                Some(Caption {
                    start: 0.0,
                    end: cfg.part_label_duration,
                    text: format!("Part {} of {}", index + 1, total),
                }),
                cfg.part_padding,
            ),
            _ => (None, 0.0),
        };

        let mut t = lead_in;
        let mut entries = Vec::with_capacity(chunks.len());
        for timed in chunks {
            let caption_start = (t + cfg.start_delay).max(0.0);
            let caption_duration = (timed.audio_duration * cfg.duration_factor).max(cfg.min_caption);
            let entry = TimelineEntry {
                narration_start: t,
                caption_start,
                caption_end: caption_start + caption_duration,
                timed,
            };
            t += entry.timed.audio_duration + cfg.transition_gap;
            entries.push(entry);
        }
        let narration_duration = entries.last().map(|e| e.narration_end()).unwrap_or(0.0);
        debug!(
            "Timeline: {} entries, narration {:.2}s, lead-in {:.2}s",
            entries.len(),
            narration_duration,
            lead_in
        );

        Timeline {
            entries,
            part_label,
            lead_in,
            transition_gap: cfg.transition_gap,
            narration_duration,
        }
    }
}
