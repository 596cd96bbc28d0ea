//! Drives stories through segmentation, narration, timing and rendering.

use crate::background::{BackgroundSelector, prepare};
use crate::config::Config;
use crate::media::Toolchain;
use crate::narration::NarrationSynthesizer;
use crate::partition::{StoryPart, StoryPartitioner};
use crate::render::{CompositionRenderer, RenderedClip};
use crate::segment::segment;
use crate::story::{StoryRecord, slugify};
use crate::timeline::{Timeline, TimelineBuilder};
use crate::tts::SpeechEngine;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
pub struct BatchSummary {
    /// (story source id, clip) for every exported part.
    pub rendered: Vec<(String, RenderedClip)>,
    pub failed_parts: usize,
}

pub struct Pipeline<'a, E: SpeechEngine> {
    config: &'a Config,
    engine: &'a E,
    tools: &'a Toolchain,
    selector: &'a BackgroundSelector,
}

impl<'a, E: SpeechEngine> Pipeline<'a, E> {
    pub fn new(
        config: &'a Config,
        engine: &'a E,
        tools: &'a Toolchain,
        selector: &'a BackgroundSelector,
    ) -> Self {
        Self {
            config,
            engine,
            tools,
            selector,
        }
    }

    /// Render every story into `batch_dir`, one part at a time. Failures are
    /// logged and counted; they never stop the batch.
    pub async fn run(&self, stories: &[StoryRecord], batch_dir: &Path, work_root: &Path) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let partitioner = StoryPartitioner::new(&self.config.partition);
        for (i, story) in stories.iter().enumerate() {
            let story_no = i + 1;
            info!(
                "Story {}/{}: '{}' ({} words, score {})",
                story_no,
                stories.len(),
                story.title,
                story.word_count(),
                story.score
            );
            let parts = partitioner.partition(story, self.config.narration.words_per_minute);
            for part in &parts {
                match self.render_part(story_no, story, part, batch_dir, work_root).await {
                    Ok(clip) => {
                        info!("Final video written to {} ({:.1}s)", clip.path.display(), clip.duration);
                        summary.rendered.push((story.source_id().to_string(), clip));
                    }
                    Err(e) => {
                        error!(
                            "Story {} part {}/{} failed: {:#}",
                            story_no,
                            part.index + 1,
                            part.total,
                            e
                        );
                        summary.failed_parts += 1;
                    }
                }
            }
        }
        summary
    }

    async fn render_part(
        &self,
        story_no: usize,
        story: &StoryRecord,
        part: &StoryPart,
        batch_dir: &Path,
        work_root: &Path,
    ) -> anyhow::Result<RenderedClip> {
        // dropped at the end of this call, taking the chunk audio with it
        let work = tempfile::Builder::new()
            .prefix(&format!("story{:02}_part{}_", story_no, part.index + 1))
            .tempdir_in(work_root)
            .context("creating part work dir")?;

        let timeline = tokio::task::block_in_place(|| self.narrate_part(story_no, part, work.path()))?;

        let track = self.selector.next();
        let background = prepare(track, timeline.narration_duration, self.config.render.aspect());
        let output = batch_dir.join(output_name(story_no, story, part));
        CompositionRenderer::new(self.tools, &self.config.render)
            .render(&background, &timeline, work.path(), &output)
            .await
    }

    /// Segment, voice and lay out one part, applying the duration-cap policy.
    pub fn narrate_part(&self, story_no: usize, part: &StoryPart, work_dir: &Path) -> anyhow::Result<Timeline> {
        let cfg = self.config;
        let chunks = segment(&part.text(), cfg.segment.min_words, cfg.segment.max_words);
        info!(
            "Story {} part {}/{}: {} chunks",
            story_no,
            part.index + 1,
            part.total,
            chunks.len()
        );

        let synth = NarrationSynthesizer::new(self.engine, &cfg.narration, work_dir);
        let outcome = synth.synthesize(&chunks, cfg.narration.words_per_minute);
        info!(
            "Story {} part {}: {:.1}s of narration from {} chunks",
            story_no,
            part.index + 1,
            outcome.total_audio(),
            outcome.chunks.len()
        );
        if !outcome.failed.is_empty() {
            warn!(
                "Story {} part {}: {} of {} chunks have no narration (indices {:?})",
                story_no,
                part.index + 1,
                outcome.failed.len(),
                chunks.len(),
                outcome.failed
            );
        }
        if outcome.chunks.is_empty() {
            anyhow::bail!("no chunk could be narrated");
        }

        let mut timeline =
            TimelineBuilder::new(&cfg.timeline).build(outcome.chunks, Some((part.index, part.total)));
        for e in &timeline.entries {
            debug!(
                "Chunk {}: voice {:.2}s+{:.2}s, caption {:.2}s+{:.2}s",
                e.timed.chunk.index,
                e.narration_start,
                e.timed.audio_duration,
                e.caption_start,
                e.caption_duration()
            );
        }
        let cap = cfg.partition.max_duration;
        if timeline.narration_duration > cap {
            if cfg.partition.enforce_duration_cap {
                let dropped = timeline.truncate_to(cap);
                warn!(
                    "Story {} part {}: narration over {:.0}s cap, dropped {} trailing chunks",
                    story_no,
                    part.index + 1,
                    cap,
                    dropped
                );
            } else {
                warn!(
                    "Story {} part {}: narration {:.1}s exceeds {:.0}s cap; exporting anyway",
                    story_no,
                    part.index + 1,
                    timeline.narration_duration,
                    cap
                );
            }
        }
        Ok(timeline)
    }
}

pub fn output_name(story_no: usize, story: &StoryRecord, part: &StoryPart) -> PathBuf {
    let slug = slugify(&story.title, 40);
    if part.is_multi_part() {
        PathBuf::from(format!(
            "{:02}_{}_part{}of{}.mp4",
            story_no,
            slug,
            part.index + 1,
            part.total
        ))
    } else {
        PathBuf::from(format!("{:02}_{}.mp4", story_no, slug))
    }
}
