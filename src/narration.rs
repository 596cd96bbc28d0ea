use crate::audio::wav_duration_seconds;
use crate::config::NarrationConfig;
use crate::segment::TextChunk;
use crate::tts::SpeechEngine;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct TimedChunk {
    pub chunk: TextChunk,
    pub audio: PathBuf,
    pub audio_duration: f64,
}

#[derive(Debug, Default)]
pub struct NarrationOutcome {
    pub chunks: Vec<TimedChunk>,
    /// Indices of chunks that produced no usable audio.
    pub failed: Vec<usize>,
}

impl NarrationOutcome {
    pub fn total_audio(&self) -> f64 {
        self.chunks.iter().map(|c| c.audio_duration).sum()
    }
}

pub struct NarrationSynthesizer<'a, E: SpeechEngine> {
    engine: &'a E,
    config: &'a NarrationConfig,
    work_dir: &'a Path,
}

impl<'a, E: SpeechEngine> NarrationSynthesizer<'a, E> {
    pub fn new(engine: &'a E, config: &'a NarrationConfig, work_dir: &'a Path) -> Self {
        Self {
            engine,
            config,
            work_dir,
        }
    }

    /// Voice each chunk in order. A chunk that fails is logged and left
    /// out; the others still come back with their measured durations.
    pub fn synthesize(&self, chunks: &[TextChunk], rate_words_per_minute: f64) -> NarrationOutcome {
        let length_scale = self.config.voice_base_wpm / rate_words_per_minute;
        let mut outcome = NarrationOutcome::default();
        for chunk in chunks {
            let path = self.work_dir.join(format!("chunk_{:03}.wav", chunk.index));
            info!(
                "Generating TTS chunk {}/{} ({} words)",
                chunk.index + 1,
                chunks.len(),
                chunk.word_count
            );
            match self.voice(chunk, length_scale, &path) {
                Ok(audio_duration) => {
                    info!("Chunk {} duration: {:.2} seconds", chunk.index, audio_duration);
                    outcome.chunks.push(TimedChunk {
                        chunk: chunk.clone(),
                        audio: path,
                        audio_duration,
                    });
                }
                Err(e) => {
                    error!("Dropping TTS chunk {}: {:#}", chunk.index, e);
                    outcome.failed.push(chunk.index);
                }
            }
        }
        outcome
    }

    fn voice(&self, chunk: &TextChunk, length_scale: f64, path: &Path) -> anyhow::Result<f64> {
        self.engine
            .synthesize(&chunk.text, length_scale, path)
            .with_context(|| format!("synthesizing chunk {}", chunk.index))?;
        let duration = wav_duration_seconds(path)
            .with_context(|| format!("measuring {}", path.display()))?;
        if duration <= 0.0 {
            anyhow::bail!("engine produced empty audio");
        }
        Ok(duration)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::write_test_wav;
    use crate::segment::segment;
    use std::cell::RefCell;

    /// Speaks at a fixed seconds-per-word, fails on chunks containing "FAIL",
    /// and remembers the length scales it was asked for.
    pub(crate) struct FakeEngine {
        pub seconds_per_word: f64,
        pub scales: RefCell<Vec<f64>>,
    }

    impl FakeEngine {
        pub(crate) fn new(seconds_per_word: f64) -> Self {
            Self {
                seconds_per_word,
                scales: RefCell::new(Vec::new()),
            }
        }
    }

    impl SpeechEngine for FakeEngine {
        fn synthesize(&self, text: &str, length_scale: f64, out_path: &Path) -> anyhow::Result<()> {
            self.scales.borrow_mut().push(length_scale);
            if text.contains("FAIL") {
                anyhow::bail!("engine refused");
            }
            let words = text.split_whitespace().count() as f64;
            write_test_wav(out_path, words * self.seconds_per_word * length_scale, 16_000)
        }
    }

    #[test]
    fn durations_are_measured_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(0.5);
        let config = NarrationConfig::default();
        let synth = NarrationSynthesizer::new(&engine, &config, dir.path());

        let chunks = segment("One two three. Four five.", 1, 10);
        let outcome = synth.synthesize(&chunks, config.voice_base_wpm);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.chunks.len(), 2);
        assert!((outcome.chunks[0].audio_duration - 1.5).abs() < 1e-3);
        assert!((outcome.chunks[1].audio_duration - 1.0).abs() < 1e-3);
        assert!((outcome.total_audio() - 2.5).abs() < 1e-3);
        assert!(outcome.chunks[0].audio.exists());
    }

    #[test]
    fn failed_chunk_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(0.4);
        let config = NarrationConfig::default();
        let synth = NarrationSynthesizer::new(&engine, &config, dir.path());

        let chunks = segment("First part here. Then FAIL now. Last bit.", 1, 10);
        let outcome = synth.synthesize(&chunks, 160.0);
        assert_eq!(outcome.failed, vec![1]);
        let kept: Vec<usize> = outcome.chunks.iter().map(|c| c.chunk.index).collect();
        assert_eq!(kept, vec![0, 2]);
    }

    #[test]
    fn faster_rate_shrinks_length_scale() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(0.4);
        let config = NarrationConfig {
            voice_base_wpm: 150.0,
            ..NarrationConfig::default()
        };
        let synth = NarrationSynthesizer::new(&engine, &config, dir.path());
        synth.synthesize(&segment("Quick one.", 1, 5), 200.0);
        assert!((engine.scales.borrow()[0] - 0.75).abs() < 1e-9);
    }
}
