//! Run configuration. Loaded once, then handed out by section to the
//! component that needs it; nothing here is mutated after startup.

use crate::error::StartupError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub segment: SegmentConfig,
    pub narration: NarrationConfig,
    pub timeline: TimelineConfig,
    pub partition: PartitionConfig,
    pub render: RenderConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Explicit ffmpeg binary; discovered on PATH when unset.
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub probe_timeout_secs: u64,
    pub transcode_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: None,
            ffprobe: None,
            probe_timeout_secs: 30,
            transcode_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_words: 4,
            max_words: 14,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub piper_bin: Option<PathBuf>,
    pub piper_model: PathBuf,
    /// Target speaking rate, also used for duration estimates.
    pub words_per_minute: f64,
    /// Rate the voice model speaks at with `--length_scale 1.0`.
    pub voice_base_wpm: f64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            piper_bin: None,
            piper_model: PathBuf::from("./tts/en_US-hfc_male-medium.onnx"),
            words_per_minute: 170.0,
            voice_base_wpm: 160.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Caption offset relative to its narration; negative shows it early.
    pub start_delay: f64,
    pub duration_factor: f64,
    pub transition_gap: f64,
    pub min_caption: f64,
    pub part_label_duration: f64,
    pub part_padding: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            start_delay: 0.0,
            duration_factor: 0.95,
            transition_gap: 0.15,
            min_caption: 0.1,
            part_label_duration: 1.5,
            part_padding: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub max_duration: f64,
    pub max_parts: usize,
    /// Drop trailing chunks past `max_duration` instead of only warning.
    pub enforce_duration_cap: bool,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_duration: 120.0,
            max_parts: 3,
            enforce_duration_cap: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_bitrate: String,
    pub font_size: u32,
    /// Max characters per caption line.
    pub caption_wrap: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            video_bitrate: "6000k".to_string(),
            font_size: 18,
            caption_wrap: 28,
        }
    }
}

impl RenderConfig {
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
    pub clip_seconds: f64,
    pub min_source_seconds: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 6,
            clip_seconds: 180.0,
            min_source_seconds: 30.0,
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults for missing keys.
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let contents = std::fs::read_to_string(path).map_err(|e| StartupError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| StartupError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    pub fn validate(&self, path: &Path) -> Result<(), StartupError> {
        let bad = |reason: &str| StartupError::Config {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        if self.segment.min_words == 0 || self.segment.max_words < self.segment.min_words {
            return Err(bad("segment.min_words must be >= 1 and <= segment.max_words"));
        }
        if !(0.0..=1.0).contains(&self.timeline.duration_factor) || self.timeline.duration_factor == 0.0 {
            return Err(bad("timeline.duration_factor must be in (0, 1]"));
        }
        if self.narration.words_per_minute <= 0.0 || self.narration.voice_base_wpm <= 0.0 {
            return Err(bad("narration rates must be positive"));
        }
        if self.partition.max_duration <= 0.0 || self.partition.max_parts == 0 {
            return Err(bad("partition.max_duration and partition.max_parts must be positive"));
        }
        if self.render.width == 0 || self.render.height == 0 {
            return Err(bad("render.width and render.height must be positive"));
        }
        if self.batch.workers == 0 {
            return Err(bad("batch.workers must be >= 1"));
        }
        Ok(())
    }
}
