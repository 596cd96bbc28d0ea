use std::path::PathBuf;
use thiserror::Error;

/// Problems that stop a run before any rendering starts. The message is
/// what the user sees, so every variant says how to fix it.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("{tool} not found ({detail}). {hint}")]
    MissingTool {
        tool: &'static str,
        detail: String,
        hint: &'static str,
    },
    #[error(
        "ffmpeg at {0} has no `subtitles` filter. Install an ffmpeg build with libass enabled (e.g. the full static build from https://ffmpeg.org/download.html)"
    )]
    MissingCaptionRenderer(PathBuf),
    #[error(
        "no usable background videos in {0}. Put at least one .mp4/.mov/.mkv/.webm clip there or pass --backgrounds <dir>"
    )]
    EmptyBackgroundPool(PathBuf),
    #[error("cannot read story store {path}: {reason}. Run `storyreel fetch` first or pass --stories <file>")]
    StoryStore { path: PathBuf, reason: String },
    #[error("invalid config {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

pub const FFMPEG_HINT: &str =
    "Install ffmpeg (https://ffmpeg.org/download.html) and put it on PATH, or set [tools] ffmpeg in the config";
pub const FFPROBE_HINT: &str =
    "ffprobe ships with ffmpeg; put it on PATH or set [tools] ffprobe in the config";
pub const PIPER_HINT: &str =
    "Install piper (https://github.com/rhasspy/piper) and put it on PATH, or set [narration] piper_bin in the config";
