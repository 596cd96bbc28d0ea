//! ffmpeg/ffprobe plumbing: tool discovery, probing, and bounded runs.

use crate::config::ToolsConfig;
use crate::error::{FFMPEG_HINT, FFPROBE_HINT, StartupError};
use anyhow::{Context, bail};
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

pub fn parse_probe_json(json: &str) -> anyhow::Result<MediaInfo> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    let duration: f64 = probe
        .format
        .duration
        .as_deref()
        .context("no format.duration")?
        .trim()
        .parse()
        .context("format.duration is not a number")?;
    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .context("no video stream")?;
    match (video.width, video.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok(MediaInfo {
            duration,
            width,
            height,
        }),
        _ => bail!("video stream has no dimensions"),
    }
}

#[derive(Debug, Clone)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    probe_timeout: Duration,
    transcode_timeout: Duration,
}

impl Toolchain {
    /// Use the given binaries as-is, without running them.
    pub fn unchecked(ffmpeg: PathBuf, ffprobe: PathBuf, cfg: &ToolsConfig) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            probe_timeout: Duration::from_secs(cfg.probe_timeout_secs),
            transcode_timeout: Duration::from_secs(cfg.transcode_timeout_secs),
        }
    }

    /// Find ffmpeg and ffprobe, make sure both run, and make sure ffmpeg
    /// can burn in captions.
    pub async fn discover(cfg: &ToolsConfig) -> Result<Self, StartupError> {
        let ffmpeg = resolve("ffmpeg", cfg.ffmpeg.as_deref(), FFMPEG_HINT)?;
        let ffprobe = resolve("ffprobe", cfg.ffprobe.as_deref(), FFPROBE_HINT)?;
        let chain = Self::unchecked(ffmpeg, ffprobe, cfg);

        for (tool, bin, hint) in [
            ("ffmpeg", &chain.ffmpeg, FFMPEG_HINT),
            ("ffprobe", &chain.ffprobe, FFPROBE_HINT),
        ] {
            chain
                .capture(bin, ["-version"], chain.probe_timeout)
                .await
                .map_err(|e| StartupError::MissingTool {
                    tool,
                    detail: format!("{} -version failed: {e:#}", bin.display()),
                    hint,
                })?;
        }

        let filters = chain
            .capture(&chain.ffmpeg, ["-hide_banner", "-filters"], chain.probe_timeout)
            .await
            .map_err(|_| StartupError::MissingCaptionRenderer(chain.ffmpeg.clone()))?;
        if !has_subtitles_filter(&filters) {
            return Err(StartupError::MissingCaptionRenderer(chain.ffmpeg.clone()));
        }
        info!(
            "Using ffmpeg {} and ffprobe {}",
            chain.ffmpeg.display(),
            chain.ffprobe.display()
        );
        Ok(chain)
    }

    pub async fn probe(&self, path: &Path) -> anyhow::Result<MediaInfo> {
        let json = self
            .capture(
                &self.ffprobe,
                [
                    OsString::from("-v"),
                    "quiet".into(),
                    "-print_format".into(),
                    "json".into(),
                    "-show_format".into(),
                    "-show_streams".into(),
                    path.into(),
                ],
                self.probe_timeout,
            )
            .await?;
        match parse_probe_json(&json) {
            Ok(info) => Ok(info),
            Err(e) => {
                warn!("{}: ffprobe JSON unusable ({e:#}); retrying with plain queries", path.display());
                self.probe_plain(path).await
            }
        }
    }

    async fn probe_plain(&self, path: &Path) -> anyhow::Result<MediaInfo> {
        let duration = self
            .capture(
                &self.ffprobe,
                [
                    OsString::from("-v"),
                    "quiet".into(),
                    "-show_entries".into(),
                    "format=duration".into(),
                    "-of".into(),
                    "csv=p=0".into(),
                    path.into(),
                ],
                self.probe_timeout,
            )
            .await?;
        let dims = self
            .capture(
                &self.ffprobe,
                [
                    OsString::from("-v"),
                    "quiet".into(),
                    "-select_streams".into(),
                    "v:0".into(),
                    "-show_entries".into(),
                    "stream=width,height".into(),
                    "-of".into(),
                    "csv=s=x:p=0".into(),
                    path.into(),
                ],
                self.probe_timeout,
            )
            .await?;
        let (w, h) = dims
            .trim()
            .split_once('x')
            .context("unexpected dimensions output")?;
        Ok(MediaInfo {
            duration: duration.trim().parse().context("unparseable duration")?,
            width: w.parse()?,
            height: h.parse()?,
        })
    }

    /// Run ffmpeg with the transcode timeout. stderr is kept for the error.
    pub async fn ffmpeg(&self, args: Vec<OsString>) -> anyhow::Result<()> {
        self.ffmpeg_with_timeout(args, self.transcode_timeout).await
    }

    pub async fn ffmpeg_with_timeout(&self, args: Vec<OsString>, limit: Duration) -> anyhow::Result<()> {
        self.capture(&self.ffmpeg, args, limit).await.map(|_| ())
    }

    async fn capture<I, S>(&self, bin: &Path, args: I, limit: Duration) -> anyhow::Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        debug!("Running {} {:?}", bin.display(), args);
        let child = Command::new(bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", bin.display()))?;

        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => bail!("{} timed out after {}s", bin.display(), limit.as_secs()),
        };
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                bin.display(),
                output.status,
                stderr_tail(&output.stderr, 400)
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn resolve(tool: &'static str, explicit: Option<&Path>, hint: &'static str) -> Result<PathBuf, StartupError> {
    match explicit {
        Some(p) if p.is_file() => Ok(p.to_path_buf()),
        Some(p) => Err(StartupError::MissingTool {
            tool,
            detail: format!("{} does not exist", p.display()),
            hint,
        }),
        None => which::which(tool).map_err(|e| StartupError::MissingTool {
            tool,
            detail: e.to_string(),
            hint,
        }),
    }
}

fn has_subtitles_filter(listing: &str) -> bool {
    listing
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some("subtitles"))
}

fn stderr_tail(stderr: &[u8], max_chars: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - max_chars).collect();
    format!("...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_json_picks_video_stream() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio", "sample_rate": "48000"},
                {"codec_type": "video", "width": 1920, "height": 1080}
            ],
            "format": {"duration": "12.480000", "size": "100"}
        }"#;
        let info = parse_probe_json(json).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.duration - 12.48).abs() < 1e-9);
    }

    #[test]
    fn probe_json_without_video_fails() {
        let json = r#"{"streams":[{"codec_type":"audio"}],"format":{"duration":"3.0"}}"#;
        assert!(parse_probe_json(json).is_err());
        assert!(parse_probe_json(r#"{"format":{}}"#).is_err());
    }

    #[test]
    fn filter_listing_is_matched_by_name() {
        let listing = " ... ass               V->V       Render ASS subtitles\n \
                       ... subtitles         V->V       Render text subtitles\n";
        assert!(has_subtitles_filter(listing));
        assert!(!has_subtitles_filter(" ... ass  V->V  Render ASS subtitles\n"));
    }

    #[test]
    fn explicit_missing_tool_has_hint() {
        let err = resolve("ffmpeg", Some(Path::new("/nonexistent/ffmpeg")), FFMPEG_HINT).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/nonexistent/ffmpeg"));
        assert!(msg.contains("ffmpeg.org"));
    }

    #[test]
    fn stderr_tail_keeps_the_end() {
        assert_eq!(stderr_tail(b"short", 10), "short");
        assert_eq!(stderr_tail(b"0123456789abc", 3), "...abc");
    }
}
