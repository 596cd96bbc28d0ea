use crate::audio::concat_wavs;
use crate::background::PreparedBackground;
use crate::config::RenderConfig;
use crate::media::Toolchain;
use crate::subtitle::{caption_style, escape_filter_path, write_srt};
use crate::timeline::Timeline;
use anyhow::Context;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct RenderedClip {
    pub path: PathBuf,
    pub duration: f64,
}

pub struct CompositionRenderer<'a> {
    tools: &'a Toolchain,
    config: &'a RenderConfig,
}

impl<'a> CompositionRenderer<'a> {
    pub fn new(tools: &'a Toolchain, config: &'a RenderConfig) -> Self {
        Self { tools, config }
    }

    /// Join the narration, write the captions, and encode one clip over the
    /// prepared background. Intermediate files live in `work_dir`.
    pub async fn render(
        &self,
        background: &PreparedBackground,
        timeline: &Timeline,
        work_dir: &Path,
        output: &Path,
    ) -> anyhow::Result<RenderedClip> {
        let narration = work_dir.join("narration.wav");
        let written = concat_wavs(
            &timeline.narration_clips(),
            timeline.lead_in,
            timeline.transition_gap,
            &narration,
        )
        .context("concatenating narration")?;
        info!("Combined audio written to {} ({:.2}s)", narration.display(), written);

        let srt = work_dir.join("captions.srt");
        write_srt(&srt, &timeline.captions(), self.config.caption_wrap).context("writing captions")?;

        let duration = output_duration(timeline, background);
        info!(
            "Encoding {} ({:.2}s of {:.2}s planned, timeline span {:.2}s, background {} with {} extra loops)",
            output.display(),
            duration,
            background.duration,
            timeline.total_duration(background.covered()),
            background.track.path.display(),
            background.loops
        );
        let args = ffmpeg_args(self.config, background, &narration, &srt, duration, output);
        self.tools.ffmpeg(args).await.context("ffmpeg failed to produce final video")?;
        if !output.is_file() {
            anyhow::bail!("ffmpeg reported success but {} is missing", output.display());
        }

        Ok(RenderedClip {
            path: output.to_path_buf(),
            duration,
        })
    }
}

/// Final length: the narration, unless the prepared footage is shorter.
pub fn output_duration(timeline: &Timeline, background: &PreparedBackground) -> f64 {
    timeline.narration_duration.min(background.covered())
}

pub fn ffmpeg_args(
    cfg: &RenderConfig,
    background: &PreparedBackground,
    narration: &Path,
    srt: &Path,
    duration: f64,
    output: &Path,
) -> Vec<OsString> {
    let crop = background.crop;
    let vf = format!(
        "crop={}:{}:{}:{},scale={}:{},setsar=1,subtitles={}:force_style='{}'",
        crop.width,
        crop.height,
        crop.x,
        crop.y,
        cfg.width,
        cfg.height,
        escape_filter_path(srt),
        caption_style(cfg.font_size)
    );
    let mut args: Vec<OsString> = vec!["-y".into(), "-hide_banner".into()];
    if background.loops > 0 {
        args.push("-stream_loop".into());
        args.push(background.loops.to_string().into());
    }
    args.extend([
        OsString::from("-i"),
        background.track.path.clone().into(),
        "-i".into(),
        narration.into(),
        "-vf".into(),
        vf.into(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-t".into(),
        format!("{duration:.3}").into(),
        "-r".into(),
        cfg.fps.to_string().into(),
        "-c:v".into(),
        "libx264".into(),
        "-b:v".into(),
        cfg.video_bitrate.clone().into(),
        "-preset".into(),
        "fast".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-movflags".into(),
        "+faststart".into(),
        output.into(),
    ]);
    args
}
