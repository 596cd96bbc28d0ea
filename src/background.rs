use crate::error::StartupError;
use crate::media::Toolchain;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v", "3gp"];

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundTrack {
    pub path: PathBuf,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// A background ready for one render: how often to repeat the source and
/// which centered window to keep.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedBackground {
    pub track: BackgroundTrack,
    /// Extra plays after the first (ffmpeg `-stream_loop`).
    pub loops: u32,
    pub crop: CropRect,
    pub duration: f64,
}

impl PreparedBackground {
    /// Footage available after looping.
    pub fn covered(&self) -> f64 {
        self.track.duration * (self.loops as f64 + 1.0)
    }
}

/// Video files directly inside `dir`, sorted by name.
pub fn list_videos(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Probe every video in `dir`. Files ffprobe can't read are skipped; an
/// empty result is fatal.
pub async fn load_pool(
    dir: &Path,
    tools: &Toolchain,
    min_duration: f64,
) -> Result<Vec<BackgroundTrack>, StartupError> {
    let files = list_videos(dir).map_err(|_| StartupError::EmptyBackgroundPool(dir.to_path_buf()))?;
    info!("Found {} video files in {}", files.len(), dir.display());

    let mut pool = Vec::new();
    for path in files {
        match tools.probe(&path).await {
            Ok(m) if m.duration >= min_duration => {
                info!(
                    "  {}: {:.1}s {}x{}",
                    path.display(),
                    m.duration,
                    m.width,
                    m.height
                );
                pool.push(BackgroundTrack {
                    path,
                    duration: m.duration,
                    width: m.width,
                    height: m.height,
                });
            }
            Ok(m) => warn!("  {}: too short ({:.1}s), skipped", path.display(), m.duration),
            Err(e) => warn!("  {}: probe failed, skipped: {:#}", path.display(), e),
        }
    }
    if pool.is_empty() {
        return Err(StartupError::EmptyBackgroundPool(dir.to_path_buf()));
    }
    Ok(pool)
}

/// Round-robin over a fixed pool. The counter lives here, so concurrent or
/// repeated callers see one shared, deterministic sequence.
pub struct BackgroundSelector {
    pool: Vec<BackgroundTrack>,
    counter: AtomicUsize,
}

impl BackgroundSelector {
    pub fn new(pool: Vec<BackgroundTrack>) -> Result<Self, StartupError> {
        if pool.is_empty() {
            return Err(StartupError::EmptyBackgroundPool(PathBuf::new()));
        }
        Ok(Self {
            pool,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn select(&self, cycle_index: usize) -> &BackgroundTrack {
        &self.pool[cycle_index % self.pool.len()]
    }

    pub fn next(&self) -> &BackgroundTrack {
        self.select(self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

/// Plan the loop count and center crop that turn `track` into
/// `target_duration` seconds of `target_aspect` (width / height) footage.
/// Only cropping is used, never stretching: a source wider than the
/// target keeps its full height, otherwise its full width.
pub fn prepare(track: &BackgroundTrack, target_duration: f64, target_aspect: f64) -> PreparedBackground {
    let loops = if track.duration > 0.0 && track.duration < target_duration {
        ((target_duration / track.duration).ceil() as u32).saturating_sub(1)
    } else {
        0
    };

    let (w, h) = (track.width, track.height);
    let source_aspect = w as f64 / h as f64;
    let (cw, ch) = if source_aspect > target_aspect {
        (even((h as f64 * target_aspect).floor() as u32).min(w), h)
    } else {
        (w, even((w as f64 / target_aspect).floor() as u32).min(h))
    };
    let crop = CropRect {
        width: cw,
        height: ch,
        x: (w - cw) / 2,
        y: (h - ch) / 2,
    };

    PreparedBackground {
        track: track.clone(),
        loops,
        crop,
        duration: target_duration,
    }
}

// libx264 wants even dimensions
fn even(v: u32) -> u32 {
    (v & !1).max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str, duration: f64, width: u32, height: u32) -> BackgroundTrack {
        BackgroundTrack {
            path: PathBuf::from(name),
            duration,
            width,
            height,
        }
    }

    #[test]
    fn round_robin_wraps() {
        let selector = BackgroundSelector::new(vec![
            track("a.mp4", 60.0, 1920, 1080),
            track("b.mp4", 60.0, 1920, 1080),
            track("c.mp4", 60.0, 1920, 1080),
        ])
        .unwrap();
        let picked: Vec<&str> = (0..5)
            .map(|_| selector.next().path.to_str().unwrap())
            .collect();
        assert_eq!(picked, vec!["a.mp4", "b.mp4", "c.mp4", "a.mp4", "b.mp4"]);
        assert_eq!(selector.select(7).path, PathBuf::from("b.mp4"));
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(BackgroundSelector::new(Vec::new()).is_err());
    }

    #[test]
    fn short_track_is_looped_to_cover() {
        let prepared = prepare(&track("bg.mp4", 10.0, 1920, 1080), 25.0, 9.0 / 16.0);
        assert_eq!(prepared.loops, 2);
        assert!(prepared.covered() >= 25.0);
        assert_eq!(prepared.duration, 25.0);
    }

    #[test]
    fn exact_multiple_needs_no_extra_loop() {
        let prepared = prepare(&track("bg.mp4", 10.0, 1080, 1920), 20.0, 9.0 / 16.0);
        assert_eq!(prepared.loops, 1);
        let long = prepare(&track("bg.mp4", 300.0, 1080, 1920), 20.0, 9.0 / 16.0);
        assert_eq!(long.loops, 0);
    }

    #[test]
    fn landscape_keeps_height() {
        let prepared = prepare(&track("bg.mp4", 60.0, 1920, 1080), 30.0, 9.0 / 16.0);
        assert_eq!(
            prepared.crop,
            CropRect {
                width: 606,
                height: 1080,
                x: 657,
                y: 0
            }
        );
    }

    #[test]
    fn tall_source_keeps_width() {
        let prepared = prepare(&track("bg.mp4", 60.0, 1080, 2400), 30.0, 9.0 / 16.0);
        assert_eq!(prepared.crop.width, 1080);
        assert_eq!(prepared.crop.height, 1920);
        assert_eq!(prepared.crop.y, 240);
    }

    #[test]
    fn crop_never_exceeds_source() {
        for (w, h) in [(1920, 1080), (1080, 1920), (1000, 1000), (641, 479)] {
            let c = prepare(&track("x", 5.0, w, h), 5.0, 9.0 / 16.0).crop;
            assert!(c.width <= w && c.height <= h);
            assert!(c.x + c.width <= w && c.y + c.height <= h);
        }
    }

    #[test]
    fn lists_only_video_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.MP4", "a.webm", "notes.txt", "c.mov"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let names: Vec<String> = list_videos(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.webm", "b.MP4", "c.mov"]);
    }
}
