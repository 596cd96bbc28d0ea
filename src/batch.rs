//! Parallel cutting of raw footage into ready-to-use 9:16 background clips.

use crate::background::{BackgroundTrack, prepare};
use crate::media::Toolchain;
use crate::story::slugify;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info};

const VERTICAL: f64 = 9.0 / 16.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    pub worker_id: usize,
    pub track: BackgroundTrack,
    pub start: f64,
    pub duration: f64,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub worker_id: usize,
    pub output: PathBuf,
    pub size_mb: f64,
    pub encode_secs: f64,
}

/// Plan `count` clips, cycling through the pool. A track used once gives
/// its centered `clip_seconds` window; a track used several times gives
/// windows evenly spaced from its start to its end, so no two outputs
/// repeat footage. Tracks shorter than `clip_seconds` are used whole.
pub fn plan_jobs(pool: &[BackgroundTrack], count: usize, clip_seconds: f64, out_dir: &Path) -> Vec<BatchJob> {
    if pool.is_empty() {
        return Vec::new();
    }
    (0..count)
        .map(|i| {
            let worker_id = i + 1;
            let slot = i % pool.len();
            let track = &pool[slot];
            let uses = count / pool.len() + usize::from(slot < count % pool.len());
            let pass = i / pool.len();

            let duration = clip_seconds.min(track.duration);
            let slack = (track.duration - duration).max(0.0);
            let start = if uses > 1 {
                slack * pass as f64 / (uses - 1) as f64
            } else {
                slack / 2.0
            };
            let stem = track
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            BatchJob {
                worker_id,
                track: track.clone(),
                start,
                duration,
                output: out_dir.join(format!("bg_{:02}_{}.mp4", worker_id, slugify(&stem, 15))),
            }
        })
        .collect()
}

pub fn job_args(job: &BatchJob) -> Vec<OsString> {
    let crop = prepare(&job.track, job.duration, VERTICAL).crop;
    vec![
        "-ss".into(),
        format!("{:.3}", job.start).into(),
        "-i".into(),
        job.track.path.clone().into(),
        "-t".into(),
        format!("{:.3}", job.duration).into(),
        "-vf".into(),
        format!("crop={}:{}:{}:{}", crop.width, crop.height, crop.x, crop.y).into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "fast".into(),
        "-crf".into(),
        "18".into(),
        "-movflags".into(),
        "+faststart".into(),
        "-an".into(),
        "-y".into(),
        job.output.clone().into(),
    ]
}

/// Run the jobs with at most `workers` ffmpeg processes at a time. Failed or
/// timed-out jobs are logged and left out of the result.
pub async fn run_jobs(tools: &Toolchain, jobs: Vec<BatchJob>, workers: usize) -> Vec<BatchResult> {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = Vec::with_capacity(jobs.len());
    for job in jobs {
        let semaphore = semaphore.clone();
        let tools = tools.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            info!("Worker {}: processing {}", job.worker_id, job.track.path.display());
            let started = Instant::now();
            match tools.ffmpeg(job_args(&job)).await {
                Ok(()) => {
                    let size_mb = std::fs::metadata(&job.output)
                        .map(|m| m.len() as f64 / (1024.0 * 1024.0))
                        .unwrap_or(0.0);
                    let encode_secs = started.elapsed().as_secs_f64();
                    info!(
                        "Worker {}: wrote {} ({:.1} MB, {:.1}s)",
                        job.worker_id,
                        job.output.display(),
                        size_mb,
                        encode_secs
                    );
                    Some(BatchResult {
                        worker_id: job.worker_id,
                        output: job.output,
                        size_mb,
                        encode_secs,
                    })
                }
                Err(e) => {
                    error!("Worker {}: {:#}", job.worker_id, e);
                    None
                }
            }
        }));
    }

    let mut results = Vec::new();
    for task in tasks {
        match task.await {
            Ok(Some(result)) => results.push(result),
            Ok(None) => {}
            Err(e) => error!("Worker task panicked: {}", e),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str, duration: f64) -> BackgroundTrack {
        BackgroundTrack {
            path: PathBuf::from(format!("/raw/{name}")),
            duration,
            width: 2560,
            height: 1440,
        }
    }

    #[test]
    fn plans_centered_windows() {
        let pool = vec![track("Witcher Run.mp4", 600.0), track("short.mkv", 100.0), track("c.mp4", 400.0)];
        let jobs = plan_jobs(&pool, 2, 180.0, Path::new("/out/batch"));
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].start, 210.0);
        assert_eq!(jobs[0].duration, 180.0);
        assert_eq!(jobs[0].output, PathBuf::from("/out/batch/bg_01_witcher_run.mp4"));
        assert_eq!(jobs[1].start, 0.0);
        assert_eq!(jobs[1].duration, 100.0);
        assert_eq!(jobs[1].worker_id, 2);
    }

    #[test]
    fn single_source_yields_distinct_windows() {
        let jobs = plan_jobs(&[track("gameplay.mp4", 600.0)], 3, 45.0, Path::new("/out"));
        assert_eq!(jobs.len(), 3);
        let starts: Vec<f64> = jobs.iter().map(|j| j.start).collect();
        assert_eq!(starts, vec![0.0, 277.5, 555.0]);
        assert!(jobs.iter().all(|j| j.duration == 45.0));
        assert_eq!(jobs[2].output, PathBuf::from("/out/bg_03_gameplay.mp4"));
        assert_ne!(jobs[0].output, jobs[1].output);
    }

    #[test]
    fn pool_is_cycled_past_its_size() {
        let pool = vec![track("a.mp4", 300.0), track("b.mp4", 300.0)];
        let jobs = plan_jobs(&pool, 5, 60.0, Path::new("/out"));
        let names: Vec<&str> = jobs.iter().map(|j| j.track.path.to_str().unwrap()).collect();
        assert_eq!(names, vec!["/raw/a.mp4", "/raw/b.mp4", "/raw/a.mp4", "/raw/b.mp4", "/raw/a.mp4"]);
        // a is cut three times, b twice
        assert_eq!(jobs[0].start, 0.0);
        assert_eq!(jobs[2].start, 120.0);
        assert_eq!(jobs[4].start, 240.0);
        assert_eq!(jobs[3].start, 240.0);
        assert!(plan_jobs(&[], 3, 60.0, Path::new("/out")).is_empty());
    }

    #[test]
    fn job_crops_to_vertical_without_audio() {
        let jobs = plan_jobs(&[track("a.mp4", 300.0)], 1, 180.0, Path::new("/o"));
        let args: Vec<String> = job_args(&jobs[0])
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let at = |flag: &str| args[args.iter().position(|a| a == flag).unwrap() + 1].clone();
        assert_eq!(at("-ss"), "60.000");
        assert_eq!(at("-t"), "180.000");
        assert_eq!(at("-vf"), "crop=810:1440:875:0");
        assert!(args.contains(&"-an".to_string()));
        assert!(args.iter().position(|a| a == "-ss") < args.iter().position(|a| a == "-i"));
    }

    #[tokio::test]
    async fn failed_jobs_are_dropped() {
        let tools = Toolchain::unchecked(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
            &crate::config::ToolsConfig::default(),
        );
        let dir = tempfile::tempdir().unwrap();
        let jobs = plan_jobs(&[track("a.mp4", 50.0), track("b.mp4", 50.0)], 5, 30.0, dir.path());
        assert!(run_jobs(&tools, jobs, 6).await.is_empty());
    }
}
