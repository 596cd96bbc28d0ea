use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Directories that must not outlive the run, even when it is interrupted.
/// Per-render files use `tempfile::TempDir` and clean themselves up; this
/// covers the batch-level work directory around them.
#[derive(Clone, Default)]
pub struct CleanupRegistry {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: impl Into<PathBuf>) {
        if let Ok(mut paths) = self.paths.lock() {
            paths.push(path.into());
        }
    }

    /// Remove everything registered. Safe to call more than once.
    pub fn sweep(&self) {
        let paths = match self.paths.lock() {
            Ok(mut paths) => std::mem::take(&mut *paths),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for path in paths.iter().rev() {
            remove(path);
        }
    }

    /// On Ctrl-C, sweep and exit with the conventional SIGINT status.
    pub fn sweep_on_interrupt(&self) {
        let registry = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; removing temporary files");
                registry.sweep();
                std::process::exit(130);
            }
        });
    }
}

fn remove(path: &Path) {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else if path.exists() {
        std::fs::remove_file(path)
    } else {
        return;
    };
    match result {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_removes_registered_dirs_once() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join(".work");
        std::fs::create_dir_all(work.join("part_1")).unwrap();
        std::fs::write(work.join("part_1/chunk_000.wav"), b"x").unwrap();
        let stray = root.path().join("silence.wav");
        std::fs::write(&stray, b"x").unwrap();

        let registry = CleanupRegistry::new();
        registry.register(&work);
        registry.register(&stray);
        registry.clone().sweep();
        assert!(!work.exists());
        assert!(!stray.exists());

        std::fs::create_dir_all(&work).unwrap();
        registry.sweep();
        assert!(work.exists(), "already swept paths are forgotten");
    }
}
