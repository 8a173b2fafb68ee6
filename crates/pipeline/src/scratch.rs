//! Scoped cleanup of temporary artifacts
//!
//! Every temporary path acquired during a run (downloaded video, per-segment
//! audio directory) is registered here at creation time and released
//! unconditionally when the guard drops, on success and on every failure
//! path alike.

use std::path::{Path, PathBuf};
use tracing::debug;
use videoseek_common::{safe_rmtree, safe_unlink};

/// Release list tied to a single pipeline run
#[derive(Debug, Default)]
pub struct ScratchGuard {
    files: Vec<PathBuf>,
    directories: Vec<PathBuf>,
}

impl ScratchGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file for removal when the run ends.
    pub fn register_file(&mut self, path: PathBuf) {
        debug!("Registered scratch file {}", path.display());
        self.files.push(path);
    }

    /// Register a directory tree for recursive removal when the run ends.
    pub fn register_directory(&mut self, path: PathBuf) {
        debug!("Registered scratch directory {}", path.display());
        self.directories.push(path);
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        for file in &self.files {
            safe_unlink(file);
        }
        for directory in &self.directories {
            safe_rmtree(directory);
        }
    }
}

/// Remove a scratch file immediately, outside the guard's lifetime.
pub fn discard_file(path: &Path) {
    safe_unlink(path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_paths_are_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("downloaded.mp4");
        let tree = dir.path().join("audio");
        std::fs::write(&file, "data").unwrap();
        std::fs::create_dir_all(tree.join("nested")).unwrap();
        std::fs::write(tree.join("nested/segment.wav"), "pcm").unwrap();

        {
            let mut guard = ScratchGuard::new();
            guard.register_file(file.clone());
            guard.register_directory(tree.clone());
        }

        assert!(!file.exists());
        assert!(!tree.exists());
    }

    #[test]
    fn test_release_survives_missing_paths() {
        let mut guard = ScratchGuard::new();
        guard.register_file(PathBuf::from("/nonexistent/file.mp4"));
        guard.register_directory(PathBuf::from("/nonexistent/dir"));
        drop(guard);
    }

    #[test]
    fn test_release_runs_even_after_panic() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("orphan.wav");
        std::fs::write(&file, "data").unwrap();

        let file_clone = file.clone();
        let result = std::panic::catch_unwind(move || {
            let mut guard = ScratchGuard::new();
            guard.register_file(file_clone);
            panic!("stage blew up");
        });
        assert!(result.is_err());
        assert!(!file.exists());
    }
}
