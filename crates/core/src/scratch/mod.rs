//! Per-request scratch directories.
//!
//! A [`ScratchDir`] owns one isolated directory and removes it exactly once,
//! on [`ScratchDir::release`] or on drop, whichever comes first. Tying the
//! guard's lifetime to the response stream gives cleanup on completion,
//! early failure and client abort alike.

mod stream;

pub use stream::{
    content_disposition, sanitize_filename, CompletedDownload, DownloadStream, CONTENT_TYPE,
};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Prefix of per-request scratch directories.
pub const SCRATCH_PREFIX: &str = "clipfetch-";

/// Prefix of directories holding runtime-fetched binaries.
pub const FETCH_PREFIX: &str = "fetch-";

/// Stem of the output file inside a request scratch directory.
const OUTPUT_STEM: &str = "download";

/// Errors raised while allocating scratch space.
#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("Failed to create scratch directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Allocates isolated scratch directories under a root.
#[derive(Debug, Clone)]
pub struct ScratchManager {
    root: PathBuf,
}

impl ScratchManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a request directory whose output file is `download.<extension>`.
    pub async fn allocate(&self, extension: &str) -> Result<ScratchDir, ScratchError> {
        self.allocate_with(SCRATCH_PREFIX, &format!("{}.{}", OUTPUT_STEM, extension))
            .await
    }

    /// Creates a uniquely named directory `<prefix><uuid>` owning `file_name`.
    pub async fn allocate_with(
        &self,
        prefix: &str,
        file_name: &str,
    ) -> Result<ScratchDir, ScratchError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| ScratchError::Create {
                path: self.root.clone(),
                source,
            })?;

        let path = self.root.join(format!("{}{}", prefix, Uuid::new_v4()));
        tokio::fs::create_dir(&path)
            .await
            .map_err(|source| ScratchError::Create {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), "Scratch directory allocated");

        Ok(ScratchDir {
            output: path.join(file_name),
            path,
            released: AtomicBool::new(false),
        })
    }

    /// Removes scratch directories left behind by a crashed process.
    ///
    /// Only entries carrying one of our prefixes and older than `max_age` are touched.
    pub async fn sweep_stale(&self, max_age: Duration) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with(SCRATCH_PREFIX) || name.starts_with(FETCH_PREFIX)) {
                continue;
            }

            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            let age = meta
                .modified()
                .ok()
                .and_then(|m| m.elapsed().ok())
                .unwrap_or_default();
            if !meta.is_dir() || age < max_age {
                continue;
            }

            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(
                    path = %entry.path().display(),
                    error = %e,
                    "Failed to sweep stale scratch directory"
                ),
            }
        }

        if removed > 0 {
            tracing::info!(
                removed,
                root = %self.root.display(),
                "Swept stale scratch directories"
            );
        }
        removed
    }
}

/// Exclusive owner of one scratch directory.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    output: PathBuf,
    released: AtomicBool,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Recursively removes the directory. Idempotent; returns whether this call did the removal.
    ///
    /// Inside a tokio runtime the removal runs on the blocking pool, so the
    /// directory may outlive this call briefly. A failed removal is logged
    /// and otherwise ignored.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }

        let path = self.path.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_scratch(&path));
            }
            Err(_) => remove_scratch(&path),
        }
        true
    }

    /// Size of the output file if it exists and is non-empty.
    pub async fn output_size(&self) -> Option<u64> {
        non_empty_file_size(&self.output).await
    }

    /// Removes a partial output so the next attempt starts clean.
    pub async fn clear_output(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.output).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.output.display(),
                    error = %e,
                    "Failed to clear partial output"
                );
            }
        }
    }

    /// Ensures the output file is in place, returning its size.
    ///
    /// External tools sometimes append their own extension. When the exact
    /// output path is missing and exactly one non-empty file starts with the
    /// output stem, it is renamed onto the output path. Several candidates
    /// mean an unmerged download and count as no output.
    pub async fn adopt_output(&self) -> Option<u64> {
        if let Some(size) = self.output_size().await {
            return Some(size);
        }

        let stem = self.output.file_stem()?.to_string_lossy().to_string();
        let mut entries = tokio::fs::read_dir(&self.path).await.ok()?;
        let mut candidates: Vec<(PathBuf, u64)> = Vec::new();

        while let Ok(Some(entry)) = entries.next_entry().await {
            if !entry.file_name().to_string_lossy().starts_with(&stem) {
                continue;
            }
            if let Some(size) = non_empty_file_size(&entry.path()).await {
                candidates.push((entry.path(), size));
            }
        }

        if candidates.len() > 1 {
            tracing::warn!(
                dir = %self.path.display(),
                candidates = candidates.len(),
                "Several output candidates, refusing to pick one"
            );
            return None;
        }

        let (candidate, size) = candidates.pop()?;
        tracing::debug!(
            from = %candidate.display(),
            to = %self.output.display(),
            "Adopting output written under a different name"
        );
        tokio::fs::rename(&candidate, &self.output).await.ok()?;
        Some(size)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        self.release();
    }
}

fn remove_scratch(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Scratch directory released");
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove scratch directory"
            );
        }
    }
}

async fn non_empty_file_size(path: &Path) -> Option<u64> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    (meta.is_file() && meta.len() > 0).then_some(meta.len())
}
