//! Binary locator.
//!
//! Builds `{directory × binary name}` candidates from an ordered list of
//! [`SearchRoot`] providers and returns the first one that is a regular
//! file. Absence is a normal outcome, reported with the full candidate
//! list so operators can see where the binary was expected.

mod roots;

pub use roots::{SearchRoot, SERVERLESS_ROOT};

use serde::Serialize;
use std::path::PathBuf;

use crate::config::LocatorConfig;
use crate::platform::Platform;

/// Result of a locate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocateResult {
    /// First candidate that exists and is a regular file.
    pub found: Option<PathBuf>,
    /// Every candidate in search order.
    pub candidates: Vec<PathBuf>,
}

/// Filesystem details of a single candidate, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateProbe {
    pub path: PathBuf,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_file: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Locates the extraction binary across deployment topologies.
#[derive(Debug, Clone)]
pub struct BinaryLocator {
    roots: Vec<SearchRoot>,
    platform: Platform,
}

impl BinaryLocator {
    pub fn new(roots: Vec<SearchRoot>, platform: Platform) -> Self {
        Self { roots, platform }
    }

    /// Builds a locator from config for the current platform.
    pub fn from_config(config: &LocatorConfig) -> Self {
        let mut roots = if config.include_default_roots {
            SearchRoot::defaults()
        } else {
            Vec::new()
        };
        roots.extend(config.extra_dirs.iter().cloned().map(SearchRoot::Fixed));
        Self::new(roots, Platform::current())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn roots(&self) -> &[SearchRoot] {
        &self.roots
    }

    /// Every candidate path in priority order, duplicates removed.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        for dir in self.roots.iter().filter_map(SearchRoot::resolve) {
            for name in self.platform.binary_names() {
                let path = dir.join(name);
                if !candidates.contains(&path) {
                    candidates.push(path);
                }
            }
        }
        candidates
    }

    /// Returns the first candidate that is a regular file.
    pub fn locate(&self) -> LocateResult {
        let candidates = self.candidates();
        let found = candidates
            .iter()
            .find(|p| std::fs::metadata(p).map(|m| m.is_file()).unwrap_or(false))
            .cloned();

        match &found {
            Some(path) => tracing::debug!(path = %path.display(), "Extraction binary located"),
            None => tracing::debug!(
                candidates = candidates.len(),
                "No extraction binary found in search roots"
            ),
        }

        LocateResult { found, candidates }
    }

    /// Re-runs the search and reports filesystem details for each candidate.
    pub fn probe(&self) -> Vec<CandidateProbe> {
        self.candidates()
            .into_iter()
            .map(|path| match std::fs::metadata(&path) {
                Ok(meta) => CandidateProbe {
                    exists: true,
                    is_file: Some(meta.is_file()),
                    size: Some(meta.len()),
                    mode: file_mode(&meta),
                    error: None,
                    path,
                },
                Err(e) => CandidateProbe {
                    exists: false,
                    is_file: None,
                    size: None,
                    mode: None,
                    error: Some(e.to_string()),
                    path,
                },
            })
            .collect()
    }
}

#[cfg(unix)]
fn file_mode(meta: &std::fs::Metadata) -> Option<String> {
    use std::os::unix::fs::PermissionsExt;
    Some(format!("{:o}", meta.permissions().mode()))
}

#[cfg(not(unix))]
fn file_mode(_meta: &std::fs::Metadata) -> Option<String> {
    None
}
