//! Search-root providers for the binary locator.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Serverless execution root used by common function platforms.
pub const SERVERLESS_ROOT: &str = "/var/task";

/// A directory provider consulted by the locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "path", rename_all = "snake_case")]
pub enum SearchRoot {
    /// The process working directory, optionally joined with a relative subdirectory.
    WorkingDir(Option<PathBuf>),
    /// A fixed absolute directory.
    Fixed(PathBuf),
    /// The directory containing the running executable.
    ExecutableDir,
}

impl SearchRoot {
    /// Resolves the provider to a concrete directory, if it has one.
    pub fn resolve(&self) -> Option<PathBuf> {
        match self {
            Self::WorkingDir(sub) => {
                let cwd = std::env::current_dir().ok()?;
                Some(match sub {
                    Some(sub) => cwd.join(sub),
                    None => cwd,
                })
            }
            Self::Fixed(path) => Some(path.clone()),
            Self::ExecutableDir => std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
        }
    }

    /// The built-in root order: cwd, serverless root, build outputs, executable dir.
    pub fn defaults() -> Vec<SearchRoot> {
        vec![
            Self::WorkingDir(None),
            Self::Fixed(PathBuf::from(SERVERLESS_ROOT)),
            Self::WorkingDir(Some(PathBuf::from("bin"))),
            Self::WorkingDir(Some(PathBuf::from("target/release"))),
            Self::WorkingDir(Some(PathBuf::from("dist"))),
            Self::ExecutableDir,
        ]
    }
}
