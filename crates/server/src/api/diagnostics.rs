//! Read-only view of what the binary locator sees on this host.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clipfetch_core::{CandidateProbe, Platform, StrategyKind};

use crate::state::AppState;

/// Serverless bundles unpack here.
const TASK_ROOT: &str = "/var/task";

/// Entry names of a directory, or why it could not be read.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DirectoryListing {
    Entries(Vec<String>),
    Unreadable(String),
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub platform: Platform,
    pub cwd: Option<PathBuf>,
    pub exe_dir: Option<PathBuf>,
    pub candidates: Vec<CandidateProbe>,
    pub found: Option<PathBuf>,
    pub transcoder: PathBuf,
    pub strategies: Vec<StrategyKind>,
    pub scratch_dir: PathBuf,
    pub files_in_root: DirectoryListing,
    pub files_in_task: DirectoryListing,
    pub timestamp: String,
}

pub async fn get_diagnostics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let locator = state.locator();
    let candidates = locator.probe();
    let found = candidates
        .iter()
        .find(|c| c.is_file == Some(true))
        .map(|c| c.path.clone());

    let cwd = std::env::current_dir().ok();
    let files_in_root = match &cwd {
        Some(dir) => list_dir(dir).await,
        None => DirectoryListing::Unreadable("current directory unavailable".to_string()),
    };

    let response = DiagnosticsResponse {
        platform: locator.platform(),
        cwd,
        exe_dir: std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(PathBuf::from)),
        candidates,
        found,
        transcoder: state.config().transcoder.ffmpeg_binary(),
        strategies: state.orchestrator().strategy_kinds(),
        scratch_dir: state.orchestrator().scratch().root().to_path_buf(),
        files_in_root,
        files_in_task: list_dir(Path::new(TASK_ROOT)).await,
        timestamp: Utc::now().to_rfc3339(),
    };

    ([(header::CACHE_CONTROL, "no-store")], Json(response))
}

async fn list_dir(dir: &Path) -> DirectoryListing {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => return DirectoryListing::Unreadable(e.to_string()),
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().to_string()),
            Ok(None) => break,
            Err(e) => return DirectoryListing::Unreadable(e.to_string()),
        }
    }
    names.sort();
    DirectoryListing::Entries(names)
}
