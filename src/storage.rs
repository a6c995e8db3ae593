//! Artifact persistence
//!
//! One JSON file per (year, month) at `<base>/<year>/<MM>/aet_<year>_<MM>.json`.
//! Writing again overwrites, so reprocessing a month is idempotent.

use crate::error::Result;
use crate::types::QueryTarget;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Writes monthly payloads below a base directory
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `base_dir` (created on first save)
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Deterministic path of the artifact for `target`
    pub fn path_for(&self, target: QueryTarget) -> PathBuf {
        let month = target.month_label();
        self.base_dir
            .join(target.year.to_string())
            .join(&month)
            .join(format!("aet_{}_{}.json", target.year, month))
    }

    /// Write `payload` pretty-printed, creating missing directories
    pub async fn save<T>(&self, payload: &T, target: QueryTarget) -> Result<PathBuf>
    where
        T: Serialize + ?Sized,
    {
        let path = self.path_for(target);
        let bytes = serde_json::to_vec_pretty(payload)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        info!(period = %target, path = %path.display(), bytes = bytes.len(), "Data saved");
        Ok(path)
    }
}
