//! Singleton summary record, file-backed

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::Summary;
use crate::utils::{atomic_write_json, cleanup_temp_files};

use super::StoreResult;

/// Holds the one [`Summary`] record
///
/// Every save replaces the whole record atomically, so a reader never sees
/// counters from one tick paired with the watermark of another.
#[derive(Debug, Clone)]
pub struct SummaryStore {
    path: PathBuf,
}

impl SummaryStore {
    /// Open the record at `path`, creating its directory if needed
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
            cleanup_temp_files(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The persisted summary, or `None` if none has been written yet
    pub fn load(&self) -> StoreResult<Option<Summary>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, summary: &Summary) -> StoreResult<()> {
        atomic_write_json(&self.path, summary)?;
        debug!(
            path = %self.path.display(),
            last_updated = %summary.last_updated,
            "Saved summary"
        );
        Ok(())
    }
}
