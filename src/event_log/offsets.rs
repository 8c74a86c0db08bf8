//! Consumer-group offset records
//!
//! One JSON file per group under the offsets directory, rewritten
//! atomically on every commit.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::{atomic_write_json, cleanup_temp_files};

use super::store::{EventLogError, EventLogResult};

/// Persisted cursor for one consumer group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetRecord {
    pub group: String,
    pub last_consumed_position: u64,
    pub committed_at: DateTime<Utc>,
}

/// File-backed store of committed offsets
pub(crate) struct OffsetStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, u64>>,
}

impl OffsetStore {
    pub(crate) fn open<P: AsRef<Path>>(dir: P) -> EventLogResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        cleanup_temp_files(&dir)?;

        Ok(Self {
            dir,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn path_for(&self, group: &str) -> EventLogResult<PathBuf> {
        validate_group(group)?;
        Ok(self.dir.join(format!("{}.json", group)))
    }

    /// Last committed position for `group`
    pub(crate) fn committed(&self, group: &str) -> EventLogResult<Option<u64>> {
        let mut cache = self.cache.lock();
        self.load_locked(&mut cache, group)
    }

    fn load_locked(
        &self,
        cache: &mut HashMap<String, u64>,
        group: &str,
    ) -> EventLogResult<Option<u64>> {
        if let Some(position) = cache.get(group) {
            return Ok(Some(*position));
        }

        let path = self.path_for(group)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: OffsetRecord = serde_json::from_str(&content)?;
        cache.insert(group.to_string(), record.last_consumed_position);
        Ok(Some(record.last_consumed_position))
    }

    /// Record `position` for `group` unless an equal or later one is stored
    pub(crate) fn commit(&self, group: &str, position: u64) -> EventLogResult<u64> {
        let mut cache = self.cache.lock();

        if let Some(current) = self.load_locked(&mut cache, group)? {
            if position <= current {
                debug!(group, position, current, "Ignoring non-advancing commit");
                return Ok(current);
            }
        }

        let record = OffsetRecord {
            group: group.to_string(),
            last_consumed_position: position,
            committed_at: Utc::now(),
        };
        atomic_write_json(self.path_for(group)?, &record)?;
        cache.insert(group.to_string(), position);

        debug!(group, position, "Committed offset");
        Ok(position)
    }
}

fn validate_group(group: &str) -> EventLogResult<()> {
    let valid = !group.is_empty()
        && group
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !group.starts_with('.');

    if valid {
        Ok(())
    } else {
        Err(EventLogError::InvalidGroup(group.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_commit_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = OffsetStore::open(temp_dir.path()).unwrap();
            assert_eq!(store.committed("event_group").unwrap(), None);
            store.commit("event_group", 4).unwrap();
        }

        let store = OffsetStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.committed("event_group").unwrap(), Some(4));

        let record: OffsetRecord = serde_json::from_str(
            &fs::read_to_string(temp_dir.path().join("event_group.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(record.last_consumed_position, 4);
    }

    #[test]
    fn test_groups_are_independent() {
        let temp_dir = TempDir::new().unwrap();
        let store = OffsetStore::open(temp_dir.path()).unwrap();

        store.commit("a", 3).unwrap();
        store.commit("b", 1).unwrap();

        assert_eq!(store.committed("a").unwrap(), Some(3));
        assert_eq!(store.committed("b").unwrap(), Some(1));
    }

    #[test]
    fn test_commit_zero_then_lower_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let store = OffsetStore::open(temp_dir.path()).unwrap();

        assert_eq!(store.commit("g", 0).unwrap(), 0);
        assert_eq!(store.commit("g", 0).unwrap(), 0);
        assert_eq!(store.commit("g", 1).unwrap(), 1);
    }

    #[test]
    fn test_invalid_group_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = OffsetStore::open(temp_dir.path()).unwrap();

        for name in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                store.committed(name),
                Err(EventLogError::InvalidGroup(_))
            ));
        }
    }
}
