//! Persistence of the last block whose heartbeat logs have been fully processed.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use tracing::*;

pub trait CheckpointStore: Send + Sync {
    /// The last processed block, never less than `default_min`. A missing or unreadable checkpoint yields
    /// `default_min`.
    fn load(&self, default_min: u64) -> u64;

    /// Records `value` as the last processed block. Zero is ignored, as is any value below the one already stored.
    fn commit(&self, value: u64) -> Result<()>;
}

/// A checkpoint kept as the decimal text of a block number in a single file.
#[derive(Debug)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Creates the store, along with any missing parent directories of `path`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create storage directory {parent:?}"))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<u64> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = ?self.path, "failed to read checkpoint: {e}");
                return None;
            }
        };
        match contents.trim().parse() {
            Ok(block) => Some(block),
            Err(e) => {
                warn!(path = ?self.path, contents = %contents.trim(), "ignoring corrupt checkpoint: {e}");
                None
            }
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, default_min: u64) -> u64 {
        clamp(self.read(), default_min)
    }

    fn commit(&self, value: u64) -> Result<()> {
        if value == 0 {
            return Ok(());
        }
        if let Some(stored) = self.read().filter(|stored| *stored > value) {
            warn!(stored, value, "refusing to move the checkpoint backwards");
            return Ok(());
        }
        fs::write(&self.path, value.to_string())
            .with_context(|| format!("failed to save checkpoint {value} to {:?}", self.path))
    }
}

/// An in-memory checkpoint which remembers every value written to it.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    commits: Mutex<Vec<u64>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: u64) -> Self {
        Self {
            commits: Mutex::new(vec![value]),
        }
    }

    pub fn value(&self) -> Option<u64> {
        self.commits.lock().unwrap().last().copied()
    }

    /// Every committed value, oldest first.
    pub fn commits(&self) -> Vec<u64> {
        self.commits.lock().unwrap().clone()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, default_min: u64) -> u64 {
        clamp(self.value(), default_min)
    }

    fn commit(&self, value: u64) -> Result<()> {
        let mut commits = self.commits.lock().unwrap();
        if value == 0 || commits.last().is_some_and(|last| *last > value) {
            return Ok(());
        }
        commits.push(value);
        Ok(())
    }
}

fn clamp(stored: Option<u64>, default_min: u64) -> u64 {
    stored.map_or(default_min, |stored| stored.max(default_min))
}
