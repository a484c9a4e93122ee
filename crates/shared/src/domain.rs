use std::{
    fmt,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A wallpaper is identified by its path string alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WallpaperPath(pub String);

impl WallpaperPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for WallpaperPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Path> for WallpaperPath {
    fn from(value: &Path) -> Self {
        Self(value.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for WallpaperPath {
    fn from(value: PathBuf) -> Self {
        Self::from(value.as_path())
    }
}

impl From<&str> for WallpaperPath {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentRecord {
    pub path: WallpaperPath,
    pub set_at: DateTime<Utc>,
    pub unset_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub path: WallpaperPath,
    pub set_at: DateTime<Utc>,
    pub unset_at: Option<DateTime<Utc>>,
}

/// Persisted no-repeat shuffle: a permutation of the catalog plus the index
/// of the next wallpaper to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    pub sequence: Vec<WallpaperPath>,
    pub cursor: usize,
}

impl CycleState {
    pub fn new(sequence: Vec<WallpaperPath>) -> Self {
        Self {
            sequence,
            cursor: 0,
        }
    }

    /// The wallpaper under the cursor, if the cursor is in range.
    pub fn peek(&self) -> Option<&WallpaperPath> {
        self.sequence.get(self.cursor)
    }

    /// Moves the cursor forward. Returns `true` when the cycle is exhausted
    /// and the cursor wrapped back to the start.
    pub fn advance(&mut self) -> bool {
        self.cursor += 1;
        if self.cursor >= self.sequence.len() {
            self.cursor = 0;
            return true;
        }
        false
    }
}
