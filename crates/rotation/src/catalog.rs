//! The set of wallpapers eligible for rotation.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use shared::domain::WallpaperPath;
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions (lowercase, without dot) accepted as wallpapers.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("wallpaper directory does not exist or is not a directory: {0}")]
    BadDir(String),
    #[error("failed to walk wallpaper directory {dir}: {source}")]
    Walk {
        dir: String,
        #[source]
        source: walkdir::Error,
    },
    #[error("failed to expand path '{0}': {1}")]
    Expand(String, String),
}

/// Return `true` if `path` has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.iter().any(|e| *e == ext)
        })
}

/// Expands `~` and environment variables the way a shell would.
pub fn expand_path(raw: &str) -> Result<PathBuf, CatalogError> {
    let expanded = shellexpand::full(raw.trim())
        .map_err(|err| CatalogError::Expand(raw.to_string(), err.to_string()))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Ordered, deduplicated wallpaper paths. Order is what `next` walks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    wallpapers: Vec<WallpaperPath>,
}

impl Catalog {
    /// Builds a catalog from explicit paths, keeping the first occurrence of
    /// each.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<WallpaperPath>,
    {
        let mut seen = HashSet::new();
        let wallpapers = paths
            .into_iter()
            .map(Into::into)
            .filter(|p: &WallpaperPath| seen.insert(p.clone()))
            .collect();
        Self { wallpapers }
    }

    /// Lists supported images under each directory, in directory order and
    /// then by file name. Without `recursive` only direct children count.
    pub fn scan(dirs: &[PathBuf], recursive: bool) -> Result<Self, CatalogError> {
        let bad: Vec<_> = dirs
            .iter()
            .filter(|d| !d.is_dir())
            .map(|d| d.to_string_lossy().into_owned())
            .collect();
        if !bad.is_empty() {
            return Err(CatalogError::BadDir(bad.join(", ")));
        }

        let mut found = Vec::new();
        for root in dirs {
            let mut walker = WalkDir::new(root)
                .min_depth(1)
                .follow_links(true)
                .sort_by_file_name();
            if !recursive {
                walker = walker.max_depth(1);
            }

            for entry in walker {
                let entry = entry.map_err(|source| CatalogError::Walk {
                    dir: root.to_string_lossy().into_owned(),
                    source,
                })?;
                if entry.file_type().is_file() && is_supported_image(entry.path()) {
                    found.push(WallpaperPath::from(entry.path()));
                }
            }
        }

        Ok(Self::from_paths(found))
    }

    pub fn len(&self) -> usize {
        self.wallpapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallpapers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WallpaperPath> {
        self.wallpapers.get(index)
    }

    pub fn as_slice(&self) -> &[WallpaperPath] {
        &self.wallpapers
    }

    pub fn iter(&self) -> impl Iterator<Item = &WallpaperPath> {
        self.wallpapers.iter()
    }

    /// First index of `path`, by string equality.
    pub fn position(&self, path: &WallpaperPath) -> Option<usize> {
        self.wallpapers.iter().position(|w| w == path)
    }

    /// `true` when `sequence` holds exactly the catalog's wallpapers.
    pub fn matches(&self, sequence: &[WallpaperPath]) -> bool {
        if sequence.len() != self.wallpapers.len() {
            return false;
        }
        let ours: HashSet<&WallpaperPath> = self.wallpapers.iter().collect();
        let theirs: HashSet<&WallpaperPath> = sequence.iter().collect();
        ours == theirs
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
