//! Wallpaper rotation: decides which wallpaper becomes active, records the
//! transition, then hands the path to a [`DisplayController`].

use std::{fs, path::PathBuf, sync::Arc};

use chrono::Utc;
use display::DisplayController;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use shared::{
    domain::{CycleState, HistoryEntry, WallpaperPath},
    error::RotationError,
};
use storage::{Storage, WriteTxn};
use tracing::{debug, info};

pub mod catalog;

pub use catalog::{expand_path, is_supported_image, Catalog, CatalogError};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Record transitions without touching the desktop.
    pub dry_run: bool,
}

pub struct RotationEngine {
    storage: Storage,
    catalog: Catalog,
    display: Arc<dyn DisplayController>,
    options: EngineOptions,
    shuffle_rng: StdRng,
}

impl RotationEngine {
    pub fn new(
        storage: Storage,
        catalog: Catalog,
        display: Arc<dyn DisplayController>,
        options: EngineOptions,
    ) -> Self {
        Self {
            storage,
            catalog,
            display,
            options,
            shuffle_rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Makes cycle shuffles reproducible. True-random picks are unaffected.
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Advances to the catalog entry after the current wallpaper, wrapping
    /// around. Starts at the first entry when the current wallpaper is unset
    /// or not in the catalog.
    pub async fn next(&self) -> Result<WallpaperPath, RotationError> {
        if self.catalog.is_empty() {
            return Err(RotationError::EmptyCatalog);
        }

        let mut txn = self.storage.begin_write().await?;
        let outcome = self.record_next(&mut txn).await;
        let path = txn.finish(outcome).await?;
        info!(path = %path, "next wallpaper");
        self.apply(&path).await?;
        Ok(path)
    }

    /// Re-selects the wallpaper shown before the current one. The previous
    /// wallpaper is appended to history as a new entry, so repeated calls
    /// alternate between the two most recent wallpapers.
    pub async fn previous(&self) -> Result<WallpaperPath, RotationError> {
        let mut txn = self.storage.begin_write().await?;
        let outcome = record_previous(&mut txn).await;
        let path = txn.finish(outcome).await?;
        info!(path = %path, "previous wallpaper");
        self.apply(&path).await?;
        Ok(path)
    }

    /// Picks a random wallpaper.
    ///
    /// With `true_random` every pick is an independent uniform draw and may
    /// repeat the current wallpaper. Otherwise wallpapers come from the
    /// persisted shuffle cycle: each one is shown once before any repeats,
    /// then the cycle is reshuffled. The cycle only advances once the
    /// wallpaper was applied, so a failed apply is retried on the next call.
    pub async fn random(&mut self, true_random: bool) -> Result<WallpaperPath, RotationError> {
        if self.catalog.is_empty() {
            return Err(RotationError::EmptyCatalog);
        }

        let mut txn = self.storage.begin_write().await?;
        let outcome = if true_random {
            self.record_true_random(&mut txn).await
        } else {
            self.record_cycle_pick(&mut txn).await
        };
        let path = txn.finish(outcome).await?;
        info!(path = %path, true_random, "random wallpaper");
        self.apply(&path).await?;

        if !true_random {
            let mut txn = self.storage.begin_write().await?;
            let outcome = self.advance_cycle(&mut txn, &path).await;
            txn.finish(outcome).await?;
        }
        Ok(path)
    }

    pub async fn current(&self) -> Result<WallpaperPath, RotationError> {
        self.storage
            .current()
            .await?
            .map(|record| record.path)
            .ok_or(RotationError::NotFound("no current wallpaper set"))
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, RotationError> {
        Ok(self.storage.history(limit).await?)
    }

    /// Sets a specific image file, which may live outside the catalog.
    pub async fn set(&self, raw_path: &str) -> Result<WallpaperPath, RotationError> {
        let path = WallpaperPath::from(validate_image_file(raw_path)?);

        self.storage.record_transition(&path).await?;
        info!(path = %path, "wallpaper set");
        self.apply(&path).await?;
        Ok(path)
    }

    async fn record_next(&self, txn: &mut WriteTxn) -> Result<WallpaperPath, RotationError> {
        let current = txn.current().await?;
        let index = current.and_then(|record| self.catalog.position(&record.path));
        let target = match index {
            Some(index) => (index + 1) % self.catalog.len(),
            None => 0,
        };
        let path = self
            .catalog
            .get(target)
            .cloned()
            .ok_or(RotationError::EmptyCatalog)?;

        txn.record_transition(&path, Utc::now()).await?;
        Ok(path)
    }

    async fn record_true_random(&self, txn: &mut WriteTxn) -> Result<WallpaperPath, RotationError> {
        // ThreadRng is a CSPRNG seeded from the operating system.
        let index = rand::rng().random_range(0..self.catalog.len());
        let path = self
            .catalog
            .get(index)
            .cloned()
            .ok_or(RotationError::EmptyCatalog)?;

        txn.record_transition(&path, Utc::now()).await?;
        Ok(path)
    }

    async fn record_cycle_pick(
        &mut self,
        txn: &mut WriteTxn,
    ) -> Result<WallpaperPath, RotationError> {
        let cycle = match txn.load_cycle().await? {
            Some(cycle) if self.catalog.matches(&cycle.sequence) && cycle.peek().is_some() => {
                cycle
            }
            Some(stale) => {
                debug!(
                    persisted = stale.sequence.len(),
                    catalog = self.catalog.len(),
                    "random cycle is stale, regenerating"
                );
                let cycle = self.fresh_cycle();
                txn.save_cycle(&cycle).await?;
                cycle
            }
            None => {
                debug!("no random cycle yet, generating");
                let cycle = self.fresh_cycle();
                txn.save_cycle(&cycle).await?;
                cycle
            }
        };

        let path = cycle.peek().cloned().ok_or(RotationError::EmptyCatalog)?;
        txn.record_transition(&path, Utc::now()).await?;
        Ok(path)
    }

    async fn advance_cycle(
        &mut self,
        txn: &mut WriteTxn,
        picked: &WallpaperPath,
    ) -> Result<(), RotationError> {
        let mut cycle = match txn.load_cycle().await? {
            Some(cycle)
                if self.catalog.matches(&cycle.sequence) && cycle.peek() == Some(picked) =>
            {
                cycle
            }
            _ => {
                debug!(path = %picked, "random cycle moved on since the pick, not advancing");
                return Ok(());
            }
        };

        if cycle.advance() {
            cycle.sequence.shuffle(&mut self.shuffle_rng);
            debug!("random cycle complete, reshuffled");
        }
        txn.save_cycle(&cycle).await?;
        Ok(())
    }

    fn fresh_cycle(&mut self) -> CycleState {
        let mut sequence = self.catalog.as_slice().to_vec();
        sequence.shuffle(&mut self.shuffle_rng);
        CycleState::new(sequence)
    }

    async fn apply(&self, path: &WallpaperPath) -> Result<(), RotationError> {
        if self.options.dry_run {
            info!(path = %path, "dry run, display left unchanged");
            return Ok(());
        }
        self.display
            .apply(path.as_path())
            .await
            .map_err(RotationError::Backend)
    }
}

async fn record_previous(txn: &mut WriteTxn) -> Result<WallpaperPath, RotationError> {
    let path = txn
        .previous()
        .await?
        .ok_or(RotationError::NotFound("no previous wallpaper"))?;
    txn.record_transition(&path, Utc::now()).await?;
    Ok(path)
}

/// Resolves `raw_path` to an absolute path naming a regular file with a
/// supported image extension.
pub fn validate_image_file(raw_path: &str) -> Result<PathBuf, RotationError> {
    let expanded =
        expand_path(raw_path).map_err(|err| RotationError::validation(err.to_string()))?;
    let path = std::path::absolute(&expanded).map_err(|err| {
        RotationError::validation(format!(
            "failed to resolve wallpaper path '{}': {err}",
            expanded.display()
        ))
    })?;

    let metadata = fs::metadata(&path).map_err(|err| {
        RotationError::validation(format!(
            "failed to access wallpaper file '{}': {err}",
            path.display()
        ))
    })?;
    if !metadata.is_file() {
        return Err(RotationError::validation(format!(
            "'{}' is not a regular file",
            path.display()
        )));
    }
    if !is_supported_image(&path) {
        return Err(RotationError::validation(format!(
            "unsupported image format for '{}' (supported: {})",
            path.display(),
            catalog::SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    Ok(path)
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
