use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::{debug, warn};

use shared::domain::{CurrentRecord, CycleState, HistoryEntry, WallpaperPath};

/// Durable wallpaper state: the active wallpaper, the history log and the
/// random cycle.
///
/// The pool holds a single connection. Every mutation goes through a
/// [`WriteTxn`], which takes SQLite's write lock up front so concurrent
/// invocations queue behind each other instead of interleaving.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(10));
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open database '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Opens an exclusive-writer transaction (`BEGIN IMMEDIATE`).
    pub async fn begin_write(&self) -> Result<WriteTxn> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("failed to acquire database connection")?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .context("failed to begin write transaction")?;
        Ok(WriteTxn { conn, open: true })
    }

    /// Makes `path` the active wallpaper as one atomic unit.
    pub async fn record_transition(&self, path: &WallpaperPath) -> Result<()> {
        let mut txn = self.begin_write().await?;
        let outcome = txn.record_transition(path, Utc::now()).await;
        txn.finish(outcome).await
    }

    pub async fn current(&self) -> Result<Option<CurrentRecord>> {
        let mut conn = self.pool.acquire().await?;
        select_current(&mut conn).await
    }

    pub async fn previous(&self) -> Result<Option<WallpaperPath>> {
        let mut conn = self.pool.acquire().await?;
        select_previous(&mut conn).await
    }

    /// Up to `limit` history entries, most recent first.
    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut conn = self.pool.acquire().await?;
        select_history(&mut conn, limit).await
    }

    pub async fn load_cycle(&self) -> Result<Option<CycleState>> {
        let mut conn = self.pool.acquire().await?;
        select_cycle(&mut conn).await
    }

    pub async fn save_cycle(&self, cycle: &CycleState) -> Result<()> {
        let mut txn = self.begin_write().await?;
        let outcome = txn.save_cycle(cycle).await;
        txn.finish(outcome).await
    }
}

/// A `BEGIN IMMEDIATE` transaction on the storage connection.
///
/// Finish it with [`WriteTxn::commit`], [`WriteTxn::rollback`] or
/// [`WriteTxn::finish`]. Dropping an unfinished transaction closes the
/// connection, which makes SQLite discard the pending writes.
pub struct WriteTxn {
    conn: PoolConnection<Sqlite>,
    open: bool,
}

impl WriteTxn {
    pub async fn record_transition(
        &mut self,
        path: &WallpaperPath,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE current_wallpaper SET unset_at = ? WHERE unset_at IS NULL")
            .bind(now)
            .execute(&mut *self.conn)
            .await
            .context("failed to mark previous wallpaper unset")?;

        sqlx::query("UPDATE wallpaper_history SET unset_at = ? WHERE unset_at IS NULL")
            .bind(now)
            .execute(&mut *self.conn)
            .await
            .context("failed to close previous history entry")?;

        sqlx::query("INSERT INTO wallpaper_history (path, set_at) VALUES (?, ?)")
            .bind(path.as_str())
            .bind(now)
            .execute(&mut *self.conn)
            .await
            .context("failed to insert history")?;

        sqlx::query(
            "INSERT INTO current_wallpaper (path, set_at, unset_at) VALUES (?, ?, NULL)
             ON CONFLICT(path) DO UPDATE SET set_at = excluded.set_at, unset_at = NULL",
        )
        .bind(path.as_str())
        .bind(now)
        .execute(&mut *self.conn)
        .await
        .context("failed to update current")?;

        debug!(path = %path, "recorded wallpaper transition");
        Ok(())
    }

    pub async fn current(&mut self) -> Result<Option<CurrentRecord>> {
        select_current(&mut self.conn).await
    }

    pub async fn previous(&mut self) -> Result<Option<WallpaperPath>> {
        select_previous(&mut self.conn).await
    }

    pub async fn load_cycle(&mut self) -> Result<Option<CycleState>> {
        select_cycle(&mut self.conn).await
    }

    pub async fn save_cycle(&mut self, cycle: &CycleState) -> Result<()> {
        let shuffled =
            serde_json::to_string(&cycle.sequence).context("failed to encode shuffled wallpapers")?;
        let cursor = i64::try_from(cycle.cursor).context("cycle cursor out of range")?;
        sqlx::query(
            r#"
            INSERT INTO random_cycle (id, shuffled_wallpapers, current_index, updated_at)
            VALUES (1, ?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                shuffled_wallpapers = excluded.shuffled_wallpapers,
                current_index = excluded.current_index,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(shuffled)
        .bind(cursor)
        .execute(&mut *self.conn)
        .await
        .context("failed to upsert random cycle")?;
        Ok(())
    }

    pub async fn commit(mut self) -> Result<()> {
        sqlx::query("COMMIT")
            .execute(&mut *self.conn)
            .await
            .context("failed to commit write transaction")?;
        self.open = false;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        sqlx::query("ROLLBACK")
            .execute(&mut *self.conn)
            .await
            .context("failed to roll back write transaction")?;
        self.open = false;
        Ok(())
    }

    /// Commits when `outcome` is `Ok`, rolls back and hands the error through
    /// otherwise.
    pub async fn finish<T, E>(self, outcome: Result<T, E>) -> Result<T, E>
    where
        E: From<anyhow::Error>,
    {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl Drop for WriteTxn {
    fn drop(&mut self) {
        if self.open {
            self.conn.close_on_drop();
        }
    }
}

async fn select_current(conn: &mut SqliteConnection) -> Result<Option<CurrentRecord>> {
    let row = sqlx::query(
        "SELECT path, set_at, unset_at
         FROM current_wallpaper
         WHERE unset_at IS NULL
         ORDER BY set_at DESC
         LIMIT 1",
    )
    .fetch_optional(&mut *conn)
    .await
    .context("error getting current wallpaper")?;

    row.map(|row| -> Result<CurrentRecord> {
        Ok(CurrentRecord {
            path: WallpaperPath(row.try_get("path")?),
            set_at: row.try_get("set_at")?,
            unset_at: row.try_get("unset_at")?,
        })
    })
    .transpose()
}

async fn select_previous(conn: &mut SqliteConnection) -> Result<Option<WallpaperPath>> {
    let row = sqlx::query("SELECT path FROM wallpaper_history ORDER BY id DESC LIMIT 1 OFFSET 1")
        .fetch_optional(&mut *conn)
        .await
        .context("error getting previous wallpaper")?;
    Ok(row.map(|r| WallpaperPath(r.get::<String, _>(0))))
}

async fn select_history(conn: &mut SqliteConnection, limit: usize) -> Result<Vec<HistoryEntry>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = sqlx::query(
        "SELECT id, path, set_at, unset_at
         FROM wallpaper_history
         ORDER BY id DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
    .context("error getting wallpaper history")?;

    rows.into_iter()
        .map(|row| -> Result<HistoryEntry> {
            Ok(HistoryEntry {
                id: row.try_get("id")?,
                path: WallpaperPath(row.try_get("path")?),
                set_at: row.try_get("set_at")?,
                unset_at: row.try_get("unset_at")?,
            })
        })
        .collect()
}

async fn select_cycle(conn: &mut SqliteConnection) -> Result<Option<CycleState>> {
    let row = sqlx::query("SELECT shuffled_wallpapers, current_index FROM random_cycle WHERE id = 1")
        .fetch_optional(&mut *conn)
        .await
        .context("error getting random cycle")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let shuffled: String = row.try_get("shuffled_wallpapers")?;
    let sequence: Vec<WallpaperPath> =
        serde_json::from_str(&shuffled).context("error decoding shuffled wallpapers")?;
    // A negative index can only come from a corrupted row; push it out of
    // range so the engine regenerates the cycle.
    let cursor = usize::try_from(row.try_get::<i64, _>("current_index")?).unwrap_or(usize::MAX);
    Ok(Some(CycleState { sequence, cursor }))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
