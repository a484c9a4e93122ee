use super::*;

fn wp(path: &str) -> WallpaperPath {
    WallpaperPath::from(path)
}

#[tokio::test]
async fn empty_store_has_no_current_previous_or_cycle() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert!(storage.current().await.expect("current").is_none());
    assert!(storage.previous().await.expect("previous").is_none());
    assert!(storage.load_cycle().await.expect("cycle").is_none());
    assert!(storage.history(100).await.expect("history").is_empty());
}

#[tokio::test]
async fn record_transition_moves_the_active_record() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.record_transition(&wp("/w/a.png")).await.expect("a");
    storage.record_transition(&wp("/w/b.png")).await.expect("b");

    let current = storage.current().await.expect("current").expect("some");
    assert_eq!(current.path, wp("/w/b.png"));
    assert!(current.unset_at.is_none());

    let active: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM current_wallpaper WHERE unset_at IS NULL")
            .fetch_one(storage.pool())
            .await
            .expect("count");
    assert_eq!(active, 1);

    let a_unset: Option<DateTime<Utc>> =
        sqlx::query_scalar("SELECT unset_at FROM current_wallpaper WHERE path = ?")
            .bind("/w/a.png")
            .fetch_one(storage.pool())
            .await
            .expect("a row");
    assert!(a_unset.is_some());
}

#[tokio::test]
async fn reselecting_a_wallpaper_reactivates_its_current_row() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    for path in ["/w/a.png", "/w/b.png", "/w/a.png"] {
        storage.record_transition(&wp(path)).await.expect("transition");
    }

    let current = storage.current().await.expect("current").expect("some");
    assert_eq!(current.path, wp("/w/a.png"));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM current_wallpaper")
        .fetch_one(storage.pool())
        .await
        .expect("count");
    assert_eq!(rows, 2);
}

#[tokio::test]
async fn history_is_most_recent_first_and_closes_superseded_entries() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    for path in ["/w/a.png", "/w/b.png", "/w/c.png"] {
        storage.record_transition(&wp(path)).await.expect("transition");
    }

    let history = storage.history(100).await.expect("history");
    let paths: Vec<_> = history.iter().map(|h| h.path.as_str()).collect();
    assert_eq!(paths, ["/w/c.png", "/w/b.png", "/w/a.png"]);
    assert!(history[0].unset_at.is_none());
    assert!(history[1].unset_at.is_some());
    assert!(history[2].unset_at.is_some());
    assert!(history[0].id > history[1].id);

    let limited = storage.history(2).await.expect("limited");
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].path, wp("/w/c.png"));
}

#[tokio::test]
async fn previous_needs_two_history_entries() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.record_transition(&wp("/w/a.png")).await.expect("a");
    assert!(storage.previous().await.expect("previous").is_none());

    storage.record_transition(&wp("/w/b.png")).await.expect("b");
    assert_eq!(
        storage.previous().await.expect("previous"),
        Some(wp("/w/a.png"))
    );
}

#[tokio::test]
async fn cycle_round_trips_as_a_single_row() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = CycleState {
        sequence: vec![wp("/w/b.png"), wp("/w/a.png")],
        cursor: 1,
    };
    storage.save_cycle(&first).await.expect("save");
    assert_eq!(storage.load_cycle().await.expect("load"), Some(first));

    let second = CycleState::new(vec![wp("/w/c.png")]);
    storage.save_cycle(&second).await.expect("overwrite");
    assert_eq!(storage.load_cycle().await.expect("load"), Some(second));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM random_cycle")
        .fetch_one(storage.pool())
        .await
        .expect("count");
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn negative_cursor_loads_out_of_range() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    sqlx::query(
        "INSERT INTO random_cycle (id, shuffled_wallpapers, current_index) VALUES (1, '[\"/w/a.png\"]', -3)",
    )
    .execute(storage.pool())
    .await
    .expect("insert");

    let cycle = storage.load_cycle().await.expect("load").expect("some");
    assert!(cycle.peek().is_none());
}

#[tokio::test]
async fn rolled_back_transaction_leaves_no_trace() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.record_transition(&wp("/w/a.png")).await.expect("a");

    let mut txn = storage.begin_write().await.expect("begin");
    txn.record_transition(&wp("/w/b.png"), Utc::now())
        .await
        .expect("b");
    txn.save_cycle(&CycleState::new(vec![wp("/w/b.png")]))
        .await
        .expect("cycle");
    txn.rollback().await.expect("rollback");

    let current = storage.current().await.expect("current").expect("some");
    assert_eq!(current.path, wp("/w/a.png"));
    assert_eq!(storage.history(10).await.expect("history").len(), 1);
    assert!(storage.load_cycle().await.expect("cycle").is_none());
}

#[tokio::test]
async fn finish_rolls_back_on_error() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut txn = storage.begin_write().await.expect("begin");
    txn.record_transition(&wp("/w/a.png"), Utc::now())
        .await
        .expect("a");
    let outcome: Result<()> = Err(anyhow::anyhow!("apply step failed"));
    let err = txn.finish(outcome).await.expect_err("error passes through");
    assert_eq!(err.to_string(), "apply step failed");

    assert!(storage.current().await.expect("current").is_none());
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db_path = temp.path().join("nested").join("wallman.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[test]
fn sqlite_path_ignores_memory_urls() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(sqlite_path("postgres://host/db"), None);
    assert_eq!(
        sqlite_path("sqlite:///tmp/wallman.db?mode=rwc"),
        Some(PathBuf::from("/tmp/wallman.db"))
    );
}
