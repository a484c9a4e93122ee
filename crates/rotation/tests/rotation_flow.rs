use std::{collections::HashSet, fs, path::Path, sync::Arc};

use async_trait::async_trait;
use display::DisplayController;
use rotation::{Catalog, EngineOptions, RotationEngine};
use storage::Storage;

struct NoopDisplay;

#[async_trait]
impl DisplayController for NoopDisplay {
    async fn apply(&self, _path: &Path) -> anyhow::Result<()> {
        Ok(())
    }
}

fn database_url(dir: &Path) -> String {
    let db_path = dir.join("state").join("wallman.db");
    format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"))
}

fn wallpaper_dir(root: &Path, names: &[&str]) -> Catalog {
    let walls = root.join("walls");
    fs::create_dir_all(&walls).expect("mkdir");
    for name in names {
        fs::write(walls.join(name), b"").expect("write image");
    }
    Catalog::scan(&[walls], false).expect("scan")
}

async fn open_engine(url: &str, catalog: Catalog) -> RotationEngine {
    let storage = Storage::new(url).await.expect("open db");
    RotationEngine::new(
        storage,
        catalog,
        Arc::new(NoopDisplay),
        EngineOptions::default(),
    )
}

#[tokio::test]
async fn rotation_state_carries_over_between_runs() {
    let temp = tempfile::tempdir().expect("tempdir");
    let url = database_url(temp.path());
    let catalog = wallpaper_dir(temp.path(), &["a.png", "b.jpg", "c.jpeg", "notes.md"]);
    assert_eq!(catalog.len(), 3);

    let mut seen = HashSet::new();
    for _ in 0..2 {
        let mut engine = open_engine(&url, catalog.clone()).await;
        seen.insert(engine.random(false).await.expect("random"));
    }
    let mut engine = open_engine(&url, catalog.clone()).await;
    seen.insert(engine.random(false).await.expect("random"));
    assert_eq!(seen.len(), 3, "one cycle spans separate runs: {seen:?}");

    let first = engine.next().await.expect("next");
    let engine = open_engine(&url, catalog.clone()).await;
    let second = engine.next().await.expect("next");
    assert_eq!(
        catalog.position(&second),
        catalog.position(&first).map(|i| (i + 1) % catalog.len())
    );
    assert_eq!(engine.previous().await.expect("previous"), first);
}

#[tokio::test]
async fn concurrent_runs_keep_one_consistent_cycle() {
    let temp = tempfile::tempdir().expect("tempdir");
    let url = database_url(temp.path());
    let catalog = wallpaper_dir(
        temp.path(),
        &["1.png", "2.png", "3.png", "4.png", "5.png", "6.png"],
    );

    let mut workers = Vec::new();
    for _ in 0..2 {
        let mut engine = open_engine(&url, catalog.clone()).await;
        workers.push(tokio::spawn(async move {
            let mut picks = Vec::new();
            for _ in 0..3 {
                picks.push(engine.random(false).await.expect("random"));
            }
            picks
        }));
    }

    let mut picks = Vec::new();
    for worker in workers {
        picks.extend(worker.await.expect("join"));
    }
    assert!(
        picks.iter().all(|pick| catalog.position(pick).is_some()),
        "picks {picks:?}"
    );

    let engine = open_engine(&url, catalog.clone()).await;
    assert_eq!(engine.history(100).await.expect("history").len(), 6);

    let storage = Storage::new(&url).await.expect("open db");
    let cycle = storage.load_cycle().await.expect("load").expect("cycle");
    assert!(catalog.matches(&cycle.sequence));
    assert!(cycle.peek().is_some());
}
