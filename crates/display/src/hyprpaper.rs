use std::path::Path;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::{ensure_success, DisplayController};

/// Drives hyprpaper through `hyprctl hyprpaper` IPC.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hyprpaper;

fn preload_args(path: &str) -> [&str; 3] {
    ["hyprpaper", "preload", path]
}

fn wallpaper_target(path: &str) -> String {
    // An empty monitor name before the comma targets every monitor.
    format!(",{path}")
}

async fn hyprctl(args: &[&str]) -> anyhow::Result<()> {
    let output = Command::new("hyprctl")
        .args(args)
        .output()
        .await
        .context("run hyprctl")?;
    ensure_success("hyprctl", &output)
}

#[async_trait]
impl DisplayController for Hyprpaper {
    async fn apply(&self, path: &Path) -> anyhow::Result<()> {
        let path = path
            .to_str()
            .ok_or_else(|| anyhow!("path is not valid UTF-8"))?;

        hyprctl(&preload_args(path))
            .await
            .context("hyprpaper preload")?;
        let target = wallpaper_target(path);
        hyprctl(&["hyprpaper", "wallpaper", &target])
            .await
            .context("hyprpaper wallpaper")?;

        // Best-effort: release images no monitor shows anymore.
        if let Err(err) = hyprctl(&["hyprpaper", "unload", "unused"]).await {
            warn!(error = %err, "hyprpaper unload failed");
        }

        info!(path, "hyprpaper wallpaper applied");
        Ok(())
    }
}
