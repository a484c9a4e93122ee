use std::path::Path;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::{ensure_success, DisplayController};

/// Sets the picture of every desktop through `osascript`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacOs;

fn set_picture_script(path: &str) -> String {
    let escaped = path.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        r#"tell application "System Events" to set picture of every desktop to POSIX file "{escaped}""#
    )
}

#[async_trait]
impl DisplayController for MacOs {
    async fn apply(&self, path: &Path) -> anyhow::Result<()> {
        let path = path
            .to_str()
            .ok_or_else(|| anyhow!("path is not valid UTF-8"))?;
        let output = Command::new("osascript")
            .arg("-e")
            .arg(set_picture_script(path))
            .output()
            .await
            .context("run osascript")?;
        ensure_success("osascript", &output)?;

        info!(path, "macOS wallpaper applied");
        Ok(())
    }
}
