//! Desktop wallpaper backends.
//!
//! The rotation engine only needs [`DisplayController::apply`]; everything
//! that shells out to a desktop environment lives here.

use std::{fmt, path::Path, process::Output, str::FromStr, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod hyprpaper;
mod macos;

pub use hyprpaper::Hyprpaper;
pub use macos::MacOs;

#[async_trait]
pub trait DisplayController: Send + Sync {
    /// Makes `path` the visible wallpaper.
    async fn apply(&self, path: &Path) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerKind {
    Hyprpaper,
    Macos,
}

impl ManagerKind {
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            ManagerKind::Macos
        } else {
            ManagerKind::Hyprpaper
        }
    }
}

impl FromStr for ManagerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hyprpaper" | "hyprland" => Ok(ManagerKind::Hyprpaper),
            "macos" | "osx" => Ok(ManagerKind::Macos),
            other => Err(anyhow!(
                "unknown manager '{other}' (expected 'hyprpaper' or 'macos')"
            )),
        }
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerKind::Hyprpaper => f.write_str("hyprpaper"),
            ManagerKind::Macos => f.write_str("macos"),
        }
    }
}

pub fn controller_for(kind: ManagerKind) -> Arc<dyn DisplayController> {
    match kind {
        ManagerKind::Hyprpaper => Arc::new(Hyprpaper),
        ManagerKind::Macos => Arc::new(MacOs),
    }
}

fn ensure_success(program: &str, output: &Output) -> anyhow::Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        Err(anyhow!("{program} exited with {}", output.status))
    } else {
        Err(anyhow!("{program} exited with {}: {stderr}", output.status))
    }
}
