use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use config::{Config, Environment, File, FileFormat};
use display::ManagerKind;
use rotation::{expand_path, DEFAULT_HISTORY_LIMIT};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "wallman.yaml";
const DATABASE_FILE_NAME: &str = "wallman.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub wallpaper_directories: Vec<String>,
    pub travel_sub_directories: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    pub history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wallpaper_directories: Vec::new(),
            travel_sub_directories: false,
            manager: None,
            database_url: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl Settings {
    /// Configured directories with `~` and environment variables expanded.
    pub fn wallpaper_dirs(&self) -> anyhow::Result<Vec<PathBuf>> {
        self.wallpaper_directories
            .iter()
            .map(|dir| expand_path(dir).map_err(anyhow::Error::from))
            .collect()
    }

    /// `--manager` wins over the config file, which wins over the platform
    /// default.
    pub fn manager_kind(&self, cli_override: Option<&str>) -> anyhow::Result<ManagerKind> {
        match cli_override.or(self.manager.as_deref()) {
            Some(name) => name.parse(),
            None => Ok(ManagerKind::platform_default()),
        }
    }

    pub fn database_url(&self) -> anyhow::Result<String> {
        match self.database_url.as_deref().map(str::trim) {
            Some(raw) if raw.starts_with("sqlite:") || raw.contains("://") => {
                Ok(normalize_database_url(raw))
            }
            Some(raw) if !raw.is_empty() => {
                let path = expand_path(raw)?;
                Ok(normalize_database_url(&path.to_string_lossy()))
            }
            _ => {
                let path = default_data_dir()?.join(DATABASE_FILE_NAME);
                Ok(normalize_database_url(&path.to_string_lossy()))
            }
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("unable to resolve home directory"))?;
    Ok(home.join(".config").join(CONFIG_FILE_NAME))
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("unable to resolve home directory"))?;
    Ok(home.join(".local").join("share").join("wallman"))
}

/// Loads the YAML config, then applies `WALLMAN__*` environment overrides.
///
/// An explicit `config_path` must exist; the default location is optional
/// and falls back to [`Settings::default`].
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (default_config_path()?, false),
    };

    let raw = Config::builder()
        .add_source(
            File::from(path.as_path())
                .format(FileFormat::Yaml)
                .required(required),
        )
        .add_source(
            Environment::with_prefix("WALLMAN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("wallpaper_directories"),
        )
        .build()
        .with_context(|| format!("failed to load config '{}'", path.display()))?;

    raw.try_deserialize()
        .with_context(|| format!("invalid config '{}'", path.display()))
}

#[derive(Debug, PartialEq, Eq)]
pub enum InitOutcome {
    Created(PathBuf),
    AlreadyExists(PathBuf),
}

/// Writes a default config to `path` unless a file is already there.
pub fn write_default_config(path: &Path) -> anyhow::Result<InitOutcome> {
    if path.exists() {
        return Ok(InitOutcome::AlreadyExists(path.to_path_buf()));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("error creating config directory '{}'", parent.display())
        })?;
    }

    let yaml = serde_yaml::to_string(&Settings::default()).context("error marshaling config")?;
    fs::write(path, yaml)
        .with_context(|| format!("error writing config file '{}'", path.display()))?;
    Ok(InitOutcome::Created(path.to_path_buf()))
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
