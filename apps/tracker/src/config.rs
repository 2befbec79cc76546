use std::{fs, path::Path};

use anyhow::{bail, Context};
use serde::Deserialize;
use sync_core::{DEFAULT_MARKER_LABEL, DEFAULT_ZOOM};
use url::Url;

/// Local Firebase emulator.
const DEFAULT_DATABASE_URL: &str = "http://127.0.0.1:9000";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub map_zoom: f32,
    pub marker_label: String,
    pub use_memory_store: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            map_zoom: DEFAULT_ZOOM,
            marker_label: DEFAULT_MARKER_LABEL.into(),
            use_memory_store: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    database_url: Option<String>,
    map_zoom: Option<f32>,
    marker_label: Option<String>,
    use_memory_store: Option<bool>,
}

/// Defaults, then `config_path` if it exists, then the environment.
pub fn load_settings(config_path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match apply_file(&mut settings, &raw) {
            Ok(()) => tracing::debug!(path = %config_path.display(), "loaded config file"),
            Err(err) => tracing::warn!(path = %config_path.display(), "ignoring config file: {err}"),
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw).context("invalid tracker config")?;
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.map_zoom {
        settings.map_zoom = v;
    }
    if let Some(v) = file_cfg.marker_label {
        settings.marker_label = v;
    }
    if let Some(v) = file_cfg.use_memory_store {
        settings.use_memory_store = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = lookup("APP__MAP_ZOOM") {
        if let Ok(parsed) = v.parse::<f32>() {
            settings.map_zoom = parsed;
        }
    }

    if let Some(v) = lookup("APP__MARKER_LABEL") {
        settings.marker_label = v;
    }
}

/// Trim, drop trailing slashes and make sure the URL is something the
/// REST client can address (`http` or `https`).
pub fn normalize_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let trimmed = raw_database_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(DEFAULT_DATABASE_URL.to_string());
    }

    let url = Url::parse(trimmed)
        .with_context(|| format!("invalid database url '{raw_database_url}'"))?;
    match url.scheme() {
        "http" | "https" => {}
        other => bail!("unsupported database url scheme '{other}' in '{raw_database_url}'"),
    }
    if url.host_str().is_none() {
        bail!("database url '{raw_database_url}' has no host");
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
