use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE: &str = "breakdown.json";
const HISTORY_LIMIT: usize = 50;
const MIN_TIMEOUT_SECS: u64 = 5;

pub const CONFIG_PATH_ENV: &str = "BREAKDOWN_CONFIG";
pub const API_BASE_ENV: &str = "BREAKDOWN_API_BASE";
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to save config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base: String,
    pub persona: Option<String>,
    pub request_timeout_secs: u64,
    pub history: Vec<HistoryItem>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            persona: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            history: Vec::new(),
        }
    }
}

/// A previously loaded video, newest first in [`AppConfig::history`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub url: String,
    pub video_id: String,
    #[serde(alias = "segment_count")]
    pub segment_count: usize,
    pub timestamp: String,
}

pub fn normalize_api_base(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_BASE.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn normalize_persona(input: Option<String>) -> Option<String> {
    input
        .map(|persona| persona.trim().to_string())
        .filter(|persona| !persona.is_empty())
}

/// Config file location: `BREAKDOWN_CONFIG` or `breakdown.json` in the
/// working directory.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

/// Reads the config at `path`, creating it with defaults when missing.
/// A file that does not parse is kept as `.json.bak` and replaced.
pub fn load_or_create(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        let config = AppConfig::default();
        save(path, &config)?;
        return Ok(config);
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    match serde_json::from_str::<AppConfig>(&raw) {
        Ok(mut config) => {
            normalize_config(&mut config);
            Ok(config)
        }
        Err(e) => {
            let backup = path.with_extension("json.bak");
            tracing::warn!(
                "Config {} is corrupt ({}), backing up to {}",
                path.display(),
                e,
                backup.display()
            );
            let _ = fs::copy(path, backup);
            let config = AppConfig::default();
            save(path, &config)?;
            Ok(config)
        }
    }
}

/// Loads the config and applies environment overrides (not persisted).
pub fn load_effective(path: &Path) -> Result<AppConfig, ConfigError> {
    let mut config = load_or_create(path)?;
    if let Ok(api_base) = std::env::var(API_BASE_ENV) {
        config.api_base = normalize_api_base(&api_base);
    }
    Ok(config)
}

pub fn save(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Records a loaded video. Reloading the same video moves it to the top.
pub fn record_history(
    path: &Path,
    url: &str,
    video_id: &str,
    segment_count: usize,
) -> Result<(), ConfigError> {
    let mut config = load_or_create(path)?;
    push_history(&mut config, url, video_id, segment_count);
    save(path, &config)
}

pub fn clear_history(path: &Path) -> Result<(), ConfigError> {
    let mut config = load_or_create(path)?;
    config.history.clear();
    save(path, &config)
}

fn push_history(config: &mut AppConfig, url: &str, video_id: &str, segment_count: usize) {
    config
        .history
        .retain(|item| video_id.is_empty() || item.video_id != video_id);

    config.history.insert(
        0,
        HistoryItem {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.trim().to_string(),
            video_id: video_id.to_string(),
            segment_count,
            timestamp: Utc::now().to_rfc3339(),
        },
    );
    if config.history.len() > HISTORY_LIMIT {
        config.history.truncate(HISTORY_LIMIT);
    }
}

fn normalize_config(config: &mut AppConfig) {
    config.api_base = normalize_api_base(&config.api_base);
    config.persona = normalize_persona(config.persona.take());
    if config.request_timeout_secs < MIN_TIMEOUT_SECS {
        config.request_timeout_secs = DEFAULT_TIMEOUT_SECS;
    }
    config.history.truncate(HISTORY_LIMIT);
}
