//! Persisted config (Ollama endpoint, models, index location) in the app data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::ollama::{DEFAULT_BASE_URL, DEFAULT_EMBED_MODEL, DEFAULT_GENERATE_MODEL};

const CONFIG_FILENAME: &str = "config.toml";

/// Results returned per query when neither the config nor the caller says otherwise.
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Ollama server.
    pub ollama_url: Option<String>,
    pub embed_model: Option<String>,
    /// Model used by `ask` to answer from retrieved context.
    pub generate_model: Option<String>,
    /// Directory holding the persisted index.
    pub index_dir: Option<String>,
    pub top_k: Option<usize>,
}

impl Config {
    pub fn ollama_url(&self) -> &str {
        non_empty(&self.ollama_url).unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn embed_model(&self) -> &str {
        non_empty(&self.embed_model).unwrap_or(DEFAULT_EMBED_MODEL)
    }

    pub fn generate_model(&self) -> &str {
        non_empty(&self.generate_model).unwrap_or(DEFAULT_GENERATE_MODEL)
    }

    pub fn top_k(&self) -> usize {
        self.top_k.unwrap_or(DEFAULT_TOP_K)
    }

    /// Configured index directory, else the default one under app data.
    pub fn index_dir(&self) -> Option<PathBuf> {
        non_empty(&self.index_dir)
            .map(PathBuf::from)
            .or_else(app_data::default_index_dir)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    let Some(data_dir) = app_data::app_data_dir() else {
        return Config::default();
    };
    load_config_from(&data_dir.join(CONFIG_FILENAME))
}

/// Load config from `path`. Returns default config if missing or invalid.
pub fn load_config_from(path: &Path) -> Config {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    toml::from_str(&s).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
        Config::default()
    })
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let data_dir = app_data::app_data_dir().ok_or(ConfigError::NoDataDir)?;
    save_config_to(&data_dir.join(CONFIG_FILENAME), config)
}

/// Save config to `path`.
pub fn save_config_to(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}

/// Set and persist the index directory. The directory need not exist yet.
pub fn set_index_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_err(ConfigError::ResolvePath)?.join(path)
    };
    if path.exists() && !path.is_dir() {
        return Err(ConfigError::NotADirectory(path));
    }
    let mut config = load_config();
    config.index_dir = Some(path.to_string_lossy().into_owned());
    save_config(&config)?;
    Ok(path)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    ResolvePath(std::io::Error),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}
