//! JSON file persistence for the prompt configuration.
//!
//! One document at a fixed path. Saves overwrite the whole file with no
//! locking, so concurrent savers race and the last write wins.

use std::path::{Path, PathBuf};

use crate::prompts::PromptSet;

/// Default location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "agent_task_config.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("can't read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("bad config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("config file {path} does not contain a JSON object")]
    NotAnObject { path: PathBuf },
    #[error("can't save config to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("can't serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Handle on the persisted configuration file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw document.
    ///
    /// A missing file yields an empty map. Anything else that stops the
    /// file from being read as a JSON object is an error.
    pub fn load(&self) -> Result<serde_json::Map<String, serde_json::Value>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No config file, starting empty");
                return Ok(serde_json::Map::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        match value {
            serde_json::Value::Object(map) => {
                tracing::debug!(path = %self.path.display(), keys = map.len(), "Loaded config");
                Ok(map)
            }
            _ => Err(StoreError::NotAnObject {
                path: self.path.clone(),
            }),
        }
    }

    /// Overwrite the file with the full prompt set.
    pub fn save(&self, prompts: &PromptSet) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(prompts)?;
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        std::fs::write(&self.path, body).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(path = %self.path.display(), "Saved config");
        Ok(())
    }
}
