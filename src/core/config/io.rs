use crate::core::config::data::{path_display, Config, Preferences};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Errors that can occur when reading or writing configuration files.
#[derive(Debug)]
pub enum ConfigError {
    /// No platform configuration directory could be determined.
    NoConfigDir,

    /// Failed to read a file from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid TOML for the expected shape.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Serializing or persisting the file failed.
    Write {
        path: PathBuf,
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoConfigDir => write!(f, "Failed to determine config directory"),
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read {}: {}", path_display(path), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse {}: {}", path_display(path), source)
            }
            ConfigError::Write { path, source } => {
                write!(f, "Failed to write {}: {}", path_display(path), source)
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::NoConfigDir => None,
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Write { source, .. } => Some(source.as_ref()),
        }
    }
}

fn config_dir() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("org", "chatline", "chatline")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(ConfigError::NoConfigDir)
}

fn load_toml<T: DeserializeOwned + Default>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `value` next to `path` and atomically rename it into place.
fn save_toml<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source: Box<dyn StdError + Send + Sync>| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).map_err(|e| write_err(Box::new(e)))?;
    }

    let contents = toml::to_string_pretty(value).map_err(|e| write_err(Box::new(e)))?;
    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .map_err(|e| write_err(Box::new(e)))?;

    temp_file
        .write_all(contents.as_bytes())
        .map_err(|e| write_err(Box::new(e)))?;
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|e| write_err(Box::new(e)))?;
    temp_file
        .persist(path)
        .map_err(|e| write_err(Box::new(e.error)))?;
    Ok(())
}

impl Config {
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from_path(&Self::get_config_path()?)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        load_toml(config_path)
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), ConfigError> {
        save_toml(self, config_path)
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        Ok(config_dir()?.join("config.toml"))
    }
}

impl Preferences {
    pub fn get_path() -> Result<PathBuf, ConfigError> {
        Ok(config_dir()?.join("state.toml"))
    }

    pub fn load_from_path(path: &Path) -> Result<Preferences, ConfigError> {
        load_toml(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        save_toml(self, path)
    }

    /// Load, apply `mutator`, and persist in one step.
    pub fn update<F>(path: &Path, mutator: F) -> Result<Preferences, ConfigError>
    where
        F: FnOnce(&mut Preferences),
    {
        let mut prefs = Self::load_from_path(path)?;
        mutator(&mut prefs);
        prefs.save_to_path(path)?;
        Ok(prefs)
    }
}
