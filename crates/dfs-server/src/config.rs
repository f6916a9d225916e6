//! Server configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file
//! at all) yields a working localhost server on port 1024.
//!
//! ```toml
//! port = 1024
//! base_dir = "~/dfs"
//! root = "FileSystemDir"
//! framing = "length-prefixed"
//! confine_to_root = true
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dfs_kernel::{DEFAULT_ROOT, ManagerConfig};
use dfs_wire::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_RECV_BUFFER_SIZE, FrameLimits, Framing};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BIND_ADDRESS, DEFAULT_PORT,
    DEFAULT_SWEEP_INTERVAL_SECS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Directory the root segment lives in.
    pub base_dir: PathBuf,
    /// Root segment every session starts in. A single path component.
    pub root: String,
    pub sweep_interval_secs: u64,
    pub framing: Framing,
    pub recv_buffer_size: usize,
    pub max_message_size: usize,
    pub confine_to_root: bool,
    pub release_on_disconnect: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            base_dir: PathBuf::from("."),
            root: DEFAULT_ROOT.to_string(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            framing: Framing::Raw,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            confine_to_root: false,
            release_on_disconnect: false,
        }
    }
}

impl ServerConfig {
    /// `$XDG_CONFIG_HOME/dfs/server.toml` (or the platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Parse TOML text. `origin` is only used in error messages.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.base_dir = expand_tilde(&config.base_dir);
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let path = expand_tilde(path);
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&text, &path)
    }

    /// Load an explicitly named file, or the default file when it exists,
    /// or fall back to defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::info!(path = %path.display(), "loading config");
                Self::load(&path)
            }
            _ => {
                tracing::debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.is_empty() || self.root.contains(['/', '\\']) || self.root == ".." {
            return Err(ConfigError::Invalid(format!(
                "root must be a single path component, got {:?}",
                self.root
            )));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid("sweep_interval_secs must be positive".into()));
        }
        if self.recv_buffer_size == 0 {
            return Err(ConfigError::Invalid("recv_buffer_size must be positive".into()));
        }
        if self.max_message_size == 0 || self.max_message_size > u32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "max_message_size must be between 1 and {}",
                u32::MAX
            )));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            recv_buffer_size: self.recv_buffer_size,
            max_message_size: self.max_message_size,
        }
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            root: self.root.clone(),
            base_dir: self.base_dir.clone(),
            sweep_interval: self.sweep_interval(),
            confine_to_root: self.confine_to_root,
            release_on_disconnect: self.release_on_disconnect,
        }
    }
}

/// Expand a leading `~` in a path.
pub fn expand_tilde(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}
