//! Client configuration: streaming target, selected display, logging.
//!
//! Stored as TOML. [`SharedConfig`] is the single source of truth at
//! runtime; the streaming loop reads the display from it on every frame
//! and writes corrections back through [`DisplaySettings`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use framecast_core::DisplaySettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Listener host used when none is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Listener port used when a target omits one.
pub const DEFAULT_PORT: u16 = 56565;

// ── ConfigError ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid target {0:?}: expected host or host:port")]
    InvalidTarget(String),

    #[error("invalid port {0:?}: remove :port to use the default port {default}", default = DEFAULT_PORT)]
    InvalidPort(String),

    #[error("config I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for io::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}

// ── ClientConfig ─────────────────────────────────────────────────

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Where to stream to.
    pub target: TargetConfig,
    /// What to capture.
    pub capture: CaptureConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Listener address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
}

/// Capture settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Display index to capture (0 = first active display).
    pub display: usize,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            capture: CaptureConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { display: 0 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Target parsing ───────────────────────────────────────────────

impl TargetConfig {
    /// Parse `host` or `host:port`. A bare host uses [`DEFAULT_PORT`].
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let input = input.trim();
        let parts: Vec<&str> = input.split(':').collect();
        let (host, port) = match parts.as_slice() {
            [host] => (*host, DEFAULT_PORT),
            [host, port] => {
                let port = port
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort((*port).to_string()))?;
                (*host, port)
            }
            _ => return Err(ConfigError::InvalidTarget(input.to_string())),
        };

        let host = host.trim();
        if host.is_empty() {
            return Err(ConfigError::InvalidTarget(input.to_string()));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// `host:port`, as passed to the connector.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Short form for display: the port is shown only when it is not
    /// the default.
    pub fn connection(&self) -> String {
        if self.port != 0 && self.port != DEFAULT_PORT {
            self.address()
        } else {
            self.host.clone()
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write this configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        Self::default().save(path)
    }
}

// ── SharedConfig ─────────────────────────────────────────────────

/// Configuration shared between the front end and the streaming loop.
///
/// Every mutation is written back to the file it was loaded from.
#[derive(Debug)]
pub struct SharedConfig {
    path: PathBuf,
    config: RwLock<ClientConfig>,
}

impl SharedConfig {
    pub fn new(path: impl Into<PathBuf>, config: ClientConfig) -> Self {
        Self {
            path: path.into(),
            config: RwLock::new(config),
        }
    }

    /// Load from `path`, falling back to defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = ClientConfig::load(&path);
        Self::new(path, config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the current configuration.
    pub fn snapshot(&self) -> ClientConfig {
        self.read().clone()
    }

    /// Apply `f` and save the result.
    pub fn update<F>(&self, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut ClientConfig),
    {
        let mut config = self.write();
        f(&mut config);
        config.save(&self.path)
    }

    fn read(&self) -> RwLockReadGuard<'_, ClientConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ClientConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DisplaySettings for SharedConfig {
    fn display_index(&self) -> usize {
        self.read().capture.display
    }

    fn persist_display_index(&self, index: usize) -> io::Result<()> {
        self.update(|c| c.capture.display = index)?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
