//! Global configuration for formulary.
//!
//! Configuration lives in a single TOML file, by default
//! `~/.formulary/config.toml`, overridable with the `FORMULARY_CONFIG`
//! environment variable. Every field is optional; a missing file yields
//! defaults. CLI flags always win over configured values, which win over
//! the built-in defaults:
//!
//! ```toml
//! prefix = "~/.formulary/prefix"
//! cache_dir = "~/.formulary/cache"
//! formulae_dir = "~/formulae"
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::FormularyError;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "FORMULARY_CONFIG";

/// User-level configuration, deserialized from the global config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Target prefix for installs; binaries land in `<prefix>/bin`.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Root directory of the shared git clone cache.
    #[serde(default)]
    pub cache_dir: Option<String>,

    /// Directory holding `<name>.toml` formula files.
    #[serde(default)]
    pub formulae_dir: Option<String>,
}

impl GlobalConfig {
    /// Loads the global config from its default or overridden location.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Loads configuration from an explicit path; missing file → defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| FormularyError::ConfigError {
            message: format!("{}: {e}", path.display()),
        })?;
        Ok(config)
    }

    /// Resolved install prefix: configured value or `~/.formulary/prefix`.
    pub fn prefix(&self) -> Result<PathBuf> {
        match &self.prefix {
            Some(p) => Ok(expand(p)),
            None => Ok(home_dir()?.join(".formulary").join("prefix")),
        }
    }

    /// Resolved cache root: configured value or `~/.formulary/cache`.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(p) => Ok(expand(p)),
            None => Ok(home_dir()?.join(".formulary").join("cache")),
        }
    }

    /// Resolved formulae directory: configured value or `./formulae`.
    pub fn formulae_dir(&self) -> PathBuf {
        match &self.formulae_dir {
            Some(p) => expand(p),
            None => PathBuf::from("formulae"),
        }
    }
}

/// Location of the global config file, honoring [`CONFIG_ENV`].
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    Ok(home_dir()?.join(".formulary").join("config.toml"))
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        FormularyError::ConfigError {
            message: "cannot determine home directory".to_string(),
        }
        .into()
    })
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
