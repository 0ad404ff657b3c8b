//! Configuration loader using figment.
//!
//! Sources are merged lowest to highest priority:
//!
//! 1. Built-in defaults
//! 2. `banter.toml` from the search paths (current directory, then the
//!    user's config directory), or a file named explicitly
//! 3. Environment variables (`BANTER_` prefix, `__` as section separator:
//!    `BANTER_LOGGING__LEVEL=debug` → `logging.level = "debug"`)
//! 4. Programmatic overrides via [`ConfigLoader::merge`]
//!
//! # Example
//!
//! ```rust,ignore
//! use banter_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new().load()?;
//! let config = ConfigLoader::new().file("config/banter.toml").load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::BanterConfig;

const CONFIG_FILE_NAMES: [&str; 2] = ["banter.toml", "config.toml"];

/// Multi-source configuration loader.
pub struct ConfigLoader {
    figment: Figment,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader with default sources.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file, skipping the search.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables environment-variable loading.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration programmatically, overriding file values.
    pub fn merge(mut self, config: BanterConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and extracts the configuration.
    pub fn load(self) -> ConfigResult<BanterConfig> {
        let figment = self.build_figment()?;
        let config: BanterConfig = figment
            .extract()
            .map_err(|e| ConfigError::Extract(e.to_string()))?;
        debug!(
            account = %config.bot.account_name,
            rooms = config.rooms.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(BanterConfig::default()));

        let overrides = std::mem::take(&mut self.figment);

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(path));
        } else {
            figment = self.search_config_files(figment);
        }

        if self.load_env {
            figment = figment.merge(
                Env::prefixed("BANTER_")
                    .split("__")
                    .map(|key| key.as_str().replace("__", ".").into()),
            );
        }

        Ok(figment.merge(overrides))
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("banter"));
        }
        paths
    }

    fn search_config_files(&self, mut figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            for name in CONFIG_FILE_NAMES {
                let path = search_path.join(name);
                if path.exists() {
                    info!(path = %path.display(), "Loading configuration file");
                    return figment.merge(Toml::file(path));
                }
            }
        }
        warn!("No configuration file found, using defaults");
        figment
    }
}
