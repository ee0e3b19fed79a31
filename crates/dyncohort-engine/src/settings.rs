//! Engine settings
//!
//! Values come from defaults, then an optional TOML file, then environment
//! variables (after loading `.env` through `dotenvy`). Later sources win.

use std::path::{Path, PathBuf};

use dyncohort_core::errors::{ExError, ExErrorKind};
use dyncohort_store::errors::io_error;
use dyncohort_store::Result;
use serde::{Deserialize, Serialize};

pub const ENV_REALTIME: &str = "DYNCOHORT_REALTIME";
pub const ENV_RELEASE_MEMBERS: &str = "DYNCOHORT_RELEASE_MEMBERS";
pub const ENV_MATCHING_CACHE_TTL: &str = "DYNCOHORT_MATCHING_CACHE_TTL";
pub const ENV_DB: &str = "DYNCOHORT_DB";

/// Settings file looked up in the working directory when none is given
pub const DEFAULT_SETTINGS_FILE: &str = "dyncohort.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Global switch for event-driven re-evaluation
    pub realtime: bool,

    /// Empty a cohort when no rule manages it any more
    pub release_members: bool,

    /// Lifetime of cached matching-user counts, 0 disables the cache
    pub matching_cache_ttl_secs: u64,

    pub database_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            realtime: true,
            release_members: false,
            matching_cache_ttl_secs: 60,
            database_path: PathBuf::from(".dyncohort/store.db"),
        }
    }
}

impl Settings {
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the document is not valid settings TOML
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| {
            ExError::new(ExErrorKind::InvalidConfig)
                .with_op("load_settings")
                .with_message(format!("Invalid settings file: {}", e))
        })
    }

    /// Resolve settings from an optional file plus the process environment
    ///
    /// An explicit `path` must exist. Without one, `dyncohort.toml` in the
    /// working directory is read when present.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a missing explicit file, malformed TOML or
    /// an unparseable environment override, and `Io` if the file cannot be read
    pub fn load(path: Option<&Path>) -> Result<Self> {
        load_dotenv();
        let mut settings = match path {
            Some(path) if !path.exists() => {
                return Err(ExError::new(ExErrorKind::InvalidConfig)
                    .with_op("load_settings")
                    .with_message(format!("Settings file not found: {}", path.display())));
            }
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_SETTINGS_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        tracing::debug!(?settings, "settings resolved");
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| io_error("read_settings", e))?;
        Self::from_toml_str(&raw)
    }

    /// Apply `DYNCOHORT_*` overrides supplied by `lookup`
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the variable whose value cannot be parsed
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_REALTIME) {
            self.realtime = parse_bool(ENV_REALTIME, &value)?;
        }
        if let Some(value) = lookup(ENV_RELEASE_MEMBERS) {
            self.release_members = parse_bool(ENV_RELEASE_MEMBERS, &value)?;
        }
        if let Some(value) = lookup(ENV_MATCHING_CACHE_TTL) {
            self.matching_cache_ttl_secs = value
                .trim()
                .parse()
                .map_err(|_| invalid_env(ENV_MATCHING_CACHE_TTL, &value))?;
        }
        if let Some(value) = lookup(ENV_DB) {
            if !value.trim().is_empty() {
                self.database_path = PathBuf::from(value.trim());
            }
        }
        Ok(())
    }
}

/// Load `.env` from the working directory if there is one
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid_env(key, value)),
    }
}

fn invalid_env(key: &str, value: &str) -> ExError {
    ExError::new(ExErrorKind::InvalidConfig)
        .with_op("load_settings")
        .with_message(format!("Invalid value for {}: '{}'", key, value))
}
