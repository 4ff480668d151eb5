//! Configuration management

use crate::error::{Result, SweepError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Document store connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Secondary-index views the pipeline queries
    #[serde(default)]
    pub views: ViewNames,

    /// Directory for audit snapshots and log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Maximum documents selected per run
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            views: ViewNames::default(),
            log_dir: default_log_dir(),
            batch_size: default_batch_size(),
        }
    }
}

/// Document store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the store server
    pub url: String,

    /// Database name
    #[serde(default = "default_database")]
    pub database: String,

    /// Basic auth username
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DOCSWEEP_URL")
                .unwrap_or_else(|_| "http://localhost:5984".to_string()),
            database: default_database(),
            username: std::env::var("DOCSWEEP_USER").ok(),
            password: std::env::var("DOCSWEEP_PASSWORD").ok(),
            timeout_secs: default_timeout(),
        }
    }
}

/// View names in `design_doc/view` form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewNames {
    /// Keyed by `[placeId]`, one row per ancestor of each contact
    #[serde(default = "default_contacts_by_place")]
    pub contacts_by_place: String,

    /// Keyed by `[branchId]`, queried as a lexical prefix range
    #[serde(default = "default_records_by_branch")]
    pub records_by_branch: String,

    /// Keyed by `[contactId]`
    #[serde(default = "default_facilities_by_contact")]
    pub facilities_by_contact: String,
}

impl Default for ViewNames {
    fn default() -> Self {
        Self {
            contacts_by_place: default_contacts_by_place(),
            records_by_branch: default_records_by_branch(),
            facilities_by_contact: default_facilities_by_contact(),
        }
    }
}

fn default_database() -> String {
    std::env::var("DOCSWEEP_DB").unwrap_or_else(|_| "medic".to_string())
}

fn default_timeout() -> u64 {
    30
}

fn default_batch_size() -> usize {
    100
}

fn default_log_dir() -> PathBuf {
    std::env::var("DOCSWEEP_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(crate::DATA_DIR_NAME)
                .join("logs")
        })
}

fn default_contacts_by_place() -> String {
    "docsweep/contacts_by_place".to_string()
}

fn default_records_by_branch() -> String {
    "docsweep/records_by_branch".to_string()
}

fn default_facilities_by_contact() -> String {
    "docsweep/facilities_by_contact".to_string()
}

impl Config {
    /// Load config from default path
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load config from an explicit path; the file must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SweepError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SweepError::Config("batch_size must be positive".into()));
        }
        if self.store.database.is_empty() {
            return Err(SweepError::Config("store.database must not be empty".into()));
        }
        for view in [
            &self.views.contacts_by_place,
            &self.views.records_by_branch,
            &self.views.facilities_by_contact,
        ] {
            split_view_name(view)?;
        }
        Ok(())
    }
}

/// Split `ddoc/view` into its design document and view parts
pub fn split_view_name(name: &str) -> Result<(&str, &str)> {
    match name.split_once('/') {
        Some((ddoc, view)) if !ddoc.is_empty() && !view.is_empty() && !view.contains('/') => {
            Ok((ddoc, view))
        }
        _ => Err(SweepError::Config(format!(
            "view name must look like `design/view`, got `{}`",
            name
        ))),
    }
}
