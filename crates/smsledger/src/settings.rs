//! Application settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use smsledger_core::{
    ClassifierConfig, CoordinatorConfig, DEFAULT_BACKFILL_MAX_COUNT, Error as CoreError,
};

/// Application settings that persist across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Classifier prediction endpoint.
    pub classifier_url: String,
    /// Upper bound for one classify call, in seconds.
    pub classifier_timeout_secs: u64,
    /// `SQLite` database file.
    pub database_path: PathBuf,
    /// Maximum number of inbox messages taken from the bulk listing.
    pub backfill_max_count: usize,
    /// Consecutive storage failures tolerated before ingestion stops.
    pub max_consecutive_store_failures: u32,
}

impl Default for Settings {
    fn default() -> Self {
        let classifier = ClassifierConfig::default();
        let coordinator = CoordinatorConfig::default();
        Self {
            classifier_url: classifier.endpoint,
            classifier_timeout_secs: classifier.timeout.as_secs(),
            database_path: data_dir().join("smsledger.db"),
            backfill_max_count: DEFAULT_BACKFILL_MAX_COUNT,
            max_consecutive_store_failures: coordinator.max_consecutive_store_failures,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults if the file does not exist.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }

    /// Save settings to `path`, creating its directory.
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents)
            .await
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        tracing::info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Classifier connection settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty endpoint or a zero timeout.
    pub fn classifier_config(&self) -> smsledger_core::Result<ClassifierConfig> {
        if self.classifier_url.trim().is_empty() {
            return Err(CoreError::Config("classifier_url is empty".into()));
        }
        if self.classifier_timeout_secs == 0 {
            return Err(CoreError::Config(
                "classifier_timeout_secs must be at least 1".into(),
            ));
        }

        Ok(ClassifierConfig {
            endpoint: self.classifier_url.clone(),
            timeout: Duration::from_secs(self.classifier_timeout_secs),
        })
    }

    /// Coordinator tuning.
    #[must_use]
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            max_consecutive_store_failures: self.max_consecutive_store_failures,
            ..CoordinatorConfig::default()
        }
    }
}

/// Default settings file location.
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("smsledger")
        .join("settings.json")
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("smsledger")
}
