use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::evaluator::DEFAULT_TIMEOUT;
use crate::oracle::RATES_MAX_AGE;
use crate::rates::DEFAULT_REFRESH_INTERVAL;
use crate::undo::DEFAULT_CAPACITY;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stored settings, `~/.tally/config.json`. Missing fields take defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub eval_timeout_ms: u64,
    pub history_capacity: usize,
    pub rates_refresh_secs: u64,
    pub rates_enabled: bool,
    /// Downloaded rates younger than this many days are left alone.
    pub rates_max_age_days: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qalc_path: Option<PathBuf>,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            eval_timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            history_capacity: DEFAULT_CAPACITY,
            rates_refresh_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
            rates_enabled: true,
            rates_max_age_days: RATES_MAX_AGE.as_secs() / DAY.as_secs(),
            qalc_path: None,
        }
    }
}

impl TallyConfig {
    /// `~/.tally`, also home of the log file.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tally")
    }

    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from ~/.tally/config.json. A missing file is created with the
    /// defaults.
    pub fn load_or_create() -> Result<Self, ConfigError> {
        Self::load_or_create_at(&Self::path())
    }

    pub fn load_or_create_at(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load_from(path);
        }
        let config = Self::default();
        config.save_to(path)?;
        tracing::info!(path = %path.display(), "wrote default config");
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn eval_timeout(&self) -> Duration {
        Duration::from_millis(self.eval_timeout_ms.max(1))
    }

    pub fn rates_interval(&self) -> Duration {
        Duration::from_secs(self.rates_refresh_secs.max(1))
    }

    pub fn rates_max_age(&self) -> Duration {
        DAY * self.rates_max_age_days.min(u32::MAX as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TallyConfig::default();
        assert_eq!(config.eval_timeout(), Duration::from_secs(5));
        assert_eq!(config.history_capacity, 50);
        assert!(config.rates_enabled);
        assert_eq!(config.rates_max_age(), RATES_MAX_AGE);
        assert!(config.qalc_path.is_none());
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".tally").join("config.json");
        let config = TallyConfig::load_or_create_at(&path).unwrap();
        assert_eq!(config, TallyConfig::default());
        assert!(path.exists());
        assert_eq!(TallyConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn existing_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "rates_max_age_days": 1 }"#).unwrap();
        let config = TallyConfig::load_or_create_at(&path).unwrap();
        assert_eq!(config.rates_max_age(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{ "rates_max_age_days": 1 }"#
        );
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TallyConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, TallyConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = TallyConfig {
            eval_timeout_ms: 750,
            history_capacity: 10,
            rates_refresh_secs: 120,
            rates_enabled: false,
            rates_max_age_days: 3,
            qalc_path: Some("/opt/qalc/bin/qalc".into()),
        };
        config.save_to(&path).unwrap();
        assert_eq!(TallyConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "history_capacity": 5 }"#).unwrap();
        let config = TallyConfig::load_from(&path).unwrap();
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.eval_timeout_ms, 5000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            TallyConfig::load_from(&path),
            Err(ConfigError::Json(_))
        ));
    }
}
