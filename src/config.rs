//! Configuration loading and management.

use crate::estimate::{EstimationMode, EstimatorConfig, RegressionStrategy};
use crate::format::OutputFormat;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "task-estimator.yaml";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub estimator: EstimatorConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// `~/.task-estimator`, or a relative `.task-estimator` without a home dir.
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".task-estimator"))
        .unwrap_or_else(|| PathBuf::from(".task-estimator"))
}

fn default_db_path() -> PathBuf {
    config_dir().join("estimator.db")
}

/// Output configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Otherwise `./task-estimator.yaml`, then
    /// `~/.task-estimator/config.yaml`, then defaults. Environment overrides
    /// are applied last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let home = config_dir().join("config.yaml");
                [PathBuf::from(LOCAL_CONFIG_FILE), home]
                    .into_iter()
                    .find(|p| p.is_file())
                    .map(Self::load)
                    .transpose()?
                    .unwrap_or_default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `TASK_ESTIMATOR_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = lookup("TASK_ESTIMATOR_DB_PATH") {
            self.store.db_path = PathBuf::from(db_path);
        }

        if let Some(value) = lookup("TASK_ESTIMATOR_REGRESSION") {
            self.estimator.regression = match RegressionStrategy::from_str(&value) {
                Some(strategy) => strategy,
                None => bail!("TASK_ESTIMATOR_REGRESSION: unknown strategy '{}'", value),
            };
        }

        if let Some(value) = lookup("TASK_ESTIMATOR_MODE") {
            self.estimator.mode = match EstimationMode::from_str(&value) {
                Some(mode) => mode,
                None => bail!("TASK_ESTIMATOR_MODE: unknown mode '{}'", value),
            };
        }

        if let Some(value) = lookup("TASK_ESTIMATOR_FORMAT") {
            self.output.format = match OutputFormat::from_str(&value) {
                Some(format) => format,
                None => bail!("TASK_ESTIMATOR_FORMAT: unknown format '{}'", value),
            };
        }

        if let Some(value) = lookup("TASK_ESTIMATOR_MAX_ITERATIONS") {
            self.estimator.max_iterations = value
                .parse()
                .with_context(|| format!("TASK_ESTIMATOR_MAX_ITERATIONS: '{}'", value))?;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.estimator.max_iterations == 0 {
            bail!("estimator.max_iterations must be at least 1");
        }
        if self.store.db_path.as_os_str().is_empty() {
            bail!("store.db_path must not be empty");
        }
        Ok(())
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.store.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.estimator, EstimatorConfig::default());
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.store.db_path.ends_with("estimator.db"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = write_config(
            "estimator:\n  regression: multiple\n  divide_by_cluster_count: true\noutput:\n  format: markdown\n",
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.estimator.regression, RegressionStrategy::Multiple);
        assert!(config.estimator.divide_by_cluster_count);
        assert_eq!(config.estimator.mode, EstimationMode::Ensemble);
        assert_eq!(config.estimator.max_iterations, 100);
        assert_eq!(config.output.format, OutputFormat::Markdown);
    }

    #[test]
    fn zero_iterations_rejected() {
        let file = write_config("estimator:\n  max_iterations: 0\n");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn unknown_mode_rejected() {
        let file = write_config("estimator:\n  mode: psychic\n");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::resolve(Some(dir.path().join("absent.yaml").as_path())).is_err());
    }

    #[test]
    fn overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("TASK_ESTIMATOR_DB_PATH", "/tmp/x.db"),
            ("TASK_ESTIMATOR_REGRESSION", "multiple"),
            ("TASK_ESTIMATOR_MODE", "naive"),
            ("TASK_ESTIMATOR_MAX_ITERATIONS", "7"),
            ("TASK_ESTIMATOR_FORMAT", "md"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.estimator.regression, RegressionStrategy::Multiple);
        assert_eq!(config.estimator.mode, EstimationMode::Naive);
        assert_eq!(config.estimator.max_iterations, 7);
        assert_eq!(config.output.format, OutputFormat::Markdown);
    }

    #[test]
    fn bad_override_rejected() {
        let mut config = Config::default();
        assert!(
            config
                .apply_overrides(|k| (k == "TASK_ESTIMATOR_MAX_ITERATIONS").then(|| "lots".to_string()))
                .is_err()
        );
        assert!(
            config
                .apply_overrides(|k| (k == "TASK_ESTIMATOR_MAX_ITERATIONS").then(|| "0".to_string()))
                .is_err()
        );
        assert!(
            config
                .apply_overrides(|k| (k == "TASK_ESTIMATOR_FORMAT").then(|| "xml".to_string()))
                .is_err()
        );
    }
}
