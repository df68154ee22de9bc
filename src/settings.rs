use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cogex_experiment::ExperimentConfig;
use cogex_sink::{DEFAULT_FALLBACK_PATH, DEFAULT_PRIMARY_TIMEOUT};
use serde::{Deserialize, Serialize};

/// Station settings, read from an optional JSON file. Missing keys keep
/// their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub experiment: ExperimentConfig,
    pub sinks: SinkSettings,
    /// Where the participant's copy of the results is written at the end.
    pub export_dir: PathBuf,
    pub log_path: PathBuf,
    pub calibration_samples: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            experiment: ExperimentConfig::default(),
            sinks: SinkSettings::default(),
            export_dir: PathBuf::from("data/exports"),
            log_path: PathBuf::from("data/number-recognition.log"),
            calibration_samples: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    pub fallback_path: PathBuf,
    /// Spreadsheet destination; records go to the fallback only when unset.
    pub primary: Option<PrimarySettings>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            fallback_path: PathBuf::from(DEFAULT_FALLBACK_PATH),
            primary: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimarySettings {
    pub workbook_dir: PathBuf,
    pub destination: String,
    pub timeout_ms: u64,
}

impl Default for PrimarySettings {
    fn default() -> Self {
        Self {
            workbook_dir: PathBuf::from("data/workbook"),
            destination: "Number Recognition Results".to_string(),
            timeout_ms: DEFAULT_PRIMARY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl PrimarySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("read settings {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse settings {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use cogex_experiment::SequencePolicy;

    use super::*;

    #[test]
    fn missing_file_argument_uses_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.experiment.trial_limit, 30);
        assert!(settings.sinks.primary.is_none());
        assert_eq!(settings.sinks.fallback_path, PathBuf::from("data/results.csv"));
    }

    #[test]
    fn partial_file_overrides_selected_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.json");
        fs::write(
            &path,
            r#"{
                "experiment": { "sequence_policy": "no-repeat" },
                "sinks": { "primary": { "workbook_dir": "/srv/sheets", "timeout_ms": 500 } }
            }"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.experiment.sequence_policy, SequencePolicy::NoRepeat);
        let primary = settings.sinks.primary.unwrap();
        assert_eq!(primary.workbook_dir, PathBuf::from("/srv/sheets"));
        assert_eq!(primary.destination, "Number Recognition Results");
        assert_eq!(primary.timeout(), Duration::from_millis(500));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Settings::load(Some(&path)).is_err());
    }
}
