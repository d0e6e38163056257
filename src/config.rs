// ⚙️ Settings - JSON file with a default for every field
//
// Resolution order: explicit path → $BINSCOPE_CONFIG → built-in defaults.

use crate::batch::{RunMode, RunnerConfig, TickSchedule};
use crate::bin_table::{BinTable, PrefixBounds};
use crate::classifier::WeightedClassifier;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_ENV: &str = "BINSCOPE_CONFIG";

/// Coin-flip classifier used by the demo front ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub hit: String,
    pub miss: String,
    pub standard_probability: f64,
    pub enhanced_probability: f64,
}

impl ClassifierSettings {
    pub fn probability_for(&self, mode: RunMode) -> f64 {
        match mode {
            RunMode::Standard => self.standard_probability,
            RunMode::Enhanced => self.enhanced_probability,
        }
    }

    /// Low hit rate, same in both modes
    pub fn checker() -> Self {
        ClassifierSettings {
            standard_probability: 0.3,
            enhanced_probability: 0.3,
            ..ClassifierSettings::default()
        }
    }

    pub fn build(&self, mode: RunMode) -> WeightedClassifier {
        WeightedClassifier::new(self.probability_for(mode), self.hit.clone(), self.miss.clone())
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        ClassifierSettings {
            hit: "accepted".to_string(),
            miss: "rejected".to_string(),
            standard_probability: 0.85,
            enhanced_probability: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// CSV or JSON BIN table; the seeded demo table when absent
    pub bin_table: Option<PathBuf>,
    pub prefix_bounds: PrefixBounds,
    pub schedule: TickSchedule,
    pub classifier: ClassifierSettings,
    pub server_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bin_table: None,
            prefix_bounds: PrefixBounds::default(),
            schedule: TickSchedule::default(),
            classifier: ClassifierSettings::default(),
            server_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Settings {
    /// Defaults with the checker cadence: 1.5 s per item, 30% hits
    pub fn checker() -> Self {
        Settings {
            schedule: TickSchedule::fixed(1500),
            classifier: ClassifierSettings::checker(),
            ..Settings::default()
        }
    }

    /// Load settings from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let settings: Settings =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        settings.validate()?;
        Ok(settings)
    }

    /// `$BINSCOPE_CONFIG` if set, defaults otherwise
    pub fn load() -> Result<Self> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => {
                info!(path = ?path, "loading settings");
                Self::from_file(path)
            }
            None => Ok(Settings::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.prefix_bounds.validate()?;
        self.schedule.validate()?;

        for p in [
            self.classifier.standard_probability,
            self.classifier.enhanced_probability,
        ] {
            if !(0.0..=1.0).contains(&p) {
                bail!("classifier probability {} is outside 0.0..=1.0", p);
            }
        }
        if self.classifier.hit == self.classifier.miss {
            bail!("classifier hit and miss tags must differ");
        }
        Ok(())
    }

    /// Configured BIN table, or the seeded one under the configured bounds
    pub fn load_bin_table(&self) -> Result<BinTable> {
        match &self.bin_table {
            Some(path) => BinTable::from_file(path, self.prefix_bounds),
            None => BinTable::seeded_with_bounds(self.prefix_bounds),
        }
    }

    /// Runner config whose categories match the configured classifier
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::new(
            [self.classifier.hit.clone(), self.classifier.miss.clone()],
            self.schedule,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{lookup, LookupOutcome};

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("binscope-{}-{}", uuid::Uuid::new_v4(), name));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.prefix_bounds, PrefixBounds { min_len: 6, max_len: 8 });
        assert_eq!(settings.schedule.standard_ms, 1000);
        assert_eq!(settings.schedule.enhanced_ms, 2000);
        assert_eq!(settings.classifier.probability_for(RunMode::Enhanced), 0.95);
        assert_eq!(settings.load_bin_table().unwrap().len(), 6);
    }

    #[test]
    fn test_checker_preset() {
        let settings = Settings::checker();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.schedule, TickSchedule::fixed(1500));
        assert_eq!(settings.classifier.probability_for(RunMode::Standard), 0.3);
        assert_eq!(settings.classifier.probability_for(RunMode::Enhanced), 0.3);
        assert_eq!(settings.classifier.build(RunMode::Enhanced).probability(), 0.3);
    }

    #[test]
    fn test_default_table_uses_configured_bounds() {
        let settings = Settings {
            prefix_bounds: PrefixBounds::new(6, 10).unwrap(),
            ..Settings::default()
        };
        let table = settings.load_bin_table().unwrap();
        assert_eq!(table.bounds(), PrefixBounds { min_len: 6, max_len: 10 });

        match lookup(&table, "4000001234") {
            LookupOutcome::Found { record } => {
                assert_eq!(record.bin, "4000001234");
                assert_eq!(record.brand, "Visa");
            }
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_default_table_rejects_bounds_excluding_seeds() {
        let settings = Settings {
            prefix_bounds: PrefixBounds::new(7, 8).unwrap(),
            ..Settings::default()
        };
        let err = settings.load_bin_table().unwrap_err();
        assert!(format!("{:#}", err).contains("prefix bounds"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let path = write_temp("partial.json", r#"{ "schedule": { "standard_ms": 200, "enhanced_ms": 400 } }"#);
        let settings = Settings::from_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.schedule.interval_for(RunMode::Enhanced).as_millis(), 400);
        assert_eq!(settings.server_addr, "0.0.0.0:3000");
        assert_eq!(settings.classifier, ClassifierSettings::default());
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let path = write_temp("bounds.json", r#"{ "prefix_bounds": { "min_len": 8, "max_len": 6 } }"#);
        let err = Settings::from_file(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert!(err.to_string().contains("greater than max_len"));
    }

    #[test]
    fn test_invalid_probability_rejected() {
        let mut settings = Settings::default();
        settings.classifier.standard_probability = 1.2;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut settings = Settings::default();
        settings.schedule.enhanced_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_runner_config_matches_classifier() {
        let settings = Settings::default();
        let config = settings.runner_config();
        assert_eq!(config.categories, settings.classifier.build(RunMode::Standard).categories());
    }
}
