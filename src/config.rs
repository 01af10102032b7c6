use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{KpiError, Result};
use crate::models::{Metric, TargetSet};

const DEFAULT_CONFIG_FILE: &str = "kpi.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worksheet to read from workbook inputs. Ignored for CSV.
    pub sheet: String,
    /// 0-based row index of the header row.
    pub header_row: usize,
    /// Name of the aggregate row to drop, matched case-insensitively.
    pub sentinel_label: String,
    /// 0-based indices of data rows (below the header) to drop.
    pub deny_rows: Vec<usize>,
    /// Cell text meaning "no activity this period"; read as 0.
    pub no_activity_marker: String,
    /// chrono format for textual period dates.
    pub date_format: String,
    pub columns: ColumnNames,
    pub targets: TargetSet,
}

/// Header text of each required column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub name: String,
    pub period_start: String,
    pub period_end: String,
    pub cold_calls: String,
    pub qualification: String,
    pub introductions: String,
    pub inmails: String,
    pub response_rate: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheet: "Blad1".to_string(),
            header_row: 1,
            sentinel_label: "Eindtotaal".to_string(),
            deny_rows: vec![37, 38, 39, 40],
            no_activity_marker: "holiday".to_string(),
            date_format: "%d/%m/%Y".to_string(),
            columns: ColumnNames::default(),
            targets: default_targets(),
        }
    }
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            name: "Name".to_string(),
            period_start: "Begin datum".to_string(),
            period_end: "Eind datum".to_string(),
            cold_calls: "Cold call".to_string(),
            qualification: "Qualification".to_string(),
            introductions: "Introductions".to_string(),
            inmails: "InMails".to_string(),
            response_rate: "Response rate".to_string(),
        }
    }
}

pub fn default_targets() -> TargetSet {
    TargetSet::new([
        (Metric::Inmails, 150.0),
        (Metric::ColdCalls, 20.0),
        (Metric::ResponseRate, 0.25),
        (Metric::Qualification, 15.0),
    ])
}

impl Config {
    /// Loads configuration from `path`, or from `kpi.toml` in the working directory
    /// when no path is given and that file exists, or falls back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    debug!("no {DEFAULT_CONFIG_FILE} found, using built-in defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            KpiError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sentinel_label.trim().is_empty() {
            return Err(KpiError::Config("sentinel_label must not be empty".into()));
        }
        if self.date_format.trim().is_empty() {
            return Err(KpiError::Config("date_format must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            header_row = 2
            deny_rows = []

            [columns]
            cold_calls = "Cold call "
            "#,
        )
        .unwrap();

        assert_eq!(config.header_row, 2);
        assert!(config.deny_rows.is_empty());
        assert_eq!(config.columns.cold_calls, "Cold call ");
        assert_eq!(config.columns.name, "Name");
        assert_eq!(config.sentinel_label, "Eindtotaal");
        assert_eq!(config.targets.get(Metric::Inmails), Some(150.0));
    }

    #[test]
    fn targets_replace_the_default_map() {
        let config = Config::from_toml(
            r#"
            [targets]
            inmails = 200
            response_rate = 0.3
            "#,
        )
        .unwrap();

        assert_eq!(config.targets.get(Metric::Inmails), Some(200.0));
        assert_eq!(config.targets.get(Metric::ResponseRate), Some(0.3));
        assert_eq!(config.targets.get(Metric::ColdCalls), None);
    }

    #[test]
    fn unknown_target_is_rejected() {
        let result = Config::from_toml("[targets]\nmeetings = 4\n");
        assert!(matches!(result, Err(KpiError::Toml(_))));
    }

    #[test]
    fn missing_explicit_file_is_a_config_error() {
        let result = Config::load(Some(Path::new("/nonexistent/kpi.toml")));
        assert!(matches!(result, Err(KpiError::Config(_))));
    }
}
