use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::metrics;
use crate::models::{Dashboard, RecruiterMetrics, RecruiterWeekRecord, Window};
use crate::normalize;
use crate::source;

/// Reads and cleans the export at `path`. Has no side effects beyond reading
/// the file, so reruns on every interaction are harmless.
pub fn load(path: &Path, config: &Config) -> Result<Vec<RecruiterWeekRecord>> {
    let raw = source::read_sheet(path, &config.sheet, config.header_row)?;
    normalize::normalize(&raw, config)
}

/// Loads the export and derives per-row metrics.
pub fn load_metrics(path: &Path, config: &Config) -> Result<Vec<RecruiterMetrics>> {
    let records = load(path, config)?;
    Ok(metrics::derive(records))
}

/// Full pass: load, derive and aggregate for one window.
pub fn run(path: &Path, config: &Config, window: Window) -> Result<Dashboard> {
    let rows = load_metrics(path, config)?;
    let dashboard = metrics::build_dashboard(&rows, window, &config.targets);
    info!(
        window = %dashboard.window,
        records = dashboard.records.len(),
        weeks = dashboard.weeks_included,
        "built dashboard"
    );
    Ok(dashboard)
}
