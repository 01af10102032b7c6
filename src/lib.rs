//! Weekly recruiter KPI pipeline: reads the team's activity export, cleans it into
//! typed records, derives per-recruiter metrics and team averages against targets.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod source;

pub use config::Config;
pub use error::{KpiError, Result};
pub use models::{
    Aggregate, Dashboard, Metric, RecruiterMetrics, RecruiterWeekRecord, TargetSet, Window,
};
