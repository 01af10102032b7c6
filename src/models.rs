use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One cleaned row of the weekly export: a recruiter's activity over one period.
#[derive(Debug, Clone, PartialEq)]
pub struct RecruiterWeekRecord {
    pub name: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    /// ISO week of `period_start`, 0 when the start date is unknown.
    pub week: u32,
    pub cold_calls: u32,
    pub inmails: u32,
    pub qualification_calls: u32,
    pub introductions: u32,
    /// Fraction in [0, 1].
    pub response_rate: f64,
}

/// A record together with the metrics derived from it.
///
/// Kept flat so the cleaned table serializes straight to CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecruiterMetrics {
    pub name: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub week: u32,
    pub cold_calls: u32,
    pub inmails: u32,
    pub qualification_calls: u32,
    pub introductions: u32,
    pub response_rate: f64,
    /// Days between period start and end. This is an active-engagement span,
    /// not a time-to-hire latency.
    pub engagement_days: Option<i64>,
    pub responses: u64,
    /// Introductions per first contact, in percent.
    pub introduction_ratio: f64,
    /// 1 when introductions exceed the conversion threshold.
    pub conversion: u8,
}

/// Totals for one recruiter across the rows of a window.
#[derive(Debug, Clone, PartialEq)]
pub struct RecruiterSummary {
    pub name: String,
    pub weeks: usize,
    pub inmails: u64,
    pub cold_calls: u64,
    pub qualification_calls: u64,
    pub introductions: u64,
    pub avg_response_rate: f64,
    pub conversions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Weekly volume; targets scale with the number of weeks in a window.
    Count,
    /// Already a ratio; targets never scale.
    Rate,
    /// Day span, averaged over records that have one.
    Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Inmails,
    ColdCalls,
    Qualification,
    Introductions,
    Responses,
    ResponseRate,
    IntroductionRatio,
    Conversion,
    EngagementDays,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::Inmails,
        Metric::ColdCalls,
        Metric::Qualification,
        Metric::Introductions,
        Metric::Responses,
        Metric::ResponseRate,
        Metric::IntroductionRatio,
        Metric::Conversion,
        Metric::EngagementDays,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::Inmails => "inmails",
            Metric::ColdCalls => "cold_calls",
            Metric::Qualification => "qualification",
            Metric::Introductions => "introductions",
            Metric::Responses => "responses",
            Metric::ResponseRate => "response_rate",
            Metric::IntroductionRatio => "introduction_ratio",
            Metric::Conversion => "conversion",
            Metric::EngagementDays => "engagement_days",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Inmails => "InMails",
            Metric::ColdCalls => "Cold calls",
            Metric::Qualification => "Qualification calls",
            Metric::Introductions => "Introductions",
            Metric::Responses => "Responses",
            Metric::ResponseRate => "Response rate",
            Metric::IntroductionRatio => "Introductions to first contact (%)",
            Metric::Conversion => "Conversion",
            Metric::EngagementDays => "Engagement span (days)",
        }
    }

    pub fn kind(self) -> MetricKind {
        match self {
            Metric::Inmails
            | Metric::ColdCalls
            | Metric::Qualification
            | Metric::Introductions
            | Metric::Responses => MetricKind::Count,
            Metric::ResponseRate | Metric::IntroductionRatio | Metric::Conversion => {
                MetricKind::Rate
            }
            Metric::EngagementDays => MetricKind::Span,
        }
    }

    pub fn value(self, row: &RecruiterMetrics) -> Option<f64> {
        match self {
            Metric::Inmails => Some(row.inmails as f64),
            Metric::ColdCalls => Some(row.cold_calls as f64),
            Metric::Qualification => Some(row.qualification_calls as f64),
            Metric::Introductions => Some(row.introductions as f64),
            Metric::Responses => Some(row.responses as f64),
            Metric::ResponseRate => Some(row.response_rate),
            Metric::IntroductionRatio => Some(row.introduction_ratio),
            Metric::Conversion => Some(row.conversion as f64),
            Metric::EngagementDays => row.engagement_days.map(|days| days as f64),
        }
    }

    /// Formats a value of this metric for display.
    pub fn format(self, value: f64) -> String {
        match self {
            Metric::ResponseRate | Metric::Conversion => format!("{:.2}%", value * 100.0),
            Metric::IntroductionRatio => format!("{value:.2}%"),
            _ => format!("{value:.2}"),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Metric::ALL
            .into_iter()
            .find(|metric| metric.key() == wanted)
            .ok_or_else(|| format!("unknown metric '{s}'"))
    }
}

/// Goal per metric, used only for display comparison.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>")]
pub struct TargetSet {
    #[serde(flatten)]
    goals: BTreeMap<Metric, f64>,
}

impl TargetSet {
    pub fn new(goals: impl IntoIterator<Item = (Metric, f64)>) -> Self {
        Self {
            goals: goals.into_iter().collect(),
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.goals.get(&metric).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.goals.iter().map(|(metric, goal)| (*metric, *goal))
    }

    /// Targets for a window spanning `weeks` weekly periods. Count targets scale
    /// linearly; rate and span targets are returned unchanged.
    pub fn scaled(&self, weeks: usize) -> TargetSet {
        let factor = weeks.max(1) as f64;
        TargetSet::new(self.iter().map(|(metric, goal)| match metric.kind() {
            MetricKind::Count => (metric, goal * factor),
            MetricKind::Rate | MetricKind::Span => (metric, goal),
        }))
    }
}

impl TryFrom<BTreeMap<String, f64>> for TargetSet {
    type Error = String;

    fn try_from(raw: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        let mut goals = BTreeMap::new();
        for (key, goal) in raw {
            let metric: Metric = key.parse()?;
            if !goal.is_finite() || goal < 0.0 {
                return Err(format!("target for '{key}' must be a non-negative number"));
            }
            goals.insert(metric, goal);
        }
        Ok(Self { goals })
    }
}

/// Team-level mean of one metric. An empty selection is `NoData`, never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Aggregate {
    Mean(f64),
    NoData,
}

impl Aggregate {
    pub fn mean(values: impl IntoIterator<Item = f64>) -> Self {
        let (sum, count) = values
            .into_iter()
            .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
        if count == 0 {
            Aggregate::NoData
        } else {
            Aggregate::Mean(sum / count as f64)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Aggregate::Mean(value) => Some(value),
            Aggregate::NoData => None,
        }
    }
}

/// Which periods an aggregation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    #[default]
    All,
    /// A single ISO week number. Week 0 selects the rows whose start date is
    /// unknown, since those carry week 0.
    Week(u32),
    /// The most recent `n` weekly periods present in the data.
    Trailing(usize),
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::All => f.write_str("All weeks"),
            Window::Week(week) => write!(f, "Week {week}"),
            Window::Trailing(1) => f.write_str("Last week"),
            Window::Trailing(n) => write!(f, "Last {n} weeks"),
        }
    }
}

/// Progress of a team average towards its target, shaped for a donut chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub metric: Metric,
    pub average: Aggregate,
    pub target: f64,
    pub achieved: f64,
    pub remaining: f64,
    /// Percentage of the target reached, capped at 100. `None` without data.
    pub achieved_pct: Option<f64>,
}

/// Everything the rendering side needs for one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub window: String,
    pub weeks_included: usize,
    pub records: Vec<RecruiterMetrics>,
    pub averages: BTreeMap<Metric, Aggregate>,
    pub targets: TargetSet,
    pub progress: Vec<Progress>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mean_is_no_data() {
        assert_eq!(Aggregate::mean(Vec::new()), Aggregate::NoData);
        assert_eq!(Aggregate::mean([2.0, 4.0]), Aggregate::Mean(3.0));
    }

    #[test]
    fn metric_keys_parse_back() {
        for metric in Metric::ALL {
            assert_eq!(metric.key().parse::<Metric>(), Ok(metric));
        }
        assert!("Cold_Calls".parse::<Metric>().is_ok());
        assert!("bogus".parse::<Metric>().is_err());
    }

    #[test]
    fn four_week_window_scales_counts_not_rates() {
        let targets = TargetSet::new([
            (Metric::Inmails, 150.0),
            (Metric::ColdCalls, 20.0),
            (Metric::ResponseRate, 0.25),
            (Metric::Qualification, 15.0),
        ]);
        let scaled = targets.scaled(4);
        assert_eq!(scaled.get(Metric::Inmails), Some(600.0));
        assert_eq!(scaled.get(Metric::ColdCalls), Some(80.0));
        assert_eq!(scaled.get(Metric::Qualification), Some(60.0));
        assert_eq!(scaled.get(Metric::ResponseRate), Some(0.25));
    }

    #[test]
    fn targets_reject_unknown_keys() {
        let raw = BTreeMap::from([("inmails".to_string(), 150.0), ("calls".to_string(), 3.0)]);
        assert!(TargetSet::try_from(raw).is_err());
    }

    #[test]
    fn window_labels() {
        assert_eq!(Window::All.to_string(), "All weeks");
        assert_eq!(Window::Week(12).to_string(), "Week 12");
        assert_eq!(Window::Trailing(4).to_string(), "Last 4 weeks");
    }
}
