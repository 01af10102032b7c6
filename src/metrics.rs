use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use tracing::{debug, warn};

use crate::models::{
    Aggregate, Dashboard, Metric, MetricKind, Progress, RecruiterMetrics, RecruiterWeekRecord,
    TargetSet, Window,
};

/// Introductions above this count mark a week as converted.
pub const CONVERSION_THRESHOLD: u32 = 3;

/// A weekly reporting period, keyed by the ISO year and week of its start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    pub week: u32,
}

/// The period a row belongs to; `None` when its start date is unknown.
pub fn period_of(row: &RecruiterMetrics) -> Option<Period> {
    row.period_start.map(|date| {
        let iso = date.iso_week();
        Period {
            year: iso.year(),
            week: iso.week(),
        }
    })
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// Responses = first contacts x response rate, rounded half to even
/// (2.5 -> 2, 3.5 -> 4).
pub fn response_count(first_contacts: u64, response_rate: f64) -> u64 {
    (first_contacts as f64 * response_rate).round_ties_even() as u64
}

/// Introductions per first contact in percent, two decimals; 0 without contacts.
pub fn introduction_ratio(introductions: u32, first_contacts: u64) -> f64 {
    if first_contacts == 0 {
        return 0.0;
    }
    let ratio = introductions as f64 / first_contacts as f64 * 100.0;
    (ratio * 100.0).round() / 100.0
}

pub fn conversion_flag(introductions: u32) -> u8 {
    u8::from(introductions > CONVERSION_THRESHOLD)
}

/// Derives the per-row metrics. The engagement span is end minus start in days and
/// is negative when the source lists the end date before the start date.
pub fn derive_record(record: RecruiterWeekRecord) -> RecruiterMetrics {
    let first_contacts = u64::from(record.inmails) + u64::from(record.cold_calls);
    let engagement_days = match (record.period_start, record.period_end) {
        (Some(start), Some(end)) => {
            let days = (end - start).num_days();
            if days < 0 {
                warn!(name = %record.name, %start, %end, "period ends before it starts");
            }
            Some(days)
        }
        _ => None,
    };

    RecruiterMetrics {
        engagement_days,
        responses: response_count(first_contacts, record.response_rate),
        introduction_ratio: introduction_ratio(record.introductions, first_contacts),
        conversion: conversion_flag(record.introductions),
        name: record.name,
        period_start: record.period_start,
        period_end: record.period_end,
        week: record.week,
        cold_calls: record.cold_calls,
        inmails: record.inmails,
        qualification_calls: record.qualification_calls,
        introductions: record.introductions,
        response_rate: record.response_rate,
    }
}

pub fn derive(records: Vec<RecruiterWeekRecord>) -> Vec<RecruiterMetrics> {
    records.into_iter().map(derive_record).collect()
}

/// Distinct periods present in the data, oldest first.
pub fn available_periods(rows: &[RecruiterMetrics]) -> Vec<Period> {
    rows.iter()
        .filter_map(period_of)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The rows a window covers and how its aggregates and targets behave.
#[derive(Debug, Clone)]
pub struct WindowSelection<'a> {
    pub rows: Vec<&'a RecruiterMetrics>,
    pub periods: usize,
    /// Factor applied to count targets.
    pub target_scale: usize,
    /// Sum count metrics per recruiter before averaging across the team.
    pub per_recruiter: bool,
}

pub fn select_window(rows: &[RecruiterMetrics], window: Window) -> WindowSelection<'_> {
    match window {
        Window::All => WindowSelection {
            periods: available_periods(rows).len(),
            rows: rows.iter().collect(),
            target_scale: 1,
            per_recruiter: false,
        },
        Window::Week(week) => {
            let selected: Vec<&RecruiterMetrics> =
                rows.iter().filter(|row| row.week == week).collect();
            let periods = selected
                .iter()
                .filter_map(|row| period_of(row))
                .collect::<BTreeSet<_>>()
                .len();
            WindowSelection {
                rows: selected,
                periods,
                target_scale: 1,
                per_recruiter: false,
            }
        }
        Window::Trailing(count) => {
            let all = available_periods(rows);
            let keep: BTreeSet<Period> = all.iter().rev().take(count).copied().collect();
            let selected: Vec<&RecruiterMetrics> = rows
                .iter()
                .filter(|row| period_of(row).is_some_and(|p| keep.contains(&p)))
                .collect();
            debug!(
                requested = count,
                included = keep.len(),
                rows = selected.len(),
                "selected trailing window"
            );
            WindowSelection {
                rows: selected,
                periods: keep.len(),
                target_scale: keep.len(),
                per_recruiter: true,
            }
        }
    }
}

/// Team mean of one metric over a window. Empty selections give `NoData`.
pub fn team_average(selection: &WindowSelection<'_>, metric: Metric) -> Aggregate {
    if selection.per_recruiter && metric.kind() == MetricKind::Count {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for row in &selection.rows {
            if let Some(value) = metric.value(row) {
                *totals.entry(row.name.as_str()).or_insert(0.0) += value;
            }
        }
        return Aggregate::mean(totals.into_values());
    }
    Aggregate::mean(selection.rows.iter().filter_map(|row| metric.value(row)))
}

pub fn team_averages(selection: &WindowSelection<'_>) -> BTreeMap<Metric, Aggregate> {
    Metric::ALL
        .into_iter()
        .map(|metric| (metric, team_average(selection, metric)))
        .collect()
}

/// Share of the target reached, in percent and capped at 100. A target of zero
/// or below counts as 0% achieved.
pub fn achievement_pct(average: f64, target: f64) -> f64 {
    if target > 0.0 {
        (average / target).min(1.0) * 100.0
    } else {
        0.0
    }
}

pub fn progress(metric: Metric, average: Aggregate, target: f64) -> Progress {
    match average {
        Aggregate::Mean(value) => Progress {
            metric,
            average,
            target,
            achieved: value.min(target).max(0.0),
            remaining: (target - value).max(0.0),
            achieved_pct: Some(achievement_pct(value, target)),
        },
        Aggregate::NoData => Progress {
            metric,
            average,
            target,
            achieved: 0.0,
            remaining: target,
            achieved_pct: None,
        },
    }
}

/// Aggregates derived rows for one window and compares them with the targets.
pub fn build_dashboard(
    rows: &[RecruiterMetrics],
    window: Window,
    targets: &TargetSet,
) -> Dashboard {
    let selection = select_window(rows, window);
    let averages = team_averages(&selection);
    let targets = targets.scaled(selection.target_scale);

    let progress = targets
        .iter()
        .map(|(metric, target)| {
            let average = averages.get(&metric).copied().unwrap_or(Aggregate::NoData);
            progress(metric, average, target)
        })
        .collect();

    Dashboard {
        window: window.to_string(),
        weeks_included: selection.periods,
        records: selection.rows.into_iter().cloned().collect(),
        averages,
        targets,
        progress,
    }
}
