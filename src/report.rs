use std::collections::BTreeMap;
use std::fmt::Write;

use crate::error::Result;
use crate::models::{Aggregate, Dashboard, Metric, RecruiterMetrics, RecruiterSummary};

pub fn summarize_by_recruiter(rows: &[RecruiterMetrics]) -> Vec<RecruiterSummary> {
    let mut map: BTreeMap<&str, Vec<&RecruiterMetrics>> = BTreeMap::new();
    for row in rows {
        map.entry(row.name.as_str()).or_default().push(row);
    }

    let mut summaries: Vec<RecruiterSummary> = map
        .into_iter()
        .map(|(name, rows)| {
            let weeks = rows.len();
            RecruiterSummary {
                name: name.to_string(),
                weeks,
                inmails: rows.iter().map(|r| u64::from(r.inmails)).sum(),
                cold_calls: rows.iter().map(|r| u64::from(r.cold_calls)).sum(),
                qualification_calls: rows
                    .iter()
                    .map(|r| u64::from(r.qualification_calls))
                    .sum(),
                introductions: rows.iter().map(|r| u64::from(r.introductions)).sum(),
                avg_response_rate: if weeks == 0 {
                    0.0
                } else {
                    rows.iter().map(|r| r.response_rate).sum::<f64>() / weeks as f64
                },
                conversions: rows.iter().filter(|r| r.conversion == 1).count(),
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        (b.inmails + b.cold_calls)
            .cmp(&(a.inmails + a.cold_calls))
            .then_with(|| a.name.cmp(&b.name))
    });
    summaries
}

fn format_aggregate(metric: Metric, average: Aggregate) -> String {
    match average {
        Aggregate::Mean(value) => metric.format(value),
        Aggregate::NoData => "no data".to_string(),
    }
}

/// Plain-text team summary for the terminal.
pub fn build_summary(dashboard: &Dashboard) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} ({} weeks, {} records)",
        dashboard.window,
        dashboard.weeks_included,
        dashboard.records.len()
    );

    if dashboard.records.is_empty() {
        let _ = writeln!(output, "No data for this window.");
        return output;
    }

    for progress in &dashboard.progress {
        let pct = progress
            .achieved_pct
            .map(|pct| format!("{pct:.0}%"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            output,
            "- {}: {} of target {} ({})",
            progress.metric,
            format_aggregate(progress.metric, progress.average),
            progress.metric.format(progress.target),
            pct
        );
    }
    for (metric, average) in &dashboard.averages {
        if dashboard.targets.get(*metric).is_none() {
            let _ = writeln!(output, "- {}: {}", metric, format_aggregate(*metric, *average));
        }
    }
    output
}

/// Markdown report: team averages against targets, a per-recruiter breakdown
/// and the recruiters whose weeks converted.
pub fn build_report(dashboard: &Dashboard) -> String {
    let summaries = summarize_by_recruiter(&dashboard.records);
    let mut output = String::new();

    let _ = writeln!(output, "# Recruitment KPI Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} weeks, {} records)",
        dashboard.window,
        dashboard.weeks_included,
        dashboard.records.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Team Averages vs Target");

    if dashboard.records.is_empty() {
        let _ = writeln!(output, "No data recorded for this window.");
    } else {
        for progress in &dashboard.progress {
            let _ = writeln!(
                output,
                "- {}: {} (target {}, {:.0}% achieved)",
                progress.metric,
                format_aggregate(progress.metric, progress.average),
                progress.metric.format(progress.target),
                progress.achieved_pct.unwrap_or(0.0)
            );
        }
        for (metric, average) in &dashboard.averages {
            if dashboard.targets.get(*metric).is_none() {
                let _ = writeln!(output, "- {}: {}", metric, format_aggregate(*metric, *average));
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Per Recruiter");

    if summaries.is_empty() {
        let _ = writeln!(output, "No recruiters in this window.");
    } else {
        let _ = writeln!(
            output,
            "| Recruiter | Weeks | InMails | Cold calls | Qualification | Introductions | Response rate |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|");
        for summary in &summaries {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {:.1}% |",
                summary.name,
                summary.weeks,
                summary.inmails,
                summary.cold_calls,
                summary.qualification_calls,
                summary.introductions,
                summary.avg_response_rate * 100.0
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Conversions");

    let converted: Vec<&RecruiterSummary> =
        summaries.iter().filter(|s| s.conversions > 0).collect();
    if converted.is_empty() {
        let _ = writeln!(output, "No recruiter passed the introduction threshold.");
    } else {
        for summary in converted {
            let _ = writeln!(
                output,
                "- {}: {} of {} weeks",
                summary.name, summary.conversions, summary.weeks
            );
        }
    }

    output
}

/// Writes the cleaned and derived table as CSV.
pub fn write_csv<W: std::io::Write>(rows: &[RecruiterMetrics], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::metrics::{build_dashboard, derive};
    use crate::models::{RecruiterWeekRecord, TargetSet, Window};

    fn record(name: &str, inmails: u32, introductions: u32) -> RecruiterWeekRecord {
        RecruiterWeekRecord {
            name: name.to_string(),
            period_start: NaiveDate::from_ymd_opt(2025, 1, 6),
            period_end: NaiveDate::from_ymd_opt(2025, 1, 10),
            week: 2,
            cold_calls: 10,
            inmails,
            qualification_calls: 5,
            introductions,
            response_rate: 0.2,
        }
    }

    fn dashboard(records: Vec<RecruiterWeekRecord>) -> Dashboard {
        let targets = TargetSet::new([(Metric::Inmails, 150.0), (Metric::ResponseRate, 0.25)]);
        build_dashboard(&derive(records), Window::All, &targets)
    }

    #[test]
    fn summaries_total_by_recruiter() {
        let rows = derive(vec![
            record("Avery", 100, 4),
            record("Avery", 50, 1),
            record("Jules", 200, 0),
        ]);
        let summaries = summarize_by_recruiter(&rows);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "Jules");
        assert_eq!(summaries[1].inmails, 150);
        assert_eq!(summaries[1].weeks, 2);
        assert_eq!(summaries[1].conversions, 1);
    }

    #[test]
    fn summary_totals_hold_large_counts() {
        let rows = derive(vec![
            record("Avery", 4_000_000_000, 1),
            record("Avery", 4_000_000_000, 1),
        ]);
        let summaries = summarize_by_recruiter(&rows);
        assert_eq!(summaries[0].inmails, 8_000_000_000);
        assert_eq!(summaries[0].cold_calls, 20);
    }

    #[test]
    fn report_lists_targets_and_conversions() {
        let records = vec![record("Avery", 150, 4), record("Jules", 150, 2)];
        let report = build_report(&dashboard(records));
        assert!(report.contains("# Recruitment KPI Report"));
        assert!(report.contains("- InMails: 150.00 (target 150.00, 100% achieved)"));
        assert!(report.contains("- Response rate: 20.00% (target 25.00%, 80% achieved)"));
        assert!(report.contains("| Avery | 1 | 150 | 10 | 5 | 4 | 20.0% |"));
        assert!(report.contains("- Avery: 1 of 1 weeks"));
    }

    #[test]
    fn empty_report_says_no_data() {
        let report = build_report(&dashboard(Vec::new()));
        assert!(report.contains("No data recorded for this window."));
        assert!(report.contains("No recruiters in this window."));
        assert!(!report.contains("0.00"));

        let summary = build_summary(&dashboard(Vec::new()));
        assert!(summary.contains("No data for this window."));
    }

    #[test]
    fn csv_export_has_header_and_blank_missing_dates() {
        let mut open = record("Avery", 100, 1);
        open.period_end = None;
        let rows = derive(vec![open]);

        let mut buffer = Vec::new();
        write_csv(&rows, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("name,period_start,period_end,week"));
        assert!(lines.next().unwrap().starts_with("Avery,2025-01-06,,2,10,100,5,1,0.2,,22,"));
    }
}
