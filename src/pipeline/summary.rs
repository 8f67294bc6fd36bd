// src/pipeline/summary.rs

//! End-of-run summary logging.

use crate::models::{ErrorClass, RunSummary};

/// Operator hint for the most frequent failure class.
pub fn failure_hint(class: ErrorClass) -> &'static str {
    match class {
        ErrorClass::RateLimit => "Upstream is throttling; raise engine.rate_limit_secs",
        ErrorClass::AuthError => "Requests are being refused; check network egress and identities",
        ErrorClass::NetworkError => "Connectivity problems; check DNS and outbound access",
        ErrorClass::Unknown => "Unexpected responses; inspect the logs for the raw errors",
        ErrorClass::NoData => "No related data for these terms right now",
    }
}

/// Summary lines as `(label, value)` pairs.
pub fn summary_lines(summary: &RunSummary) -> Vec<(&'static str, String)> {
    let mut lines = vec![
        ("Group", summary.group_id.clone()),
        ("Duration", format!("{:.1} min", summary.duration.as_secs_f64() / 60.0)),
        (
            "Items",
            format!(
                "{} attempted, {} succeeded ({} without data), {} failed",
                summary.attempted, summary.succeeded, summary.no_data, summary.failed
            ),
        ),
        ("Success rate", format!("{:.1}%", summary.success_rate())),
        (
            "Records",
            format!(
                "{} emitted, {} duplicates dropped",
                summary.records_emitted, summary.duplicates_dropped
            ),
        ),
    ];

    if summary.export_failures > 0 || summary.backup_failures > 0 {
        lines.push((
            "Sink failures",
            format!(
                "{} export, {} backup",
                summary.export_failures, summary.backup_failures
            ),
        ));
    }
    for (class, count) in &summary.failures_by_classification {
        lines.push(("Failures", format!("{class}: {count}")));
    }
    for (sheet, count) in &summary.records_by_sheet {
        lines.push(("Sheet", format!("{sheet}: {count}")));
    }
    lines.push(("Disposition", summary.disposition.to_string()));
    lines
}

/// Log the run summary, plus a hint when failures occurred.
pub fn log_summary(summary: &RunSummary) {
    log::info!("[SUMMARY] {}", summary.group_id);
    for (label, value) in summary_lines(summary) {
        log::info!("    {label}: {value}");
    }
    if let Some(class) = summary.dominant_failure() {
        log::warn!("Most failures were {class}. {}", failure_hint(class));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::models::{Disposition, RunTally};

    #[test]
    fn test_lines_include_failures_and_sheets() {
        let mut tally = RunTally::default();
        tally.record_success(2);
        tally.record_emitted("Related_Queries_Top");
        tally.record_failure(ErrorClass::RateLimit);
        tally.export_failures = 1;
        let summary = RunSummary::new(
            "group_2",
            Utc::now(),
            tally,
            Duration::from_secs(90),
            Disposition::Degraded,
        );

        let lines = summary_lines(&summary);
        let rendered: Vec<String> = lines.iter().map(|(k, v)| format!("{k}: {v}")).collect();

        assert!(rendered.contains(&"Failures: RATE_LIMIT: 1".to_string()));
        assert!(rendered.contains(&"Sheet: Related_Queries_Top: 1".to_string()));
        assert!(rendered.contains(&"Sink failures: 1 export, 0 backup".to_string()));
        assert_eq!(rendered.last().unwrap(), "Disposition: degraded");
    }

    #[test]
    fn test_clean_run_has_no_sink_line() {
        let mut tally = RunTally::default();
        tally.record_success(0);
        let summary = RunSummary::new("group_1", Utc::now(), tally, Duration::ZERO, Disposition::Clean);
        assert!(summary_lines(&summary).iter().all(|(k, _)| *k != "Sink failures"));
    }
}
