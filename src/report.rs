use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::models::{AnalyticsReport, Bounds};

fn describe_bounds(bounds: Option<&Bounds>) -> String {
    match bounds.map(|b| (b.min, b.max)) {
        Some((Some(min), Some(max))) => format!("{min} to {max}"),
        Some((Some(min), None)) => format!("at least {min}"),
        Some((None, Some(max))) => format!("at most {max}"),
        _ => "no bounds".to_string(),
    }
}

pub fn build_report(
    label: Option<&str>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    analytics: &AnalyticsReport,
) -> String {
    let mut output = String::new();
    let label = label.unwrap_or("all entries");

    let _ = writeln!(output, "# Health Analytics Report");
    match (start, end) {
        (Some(start), Some(end)) => {
            let _ = writeln!(output, "Generated for {} ({} to {})", label, start, end);
        }
        _ => {
            let _ = writeln!(output, "Generated for {}", label);
        }
    }
    let _ = writeln!(output, "Rolling window: {} entries", analytics.window_size);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Active Alerts");

    if analytics.alert_banners.is_empty() {
        let _ = writeln!(output, "No thresholds breached in this range.");
    } else {
        for banner in analytics.alert_banners.iter() {
            let _ = writeln!(
                output,
                "- {} (latest {} on {})",
                banner.message, banner.latest_value, banner.last_triggered_at
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Metric Summaries");

    if analytics.metric_summaries.is_empty() {
        let _ = writeln!(output, "No metrics recorded in this range.");
    } else {
        for summary in analytics.metric_summaries.values() {
            let average = summary
                .rolling_average
                .last()
                .map(|p| format!("{:.2}", p.value))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                output,
                "- {}: latest {}, trend {}, avg {}, min {} ({}), max {} ({}), target {}",
                summary.metric,
                summary.latest,
                summary.trend,
                average,
                summary.min.value,
                summary.min.date,
                summary.max.value,
                summary.max.date,
                describe_bounds(analytics.thresholds.get(&summary.metric))
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Alerts");

    if analytics.per_entry_alerts.is_empty() {
        let _ = writeln!(output, "No alerts recorded in this range.");
    } else {
        for (date, alerts) in analytics.per_entry_alerts.iter().rev().take(5) {
            let detail: Vec<String> = alerts
                .iter()
                .map(|alert| {
                    format!(
                        "{} {} ({} {})",
                        alert.metric,
                        alert.value,
                        alert.kind.direction(),
                        alert.threshold
                    )
                })
                .collect();
            let _ = writeln!(output, "- {}: {}", date, detail.join(", "));
        }
    }

    output
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    generated_at: chrono::DateTime<Utc>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    analytics: &'a AnalyticsReport,
}

/// Writes the report as pretty JSON, creating parent directories.
pub fn write_snapshot(
    path: &Path,
    analytics: &AnalyticsReport,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let snapshot = Snapshot {
        generated_at: Utc::now(),
        start,
        end,
        analytics,
    };
    let body = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{derive_analytics, AnalyticsOptions};
    use crate::models::Entry;

    fn sample() -> AnalyticsReport {
        let entries = vec![
            Entry::new("2024-03-01").with_basic("weight", 95.0),
            Entry::new("2024-03-02").with_basic("weight", 96.0),
            Entry::new("2024-03-02").with_basic("steps", 9000.0),
        ];
        derive_analytics(&entries, &AnalyticsOptions::default())
    }

    #[test]
    fn report_lists_banners_and_summaries() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1);
        let end = NaiveDate::from_ymd_opt(2024, 3, 2);
        let output = build_report(Some("March"), start, end, &sample());

        assert!(output.contains("Generated for March (2024-03-01 to 2024-03-02)"));
        assert!(output.contains("- weight above 90 for 2 days (latest 96 on 2024-03-02)"));
        assert!(output.contains("- steps: latest 9000, trend flat"));
        assert!(output.contains("target 45 to 90"));
        assert!(output.contains("- 2024-03-02: weight 96 (above 90)"));
    }

    #[test]
    fn empty_report_has_placeholders() {
        let analytics = derive_analytics(&[], &AnalyticsOptions::default());
        let output = build_report(None, None, None, &analytics);

        assert!(output.contains("Generated for all entries"));
        assert!(output.contains("No thresholds breached in this range."));
        assert!(output.contains("No metrics recorded in this range."));
    }

    #[test]
    fn snapshot_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.json");

        write_snapshot(&path, &sample(), None, None).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["analytics"]["windowSize"], 7);
        assert_eq!(written["analytics"]["alertBanners"][0]["streak"], 2);
        assert!(written["analytics"]["perEntryAlerts"]["2024-03-02"].is_array());
    }
}
