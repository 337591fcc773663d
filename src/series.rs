use chrono::NaiveDate;
use tracing::debug;

use crate::models::{Entry, MetricPoint, ParsedValue, RawValue, Series};
use crate::normalize::normalize_number;

/// Expands a two-part reading for metric names it recognizes.
pub struct CompoundRule {
    pub name: &'static str,
    pub applies: fn(&str) -> bool,
    pub expand: fn(&str, f64, f64) -> Vec<(String, f64)>,
}

fn is_pressure(metric: &str) -> bool {
    metric.contains("pressure")
}

fn split_pressure(metric: &str, systolic: f64, diastolic: f64) -> Vec<(String, f64)> {
    vec![
        (format!("{metric}_systolic"), systolic),
        (format!("{metric}_diastolic"), diastolic),
    ]
}

/// Rules are tried in order; the first match wins.
pub static COMPOUND_RULES: &[CompoundRule] = &[CompoundRule {
    name: "blood-pressure",
    applies: is_pressure,
    expand: split_pressure,
}];

pub fn parse_entry_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Turns one bucket pair into the `(metric, value)` readings it emits.
/// Metric names come back trimmed and lower-cased.
pub fn expand_value_for_metric(
    metric: &str,
    raw: &RawValue,
    rules: &[CompoundRule],
) -> Vec<(String, f64)> {
    let name = metric.trim().to_lowercase();
    if name.is_empty() {
        return Vec::new();
    }

    let readings = match normalize_number(raw) {
        ParsedValue::None => Vec::new(),
        ParsedValue::Single(value) => vec![(name, value)],
        ParsedValue::Pair(first, second) => rules
            .iter()
            .find(|rule| (rule.applies)(&name))
            .map(|rule| (rule.expand)(&name, first, second))
            .unwrap_or_default(),
    };

    readings
        .into_iter()
        .filter(|(_, value)| value.is_finite())
        .collect()
}

pub fn build_series(entries: &[Entry]) -> Series {
    build_series_with(entries, COMPOUND_RULES)
}

pub fn build_series_with(entries: &[Entry], rules: &[CompoundRule]) -> Series {
    let mut series = Series::new();

    for entry in entries {
        let Some(date) = parse_entry_date(&entry.date_of_entry) else {
            debug!(date = %entry.date_of_entry, "skipping entry with unparseable date");
            continue;
        };

        for bucket in entry.buckets() {
            for (metric, raw) in bucket {
                for (name, value) in expand_value_for_metric(metric, raw, rules) {
                    series.entry(name).or_default().push(MetricPoint {
                        date,
                        value,
                        context: entry.measurement_context.clone(),
                        tags: entry.tags.clone(),
                    });
                }
            }
        }
    }

    for points in series.values_mut() {
        points.sort_by_key(|point| point.date);
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn values(series: &Series, metric: &str) -> Vec<f64> {
        series[metric].iter().map(|p| p.value).collect()
    }

    #[test]
    fn empty_entries_build_empty_series() {
        assert!(build_series(&[]).is_empty());
    }

    #[test]
    fn blood_pressure_expands_into_two_metrics() {
        let entries = vec![Entry::new("2024-02-01").with_medical("bloodPressure", "130/90")];
        let series = build_series(&entries);

        assert_eq!(
            series.keys().cloned().collect::<Vec<_>>(),
            vec!["bloodpressure_diastolic", "bloodpressure_systolic"]
        );
        assert_eq!(values(&series, "bloodpressure_systolic"), vec![130.0]);
        assert_eq!(values(&series, "bloodpressure_diastolic"), vec![90.0]);
        assert!(!series.contains_key("bloodpressure"));
    }

    #[test]
    fn ratio_without_matching_rule_is_dropped() {
        let entries = vec![Entry::new("2024-02-01").with_basic("waistHip", "80/100")];
        assert!(build_series(&entries).is_empty());
    }

    #[test]
    fn custom_rules_extend_compound_readings() {
        fn ratio(metric: &str, a: f64, b: f64) -> Vec<(String, f64)> {
            vec![(format!("{metric}_ratio"), a / b)]
        }
        let rules = [CompoundRule {
            name: "ratio",
            applies: |metric| metric.starts_with("waist"),
            expand: ratio,
        }];

        let entries = vec![Entry::new("2024-02-01").with_basic("waistHip", "80/100")];
        let series = build_series_with(&entries, &rules);
        assert_eq!(values(&series, "waisthip_ratio"), vec![0.8]);
    }

    #[test]
    fn points_are_sorted_by_date_and_names_lowercased() {
        let entries = vec![
            Entry::new("2024-01-03").with_basic(" Weight ", 72.0),
            Entry::new("2024-01-01").with_basic("weight", 70.0),
            Entry::new("2024-01-02").with_medical("WEIGHT", "71 kg"),
        ];
        let series = build_series(&entries);

        assert_eq!(series.len(), 1);
        assert_eq!(values(&series, "weight"), vec![70.0, 71.0, 72.0]);
    }

    #[test]
    fn duplicate_dates_keep_both_points_in_input_order() {
        let entries = vec![
            Entry::new("2024-01-02").with_basic("weight", 71.0),
            Entry::new("2024-01-01").with_basic("weight", 70.0),
            Entry::new("2024-01-02").with_basic("weight", 73.0),
        ];
        let series = build_series(&entries);

        assert_eq!(values(&series, "weight"), vec![70.0, 71.0, 73.0]);
        let dates: Vec<_> = series["weight"].iter().map(|p| p.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-01-02", "2024-01-02"]);
    }

    #[test]
    fn unparseable_values_and_dates_are_skipped() {
        let entries = vec![
            Entry::new("2024-01-01").with_basic("weight", "not a number"),
            Entry::new("yesterday").with_basic("weight", 70.0),
            Entry::new("2024-01-02").with_basic("weight", 71.0),
            Entry::new("2024-01-02").with_basic("   ", 5.0),
        ];
        let series = build_series(&entries);

        assert_eq!(series.len(), 1);
        assert_eq!(values(&series, "weight"), vec![71.0]);
    }

    #[test]
    fn points_carry_entry_context_and_tags() {
        let mut entry = Entry::new("2024-01-01").with_basic("glucose", 110.0);
        entry.measurement_context = Some("fasting".to_string());
        entry.tags = vec!["lab".to_string()];

        let series = build_series(&[entry]);
        let point = &series["glucose"][0];
        assert_eq!(point.context.as_deref(), Some("fasting"));
        assert_eq!(point.tags, vec!["lab".to_string()]);
    }
}
