use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    Alert, AlertBanner, AlertKind, AnalyticsReport, Bounds, DatedValue, Entry,
    EntryAnalyticsSummary, EntryInsight, MetricPoint, MetricSummary, Series, ThresholdMap, Trend,
};
use crate::series::{build_series, parse_entry_date};
use crate::thresholds::{default_thresholds, merge_thresholds};

pub const DEFAULT_WINDOW_SIZE: usize = 7;
pub const MIN_WINDOW_SIZE: usize = 2;
pub const MAX_WINDOW_SIZE: usize = 30;
pub const TREND_EPSILON: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct AnalyticsOptions {
    pub window_size: Option<i64>,
    /// Metric names to keep; `None` or an empty list keeps everything.
    pub metric_filter: Option<Vec<String>>,
    pub thresholds: ThresholdMap,
    /// Base table the overrides are merged onto.
    pub defaults: ThresholdMap,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            window_size: None,
            metric_filter: None,
            thresholds: ThresholdMap::new(),
            defaults: default_thresholds(),
        }
    }
}

pub fn clamp_window_size(window_size: Option<i64>) -> usize {
    match window_size {
        Some(size) => size.clamp(MIN_WINDOW_SIZE as i64, MAX_WINDOW_SIZE as i64) as usize,
        None => DEFAULT_WINDOW_SIZE,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Trailing mean over at most `window_size` points, one output per input.
pub fn rolling_average(points: &[MetricPoint], window_size: usize) -> Vec<DatedValue> {
    let window_size = window_size.max(1);
    let mut sum = 0.0;

    points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            sum += point.value;
            if i >= window_size {
                sum -= points[i - window_size].value;
            }
            let len = (i + 1).min(window_size);
            DatedValue {
                date: point.date,
                value: round2(sum / len as f64),
            }
        })
        .collect()
}

/// Compares only the first and last values.
pub fn determine_trend(points: &[MetricPoint]) -> Trend {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Trend::Flat;
    };
    let delta = last.value - first.value;
    if delta.abs() <= TREND_EPSILON {
        Trend::Flat
    } else if delta > 0.0 {
        Trend::Up
    } else {
        Trend::Down
    }
}

fn extreme_by(points: &[MetricPoint], replaces: fn(f64, f64) -> bool) -> Option<DatedValue> {
    let first = points.first()?;
    let best = points
        .iter()
        .fold(first, |best, point| if replaces(point.value, best.value) { point } else { best });
    Some(DatedValue {
        date: best.date,
        value: best.value,
    })
}

pub fn evaluate_alerts(points: &[MetricPoint], bounds: Option<&Bounds>, metric: &str) -> Vec<Alert> {
    let Some(bounds) = bounds.filter(|b| !b.is_empty()) else {
        return Vec::new();
    };
    let mut alerts = Vec::new();

    for point in points {
        if let Some(max) = bounds.max.filter(|max| point.value > *max) {
            alerts.push(Alert {
                metric: metric.to_string(),
                kind: AlertKind::High,
                threshold: max,
                value: point.value,
                date: point.date,
            });
        }
        if let Some(min) = bounds.min.filter(|min| point.value < *min) {
            alerts.push(Alert {
                metric: metric.to_string(),
                kind: AlertKind::Low,
                threshold: min,
                value: point.value,
                date: point.date,
            });
        }
    }

    alerts
}

/// Length of the run of consecutive calendar days ending at the last date.
/// `dates` must be sorted ascending and distinct.
pub fn compute_streak(dates: &[NaiveDate]) -> usize {
    if dates.is_empty() {
        return 0;
    }
    let consecutive = dates
        .windows(2)
        .rev()
        .take_while(|pair| (pair[1] - pair[0]).num_days() == 1)
        .count();
    consecutive + 1
}

pub fn build_alert_banners(alerts: &[Alert]) -> Vec<AlertBanner> {
    let mut grouped: BTreeMap<(&str, AlertKind), Vec<&Alert>> = BTreeMap::new();
    for alert in alerts {
        grouped
            .entry((alert.metric.as_str(), alert.kind))
            .or_default()
            .push(alert);
    }

    let mut banners: Vec<AlertBanner> = grouped
        .into_values()
        .filter_map(|mut group| {
            group.sort_by_key(|alert| alert.date);
            let latest = *group.last()?;
            let dates: Vec<NaiveDate> = group
                .iter()
                .map(|alert| alert.date)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let streak = compute_streak(&dates);
            let plural = if streak == 1 { "" } else { "s" };

            Some(AlertBanner {
                metric: latest.metric.clone(),
                kind: latest.kind,
                latest_value: latest.value,
                threshold: latest.threshold,
                last_triggered_at: latest.date,
                streak,
                message: format!(
                    "{} {} {} for {} day{}",
                    latest.metric,
                    latest.kind.direction(),
                    latest.threshold,
                    streak,
                    plural
                ),
            })
        })
        .collect();

    banners.sort_by(|a, b| b.streak.cmp(&a.streak));
    banners
}

pub fn aggregate_alerts_by_date(alerts: &[Alert]) -> BTreeMap<NaiveDate, Vec<Alert>> {
    let mut by_date: BTreeMap<NaiveDate, Vec<Alert>> = BTreeMap::new();
    for alert in alerts {
        by_date.entry(alert.date).or_default().push(alert.clone());
    }
    by_date
}

pub fn summarize_metric(metric: &str, points: &[MetricPoint], window_size: usize) -> Option<MetricSummary> {
    let latest = points.last()?;
    Some(MetricSummary {
        metric: metric.to_string(),
        latest: latest.value,
        min: extreme_by(points, |value, best| value < best)?,
        max: extreme_by(points, |value, best| value > best)?,
        trend: determine_trend(points),
        rolling_average: rolling_average(points, window_size),
    })
}

pub fn derive_analytics(entries: &[Entry], options: &AnalyticsOptions) -> AnalyticsReport {
    let window_size = clamp_window_size(options.window_size);
    let metric_filter: Option<HashSet<String>> = options
        .metric_filter
        .as_ref()
        .filter(|metrics| !metrics.is_empty())
        .map(|metrics| metrics.iter().map(|m| m.trim().to_lowercase()).collect());
    let thresholds = merge_thresholds([&options.defaults, &options.thresholds]);

    let mut metric_summaries = BTreeMap::new();
    let mut series_by_metric = Series::new();
    let mut alerts = Vec::new();

    for (metric, mut points) in build_series(entries) {
        if points.is_empty() {
            continue;
        }
        if let Some(filter) = &metric_filter {
            if !filter.contains(&metric) {
                continue;
            }
        }

        points.sort_by_key(|point| point.date);
        let Some(summary) = summarize_metric(&metric, &points, window_size) else {
            continue;
        };
        alerts.extend(evaluate_alerts(&points, thresholds.get(&metric), &metric));
        metric_summaries.insert(metric.clone(), summary);
        series_by_metric.insert(metric, points);
    }

    let alert_banners = build_alert_banners(&alerts);
    let per_entry_alerts = aggregate_alerts_by_date(&alerts);

    AnalyticsReport {
        window_size,
        metric_summaries,
        series_by_metric,
        alerts,
        alert_banners,
        per_entry_alerts,
        thresholds,
    }
}

/// Summary rows for the metrics recorded in one entry.
pub fn collect_entry_insights(entry: &Entry, report: &AnalyticsReport) -> Vec<EntryInsight> {
    let mut seen = HashSet::new();
    let mut insights = Vec::new();

    for bucket in entry.buckets() {
        for metric in bucket.keys() {
            let metric = metric.trim().to_lowercase();
            if seen.contains(&metric) {
                continue;
            }
            let Some(summary) = report.metric_summaries.get(&metric) else {
                continue;
            };
            insights.push(EntryInsight {
                metric: metric.clone(),
                window_size: report.window_size,
                moving_average: summary.rolling_average.last().map(|p| p.value),
                min: summary.min.value,
                max: summary.max.value,
                latest: summary.latest,
                trend: summary.trend,
            });
            seen.insert(metric);
        }
    }

    insights
}

pub fn summarize_entries(
    entries: &[Entry],
    report: &AnalyticsReport,
    computed_at: DateTime<Utc>,
) -> Vec<EntryAnalyticsSummary> {
    entries
        .iter()
        .map(|entry| {
            let alerts = parse_entry_date(&entry.date_of_entry)
                .and_then(|date| report.per_entry_alerts.get(&date))
                .cloned()
                .unwrap_or_default();
            EntryAnalyticsSummary {
                date_of_entry: entry.date_of_entry.clone(),
                computed_at,
                window_size: report.window_size,
                alerts,
                insights: collect_entry_insights(entry, report),
            }
        })
        .collect()
}
