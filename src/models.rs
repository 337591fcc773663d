use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::plain::ToPlainMapping;
use crate::thresholds::thresholds_from_value;

/// One metric bucket of an entry, keyed by the free-form metric name.
pub type Bucket = BTreeMap<String, RawValue>;

/// Per-metric bounds keyed by lower-cased metric name.
pub type ThresholdMap = BTreeMap<String, Bounds>;

/// Ordered point lists keyed by lower-cased metric name.
pub type Series = BTreeMap<String, Vec<MetricPoint>>;

/// A value as it was stored in a bucket, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// Result of parsing a raw value into numeric readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedValue {
    None,
    Single(f64),
    Pair(f64, f64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(default, deserialize_with = "lenient_date")]
    pub date_of_entry: String,
    #[serde(default, deserialize_with = "plain_bucket")]
    pub basic_data: Bucket,
    #[serde(default, deserialize_with = "plain_bucket")]
    pub medical_record: Bucket,
    #[serde(default)]
    pub measurement_context: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_thresholds")]
    pub personalized_thresholds: ThresholdMap,
}

impl Entry {
    pub fn new(date_of_entry: impl Into<String>) -> Self {
        Self {
            date_of_entry: date_of_entry.into(),
            ..Self::default()
        }
    }

    pub fn with_basic(mut self, metric: &str, value: impl Into<RawValue>) -> Self {
        self.basic_data.insert(metric.to_string(), value.into());
        self
    }

    pub fn with_medical(mut self, metric: &str, value: impl Into<RawValue>) -> Self {
        self.medical_record.insert(metric.to_string(), value.into());
        self
    }

    pub fn buckets(&self) -> [&Bucket; 2] {
        [&self.basic_data, &self.medical_record]
    }
}

/// A missing or non-text date becomes an empty string, which the series
/// builder skips.
fn lenient_date<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string).unwrap_or_default())
}

fn lenient_thresholds<'de, D>(deserializer: D) -> Result<ThresholdMap, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(thresholds_from_value(value).unwrap_or_default())
}

fn plain_bucket<'de, D>(deserializer: D) -> Result<Bucket, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.to_plain_mapping())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub context: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Bounds {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    High,
    Low,
}

impl AlertKind {
    pub fn direction(&self) -> &'static str {
        match self {
            AlertKind::High => "above",
            AlertKind::Low => "below",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub metric: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub threshold: f64,
    pub value: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBanner {
    pub metric: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub latest_value: f64,
    pub threshold: f64,
    pub last_triggered_at: NaiveDate,
    pub streak: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub metric: String,
    pub latest: f64,
    pub min: DatedValue,
    pub max: DatedValue,
    pub trend: Trend,
    pub rolling_average: Vec<DatedValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub window_size: usize,
    pub metric_summaries: BTreeMap<String, MetricSummary>,
    pub series_by_metric: Series,
    pub alerts: Vec<Alert>,
    pub alert_banners: Vec<AlertBanner>,
    pub per_entry_alerts: BTreeMap<NaiveDate, Vec<Alert>>,
    pub thresholds: ThresholdMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInsight {
    pub metric: String,
    pub window_size: usize,
    pub moving_average: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryAnalyticsSummary {
    pub date_of_entry: String,
    pub computed_at: DateTime<Utc>,
    pub window_size: usize,
    pub alerts: Vec<Alert>,
    pub insights: Vec<EntryInsight>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_deserializes_mixed_bucket_values() {
        let json = r#"{
            "dateOfEntry": "2024-01-01",
            "basicData": {"weight": 70.5, "sleep": "7h 30m", "fasting": true},
            "medicalRecord": null,
            "tags": ["morning"]
        }"#;

        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.basic_data.len(), 2);
        assert_eq!(entry.basic_data["weight"], RawValue::Number(70.5));
        assert_eq!(entry.basic_data["sleep"], RawValue::Text("7h 30m".to_string()));
        assert!(entry.medical_record.is_empty());
        assert_eq!(entry.tags, vec!["morning".to_string()]);
    }

    #[test]
    fn entry_tolerates_missing_date_and_text_bounds() {
        let json = r#"{
            "basicData": {"weight": 71},
            "personalizedThresholds": {"weight": {"max": "80"}, "bmi": {"max": "tall"}}
        }"#;

        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.date_of_entry, "");
        assert_eq!(entry.personalized_thresholds.len(), 1);
        assert_eq!(entry.personalized_thresholds["weight"], Bounds::new(None, Some(80.0)));

        let entry: Entry =
            serde_json::from_str(r#"{"dateOfEntry": null, "personalizedThresholds": null}"#).unwrap();
        assert_eq!(entry.date_of_entry, "");
        assert!(entry.personalized_thresholds.is_empty());
    }

    #[test]
    fn alert_serializes_kind_as_type() {
        let alert = Alert {
            metric: "weight".to_string(),
            kind: AlertKind::High,
            threshold: 90.0,
            value: 95.0,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };

        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "high");
        assert_eq!(value["date"], "2024-01-01");
    }
}
