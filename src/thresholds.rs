use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;
use crate::models::{Bounds, ThresholdMap};

/// Built-in bounds as `(metric, min, max)`.
pub const DEFAULT_THRESHOLD_TABLE: &[(&str, Option<f64>, Option<f64>)] = &[
    ("weight", Some(45.0), Some(90.0)),
    ("bodyfat", None, Some(25.0)),
    ("bmi", None, Some(27.0)),
    ("steps", Some(7000.0), None),
    ("sleep", Some(6.5), None),
    ("temperature", None, Some(37.8)),
    ("glucose", None, Some(140.0)),
    ("heartrate", Some(50.0), Some(100.0)),
    ("bloodpressure_systolic", None, Some(135.0)),
    ("bloodpressure_diastolic", None, Some(85.0)),
];

pub fn default_thresholds() -> ThresholdMap {
    DEFAULT_THRESHOLD_TABLE
        .iter()
        .map(|(metric, min, max)| (metric.to_string(), Bounds::new(*min, *max)))
        .collect()
}

/// Folds threshold maps left to right. A later map replaces only the
/// bounds it defines, so `{weight: {max: 80}}` keeps the earlier `min`.
pub fn merge_thresholds<'a, I>(maps: I) -> ThresholdMap
where
    I: IntoIterator<Item = &'a ThresholdMap>,
{
    let mut merged = ThresholdMap::new();

    for map in maps {
        for (metric, bounds) in map {
            let key = metric.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            let target = merged.entry(key).or_default();
            if let Some(min) = bounds.min.filter(|v| v.is_finite()) {
                target.min = Some(min);
            }
            if let Some(max) = bounds.max.filter(|v| v.is_finite()) {
                target.max = Some(max);
            }
        }
    }

    merged
}

/// A user-supplied bound row; bounds may arrive as numbers or numeric text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdRow {
    pub metric: String,
    #[serde(default)]
    pub min: Option<Value>,
    #[serde(default)]
    pub max: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RowBounds {
    #[serde(default)]
    min: Option<Value>,
    #[serde(default)]
    max: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ThresholdInput {
    Rows(Vec<ThresholdRow>),
    Map(BTreeMap<String, RowBounds>),
}

fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

pub fn normalize_threshold_rows(rows: &[ThresholdRow]) -> ThresholdMap {
    let mut normalized = ThresholdMap::new();

    for row in rows {
        let metric = row.metric.trim().to_lowercase();
        if metric.is_empty() {
            continue;
        }
        let bounds = Bounds::new(
            coerce_number(row.min.as_ref()),
            coerce_number(row.max.as_ref()),
        );
        if bounds.is_empty() {
            continue;
        }
        normalized.insert(metric, bounds);
    }

    normalized
}

/// Reads overrides from JSON, either `{"weight": {"max": 80}}` or
/// `[{"metric": "weight", "max": "80"}]`.
pub fn load_threshold_file(path: &Path) -> Result<ThresholdMap, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;

    thresholds_from_value(value).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Normalizes a JSON threshold document in map or row form. Text bounds are
/// coerced; rows without a usable bound are dropped.
pub fn thresholds_from_value(value: Value) -> Result<ThresholdMap, serde_json::Error> {
    let rows = match serde_json::from_value::<ThresholdInput>(value)? {
        ThresholdInput::Rows(rows) => rows,
        ThresholdInput::Map(map) => map
            .into_iter()
            .map(|(metric, bounds)| ThresholdRow {
                metric,
                min: bounds.min,
                max: bounds.max,
            })
            .collect(),
    };

    Ok(normalize_threshold_rows(&rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;

    fn overrides(metric: &str, min: Option<f64>, max: Option<f64>) -> ThresholdMap {
        let mut map = ThresholdMap::new();
        map.insert(metric.to_string(), Bounds::new(min, max));
        map
    }

    #[test]
    fn override_replaces_only_given_bound() {
        let defaults = default_thresholds();
        let merged = merge_thresholds([&defaults, &overrides("weight", None, Some(80.0))]);

        assert_eq!(merged["weight"].max, Some(80.0));
        assert_eq!(merged["weight"].min, defaults["weight"].min);
        assert_eq!(merged["bmi"], defaults["bmi"]);
    }

    #[test]
    fn merge_lowercases_metric_keys() {
        let merged = merge_thresholds([
            &default_thresholds(),
            &overrides(" HeartRate ", Some(45.0), None),
        ]);

        assert_eq!(merged["heartrate"], Bounds::new(Some(45.0), Some(100.0)));
        assert!(!merged.contains_key("HeartRate"));
    }

    #[test]
    fn later_maps_win_and_non_finite_bounds_are_ignored() {
        let merged = merge_thresholds([
            &overrides("glucose", Some(70.0), Some(140.0)),
            &overrides("glucose", Some(f64::NAN), Some(120.0)),
            &overrides("glucose", None, Some(130.0)),
        ]);

        assert_eq!(merged["glucose"], Bounds::new(Some(70.0), Some(130.0)));
    }

    #[test]
    fn rows_coerce_text_bounds_and_drop_empty_rows() {
        let rows = vec![
            ThresholdRow {
                metric: " Weight ".to_string(),
                min: Some(json!("50")),
                max: Some(json!(85)),
            },
            ThresholdRow {
                metric: "steps".to_string(),
                min: Some(json!("")),
                max: Some(json!("lots")),
            },
            ThresholdRow {
                metric: "  ".to_string(),
                min: Some(json!(1)),
                max: None,
            },
        ];

        let normalized = normalize_threshold_rows(&rows);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized["weight"], Bounds::new(Some(50.0), Some(85.0)));
    }

    #[test]
    fn loads_map_and_row_files() {
        let mut map_file = tempfile::NamedTempFile::new().unwrap();
        write!(map_file, r#"{{"weight": {{"max": 80}}, "sleep": {{"min": "7"}}}}"#).unwrap();
        let loaded = load_threshold_file(map_file.path()).unwrap();
        assert_eq!(loaded["weight"], Bounds::new(None, Some(80.0)));
        assert_eq!(loaded["sleep"], Bounds::new(Some(7.0), None));

        let mut row_file = tempfile::NamedTempFile::new().unwrap();
        write!(row_file, r#"[{{"metric": "bmi", "max": 26}}]"#).unwrap();
        let loaded = load_threshold_file(row_file.path()).unwrap();
        assert_eq!(loaded["bmi"], Bounds::new(None, Some(26.0)));
    }

    #[test]
    fn json_documents_coerce_text_bounds() {
        let map = thresholds_from_value(json!({"Weight": {"max": "80"}, "sleep": {"min": 7}})).unwrap();
        assert_eq!(map["weight"], Bounds::new(None, Some(80.0)));
        assert_eq!(map["sleep"], Bounds::new(Some(7.0), None));

        assert!(thresholds_from_value(json!({})).unwrap().is_empty());
        assert!(thresholds_from_value(json!(null)).is_err());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = load_threshold_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }
}
