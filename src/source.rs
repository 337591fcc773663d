use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

use crate::models::{Entry, RawValue};
use crate::series::parse_entry_date;

/// One metric reading per CSV line; lines sharing a date form one entry.
#[derive(Debug, Deserialize)]
pub struct CsvRow {
    pub date_of_entry: String,
    pub metric: String,
    pub value: String,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Groups CSV rows into entries ordered by date. Rows with a bad date or
/// blank metric are skipped.
pub fn entries_from_rows(rows: Vec<CsvRow>) -> Vec<Entry> {
    let mut by_date: BTreeMap<String, Entry> = BTreeMap::new();

    for row in rows {
        let date = row.date_of_entry.trim();
        let metric = row.metric.trim();
        if parse_entry_date(date).is_none() || metric.is_empty() {
            warn!(date = %row.date_of_entry, metric = %row.metric, "skipping csv row");
            continue;
        }

        let entry = by_date
            .entry(date.to_string())
            .or_insert_with(|| Entry::new(date));
        let value = RawValue::Text(row.value.trim().to_string());
        match row.bucket.as_deref().map(str::trim) {
            Some("medical") | Some("medicalRecord") => {
                entry.medical_record.insert(metric.to_string(), value);
            }
            _ => {
                entry.basic_data.insert(metric.to_string(), value);
            }
        }
        if let Some(context) = row.context.filter(|c| !c.trim().is_empty()) {
            entry.measurement_context = Some(context.trim().to_string());
        }
        for tag in row.tags.as_deref().map(split_tags).unwrap_or_default() {
            if !entry.tags.contains(&tag) {
                entry.tags.push(tag);
            }
        }
    }

    by_date.into_values().collect()
}

pub fn read_csv_entries(path: &Path) -> anyhow::Result<Vec<Entry>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        rows.push(result?);
    }
    Ok(entries_from_rows(rows))
}

/// Reads a JSON array of entries. Elements that are not entries, or whose
/// date does not parse, are skipped with a warning.
pub fn read_json_entries(path: &Path) -> anyhow::Result<Vec<Entry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array", path.display()))?;

    let mut entries = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let entry = match serde_json::from_value::<Entry>(value) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(index, %err, "skipping malformed entry");
                continue;
            }
        };
        if parse_entry_date(&entry.date_of_entry).is_none() {
            warn!(index, date = %entry.date_of_entry, "skipping entry without a valid date");
            continue;
        }
        entries.push(entry);
    }

    Ok(entries)
}
