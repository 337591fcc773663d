use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Bounds, Entry, EntryAnalyticsSummary, ThresholdMap};
use crate::plain::ToPlainMapping;
use crate::series::parse_entry_date;
use crate::source;
use crate::thresholds::{merge_thresholds, thresholds_from_value};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const UPSERT_ENTRY: &str = r#"
    INSERT INTO health_analytics.entries
    (id, date_of_entry, basic_data, medical_record, measurement_context, tags, personalized_thresholds)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (date_of_entry) DO UPDATE
    SET basic_data = health_analytics.entries.basic_data || EXCLUDED.basic_data,
        medical_record = health_analytics.entries.medical_record || EXCLUDED.medical_record,
        measurement_context = COALESCE(EXCLUDED.measurement_context, health_analytics.entries.measurement_context),
        tags = ARRAY(SELECT DISTINCT unnest(health_analytics.entries.tags || EXCLUDED.tags)),
        personalized_thresholds = health_analytics.entries.personalized_thresholds || EXCLUDED.personalized_thresholds
    "#;

/// Inserts the entry, or merges its buckets into the stored entry for the
/// same date.
pub async fn upsert_entry<'e, E>(executor: E, entry: &Entry) -> anyhow::Result<bool>
where
    E: PgExecutor<'e>,
{
    let date = parse_entry_date(&entry.date_of_entry)
        .with_context(|| format!("invalid entry date {:?}", entry.date_of_entry))?;

    let result = sqlx::query(UPSERT_ENTRY)
        .bind(Uuid::new_v4())
        .bind(date)
        .bind(Json(&entry.basic_data))
        .bind(Json(&entry.medical_record))
        .bind(entry.measurement_context.as_deref())
        .bind(&entry.tags)
        .bind(Json(&entry.personalized_thresholds))
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let mut entries = vec![
        Entry::new("2026-02-02")
            .with_basic("weight", 91.4)
            .with_basic("sleep", "6h 10m")
            .with_basic("steps", 6400.0)
            .with_medical("bloodPressure", "138/88"),
        Entry::new("2026-02-03")
            .with_basic("weight", 91.1)
            .with_basic("sleep", "7h 05m")
            .with_basic("steps", 8200.0)
            .with_medical("bloodPressure", "134/86"),
        Entry::new("2026-02-04")
            .with_basic("weight", 90.6)
            .with_basic("sleep", "7h 40m")
            .with_basic("steps", 10150.0)
            .with_medical("bloodPressure", "129/82")
            .with_medical("glucose", "104 mg/dl"),
    ];
    entries[0].measurement_context = Some("morning".to_string());
    entries[2].tags = vec!["lab".to_string()];
    entries[2]
        .personalized_thresholds
        .insert("weight".to_string(), Bounds::new(None, Some(92.0)));

    for entry in &entries {
        upsert_entry(pool, entry).await?;
    }
    info!(count = entries.len(), "seeded entries");

    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub written: usize,
    pub skipped: usize,
}

/// Splits off entries whose date cannot be stored, logging each one.
fn partition_importable(entries: &[Entry]) -> (Vec<&Entry>, usize) {
    let mut importable = Vec::with_capacity(entries.len());
    let mut skipped = 0usize;

    for entry in entries {
        if parse_entry_date(&entry.date_of_entry).is_some() {
            importable.push(entry);
        } else {
            warn!(date = %entry.date_of_entry, "skipping entry with invalid date");
            skipped += 1;
        }
    }

    (importable, skipped)
}

/// Upserts every entry with a valid date in one transaction. Nothing is
/// written if any upsert fails.
pub async fn import_entries(pool: &PgPool, entries: &[Entry]) -> anyhow::Result<ImportOutcome> {
    let (importable, skipped) = partition_importable(entries);
    let mut tx = pool.begin().await?;
    let mut written = 0usize;

    for entry in importable {
        if upsert_entry(&mut *tx, entry).await? {
            written += 1;
        }
    }

    tx.commit().await?;
    info!(written, skipped, "imported entries");
    Ok(ImportOutcome { written, skipped })
}

pub async fn import_csv(pool: &PgPool, path: &Path) -> anyhow::Result<ImportOutcome> {
    let entries = source::read_csv_entries(path)?;
    import_entries(pool, &entries).await
}

fn stored_thresholds(date: NaiveDate, value: serde_json::Value) -> ThresholdMap {
    thresholds_from_value(value).unwrap_or_else(|err| {
        warn!(%date, %err, "ignoring malformed personalized thresholds");
        ThresholdMap::new()
    })
}

pub async fn fetch_entries(
    pool: &PgPool,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> anyhow::Result<Vec<Entry>> {
    let rows = sqlx::query(
        "SELECT date_of_entry, basic_data, medical_record, measurement_context, tags, \
         personalized_thresholds \
         FROM health_analytics.entries \
         WHERE ($1::date IS NULL OR date_of_entry >= $1) \
         AND ($2::date IS NULL OR date_of_entry <= $2) \
         ORDER BY date_of_entry",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::new();

    for row in rows {
        let date: NaiveDate = row.get("date_of_entry");
        let basic: serde_json::Value = row.get("basic_data");
        let medical: serde_json::Value = row.get("medical_record");

        entries.push(Entry {
            date_of_entry: date.format("%Y-%m-%d").to_string(),
            basic_data: basic.to_plain_mapping(),
            medical_record: medical.to_plain_mapping(),
            measurement_context: row.get("measurement_context"),
            tags: row.get("tags"),
            personalized_thresholds: stored_thresholds(date, row.get("personalized_thresholds")),
        });
    }

    Ok(entries)
}

/// Merges the personalized bounds stored in the range, oldest first, so the
/// latest entry's bound wins.
pub async fn fetch_personalized_thresholds(
    pool: &PgPool,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> anyhow::Result<ThresholdMap> {
    let rows = sqlx::query(
        "SELECT date_of_entry, personalized_thresholds \
         FROM health_analytics.entries \
         WHERE ($1::date IS NULL OR date_of_entry >= $1) \
         AND ($2::date IS NULL OR date_of_entry <= $2) \
         AND personalized_thresholds <> '{}'::jsonb \
         ORDER BY date_of_entry",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let maps: Vec<ThresholdMap> = rows
        .into_iter()
        .map(|row| stored_thresholds(row.get("date_of_entry"), row.get("personalized_thresholds")))
        .collect();

    Ok(merge_thresholds(&maps))
}

pub async fn store_entry_summaries(
    pool: &PgPool,
    summaries: &[EntryAnalyticsSummary],
) -> anyhow::Result<u64> {
    let mut tx = pool.begin().await?;
    let mut updated = 0u64;

    for summary in summaries {
        let Some(date) = parse_entry_date(&summary.date_of_entry) else {
            continue;
        };
        let result = sqlx::query(
            "UPDATE health_analytics.entries SET analytics_summary = $2 WHERE date_of_entry = $1",
        )
        .bind(date)
        .bind(Json(summary))
        .execute(&mut *tx)
        .await?;
        updated += result.rows_affected();
    }

    tx.commit().await?;
    Ok(updated)
}
