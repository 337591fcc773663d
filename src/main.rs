use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use health_analytics::analytics::{derive_analytics, summarize_entries, AnalyticsOptions};
use health_analytics::config::Config;
use health_analytics::models::{AnalyticsReport, Entry, ThresholdMap};
use health_analytics::series::parse_entry_date;
use health_analytics::thresholds::{load_threshold_file, merge_thresholds};
use health_analytics::{binfit, db, report, source};

#[derive(Parser)]
#[command(name = "health-analytics")]
#[command(about = "Trends, rolling averages and threshold alerts for daily health entries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("source")
        .args(["from_json", "from_csv"])
        .multiple(false)
))]
struct Selection {
    /// First date to include (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last date to include (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Rolling average window, clamped to 2..=30
    #[arg(long)]
    window: Option<i64>,
    /// Comma-separated metric names to keep
    #[arg(long, value_delimiter = ',')]
    metrics: Vec<String>,
    /// JSON file with threshold overrides
    #[arg(long)]
    thresholds: Option<PathBuf>,
    /// Read entries from a JSON array instead of the database
    #[arg(long)]
    from_json: Option<PathBuf>,
    /// Read entries from a CSV file instead of the database
    #[arg(long)]
    from_csv: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import entries from a CSV or JSON file
    #[command(group(
        ArgGroup::new("input")
            .args(["csv", "json"])
            .required(true)
            .multiple(false)
    ))]
    Import {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Derive analytics and print them as JSON
    Analyze {
        #[command(flatten)]
        selection: Selection,
        /// Write the JSON here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Skip the snapshot file and per-entry summary updates
        #[arg(long)]
        no_persist: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Pick a box for a JSON pack request
    Pack {
        #[arg(long)]
        request: PathBuf,
    },
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

struct Loaded {
    entries: Vec<Entry>,
    personalized: ThresholdMap,
    pool: Option<PgPool>,
}

impl Loaded {
    fn from_file(entries: Vec<Entry>) -> Self {
        let personalized =
            merge_thresholds(entries.iter().map(|entry| &entry.personalized_thresholds));
        Self {
            entries,
            personalized,
            pool: None,
        }
    }
}

async fn load_entries(config: &Config, selection: &Selection) -> anyhow::Result<Loaded> {
    if let (Some(start), Some(end)) = (selection.start, selection.end) {
        anyhow::ensure!(start <= end, "start date cannot be after the end date");
    }

    let in_range = |entries: Vec<Entry>| -> Vec<Entry> {
        entries
            .into_iter()
            .filter(|entry| {
                let Some(date) = parse_entry_date(&entry.date_of_entry) else {
                    return true;
                };
                selection.start.is_none_or(|start| date >= start)
                    && selection.end.is_none_or(|end| date <= end)
            })
            .collect()
    };

    if let Some(path) = &selection.from_json {
        return Ok(Loaded::from_file(in_range(source::read_json_entries(path)?)));
    }
    if let Some(path) = &selection.from_csv {
        return Ok(Loaded::from_file(in_range(source::read_csv_entries(path)?)));
    }

    let pool = connect(config).await?;
    let entries = db::fetch_entries(&pool, selection.start, selection.end).await?;
    let personalized =
        db::fetch_personalized_thresholds(&pool, selection.start, selection.end).await?;
    Ok(Loaded {
        entries,
        personalized,
        pool: Some(pool),
    })
}

fn analytics_options(
    config: &Config,
    selection: &Selection,
    personalized: &ThresholdMap,
) -> anyhow::Result<AnalyticsOptions> {
    let overrides = match &selection.thresholds {
        Some(path) => load_threshold_file(path)?,
        None => Default::default(),
    };

    Ok(AnalyticsOptions {
        window_size: selection.window.or(config.window_size),
        metric_filter: Some(selection.metrics.clone()),
        thresholds: merge_thresholds([personalized, &overrides]),
        ..AnalyticsOptions::default()
    })
}

async fn persist(
    config: &Config,
    pool: Option<&PgPool>,
    selection: &Selection,
    entries: &[Entry],
    analytics: &AnalyticsReport,
) {
    if let Err(err) = report::write_snapshot(
        &config.snapshot_path,
        analytics,
        selection.start,
        selection.end,
    ) {
        warn!(error = %err, "failed to persist analytics snapshot");
    }

    let Some(pool) = pool else {
        return;
    };
    let summaries = summarize_entries(entries, analytics, Utc::now());
    match db::store_entry_summaries(pool, &summaries).await {
        Ok(updated) => info!(updated, "stored per-entry analytics summaries"),
        Err(err) => warn!(error = %err, "failed to update entry analytics summaries"),
    }
}

fn write_output(out: Option<&Path>, body: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, body)?;
            println!("Analytics written to {}.", path.display());
        }
        None => println!("{body}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv, json } => {
            let pool = connect(&config).await?;
            let (outcome, path) = match (csv, json) {
                (Some(path), _) => (db::import_csv(&pool, &path).await?, path),
                (None, Some(path)) => {
                    let entries = source::read_json_entries(&path)?;
                    (db::import_entries(&pool, &entries).await?, path)
                }
                (None, None) => anyhow::bail!("either --csv or --json is required"),
            };
            println!(
                "Upserted {} entries from {} ({} skipped).",
                outcome.written,
                path.display(),
                outcome.skipped
            );
        }
        Commands::Analyze {
            selection,
            out,
            no_persist,
        } => {
            let Loaded {
                entries,
                personalized,
                pool,
            } = load_entries(&config, &selection).await?;
            if entries.is_empty() {
                println!("No entries found for this range.");
                return Ok(());
            }

            let options = analytics_options(&config, &selection, &personalized)?;
            let analytics = derive_analytics(&entries, &options);
            info!(
                metrics = analytics.metric_summaries.len(),
                alerts = analytics.alerts.len(),
                window = analytics.window_size,
                "derived analytics"
            );

            if !no_persist {
                persist(&config, pool.as_ref(), &selection, &entries, &analytics).await;
            }

            let body = serde_json::to_string_pretty(&analytics)?;
            write_output(out.as_deref(), &body)?;
        }
        Commands::Report {
            selection,
            label,
            out,
        } => {
            let loaded = load_entries(&config, &selection).await?;
            let options = analytics_options(&config, &selection, &loaded.personalized)?;
            let analytics = derive_analytics(&loaded.entries, &options);
            let report = report::build_report(
                label.as_deref(),
                selection.start,
                selection.end,
                &analytics,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Pack { request } => {
            let raw = std::fs::read_to_string(&request)
                .with_context(|| format!("failed to read {}", request.display()))?;
            let request: binfit::PackRequest =
                serde_json::from_str(&raw).context("malformed pack request")?;
            let outcome = binfit::pack(&request)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}
