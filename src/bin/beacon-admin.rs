use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use beacon::analytics::{
    DailyAggregator, DateRange, ExportFormat, Exporter, MetricsMerger, RangeAggregator,
    StoreSnapshotProvider,
};
use beacon::config::{Config, DatabaseBackend};
use beacon::models::CreateWebsiteRequest;
use beacon::storage::{PostgresStorage, SqliteStorage, Storage, StorageError};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "beacon-admin")]
#[command(about = "Beacon analytics management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a website
    AddWebsite {
        id: String,
        name: String,
        domain: String,
        /// IANA timezone name, e.g. Europe/Berlin
        #[arg(long)]
        timezone: Option<String>,
    },
    /// List registered websites
    ListWebsites,
    /// Delete a website with all its sessions, page views, events and summaries
    DeleteWebsite { id: String },
    /// Aggregate one day (defaults to the website's today)
    Aggregate {
        website_id: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Aggregate every day from START to END inclusive
    AggregateRange {
        website_id: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    /// Print merged metrics as JSON
    Metrics {
        website_id: String,
        from: NaiveDate,
        to: NaiveDate,
        /// Blend in today's live figures
        #[arg(long)]
        realtime: bool,
    },
    /// Write an export to stdout
    Export {
        website_id: String,
        from: NaiveDate,
        to: NaiveDate,
        /// json or csv
        #[arg(long, default_value = "json")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    // Ensure database is initialized
    storage.init().await?;

    let analytics = config.analytics.clone();
    let daily = Arc::new(DailyAggregator::new(Arc::clone(&storage), analytics.clone()));
    let snapshots = Arc::new(StoreSnapshotProvider::new(
        Arc::clone(&storage),
        analytics.clone(),
    ));
    let merger = Arc::new(MetricsMerger::new(
        Arc::clone(&storage),
        snapshots,
        analytics.clone(),
    ));

    match cli.command {
        Commands::AddWebsite {
            id,
            name,
            domain,
            timezone,
        } => {
            let website = CreateWebsiteRequest {
                id,
                name,
                domain,
                timezone,
            }
            .into_website(&analytics.default_timezone, Utc::now().timestamp());

            match storage.create_website(&website).await {
                Ok(created) => println!(
                    "✓ Registered website '{}' ({}) in timezone {}",
                    created.id, created.domain, created.timezone
                ),
                Err(StorageError::Conflict) => {
                    bail!("website '{}' or domain '{}' already exists", website.id, website.domain)
                }
                Err(StorageError::Other(e)) => return Err(e),
            }
        }
        Commands::ListWebsites => {
            let websites = storage.list_websites().await?;
            if websites.is_empty() {
                println!("No websites registered");
            }
            for website in websites {
                println!(
                    "{}  {}  {}  {}",
                    website.id, website.domain, website.timezone, website.name
                );
            }
        }
        Commands::DeleteWebsite { id } => {
            if storage.delete_website(&id).await? {
                println!("✓ Deleted website '{}'", id);
            } else {
                bail!("website '{}' not found", id);
            }
        }
        Commands::Aggregate { website_id, date } => {
            let day = match date {
                Some(day) => day,
                None => {
                    let tz = beacon::analytics::calendar::website_timezone(
                        storage.as_ref(),
                        &website_id,
                        &analytics.default_timezone,
                    )
                    .await?;
                    beacon::analytics::calendar::today_in(tz, Utc::now())
                }
            };
            let summary = daily.aggregate(&website_id, day).await?;
            println!(
                "✓ {} {}: {} sessions, {} page views, bounce rate {}%",
                website_id, day, summary.total_sessions, summary.total_page_views, summary.bounce_rate
            );
        }
        Commands::AggregateRange {
            website_id,
            start,
            end,
        } => {
            let range = DateRange::new(start, end)?;
            let results = RangeAggregator::new(daily)
                .aggregate_range(&website_id, range.from, range.to)
                .await;
            let requested = (range.to - range.from).num_days() + 1;
            println!(
                "✓ Aggregated {} of {} days for '{}'",
                results.len(),
                requested,
                website_id
            );
        }
        Commands::Metrics {
            website_id,
            from,
            to,
            realtime,
        } => {
            let range = DateRange::new(from, to)?;
            let metrics = merger.get_metrics(&website_id, range, realtime).await?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        Commands::Export {
            website_id,
            from,
            to,
            format,
        } => {
            let format: ExportFormat = format
                .parse()
                .map_err(anyhow::Error::msg)
                .context("invalid --format")?;
            let range = DateRange::new(from, to)?;
            let exporter = Exporter::new(Arc::clone(&storage), merger, analytics);
            print!("{}", exporter.export(&website_id, range, format).await?);
        }
    }

    Ok(())
}
