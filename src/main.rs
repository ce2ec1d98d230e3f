use chrono::Utc;
use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use shiptrack::application::engine::TrackingEngine;
use shiptrack::application::views::TrackingTimeline;
use shiptrack::config::EngineConfig;
use shiptrack::domain::ports::ShipmentStoreBox;
use shiptrack::infrastructure::clock::ManualClock;
use shiptrack::infrastructure::in_memory::InMemoryShipmentStore;
use shiptrack::interfaces::csv::operation_reader::OperationReader;
use shiptrack::interfaces::csv::shipment_writer::ShipmentWriter;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// One summary row per shipment.
    Csv,
    /// The merged tracking timeline of every shipment.
    Json,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Retries after a concurrent write before an operation fails
    #[arg(long, env = "SHIPTRACK_MAX_CONFLICT_RETRIES", default_value_t = 3)]
    max_conflict_retries: u32,

    /// Contact shown to customers in payment instructions
    #[arg(long, env = "SHIPTRACK_PAYMENT_CONTACT")]
    payment_contact: Option<String>,
}

fn open_store(db_path: Option<PathBuf>) -> Result<ShipmentStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = shiptrack::infrastructure::rocksdb::RocksDBStore::open(path)
                .into_diagnostic()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
            );
            Ok(Box::new(InMemoryShipmentStore::new()))
        }
        None => Ok(Box::new(InMemoryShipmentStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::default().with_max_conflict_retries(cli.max_conflict_retries);
    if let Some(contact) = cli.payment_contact {
        config = config.with_payment_contact(contact);
    }

    // Replayed operations are stamped with their own `at` column, not the wall clock.
    let clock = ManualClock::new(Utc::now());
    let engine = TrackingEngine::new(open_store(cli.db_path)?)
        .with_clock(Arc::new(clock.clone()))
        .with_config(config.clone());

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for (line, op_result) in reader.operations().enumerate() {
        match op_result {
            Ok(operation) => {
                if let Some(at) = operation.at {
                    clock.set(at);
                }
                let tracking_number = operation.command.tracking_number().clone();
                if let Err(e) = engine.execute(operation.command).await {
                    error!(
                        line = line + 1,
                        %tracking_number,
                        kind = ?e.kind(),
                        "Error processing operation: {e}"
                    );
                }
            }
            Err(e) => {
                warn!(line = line + 1, "Error reading operation: {e}");
            }
        }
    }

    let shipments = engine.into_results().await.into_diagnostic()?;

    let stdout = io::stdout();
    match cli.format {
        OutputFormat::Csv => {
            let mut writer = ShipmentWriter::new(stdout.lock());
            writer.write_shipments(&shipments).into_diagnostic()?;
        }
        OutputFormat::Json => {
            let timelines: Vec<TrackingTimeline> = shipments
                .iter()
                .map(|record| TrackingTimeline::from_record(record, &config))
                .collect();
            let mut out = stdout.lock();
            serde_json::to_writer_pretty(&mut out, &timelines).into_diagnostic()?;
            writeln!(out).into_diagnostic()?;
        }
    }

    Ok(())
}
