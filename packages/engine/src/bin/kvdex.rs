use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kvdex_engine::domain::{Commerce, Telemetry};
use kvdex_engine::logging::{self, LogFormat};
use kvdex_engine::{BatchLoader, LoadReport, LoaderConfig, MemoryStore, TelemetryConfig};

const ABOUT: &str = "Validate JSON Lines data by importing it into an in-process multi-index store";

const LONG_ABOUT: &str = "Validate JSON Lines data by importing it into an in-process multi-index store.

The store lives in memory for the duration of the run and is discarded at exit. \
Use the run to check the data: per-step load and skip counts, entity counts and \
rankings are logged before the process ends.";

#[derive(Parser)]
#[command(author, version, about = ABOUT, long_about = LONG_ABOUT)]
struct Cli {
    /// Pending writes per batch commit.
    #[arg(long, default_value_t = 5_000, env = "KVDEX_BATCH_SIZE")]
    batch_size: usize,

    /// Samples an average needs before it is ranked.
    #[arg(long, default_value_t = 1, env = "KVDEX_MIN_SAMPLES")]
    min_samples: u64,

    /// Log output format (text or json).
    #[arg(long, default_value_t = LogFormat::Text, env = "KVDEX_LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DataDir {
    /// Directory holding the `.jsonl` files.
    #[arg(long)]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Import customers, orders, products, items, payments, reviews and sellers
    Commerce(DataDir),
    /// Import sensors and their readings
    Telemetry {
        #[command(flatten)]
        data: DataDir,
        /// Voltage under which a reading raises a low-battery alert.
        #[arg(long, default_value_t = 2.0)]
        low_battery_volts: f64,
        /// Alerts kept in `sensor:alerts`.
        #[arg(long, default_value_t = 1_000)]
        alert_capacity: usize,
    },
}

fn log_reports(reports: &[LoadReport]) {
    for report in reports {
        if report.missing {
            tracing::warn!(step = %report.step, "skipped: source not found");
            continue;
        }
        tracing::info!(
            step = %report.step,
            loaded = report.loaded,
            skipped = report.skipped_total(),
            reasons = ?report.skipped,
            commits = report.stats.commits,
            "imported"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    let store = Arc::new(MemoryStore::new());

    let loader = BatchLoader::new(
        store.clone(),
        LoaderConfig {
            batch_threshold: cli.batch_size,
            min_sample_count: cli.min_samples,
        },
    );

    match cli.command {
        Commands::Commerce(DataDir { data_dir }) => {
            let commerce = Commerce::new(store.clone());
            let reports = commerce
                .import_all(&loader, &data_dir)
                .await
                .context("commerce import failed")?;
            log_reports(&reports);

            let counts = commerce.counts().await?;
            tracing::info!(
                customers = counts.customers,
                orders = counts.orders,
                products = counts.products,
                sellers = counts.sellers,
                "entity counts"
            );
            for entry in commerce.top_selling(5).await? {
                tracing::info!(product = %entry.id, sold = entry.score, "top selling");
            }
            for entry in commerce.top_categories(5).await? {
                tracing::info!(category = %entry.id, revenue = entry.score, "top category");
            }
            if let Some(average) = commerce.average_review_score().await? {
                tracing::info!(average, "average review score");
            }
        }
        Commands::Telemetry {
            data,
            low_battery_volts,
            alert_capacity,
        } => {
            let telemetry = Telemetry::new(
                store.clone(),
                TelemetryConfig {
                    low_battery_volts,
                    alert_capacity,
                },
            );
            let reports = telemetry
                .import_all(&loader, &data.data_dir)
                .await
                .context("telemetry import failed")?;
            log_reports(&reports);

            tracing::info!(sensors = telemetry.sensor_count().await?, "sensor count");
            for entry in telemetry.hottest(5).await? {
                tracing::info!(sensor = %entry.id, avg_temperature = entry.score, "hottest");
            }
            for alert in telemetry.recent_alerts(5).await? {
                tracing::info!(%alert, "recent alert");
            }
        }
    }

    tracing::info!(keys = store.key_count(), "import finished, in-process store discarded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn help_says_the_store_is_not_persisted() {
        let command = Cli::command();
        let about = command.get_about().unwrap().to_string();
        let long_about = command.get_long_about().unwrap().to_string();
        assert!(about.contains("in-process"));
        assert!(long_about.contains("discarded at exit"));
    }

    #[test]
    fn telemetry_flags_parse() {
        let cli = Cli::try_parse_from([
            "kvdex",
            "telemetry",
            "--data-dir",
            "/tmp/data",
            "--low-battery-volts",
            "2.2",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Telemetry { low_battery_volts, alert_capacity: 1_000, .. } if (low_battery_volts - 2.2).abs() < f64::EPSILON
        ));
    }
}
