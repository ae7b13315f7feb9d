//! Sensor telemetry domain.
//!
//! Key layout:
//!
//! | Key                        | Kind       | Holds                                   |
//! |----------------------------|------------|-----------------------------------------|
//! | `sensor:{id}`              | record     | position, type, status                  |
//! | `sensor:{id}:readings`     | ranked set | encoded [`Reading`]s by epoch seconds   |
//! | `sensor:{id}:latest`       | record     | fields of the newest reading            |
//! | `sensor:all`               | set        | sensor ids                              |
//! | `sensor:status:{status}`   | set        | sensor ids                              |
//! | `sensor:avg:temperature`   | ranked set | sensor id by mean temperature           |
//! | `sensor:alerts`            | list       | alert messages, newest first, capped    |

use std::path::Path;
use std::sync::Arc;

use kvdex_core::keys::owned_key;
use kvdex_core::{Fields, ScoredEntry};
use serde::{Deserialize, Serialize};

use super::{open_source, DomainResult};
use crate::client::{StoreClient, WriteOp};
use crate::config::TelemetryConfig;
use crate::consistency::{CategoryChange, EntityIndex, EntitySchema};
use crate::index::{RankingIndex, TimeSeries};
use crate::loader::{
    Averages, BatchLoader, EntityRows, LoadError, LoadReport, Latest, Row, RowError, RowHandler,
};

pub const AVG_TEMPERATURE: &str = "sensor:avg:temperature";
pub const ALERTS: &str = "sensor:alerts";

pub const SENSORS_FILE: &str = "sensors.jsonl";
pub const READINGS_FILE: &str = "readings.jsonl";

const TEMPERATURE_RANGE: (f64, f64) = (-40.0, 60.0);
const HUMIDITY_RANGE: (f64, f64) = (0.0, 100.0);
const VOLTAGE_RANGE: (f64, f64) = (0.0, 3.5);

#[must_use]
pub fn sensor_schema() -> EntitySchema {
    EntitySchema::new("sensor")
        .partition_by_field("status")
        .ranked_in(AVG_TEMPERATURE)
        .owns("readings")
        .owns("latest")
}

fn readings_key(sensor_id: &str) -> String {
    owned_key("sensor", sensor_id, "readings")
}

fn latest_key(sensor_id: &str) -> String {
    owned_key("sensor", sensor_id, "latest")
}

/// One measurement, stored as a member of `sensor:{id}:readings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
    pub light: f64,
    pub voltage: f64,
    /// Epoch seconds.
    pub timestamp: f64,
}

impl Reading {
    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("temperature", self.temperature)
            .with("humidity", self.humidity)
            .with("light", self.light)
            .with("voltage", self.voltage)
            .with("timestamp", self.timestamp)
    }

    fn from_fields(fields: &Fields) -> Option<Self> {
        Some(Self {
            temperature: fields.parse("temperature")?,
            humidity: fields.parse("humidity")?,
            light: fields.parse("light")?,
            voltage: fields.parse("voltage")?,
            timestamp: fields.parse("timestamp")?,
        })
    }

    fn alert(&self, sensor_id: &str) -> String {
        format!(
            "Low battery on sensor {sensor_id}: {}V at {}",
            self.voltage, self.timestamp
        )
    }
}

// ---------------------------------------------------------------------------
// Row handlers
// ---------------------------------------------------------------------------

fn text_or<'a>(row: &'a Row, column: &str, default: &'a str) -> &'a str {
    row.get(column)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}

/// `sensors.jsonl`: `mote_id`, optional `pos_x`, `pos_y`, `type` (default
/// `Mica2`), `status` (default `active`). Blank text counts as absent.
///
/// # Errors
///
/// [`RowError::Unparsable`] for a non-numeric position.
pub fn sensor_fields(row: &Row) -> Result<Fields, RowError> {
    Ok(Fields::new()
        .with("pos_x", row.optional::<f64>("pos_x")?.unwrap_or(0.0))
        .with("pos_y", row.optional::<f64>("pos_y")?.unwrap_or(0.0))
        .with("type", text_or(row, "type", "Mica2"))
        .with("status", text_or(row, "status", "active")))
}

/// `readings.jsonl`: `mote_id`, `timestamp`, `temperature`, `humidity`, `light`, `voltage`.
///
/// Appends each valid reading to the sensor's time series. After the pass it
/// publishes the latest reading per sensor, the average-temperature ranking
/// (sensors with at least `min_sample_count` readings), and the low-battery
/// alerts seen during this load. The previous alert list is always replaced,
/// so a load without low-battery readings leaves it empty.
pub struct ReadingRows {
    series: TimeSeries<Reading>,
    config: TelemetryConfig,
    min_sample_count: u64,
    averages: Averages,
    latest: Latest<Reading>,
    alerts: Vec<String>,
}

impl ReadingRows {
    #[must_use]
    pub fn new(series: TimeSeries<Reading>, config: TelemetryConfig, min_sample_count: u64) -> Self {
        Self {
            series,
            config,
            min_sample_count,
            averages: Averages::new(),
            latest: Latest::new(),
            alerts: Vec::new(),
        }
    }
}

impl RowHandler for ReadingRows {
    fn handle(&mut self, row: &Row, ops: &mut Vec<WriteOp>) -> Result<(), RowError> {
        let id = row.required("mote_id")?;
        let reading = Reading {
            temperature: RowError::check_range(
                "temperature",
                row.parse("temperature")?,
                TEMPERATURE_RANGE.0,
                TEMPERATURE_RANGE.1,
            )?,
            humidity: RowError::check_range(
                "humidity",
                row.parse("humidity")?,
                HUMIDITY_RANGE.0,
                HUMIDITY_RANGE.1,
            )?,
            light: row.optional("light")?.unwrap_or(0.0),
            voltage: RowError::check_range("voltage", row.parse("voltage")?, VOLTAGE_RANGE.0, VOLTAGE_RANGE.1)?,
            timestamp: row.parse("timestamp")?,
        };

        ops.push(self.series.record_op(&readings_key(id), &reading, reading.timestamp)?);

        self.averages.add(id, reading.temperature);
        if reading.voltage < self.config.low_battery_volts && self.alerts.len() < self.config.alert_capacity {
            self.alerts.push(reading.alert(id));
        }
        self.latest.offer(id, reading.timestamp, reading);
        Ok(())
    }

    fn finish(&mut self, ops: &mut Vec<WriteOp>) -> Result<(), LoadError> {
        for (id, reading) in self.latest.finalize() {
            ops.push(WriteOp::SetFields {
                key: latest_key(&id),
                fields: reading.to_fields(),
            });
        }
        for (id, mean) in self.averages.finalize(self.min_sample_count) {
            ops.push(WriteOp::RankedAdd {
                key: AVG_TEMPERATURE.to_string(),
                member: id,
                score: mean,
            });
        }
        ops.push(WriteOp::Delete {
            key: ALERTS.to_string(),
        });
        ops.extend(std::mem::take(&mut self.alerts).into_iter().map(|alert| WriteOp::PushFront {
            key: ALERTS.to_string(),
            value: alert,
        }));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// CRUD, time-series and ranking queries over sensors.
#[derive(Clone)]
pub struct Telemetry {
    client: Arc<dyn StoreClient>,
    config: TelemetryConfig,
    sensors: EntityIndex,
    series: TimeSeries<Reading>,
    rankings: RankingIndex,
}

impl Telemetry {
    #[must_use]
    pub fn new(client: Arc<dyn StoreClient>, config: TelemetryConfig) -> Self {
        Self {
            sensors: EntityIndex::new(Arc::clone(&client), sensor_schema()),
            series: TimeSeries::new(Arc::clone(&client)),
            rankings: RankingIndex::new(Arc::clone(&client)),
            config,
            client,
        }
    }

    #[must_use]
    pub fn sensors(&self) -> &EntityIndex {
        &self.sensors
    }

    /// Imports `sensors.jsonl` then `readings.jsonl` from `data_dir`.
    ///
    /// # Errors
    ///
    /// Store failures and unreadable files abort the import.
    pub async fn import_all(&self, loader: &BatchLoader, data_dir: &Path) -> Result<Vec<LoadReport>, LoadError> {
        let mut sensors = EntityRows::new(self.sensors.clone(), "mote_id", sensor_fields);
        let sensors = loader.load("sensors", open_source(data_dir, SENSORS_FILE)?, &mut sensors).await?;

        let mut readings = ReadingRows::new(
            self.series.clone(),
            self.config.clone(),
            loader.config().min_sample_count,
        );
        let readings = loader.load("readings", open_source(data_dir, READINGS_FILE)?, &mut readings).await?;

        Ok(vec![sensors, readings])
    }

    /// Registers an active sensor.
    ///
    /// # Errors
    ///
    /// Store failures, or an empty id.
    pub async fn create_sensor(&self, sensor_id: &str, pos_x: f64, pos_y: f64, kind: &str) -> DomainResult<()> {
        let fields = Fields::new()
            .with("pos_x", pos_x)
            .with("pos_y", pos_y)
            .with("type", kind)
            .with("status", "active");
        self.sensors.create(sensor_id, &fields).await?;
        Ok(())
    }

    /// Appends a reading, refreshes the latest snapshot, and raises a
    /// low-battery alert when due.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn add_reading(&self, sensor_id: &str, reading: &Reading) -> DomainResult<()> {
        self.series
            .record(&readings_key(sensor_id), reading, reading.timestamp)
            .await?;

        let latest = self.latest_reading(sensor_id).await?;
        if latest.map_or(true, |current| current.timestamp <= reading.timestamp) {
            self.client
                .set_fields(&latest_key(sensor_id), &reading.to_fields())
                .await?;
        }

        if reading.voltage < self.config.low_battery_volts {
            self.client.push_front(ALERTS, &reading.alert(sensor_id)).await?;
            if let Some(stop) = self.config.alert_capacity.checked_sub(1) {
                let stop = i64::try_from(stop).unwrap_or(i64::MAX);
                self.client.list_trim(ALERTS, 0, stop).await?;
            }
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn get_sensor(&self, sensor_id: &str) -> DomainResult<Fields> {
        Ok(self.sensors.get(sensor_id).await?)
    }

    /// The newest reading, `None` if the sensor has none.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn latest_reading(&self, sensor_id: &str) -> DomainResult<Option<Reading>> {
        let fields = self.client.get_fields(&latest_key(sensor_id)).await?;
        Ok(Reading::from_fields(&fields))
    }

    /// Readings with `from <= timestamp <= to`, oldest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn readings_between(
        &self,
        sensor_id: &str,
        from: f64,
        to: f64,
        limit: Option<usize>,
    ) -> DomainResult<Vec<Reading>> {
        let readings = self
            .series
            .between(&readings_key(sensor_id), from, to, limit)
            .await?;
        Ok(readings.into_iter().map(|(reading, _)| reading).collect())
    }

    /// The `n` newest readings, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn recent_readings(&self, sensor_id: &str, n: usize) -> DomainResult<Vec<Reading>> {
        let readings = self.series.recent(&readings_key(sensor_id), n).await?;
        Ok(readings.into_iter().map(|(reading, _)| reading).collect())
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn reading_count(&self, sensor_id: &str) -> DomainResult<usize> {
        Ok(self.series.count(&readings_key(sensor_id)).await?)
    }

    /// Drops readings at or before `before`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn prune_readings(&self, sensor_id: &str, before: f64) -> DomainResult<usize> {
        let removed = self
            .series
            .prune_before(&readings_key(sensor_id), before)
            .await?;
        tracing::debug!(sensor_id, removed, "old readings pruned");
        Ok(removed)
    }

    /// Moves the sensor between `sensor:status:*` partitions.
    ///
    /// # Errors
    ///
    /// Unknown sensor; store failures.
    pub async fn update_status(&self, sensor_id: &str, status: &str) -> DomainResult<CategoryChange> {
        Ok(self.sensors.change_category(sensor_id, "status", status).await?)
    }

    /// Moves the sensor without touching any index.
    ///
    /// # Errors
    ///
    /// Unknown sensor; store failures.
    pub async fn update_position(&self, sensor_id: &str, pos_x: f64, pos_y: f64) -> DomainResult<()> {
        let fields = Fields::new().with("pos_x", pos_x).with("pos_y", pos_y);
        self.sensors.update(sensor_id, &fields).await?;
        Ok(())
    }

    /// Deletes the sensor with its readings and latest snapshot.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn delete_sensor(&self, sensor_id: &str) -> DomainResult<bool> {
        Ok(self.sensors.delete(sensor_id).await?)
    }

    /// Sensors by mean temperature, highest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn hottest(&self, n: usize) -> DomainResult<Vec<ScoredEntry>> {
        Ok(self.rankings.top(AVG_TEMPERATURE, n).await?)
    }

    /// Sensors by mean temperature, lowest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn coldest(&self, n: usize) -> DomainResult<Vec<ScoredEntry>> {
        Ok(self.rankings.bottom(AVG_TEMPERATURE, n).await?)
    }

    /// Sensors whose mean temperature lies in `min..=max`.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn in_temperature_range(&self, min: f64, max: f64) -> DomainResult<Vec<ScoredEntry>> {
        Ok(self.rankings.score_range(AVG_TEMPERATURE, min, max, None).await?)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn recent_alerts(&self, n: usize) -> DomainResult<Vec<String>> {
        let Some(stop) = n.checked_sub(1).and_then(|s| i64::try_from(s).ok()) else {
            return Ok(Vec::new());
        };
        Ok(self.client.list_range(ALERTS, 0, stop).await?)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn alert_count(&self) -> DomainResult<usize> {
        Ok(self.client.list_len(ALERTS).await?)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn sensor_count(&self) -> DomainResult<usize> {
        Ok(self.sensors.count().await?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::client::MemoryStore;
    use crate::config::LoaderConfig;

    fn reading(temperature: f64, voltage: f64, timestamp: f64) -> Reading {
        Reading {
            temperature,
            humidity: 40.0,
            light: 100.0,
            voltage,
            timestamp,
        }
    }

    fn setup(config: TelemetryConfig) -> (Arc<MemoryStore>, Telemetry) {
        let store = Arc::new(MemoryStore::new());
        let telemetry = Telemetry::new(store.clone(), config);
        (store, telemetry)
    }

    fn sample_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut sensors = std::fs::File::create(dir.path().join(SENSORS_FILE)).unwrap();
        for id in 1..=3 {
            writeln!(sensors, r#"{{"mote_id":"{id}","pos_x":{id}.5}}"#).unwrap();
        }

        let mut readings = std::fs::File::create(dir.path().join(READINGS_FILE)).unwrap();
        for line in [
            r#"{"mote_id":"1","timestamp":100,"temperature":20,"humidity":40,"light":10,"voltage":2.7}"#,
            r#"{"mote_id":"1","timestamp":200,"temperature":22,"humidity":41,"light":11,"voltage":2.6}"#,
            r#"{"mote_id":"2","timestamp":150,"temperature":30,"humidity":35,"light":12,"voltage":1.9}"#,
            r#"{"mote_id":"2","timestamp":160,"temperature":122,"humidity":35,"light":12,"voltage":2.5}"#,
            r#"{"mote_id":"3","timestamp":170,"temperature":15,"humidity":-3,"light":12,"voltage":2.5}"#,
            r#"{"mote_id":"3","timestamp":180,"temperature":15,"humidity":30,"light":12,"voltage":4.0}"#,
            r#"{"mote_id":"3","timestamp":"soon","temperature":15,"humidity":30,"voltage":2.9}"#,
        ] {
            writeln!(readings, "{line}").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn import_validates_domains_and_publishes_aggregates() {
        let (store, telemetry) = setup(TelemetryConfig::default());
        let loader = BatchLoader::new(store.clone(), LoaderConfig::default());
        let dir = sample_dir();

        let reports = telemetry.import_all(&loader, dir.path()).await.unwrap();
        assert_eq!(reports[0].loaded, 3);
        let readings = &reports[1];
        assert_eq!(readings.loaded, 3);
        assert_eq!(readings.skipped.get("out_of_domain"), Some(&3));
        assert_eq!(readings.skipped.get("unparsable"), Some(&1));

        assert_eq!(telemetry.sensor_count().await.unwrap(), 3);
        assert_eq!(telemetry.reading_count("1").await.unwrap(), 2);
        assert_eq!(telemetry.latest_reading("1").await.unwrap().unwrap().timestamp, 200.0);

        let hottest = telemetry.hottest(1).await.unwrap();
        assert_eq!(hottest[0].id, "2");
        let coldest = telemetry.coldest(1).await.unwrap();
        assert_eq!((coldest[0].id.as_str(), coldest[0].score), ("1", 21.0));

        let alerts = telemetry.recent_alerts(10).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].contains("sensor 2"));
    }

    #[tokio::test]
    async fn reimport_does_not_duplicate_readings_or_alerts() {
        let (store, telemetry) = setup(TelemetryConfig::default());
        let loader = BatchLoader::new(store.clone(), LoaderConfig::default());
        let dir = sample_dir();

        telemetry.import_all(&loader, dir.path()).await.unwrap();
        telemetry.import_all(&loader, dir.path()).await.unwrap();

        assert_eq!(telemetry.reading_count("1").await.unwrap(), 2);
        assert_eq!(telemetry.alert_count().await.unwrap(), 1);
        assert_eq!(telemetry.sensor_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn min_sample_count_filters_the_ranking() {
        let (store, telemetry) = setup(TelemetryConfig::default());
        let loader = BatchLoader::new(
            store.clone(),
            LoaderConfig {
                min_sample_count: 2,
                ..LoaderConfig::default()
            },
        );
        telemetry.import_all(&loader, sample_dir().path()).await.unwrap();

        let ranked = telemetry.in_temperature_range(-40.0, 60.0).await.unwrap();
        let ids: Vec<&str> = ranked.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[tokio::test]
    async fn readings_window_recent_and_prune() {
        let (_, telemetry) = setup(TelemetryConfig::default());
        telemetry.create_sensor("7", 1.0, 2.0, "Mica2").await.unwrap();
        for ts in [10.0, 20.0, 30.0, 40.0] {
            telemetry.add_reading("7", &reading(ts, 2.8, ts)).await.unwrap();
        }

        let window = telemetry.readings_between("7", 15.0, 35.0, None).await.unwrap();
        assert_eq!(window, vec![reading(20.0, 2.8, 20.0), reading(30.0, 2.8, 30.0)]);

        let recent = telemetry.recent_readings("7", 1).await.unwrap();
        assert_eq!(recent, vec![reading(40.0, 2.8, 40.0)]);

        assert_eq!(telemetry.prune_readings("7", 20.0).await.unwrap(), 2);
        assert_eq!(telemetry.reading_count("7").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn late_reading_does_not_replace_latest() {
        let (_, telemetry) = setup(TelemetryConfig::default());
        telemetry.add_reading("7", &reading(25.0, 2.8, 100.0)).await.unwrap();
        telemetry.add_reading("7", &reading(10.0, 2.8, 50.0)).await.unwrap();

        let latest = telemetry.latest_reading("7").await.unwrap().unwrap();
        assert_eq!(latest, reading(25.0, 2.8, 100.0));
    }

    #[tokio::test]
    async fn alerts_are_capped_newest_first() {
        let (_, telemetry) = setup(TelemetryConfig {
            alert_capacity: 2,
            ..TelemetryConfig::default()
        });
        for ts in [1.0, 2.0, 3.0] {
            telemetry.add_reading("9", &reading(20.0, 1.5, ts)).await.unwrap();
        }

        let alerts = telemetry.recent_alerts(10).await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].ends_with("at 3"));
        assert!(alerts[1].ends_with("at 2"));
    }

    #[tokio::test]
    async fn status_change_and_delete_cascade() {
        let (store, telemetry) = setup(TelemetryConfig::default());
        telemetry.create_sensor("7", 0.0, 0.0, "Mica2").await.unwrap();
        telemetry.add_reading("7", &reading(20.0, 2.8, 1.0)).await.unwrap();
        store.ranked_add(AVG_TEMPERATURE, "7", 20.0).await.unwrap();

        let change = telemetry.update_status("7", "maintenance").await.unwrap();
        assert_eq!(change.old.as_deref(), Some("active"));
        assert_eq!(
            telemetry.sensors().count_in_category("status", "maintenance").await.unwrap(),
            1
        );

        telemetry.update_position("7", 3.0, 4.0).await.unwrap();
        assert_eq!(telemetry.get_sensor("7").await.unwrap().get("pos_x"), Some("3"));

        assert!(telemetry.delete_sensor("7").await.unwrap());
        assert_eq!(telemetry.sensor_count().await.unwrap(), 0);
        assert_eq!(
            telemetry.sensors().count_in_category("status", "maintenance").await.unwrap(),
            0
        );
        assert_eq!(telemetry.reading_count("7").await.unwrap(), 0);
        assert!(telemetry.latest_reading("7").await.unwrap().is_none());
        assert!(telemetry.hottest(5).await.unwrap().is_empty());
    }

    #[test]
    fn blank_sensor_text_falls_back_to_defaults() {
        let fields = sensor_fields(&Row::new().with("mote_id", "4").with("status", "  ").with("type", "")).unwrap();
        assert_eq!(fields.get("status"), Some("active"));
        assert_eq!(fields.get("type"), Some("Mica2"));

        let fields = sensor_fields(&Row::new().with("mote_id", "4").with("status", " dead ")).unwrap();
        assert_eq!(fields.get("status"), Some("dead"));
    }

    #[tokio::test]
    async fn blank_status_lands_in_active_partition() {
        let (store, telemetry) = setup(TelemetryConfig::default());
        let loader = BatchLoader::new(store.clone(), LoaderConfig::default());
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SENSORS_FILE), "{\"mote_id\":\"4\",\"status\":\"\"}\n").unwrap();

        telemetry.import_all(&loader, dir.path()).await.unwrap();

        let active = telemetry.sensors().in_category("status", "active").await.unwrap();
        assert_eq!(active, vec!["4"]);
        assert!(!store.exists("sensor:status:").await.unwrap());
    }

    #[tokio::test]
    async fn reimport_without_low_battery_clears_alerts() {
        let (store, telemetry) = setup(TelemetryConfig::default());
        let loader = BatchLoader::new(store.clone(), LoaderConfig::default());
        let dir = sample_dir();
        telemetry.import_all(&loader, dir.path()).await.unwrap();
        assert_eq!(telemetry.alert_count().await.unwrap(), 1);

        std::fs::write(
            dir.path().join(READINGS_FILE),
            "{\"mote_id\":\"1\",\"timestamp\":300,\"temperature\":20,\"humidity\":40,\"voltage\":2.9}\n",
        )
        .unwrap();
        telemetry.import_all(&loader, dir.path()).await.unwrap();

        assert_eq!(telemetry.alert_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reimport_with_changed_status_moves_partition() {
        let (store, telemetry) = setup(TelemetryConfig::default());
        let loader = BatchLoader::new(store.clone(), LoaderConfig::default());
        let dir = sample_dir();
        telemetry.import_all(&loader, dir.path()).await.unwrap();

        std::fs::write(
            dir.path().join(SENSORS_FILE),
            "{\"mote_id\":\"1\",\"status\":\"maintenance\"}\n",
        )
        .unwrap();
        telemetry.import_all(&loader, dir.path()).await.unwrap();

        let sensors = telemetry.sensors();
        assert_eq!(sensors.count_in_category("status", "active").await.unwrap(), 2);
        assert_eq!(sensors.in_category("status", "maintenance").await.unwrap(), vec!["1"]);
    }
}
