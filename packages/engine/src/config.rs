//! Configuration types for loading and the bundled domains.

/// Settings shared by every [`BatchLoader`](crate::loader::BatchLoader) step.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Pending writes that trigger an automatic batch commit.
    pub batch_threshold: usize,
    /// Samples an average needs before it is published to a ranking.
    pub min_sample_count: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_threshold: 5_000,
            min_sample_count: 1,
        }
    }
}

/// Settings for the sensor telemetry domain.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Readings below this voltage raise a low-battery alert.
    pub low_battery_volts: f64,
    /// Maximum number of alerts kept in `sensor:alerts`, newest first.
    pub alert_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            low_battery_volts: 2.0,
            alert_capacity: 1_000,
        }
    }
}
