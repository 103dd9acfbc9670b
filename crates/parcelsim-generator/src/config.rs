//! Configuration for generation, queries and the CLI.
//!
//! `AppConfig` is read from YAML; every section falls back to its defaults,
//! so an empty file is a valid configuration. `GeneratorConfig` is the fully
//! resolved input for loading one container.

use crate::allocation::{AllocationConfig, FixedPartition};
use crate::error::{GenerateError, Result};
use crate::lifecycle::LifecycleParams;
use crate::payload::PayloadKind;
use crate::producer::IdFormat;
use chrono::NaiveDate;
use parcelsim_core::{Layout, PoolConfig, TimeBounds, TimeWindow};
use parcelsim_query::{LatestStrategy, TimeoutPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "parcelsim.yml";

/// Fixed partitions with their nominal monthly volumes and merchant names
const STANDARD_PARTITIONS: &[(u64, u64, &str)] = &[
    (1_000_011, 500_000, "OfficeMax New Zealand Ltd"),
    (1_000_012, 300_000, "Warehouse Stationery"),
    (1_000_013, 200_000, "Mighty Ape"),
    (1_000_014, 100_000, "PB Tech"),
    (1_000_015, 75_000, "Noel Leeming"),
    (1_000_016, 50_000, "Harvey Norman"),
    (1_000_017, 25_000, "JB Hi-Fi"),
    (1_000_018, 10_000, "Paper Plus"),
    (1_000_019, 5_000, "Whitcoulls"),
    (1_000_020, 2_000, "Farmers"),
];

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub generator: GeneratorSettings,
    pub windows: Vec<ReportingWindow>,
    pub query: QuerySettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Standard configuration: the four reporting windows and ten fixed
    /// partitions
    pub fn standard() -> Self {
        Self {
            windows: ReportingWindow::standard(),
            ..Default::default()
        }
    }

    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut config: AppConfig = serde_yaml::from_str(text)?;
        if config.windows.is_empty() {
            config.windows = ReportingWindow::standard();
        }
        Ok(config)
    }

    /// Load `path` if it exists, otherwise the standard configuration
    pub fn load_or_standard(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::standard())
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the standard configuration to `path`
    pub fn write_default(path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, Self::standard().to_yaml()?)?;
        Ok(())
    }

    /// Windows selected by label. An empty selection means all.
    pub fn select_windows(&self, labels: &[String]) -> Result<Vec<ReportingWindow>> {
        if labels.is_empty() {
            return Ok(self.windows.clone());
        }
        labels
            .iter()
            .map(|label| {
                self.windows
                    .iter()
                    .find(|w| &w.label == label)
                    .cloned()
                    .ok_or_else(|| GenerateError::InvalidConfig(format!("unknown window: {}", label)))
            })
            .collect()
    }
}

/// Generator section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub partitions: Vec<FixedPartition>,
    pub allocation: AllocationConfig,
    pub pool: PoolConfig,
    pub payload: PayloadKind,
    pub ids: IdFormat,
    pub lifecycle: LifecycleParams,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            partitions: STANDARD_PARTITIONS
                .iter()
                .map(|(id, volume, name)| FixedPartition::new(*id, *volume).with_name(*name))
                .collect(),
            allocation: AllocationConfig::default(),
            pool: PoolConfig::default(),
            payload: PayloadKind::default(),
            ids: IdFormat::default(),
            lifecycle: LifecycleParams::default(),
        }
    }
}

impl GeneratorSettings {
    /// Shrink nominal partition volumes by `factor`
    pub fn scaled(mut self, factor: f64) -> Result<Self> {
        check_scale(factor)?;
        for partition in &mut self.partitions {
            partition.monthly_volume = (partition.monthly_volume as f64 * factor).round() as u64;
        }
        Ok(self)
    }
}

fn check_scale(factor: f64) -> Result<()> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(GenerateError::InvalidConfig(format!(
            "scale factor must be positive, got {}",
            factor
        )));
    }
    Ok(())
}

/// A named reporting window and its target population
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingWindow {
    /// Container suffix, e.g. `1_week`
    pub label: String,
    pub start: NaiveDate,
    /// Last named day of the window
    pub end: NaiveDate,
    pub total_volume: u64,
}

impl ReportingWindow {
    pub fn new(label: impl Into<String>, start: NaiveDate, end: NaiveDate, total_volume: u64) -> Self {
        Self {
            label: label.into(),
            start,
            end,
            total_volume,
        }
    }

    /// The four standard windows
    pub fn standard() -> Vec<ReportingWindow> {
        let day = |m, d| NaiveDate::from_ymd_opt(2025, m, d);
        [
            ("1_week", day(3, 1), day(3, 7), 3_000_000),
            ("2_weeks", day(3, 1), day(3, 14), 6_000_000),
            ("1_month", day(3, 1), day(3, 31), 12_900_000),
            ("3_months", day(1, 1), day(3, 31), 38_600_000),
        ]
        .into_iter()
        .filter_map(|(label, start, end, total)| Some(Self::new(label, start?, end?, total)))
        .collect()
    }

    /// Generation window, midnight of the start date to midnight of the end
    /// date
    pub fn time_window(&self) -> Result<TimeWindow> {
        let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        match (midnight(self.start), midnight(self.end)) {
            (Some(start), Some(end)) => Ok(TimeWindow::new(start, end)?),
            _ => Err(GenerateError::InvalidWindow(format!(
                "{} .. {}",
                self.start, self.end
            ))),
        }
    }

    /// Whole-day query bounds covering every named day
    pub fn bounds(&self) -> Result<TimeBounds> {
        Ok(TimeBounds::whole_days(self.start, self.end)?)
    }

    /// Days named by the window, both ends included
    pub fn window_days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1).max(0) as u32
    }

    /// Container name for a layout
    pub fn container(&self, layout: Layout) -> String {
        match layout {
            Layout::AppendOnly => format!("summary_{}", self.label),
            Layout::FlatSnapshot => format!("summary_flat_{}", self.label),
        }
    }

    pub fn scaled(mut self, factor: f64) -> Result<Self> {
        check_scale(factor)?;
        self.total_volume = (self.total_volume as f64 * factor).round() as u64;
        Ok(self)
    }
}

/// Query section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub timeouts: TimeoutPolicy,
    pub strategy: LatestStrategy,
    /// Benchmark repeat count
    pub iterations: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            timeouts: TimeoutPolicy::default(),
            strategy: LatestStrategy::default(),
            iterations: 1,
        }
    }
}

/// Store section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub snapshot_path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("parcelsim.snapshot"),
        }
    }
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default directive; RUST_LOG takes precedence
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Fully resolved input for loading one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub container: String,
    pub layout: Layout,
    pub window: TimeWindow,
    /// Derived from the window when absent
    pub window_days: Option<u32>,
    pub total_volume: u64,
    pub partitions: Vec<FixedPartition>,
    pub allocation: AllocationConfig,
    pub pool: PoolConfig,
    pub payload: PayloadKind,
    pub ids: IdFormat,
    pub lifecycle: LifecycleParams,
}

impl GeneratorConfig {
    /// Create a new config with default generator settings
    pub fn new(container: impl Into<String>, layout: Layout, window: TimeWindow, total_volume: u64) -> Self {
        Self::from_settings(&GeneratorSettings::default(), container, layout, window, total_volume)
    }

    pub fn from_settings(
        settings: &GeneratorSettings,
        container: impl Into<String>,
        layout: Layout,
        window: TimeWindow,
        total_volume: u64,
    ) -> Self {
        Self {
            container: container.into(),
            layout,
            window,
            window_days: None,
            total_volume,
            partitions: settings.partitions.clone(),
            allocation: settings.allocation.clone(),
            pool: settings.pool.clone(),
            payload: settings.payload,
            ids: settings.ids.clone(),
            lifecycle: settings.lifecycle,
        }
    }

    /// Config for one reporting window
    pub fn for_window(settings: &GeneratorSettings, window: &ReportingWindow, layout: Layout) -> Result<Self> {
        let mut config = Self::from_settings(
            settings,
            window.container(layout),
            layout,
            window.time_window()?,
            window.total_volume,
        );
        config.window_days = Some(window.window_days());
        Ok(config)
    }

    pub fn with_partitions(mut self, partitions: Vec<FixedPartition>) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = Some(days);
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_payload(mut self, payload: PayloadKind) -> Self {
        self.payload = payload;
        self
    }

    pub fn effective_window_days(&self) -> u32 {
        self.window_days.unwrap_or_else(|| self.window.calendar_days())
    }

    /// Checks that do not need the allocation
    pub fn validate(&self) -> Result<()> {
        if self.container.trim().is_empty() {
            return Err(GenerateError::InvalidConfig(
                "container name must not be empty".to_string(),
            ));
        }
        if self.effective_window_days() == 0 {
            return Err(GenerateError::InvalidWindow(
                "window must cover at least one day".to_string(),
            ));
        }
        self.lifecycle.validate()
    }
}
