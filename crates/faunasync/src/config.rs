//! Configuration for a mirror site
//!
//! One TOML file describes one mirror: where the remote service lives, the
//! credentials to reach it, where records land on disk, and the tuning knobs
//! for the adaptive scanner. Missing fields fall back to defaults, so a
//! minimal file only needs the connection section.

use chrono::{DateTime, NaiveDate, Utc};
use faunasync_client::{HttpTransportConfig, Query};
use faunasync_engine::{ScanBounds, Tuning};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for one mirror site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Short name of this mirror instance, used in log lines
    #[serde(default = "default_site")]
    pub site: String,

    /// Base URL of the remote service API
    pub base_url: String,

    /// Account email for authenticated requests
    pub user_email: String,

    /// Account password for authenticated requests
    pub user_pw: String,

    /// Per-site API key
    pub client_key: String,

    /// Root directory for the file-backed store
    #[serde(default = "default_store_root")]
    pub store_root: PathBuf,

    /// Attempts per request before giving up
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,

    #[serde(default)]
    pub tuning: TuningConfig,

    #[serde(default)]
    pub filter: FilterConfig,
}

/// Knobs for the window-sizing controller and the paginator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    #[serde(default = "default_max_list_length")]
    pub max_list_length: usize,
    #[serde(default = "default_pid_kp")]
    pub pid_kp: f64,
    #[serde(default = "default_pid_ki")]
    pub pid_ki: f64,
    #[serde(default = "default_pid_kd")]
    pub pid_kd: f64,
    #[serde(default = "default_pid_setpoint")]
    pub pid_setpoint: f64,
    #[serde(default = "default_pid_limit_min")]
    pub pid_limit_min: f64,
    #[serde(default = "default_pid_limit_max")]
    pub pid_limit_max: f64,
    #[serde(default = "default_pid_delta_days")]
    pub pid_delta_days: i64,
}

/// What subset of the remote dataset this mirror carries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Group names never synchronized
    #[serde(default)]
    pub taxo_exclude: Vec<String>,

    /// Narrow full scans to these territorial units, one pass each.
    /// Empty means one unfiltered pass per window.
    #[serde(default)]
    pub territorial_unit_ids: Vec<String>,

    /// Oldest date a full scan reaches back to (default: exhaustive)
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Newest date a full scan starts from (default: today)
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    /// Which date axis windows slice over: "sighting" or "entry"
    #[serde(default = "default_type_date")]
    pub type_date: String,
}

fn default_site() -> String {
    "faunasync".to_string()
}

fn default_store_root() -> PathBuf {
    dirs_fallback().join("store")
}

fn dirs_fallback() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".faunasync")
}

fn default_max_retry() -> u32 {
    5
}

fn default_max_chunks() -> usize {
    10
}

fn default_max_list_length() -> usize {
    100
}

fn default_pid_kp() -> f64 {
    0.2
}

fn default_pid_ki() -> f64 {
    0.003
}

fn default_pid_kd() -> f64 {
    0.0
}

fn default_pid_setpoint() -> f64 {
    10_000.0
}

fn default_pid_limit_min() -> f64 {
    1.0
}

fn default_pid_limit_max() -> f64 {
    45.0
}

fn default_pid_delta_days() -> i64 {
    15
}

fn default_type_date() -> String {
    "sighting".to_string()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            taxo_exclude: Vec::new(),
            territorial_unit_ids: Vec::new(),
            start_date: None,
            end_date: None,
            type_date: default_type_date(),
        }
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            max_chunks: default_max_chunks(),
            max_list_length: default_max_list_length(),
            pid_kp: default_pid_kp(),
            pid_ki: default_pid_ki(),
            pid_kd: default_pid_kd(),
            pid_setpoint: default_pid_setpoint(),
            pid_limit_min: default_pid_limit_min(),
            pid_limit_max: default_pid_limit_max(),
            pid_delta_days: default_pid_delta_days(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SyncConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            base_url: self.base_url.clone(),
            user_email: self.user_email.clone(),
            user_pw: self.user_pw.clone(),
            client_key: self.client_key.clone(),
            max_retry: self.max_retry,
        }
    }

    pub fn engine_tuning(&self) -> Tuning {
        Tuning {
            max_chunks: self.tuning.max_chunks,
            max_list_length: self.tuning.max_list_length,
            pid_kp: self.tuning.pid_kp,
            pid_ki: self.tuning.pid_ki,
            pid_kd: self.tuning.pid_kd,
            pid_setpoint: self.tuning.pid_setpoint,
            pid_limit_min: self.tuning.pid_limit_min,
            pid_limit_max: self.tuning.pid_limit_max,
            pid_delta_days: self.tuning.pid_delta_days,
        }
    }

    pub fn scan_bounds(&self) -> ScanBounds {
        ScanBounds {
            end_date: self.filter.end_date.map(midnight_utc),
            floor_date: self.filter.start_date.map(midnight_utc),
        }
    }

    /// One sub-filter per configured territorial unit, plus the date axis.
    /// With no units configured, a single pass still carries the date axis.
    ///
    /// The wire encodes the axis as `entry_date`: "1" windows over the date
    /// the record entered the system, "0" over the sighting date.
    pub fn sub_filters(&self) -> Vec<Query> {
        let entry_date = if self.filter.type_date == "entry" { "1" } else { "0" };
        let mut base = Query::new();
        base.insert(
            "entry_date".to_string(),
            serde_json::Value::String(entry_date.to_string()),
        );
        if self.filter.territorial_unit_ids.is_empty() {
            return vec![base];
        }
        self.filter
            .territorial_unit_ids
            .iter()
            .map(|unit| {
                let mut query = base.clone();
                query.insert(
                    "territorial_unit_ids".to_string(),
                    serde_json::json!([unit]),
                );
                query
            })
            .collect()
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).unwrap(), Utc)
}
