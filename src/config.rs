use std::{
    path::PathBuf,
    time::Duration,
};

/// Droplets charged per upgrade unit.
pub const UPGRADE_COST: u64 = 500;
/// Max-charge capacity granted per upgrade unit. Display only.
pub const UPGRADE_AMOUNT: u64 = 5;
/// Product id of the max-charge upgrade in the store.
pub const UPGRADE_PRODUCT_ID: u64 = 70;

pub const STALE_AFTER_MS: i64 = 30_000;
pub const TICK_INTERVAL_MS: u64 = 500;
pub const MIN_TICK_INTERVAL_MS: u64 = 500;
pub const MAX_TICK_INTERVAL_MS: u64 = 1_000;
pub const UI_REFRESH_INTERVAL_MS: i64 = 500;

pub const DEFAULT_BASE_URL: &str = "https://backend.wplace.live";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const COOKIE_ENV_VAR: &str = "CHARGE_HELPER_COOKIE";

/// Timing knobs for the refresh loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub stale_after_ms: i64,
    pub ui_refresh_interval_ms: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(TICK_INTERVAL_MS),
            stale_after_ms: STALE_AFTER_MS,
            ui_refresh_interval_ms: UI_REFRESH_INTERVAL_MS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub cookie: Option<String>,
    /// `None` waits on a response indefinitely
    pub timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cookie: None,
            timeout: Some(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelperConfig {
    pub api: ApiConfig,
    pub scheduler: SchedulerConfig,
    /// request monitoring keyword, disabled when `None`
    pub monitor: Option<String>,
    pub log_dir: PathBuf,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            scheduler: SchedulerConfig::default(),
            monitor: None,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}
