//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Default model used for rescheduling recommendations.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Runtime configuration for a floor control session.
#[derive(Debug, Clone)]
pub struct FloorConfig {
    /// Pause between a recommendation arriving and its resolution alert being shown.
    pub settling_delay: Duration,
    /// Delay (minutes) reported when the engine omits `estimated_delay`.
    pub default_estimated_delay: f64,
    /// Maximum number of jobs fetched per reload, newest first.
    pub job_list_limit: usize,
    /// Maximum number of jobs fed into the analytics roll-up.
    pub analytics_job_limit: usize,
    /// The idle-machine alert fires when more than this many machines are idle.
    pub idle_machine_threshold: usize,
    /// Maximum number of alerts kept in the feed.
    pub alert_retention: usize,
    /// Maximum number of disruption records kept; resolved ones go first.
    pub disruption_retention: usize,
    /// Trailing window used for KPI trend deltas.
    pub trend_window: Duration,
    /// Target completions per hour in the throughput series.
    pub hourly_target: u32,
    /// Interval of the background reconciliation reload.
    pub reconcile_interval: Duration,
    /// HTTP/WebSocket port.
    pub http_port: u16,
    /// libSQL database path (None = in-memory store).
    pub db_path: Option<PathBuf>,
    /// Optional JSON fixture loaded into an empty store.
    pub seed_path: Option<PathBuf>,
    /// Model id for the recommendation engine.
    pub model: String,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            settling_delay: Duration::from_secs(3),
            default_estimated_delay: 15.0,
            job_list_limit: 50,
            analytics_job_limit: 100,
            idle_machine_threshold: 2,
            alert_retention: 200,
            disruption_retention: 100,
            trend_window: Duration::from_secs(24 * 3600),
            hourly_target: 12,
            reconcile_interval: Duration::from_secs(60),
            http_port: 8080,
            db_path: None,
            seed_path: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl FloorConfig {
    /// Build configuration from `FLOOR_*` environment variables.
    ///
    /// Unparseable values are logged and replaced with the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let settling_ms: u64 = env_or("FLOOR_SETTLING_DELAY_MS", 3000);
        let trend_hours: u64 = env_or("FLOOR_TREND_WINDOW_HOURS", 24);
        let reconcile_secs: u64 = env_or("FLOOR_RECONCILE_INTERVAL_SECS", 60);

        Self {
            settling_delay: Duration::from_millis(settling_ms),
            default_estimated_delay: env_or(
                "FLOOR_DEFAULT_ESTIMATED_DELAY",
                defaults.default_estimated_delay,
            ),
            job_list_limit: env_or("FLOOR_JOB_LIST_LIMIT", defaults.job_list_limit),
            analytics_job_limit: env_or("FLOOR_ANALYTICS_JOB_LIMIT", defaults.analytics_job_limit),
            idle_machine_threshold: env_or(
                "FLOOR_IDLE_MACHINE_THRESHOLD",
                defaults.idle_machine_threshold,
            ),
            alert_retention: env_or("FLOOR_ALERT_RETENTION", defaults.alert_retention).max(1),
            disruption_retention: env_or(
                "FLOOR_DISRUPTION_RETENTION",
                defaults.disruption_retention,
            )
            .max(1),
            trend_window: Duration::from_secs(trend_hours * 3600),
            hourly_target: env_or("FLOOR_HOURLY_TARGET", defaults.hourly_target),
            reconcile_interval: Duration::from_secs(reconcile_secs.max(1)),
            http_port: env_or("FLOOR_HTTP_PORT", defaults.http_port),
            db_path: std::env::var("FLOOR_DB_PATH").ok().map(PathBuf::from),
            seed_path: std::env::var("FLOOR_SEED_PATH").ok().map(PathBuf::from),
            model: std::env::var("FLOOR_MODEL").unwrap_or(defaults.model),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key = key, value = raw, "Ignoring unparseable configuration value");
            default
        }
    }
}
