use std::str::FromStr;
use std::time::Duration;

/// Engine configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// TTL of the cached region list.
    pub regions_cache_ttl: Duration,
    /// TTL of the cached pipeline list.
    pub pipelines_cache_ttl: Duration,
    /// Default lookback window for queries that do not name one.
    pub lookback: chrono::Duration,
    /// Deadline applied to each persistence call.
    pub db_timeout: Duration,
    /// Upstream region catalog. Region sync is disabled when unset.
    pub catalyst_region_url: Option<String>,
}

const DEFAULT_REGIONS_CACHE_SECS: u64 = 60;
const DEFAULT_PIPELINES_CACHE_SECS: u64 = 60;
const DEFAULT_LOOKBACK_HOURS: i64 = 24;
const DEFAULT_DB_TIMEOUT_SECS: u64 = 8;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            regions_cache_ttl: Duration::from_secs(DEFAULT_REGIONS_CACHE_SECS),
            pipelines_cache_ttl: Duration::from_secs(DEFAULT_PIPELINES_CACHE_SECS),
            lookback: chrono::Duration::hours(DEFAULT_LOOKBACK_HOURS),
            db_timeout: Duration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
            catalyst_region_url: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default | Unit    |
    /// |---------------------------|---------|---------|
    /// | `REGIONS_CACHE_TIMEOUT`   | `60`    | seconds |
    /// | `PIPELINES_CACHE_TIMEOUT` | `60`    | seconds |
    /// | `START_TIME_WINDOW`       | `24`    | hours   |
    /// | `DB_TIMEOUT`              | `8`     | seconds |
    /// | `CATALYST_REGION_URL`     | unset   |         |
    ///
    /// A value that fails to parse falls back to its default with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let regions_cache_secs =
            parse_or_default(&lookup, "REGIONS_CACHE_TIMEOUT", DEFAULT_REGIONS_CACHE_SECS);
        let pipelines_cache_secs =
            parse_or_default(&lookup, "PIPELINES_CACHE_TIMEOUT", DEFAULT_PIPELINES_CACHE_SECS);
        let lookback_hours = parse_or_default(&lookup, "START_TIME_WINDOW", DEFAULT_LOOKBACK_HOURS);
        let db_timeout_secs = parse_or_default(&lookup, "DB_TIMEOUT", DEFAULT_DB_TIMEOUT_SECS);

        let catalyst_region_url = lookup("CATALYST_REGION_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Self {
            regions_cache_ttl: Duration::from_secs(regions_cache_secs),
            pipelines_cache_ttl: Duration::from_secs(pipelines_cache_secs),
            lookback: chrono::Duration::hours(lookback_hours),
            db_timeout: Duration::from_secs(db_timeout_secs),
            catalyst_region_url,
        }
    }
}

fn parse_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    default = %default,
                    "Unparseable config value, using default"
                );
                default
            }
        },
    }
}
