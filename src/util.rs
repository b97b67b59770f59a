use std::str::FromStr;

pub const MAX_CONCURRENT_CHECKS: &str = "MAX_CONCURRENT_CHECKS";
pub const DEFAULT_INTERVAL: &str = "DEFAULT_INTERVAL";
pub const PROBE_TIMEOUT: &str = "PROBE_TIMEOUT";
pub const DATABASE_PATH: &str = "DATABASE_PATH";
pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const API_BIND: &str = "API_BIND";

/// Log filter override, in `tracing_subscriber::filter::Targets` syntax
pub const LOG_FILTER: &str = "SITE_MONITOR_LOG";

/// Parse an environment value, keeping `current` when unset or unparseable
pub fn parse_or<T, F>(lookup: &F, key: &str, current: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(res) => res.trim().parse().unwrap_or(current),
        None => current,
    }
}

/// Non-empty string value of an environment variable
pub fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
