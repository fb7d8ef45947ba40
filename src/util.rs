use chrono::Utc;

use crate::Millis;

/// Current wall-clock time in milliseconds since the epoch
pub fn now_millis() -> Millis {
    Utc::now().timestamp_millis()
}

/// Render a millisecond timestamp as RFC 3339 (for API responses and logs)
pub fn millis_to_rfc3339(millis: Millis) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

const HEARTBEAT_INTERVAL: &str = "FLEET_HEARTBEAT_INTERVAL_MS";

pub fn get_heartbeat_interval() -> Option<u64> {
    std::env::var(HEARTBEAT_INTERVAL)
        .ok()
        .and_then(|res| res.parse().ok())
}

const HEARTBEAT_TOLERANCE: &str = "FLEET_HEARTBEAT_TOLERANCE_MS";

pub fn get_heartbeat_tolerance() -> Option<u64> {
    std::env::var(HEARTBEAT_TOLERANCE)
        .ok()
        .and_then(|res| res.parse().ok())
}

const LOAD_BALANCING: &str = "FLEET_LOAD_BALANCING";

pub fn get_load_balancing() -> Option<bool> {
    std::env::var(LOAD_BALANCING)
        .ok()
        .and_then(|res| parse_flag(&res))
}

const HUB_URL: &str = "FLEET_HUB_URL";

const DEFAULT_HUB_URL: &str = "http://127.0.0.1:8080";

pub fn get_hub_url() -> String {
    std::env::var(HUB_URL).unwrap_or_else(|_| DEFAULT_HUB_URL.to_string())
}

const COLLECTOR_NAME: &str = "FLEET_COLLECTOR_NAME";

pub fn get_collector_name() -> Option<String> {
    std::env::var(COLLECTOR_NAME).ok()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
