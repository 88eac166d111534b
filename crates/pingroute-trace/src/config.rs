//! Validation of raw traceroute parameters.

use crate::error::ConfigError;
use pingroute_model::TraceConfig;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

pub const KEY_TARGET: &str = "target";
pub const KEY_PACKET_SIZE: &str = "packet_size_byte";
pub const KEY_TIMEOUT: &str = "ping_timeout_sec";
pub const KEY_INTERVAL: &str = "ping_interval_sec";
pub const KEY_PINGS_PER_HOP: &str = "pings_per_hop";
pub const KEY_MAX_HOPS: &str = "max_ping_count";

/// 56 bytes of payload plus the 8 byte ICMP header makes a 64 byte packet.
pub const DEFAULT_PACKET_SIZE_BYTES: u32 = 56;
pub const DEFAULT_TIMEOUT_SEC: u32 = 10;
pub const DEFAULT_INTERVAL_SEC: f64 = 0.5;
pub const DEFAULT_PINGS_PER_HOP: u32 = 3;
pub const DEFAULT_MAX_HOP_COUNT: u32 = 10;
/// Longest accepted pause between probes.
pub const MAX_INTERVAL_SEC: f64 = 3600.0;

const KNOWN_KEYS: [&str; 6] = [
    KEY_TARGET,
    KEY_PACKET_SIZE,
    KEY_TIMEOUT,
    KEY_INTERVAL,
    KEY_PINGS_PER_HOP,
    KEY_MAX_HOPS,
];

pub fn validate(params: &HashMap<String, String>) -> Result<TraceConfig, ConfigError> {
    for key in params.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            debug!(key = %key, "ignoring unknown traceroute parameter");
        }
    }

    let target = params
        .get(KEY_TARGET)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingTarget)?
        .to_string();

    let packet_size_bytes = parse_or(params, KEY_PACKET_SIZE, DEFAULT_PACKET_SIZE_BYTES)?;
    let timeout_sec = parse_or(params, KEY_TIMEOUT, DEFAULT_TIMEOUT_SEC)?;
    let interval_sec = parse_or(params, KEY_INTERVAL, DEFAULT_INTERVAL_SEC)?;
    let pings_per_hop = parse_or(params, KEY_PINGS_PER_HOP, DEFAULT_PINGS_PER_HOP)?;
    let max_hop_count = parse_or(params, KEY_MAX_HOPS, DEFAULT_MAX_HOP_COUNT)?;

    ensure(packet_size_bytes > 0, KEY_PACKET_SIZE, packet_size_bytes)?;
    ensure(
        (0.0..=MAX_INTERVAL_SEC).contains(&interval_sec),
        KEY_INTERVAL,
        interval_sec,
    )?;
    ensure(pings_per_hop >= 1, KEY_PINGS_PER_HOP, pings_per_hop)?;
    ensure(max_hop_count >= 1, KEY_MAX_HOPS, max_hop_count)?;

    Ok(TraceConfig {
        target,
        packet_size_bytes,
        timeout_sec,
        interval_sec,
        pings_per_hop,
        max_hop_count,
    })
}

fn parse_or<T: FromStr>(
    params: &HashMap<String, String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match params.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber {
                key,
                value: raw.clone(),
            }),
        None => Ok(default),
    }
}

fn ensure(ok: bool, key: &'static str, value: impl ToString) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value: value.to_string(),
        })
    }
}
