//! Shared data structures for pingroute.

pub mod report;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use report::{build_report, ReportField, TraceReport};

/// A validated traceroute request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceConfig {
    pub target: String,
    pub packet_size_bytes: u32,
    pub timeout_sec: u32,
    pub interval_sec: f64,
    pub pings_per_hop: u32,
    pub max_hop_count: u32,
}

/// Addresses seen at one hop-distance and the mean probe time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HopRecord {
    pub ttl: u32,
    pub addresses: BTreeSet<String>,
    pub average_rtt_ms: f64,
}

impl HopRecord {
    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceResult {
    pub success: bool,
    pub hop_count: u32,
    pub hops: Vec<HopRecord>,
}
