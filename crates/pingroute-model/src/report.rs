//! Flattening of a finished trace into named report fields.

use crate::{TraceConfig, TraceResult};
use serde::{Deserialize, Serialize};

pub const MEASUREMENT_TYPE: &str = "traceroute";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportField {
    pub name: String,
    pub value: String,
}

impl ReportField {
    fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// The document written by the CLI for a successful trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceReport {
    pub measurement_type: String,
    pub timestamp_utc: String,
    pub config: TraceConfig,
    pub success: bool,
    pub values: Vec<ReportField>,
}

impl TraceReport {
    pub fn new(config: TraceConfig, result: &TraceResult, timestamp_utc: String) -> Self {
        Self {
            measurement_type: MEASUREMENT_TYPE.to_string(),
            timestamp_utc,
            config,
            success: result.success,
            values: build_report(result),
        }
    }
}

/// Builds `num_hops`, then per hop `hop_{i}_addr_{j}` for each address and
/// `hop_{i}_rrt_ms` with three decimals. Hop indices start at 0, address
/// indices at 1.
pub fn build_report(result: &TraceResult) -> Vec<ReportField> {
    let address_count: usize = result.hops.iter().map(|hop| hop.addresses.len()).sum();
    let mut fields = Vec::with_capacity(1 + result.hops.len() + address_count);

    fields.push(ReportField::new("num_hops", result.hop_count));

    for (index, hop) in result.hops.iter().enumerate() {
        for (address_index, address) in hop.addresses.iter().enumerate() {
            fields.push(ReportField::new(
                format!("hop_{index}_addr_{}", address_index + 1),
                address,
            ));
        }
        fields.push(ReportField::new(
            format!("hop_{index}_rrt_ms"),
            format!("{:.3}", hop.average_rtt_ms),
        ));
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HopRecord;

    fn hop(ttl: u32, addresses: &[&str], average_rtt_ms: f64) -> HopRecord {
        HopRecord {
            ttl,
            addresses: addresses.iter().map(|addr| addr.to_string()).collect(),
            average_rtt_ms,
        }
    }

    fn pairs(fields: &[ReportField]) -> Vec<(&str, &str)> {
        fields
            .iter()
            .map(|field| (field.name.as_str(), field.value.as_str()))
            .collect()
    }

    #[test]
    fn report_lists_hops_in_discovery_order() {
        let result = TraceResult {
            success: true,
            hop_count: 3,
            hops: vec![
                hop(1, &["192.168.1.1"], 12.0),
                hop(2, &["10.0.0.9", "10.0.0.1"], 20.5),
                hop(3, &["93.184.216.34"], 31.23456),
            ],
        };

        let fields = build_report(&result);

        assert_eq!(
            pairs(&fields),
            vec![
                ("num_hops", "3"),
                ("hop_0_addr_1", "192.168.1.1"),
                ("hop_0_rrt_ms", "12.000"),
                ("hop_1_addr_1", "10.0.0.1"),
                ("hop_1_addr_2", "10.0.0.9"),
                ("hop_1_rrt_ms", "20.500"),
                ("hop_2_addr_1", "93.184.216.34"),
                ("hop_2_rrt_ms", "31.235"),
            ]
        );
    }

    #[test]
    fn silent_hop_still_reports_rtt() {
        let result = TraceResult {
            success: true,
            hop_count: 2,
            hops: vec![hop(1, &[], 0.0), hop(2, &["1.1.1.1"], 3.0)],
        };

        let fields = build_report(&result);

        assert_eq!(
            pairs(&fields),
            vec![
                ("num_hops", "2"),
                ("hop_0_rrt_ms", "0.000"),
                ("hop_1_addr_1", "1.1.1.1"),
                ("hop_1_rrt_ms", "3.000"),
            ]
        );
    }

    #[test]
    fn trace_report_carries_fields_and_type() {
        let config = TraceConfig {
            target: "1.1.1.1".to_string(),
            packet_size_bytes: 56,
            timeout_sec: 10,
            interval_sec: 0.5,
            pings_per_hop: 3,
            max_hop_count: 10,
        };
        let result = TraceResult {
            success: true,
            hop_count: 1,
            hops: vec![hop(1, &["1.1.1.1"], 1.0)],
        };

        let report = TraceReport::new(config, &result, "2026-02-01T12:00:00Z".to_string());
        let json = serde_json::to_string(&report).unwrap();

        assert_eq!(report.measurement_type, "traceroute");
        assert!(report.success);
        assert_eq!(report.values.len(), 3);
        assert!(json.contains("\"name\":\"hop_0_rrt_ms\",\"value\":\"1.000\""));
    }
}
