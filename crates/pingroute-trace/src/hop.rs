use crate::cancel::Cancellation;
use crate::parser::parse_hop;
use crate::probe::{ProbeCommand, ProbeRunner};
use pingroute_model::{HopRecord, TraceConfig};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Probes one ttl `pings_per_hop` times, one after the other.
///
/// A failed probe adds no addresses and no time but still counts towards the
/// average, so `average_rtt_ms` is always the total over `pings_per_hop`.
pub fn aggregate_hop<R: ProbeRunner>(
    runner: &R,
    program: &str,
    ttl: u32,
    config: &TraceConfig,
    destination: &str,
    cancel: &Cancellation,
) -> HopRecord {
    let command = ProbeCommand::new(program, config, ttl);
    let pause = pause_between_probes(config.interval_sec);
    let mut addresses = BTreeSet::new();
    let mut total_ms = 0.0;

    for attempt in 1..=config.pings_per_hop {
        match runner.run_probe(&command) {
            Ok(output) => {
                addresses.extend(parse_hop(&output.lines, destination));
                total_ms += output.elapsed_ms;
            }
            Err(err) => {
                warn!(ttl, attempt, error = %err, "probe failed");
            }
        }

        if !pause.is_zero() && !cancel.sleep(pause) {
            debug!(ttl, attempt, "pause between probes interrupted");
        }
    }

    HopRecord {
        ttl,
        addresses,
        average_rtt_ms: total_ms / f64::from(config.pings_per_hop),
    }
}

/// Negative or NaN means no pause; anything too long for a `Duration`
/// saturates.
fn pause_between_probes(interval_sec: f64) -> Duration {
    if interval_sec.is_nan() || interval_sec <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(interval_sec).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0.0, Duration::ZERO)]
    #[test_case(-1.0, Duration::ZERO)]
    #[test_case(f64::NAN, Duration::ZERO)]
    #[test_case(0.25, Duration::from_millis(250))]
    #[test_case(1e300, Duration::MAX)]
    #[test_case(f64::INFINITY, Duration::MAX)]
    fn pause_length(interval_sec: f64, expected: Duration) {
        assert_eq!(pause_between_probes(interval_sec), expected);
    }
}
