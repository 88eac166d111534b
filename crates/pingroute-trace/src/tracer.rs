use crate::cancel::Cancellation;
use crate::error::TraceError;
use crate::hop::aggregate_hop;
use crate::platform::{HostResolver, KeepAwake, KeepAwakeGuard};
use crate::probe::{ProbeRunner, DEFAULT_PING_PROGRAM};
use pingroute_model::{HopRecord, TraceConfig, TraceResult};
use tracing::{debug, info};

/// Walks the path to `config.target` one ttl at a time.
///
/// The trace succeeds at the first hop whose addresses include the resolved
/// destination. If `max_hop_count` hops pass without that, the trace fails and
/// the hops seen so far are dropped.
pub struct Tracer<R, H, K> {
    config: TraceConfig,
    runner: R,
    resolver: H,
    keep_awake: K,
    program: String,
    cancel: Cancellation,
}

impl<R, H, K> Tracer<R, H, K>
where
    R: ProbeRunner,
    H: HostResolver,
    K: KeepAwake,
{
    pub fn new(config: TraceConfig, runner: R, resolver: H, keep_awake: K) -> Self {
        Self {
            config,
            runner,
            resolver,
            keep_awake,
            program: DEFAULT_PING_PROGRAM.to_string(),
            cancel: Cancellation::new(),
        }
    }

    /// Path or name of the ping binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn run(&self) -> Result<TraceResult, TraceError> {
        self.run_with_progress(|_| {})
    }

    /// Like [`Tracer::run`], calling `on_hop` after every completed hop.
    pub fn run_with_progress<F>(&self, mut on_hop: F) -> Result<TraceResult, TraceError>
    where
        F: FnMut(&HopRecord),
    {
        let _awake = KeepAwakeGuard::acquire(&self.keep_awake);
        let target = &self.config.target;
        info!(host = %target, "starting traceroute");

        let destination = self
            .resolver
            .resolve(target)
            .map_err(|source| TraceError::HostResolution {
                target: target.clone(),
                source,
            })?
            .to_string();
        debug!(host = %target, destination = %destination, "target resolved");

        let mut hops: Vec<HopRecord> = Vec::new();
        for ttl in 1..=self.config.max_hop_count {
            if self.cancel.is_cancelled() {
                return Err(TraceError::Cancelled {
                    completed_hops: ttl - 1,
                });
            }

            let hop = aggregate_hop(
                &self.runner,
                &self.program,
                ttl,
                &self.config,
                &destination,
                &self.cancel,
            );
            info!("{}", progress_line(&hop));
            on_hop(&hop);

            let reached = hop.contains(&destination);
            hops.push(hop);
            if reached {
                info!(host = %target, hops = ttl, "destination reached");
                return Ok(TraceResult {
                    success: true,
                    hop_count: ttl,
                    hops,
                });
            }
        }

        info!(
            host = %target,
            max_hops = self.config.max_hop_count,
            "destination not reached"
        );
        Err(TraceError::Exhausted {
            target: target.clone(),
            max_hops: self.config.max_hop_count,
        })
    }
}

fn progress_line(hop: &HopRecord) -> String {
    let addresses: Vec<&str> = hop.addresses.iter().map(String::as_str).collect();
    format!("{}: {}", hop.ttl, addresses.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn progress_line_joins_addresses() {
        let hop = HopRecord {
            ttl: 4,
            addresses: ["10.0.0.1", "10.0.0.2"]
                .iter()
                .map(|addr| addr.to_string())
                .collect(),
            average_rtt_ms: 1.0,
        };
        assert_eq!(progress_line(&hop), "4: 10.0.0.1 | 10.0.0.2");

        let silent = HopRecord {
            ttl: 5,
            addresses: BTreeSet::new(),
            average_rtt_ms: 0.0,
        };
        assert_eq!(progress_line(&silent), "5: ");
    }
}
