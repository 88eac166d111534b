//! Traceroute built on repeated single-packet `ping` runs with a rising ttl.

pub mod cancel;
pub mod config;
pub mod error;
pub mod hop;
pub mod parser;
pub mod platform;
pub mod probe;
pub mod stream;
pub mod tracer;

pub use cancel::Cancellation;
pub use config::validate;
pub use error::{ConfigError, ProbeError, TraceError};
pub use hop::aggregate_hop;
pub use parser::{is_ipv4, parse_hop};
pub use platform::{HostResolver, KeepAwake, NoKeepAwake, SystemResolver};
pub use probe::{
    Platform, ProbeCommand, ProbeOutput, ProbeProcess, ProbeRunner, ProbeSpawner,
    ProcessProbeRunner, SystemProcess, SystemSpawner, DEFAULT_PING_PROGRAM,
};
pub use stream::{spawn_trace, stream_trace, TraceEvent};
pub use tracer::Tracer;
