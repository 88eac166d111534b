use std::io;
use thiserror::Error;

/// A parameter could not be turned into a `TraceConfig`.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target of traceroute cannot be empty")]
    MissingTarget,
    #[error("invalid value for {key}: {value:?} is not a number")]
    InvalidNumber { key: &'static str, value: String },
    #[error("invalid value for {key}: {value} is out of range")]
    OutOfRange { key: &'static str, value: String },
}

/// A single probe failed. Recovered by the hop aggregator.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("no permission to run {program}")]
    PermissionDenied { program: String },
    #[error("probe program {program} not found")]
    NotFound { program: String },
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read probe output: {source}")]
    Io {
        #[source]
        source: io::Error,
    },
}

impl ProbeError {
    /// Classifies a spawn failure by its io error kind.
    pub fn from_spawn(program: &str, err: io::Error) -> Self {
        let program = program.to_string();
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { program },
            io::ErrorKind::NotFound => Self::NotFound { program },
            _ => Self::Spawn {
                program,
                source: err,
            },
        }
    }
}

/// A trace ended without reaching its destination.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("target {target} cannot be resolved: {source}")]
    HostResolution {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot perform traceroute to {target}: not reached within {max_hops} hops")]
    Exhausted { target: String, max_hops: u32 },
    #[error("traceroute cancelled after {completed_hops} hops")]
    Cancelled { completed_hops: u32 },
}
