use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use pingroute_model::{build_report, HopRecord, TraceReport};
use pingroute_trace::config::{
    KEY_INTERVAL, KEY_MAX_HOPS, KEY_PACKET_SIZE, KEY_PINGS_PER_HOP, KEY_TARGET, KEY_TIMEOUT,
};
use pingroute_trace::{
    parse_hop, stream_trace, validate, Cancellation, NoKeepAwake, ProcessProbeRunner,
    SystemResolver, SystemSpawner, TraceEvent, Tracer, DEFAULT_PING_PROGRAM,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Parser)]
#[command(name = "pingroute", version, about = "Traceroute over the system ping")]
struct Cli {
    /// Log to stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, global = true, default_value = "pingroute=debug")]
    log_filter: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Trace(TraceArgs),
    Parse(ParseArgs),
}

#[derive(Args)]
#[command(
    about = "Trace the path to a host with ttl-limited pings. Only target networks you own or have permission to test."
)]
struct TraceArgs {
    #[arg(long)]
    target: Option<String>,

    /// JSON object of string parameters; flags override it.
    #[arg(long)]
    params: Option<PathBuf>,

    #[arg(long)]
    packet_size_byte: Option<String>,

    #[arg(long)]
    ping_timeout_sec: Option<String>,

    #[arg(long)]
    ping_interval_sec: Option<String>,

    #[arg(long)]
    pings_per_hop: Option<String>,

    #[arg(long)]
    max_ping_count: Option<String>,

    #[arg(long, default_value = DEFAULT_PING_PROGRAM)]
    ping_exe: String,

    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
#[command(about = "Print the addresses found in saved ping output")]
struct ParseArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long)]
    destination: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        configure_logging(&cli.log_filter);
    }

    match cli.command {
        Commands::Trace(args) => run_trace(args),
        Commands::Parse(args) => run_parse(args),
    }
}

fn configure_logging(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run_trace(args: TraceArgs) -> Result<()> {
    let params = collect_params(&args)?;
    let config = validate(&params)?;

    let cancel = Cancellation::new();
    let on_signal = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || on_signal.cancel()) {
        warn!(error = %err, "failed to install Ctrl-C handler");
    }

    let tracer = Tracer::new(
        config.clone(),
        ProcessProbeRunner::new(SystemSpawner),
        SystemResolver,
        NoKeepAwake,
    )
    .with_program(args.ping_exe.as_str())
    .with_cancellation(cancel);

    println!(
        "pingroute to {}, {} hops max, {} probes per hop",
        config.target, config.max_hop_count, config.pings_per_hop
    );

    let mut outcome = None;
    for event in stream_trace(tracer) {
        match event {
            TraceEvent::Hop(hop) => println!("{}", hop_line(&hop)),
            TraceEvent::Done(result) => outcome = Some(result),
        }
    }

    let result = outcome.ok_or_else(|| anyhow!("trace worker exited without a result"))??;

    for field in build_report(&result) {
        println!("{} = {}", field.name, field.value);
    }

    if let Some(out) = args.out {
        let timestamp_utc = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        write_json(&out, &TraceReport::new(config, &result, timestamp_utc))?;
    }

    Ok(())
}

fn collect_params(args: &TraceArgs) -> Result<HashMap<String, String>> {
    let mut params: HashMap<String, String> = match &args.params {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read params file {:?}", path))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse params file {:?}", path))?
        }
        None => HashMap::new(),
    };

    let flags = [
        (KEY_TARGET, &args.target),
        (KEY_PACKET_SIZE, &args.packet_size_byte),
        (KEY_TIMEOUT, &args.ping_timeout_sec),
        (KEY_INTERVAL, &args.ping_interval_sec),
        (KEY_PINGS_PER_HOP, &args.pings_per_hop),
        (KEY_MAX_HOPS, &args.max_ping_count),
    ];
    for (key, value) in flags {
        if let Some(value) = value {
            params.insert(key.to_string(), value.clone());
        }
    }

    Ok(params)
}

fn hop_line(hop: &HopRecord) -> String {
    let addresses = if hop.addresses.is_empty() {
        "*".to_string()
    } else {
        hop.addresses
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("{:>2}  {}  {:.3} ms", hop.ttl, addresses, hop.average_rtt_ms)
}

fn run_parse(args: ParseArgs) -> Result<()> {
    let contents = fs::read_to_string(&args.in_path)
        .map_err(|err| anyhow!("failed to read input {:?}: {}", args.in_path, err))?;
    for address in parse_hop(contents.lines(), &args.destination) {
        println!("{address}");
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    atomic_write(path, &json)
}

/// Writes `data` next to `path` and renames it into place, so readers never
/// see a half-written report.
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {:?}", dir))?;

    let name = path.file_name().and_then(|name| name.to_str()).unwrap_or("report");
    let staged = dir.join(format!(".{}.{}.tmp", name, std::process::id()));
    let written = fs::File::create(&staged).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|()| fs::rename(&staged, path)) {
        let _ = fs::remove_file(&staged);
        return Err(err).with_context(|| format!("failed to write output {:?}", path));
    }

    // Persist the rename itself.
    if let Ok(handle) = fs::File::open(dir) {
        let _ = handle.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn trace_args(target: Option<&str>, params: Option<PathBuf>) -> TraceArgs {
        TraceArgs {
            target: target.map(str::to_string),
            params,
            packet_size_byte: None,
            ping_timeout_sec: None,
            ping_interval_sec: None,
            pings_per_hop: Some("5".to_string()),
            max_ping_count: None,
            ping_exe: DEFAULT_PING_PROGRAM.to_string(),
            out: None,
        }
    }

    #[test]
    fn flags_override_params_file() {
        let path =
            std::env::temp_dir().join(format!("pingroute-params-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"{"target": "1.1.1.1", "pings_per_hop": "2", "max_ping_count": "20"}"#,
        )
        .unwrap();

        let params = collect_params(&trace_args(Some("9.9.9.9"), Some(path.clone()))).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(params["target"], "9.9.9.9");
        assert_eq!(params["pings_per_hop"], "5");
        assert_eq!(params["max_ping_count"], "20");
    }

    #[test]
    fn hop_line_marks_silent_hops() {
        let silent = HopRecord {
            ttl: 3,
            addresses: BTreeSet::new(),
            average_rtt_ms: 12.0,
        };
        assert_eq!(hop_line(&silent), " 3  *  12.000 ms");
    }

    #[test]
    fn report_replaces_existing_file_without_leftovers() {
        let dir = std::env::temp_dir().join(format!("pingroute-out-{}", std::process::id()));
        let path = dir.join("nested").join("report.json");
        atomic_write(&path, b"old").unwrap();

        let hop = HopRecord {
            ttl: 1,
            addresses: BTreeSet::from(["10.0.0.1".to_string()]),
            average_rtt_ms: 2.5,
        };
        write_json(&path, &hop).unwrap();

        let written: HopRecord = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        let _ = fs::remove_dir_all(&dir);

        assert_eq!(written, hop);
        assert_eq!(entries, 1);
    }

    #[test]
    fn cli_parses_trace_flags() {
        let cli = Cli::try_parse_from([
            "pingroute",
            "trace",
            "--target",
            "example.com",
            "--max-ping-count",
            "15",
        ])
        .unwrap();

        match cli.command {
            Commands::Trace(args) => {
                assert_eq!(args.target.as_deref(), Some("example.com"));
                assert_eq!(args.max_ping_count.as_deref(), Some("15"));
                assert_eq!(args.ping_exe, "ping");
            }
            Commands::Parse(_) => panic!("expected trace command"),
        }
    }
}
