//! One echo probe through the system `ping` utility.

use crate::error::ProbeError;
use pingroute_model::TraceConfig;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::debug;

pub const DEFAULT_PING_PROGRAM: &str = "ping";

/// Flag dialect of the local `ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// iputils and busybox: `-t` sets the ttl, `-W` the reply wait.
    Linux,
    /// macOS and the BSDs: `-m` sets the ttl, `-t` the overall timeout.
    Bsd,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )) {
            Self::Bsd
        } else {
            Self::Linux
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCommand {
    pub program: String,
    pub target: String,
    pub ttl: u32,
    pub packet_size_bytes: u32,
    pub timeout_sec: u32,
    pub platform: Platform,
}

impl ProbeCommand {
    pub fn new(program: &str, config: &TraceConfig, ttl: u32) -> Self {
        Self {
            program: program.to_string(),
            target: config.target.clone(),
            ttl,
            packet_size_bytes: config.packet_size_bytes,
            timeout_sec: config.timeout_sec,
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Numeric output, one packet, fixed ttl and payload size.
    pub fn args(&self) -> Vec<String> {
        let (ttl_flag, wait_flag) = match self.platform {
            Platform::Linux => ("-t", "-W"),
            Platform::Bsd => ("-m", "-t"),
        };

        let mut args = vec![
            "-n".to_string(),
            ttl_flag.to_string(),
            self.ttl.to_string(),
            "-s".to_string(),
            self.packet_size_bytes.to_string(),
            "-c".to_string(),
            "1".to_string(),
        ];
        if self.timeout_sec > 0 {
            args.push(wait_flag.to_string());
            args.push(self.timeout_sec.to_string());
        }
        args.push(self.target.clone());
        args
    }
}

/// Raw output of one probe and the wall-clock time it took, process start-up
/// included.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutput {
    pub lines: Vec<String>,
    pub elapsed_ms: f64,
}

/// A running probe. Dropping it releases the process and its pipes.
pub trait ProbeProcess {
    /// Next line of standard output without its line ending, `None` once drained.
    fn next_line(&mut self) -> io::Result<Option<String>>;

    fn lines(&mut self) -> ProbeLines<'_, Self>
    where
        Self: Sized,
    {
        ProbeLines { process: self }
    }
}

pub struct ProbeLines<'a, P> {
    process: &'a mut P,
}

impl<P: ProbeProcess> Iterator for ProbeLines<'_, P> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.process.next_line().transpose()
    }
}

pub trait ProbeSpawner {
    type Process: ProbeProcess;

    fn spawn(&self, command: &ProbeCommand) -> Result<Self::Process, ProbeError>;
}

/// Runs one probe to completion.
pub trait ProbeRunner {
    fn run_probe(&self, command: &ProbeCommand) -> Result<ProbeOutput, ProbeError>;
}

impl<R: ProbeRunner + ?Sized> ProbeRunner for &R {
    fn run_probe(&self, command: &ProbeCommand) -> Result<ProbeOutput, ProbeError> {
        (**self).run_probe(command)
    }
}

impl<R: ProbeRunner + ?Sized> ProbeRunner for Arc<R> {
    fn run_probe(&self, command: &ProbeCommand) -> Result<ProbeOutput, ProbeError> {
        (**self).run_probe(command)
    }
}

/// Times spawn plus drain of a process from `S`.
#[derive(Debug, Clone, Default)]
pub struct ProcessProbeRunner<S = SystemSpawner> {
    spawner: S,
}

impl<S> ProcessProbeRunner<S> {
    pub fn new(spawner: S) -> Self {
        Self { spawner }
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }
}

impl<S: ProbeSpawner> ProbeRunner for ProcessProbeRunner<S> {
    fn run_probe(&self, command: &ProbeCommand) -> Result<ProbeOutput, ProbeError> {
        let started = Instant::now();
        let mut process = self.spawner.spawn(command)?;
        let lines = process
            .lines()
            .collect::<io::Result<Vec<String>>>()
            .map_err(|source| ProbeError::Io { source })?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        debug!(
            ttl = command.ttl,
            lines = lines.len(),
            elapsed_ms,
            "probe finished"
        );
        Ok(ProbeOutput { lines, elapsed_ms })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

impl ProbeSpawner for SystemSpawner {
    type Process = SystemProcess;

    fn spawn(&self, command: &ProbeCommand) -> Result<SystemProcess, ProbeError> {
        let args = command.args();
        debug!(program = %command.program, args = ?args, "spawning probe");

        let mut child = Command::new(&command.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| ProbeError::from_spawn(&command.program, err))?;

        let stdout = child.stdout.take().map(BufReader::new);
        let stderr = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let mut message = String::new();
                let _ = BufReader::new(stderr).read_to_string(&mut message);
                message
            })
        });
        Ok(SystemProcess {
            child,
            stdout,
            stderr,
        })
    }
}

#[derive(Debug)]
pub struct SystemProcess {
    child: Child,
    stdout: Option<BufReader<ChildStdout>>,
    /// Drained on its own thread so a chatty child cannot fill the pipe.
    stderr: Option<JoinHandle<String>>,
}

impl SystemProcess {
    fn log_exit(&mut self) {
        let message = self
            .stderr
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        let status = self.child.wait().ok();
        debug!(
            status = ?status,
            stderr = message.trim(),
            "probe exited"
        );
    }
}

impl ProbeProcess for SystemProcess {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| io::Error::other("missing probe stdout"))?;

        let mut line = String::new();
        if stdout.read_line(&mut line)? == 0 {
            self.log_exit();
            return Ok(None);
        }

        let len = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(len);
        Ok(Some(line))
    }
}

impl Drop for SystemProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(platform: Platform, timeout_sec: u32) -> ProbeCommand {
        ProbeCommand {
            program: "ping".to_string(),
            target: "example.com".to_string(),
            ttl: 7,
            packet_size_bytes: 56,
            timeout_sec,
            platform,
        }
    }

    #[test]
    fn linux_arguments() {
        assert_eq!(
            command(Platform::Linux, 10).args(),
            vec!["-n", "-t", "7", "-s", "56", "-c", "1", "-W", "10", "example.com"]
        );
    }

    #[test]
    fn bsd_arguments() {
        assert_eq!(
            command(Platform::Bsd, 10).args(),
            vec!["-n", "-m", "7", "-s", "56", "-c", "1", "-t", "10", "example.com"]
        );
    }

    #[test]
    fn zero_timeout_leaves_wait_to_ping() {
        assert_eq!(
            command(Platform::Linux, 0).args(),
            vec!["-n", "-t", "7", "-s", "56", "-c", "1", "example.com"]
        );
    }

    #[test]
    fn command_from_config() {
        let config = TraceConfig {
            target: "8.8.8.8".to_string(),
            packet_size_bytes: 120,
            timeout_sec: 3,
            interval_sec: 0.5,
            pings_per_hop: 3,
            max_hop_count: 10,
        };

        let command = ProbeCommand::new("/bin/ping", &config, 4).with_platform(Platform::Linux);

        assert_eq!(command.program, "/bin/ping");
        assert_eq!(command.target, "8.8.8.8");
        assert_eq!(command.ttl, 4);
        assert_eq!(command.packet_size_bytes, 120);
        assert_eq!(command.timeout_sec, 3);
    }

    #[test]
    fn missing_program_is_not_found() {
        let mut command = command(Platform::current(), 1);
        command.program = "/nonexistent/pingroute-ping".to_string();

        let err = SystemSpawner.spawn(&command).unwrap_err();

        assert!(matches!(err, ProbeError::NotFound { .. }));
    }
}
