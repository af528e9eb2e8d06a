use crate::config::Config;
use serde::Deserialize;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Raw numbers reported by one speed test, throughput in bits per second.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMeasurement {
    pub download: f64,
    pub upload: f64,
    pub ping: f64,
    #[serde(default)]
    pub server: Option<ServerInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub id: Option<ServerId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// The CLI emits server ids as strings, older builds as bare integers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerId {
    Str(String),
    Int(u64),
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerId::Str(value) => f.write_str(value),
            ServerId::Int(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to launch {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("speed test timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("speed test exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("unreadable speed test output: {0}")]
    Parse(#[from] serde_json::Error),
}

pub trait Probe {
    async fn run_measurement(
        &self,
        server_id: Option<&str>,
    ) -> Result<RawMeasurement, ProbeError>;
}

/// Runs the speedtest CLI in JSON mode and parses its report.
#[derive(Debug, Clone)]
pub struct SpeedtestCli {
    binary: String,
    timeout: Duration,
}

impl SpeedtestCli {
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.speedtest_bin.clone(),
            timeout: config.speedtest_timeout(),
        }
    }
}

impl Probe for SpeedtestCli {
    async fn run_measurement(
        &self,
        server_id: Option<&str>,
    ) -> Result<RawMeasurement, ProbeError> {
        let mut command = Command::new(&self.binary);
        command
            .args(cli_args(server_id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ProbeError::TimedOut(self.timeout))?
            .map_err(|source| ProbeError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                status: output.status,
                stderr: stderr_snippet(&output.stderr),
            });
        }

        parse_cli_output(&output.stdout)
    }
}

fn cli_args(server_id: Option<&str>) -> Vec<String> {
    let mut args = vec!["--json".to_string()];
    if let Some(id) = server_id {
        args.push("--server".to_string());
        args.push(id.to_string());
    }
    args
}

fn stderr_snippet(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    let mut snippet: String = trimmed.chars().take(512).collect();
    if snippet.len() < trimmed.len() {
        snippet.push_str("...");
    }
    snippet
}

fn parse_cli_output(stdout: &[u8]) -> Result<RawMeasurement, ProbeError> {
    Ok(serde_json::from_slice(stdout)?)
}

#[cfg(test)]
mod tests {
    use super::{cli_args, parse_cli_output};

    #[test]
    fn cli_args_best_server_mode() {
        assert_eq!(cli_args(None), vec!["--json"]);
    }

    #[test]
    fn cli_args_targeted_mode() {
        assert_eq!(cli_args(Some("67890")), vec!["--json", "--server", "67890"]);
    }

    #[test]
    fn parse_full_report() {
        let stdout = br#"{
            "download": 93730601.61068135,
            "upload": 13832216.706353374,
            "ping": 14.068,
            "server": {
                "url": "http://speed.example.net:8080/speedtest/upload.php",
                "name": "Test Server",
                "country": "US",
                "cc": "US",
                "sponsor": "Example ISP",
                "id": "12345",
                "d": 4.32,
                "latency": 14.068
            },
            "timestamp": "2026-08-08T10:00:00.000000Z",
            "bytes_sent": 17301504,
            "bytes_received": 117362060,
            "share": null
        }"#;

        let raw = parse_cli_output(stdout).expect("parsed");
        assert!((raw.download - 93_730_601.610_681_35).abs() < 1e-6);
        assert!((raw.upload - 13_832_216.706_353_374).abs() < 1e-6);
        assert!((raw.ping - 14.068).abs() < f64::EPSILON);
        let server = raw.server.expect("server block");
        assert_eq!(server.id.unwrap().to_string(), "12345");
        assert_eq!(server.name.as_deref(), Some("Test Server"));
        assert_eq!(server.country.as_deref(), Some("US"));
    }

    #[test]
    fn parse_integer_server_id() {
        let stdout = br#"{
            "download": 1000000.0,
            "upload": 500000.0,
            "ping": 30.5,
            "server": {"id": 67890, "name": "Other", "country": "CA"}
        }"#;

        let raw = parse_cli_output(stdout).expect("parsed");
        assert_eq!(raw.server.unwrap().id.unwrap().to_string(), "67890");
    }

    #[test]
    fn parse_without_server_block() {
        let stdout = br#"{"download": 1.0, "upload": 2.0, "ping": 3.0}"#;
        let raw = parse_cli_output(stdout).expect("parsed");
        assert!(raw.server.is_none());
    }

    #[test]
    fn parse_garbage_fails() {
        assert!(parse_cli_output(b"Cannot retrieve speedtest configuration").is_err());
    }
}
