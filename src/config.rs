use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub influxdb_url: String,
    pub influxdb_token: String,
    pub influxdb_org: String,
    pub influxdb_bucket: String,
    pub test_interval_minutes: u64,
    pub server_id: Option<String>,
    pub speedtest_bin: String,
    pub speedtest_timeout_seconds: u64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let influxdb_url = env_string("INFLUXDB_URL", "http://localhost:8086");
        Url::parse(&influxdb_url).context("invalid INFLUXDB_URL")?;

        let influxdb_token = env_string("INFLUXDB_TOKEN", "");
        let influxdb_org = env_string("INFLUXDB_ORG", "speedmonitor");
        let influxdb_bucket = env_string("INFLUXDB_BUCKET", "speedtest");

        let test_interval_minutes = env::var("TEST_INTERVAL_MINUTES")
            .ok()
            .map(|v| {
                v.trim()
                    .parse::<u64>()
                    .context("TEST_INTERVAL_MINUTES must be an integer")
            })
            .transpose()?
            .unwrap_or(60);
        if test_interval_minutes == 0 {
            return Err(anyhow!("TEST_INTERVAL_MINUTES must be at least 1"));
        }

        let server_id = env_optional("SPEEDTEST_SERVER_ID");
        let speedtest_bin = env_string("SPEEDTEST_BIN", "speedtest-cli");
        let speedtest_timeout_seconds = env::var("SPEEDTEST_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(300);

        let log_level = env_string("LOG_LEVEL", "info");

        Ok(Self {
            influxdb_url,
            influxdb_token,
            influxdb_org,
            influxdb_bucket,
            test_interval_minutes,
            server_id,
            speedtest_bin,
            speedtest_timeout_seconds,
            log_level,
        })
    }

    pub fn test_interval(&self) -> Duration {
        Duration::from_secs(self.test_interval_minutes * 60)
    }

    pub fn speedtest_timeout(&self) -> Duration {
        Duration::from_secs(self.speedtest_timeout_seconds)
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
