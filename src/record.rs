use crate::influx::Point;
use crate::probe::RawMeasurement;
use chrono::{DateTime, Utc};

pub const MEASUREMENT_NAME: &str = "internet_speed";
const UNKNOWN: &str = "unknown";

/// One completed measurement cycle, throughput in Mbps, latency in ms.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedSample {
    pub timestamp: DateTime<Utc>,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub server_id: Option<String>,
    pub server_name: Option<String>,
    pub server_country: Option<String>,
}

impl SpeedSample {
    /// Builds the record from a successful probe outcome, stamped with the
    /// completion time.
    pub fn from_raw(raw: RawMeasurement) -> Self {
        let (server_id, server_name, server_country) = match raw.server {
            Some(server) => (
                non_empty(server.id.map(|id| id.to_string())),
                non_empty(server.name),
                non_empty(server.country),
            ),
            None => (None, None, None),
        };

        Self {
            timestamp: Utc::now(),
            download_mbps: round2(raw.download / 1_000_000.0),
            upload_mbps: round2(raw.upload / 1_000_000.0),
            ping_ms: round2(raw.ping),
            server_id,
            server_name,
            server_country,
        }
    }

    pub fn to_point(&self) -> Point {
        Point::new(MEASUREMENT_NAME)
            .tag("server_id", self.server_id.as_deref().unwrap_or(UNKNOWN))
            .tag("server_name", self.server_name.as_deref().unwrap_or(UNKNOWN))
            .tag(
                "server_country",
                self.server_country.as_deref().unwrap_or(UNKNOWN),
            )
            .field("download_speed", self.download_mbps)
            .field("upload_speed", self.upload_mbps)
            .field("ping", self.ping_ms)
            .time(self.timestamp)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
