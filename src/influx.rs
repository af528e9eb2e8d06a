use crate::config::Config;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use thiserror::Error;

/// A single time-series point, tags and fields in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, f64)>,
    time: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: &str) -> Self {
        Self {
            measurement: measurement.to_string(),
            tags: Vec::new(),
            fields: Vec::new(),
            time: Utc::now(),
        }
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push((key.to_string(), value.to_string()));
        self
    }

    pub fn field(mut self, key: &str, value: f64) -> Self {
        self.fields.push((key.to_string(), value));
        self
    }

    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn fields(&self) -> &[(String, f64)] {
        &self.fields
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.time
    }

    /// Renders one InfluxDB v2 line with a millisecond timestamp.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape_measurement(&self.measurement);
        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }
        line.push(' ');
        for (index, (key, value)) in self.fields.iter().enumerate() {
            if index > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_string());
        }
        line.push(' ');
        line.push_str(&self.time.timestamp_millis().to_string());
        line
    }
}

fn escape_measurement(value: &str) -> String {
    value.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_key(value: &str) -> String {
    value
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("influxdb request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("influxdb rejected write ({status}): {body}")]
    Rejected { status: StatusCode, body: String },
}

pub trait PointSink {
    async fn write_point(&self, point: &Point) -> Result<(), WriteError>;
    async fn close(&self);
}

/// Writes points to the InfluxDB v2 HTTP API.
#[derive(Debug, Clone)]
pub struct InfluxWriter {
    client: Client,
    url: String,
    token: String,
    org: String,
    bucket: String,
}

impl InfluxWriter {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            url: config.influxdb_url.trim_end_matches('/').to_string(),
            token: config.influxdb_token.clone(),
            org: config.influxdb_org.clone(),
            bucket: config.influxdb_bucket.clone(),
        }
    }
}

impl PointSink for InfluxWriter {
    async fn write_point(&self, point: &Point) -> Result<(), WriteError> {
        let mut request = self
            .client
            .post(format!("{}/api/v2/write", self.url))
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(point.to_line_protocol());
        if !self.token.is_empty() {
            request = request.header("Authorization", format!("Token {}", self.token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WriteError::Rejected {
                status,
                body: body.chars().take(512).collect(),
            });
        }

        tracing::debug!(bucket = %self.bucket, "wrote point");
        Ok(())
    }

    async fn close(&self) {
        // Nothing held open beyond the pooled HTTP client; safe to call
        // whether or not a write ever succeeded.
        tracing::debug!("influx writer closed");
    }
}
