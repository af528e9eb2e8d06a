use crate::config::Config;
use crate::influx::PointSink;
use crate::probe::Probe;
use crate::record::SpeedSample;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Drives the measure-and-store loop: one cycle immediately on start, then
/// one per interval until the shutdown future resolves.
pub struct SpeedMonitor<P, S> {
    interval: Duration,
    server_id: Option<String>,
    probe: P,
    sink: S,
}

impl<P: Probe, S: PointSink> SpeedMonitor<P, S> {
    pub fn new(config: &Config, probe: P, sink: S) -> Self {
        Self {
            interval: config.test_interval(),
            server_id: config.server_id.clone(),
            probe,
            sink,
        }
    }

    /// One measurement-and-persist attempt. Probe and sink failures end the
    /// cycle, never the caller; the next tick is the only retry.
    pub async fn run_cycle(&self) {
        tracing::info!("running scheduled speed test");

        let raw = match self.probe.run_measurement(self.server_id.as_deref()).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(error = %err, "speed test failed");
                return;
            }
        };

        let sample = SpeedSample::from_raw(raw);
        tracing::info!(
            download_mbps = sample.download_mbps,
            upload_mbps = sample.upload_mbps,
            ping_ms = sample.ping_ms,
            "speed test completed"
        );

        match self.sink.write_point(&sample.to_point()).await {
            Ok(()) => {
                tracing::info!(timestamp = %sample.timestamp, "stored speed test result");
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to store speed test result");
            }
        }
    }

    /// Runs until `shutdown` resolves, then closes the sink. A cycle already
    /// underway finishes before the stop takes effect.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tracing::info!(
            interval_minutes = self.interval.as_secs() / 60,
            "speed monitor started"
        );

        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => self.run_cycle().await,
            }
        }

        self.sink.close().await;
        tracing::info!("speed monitor stopped");
    }
}
