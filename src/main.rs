mod config;
mod influx;
mod monitor;
mod probe;
mod record;

use crate::config::Config;
use crate::influx::InfluxWriter;
use crate::monitor::SpeedMonitor;
use crate::probe::SpeedtestCli;
use anyhow::Result;

fn init_tracing(config: &Config) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config)?;

    let probe = SpeedtestCli::new(&config);
    let sink = InfluxWriter::new(&config);
    let monitor = SpeedMonitor::new(&config, probe, sink);

    monitor
        .run(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
        })
        .await;

    Ok(())
}
