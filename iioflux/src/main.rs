//! iioflux: submit IIO sensor measurements into InfluxDB.

use anyhow::{Context, Result};
use tracing::info;

use iioflux::sensor::SensorContext;
use iioflux::{HostPoller, IiofluxConfig, Submitter};
use iioflux_framework::{CollectorArgs, CollectorConfig, CollectorRunner};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CollectorArgs::parse_with_default("iioflux.json5");

    let config = IiofluxConfig::from_args(&args)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let runner = CollectorRunner::new("iioflux", config)
        .await
        .context("Failed to start collector")?;

    let config = runner.config();
    let mut hosts = Vec::with_capacity(config.hosts.len());
    for host in &config.hosts {
        let uri = host.sensor_uri()?;
        info!(host = %host.name, %uri, "Connecting to sensor host");

        let context = SensorContext::connect(&uri, host.timeout())
            .await
            .with_context(|| format!("Failed to connect to host '{}' ({})", host.name, uri))?;
        hosts.push(HostPoller::from_config(host, context));
    }

    let mut submitter = Submitter::new(hosts, runner.sink(), config.interval());
    let scheduler = runner.scheduler();

    runner
        .run(async move { submitter.run(&scheduler).await })
        .await?;

    Ok(())
}
