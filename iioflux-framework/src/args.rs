//! CLI argument parsing for the collector.
//!
//! Every flag can also be set through the environment, which is how the
//! collector is usually configured when running in a container.

use std::path::PathBuf;

use clap::{Args, Parser};
use iioflux_common::InfluxDbConfig;

/// Common CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(about = "Submit IIO sensor measurements into InfluxDB")]
pub struct CollectorArgs {
    /// Path to configuration file (JSON5 or YAML).
    #[arg(short, long, env = "IIOFLUX_CONFIG")]
    pub config: PathBuf,

    /// Directory of secret files to merge into the configuration.
    ///
    /// Each file name is a dot-separated path, e.g. `influxdb.token`.
    #[arg(long, env = "IIOFLUX_SECRETS_DIR")]
    pub secrets_dir: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, env = "IIOFLUX_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Override the polling interval, in seconds.
    #[arg(long, env = "IIOFLUX_INTERVAL_SECS")]
    pub interval_secs: Option<u64>,

    #[command(flatten)]
    pub influxdb: InfluxDbArgs,
}

/// InfluxDB connection overrides, named after the official client's
/// environment variables.
#[derive(Args, Debug, Clone, Default)]
pub struct InfluxDbArgs {
    /// InfluxDB URL.
    #[arg(long = "influxdb-url", env = "INFLUXDB_V2_URL")]
    pub url: Option<String>,

    /// InfluxDB API token.
    #[arg(long = "influxdb-token", env = "INFLUXDB_V2_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// InfluxDB organization.
    #[arg(long = "influxdb-org", env = "INFLUXDB_V2_ORG")]
    pub org: Option<String>,

    /// InfluxDB bucket.
    #[arg(long = "influxdb-bucket", env = "INFLUXDB_V2_BUCKET")]
    pub bucket: Option<String>,
}

impl InfluxDbArgs {
    /// Apply the overrides that were given.
    pub fn apply(&self, config: &mut InfluxDbConfig) {
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(token) = &self.token {
            config.token = token.clone();
        }
        if let Some(org) = &self.org {
            config.org = org.clone();
        }
        if let Some(bucket) = &self.bucket {
            config.bucket = bucket.clone();
        }
    }
}

impl CollectorArgs {
    /// Parse CLI arguments with a default config path.
    ///
    /// If neither `--config` nor `IIOFLUX_CONFIG` is provided, uses the default.
    pub fn parse_with_default(default_config: &'static str) -> Self {
        let matches = <Self as clap::CommandFactory>::command()
            .mut_arg("config", |arg| arg.default_value(default_config))
            .get_matches();

        <Self as clap::FromArgMatches>::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_from_flags() {
        let args = CollectorArgs::try_parse_from([
            "iioflux",
            "--config",
            "sensors.yaml",
            "--log-level",
            "debug",
            "--interval-secs",
            "30",
            "--influxdb-bucket",
            "solar",
        ])
        .unwrap();

        assert_eq!(args.config, PathBuf::from("sensors.yaml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.interval_secs, Some(30));
        assert_eq!(args.influxdb.bucket.as_deref(), Some("solar"));
    }

    #[test]
    fn test_influxdb_overrides() {
        let overrides = InfluxDbArgs {
            url: Some("http://influxdb.influxdb:8086".to_string()),
            token: None,
            org: Some("home".to_string()),
            bucket: None,
        };

        let mut config = InfluxDbConfig {
            token: "from-file".to_string(),
            ..InfluxDbConfig::default()
        };
        overrides.apply(&mut config);

        assert_eq!(config.url, "http://influxdb.influxdb:8086");
        assert_eq!(config.token, "from-file");
        assert_eq!(config.org, "home");
        assert_eq!(config.bucket, "iioflux");
    }
}
