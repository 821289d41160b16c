//! Measurement sinks.
//!
//! A sink receives one batch of measurements per host per tick. A returned
//! `Ok` means the batch was delivered; there is no local retry queue.

use std::future::Future;
use std::time::Duration;

use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use iioflux_common::lineproto::PRECISION;
use iioflux_common::{InfluxDbConfig, Measurement, encode_batch};

use crate::error::{CollectorError, Result};

/// Destination for measurement batches.
pub trait MeasurementSink: Send + Sync {
    /// Deliver all measurements taken from `host` during one tick.
    fn submit(
        &self,
        host: &str,
        measurements: &[Measurement],
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Answer of the InfluxDB `/health` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    /// "pass" or "fail".
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Writes measurements to InfluxDB v2 using the line protocol over HTTP.
#[derive(Clone, Debug)]
pub struct InfluxWriter {
    client: reqwest::Client,
    write_url: Url,
    health_url: Url,
    token: String,
    bucket: String,
}

impl InfluxWriter {
    /// Create a writer from connection settings. Does not contact the server.
    pub fn new(config: &InfluxDbConfig) -> Result<Self> {
        let mut base = Url::parse(&config.url)
            .map_err(|e| CollectorError::config(format!("Invalid InfluxDB url '{}': {}", config.url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let join = |path: &str| {
            base.join(path)
                .map_err(|e| CollectorError::config(format!("Invalid InfluxDB url: {}", e)))
        };

        let mut write_url = join("api/v2/write")?;
        {
            let mut query = write_url.query_pairs_mut();
            if !config.org.is_empty() {
                query.append_pair("org", &config.org);
            }
            query.append_pair("bucket", &config.bucket);
            query.append_pair("precision", PRECISION);
        }
        let health_url = join("health")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            write_url,
            health_url,
            token: config.token.clone(),
            bucket: config.bucket.clone(),
        })
    }

    /// Full write endpoint, including query parameters.
    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    /// Destination bucket.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Query the server's health endpoint.
    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self.client.get(self.health_url.clone()).send().await?;
        let body = response.text().await?;

        serde_json::from_str(&body)
            .map_err(|e| CollectorError::Unhealthy(format!("unexpected health answer: {}", e)))
    }

    /// Fail unless the server reports itself healthy.
    pub async fn ensure_healthy(&self) -> Result<()> {
        let health = self.health().await?;

        if health.status != "pass" {
            return Err(CollectorError::Unhealthy(format!(
                "status={} {}",
                health.status,
                health.message.unwrap_or_default()
            )));
        }

        tracing::info!(
            version = health.version.as_deref().unwrap_or("unknown"),
            "Connected with InfluxDB"
        );
        Ok(())
    }
}

impl MeasurementSink for InfluxWriter {
    async fn submit(&self, host: &str, measurements: &[Measurement]) -> Result<()> {
        let (body, lines) = encode_batch(measurements);
        if lines == 0 {
            tracing::debug!(host, "Nothing to submit");
            return Ok(());
        }

        let mut request = self
            .client
            .post(self.write_url.clone())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body);
        if !self.token.is_empty() {
            request = request.header(AUTHORIZATION, format!("Token {}", self.token));
        }

        let response = request.send().await.map_err(|e| CollectorError::Submit {
            host: host.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollectorError::Rejected {
                host: host.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(host, lines, bucket = %self.bucket, "Submitted measurements");
        Ok(())
    }
}
