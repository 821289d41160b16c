use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

use crate::error::{Error, Result};
use crate::secrets::overlay_secrets_dir;

/// InfluxDB v2 connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluxDbConfig {
    /// Server URL, e.g. "http://influxdb:8086".
    #[serde(default = "default_url")]
    pub url: String,

    /// API token.
    #[serde(default)]
    pub token: String,

    /// Organization name.
    #[serde(default)]
    pub org: String,

    /// Destination bucket.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs", deserialize_with = "number_or_string")]
    pub timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_bucket() -> String {
    "iioflux".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for InfluxDbConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: String::new(),
            org: String::new(),
            bucket: default_bucket(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl InfluxDbConfig {
    /// Validate the connection settings.
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::Config("InfluxDB url cannot be empty".to_string()));
        }
        if self.bucket.is_empty() {
            return Err(Error::Config("InfluxDB bucket cannot be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "InfluxDB timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error" or "off".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Parse the configured level.
    pub fn level_filter(&self) -> Result<LevelFilter> {
        const LEVELS: [(&str, LevelFilter); 6] = [
            ("trace", LevelFilter::TRACE),
            ("debug", LevelFilter::DEBUG),
            ("info", LevelFilter::INFO),
            ("warn", LevelFilter::WARN),
            ("error", LevelFilter::ERROR),
            ("off", LevelFilter::OFF),
        ];

        LEVELS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(self.level.trim()))
            .map(|(_, filter)| *filter)
            .ok_or_else(|| {
                Error::Config(format!(
                    "'{}' is not a valid log level. Valid are: trace, debug, info, warn, error, off",
                    self.level
                ))
            })
    }
}

/// On-disk configuration file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json5,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension; JSON5 unless `.yaml`/`.yml`.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Json5,
        }
    }
}

/// Deserialize a number that may also be written as a string.
///
/// Secret files always overlay strings, so numeric settings accept both.
pub fn number_or_string<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Number(T),
        Text(String),
    }

    match Raw::<T>::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Parse configuration text into an untyped tree.
pub fn parse_value(content: &str, format: ConfigFormat) -> Result<serde_json::Value> {
    match format {
        ConfigFormat::Json5 => json5::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e))),
        ConfigFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e))),
    }
}

/// Read a configuration file into an untyped tree, overlaying secrets from
/// `secrets_dir` if given.
pub fn load_value(
    path: impl AsRef<Path>,
    secrets_dir: Option<&Path>,
) -> Result<serde_json::Value> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let mut value = parse_value(&content, ConfigFormat::from_path(path)).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
        other => other,
    })?;

    if let Some(dir) = secrets_dir {
        let applied = overlay_secrets_dir(&mut value, dir)?;
        tracing::debug!(dir = %dir.display(), applied, "Merged secrets into configuration");
    }

    Ok(value)
}

/// Load a configuration file (JSON5 or YAML) into a typed structure.
pub fn load_config<T: for<'de> Deserialize<'de>>(
    path: impl AsRef<Path>,
    secrets_dir: Option<&Path>,
) -> Result<T> {
    let value = load_value(path, secrets_dir)?;
    serde_json::from_value(value).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct BaseConfig {
        #[serde(default)]
        influxdb: InfluxDbConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    fn parse_base(json5: &str) -> Result<BaseConfig> {
        let value = parse_value(json5, ConfigFormat::Json5)?;
        serde_json::from_value(value).map_err(|e| Error::Config(e.to_string()))
    }

    #[test]
    fn test_parse_base_config() {
        let json5 = r#"
        {
            influxdb: {
                url: "http://influxdb.influxdb:8086",
                org: "home",
                bucket: "iioflux/autogen",
            },
            logging: {
                level: "debug",
            },
        }
        "#;

        let config: BaseConfig = parse_base(json5).unwrap();

        assert_eq!(config.influxdb.url, "http://influxdb.influxdb:8086");
        assert_eq!(config.influxdb.org, "home");
        assert_eq!(config.influxdb.bucket, "iioflux/autogen");
        assert_eq!(config.influxdb.timeout_secs, 10);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_default_config() {
        let config: BaseConfig = parse_base("{}").unwrap();

        assert_eq!(config.influxdb, InfluxDbConfig::default());
        assert_eq!(config.influxdb.bucket, "iioflux");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        config.influxdb.validate().unwrap();
    }

    #[test]
    fn test_numbers_accepted_as_strings() {
        let config = parse_base(r#"{ influxdb: { timeout_secs: "30" } }"#).unwrap();
        assert_eq!(config.influxdb.timeout_secs, 30);

        let config = parse_base(r#"{ influxdb: { timeout_secs: 5 } }"#).unwrap();
        assert_eq!(config.influxdb.timeout_secs, 5);

        assert!(parse_base(r#"{ influxdb: { timeout_secs: "soon" } }"#).is_err());
    }

    #[test]
    fn test_json_logging_format() {
        let json5 = r#"{ logging: { level: "warn", format: "json" } }"#;
        let config: BaseConfig = parse_base(json5).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_log_level_validation() {
        for level in ["trace", "DEBUG", "info", "Warn", "error", "off"] {
            let logging = LoggingConfig {
                level: level.to_string(),
                format: LogFormat::Text,
            };
            assert!(logging.level_filter().is_ok(), "{level} should be valid");
        }

        for level in ["verbose", "", "  ", "3", "0", "5", "warning"] {
            let logging = LoggingConfig {
                level: level.to_string(),
                format: LogFormat::Text,
            };
            assert!(
                matches!(logging.level_filter(), Err(Error::Config(_))),
                "{level:?} should be rejected"
            );
        }

        let logging = LoggingConfig {
            level: "Info".to_string(),
            format: LogFormat::Text,
        };
        assert_eq!(logging.level_filter().unwrap(), LevelFilter::INFO);
    }

    #[test]
    fn test_influxdb_validation() {
        let mut config = InfluxDbConfig::default();
        config.bucket.clear();
        assert!(config.validate().is_err());

        let mut config = InfluxDbConfig::default();
        config.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.YML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json5")), ConfigFormat::Json5);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Json5);
    }

    #[test]
    fn test_load_yaml_with_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "influxdb:\n  url: http://db:8086\n  token: placeholder\nlogging:\n  level: info\n",
        )
        .unwrap();

        let secrets = tempfile::tempdir().unwrap();
        std::fs::write(secrets.path().join("influxdb.token"), "real-token\n").unwrap();

        let config: BaseConfig = load_config(&path, Some(secrets.path())).unwrap();
        assert_eq!(config.influxdb.url, "http://db:8086");
        assert_eq!(config.influxdb.token, "real-token");
    }

    #[test]
    fn test_load_missing_file() {
        let result: Result<BaseConfig> = load_config("/nonexistent/config.json5", None);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
