use serde::Deserialize;
use std::fs::File;
use vdc::config::Config as VdcConfig;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub vdc: VdcConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data: Config = serde_yaml::from_reader(file)?;
        data.validate()?;

        Ok(data)
    }

    /// Checks the common sections. The `vdc` section is validated when the service starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(logging) = &self.common.logging {
            logging
                .sentry_dsn
                .parse::<sentry::types::Dsn>()
                .map_err(|e| ConfigError::InvalidSentryDsn(e.to_string()))?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid sentry dsn: {0}")]
    InvalidSentryDsn(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: "https://public@sentry.example.com/1"
            vdc:
                listener:
                    host: 127.0.0.1
                    port: 9000
                trace: true
                dal: "dal:50055"
                log: "http://collector:8484"
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(config.vdc.listener.port, 9000);
        assert_eq!(config.vdc.dal_address(), Some("dal:50055"));
        assert!(config.vdc.trace_enabled());
    }

    #[test]
    fn only_common_sections() {
        let yaml = r#"
            metrics:
                statsd_host: localhost
                statsd_port: 8125
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert!(config.common.logging.is_none());
        assert_eq!(config.vdc, VdcConfig::default());
    }

    #[test]
    fn invalid_files() {
        assert!(matches!(
            Config::from_file(std::path::Path::new("/does/not/exist.yaml")),
            Err(ConfigError::LoadError(_))
        ));

        let tmp = write_tmp_file("vdc:\n    listener:\n        port: not_a_number\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));

        let tmp = write_tmp_file("logging:\n    sentry_dsn: not-a-dsn\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::InvalidSentryDsn(_))
        ));
    }
}
