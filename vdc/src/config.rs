use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Invalid log endpoint {0:?}: {1}")]
    InvalidLogEndpoint(String, String),

    #[error("Invalid dal address {0:?}: {1}")]
    InvalidDalAddress(String, String),
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Mock VDC configuration.
///
/// Empty strings for `dal` and `log` are treated the same as leaving them unset, so a
/// command line like `--dal ""` switches the service back to mock mode.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    /// Forward trace headers to the log collector. Only has an effect when `log` is set.
    #[serde(default)]
    pub trace: bool,
    /// Address of the DAL query service. Unset means every answer is the mock payload.
    #[serde(default)]
    pub dal: Option<String>,
    /// Base URL of the log collector. Unset means console-only logging.
    #[serde(default)]
    pub log: Option<String>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if let Some(log) = self.log_endpoint() {
            let url = Url::parse(log)
                .map_err(|e| ValidationError::InvalidLogEndpoint(log.into(), e.to_string()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ValidationError::InvalidLogEndpoint(
                    log.into(),
                    format!("unsupported scheme {}", url.scheme()),
                ));
            }
        }

        if let Some(dal) = self.dal_address() {
            let uri: http::Uri = dal_uri(dal)
                .parse()
                .map_err(|e: http::uri::InvalidUri| {
                    ValidationError::InvalidDalAddress(dal.into(), e.to_string())
                })?;
            if uri.authority().is_none() {
                return Err(ValidationError::InvalidDalAddress(
                    dal.into(),
                    "missing host".into(),
                ));
            }
        }

        Ok(())
    }

    /// Collector base URL without a trailing slash, if logging is enabled.
    pub fn log_endpoint(&self) -> Option<&str> {
        self.log
            .as_deref()
            .map(|log| log.trim_end_matches('/'))
            .filter(|log| !log.is_empty())
    }

    pub fn dal_address(&self) -> Option<&str> {
        self.dal.as_deref().filter(|dal| !dal.is_empty())
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace && self.log_endpoint().is_some()
    }
}

/// Bare `host:port` addresses are dialed over plaintext HTTP/2.
pub fn dal_uri(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}
