use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const DEFAULT_TRAINING_DATA: &str = "normal_machine_data.csv";
pub const DEFAULT_MODEL_PATH: &str = "isolation_forest_model.bin";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

pub const HOST_ENV: &str = "MACHINE_WATCH_HOST";
pub const PORT_ENV: &str = "MACHINE_WATCH_PORT";
pub const MODEL_ENV: &str = "MACHINE_WATCH_MODEL";

/// Where the prediction service listens and which model it serves.
///
/// The CLI fills this from its flags, falling back to the `MACHINE_WATCH_*` environment
/// variables and then to the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}

impl ServiceConfig {
    /// Replace the defaults with whichever values were given.
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        model_path: Option<PathBuf>,
    ) -> Self {
        if let Some(host) = host.map(|h| h.trim().to_string()).filter(|h| !h.is_empty()) {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(model_path) = model_path {
            self.model_path = model_path;
        }
        self
    }

    /// The host as an IP literal (brackets around IPv6 allowed), if it is one.
    fn ip(&self) -> Option<IpAddr> {
        self.host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .ok()
    }

    /// Resolve the listen address. IP literals are used as is, names go through DNS.
    pub async fn resolve(&self) -> Result<SocketAddr> {
        if let Some(ip) = self.ip() {
            return Ok(SocketAddr::new(ip, self.port));
        }
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| Error::InvalidParameter {
                name: HOST_ENV.to_string(),
                reason: format!("{} does not resolve to any address", self.host),
            })
    }
}
