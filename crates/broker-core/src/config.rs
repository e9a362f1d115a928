//! Client configuration
//!
//! Values are resolved in this order, later sources winning:
//! - Default values
//! - A TOML configuration file
//! - `BROKER_*` environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::http::RetryPolicy;

/// Path of the REST API below the server root
pub const REST_ROOT: &str = "/broker/rest/";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker address, either a bare host or a full REST root URL
    pub server: String,

    /// User-Agent sent with every request
    pub user_agent: String,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Receive timeout in seconds
    pub receive_timeout_secs: u64,

    /// Accept any server certificate
    pub insecure: bool,

    /// Additional trusted CA in PEM format
    pub ca_file: Option<PathBuf>,

    /// Proxy for every request
    pub proxy: Option<String>,

    /// Pin a specific API version instead of negotiating one
    pub api_version: Option<String>,

    /// Trace requests and responses at debug level
    pub debug: bool,

    /// Attempt policy
    pub retry: RetryPolicy,

    pub credentials: Credentials,
}

/// What the client authenticates with
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            user_agent: format!("broker-core/{}", crate::VERSION),
            connect_timeout_secs: 30,
            receive_timeout_secs: 120,
            insecure: false,
            ca_file: None,
            proxy: None,
            api_version: None,
            debug: false,
            retry: RetryPolicy::default(),
            credentials: Credentials::default(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `server`
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Configuration {
            message: format!("Unable to read {}", path.display()),
            source: Some(e.into()),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Configuration { message, source } => Error::Configuration {
                message: format!("{} in {}", message, path.display()),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Configuration {
            message: "Invalid client configuration".to_string(),
            source: Some(e.into()),
        })
    }

    /// Load from the default location (if present) and apply the environment
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file or the default location
    pub fn load_with_file(file: Option<&Path>) -> Result<Self> {
        match file {
            Some(path) => {
                let mut config = Self::from_file(path)?;
                config.merge_env();
                config.validate()?;
                Ok(config)
            }
            None => Self::load(),
        }
    }

    /// `<config dir>/broker/client.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("broker").join("client.toml"))
    }

    /// Apply `BROKER_*` environment overrides
    pub fn merge_env(&mut self) {
        self.merge_env_from(|name| std::env::var(name).ok());
    }

    pub(crate) fn merge_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(server) = lookup("BROKER_SERVER") {
            self.server = server;
        }
        if let Some(insecure) = lookup("BROKER_INSECURE") {
            self.insecure = matches!(insecure.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(proxy) = lookup("BROKER_PROXY") {
            self.proxy = if proxy.is_empty() { None } else { Some(proxy) };
        }
        if let Some(token) = lookup("BROKER_TOKEN") {
            self.credentials.token = Some(token);
        }
        if let Some(username) = lookup("BROKER_USERNAME") {
            self.credentials.username = Some(username);
        }
        if let Some(password) = lookup("BROKER_PASSWORD") {
            self.credentials.password = Some(password);
        }
    }

    /// Reject settings no request could succeed with
    pub fn validate(&self) -> Result<()> {
        self.rest_root()?;
        if self.connect_timeout_secs == 0 || self.receive_timeout_secs == 0 {
            return Err(Error::configuration("Timeouts must be greater than zero"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::configuration("retry.max_attempts must be at least 1"));
        }
        if let Some(ca_file) = &self.ca_file {
            if !ca_file.is_file() {
                return Err(Error::configuration(format!(
                    "CA file {} does not exist",
                    ca_file.display()
                )));
            }
        }
        if let Some(proxy) = &self.proxy {
            Url::parse(proxy).map_err(|e| Error::Configuration {
                message: format!("Invalid proxy '{}'", proxy),
                source: Some(e.into()),
            })?;
        }
        Ok(())
    }

    /// Absolute URL of the REST API root, always ending in `/`
    pub fn rest_root(&self) -> Result<Url> {
        let server = self.server.trim();
        if server.is_empty() {
            return Err(Error::configuration("No server configured"));
        }

        let with_scheme = if server.contains("://") {
            server.to_string()
        } else {
            format!("https://{}", server)
        };
        let mut url = Url::parse(&with_scheme).map_err(|e| Error::Configuration {
            message: format!("Invalid server '{}'", server),
            source: Some(e.into()),
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(Error::configuration(format!(
                "Server '{}' must use http or https",
                server
            )));
        }

        if url.path() == "/" || url.path().is_empty() {
            url.set_path(REST_ROOT);
        } else if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs)
    }
}
