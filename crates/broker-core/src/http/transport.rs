//! Construction and reuse of configured reqwest clients
//!
//! A transport is keyed by every setting that has to be fixed when the
//! underlying client is built. Requests with identical settings share one
//! client (and its connection pool); any difference builds a new one.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::{Certificate, Client, Proxy};

use crate::error::{Error, Result};

/// Cached clients kept before the cache is flushed
const MAX_CACHED_TRANSPORTS: usize = 8;

/// Everything that shapes a transport
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub receive_timeout: Duration,
    pub proxy: Option<String>,
    pub ca_file: Option<PathBuf>,
    pub insecure: bool,
}

impl TransportSettings {
    /// Build a reqwest client for these settings
    pub fn build(&self) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(self.user_agent.clone())
            .connect_timeout(self.connect_timeout)
            .timeout(self.receive_timeout)
            .danger_accept_invalid_certs(self.insecure);

        if let Some(proxy) = &self.proxy {
            let proxy = Proxy::all(proxy.as_str()).map_err(|e| Error::Configuration {
                message: format!("Invalid proxy '{}'", proxy),
                source: Some(e.into()),
            })?;
            builder = builder.proxy(proxy);
        }

        if let Some(path) = &self.ca_file {
            let pem = std::fs::read(path).map_err(|e| Error::Configuration {
                message: format!("Unable to read CA file {}", path.display()),
                source: Some(e.into()),
            })?;
            let certificate = Certificate::from_pem(&pem).map_err(|e| Error::Configuration {
                message: format!("CA file {} is not a PEM certificate", path.display()),
                source: Some(e.into()),
            })?;
            builder = builder.add_root_certificate(certificate);
        }

        builder.build().map_err(|e| Error::Configuration {
            message: "Failed to create HTTP client".to_string(),
            source: Some(e.into()),
        })
    }
}

/// Transports built so far, keyed by their settings
#[derive(Debug, Default)]
pub struct TransportCache {
    clients: Mutex<HashMap<TransportSettings, Client>>,
}

impl TransportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached client for `settings`, building it on first use
    pub fn get(&self, settings: &TransportSettings) -> Result<Client> {
        if let Some(client) = self.lock()?.get(settings) {
            return Ok(client.clone());
        }

        let client = settings.build()?;
        let mut clients = self.lock()?;
        if clients.len() >= MAX_CACHED_TRANSPORTS {
            log::debug!("Flushing {} cached transports", clients.len());
            clients.clear();
        }
        clients.insert(settings.clone(), client.clone());
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().map(|clients| clients.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<TransportSettings, Client>>> {
        self.clients
            .lock()
            .map_err(|_| Error::configuration("Transport cache lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn settings() -> TransportSettings {
        TransportSettings {
            user_agent: "broker-core/test".to_string(),
            connect_timeout: Duration::from_secs(5),
            receive_timeout: Duration::from_secs(10),
            proxy: None,
            ca_file: None,
            insecure: false,
        }
    }

    #[test]
    fn test_identical_settings_reuse_transport() {
        let cache = TransportCache::new();
        cache.get(&settings()).unwrap();
        cache.get(&settings()).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_changed_settings_build_new_transport() {
        let cache = TransportCache::new();
        cache.get(&settings()).unwrap();
        cache
            .get(&TransportSettings {
                receive_timeout: Duration::from_secs(60),
                ..settings()
            })
            .unwrap();
        cache.get(&TransportSettings { insecure: true, ..settings() }).unwrap();
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_cache_is_bounded() {
        let cache = TransportCache::new();
        for secs in 1..=(MAX_CACHED_TRANSPORTS as u64 + 1) {
            cache
                .get(&TransportSettings {
                    connect_timeout: Duration::from_secs(secs),
                    ..settings()
                })
                .unwrap();
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_missing_ca_file() {
        let err = TransportSettings {
            ca_file: Some(PathBuf::from("/nonexistent/ca.pem")),
            ..settings()
        }
        .build()
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_proxy_accepted() {
        let client = TransportSettings {
            proxy: Some("http://proxy.example.com:3128".to_string()),
            ..settings()
        }
        .build();
        assert!(client.is_ok());
    }
}
