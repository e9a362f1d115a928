//! The broker client
//!
//! [`RestClient`] owns the request pipeline and is the handle every decoded
//! resource keeps for follow-up calls. Cloning is cheap; clones share the
//! transport cache, the authentication provider and the API descriptor.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::OnceCell;
use url::Url;

use crate::config::ClientConfig;
use crate::envelope::Payload;
use crate::error::{Error, Result};
use crate::http::auth::{create_auth_provider, AuthenticationProvider};
use crate::http::executor::{self, RequestExecutor, TransportBase};
use crate::http::failure::FailureContext;
use crate::http::options::{RequestDefaults, RequestOptions};
use crate::http::response::RawResponse;
use crate::http::tracer::{LoggingTracer, RequestTracer};
use crate::models::{Cartridge, Domain, Key, Link, Resource, User};

/// API versions this client understands, oldest first
pub const CLIENT_API_VERSIONS: &[&str] = &["1.1", "1.2", "1.3", "1.4", "1.5", "1.6"];

/// The broker's API root: the operations it offers and the version in use
#[derive(Debug, Clone, PartialEq)]
pub struct Api {
    pub links: HashMap<String, Link>,
    pub api_version: Option<String>,
    pub supported_api_versions: Vec<String>,
}

impl Api {
    /// Look up a link, failing when the broker does not offer the operation
    pub fn link(&self, rel: &str) -> Result<&Link> {
        self.links.get(rel).ok_or_else(|| {
            Error::server_error(
                format!("The server does not support this operation (no '{}' link was provided)", rel),
                None,
            )
        })
    }

    pub fn supports(&self, rel: &str) -> bool {
        self.links.contains_key(rel)
    }

    /// Options for `rel`, pinned to the negotiated API version
    pub fn options(&self, rel: &str) -> Result<RequestOptions> {
        let options = self.link(rel)?.to_options()?;
        Ok(match &self.api_version {
            Some(version) => options.with_api_version(version.clone()),
            None => options,
        })
    }
}

#[derive(Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    data: HashMap<String, Link>,
    #[serde(default)]
    api_version: Option<serde_json::Value>,
    #[serde(default)]
    supported_api_versions: Vec<serde_json::Value>,
}

fn version_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Highest version both sides understand; a pinned version always wins
pub fn negotiate_api_version(pinned: Option<&str>, supported: &[String]) -> Option<String> {
    if let Some(pinned) = pinned {
        if !supported.is_empty() && !supported.iter().any(|v| v == pinned) {
            log::warn!("The server does not list API version {}; using it anyway", pinned);
        }
        return Some(pinned.to_string());
    }
    CLIENT_API_VERSIONS
        .iter()
        .rev()
        .find(|candidate| supported.iter().any(|v| v == *candidate))
        .map(|v| v.to_string())
}

struct ClientInner {
    url: Url,
    config: ClientConfig,
    executor: RequestExecutor,
    api: OnceCell<Api>,
}

/// Client for the broker REST API
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<ClientInner>,
}

impl RestClient {
    /// Client authenticating with the configured credentials
    pub fn new(config: ClientConfig) -> Result<Self> {
        let auth = create_auth_provider(&config.credentials);
        Self::with_auth(config, auth)
    }

    /// Client using a caller-supplied authentication provider
    pub fn with_auth(config: ClientConfig, auth: Arc<dyn AuthenticationProvider>) -> Result<Self> {
        let tracer: Option<Arc<dyn RequestTracer>> = if config.debug {
            Some(Arc::new(LoggingTracer))
        } else {
            None
        };
        Self::with_parts(config, auth, tracer)
    }

    /// Client with an explicit tracer, e.g. to capture traffic in tests
    pub fn with_tracer(
        config: ClientConfig,
        auth: Arc<dyn AuthenticationProvider>,
        tracer: Arc<dyn RequestTracer>,
    ) -> Result<Self> {
        Self::with_parts(config, auth, Some(tracer))
    }

    fn with_parts(
        config: ClientConfig,
        auth: Arc<dyn AuthenticationProvider>,
        tracer: Option<Arc<dyn RequestTracer>>,
    ) -> Result<Self> {
        config.validate()?;
        let url = config.rest_root()?;

        let defaults = RequestDefaults {
            api_version: config.api_version.clone(),
            connect_timeout: config.connect_timeout(),
            receive_timeout: config.receive_timeout(),
            ..RequestDefaults::default()
        };
        let base = TransportBase {
            user_agent: config.user_agent.clone(),
            proxy: config.proxy.clone(),
            ca_file: config.ca_file.clone(),
            insecure: config.insecure,
        };
        let executor = RequestExecutor::new(auth, defaults, base, config.retry.clone(), tracer);

        Ok(Self {
            inner: Arc::new(ClientInner {
                url,
                config,
                executor,
                api: OnceCell::new(),
            }),
        })
    }

    /// REST API root this client talks to
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Number of distinct transports built so far
    pub fn transport_count(&self) -> usize {
        self.inner.executor.transports().len()
    }

    /// Resolve a path relative to the REST root
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.inner.url.join(path.trim_start_matches('/')).map_err(|e| Error::Configuration {
            message: format!("Invalid path '{}'", path),
            source: Some(e.into()),
        })
    }

    /// Execute a request and decode the response envelope.
    ///
    /// Returns `None` for 204 responses and empty bodies.
    pub async fn request(&self, options: RequestOptions) -> Result<Option<Payload>> {
        let response = self.inner.executor.execute(&options).await?;
        executor::decode(&response, self)
    }

    /// Execute a request and hand the successful raw response to `handler`
    pub async fn request_with<T, F>(&self, options: RequestOptions, handler: F) -> Result<T>
    where
        F: FnOnce(RawResponse) -> Result<T>,
    {
        let response = self.inner.executor.execute(&options).await?;
        handler(response)
    }

    /// Synchronous [`RestClient::request`] on a private runtime
    #[cfg(feature = "blocking")]
    pub fn request_blocking(&self, options: RequestOptions) -> Result<Option<Payload>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Configuration {
                message: "Failed to create runtime".to_string(),
                source: Some(e.into()),
            })?;
        runtime.block_on(self.request(options))
    }

    /// The API descriptor, fetched once and shared by all clones
    pub async fn api(&self) -> Result<&Api> {
        self.inner.api.get_or_try_init(|| self.fetch_api()).await
    }

    async fn fetch_api(&self) -> Result<Api> {
        let pinned = self.inner.executor.defaults().api_version.clone();
        let root = self.fetch_api_root(None).await?;
        let negotiated = negotiate_api_version(pinned.as_deref(), &root.supported_api_versions);

        let api = match negotiated {
            Some(version) if root.api_version.as_deref() != Some(version.as_str()) => {
                log::debug!("Requesting API version {}", version);
                let mut api = self.fetch_api_root(Some(version.clone())).await?;
                api.api_version = Some(version);
                api
            }
            _ => root,
        };
        log::debug!("Using API version {:?} at {}", api.api_version, self.url());
        Ok(api)
    }

    async fn fetch_api_root(&self, version: Option<String>) -> Result<Api> {
        let mut options = RequestOptions::get(self.url().clone());
        if let Some(version) = version {
            options = options.with_api_version(version);
        }
        let context = self.failure_context();

        self.request_with(options, move |response| {
            let envelope: ApiEnvelope = response.json().map_err(|_| context.unreadable_response())?;
            Ok(Api {
                links: envelope.data,
                api_version: envelope.api_version.as_ref().map(version_string),
                supported_api_versions: envelope.supported_api_versions.iter().map(version_string).collect(),
            })
        })
        .await
    }

    fn failure_context(&self) -> FailureContext {
        FailureContext::new(self.url().clone(), self.inner.executor.proxy().map(str::to_string))
    }

    /// Error reported for bodies that are not valid broker envelopes
    pub(crate) fn unreadable_response_error(&self) -> Error {
        self.failure_context().unreadable_response()
    }

    async fn call(&self, options: RequestOptions) -> Result<Payload> {
        self.request(options)
            .await?
            .ok_or_else(|| self.unreadable_response_error())
    }

    pub async fn domains(&self) -> Result<Vec<Domain>> {
        let options = self.api().await?.options("LIST_DOMAINS")?;
        self.call(options).await?.into_domains()
    }

    pub async fn add_domain(&self, name: &str) -> Result<Domain> {
        log::debug!("Adding domain {}", name);
        let options = self.api().await?.options("ADD_DOMAIN")?.with_form([("id", name)]);
        self.call(options).await?.into_domain()
    }

    /// Domain whose name matches `name`, ignoring case
    pub async fn find_domain(&self, name: &str) -> Result<Domain> {
        self.domains()
            .await?
            .into_iter()
            .find(|domain| domain.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::ResourceNotFound {
                message: format!("Domain {} not found", name),
            })
    }

    pub async fn cartridges(&self) -> Result<Vec<Cartridge>> {
        let options = self.api().await?.options("LIST_CARTRIDGES")?;
        self.call(options).await?.into_cartridges()
    }

    pub async fn find_cartridges<P>(&self, predicate: P) -> Result<Vec<Cartridge>>
    where
        P: Fn(&Cartridge) -> bool,
    {
        Ok(self.cartridges().await?.into_iter().filter(|c| predicate(c)).collect())
    }

    pub async fn user(&self) -> Result<User> {
        let options = self.api().await?.options("GET_USER")?;
        self.call(options).await?.into_user()
    }

    pub async fn sshkeys(&self) -> Result<Vec<Key>> {
        let user = self.user().await?;
        let options = self.pinned(user.link("LIST_KEYS")?.to_options()?).await?;
        self.call(options).await?.into_keys()
    }

    pub async fn find_key(&self, name: &str) -> Result<Key> {
        self.sshkeys()
            .await?
            .into_iter()
            .find(|key| key.name == name)
            .ok_or_else(|| Error::ResourceNotFound {
                message: format!("SSH key {} does not exist", name),
            })
    }

    pub async fn add_key(&self, name: &str, content: &str, kind: &str) -> Result<Key> {
        log::debug!("Adding {} key {}", kind, name);
        let user = self.user().await?;
        let options = self
            .pinned(user.link("ADD_KEY")?.to_options()?)
            .await?
            .with_form([("name", name), ("type", kind), ("content", content)]);
        self.call(options).await?.into_key()
    }

    pub async fn delete_key(&self, name: &str) -> Result<()> {
        log::debug!("Deleting key {}", name);
        let key = self.find_key(name).await?;
        let options = self.pinned(key.link("DELETE")?.to_options()?).await?;
        self.request(options).await?;
        Ok(())
    }

    async fn pinned(&self, options: RequestOptions) -> Result<RequestOptions> {
        Ok(match &self.api().await?.api_version {
            Some(version) if options.api_version.is_none() => options.with_api_version(version.clone()),
            _ => options,
        })
    }
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("url", &self.inner.url.as_str())
            .field("proxy", &self.inner.config.proxy)
            .field("insecure", &self.inner.config.insecure)
            .finish()
    }
}

/// Clients are equal when they share the same pipeline
impl PartialEq for RestClient {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
