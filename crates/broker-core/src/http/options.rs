//! Per-call request options and the client-level defaults they are merged with

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

/// Media type requested through the `Accept` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accept {
    /// Short tag expanded to `application/<tag>`
    Tag(String),
    /// Media type used as given
    Literal(String),
}

impl Accept {
    pub fn json() -> Self {
        Accept::Tag("json".to_string())
    }

    /// Media type without any version parameter
    pub fn media_type(&self) -> String {
        match self {
            Accept::Tag(tag) => format!("application/{}", tag),
            Accept::Literal(literal) => literal.clone(),
        }
    }

    /// Header value, with `; version=` appended when an API version is pinned
    pub fn header_value(&self, api_version: Option<&str>) -> String {
        match api_version {
            Some(version) => format!("{}; version={}", self.media_type(), version),
            None => self.media_type(),
        }
    }
}

impl Default for Accept {
    fn default() -> Self {
        Accept::json()
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// Credentials attached to a single request by an authentication provider
#[derive(Clone, PartialEq, Eq)]
pub enum RequestAuth {
    Basic { username: String, password: Option<String> },
    Bearer(String),
}

impl std::fmt::Debug for RequestAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            RequestAuth::Bearer(_) => f.debug_tuple("Bearer").field(&"[REDACTED]").finish(),
        }
    }
}

/// Everything needed to issue one logical request.
///
/// Options are never mutated across attempts: each attempt starts from the
/// caller's options merged with the client's [`RequestDefaults`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub accept: Option<Accept>,
    pub api_version: Option<String>,
    pub payload: Option<RequestBody>,
    pub connect_timeout: Option<Duration>,
    pub receive_timeout: Option<Duration>,
    pub auth: Option<RequestAuth>,
}

impl RequestOptions {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: BTreeMap::new(),
            accept: None,
            api_version: None,
            payload: None,
            connect_timeout: None,
            receive_timeout: None,
            auth: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_accept(mut self, accept: Accept) -> Self {
        self.accept = Some(accept);
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.payload = Some(RequestBody::Json(body));
        self
    }

    pub fn with_form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.payload = Some(RequestBody::Form(pairs));
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    pub fn with_auth(mut self, auth: RequestAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    /// Fill every unset value from `defaults`; values set on `self` always win.
    pub fn merged_with(&self, defaults: &RequestDefaults) -> RequestOptions {
        let mut merged = self.clone();
        for (name, value) in &defaults.headers {
            let already_set = merged.headers.keys().any(|k| k.eq_ignore_ascii_case(name));
            if !already_set {
                merged.headers.insert(name.clone(), value.clone());
            }
        }
        if merged.accept.is_none() {
            merged.accept = Some(defaults.accept.clone());
        }
        if merged.api_version.is_none() {
            merged.api_version = defaults.api_version.clone();
        }
        merged.connect_timeout = merged.connect_timeout.or(Some(defaults.connect_timeout));
        merged.receive_timeout = merged.receive_timeout.or(Some(defaults.receive_timeout));
        merged
    }

    /// Resolved `Accept` header value
    pub fn accept_header(&self) -> String {
        self.accept
            .clone()
            .unwrap_or_default()
            .header_value(self.api_version.as_deref())
    }

    /// Header map sent on the wire, including the resolved `Accept`
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::configuration(format!("Invalid header name '{}': {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::configuration(format!("Invalid value for header '{}': {}", name, e)))?;
            map.insert(header_name, header_value);
        }
        let accept = HeaderValue::from_str(&self.accept_header())
            .map_err(|e| Error::configuration(format!("Invalid Accept header: {}", e)))?;
        map.insert(ACCEPT, accept);
        Ok(map)
    }
}

/// Client-level values every request inherits unless it sets its own
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDefaults {
    pub headers: BTreeMap<String, String>,
    pub accept: Accept,
    pub api_version: Option<String>,
    pub connect_timeout: Duration,
    pub receive_timeout: Duration,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            accept: Accept::json(),
            api_version: None,
            connect_timeout: Duration::from_secs(30),
            receive_timeout: Duration::from_secs(120),
        }
    }
}
