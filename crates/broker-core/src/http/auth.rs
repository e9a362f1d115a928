//! Authentication providers for the broker
//!
//! A provider signs outgoing requests and decides whether a response is an
//! authentication challenge worth answering with a fresh attempt:
//! - Anonymous access
//! - HTTP basic credentials, with an optional password callback
//! - API tokens, falling back to basic credentials once a token is rejected

use std::fmt;
use std::sync::{Arc, Mutex};

use reqwest::StatusCode;

use crate::config::Credentials;
use crate::error::Result;
use crate::http::options::{RequestAuth, RequestOptions};
use crate::http::response::RawResponse;

/// Callback asked for a password when the broker challenges a username
pub type PasswordSource = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Signs requests and answers authentication challenges
pub trait AuthenticationProvider: Send + Sync + fmt::Debug {
    /// Attach credentials to an outgoing request
    fn augment(&self, options: RequestOptions) -> Result<RequestOptions>;

    /// Whether `response` is a challenge that a fresh attempt can answer.
    ///
    /// Providers may update their stored credentials before returning `true`.
    fn retry_authentication_challenge(&self, response: &RawResponse) -> bool;
}

fn is_challenge(response: &RawResponse) -> bool {
    response.status == StatusCode::UNAUTHORIZED
}

/// Sends no credentials and never retries
#[derive(Debug, Clone, Default)]
pub struct NoAuth;

impl AuthenticationProvider for NoAuth {
    fn augment(&self, options: RequestOptions) -> Result<RequestOptions> {
        Ok(options)
    }

    fn retry_authentication_challenge(&self, _response: &RawResponse) -> bool {
        false
    }
}

#[derive(Default)]
struct BasicState {
    password: Option<String>,
    prompted: bool,
}

/// HTTP basic credentials
pub struct BasicAuth {
    username: String,
    state: Mutex<BasicState>,
    password_source: Option<PasswordSource>,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            state: Mutex::new(BasicState { password, prompted: false }),
            password_source: None,
        }
    }

    /// Ask `source` for a password the first time the broker rejects us
    pub fn with_password_source(mut self, source: PasswordSource) -> Self {
        self.password_source = Some(source);
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn password(&self) -> Option<String> {
        self.state.lock().ok().and_then(|state| state.password.clone())
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("has_password_source", &self.password_source.is_some())
            .finish()
    }
}

impl AuthenticationProvider for BasicAuth {
    fn augment(&self, options: RequestOptions) -> Result<RequestOptions> {
        if options.auth.is_some() {
            return Ok(options);
        }
        Ok(options.with_auth(RequestAuth::Basic {
            username: self.username.clone(),
            password: self.password(),
        }))
    }

    fn retry_authentication_challenge(&self, response: &RawResponse) -> bool {
        if !is_challenge(response) {
            return false;
        }
        let Some(source) = &self.password_source else {
            return false;
        };
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.prompted {
            return false;
        }
        state.prompted = true;

        match source(&self.username) {
            Some(password) => {
                log::debug!("Retrying with a new password for {}", self.username);
                state.password = Some(password);
                true
            }
            None => false,
        }
    }
}

/// API token, optionally backed by basic credentials
pub struct TokenAuth {
    token: Mutex<Option<String>>,
    fallback: Option<BasicAuth>,
}

impl TokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
            fallback: None,
        }
    }

    /// Use `fallback` once the token has been rejected
    pub fn with_fallback(mut self, fallback: BasicAuth) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.lock().map(|token| token.is_some()).unwrap_or(false)
    }
}

impl fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuth")
            .field("has_token", &self.has_token())
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl AuthenticationProvider for TokenAuth {
    fn augment(&self, options: RequestOptions) -> Result<RequestOptions> {
        let token = self.token.lock().ok().and_then(|token| token.clone());
        match (token, &self.fallback) {
            (Some(token), _) => Ok(options.with_auth(RequestAuth::Bearer(token))),
            (None, Some(fallback)) => fallback.augment(options),
            (None, None) => Ok(options),
        }
    }

    fn retry_authentication_challenge(&self, response: &RawResponse) -> bool {
        if !is_challenge(response) {
            return false;
        }
        if let Ok(mut token) = self.token.lock() {
            if token.take().is_some() {
                log::warn!("The broker rejected the configured token");
                return self.fallback.is_some();
            }
        }
        self.fallback
            .as_ref()
            .map(|fallback| fallback.retry_authentication_challenge(response))
            .unwrap_or(false)
    }
}

/// Pick a provider for the configured credentials
pub fn create_auth_provider(credentials: &Credentials) -> Arc<dyn AuthenticationProvider> {
    let basic = credentials
        .username
        .as_ref()
        .map(|username| BasicAuth::new(username.clone(), credentials.password.clone()));

    match (&credentials.token, basic) {
        (Some(token), Some(basic)) => Arc::new(TokenAuth::new(token.clone()).with_fallback(basic)),
        (Some(token), None) => Arc::new(TokenAuth::new(token.clone())),
        (None, Some(basic)) => Arc::new(basic),
        (None, None) => Arc::new(NoAuth),
    }
}
