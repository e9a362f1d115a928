//! HTTP pipeline for the broker REST API
//!
//! This module provides:
//! - Request options and their merge with client defaults
//! - Cached, configured transports
//! - Authentication providers with challenge handling
//! - A bounded attempt loop with a single retry for gateway errors
//! - Classification of failed responses and transport errors

pub mod auth;
pub mod classifier;
pub mod client;
pub mod executor;
pub mod failure;
pub mod options;
pub mod response;
pub mod retry;
pub mod tls;
pub mod tracer;
pub mod transport;

pub use auth::{create_auth_provider, AuthenticationProvider, BasicAuth, NoAuth, PasswordSource, TokenAuth};
pub use classifier::classify;
pub use client::{negotiate_api_version, Api, RestClient, CLIENT_API_VERSIONS};
pub use failure::{map_transport_error, FailureContext};
pub use options::{Accept, RequestAuth, RequestBody, RequestDefaults, RequestOptions};
pub use response::RawResponse;
pub use retry::{AttemptState, AttemptTracker, RetryPolicy};
pub use tls::TlsFailure;
pub use tracer::{LoggingTracer, RequestTracer};
pub use transport::{TransportCache, TransportSettings};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
