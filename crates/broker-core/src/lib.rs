//! Broker Core - Resilient client for a platform-management REST broker
//!
//! Every broker operation (create a domain, list cartridges, manage keys)
//! goes through one request pipeline with shared retry, authentication
//! challenge and error-classification behaviour.
//!
//! # Main Components
//!
//! - **Error Handling**: one [`Error`] variant per failure, using `thiserror`
//! - **HTTP Pipeline**: [`RestClient`] with a bounded attempt loop
//! - **Envelopes**: typed decoding of broker responses into [`Payload`]
//! - **Models**: domains, applications, cartridges, users, keys and gear groups
//!
//! # Example
//!
//! ```no_run
//! use broker_core::{ClientConfig, RestClient, Result};
//!
//! async fn example() -> Result<()> {
//!     let client = RestClient::new(ClientConfig::load()?)?;
//!     for domain in client.domains().await? {
//!         println!("{}", domain.name());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod logging;
pub mod models;

// Re-export main types for convenience
pub use config::{ClientConfig, Credentials};
pub use envelope::{Message, Payload};
pub use error::{Error, ErrorKind, Result};
pub use http::{
    AuthenticationProvider, RawResponse, RequestOptions, RestClient, RetryPolicy,
};
pub use logging::{init_logging, LoggingConfig};
pub use models::{Application, Cartridge, Domain, GearGroup, Key, Link, Resource, User};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
