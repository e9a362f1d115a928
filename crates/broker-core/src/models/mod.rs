//! Domain objects decoded from broker envelopes
//!
//! Each object keeps the links the broker embedded in its JSON and a handle to
//! the [`RestClient`] that produced it, so callers can issue follow-up
//! requests against those links.

// Defined ahead of the submodules so they see it by textual scope.
macro_rules! impl_resource {
    ($ty:ty) => {
        impl $crate::models::Resource for $ty {
            fn links(&self) -> &std::collections::HashMap<String, $crate::models::Link> {
                &self.links
            }

            fn client(&self) -> Option<&$crate::http::RestClient> {
                self.client.as_ref()
            }

            fn attach(&mut self, client: &$crate::http::RestClient) {
                self.client = Some(client.clone());
            }
        }
    };
}

pub mod application;
pub mod cartridge;
pub mod domain;
pub mod gear_group;
pub mod key;
pub mod link;
pub mod user;

pub use application::Application;
pub use cartridge::Cartridge;
pub use domain::Domain;
pub use gear_group::{Gear, GearGroup};
pub use key::Key;
pub use link::{Link, LinkParam};
pub use user::User;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::http::RestClient;

/// Common behaviour of every broker resource
pub trait Resource {
    /// Links the broker embedded in this resource, keyed by relation name
    fn links(&self) -> &HashMap<String, Link>;

    /// Client this resource was decoded by
    fn client(&self) -> Option<&RestClient>;

    /// Bind the resource to the client that decoded it
    fn attach(&mut self, client: &RestClient);

    fn has_link(&self, rel: &str) -> bool {
        self.links().contains_key(rel)
    }

    /// Look up a link, failing when the broker does not offer the operation
    fn link(&self, rel: &str) -> Result<&Link> {
        self.links().get(rel).ok_or_else(|| {
            Error::server_error(
                format!("The server does not support this operation (no '{}' link was provided)", rel),
                None,
            )
        })
    }
}

/// Treat an explicit JSON `null` the same as a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Timestamps that fail to parse are dropped rather than failing the whole object
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|value| DateTime::parse_from_rfc3339(&value).ok())
        .map(|value| value.with_timezone(&Utc)))
}
