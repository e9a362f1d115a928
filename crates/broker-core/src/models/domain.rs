//! Namespace that groups a user's applications

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::RestClient;

use super::{null_as_default, Link};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Domain name (older brokers call it `id`)
    #[serde(alias = "name")]
    pub id: String,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: HashMap<String, Link>,
    /// Attributes this client does not model explicitly
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    #[serde(skip)]
    pub(crate) client: Option<RestClient>,
}

impl_resource!(Domain);

impl Domain {
    pub fn name(&self) -> &str {
        &self.id
    }
}
