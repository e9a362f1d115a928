//! SSH public key registered with the account

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::RestClient;

use super::{null_as_default, Link};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub name: String,
    /// Key algorithm, e.g. `ssh-rsa`
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: HashMap<String, Link>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    #[serde(skip)]
    pub(crate) client: Option<RestClient>,
}

impl_resource!(Key);

impl Key {
    /// Key in the `authorized_keys` line format
    pub fn authorized_key(&self) -> String {
        format!("{} {} {}", self.kind, self.content, self.name)
    }
}
