//! Cartridges are the runtimes and services an application is built from

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::RestClient;

use super::{null_as_default, Link};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cartridge {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// `standalone` for web runtimes, `embedded` for add-ons
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: HashMap<String, Link>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    #[serde(skip)]
    pub(crate) client: Option<RestClient>,
}

impl_resource!(Cartridge);

impl Cartridge {
    pub fn is_standalone(&self) -> bool {
        self.kind.as_deref() == Some("standalone")
    }

    pub fn is_embedded(&self) -> bool {
        self.kind.as_deref() == Some("embedded")
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
