//! Gears that share the same set of cartridges

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::RestClient;

use super::{null_as_default, Link};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GearGroup {
    pub name: String,
    #[serde(default)]
    pub gear_profile: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gears: Vec<Gear>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cartridges: Vec<Map<String, Value>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: HashMap<String, Link>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    #[serde(skip)]
    pub(crate) client: Option<RestClient>,
}

impl_resource!(GearGroup);

impl GearGroup {
    /// Names of the cartridges running in this group
    pub fn cartridge_names(&self) -> Vec<&str> {
        self.cartridges
            .iter()
            .filter_map(|c| c.get("name").and_then(Value::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gear {
    pub id: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub ssh_url: Option<String>,
}
