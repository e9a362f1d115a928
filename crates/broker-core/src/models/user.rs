//! The authenticated account

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::RestClient;

use super::{null_as_default, Link};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub consumed_gears: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_gears: u32,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: HashMap<String, Link>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    #[serde(skip)]
    pub(crate) client: Option<RestClient>,
}

impl_resource!(User);
