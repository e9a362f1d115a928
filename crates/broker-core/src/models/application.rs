//! Application hosted inside a domain

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::RestClient;

use super::{lenient_timestamp, null_as_default, Link};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub domain_id: Option<String>,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub app_url: Option<String>,
    #[serde(default)]
    pub git_url: Option<String>,
    #[serde(default)]
    pub ssh_url: Option<String>,
    #[serde(default)]
    pub initial_git_url: Option<String>,
    #[serde(default)]
    pub gear_profile: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scalable: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub aliases: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: HashMap<String, Link>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    /// Status text the broker returned alongside this application
    #[serde(skip)]
    pub messages: Vec<String>,
    #[serde(skip)]
    pub(crate) client: Option<RestClient>,
}

impl_resource!(Application);

impl Application {
    pub fn add_message(&mut self, text: impl Into<String>) {
        self.messages.push(text.into());
    }
}
