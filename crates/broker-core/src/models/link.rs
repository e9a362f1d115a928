//! Hypermedia links embedded by the broker in its resources

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::http::RequestOptions;

use super::null_as_default;

/// An operation the broker offers on a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub rel: Option<String>,
    pub method: String,
    pub href: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required_params: Vec<LinkParam>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub optional_params: Vec<LinkParam>,
}

/// Parameter accepted by a link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkParam {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub valid_options: Vec<Value>,
    #[serde(default)]
    pub default_value: Option<Value>,
}

impl Link {
    /// Parse the HTTP method the broker asked for
    pub fn http_method(&self) -> Result<Method> {
        Method::from_bytes(self.method.to_ascii_uppercase().as_bytes()).map_err(|_| {
            Error::server_error(
                format!("The server returned a link with an invalid method '{}'", self.method),
                None,
            )
        })
    }

    /// Parse the link target
    pub fn url(&self) -> Result<Url> {
        Url::parse(&self.href).map_err(|e| {
            Error::server_error(
                format!("The server returned a link with an invalid address '{}': {}", self.href, e),
                None,
            )
        })
    }

    /// Request options targeting this link, ready for [`crate::http::RestClient::request`]
    pub fn to_options(&self) -> Result<RequestOptions> {
        Ok(RequestOptions::new(self.http_method()?, self.url()?))
    }

    /// Whether `name` is one of the required parameters
    pub fn requires(&self, name: &str) -> bool {
        self.required_params.iter().any(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_to_options() {
        let link: Link = serde_json::from_value(json!({
            "rel": "Add domain",
            "method": "post",
            "href": "https://broker.example.com/broker/rest/domains",
            "required_params": [{"name": "id", "type": "string", "valid_options": null}],
            "optional_params": null,
        }))
        .unwrap();

        let options = link.to_options().unwrap();
        assert_eq!(options.method, Method::POST);
        assert_eq!(options.url.as_str(), "https://broker.example.com/broker/rest/domains");
        assert!(link.requires("id"));
        assert!(link.optional_params.is_empty());
    }

    #[test]
    fn test_invalid_href_is_server_error() {
        let link = Link {
            rel: None,
            method: "GET".to_string(),
            href: "not a url".to_string(),
            required_params: Vec::new(),
            optional_params: Vec::new(),
        };
        let err = link.to_options().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ServerError);
    }
}
