//! Shared test support utilities for integration tests
#![allow(dead_code)]

use broker_core::{ClientConfig, RestClient, RetryPolicy};
use serde_json::{json, Value};
use wiremock::MockServer;

pub const REST_PATH: &str = "/broker/rest/";

/// Configuration pointed at a mock broker, retrying without delay
pub fn config_for(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::new(format!("{}{}", server.uri(), REST_PATH));
    config.retry = RetryPolicy::immediate(3);
    config.connect_timeout_secs = 5;
    config.receive_timeout_secs = 5;
    config
}

pub fn client_for(server: &MockServer) -> RestClient {
    RestClient::new(config_for(server)).expect("client")
}

pub fn href(server: &MockServer, path: &str) -> String {
    format!("{}{}{}", server.uri(), REST_PATH, path)
}

pub fn link(server: &MockServer, method: &str, path: &str) -> Value {
    json!({
        "rel": path,
        "method": method,
        "href": href(server, path),
        "required_params": [],
        "optional_params": [],
    })
}

/// API root advertising the usual top-level operations
pub fn api_root(server: &MockServer, api_version: &str, supported: &[&str]) -> Value {
    json!({
        "type": "links",
        "api_version": api_version,
        "supported_api_versions": supported,
        "data": {
            "LIST_DOMAINS": link(server, "GET", "domains"),
            "ADD_DOMAIN": link(server, "POST", "domains"),
            "LIST_CARTRIDGES": link(server, "GET", "cartridges"),
            "GET_USER": link(server, "GET", "user"),
        },
        "messages": [],
    })
}

pub fn error_envelope(messages: Value) -> Value {
    json!({ "messages": messages })
}

pub fn error_message(text: &str, field: Option<&str>, exit_code: Option<i64>) -> Value {
    json!({"severity": "ERROR", "text": text, "field": field, "exit_code": exit_code})
}
