//! Broker JSON envelopes and the dispatch from envelope type to domain objects
//!
//! Successful responses look like `{"type": "...", "data": ..., "messages": [...]}`.
//! The `type` tag selects a [`Payload`] variant; tags this client does not
//! know are handed back untouched as [`Payload::Unknown`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::http::RestClient;
use crate::models::{Application, Cartridge, Domain, GearGroup, Key, Resource, User};

/// Severity that makes a message an error
pub const ERROR_SEVERITY: &str = "ERROR";

/// Field name the broker uses for status text meant for the user
pub const RESULT_FIELD: &str = "result";

/// A message attached to a broker response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i64>,
}

impl Message {
    pub fn is_error(&self) -> bool {
        self.severity.eq_ignore_ascii_case(ERROR_SEVERITY)
    }

    /// Status text that belongs on the resource itself rather than on a field
    pub fn is_result(&self) -> bool {
        match self.field.as_deref() {
            None => true,
            Some(field) => field == RESULT_FIELD,
        }
    }
}

/// Body of a non-2xx response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub messages: Vec<Message>,
}

impl ErrorEnvelope {
    pub fn first_error(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_error())
    }
}

/// Body of a successful response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub api_version: Option<Value>,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub supported_api_versions: Vec<Value>,
}

/// Decoded response data
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Domains(Vec<Domain>),
    Applications(Vec<Application>),
    Cartridges(Vec<Cartridge>),
    Keys(Vec<Key>),
    GearGroups(Vec<GearGroup>),
    Domain(Domain),
    Application(Application),
    Cartridge(Cartridge),
    User(User),
    Key(Key),
    /// A type this client does not model; `data` is returned unchanged
    Unknown { tag: Option<String>, data: Value },
}

impl Payload {
    /// Envelope tag this payload was decoded from
    pub fn tag(&self) -> Option<&str> {
        match self {
            Payload::Domains(_) => Some("domains"),
            Payload::Applications(_) => Some("applications"),
            Payload::Cartridges(_) => Some("cartridges"),
            Payload::Keys(_) => Some("keys"),
            Payload::GearGroups(_) => Some("gear_groups"),
            Payload::Domain(_) => Some("domain"),
            Payload::Application(_) => Some("application"),
            Payload::Cartridge(_) => Some("cartridge"),
            Payload::User(_) => Some("user"),
            Payload::Key(_) => Some("key"),
            Payload::Unknown { tag, .. } => tag.as_deref(),
        }
    }

    pub fn into_domains(self) -> Result<Vec<Domain>> {
        match self {
            Payload::Domains(domains) => Ok(domains),
            other => Err(unexpected("domains", &other)),
        }
    }

    pub fn into_domain(self) -> Result<Domain> {
        match self {
            Payload::Domain(domain) => Ok(domain),
            other => Err(unexpected("domain", &other)),
        }
    }

    pub fn into_applications(self) -> Result<Vec<Application>> {
        match self {
            Payload::Applications(apps) => Ok(apps),
            other => Err(unexpected("applications", &other)),
        }
    }

    pub fn into_application(self) -> Result<Application> {
        match self {
            Payload::Application(app) => Ok(app),
            other => Err(unexpected("application", &other)),
        }
    }

    pub fn into_cartridges(self) -> Result<Vec<Cartridge>> {
        match self {
            Payload::Cartridges(cartridges) => Ok(cartridges),
            other => Err(unexpected("cartridges", &other)),
        }
    }

    pub fn into_keys(self) -> Result<Vec<Key>> {
        match self {
            Payload::Keys(keys) => Ok(keys),
            other => Err(unexpected("keys", &other)),
        }
    }

    pub fn into_key(self) -> Result<Key> {
        match self {
            Payload::Key(key) => Ok(key),
            other => Err(unexpected("key", &other)),
        }
    }

    pub fn into_user(self) -> Result<User> {
        match self {
            Payload::User(user) => Ok(user),
            other => Err(unexpected("user", &other)),
        }
    }

    pub fn into_gear_groups(self) -> Result<Vec<GearGroup>> {
        match self {
            Payload::GearGroups(groups) => Ok(groups),
            other => Err(unexpected("gear_groups", &other)),
        }
    }

    /// Raw data of an unrecognised envelope
    pub fn into_data(self) -> Result<Value> {
        match self {
            Payload::Unknown { data, .. } => Ok(data),
            other => Err(unexpected("untyped data", &other)),
        }
    }
}

fn unexpected(expected: &str, actual: &Payload) -> Error {
    Error::server_error(
        format!(
            "The server returned '{}' where '{}' was expected",
            actual.tag().unwrap_or("untyped data"),
            expected
        ),
        None,
    )
}

/// Decode a success body into a [`Payload`], binding every object to `client`.
///
/// Parsing has no side effects; the same bytes always yield equal payloads.
pub fn parse(body: &[u8], client: &RestClient) -> Result<Payload> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| {
        log::debug!("Response body is not a valid envelope: {}", e);
        client.unreadable_response_error()
    })?;
    dispatch(envelope, client)
}

/// Map an already-decoded envelope to its payload
pub fn dispatch(envelope: Envelope, client: &RestClient) -> Result<Payload> {
    let Envelope { kind, data, messages, .. } = envelope;

    let payload = match kind.as_deref() {
        Some("domains") => Payload::Domains(build_list(data, client)?),
        Some("applications") => {
            let mut apps: Vec<Application> = build_list(data, client)?;
            for app in apps.iter_mut() {
                attach_messages(app, &messages);
            }
            Payload::Applications(apps)
        }
        Some("cartridges") => Payload::Cartridges(build_list(data, client)?),
        Some("keys") => Payload::Keys(build_list(data, client)?),
        Some("gear_groups") => Payload::GearGroups(build_list(data, client)?),
        Some("domain") => Payload::Domain(build(data, client)?),
        Some("application") => {
            let mut app: Application = build(data, client)?;
            attach_messages(&mut app, &messages);
            Payload::Application(app)
        }
        Some("cartridge") => Payload::Cartridge(build(data, client)?),
        Some("user") => Payload::User(build(data, client)?),
        Some("key") => Payload::Key(build(data, client)?),
        _ => Payload::Unknown { tag: kind, data },
    };

    Ok(payload)
}

fn build<T>(data: Value, client: &RestClient) -> Result<T>
where
    T: DeserializeOwned + Resource,
{
    let mut object: T = serde_json::from_value(data).map_err(|e| {
        log::debug!("Envelope data does not match the expected shape: {}", e);
        client.unreadable_response_error()
    })?;
    object.attach(client);
    Ok(object)
}

fn build_list<T>(data: Value, client: &RestClient) -> Result<Vec<T>>
where
    T: DeserializeOwned + Resource,
{
    match data {
        Value::Array(items) => items.into_iter().map(|item| build(item, client)).collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(client.unreadable_response_error()),
    }
}

fn attach_messages(app: &mut Application, messages: &[Message]) {
    for message in messages.iter().filter(|m| m.is_result()) {
        app.add_message(message.text.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use serde_json::json;

    fn client() -> RestClient {
        RestClient::new(ClientConfig::new("https://broker.example.com")).unwrap()
    }

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_message_severity_is_case_insensitive() {
        let message = Message {
            severity: "error".to_string(),
            text: "boom".to_string(),
            field: None,
            exit_code: None,
        };
        assert!(message.is_error());
        assert!(!Message { severity: "WARNING".to_string(), ..message }.is_error());
    }

    #[test]
    fn test_domains_preserve_order_and_client() {
        let client = client();
        let payload = parse(
            &body(json!({
                "type": "domains",
                "data": [{"id": "alpha"}, {"id": "beta"}, {"id": "gamma"}],
            })),
            &client,
        )
        .unwrap();

        let domains = payload.into_domains().unwrap();
        let names: Vec<&str> = domains.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
        assert!(domains.iter().all(|d| d.client() == Some(&client)));
    }

    #[test]
    fn test_application_messages_filtered_by_field() {
        let client = client();
        let payload = parse(
            &body(json!({
                "type": "application",
                "data": {"name": "blog", "framework": "php-5.3"},
                "messages": [
                    {"severity": "INFO", "text": "Application created", "field": null},
                    {"severity": "INFO", "text": "Cartridge output", "field": "result"},
                    {"severity": "INFO", "text": "debug only", "field": "debug"},
                ],
            })),
            &client,
        )
        .unwrap();

        let app = payload.into_application().unwrap();
        assert_eq!(app.messages, vec!["Application created", "Cartridge output"]);
    }

    #[test]
    fn test_applications_each_receive_messages() {
        let client = client();
        let payload = parse(
            &body(json!({
                "type": "applications",
                "data": [{"name": "one"}, {"name": "two"}],
                "messages": [{"severity": "INFO", "text": "listed"}],
            })),
            &client,
        )
        .unwrap();

        let apps = payload.into_applications().unwrap();
        assert_eq!(apps.len(), 2);
        assert!(apps.iter().all(|a| a.messages == vec!["listed".to_string()]));
    }

    #[test]
    fn test_domain_ignores_messages() {
        let client = client();
        let payload = parse(
            &body(json!({
                "type": "domain",
                "data": {"id": "alpha", "suffix": "example.com"},
                "messages": [{"severity": "INFO", "text": "created"}],
            })),
            &client,
        )
        .unwrap();
        let domain = payload.into_domain().unwrap();
        assert_eq!(domain.suffix.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_unknown_tag_passes_data_through() {
        let client = client();
        let payload = parse(
            &body(json!({"type": "links", "data": {"LIST_DOMAINS": {"href": "x"}}})),
            &client,
        )
        .unwrap();
        assert_eq!(payload.tag(), Some("links"));
        assert_eq!(payload.into_data().unwrap(), json!({"LIST_DOMAINS": {"href": "x"}}));
    }

    #[test]
    fn test_missing_tag_is_unknown() {
        let client = client();
        let payload = parse(&body(json!({"data": [1, 2, 3]})), &client).unwrap();
        assert_eq!(payload, Payload::Unknown { tag: None, data: json!([1, 2, 3]) });
    }

    #[test]
    fn test_malformed_body_is_server_error() {
        let client = client();
        let err = parse(b"<html>proxy error</html>", &client).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ServerError);
        assert_eq!(err.exit_code(), Some(crate::error::SERVER_RESPONSE_EXIT_CODE));
    }

    #[test]
    fn test_wrong_variant_accessor() {
        let client = client();
        let payload = parse(&body(json!({"type": "user", "data": {"login": "me"}})), &client).unwrap();
        let err = payload.into_domains().unwrap_err();
        assert!(err.to_string().contains("'user'"));
    }

    #[test]
    fn test_gear_groups() {
        let client = client();
        let payload = parse(
            &body(json!({
                "type": "gear_groups",
                "data": [{
                    "name": "web",
                    "gear_profile": "small",
                    "gears": [{"id": "abc", "state": "started"}],
                    "cartridges": [{"name": "php-5.3"}, {"name": "mysql-5.1"}],
                }],
            })),
            &client,
        )
        .unwrap();
        let groups = payload.into_gear_groups().unwrap();
        assert_eq!(groups[0].gears[0].state.as_deref(), Some("started"));
        assert_eq!(groups[0].cartridge_names(), vec!["php-5.3", "mysql-5.1"]);
    }
}
