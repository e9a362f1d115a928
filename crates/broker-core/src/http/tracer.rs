//! Optional observation of every exchange the executor performs

use std::fmt;

use crate::http::options::{RequestBody, RequestOptions};
use crate::http::response::RawResponse;
use crate::logging::redaction;

/// Largest body excerpt written to the debug log
const BODY_EXCERPT_LIMIT: usize = 2048;

/// Receives each prepared request and each raw response
pub trait RequestTracer: Send + Sync + fmt::Debug {
    fn on_request(&self, attempt: u32, options: &RequestOptions);

    fn on_response(&self, attempt: u32, response: &RawResponse);
}

/// Writes redacted request and response details to the `log` facade at debug level
#[derive(Debug, Clone, Default)]
pub struct LoggingTracer;

impl LoggingTracer {
    fn render_payload(options: &RequestOptions) -> String {
        match &options.payload {
            None => String::new(),
            Some(RequestBody::Json(value)) => {
                let mut value = value.clone();
                redaction::redact_json_value(&mut value);
                value.to_string()
            }
            Some(RequestBody::Form(pairs)) => pairs
                .iter()
                .map(|(name, value)| {
                    if redaction::is_sensitive_key(name) {
                        format!("{}=***", name)
                    } else {
                        format!("{}={}", name, value)
                    }
                })
                .collect::<Vec<_>>()
                .join("&"),
        }
    }
}

impl RequestTracer for LoggingTracer {
    fn on_request(&self, attempt: u32, options: &RequestOptions) {
        let headers = options
            .headers
            .iter()
            .map(|(name, value)| format!("{}: {}", name, redaction::redact_header(name, value)))
            .collect::<Vec<_>>()
            .join(", ");

        log::debug!(
            "Request #{} {} {} accept='{}' auth={} headers=[{}] body={}",
            attempt,
            options.method,
            redaction::redact_sensitive(options.url.as_str()),
            options.accept_header(),
            options.auth.is_some(),
            headers,
            Self::render_payload(options)
        );
    }

    fn on_response(&self, attempt: u32, response: &RawResponse) {
        let text = response.text();
        let excerpt: String = text.chars().take(BODY_EXCERPT_LIMIT).collect();
        log::debug!(
            "Response #{} {} from {} ({} bytes): {}",
            attempt,
            response.status,
            response.url,
            response.body.len(),
            redaction::redact_sensitive(&excerpt)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;

    fn url() -> Url {
        Url::parse("https://broker.example.com/broker/rest/user/keys").unwrap()
    }

    #[test]
    fn test_json_payload_redacted() {
        let options = RequestOptions::post(url()).with_json(json!({"name": "k", "password": "pw"}));
        let rendered = LoggingTracer::render_payload(&options);
        assert!(rendered.contains("\"name\":\"k\""));
        assert!(!rendered.contains("\"pw\""));
    }

    #[test]
    fn test_form_payload_redacted() {
        let options = RequestOptions::post(url()).with_form([("id", "mydomain"), ("password", "pw")]);
        assert_eq!(LoggingTracer::render_payload(&options), "id=mydomain&password=***");
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(LoggingTracer::render_payload(&RequestOptions::get(url())), "");
    }
}
