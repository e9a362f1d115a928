//! Turn a non-2xx broker response into exactly one [`Error`]

use crate::envelope::{ErrorEnvelope, Message};
use crate::error::Error;
use crate::http::failure::FailureContext;
use crate::http::response::RawResponse;

/// Classify a failed response.
///
/// Always yields an error. A body that is not a valid error envelope is
/// remembered and only reported when no status-specific error applies.
pub fn classify(response: &RawResponse, context: &FailureContext) -> Error {
    let (envelope, parse_error) = match decode(response) {
        Some(envelope) => (envelope, None),
        None => (ErrorEnvelope::default(), Some(context.unreadable_response())),
    };
    let first_error = envelope.first_error();

    let classified = match response.status_code() {
        401 => Some(Error::Unauthorized {
            message: "Not authenticated".to_string(),
        }),
        403 => Some(Error::RequestDenied {
            message: first_error
                .map(|m| m.text.clone())
                .unwrap_or_else(|| "Forbidden".to_string()),
        }),
        404 => Some(Error::ResourceNotFound {
            message: first_error
                .map(|m| m.text.clone())
                .unwrap_or_else(|| context.generic_message()),
        }),
        409 => first_error.map(validation_from),
        422 => {
            return accumulate_validation(&envelope.messages)
                .or(parse_error)
                .unwrap_or_else(|| Error::validation("Not valid", None, None));
        }
        400 => first_error.map(|m| Error::ClientError { message: m.text.clone() }),
        500 => first_error.map(|m| Error::server_error(m.text.clone(), m.exit_code)),
        503 => Some(Error::ServiceUnavailable {
            message: first_error
                .map(|m| m.text.clone())
                .unwrap_or_else(|| context.generic_message()),
        }),
        status => Some(Error::server_error(
            format!("Server returned an unexpected error code: {}", status),
            None,
        )),
    };

    classified
        .or(parse_error)
        .unwrap_or_else(|| context.unreadable_response())
}

/// `None` when the body, including an empty one, is not an error envelope
fn decode(response: &RawResponse) -> Option<ErrorEnvelope> {
    match serde_json::from_slice::<ErrorEnvelope>(&response.body) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            log::debug!("Error body from {} is not an envelope: {}", response.url, e);
            None
        }
    }
}

fn validation_from(message: &Message) -> Error {
    Error::validation(message.text.clone(), message.field.clone(), message.exit_code)
}

/// Fold every message into a running validation error. Consecutive messages
/// for the same field extend its text; a new field replaces it.
fn accumulate_validation(messages: &[Message]) -> Option<Error> {
    let mut running: Option<Error> = None;
    for message in messages {
        let same_field = matches!(&running, Some(err) if err.field() == message.field.as_deref());
        if !same_field {
            running = Some(validation_from(message));
            continue;
        }
        if let Some(text) = running.as_mut().and_then(Error::message_mut) {
            text.push(' ');
            text.push_str(&message.text);
        }
    }
    running
}
