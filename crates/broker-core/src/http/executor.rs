//! The request pipeline shared by every broker call
//!
//! One logical request runs as a bounded sequence of attempts:
//!
//! 1. merge the caller's options with client defaults and let the
//!    authentication provider sign them
//! 2. send through a cached transport and read the whole body
//! 3. a 502 on the first GET attempt is retried after one backoff step,
//!    an authentication challenge is answered with a fresh attempt, any
//!    other non-2xx goes to the classifier
//!
//! Transport failures are mapped to exactly one [`Error`] each.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::{Client, Request, StatusCode};
use tracing::Instrument;

use crate::envelope::{self, Payload};
use crate::error::{Error, Result};
use crate::http::auth::AuthenticationProvider;
use crate::http::classifier::classify;
use crate::http::failure::{map_transport_error, FailureContext};
use crate::http::options::{RequestAuth, RequestBody, RequestDefaults, RequestOptions};
use crate::http::response::RawResponse;
use crate::http::retry::{AttemptState, AttemptTracker, RetryPolicy};
use crate::http::tracer::RequestTracer;
use crate::http::transport::{TransportCache, TransportSettings};
use crate::http::RestClient;

/// Transport settings that do not vary per call
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TransportBase {
    pub user_agent: String,
    pub proxy: Option<String>,
    pub ca_file: Option<PathBuf>,
    pub insecure: bool,
}

/// What happened to one attempt
enum Outcome {
    Done(RawResponse),
    Retry(AttemptState),
}

#[derive(Debug)]
pub(crate) struct RequestExecutor {
    transports: TransportCache,
    auth: Arc<dyn AuthenticationProvider>,
    defaults: RequestDefaults,
    base: TransportBase,
    policy: RetryPolicy,
    tracer: Option<Arc<dyn RequestTracer>>,
}

impl RequestExecutor {
    pub(crate) fn new(
        auth: Arc<dyn AuthenticationProvider>,
        defaults: RequestDefaults,
        base: TransportBase,
        policy: RetryPolicy,
        tracer: Option<Arc<dyn RequestTracer>>,
    ) -> Self {
        Self {
            transports: TransportCache::new(),
            auth,
            defaults,
            base,
            policy,
            tracer,
        }
    }

    pub(crate) fn defaults(&self) -> &RequestDefaults {
        &self.defaults
    }

    pub(crate) fn proxy(&self) -> Option<&str> {
        self.base.proxy.as_deref()
    }

    pub(crate) fn transports(&self) -> &TransportCache {
        &self.transports
    }

    /// Run `options` to a successful (2xx) response or exactly one error
    pub(crate) async fn execute(&self, options: &RequestOptions) -> Result<RawResponse> {
        let span = tracing::debug_span!("broker_request", method = %options.method, url = %options.url);
        self.run(options).instrument(span).await
    }

    async fn run(&self, options: &RequestOptions) -> Result<RawResponse> {
        let context = FailureContext::new(options.url.clone(), self.base.proxy.clone());
        let mut tracker = AttemptTracker::new(self.policy.clone());

        loop {
            match self.attempt(options, &context, &mut tracker).await {
                Ok(Outcome::Done(response)) => {
                    tracker.transition(AttemptState::Success);
                    return Ok(response);
                }
                Ok(Outcome::Retry(state)) => tracker.transition(state),
                Err(err) => {
                    tracker.transition(AttemptState::Failed);
                    return Err(err);
                }
            }

            let reason = tracker.state();
            match tracker.advance() {
                Some(delay) => {
                    log::warn!(
                        "{} {} needs another attempt ({:?}), retrying in {:?}",
                        options.method,
                        options.url,
                        reason,
                        delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                None => {
                    tracker.transition(AttemptState::Failed);
                    log::error!(
                        "{} {} failed after {} attempts",
                        options.method,
                        options.url,
                        tracker.max_attempts()
                    );
                    return Err(exhausted(reason, &context, tracker.max_attempts()));
                }
            }
        }
    }

    async fn attempt(
        &self,
        options: &RequestOptions,
        context: &FailureContext,
        tracker: &mut AttemptTracker,
    ) -> Result<Outcome> {
        let prepared = self.auth.augment(options.merged_with(&self.defaults))?;
        let transport = self.transports.get(&self.settings_for(&prepared))?;
        let request = build_request(&transport, &prepared, context)?;

        if let Some(tracer) = &self.tracer {
            tracer.on_request(tracker.attempt(), &prepared);
        }
        log::debug!("Attempt {} of {} {}", tracker.attempt(), prepared.method, prepared.url);
        tracker.transition(AttemptState::Sent);

        let response = transport
            .execute(request)
            .await
            .map_err(|e| map_transport_error(e, context))?;
        let response = RawResponse::read(response)
            .await
            .map_err(|e| map_transport_error(e, context))?;

        if let Some(tracer) = &self.tracer {
            tracer.on_response(tracker.attempt(), &response);
        }

        if response.status == StatusCode::BAD_GATEWAY {
            if tracker.gateway_retry_allowed(prepared.is_get()) {
                return Ok(Outcome::Retry(AttemptState::RetryableGatewayError));
            }
            if self.auth.retry_authentication_challenge(&response) {
                return Ok(Outcome::Retry(AttemptState::AuthChallenge));
            }
            return Err(context.bad_gateway());
        }

        if self.auth.retry_authentication_challenge(&response) {
            return Ok(Outcome::Retry(AttemptState::AuthChallenge));
        }

        if !response.is_ok() {
            return Err(classify(&response, context));
        }

        Ok(Outcome::Done(response))
    }

    fn settings_for(&self, prepared: &RequestOptions) -> TransportSettings {
        TransportSettings {
            user_agent: self.base.user_agent.clone(),
            connect_timeout: prepared.connect_timeout.unwrap_or(self.defaults.connect_timeout),
            receive_timeout: prepared.receive_timeout.unwrap_or(self.defaults.receive_timeout),
            proxy: self.base.proxy.clone(),
            ca_file: self.base.ca_file.clone(),
            insecure: self.base.insecure,
        }
    }
}

fn build_request(transport: &Client, prepared: &RequestOptions, context: &FailureContext) -> Result<Request> {
    let mut builder = transport
        .request(prepared.method.clone(), prepared.url.clone())
        .headers(prepared.header_map()?);

    builder = match &prepared.payload {
        Some(RequestBody::Json(value)) => builder.json(value),
        Some(RequestBody::Form(pairs)) => builder.form(pairs),
        None => builder,
    };

    builder = match &prepared.auth {
        Some(RequestAuth::Basic { username, password }) => builder.basic_auth(username, password.as_deref()),
        Some(RequestAuth::Bearer(token)) => builder.bearer_auth(token),
        None => builder,
    };

    builder.build().map_err(|e| map_transport_error(e, context))
}

fn exhausted(last: AttemptState, context: &FailureContext, attempts: u32) -> Error {
    match last {
        AttemptState::RetryableGatewayError => context.bad_gateway(),
        _ => Error::connection(format!(
            "Unable to complete the request to {} after {} attempts; the server kept asking for \
             authentication.",
            context.server(),
            attempts
        )),
    }
}

/// Turn a successful response into a payload: nothing for 204 or an empty
/// body, otherwise the decoded envelope
pub(crate) fn decode(response: &RawResponse, client: &RestClient) -> Result<Option<Payload>> {
    if response.is_no_content() || response.is_empty() {
        return Ok(None);
    }
    envelope::parse(&response.body, client).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::auth::NoAuth;
    use url::Url;

    fn executor() -> RequestExecutor {
        RequestExecutor::new(
            Arc::new(NoAuth),
            RequestDefaults::default(),
            TransportBase {
                user_agent: "broker-core/test".to_string(),
                proxy: Some("http://proxy.example.com:3128".to_string()),
                ca_file: None,
                insecure: false,
            },
            RetryPolicy::immediate(3),
            None,
        )
    }

    #[test]
    fn test_settings_follow_call_timeouts() {
        let executor = executor();
        let url = Url::parse("https://broker.example.com/broker/rest/api").unwrap();
        let options = RequestOptions::get(url)
            .with_receive_timeout(std::time::Duration::from_secs(7))
            .merged_with(executor.defaults());
        let settings = executor.settings_for(&options);
        assert_eq!(settings.receive_timeout, std::time::Duration::from_secs(7));
        assert_eq!(settings.connect_timeout, std::time::Duration::from_secs(30));
        assert_eq!(settings.proxy.as_deref(), Some("http://proxy.example.com:3128"));
    }

    #[test]
    fn test_build_request_applies_payload_and_auth() {
        let url = Url::parse("https://broker.example.com/broker/rest/domains").unwrap();
        let context = FailureContext::new(url.clone(), None);
        let options = RequestOptions::post(url)
            .with_form([("id", "mydomain")])
            .with_auth(RequestAuth::Bearer("tok".to_string()));
        let request = build_request(&Client::new(), &options, &context).unwrap();

        assert_eq!(request.headers().get("authorization").unwrap(), "Bearer tok");
        assert_eq!(request.headers().get("accept").unwrap(), "application/json");
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, b"id=mydomain");
    }

    #[test]
    fn test_exhausted_gateway_is_connection() {
        let url = Url::parse("https://broker.example.com/broker/rest/api").unwrap();
        let context = FailureContext::new(url, None);
        let err = exhausted(AttemptState::RetryableGatewayError, &context, 1);
        assert_eq!(err.kind(), ErrorKind::Connection);
        let err = exhausted(AttemptState::AuthChallenge, &context, 3);
        assert!(err.to_string().contains("after 3 attempts"));
    }
}
