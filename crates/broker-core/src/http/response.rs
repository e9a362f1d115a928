//! Fully-read HTTP response handed to classifiers, auth providers and handlers

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::Result;

/// Status, headers and body of one exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub url: Url,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>, url: Url) -> Self {
        Self { status, headers, body, url }
    }

    /// Read the whole body of a reqwest response
    pub(crate) async fn read(response: reqwest::Response) -> std::result::Result<Self, reqwest::Error> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?.to_vec();
        Ok(Self { status, headers, body, url })
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// 2xx
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_no_content(&self) -> bool {
        self.status == StatusCode::NO_CONTENT
    }

    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
