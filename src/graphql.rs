//! Minimal GraphQL-over-HTTP client shared by every upstream API
//!
//! Each upstream gets its own instance with its own auth headers. The
//! response envelope is unwrapped here: a non-empty `errors` array or a
//! missing `data` field is an error.

use crate::config::ConfigError;
use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Clone)]
pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
    name: &'static str,
}

impl GraphQlClient {
    /// `headers` are attached to every request (on top of `Content-Type`).
    pub fn new(
        name: &'static str,
        endpoint: &str,
        headers: &[(&'static str, String)],
        timeout: Duration,
    ) -> Result<Self> {
        let mut header_map = HeaderMap::new();
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (key, value) in headers {
            let value = HeaderValue::from_str(value).map_err(|_| {
                ConfigError::InvalidValue(format!(
                    "{} header '{}' is not a valid header value",
                    name, key
                ))
            })?;
            header_map.insert(HeaderName::from_static(*key), value);
        }

        let http = reqwest::Client::builder()
            .default_headers(header_map)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            name,
        })
    }

    pub async fn request<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let body = json!({ "query": query, "variables": variables });
        log::debug!("📤 {} request: {}", self.name, body);

        let response = self.http.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        log::debug!("📥 {} response ({}): {}", self.name, status, text);

        if !status.is_success() {
            return Err(Error::UnexpectedResponse(format!(
                "{} returned HTTP {}",
                self.name, status
            )));
        }

        decode_envelope(self.name, &text)
    }
}

fn decode_envelope<T: DeserializeOwned>(name: &str, text: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(text)?;

    if !envelope.errors.is_empty() {
        let messages: Vec<String> = envelope.errors.into_iter().map(|e| e.message).collect();
        return Err(Error::GraphQl(format!("{}: {}", name, messages.join("; "))));
    }

    envelope
        .data
        .ok_or_else(|| Error::UnexpectedResponse(format!("{} returned no data", name)))
}
