//! reqwest transport for the log API.

use std::time::Duration;

use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue,
};
use reqwest::{Client, StatusCode};
use tracing::trace;

use logslice_core::{LogApi, SliceError};

use crate::config::ConnectionConfig;
use crate::error::{CliError, Result};

const JSON_UTF8: &str = "application/json; charset=utf-8";
const CSRF_HEADER: &str = "x-csrftoken";

/// Session-authenticated GET client.
#[derive(Debug, Clone)]
pub struct HttpLogApi {
    client: Client,
}

impl HttpLogApi {
    /// Builds a client sending the session headers with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if a credential is not a valid header value or the
    /// client cannot be built.
    pub fn new(connection: &ConnectionConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_UTF8));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
        if !connection.cookie.is_empty() {
            headers.insert(COOKIE, secret_header("cookie", &connection.cookie)?);
        }
        if !connection.token.is_empty() {
            headers.insert(
                HeaderName::from_static(CSRF_HEADER),
                secret_header("token", &connection.token)?,
            );
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(secs) = connection.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| CliError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

fn secret_header(name: &str, value: &str) -> Result<HeaderValue> {
    let mut header = HeaderValue::from_str(value.trim())
        .map_err(|e| CliError::Config(format!("connection.{name} is not a valid header: {e}")))?;
    header.set_sensitive(true);
    Ok(header)
}

impl LogApi for HttpLogApi {
    async fn fetch(&self, url: &str) -> logslice_core::Result<String> {
        trace!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SliceError::Request(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SliceError::Transport {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                url: url.to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| SliceError::Request(e.to_string()))
    }
}
