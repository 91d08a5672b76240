// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP transport for JSON-protocol cloud services.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;

use crate::error::ProtocolError;

/// Content type of the JSON 1.0 service protocol.
pub const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Header naming the operation being invoked.
pub const TARGET_HEADER: &str = "X-Amz-Target";

// ============================================================================
// HttpConfig - Endpoint configuration
// ============================================================================

/// Configuration for a JSON-protocol service endpoint.
///
/// Requests are not signed; the endpoint must accept them as sent, e.g. a
/// signing proxy or a local emulator.
///
/// # Examples
///
/// ```
/// use blebridge::protocol::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::new("https://dynamodb.us-east-2.amazonaws.com")
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.timeout(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    endpoint: String,
    timeout: Duration,
}

impl HttpConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration for the given endpoint URL.
    ///
    /// A missing scheme defaults to `https://`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let endpoint = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint
        } else {
            format!("https://{endpoint}")
        };

        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Creates an `HttpClient` from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_client(self) -> Result<HttpClient, ProtocolError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(HttpClient {
            endpoint: self.endpoint,
            timeout: self.timeout,
            client,
        })
    }
}

// ============================================================================
// HttpClient - JSON operation invoker
// ============================================================================

/// HTTP client that invokes JSON-protocol operations.
///
/// Every operation is a `POST` to the endpoint root with the operation name
/// in the `X-Amz-Target` header and a JSON body.
#[derive(Debug, Clone)]
pub struct HttpClient {
    endpoint: String,
    timeout: Duration,
    client: Client,
}

impl HttpClient {
    /// Returns the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Invokes an operation and returns the raw response body.
    ///
    /// `extra_time` extends the request timeout, for operations that are
    /// allowed to hold the connection open (long polls).
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` on transport failure or a non-success status.
    pub async fn call<B: Serialize + ?Sized>(
        &self,
        target: &str,
        body: &B,
        extra_time: Duration,
    ) -> Result<String, ProtocolError> {
        let payload = serde_json::to_vec(body)?;

        tracing::debug!(endpoint = %self.endpoint, target, "Sending HTTP request");

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout + extra_time)
            .header(CONTENT_TYPE, HeaderValue::from_static(AMZ_JSON_CONTENT_TYPE))
            .header(TARGET_HEADER, target)
            .body(payload)
            .send()
            .await
            .map_err(ProtocolError::Http)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProtocolError::AuthenticationFailed);
        }

        let body = response.text().await.map_err(ProtocolError::Http)?;

        if !status.is_success() {
            return Err(ProtocolError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::trace!(target, body = %body, "Received HTTP response");

        Ok(body)
    }
}
