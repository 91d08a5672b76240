// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ReceiveMessage`/`DeleteMessage` over HTTP.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::protocol::{HttpClient, HttpConfig};

use super::{CommandQueue, QueueMessage, ReceiptHandle};

const RECEIVE_TARGET: &str = "AmazonSQS.ReceiveMessage";
const DELETE_TARGET: &str = "AmazonSQS.DeleteMessage";

/// Longest long-poll the queue service accepts.
pub const MAX_WAIT: Duration = Duration::from_secs(20);

/// Long-poll wait in whole seconds, rounded up and capped at [`MAX_WAIT`].
fn wait_seconds(wait: Duration) -> u64 {
    let wait = wait.min(MAX_WAIT);
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}

/// Configuration for [`HttpQueue`].
///
/// # Examples
///
/// ```
/// use blebridge::queue::HttpQueueConfig;
///
/// let config = HttpQueueConfig::new(
///     "https://sqs.us-east-2.amazonaws.com",
///     "https://sqs.us-east-2.amazonaws.com/123456789012/garage-door-control",
/// );
/// assert!(config.queue_url().ends_with("garage-door-control"));
/// ```
#[derive(Debug, Clone)]
pub struct HttpQueueConfig {
    http: HttpConfig,
    queue_url: String,
}

impl HttpQueueConfig {
    /// Creates a configuration for the queue at `queue_url` served by `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, queue_url: impl Into<String>) -> Self {
        Self {
            http: HttpConfig::new(endpoint),
            queue_url: queue_url.into(),
        }
    }

    /// Sets the request timeout. Long polls get their wait time on top.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    /// Returns the queue URL.
    #[must_use]
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Builds the queue client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn build(self) -> Result<HttpQueue, ProtocolError> {
        Ok(HttpQueue {
            client: self.http.into_client()?,
            queue_url: self.queue_url,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveRequest<'a> {
    queue_url: &'a str,
    max_number_of_messages: u8,
    wait_time_seconds: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveResponse {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireMessage {
    #[serde(default)]
    message_id: String,
    receipt_handle: String,
    #[serde(default)]
    body: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteRequest<'a> {
    queue_url: &'a str,
    receipt_handle: &'a str,
}

/// Command queue client for a JSON-protocol queue endpoint.
#[derive(Debug, Clone)]
pub struct HttpQueue {
    client: HttpClient,
    queue_url: String,
}

impl HttpQueue {
    /// Returns the queue URL.
    #[must_use]
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

impl CommandQueue for HttpQueue {
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>, ProtocolError> {
        let wait_time_seconds = wait_seconds(wait);
        let wait = Duration::from_secs(wait_time_seconds);
        let request = ReceiveRequest {
            queue_url: &self.queue_url,
            max_number_of_messages: 1,
            wait_time_seconds,
        };

        let body = self.client.call(RECEIVE_TARGET, &request, wait).await?;
        let response: ReceiveResponse = serde_json::from_str(&body)
            .map_err(|e| ProtocolError::InvalidResponse(e.to_string()))?;

        let message = response.messages.into_iter().next().map(|m| QueueMessage {
            message_id: m.message_id,
            receipt_handle: ReceiptHandle::new(m.receipt_handle),
            body: m.body,
        });

        if let Some(message) = &message {
            tracing::debug!(message_id = %message.message_id, "Received queue message");
        }
        Ok(message)
    }

    async fn delete(&self, handle: &ReceiptHandle) -> Result<(), ProtocolError> {
        let request = DeleteRequest {
            queue_url: &self.queue_url,
            receipt_handle: handle.as_str(),
        };
        self.client
            .call(DELETE_TARGET, &request, Duration::ZERO)
            .await?;
        tracing::debug!(receipt = %handle, "Deleted queue message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_request_shape() {
        let request = ReceiveRequest {
            queue_url: "https://q/1/cmds",
            max_number_of_messages: 1,
            wait_time_seconds: 5,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "QueueUrl": "https://q/1/cmds",
                "MaxNumberOfMessages": 1,
                "WaitTimeSeconds": 5
            })
        );
    }

    #[test]
    fn wait_rounds_up_to_whole_seconds() {
        assert_eq!(wait_seconds(Duration::ZERO), 0);
        assert_eq!(wait_seconds(Duration::from_millis(1)), 1);
        assert_eq!(wait_seconds(Duration::from_millis(500)), 1);
        assert_eq!(wait_seconds(Duration::from_secs(5)), 5);
        assert_eq!(wait_seconds(Duration::from_millis(5200)), 6);
        assert_eq!(wait_seconds(Duration::from_millis(19_500)), 20);
        assert_eq!(wait_seconds(Duration::from_secs(60)), 20);
    }

    #[test]
    fn empty_receive_response_has_no_messages() {
        let response: ReceiveResponse = serde_json::from_str("{}").unwrap();
        assert!(response.messages.is_empty());
    }
}
