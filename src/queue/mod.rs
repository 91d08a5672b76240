// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command queue the bridge drains operator commands from.
//!
//! The queue delivers at least once: a received message stays invisible for
//! a while and is redelivered unless it is deleted with its receipt handle.
//!
//! - [`HttpQueue`]: `ReceiveMessage`/`DeleteMessage` against a JSON-protocol
//!   queue endpoint
//! - [`MemoryQueue`]: in-process queue with visibility-timeout redelivery

mod http;
mod memory;

pub use http::{HttpQueue, HttpQueueConfig};
pub use memory::MemoryQueue;

use std::fmt;
use std::time::Duration;

use crate::error::ProtocolError;

/// Opaque handle identifying one delivery of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    /// Wraps a raw receipt handle.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Returns the raw handle.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Handles are long; the prefix is enough to correlate log lines.
        let prefix: String = self.0.chars().take(16).collect();
        f.write_str(&prefix)
    }
}

/// A message received from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Queue-assigned message id, stable across redeliveries.
    pub message_id: String,
    /// Handle for acknowledging this delivery.
    pub receipt_handle: ReceiptHandle,
    /// Raw message body.
    pub body: String,
}

/// A poll/ack queue of command messages.
#[allow(async_fn_in_trait)]
pub trait CommandQueue {
    /// Receives at most one message, waiting up to `wait` for one to arrive.
    ///
    /// Returns `Ok(None)` if the wait elapsed without a message.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the queue could not be reached.
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>, ProtocolError>;

    /// Acknowledges a delivery, removing the message from the queue.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the deletion was not confirmed; the message
    /// will then be redelivered.
    async fn delete(&self, handle: &ReceiptHandle) -> Result<(), ProtocolError>;
}
