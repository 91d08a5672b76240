// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process command queue.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::ProtocolError;

use super::{CommandQueue, QueueMessage, ReceiptHandle};

/// Default time a received message stays invisible before redelivery.
const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct Stored {
    message_id: String,
    body: String,
}

#[derive(Debug)]
struct InFlight {
    message: Stored,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    ready: VecDeque<Stored>,
    in_flight: HashMap<ReceiptHandle, InFlight>,
}

impl Inner {
    /// Moves in-flight messages whose visibility timeout expired back to the
    /// front of the ready queue.
    fn requeue_expired(&mut self, now: Instant) {
        let expired: Vec<ReceiptHandle> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.visible_at <= now)
            .map(|(handle, _)| handle.clone())
            .collect();

        for handle in expired {
            if let Some(entry) = self.in_flight.remove(&handle) {
                self.ready.push_front(entry.message);
            }
        }
    }
}

/// Command queue kept in memory, with at-least-once delivery.
///
/// A received message becomes invisible for the visibility timeout and is
/// redelivered with a fresh receipt handle unless deleted, mirroring the
/// semantics of a hosted queue. Uses tokio time, so paused-clock tests can
/// advance through timeouts deterministically.
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
    visibility_timeout: Duration,
    next_id: Arc<AtomicU64>,
    deletes: Arc<AtomicUsize>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    /// Creates an empty queue with the default visibility timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }

    /// Creates an empty queue with a custom visibility timeout.
    #[must_use]
    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            notify: Arc::new(Notify::new()),
            visibility_timeout,
            next_id: Arc::new(AtomicU64::new(1)),
            deletes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Enqueues a message body and returns its message id.
    pub fn push(&self, body: impl Into<String>) -> String {
        let message_id = format!("msg-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.lock().ready.push_back(Stored {
            message_id: message_id.clone(),
            body: body.into(),
        });
        self.notify.notify_one();
        message_id
    }

    /// Number of messages ready for delivery.
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.inner.lock().ready.len()
    }

    /// Number of delivered, not yet deleted messages.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Number of successful deletions.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Returns true if no message remains, delivered or not.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock();
        inner.ready.is_empty() && inner.in_flight.is_empty()
    }

    fn try_take(&self) -> Option<QueueMessage> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.requeue_expired(now);

        let stored = inner.ready.pop_front()?;
        let handle = ReceiptHandle::new(format!(
            "{}-rh{}",
            stored.message_id,
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));
        let message = QueueMessage {
            message_id: stored.message_id.clone(),
            receipt_handle: handle.clone(),
            body: stored.body.clone(),
        };
        inner.in_flight.insert(
            handle,
            InFlight {
                message: stored,
                visible_at: now + self.visibility_timeout,
            },
        );
        Some(message)
    }
}

impl CommandQueue for MemoryQueue {
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>, ProtocolError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(message) = self.try_take() {
                return Ok(Some(message));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // Wake on a push or when the wait elapses; expired in-flight
            // messages are picked up on the next attempt.
            let _ = tokio::time::timeout(deadline - now, self.notify.notified()).await;
        }
    }

    async fn delete(&self, handle: &ReceiptHandle) -> Result<(), ProtocolError> {
        let removed = self.inner.lock().in_flight.remove(handle);
        match removed {
            Some(_) => {
                self.deletes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(ProtocolError::Unavailable(format!(
                "receipt handle {handle} is not valid"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn receive_returns_none_after_wait() {
        let queue = MemoryQueue::new();
        let started = Instant::now();

        let message = queue.receive(Duration::from_secs(5)).await.unwrap();

        assert!(message.is_none());
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn receive_then_delete() {
        let queue = MemoryQueue::new();
        let id = queue.push(r#"{"command":"unlock"}"#);

        let message = queue.receive(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(message.message_id, id);
        assert_eq!(queue.in_flight_len(), 1);

        queue.delete(&message.receipt_handle).await.unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.delete_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn undeleted_message_is_redelivered_after_visibility_timeout() {
        let queue = MemoryQueue::with_visibility_timeout(Duration::from_secs(10));
        queue.push("body");

        let first = queue.receive(Duration::ZERO).await.unwrap().unwrap();
        assert!(queue.receive(Duration::ZERO).await.unwrap().is_none());

        tokio::time::advance(Duration::from_secs(11)).await;

        let second = queue.receive(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(first.message_id, second.message_id);
        assert_ne!(first.receipt_handle, second.receipt_handle);

        // The stale handle no longer acknowledges anything.
        assert!(queue.delete(&first.receipt_handle).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn push_wakes_waiting_receiver() {
        let queue = MemoryQueue::new();
        let producer = queue.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            producer.push("late");
        });

        let message = queue.receive(Duration::from_secs(10)).await.unwrap();
        assert_eq!(message.unwrap().body, "late");
    }
}
