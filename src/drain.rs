// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Draining operator commands from the queue into the peripheral.
//!
//! Each call to [`CommandDrain::drain_one`] handles at most one message:
//!
//! 1. long-poll the queue for up to the configured wait time
//! 2. decode the body and look the command up
//! 3. write the command payload to the actuator characteristic
//! 4. delete the message once the write is acknowledged
//!
//! A message whose write fails is left on the queue and redelivered later.
//! Nothing here ends the bridge loop; every failure is reported as a
//! [`DrainResult`].

use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use crate::command::{BridgeCommand, CommandMessage};
use crate::error::DrainError;
use crate::link::PeripheralLink;
use crate::queue::{CommandQueue, QueueMessage};

/// What to do with a message naming a command the bridge does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCommandPolicy {
    /// Delete the message so it is not redelivered.
    #[default]
    Acknowledge,
    /// Leave the message for redelivery, e.g. to a newer bridge version.
    Leave,
}

/// Outcome of one drain attempt.
#[derive(Debug)]
pub enum DrainResult {
    /// No message arrived within the wait time.
    Idle,
    /// A command was written and its message deleted.
    Executed {
        /// The executed command.
        command: BridgeCommand,
        /// Queue id of the message.
        message_id: String,
    },
    /// The message named an unknown command.
    Ignored {
        /// The normalized command name.
        name: String,
        /// Whether the message was deleted.
        acknowledged: bool,
    },
    /// The message could not be handled and was not deleted.
    Failed(DrainError),
}

/// Drains commands one message at a time.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use blebridge::drain::{CommandDrain, UnknownCommandPolicy};
/// use blebridge::link::DEFAULT_CHARACTERISTIC_UUID;
///
/// let drain = CommandDrain::new(DEFAULT_CHARACTERISTIC_UUID)
///     .with_wait_time(Duration::from_secs(2))
///     .with_unknown_policy(UnknownCommandPolicy::Leave);
///
/// assert_eq!(drain.wait_time(), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct CommandDrain {
    actuator: Uuid,
    wait_time: Duration,
    unknown_policy: UnknownCommandPolicy,
}

impl CommandDrain {
    /// Default long-poll wait.
    pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(5);

    /// Creates a drain writing to the `actuator` characteristic.
    #[must_use]
    pub fn new(actuator: Uuid) -> Self {
        Self {
            actuator,
            wait_time: Self::DEFAULT_WAIT_TIME,
            unknown_policy: UnknownCommandPolicy::default(),
        }
    }

    /// Sets the long-poll wait.
    #[must_use]
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    /// Sets the policy for unknown commands.
    #[must_use]
    pub fn with_unknown_policy(mut self, policy: UnknownCommandPolicy) -> Self {
        self.unknown_policy = policy;
        self
    }

    /// Returns the long-poll wait.
    #[must_use]
    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    /// Returns the unknown command policy.
    #[must_use]
    pub fn unknown_policy(&self) -> UnknownCommandPolicy {
        self.unknown_policy
    }

    /// Receives and handles at most one message.
    pub async fn drain_one<Q, L>(&self, queue: &Q, link: &L) -> DrainResult
    where
        Q: CommandQueue,
        L: PeripheralLink,
    {
        let message = match queue.receive(self.wait_time).await {
            Ok(Some(message)) => message,
            Ok(None) => return DrainResult::Idle,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to receive from command queue");
                return DrainResult::Failed(DrainError::Queue(e));
            }
        };

        let parsed = match CommandMessage::parse(&message.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Malformed command message left for redelivery"
                );
                return DrainResult::Failed(DrainError::Decode(e));
            }
        };

        match BridgeCommand::from_name(parsed.name()) {
            Some(command) => self.execute(command, &message, queue, link).await,
            None => self.ignore(parsed.name(), &message, queue).await,
        }
    }

    async fn execute<Q, L>(
        &self,
        command: BridgeCommand,
        message: &QueueMessage,
        queue: &Q,
        link: &L,
    ) -> DrainResult
    where
        Q: CommandQueue,
        L: PeripheralLink,
    {
        tracing::info!(%command, message_id = %message.message_id, "Executing command");

        if let Err(e) = link.write(self.actuator, command.payload()).await {
            tracing::warn!(
                %command,
                message_id = %message.message_id,
                error = %e,
                "Command write failed, message left for redelivery"
            );
            return DrainResult::Failed(DrainError::Write(e));
        }

        if let Err(e) = queue.delete(&message.receipt_handle).await {
            tracing::warn!(
                %command,
                message_id = %message.message_id,
                error = %e,
                "Command executed but not acknowledged; redelivery will actuate again"
            );
            return DrainResult::Failed(DrainError::Acknowledge(e));
        }

        DrainResult::Executed {
            command,
            message_id: message.message_id.clone(),
        }
    }

    async fn ignore<Q: CommandQueue>(
        &self,
        name: &str,
        message: &QueueMessage,
        queue: &Q,
    ) -> DrainResult {
        let acknowledged = match self.unknown_policy {
            UnknownCommandPolicy::Leave => false,
            UnknownCommandPolicy::Acknowledge => {
                match queue.delete(&message.receipt_handle).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::debug!(error = %e, "Failed to acknowledge unknown command");
                        false
                    }
                }
            }
        };

        tracing::warn!(
            command = name,
            message_id = %message.message_id,
            acknowledged,
            "Ignoring unknown command"
        );
        DrainResult::Ignored {
            name: name.to_string(),
            acknowledged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    use crate::error::LinkError;
    use crate::link::{DEFAULT_CHARACTERISTIC_UUID, NotifyCallback};
    use crate::queue::MemoryQueue;

    #[derive(Default)]
    struct FakeLink {
        writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
        fail_writes: bool,
    }

    impl FakeLink {
        fn failing() -> Self {
            Self {
                fail_writes: true,
                ..Self::default()
            }
        }

        fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
            self.writes.lock().clone()
        }
    }

    impl PeripheralLink for FakeLink {
        async fn subscribe(&mut self, _: Uuid, _: NotifyCallback) -> Result<(), LinkError> {
            Ok(())
        }

        async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<(), LinkError> {
            if self.fail_writes {
                return Err(LinkError::Timeout(5000));
            }
            self.writes.lock().push((characteristic, payload.to_vec()));
            Ok(())
        }

        async fn is_connected(&self) -> bool {
            true
        }

        async fn disconnect(&mut self) -> Result<(), LinkError> {
            Ok(())
        }
    }

    fn drain() -> CommandDrain {
        CommandDrain::new(DEFAULT_CHARACTERISTIC_UUID).with_wait_time(Duration::ZERO)
    }

    #[tokio::test]
    async fn empty_queue_is_idle() {
        let queue = MemoryQueue::new();
        let link = FakeLink::default();

        assert!(matches!(
            drain().drain_one(&queue, &link).await,
            DrainResult::Idle
        ));
        assert!(link.writes().is_empty());
    }

    #[tokio::test]
    async fn unlock_writes_open_and_deletes() {
        let queue = MemoryQueue::new();
        let link = FakeLink::default();
        let id = queue.push(r#"{"command":"Unlock "}"#);

        let result = drain().drain_one(&queue, &link).await;

        assert!(matches!(
            result,
            DrainResult::Executed { command: BridgeCommand::Unlock, ref message_id } if *message_id == id
        ));
        assert_eq!(
            link.writes(),
            vec![(DEFAULT_CHARACTERISTIC_UUID, b"OPEN".to_vec())]
        );
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn unknown_command_is_acknowledged_by_default() {
        let queue = MemoryQueue::new();
        let link = FakeLink::default();
        queue.push(r#"{"command":"lockdown"}"#);

        let result = drain().drain_one(&queue, &link).await;

        assert!(matches!(
            result,
            DrainResult::Ignored { ref name, acknowledged: true } if name == "lockdown"
        ));
        assert!(link.writes().is_empty());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn unknown_command_can_be_left() {
        let queue = MemoryQueue::new();
        let link = FakeLink::default();
        queue.push(r#"{"command":"lockdown"}"#);

        let result = drain()
            .with_unknown_policy(UnknownCommandPolicy::Leave)
            .drain_one(&queue, &link)
            .await;

        assert!(matches!(
            result,
            DrainResult::Ignored { acknowledged: false, .. }
        ));
        assert_eq!(queue.in_flight_len(), 1);
    }

    #[tokio::test]
    async fn failed_write_leaves_message() {
        let queue = MemoryQueue::new();
        let link = FakeLink::failing();
        queue.push(r#"{"command":"unlock"}"#);

        let result = drain().drain_one(&queue, &link).await;

        assert!(matches!(result, DrainResult::Failed(DrainError::Write(_))));
        assert_eq!(queue.delete_count(), 0);
        assert_eq!(queue.in_flight_len(), 1);
    }

    #[tokio::test]
    async fn message_without_command_follows_unknown_policy() {
        let queue = MemoryQueue::new();
        let link = FakeLink::default();
        queue.push(r#"{"action":"unlock"}"#);

        let result = drain().drain_one(&queue, &link).await;

        assert!(matches!(
            result,
            DrainResult::Ignored { ref name, acknowledged: true } if name.is_empty()
        ));
        assert!(link.writes().is_empty());
        assert_eq!(queue.delete_count(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn message_without_command_is_not_redelivered() {
        let queue = MemoryQueue::with_visibility_timeout(Duration::from_secs(1));
        let link = FakeLink::default();
        queue.push(r#"{"command":null}"#);

        assert!(matches!(
            drain().drain_one(&queue, &link).await,
            DrainResult::Ignored { acknowledged: true, .. }
        ));
        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(matches!(
            drain().drain_one(&queue, &link).await,
            DrainResult::Idle
        ));
        assert_eq!(queue.delete_count(), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_not_acknowledged() {
        let queue = MemoryQueue::new();
        let link = FakeLink::default();
        queue.push("unlock please");

        let result = drain().drain_one(&queue, &link).await;

        assert!(matches!(result, DrainResult::Failed(DrainError::Decode(_))));
        assert!(link.writes().is_empty());
        assert_eq!(queue.delete_count(), 0);
    }

    #[test]
    fn policy_deserializes_lowercase() {
        let policy: UnknownCommandPolicy = serde_json::from_str("\"leave\"").unwrap();
        assert_eq!(policy, UnknownCommandPolicy::Leave);
    }
}
