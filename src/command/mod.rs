// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Operator commands and their peripheral payloads.
//!
//! Commands arrive as queue messages with a JSON body such as
//! `{"command": "unlock"}`. The name is matched case-insensitively after
//! trimming whitespace. Each known command maps to a fixed payload written
//! to the actuator characteristic.
//!
//! | Command | Payload |
//! |---------|---------|
//! | `unlock` | `OPEN` |
//!
//! # Examples
//!
//! ```
//! use blebridge::command::{BridgeCommand, CommandMessage};
//!
//! let message = CommandMessage::parse(r#"{"command": "  UNLOCK "}"#).unwrap();
//! assert_eq!(message.name(), "unlock");
//!
//! let command = BridgeCommand::from_name(message.name()).unwrap();
//! assert_eq!(command.payload(), b"OPEN");
//! ```

use std::fmt;

use serde::Deserialize;

use crate::error::ParseError;

/// A decoded command message body.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    name: String,
    params: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Deserialize)]
struct WireCommand {
    command: Option<String>,
    #[serde(default)]
    params: Option<serde_json::Map<String, serde_json::Value>>,
}

impl CommandMessage {
    /// Parses a message body.
    ///
    /// A missing or null `command` parses as an empty name, which matches
    /// no known command.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the body is not a JSON object, or its
    /// `command` is not a string.
    pub fn parse(body: &str) -> Result<Self, ParseError> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        if !value.is_object() {
            return Err(ParseError::UnexpectedFormat(format!(
                "command body must be a JSON object, got: {body}"
            )));
        }

        let wire = WireCommand::deserialize(value)?;

        Ok(Self {
            name: normalize(wire.command.as_deref().unwrap_or_default()),
            params: wire.params,
        })
    }

    /// Returns the normalized (trimmed, lower-case) command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optional parameters object.
    #[must_use]
    pub fn params(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.params.as_ref()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A command the bridge knows how to actuate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeCommand {
    /// Open the door actuator.
    Unlock,
}

impl BridgeCommand {
    /// Every known command.
    pub const ALL: [Self; 1] = [Self::Unlock];

    /// Looks up a command by normalized name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.name() == normalize(name))
    }

    /// Returns the command name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unlock => "unlock",
        }
    }

    /// Returns the bytes written to the actuator characteristic.
    #[must_use]
    pub const fn payload(&self) -> &'static [u8] {
        match self {
            Self::Unlock => b"OPEN",
        }
    }
}

impl fmt::Display for BridgeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
