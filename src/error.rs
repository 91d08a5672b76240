// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the bridge.
//!
//! Errors are split by the component that raises them: the peripheral link,
//! telemetry and command decoding, the HTTP transport used by the store and
//! queue, command draining, and configuration. Only link and configuration
//! errors are fatal to the bridge loop; every other error is logged and
//! recovered from locally.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred on the peripheral link.
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// Error occurred during store or queue communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while decoding a payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error occurred while validating a value.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A contact sensor reported something other than `open` or `closed`.
    #[error("invalid contact state: {0}")]
    InvalidContactState(String),

    /// A numeric reading is NaN or infinite.
    #[error("reading is not a finite number: {0}")]
    NonFiniteReading(String),
}

/// Errors raised by the peripheral link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No advertiser with the requested name was seen during the scan.
    #[error("no peripheral advertising as {name:?} found within {scan_ms} ms")]
    NotFound {
        /// The advertised name that was searched for.
        name: String,
        /// Scan duration in milliseconds.
        scan_ms: u64,
    },

    /// No Bluetooth adapter is available on this host.
    #[error("no bluetooth adapter available")]
    NoAdapter,

    /// Connecting to the peripheral failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The link dropped while the bridge was running.
    #[error("peripheral disconnected")]
    Disconnected,

    /// The peripheral does not expose the configured characteristic.
    #[error("characteristic {0} not found on peripheral")]
    CharacteristicNotFound(uuid::Uuid),

    /// A link operation did not complete in time.
    #[error("link operation timed out after {0} ms")]
    Timeout(u64),

    /// Underlying BLE stack error.
    #[error("BLE error: {0}")]
    Btle(#[from] btleplug::Error),
}

impl LinkError {
    /// Returns true if the error means the link is gone and must be
    /// re-established before further operations can succeed.
    #[must_use]
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            Self::Disconnected
                | Self::ConnectionFailed(_)
                | Self::Btle(btleplug::Error::NotConnected | btleplug::Error::DeviceNotFound)
        )
    }
}

/// Errors related to the HTTP transport of the store and the queue.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, usually the service error document.
        body: String,
    },

    /// The service response could not be understood.
    #[error("invalid service response: {0}")]
    InvalidResponse(String),

    /// Authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Request body could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// In-memory backend failure (used by dry runs and tests).
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors related to decoding telemetry and command payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload is not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Expected field is missing.
    #[error("missing field: {0}")]
    MissingField(String),

    /// Unexpected payload format.
    #[error("unexpected payload format: {0}")]
    UnexpectedFormat(String),

    /// A recognized field carries an unusable value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// Errors raised while draining one command from the queue.
///
/// None of these end the bridge loop; the message stays in the queue and is
/// redelivered once its visibility timeout expires.
#[derive(Debug, Error)]
pub enum DrainError {
    /// Receiving from the queue failed.
    #[error("queue receive failed: {0}")]
    Queue(#[source] ProtocolError),

    /// The message body is not a valid command document.
    #[error("malformed command message: {0}")]
    Decode(#[from] ParseError),

    /// The peripheral write failed.
    #[error("peripheral write failed: {0}")]
    Write(#[from] LinkError),

    /// The command was executed but the message could not be deleted.
    #[error("acknowledge failed: {0}")]
    Acknowledge(#[source] ProtocolError),
}

impl DrainError {
    /// Returns true if the underlying cause is a lost peripheral link.
    #[must_use]
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Self::Write(err) if err.is_connection_loss())
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Loading configuration sources failed.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A UUID setting could not be parsed.
    #[error("invalid UUID for {field}: {source}")]
    InvalidUuid {
        /// The offending setting.
        field: &'static str,
        /// Parse failure.
        source: uuid::Error,
    },

    /// A required setting is empty.
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::InvalidContactState("ajar".to_string());
        assert_eq!(err.to_string(), "invalid contact state: ajar");
    }

    #[test]
    fn error_from_link_error() {
        let err: Error = LinkError::Disconnected.into();
        assert!(matches!(err, Error::Link(LinkError::Disconnected)));
    }

    #[test]
    fn not_found_display() {
        let err = LinkError::NotFound {
            name: "ESP32_BLE_Cam".to_string(),
            scan_ms: 5000,
        };
        assert_eq!(
            err.to_string(),
            "no peripheral advertising as \"ESP32_BLE_Cam\" found within 5000 ms"
        );
    }

    #[test]
    fn connection_loss_classification() {
        assert!(LinkError::Disconnected.is_connection_loss());
        assert!(LinkError::Btle(btleplug::Error::NotConnected).is_connection_loss());
        assert!(!LinkError::Timeout(100).is_connection_loss());
        assert!(DrainError::Write(LinkError::Disconnected).is_connection_loss());
        assert!(
            !DrainError::Decode(ParseError::MissingField("command".into())).is_connection_loss()
        );
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::MissingField("command".to_string());
        assert_eq!(err.to_string(), "missing field: command");
    }
}
