// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Telemetry decoding for peripheral notifications.
//!
//! The peripheral pushes a UTF-8 JSON object on every notification, for
//! example `{"tempC":22.5,"irSensor":"NoObject"}` or `{"reed_front":"open"}`.
//! [`decode`] turns such a payload into a [`PartialUpdate`], which is merged
//! into the device state by [`ingest`].
//!
//! # Examples
//!
//! ```
//! use blebridge::state::SharedState;
//! use blebridge::telemetry;
//! use blebridge::types::{Contact, ContactState};
//!
//! let state = SharedState::new();
//! let changed = telemetry::ingest(&state, br#"{"reed_front":"open"}"#).unwrap();
//!
//! assert!(changed);
//! assert_eq!(state.snapshot().contact(Contact::Front), ContactState::Open);
//! ```

mod payload;

pub use payload::PartialUpdate;

use serde::Deserialize;

use crate::error::ParseError;
use crate::state::SharedState;

/// Decodes a raw notification payload.
///
/// Trailing NUL bytes and surrounding whitespace are ignored; some firmware
/// sends fixed-size, zero-padded buffers.
///
/// # Errors
///
/// Returns `ParseError` if the payload is not UTF-8, not a JSON object, or
/// carries an invalid value for a recognized channel. Invalid payloads are
/// rejected as a whole; no channel of a rejected payload is applied.
pub fn decode(raw: &[u8]) -> Result<PartialUpdate, ParseError> {
    let text = std::str::from_utf8(raw)?;
    let text = text.trim_end_matches('\0').trim();

    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(ParseError::UnexpectedFormat(format!(
            "expected a JSON object, got: {text}"
        )));
    }

    PartialUpdate::deserialize(value).map_err(ParseError::Json)
}

/// Decodes a payload and merges it into the shared state.
///
/// Returns `true` if any channel changed.
///
/// # Errors
///
/// Returns `ParseError` if the payload cannot be decoded; the state is left
/// untouched in that case.
pub fn ingest(state: &SharedState, raw: &[u8]) -> Result<bool, ParseError> {
    let update = decode(raw)?;
    if update.is_empty() {
        tracing::trace!("Notification carried no recognized channels");
        return Ok(false);
    }
    Ok(state.apply(&update.to_state_change()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DeviceState;
    use crate::types::{Contact, ContactState};

    #[test]
    fn decode_object_payload() {
        let update = decode(br#"{"reed_garage":"open"}"#).unwrap();
        assert_eq!(update.contact(Contact::Garage), Some(ContactState::Open));
    }

    #[test]
    fn decode_strips_nul_padding() {
        let update = decode(b"{\"irSensor\":\"Object\"}\0\0\0").unwrap();
        assert_eq!(update.ir_sensor(), Some("Object"));
    }

    #[test]
    fn decode_rejects_non_object() {
        assert!(matches!(
            decode(b"[1,2,3]"),
            Err(ParseError::UnexpectedFormat(_))
        ));
        assert!(matches!(
            decode(b"\"open\""),
            Err(ParseError::UnexpectedFormat(_))
        ));
    }

    #[test]
    fn decode_rejects_malformed_json() {
        assert!(matches!(decode(b"{reed_front:open"), Err(ParseError::Json(_))));
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert!(matches!(decode(&[0xff, 0xfe]), Err(ParseError::Utf8(_))));
    }

    #[test]
    fn ingest_unknown_fields_leave_state_untouched() {
        let state = SharedState::new();
        let changed = ingest(&state, br#"{"humidity":40,"door":"open"}"#).unwrap();

        assert!(!changed);
        assert_eq!(state.snapshot(), DeviceState::new());
    }

    #[test]
    fn ingest_invalid_payload_leaves_state_untouched() {
        let state = SharedState::new();
        let result = ingest(&state, br#"{"tempC":25.0,"reed_back":"maybe"}"#);

        assert!(result.is_err());
        assert_eq!(state.snapshot(), DeviceState::new());
    }

    #[test]
    fn ingest_same_payload_twice_is_idempotent() {
        let state = SharedState::new();
        let payload = br#"{"tempC":25.5,"reed_back":"open"}"#;

        assert!(ingest(&state, payload).unwrap());
        let after_once = state.snapshot();
        assert!(!ingest(&state, payload).unwrap());
        assert_eq!(state.snapshot(), after_once);
    }
}
