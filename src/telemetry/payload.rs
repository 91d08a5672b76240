// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parser for notification payloads.

use serde::{Deserialize, Deserializer, de};

use crate::state::StateChange;
use crate::types::{Contact, ContactState, Temperature};

/// Channels present in one notification.
///
/// Every field is optional: firmware sends only what it measured. Keys not
/// listed here are ignored so newer firmware can add channels without
/// breaking the bridge.
///
/// # Examples
///
/// ```
/// use blebridge::telemetry::PartialUpdate;
///
/// let json = r#"{"tempC":21.5,"irSensor":"Object","rssi":-70}"#;
/// let update: PartialUpdate = serde_json::from_str(json).unwrap();
///
/// assert_eq!(update.temperature().map(|t| t.value()), Some(21.5));
/// assert_eq!(update.ir_sensor(), Some("Object"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PartialUpdate {
    /// Temperature in the firmware's native key.
    #[serde(rename = "tempC", default)]
    temp_c: Option<Temperature>,

    /// Temperature (alternative key used by older firmware).
    #[serde(rename = "temp", default)]
    temp: Option<Temperature>,

    #[serde(rename = "reed_front", default)]
    reed_front: Option<ContactState>,

    #[serde(rename = "reed_back", default)]
    reed_back: Option<ContactState>,

    #[serde(rename = "reed_garage", default)]
    reed_garage: Option<ContactState>,

    #[serde(rename = "reed_window", default)]
    reed_window: Option<ContactState>,

    /// Infrared presence sensor.
    #[serde(rename = "irSensor", default, deserialize_with = "scalar_text")]
    ir_sensor: Option<String>,

    /// Infrared presence sensor (alternative key).
    #[serde(rename = "ir_sensor", default, deserialize_with = "scalar_text")]
    ir_sensor_alt: Option<String>,
}

/// Reads a string, number or boolean as text. Null is absent.
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(text)) => Ok(Some(text)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string, number or boolean, got {other}"
        ))),
    }
}

impl PartialUpdate {
    /// Returns the temperature if present. `tempC` wins over `temp`.
    #[must_use]
    pub fn temperature(&self) -> Option<Temperature> {
        self.temp_c.or(self.temp)
    }

    /// Returns the state reported for a contact, if present.
    #[must_use]
    pub fn contact(&self, contact: Contact) -> Option<ContactState> {
        match contact {
            Contact::Front => self.reed_front,
            Contact::Back => self.reed_back,
            Contact::Garage => self.reed_garage,
            Contact::Window => self.reed_window,
        }
    }

    /// Returns the infrared sensor value if present.
    #[must_use]
    pub fn ir_sensor(&self) -> Option<&str> {
        self.ir_sensor
            .as_deref()
            .or(self.ir_sensor_alt.as_deref())
    }

    /// Returns true if no recognized channel is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_state_changes().is_empty()
    }

    /// Converts the update into individual state changes.
    #[must_use]
    pub fn to_state_changes(&self) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if let Some(t) = self.temperature() {
            changes.push(StateChange::Temperature(t));
        }

        for contact in Contact::ALL {
            if let Some(state) = self.contact(contact) {
                changes.push(StateChange::Contact { contact, state });
            }
        }

        if let Some(ir) = self.ir_sensor() {
            changes.push(StateChange::IrSensor(ir.to_string()));
        }

        changes
    }

    /// Converts the update into a single batch change.
    #[must_use]
    pub fn to_state_change(&self) -> StateChange {
        StateChange::Batch(self.to_state_changes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_payload() {
        let json = r#"{
            "tempC": 23.4,
            "reed_front": "open",
            "reed_back": "closed",
            "reed_garage": "closed",
            "reed_window": "open",
            "irSensor": "Object"
        }"#;
        let update: PartialUpdate = serde_json::from_str(json).unwrap();

        assert_eq!(update.temperature(), Some(Temperature::new(23.4).unwrap()));
        assert_eq!(update.contact(Contact::Front), Some(ContactState::Open));
        assert_eq!(update.contact(Contact::Window), Some(ContactState::Open));
        assert_eq!(update.ir_sensor(), Some("Object"));
        assert_eq!(update.to_state_changes().len(), 6);
    }

    #[test]
    fn primary_keys_win_over_alternatives() {
        let json = r#"{"tempC":20,"temp":99,"irSensor":"A","ir_sensor":"B"}"#;
        let update: PartialUpdate = serde_json::from_str(json).unwrap();

        assert_eq!(update.temperature().map(|t| t.value()), Some(20.0));
        assert_eq!(update.ir_sensor(), Some("A"));
    }

    #[test]
    fn alternative_keys_are_recognized() {
        let json = r#"{"temp":"18.5","ir_sensor":"NoObject"}"#;
        let update: PartialUpdate = serde_json::from_str(json).unwrap();

        assert_eq!(update.temperature().map(|t| t.value()), Some(18.5));
        assert_eq!(update.ir_sensor(), Some("NoObject"));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let json = r#"{"battery":87,"fw":"1.2.0"}"#;
        let update: PartialUpdate = serde_json::from_str(json).unwrap();

        assert!(update.is_empty());
        assert_eq!(update, PartialUpdate::default());
    }

    #[test]
    fn invalid_contact_value_is_rejected() {
        let json = r#"{"reed_front":"ajar"}"#;
        assert!(serde_json::from_str::<PartialUpdate>(json).is_err());
    }

    #[test]
    fn scalar_ir_values_are_kept_as_text() {
        let json = r#"{"irSensor":1,"reed_garage":"open"}"#;
        let update: PartialUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.ir_sensor(), Some("1"));
        assert_eq!(update.contact(Contact::Garage), Some(ContactState::Open));

        let update: PartialUpdate = serde_json::from_str(r#"{"ir_sensor":true}"#).unwrap();
        assert_eq!(update.ir_sensor(), Some("true"));
    }

    #[test]
    fn structured_ir_value_is_rejected() {
        assert!(serde_json::from_str::<PartialUpdate>(r#"{"irSensor":["Object"]}"#).is_err());
        assert!(serde_json::from_str::<PartialUpdate>(r#"{"irSensor":{"v":1}}"#).is_err());
    }

    #[test]
    fn null_fields_are_absent() {
        let json = r#"{"reed_front":null,"tempC":null,"irSensor":null}"#;
        let update: PartialUpdate = serde_json::from_str(json).unwrap();
        assert!(update.is_empty());
    }
}
