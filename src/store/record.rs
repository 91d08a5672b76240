// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The durable telemetry record and its attribute-value encoding.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::state::DeviceState;
use crate::types::{Contact, ContactState, Temperature};

/// A typed attribute value in the store's item format.
///
/// Numbers travel as decimal strings (`{"N": "72.5"}`), which is what keeps
/// float readings free of binary rounding artifacts in decimal stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String attribute.
    #[serde(rename = "S")]
    S(String),
    /// Number attribute in decimal string form.
    #[serde(rename = "N")]
    N(String),
}

impl AttributeValue {
    /// Returns the string payload of an `S` attribute.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            Self::N(_) => None,
        }
    }

    /// Returns the decimal payload of an `N` attribute.
    #[must_use]
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            Self::S(_) => None,
        }
    }
}

/// A stored item: attribute name to typed value.
pub type Item = BTreeMap<String, AttributeValue>;

/// Attribute names used in stored items.
pub mod attr {
    /// Partition key.
    pub const SENSOR_ID: &str = "sensor_id";
    /// Capture time, ISO-8601 UTC.
    pub const TIMESTAMP: &str = "timestamp";
    /// Temperature reading.
    pub const TEMP: &str = "temp";
    /// Infrared presence sensor.
    pub const IR_SENSOR: &str = "ir_sensor";
}

/// A full snapshot of the device state, stamped with its capture time.
///
/// Records are never deltas: every record carries every channel so each one
/// is readable on its own.
///
/// # Examples
///
/// ```
/// use blebridge::state::DeviceState;
/// use blebridge::store::TelemetryRecord;
///
/// let record = TelemetryRecord::capture("home_node_1", &DeviceState::new());
/// let item = record.to_item();
///
/// assert_eq!(item["sensor_id"].as_s(), Some("home_node_1"));
/// assert_eq!(item["reed_front"].as_s(), Some("closed"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    sensor_id: String,
    timestamp: DateTime<Utc>,
    state: DeviceState,
}

impl TelemetryRecord {
    /// Creates a record with an explicit capture time.
    #[must_use]
    pub fn new(sensor_id: impl Into<String>, timestamp: DateTime<Utc>, state: DeviceState) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            timestamp,
            state,
        }
    }

    /// Creates a record of `state` captured now.
    #[must_use]
    pub fn capture(sensor_id: impl Into<String>, state: &DeviceState) -> Self {
        Self::new(sensor_id, Utc::now(), state.clone())
    }

    /// Returns the sensor identity (the store's partition key).
    #[must_use]
    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// Returns the capture time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the captured state.
    #[must_use]
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Encodes the record as a store item.
    #[must_use]
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(
            attr::SENSOR_ID.to_string(),
            AttributeValue::S(self.sensor_id.clone()),
        );
        item.insert(
            attr::TIMESTAMP.to_string(),
            AttributeValue::S(self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
        );
        item.insert(
            attr::TEMP.to_string(),
            AttributeValue::N(self.state.temperature().to_decimal_string()),
        );
        for (contact, state) in self.state.contacts() {
            item.insert(
                contact.channel().to_string(),
                AttributeValue::S(state.as_str().to_string()),
            );
        }
        item.insert(
            attr::IR_SENSOR.to_string(),
            AttributeValue::S(self.state.ir_sensor().to_string()),
        );
        item
    }

    /// Decodes a store item back into a record.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if an attribute is missing, has the wrong type or
    /// carries an invalid value.
    pub fn from_item(item: &Item) -> Result<Self, ParseError> {
        let sensor_id = string_attr(item, attr::SENSOR_ID)?.to_string();

        let raw_timestamp = string_attr(item, attr::TIMESTAMP)?;
        let timestamp = DateTime::parse_from_rfc3339(raw_timestamp)
            .map_err(|e| invalid(attr::TIMESTAMP, &e))?
            .with_timezone(&Utc);

        let mut state = DeviceState::new();

        let raw_temp = item
            .get(attr::TEMP)
            .ok_or_else(|| ParseError::MissingField(attr::TEMP.to_string()))?
            .as_n()
            .ok_or_else(|| wrong_type(attr::TEMP, "N"))?;
        let temp: Temperature = raw_temp.parse().map_err(|e| invalid(attr::TEMP, &e))?;
        state.set_temperature(temp);

        for contact in Contact::ALL {
            let raw = string_attr(item, contact.channel())?;
            let value: ContactState = raw.parse().map_err(|e| invalid(contact.channel(), &e))?;
            state.set_contact(contact, value);
        }

        state.set_ir_sensor(string_attr(item, attr::IR_SENSOR)?);

        Ok(Self {
            sensor_id,
            timestamp,
            state,
        })
    }
}

fn string_attr<'a>(item: &'a Item, name: &str) -> Result<&'a str, ParseError> {
    item.get(name)
        .ok_or_else(|| ParseError::MissingField(name.to_string()))?
        .as_s()
        .ok_or_else(|| wrong_type(name, "S"))
}

fn wrong_type(field: &str, expected: &str) -> ParseError {
    ParseError::InvalidValue {
        field: field.to_string(),
        message: format!("expected {expected} attribute"),
    }
}

fn invalid(field: &str, err: &dyn std::fmt::Display) -> ParseError {
    ParseError::InvalidValue {
        field: field.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateChange;
    use chrono::TimeZone;

    fn sample_state() -> DeviceState {
        let mut state = DeviceState::new();
        state.apply(&StateChange::batch(vec![
            StateChange::temperature(Temperature::new(72.5).unwrap()),
            StateChange::contact(Contact::Front, ContactState::Open),
            StateChange::ir_sensor("Object"),
        ]));
        state
    }

    #[test]
    fn item_carries_every_channel() {
        let record = TelemetryRecord::new(
            "home_node_1",
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
            sample_state(),
        );
        let item = record.to_item();

        assert_eq!(item.len(), 8);
        assert_eq!(item["temp"], AttributeValue::N("72.5".into()));
        assert_eq!(item["reed_front"], AttributeValue::S("open".into()));
        assert_eq!(item["reed_back"], AttributeValue::S("closed".into()));
        assert_eq!(item["ir_sensor"], AttributeValue::S("Object".into()));
        assert_eq!(
            item["timestamp"],
            AttributeValue::S("2025-03-14T09:26:53+00:00".into())
        );
    }

    #[test]
    fn item_round_trips() {
        let record = TelemetryRecord::capture("home_node_1", &sample_state());
        let back = TelemetryRecord::from_item(&record.to_item()).unwrap();

        assert_eq!(back.state(), record.state());
        assert_eq!(back.sensor_id(), "home_node_1");
        assert_eq!(back.timestamp(), record.timestamp());
    }

    #[test]
    fn item_serializes_in_store_json_shape() {
        let record = TelemetryRecord::capture("n1", &sample_state());
        let json = serde_json::to_value(record.to_item()).unwrap();

        assert_eq!(json["temp"], serde_json::json!({"N": "72.5"}));
        assert_eq!(json["sensor_id"], serde_json::json!({"S": "n1"}));
    }

    #[test]
    fn from_item_reports_missing_attribute() {
        let mut item = TelemetryRecord::capture("n1", &DeviceState::new()).to_item();
        item.remove("reed_window");

        let err = TelemetryRecord::from_item(&item).unwrap_err();
        assert!(matches!(err, ParseError::MissingField(f) if f == "reed_window"));
    }

    #[test]
    fn from_item_rejects_wrong_attribute_type() {
        let mut item = TelemetryRecord::capture("n1", &DeviceState::new()).to_item();
        item.insert("temp".into(), AttributeValue::S("72.5".into()));

        assert!(matches!(
            TelemetryRecord::from_item(&item),
            Err(ParseError::InvalidValue { .. })
        ));
    }
}
