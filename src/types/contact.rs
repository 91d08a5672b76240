// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contact (reed switch) sensor types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValueError;

/// State of a reed contact on a door or window.
///
/// The peripheral reports contacts as lower-case `"open"` / `"closed"`
/// strings and the durable record stores them the same way. Parsing is
/// case-insensitive and tolerates surrounding whitespace.
///
/// # Examples
///
/// ```
/// use blebridge::types::ContactState;
///
/// let state: ContactState = "OPEN".parse().unwrap();
/// assert_eq!(state, ContactState::Open);
/// assert_eq!(state.as_str(), "open");
/// assert!("ajar".parse::<ContactState>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContactState {
    /// The contact is open (door or window not shut).
    Open,
    /// The contact is closed.
    #[default]
    Closed,
}

impl ContactState {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    /// Returns true if the contact is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ContactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            _ => Err(ValueError::InvalidContactState(s.to_string())),
        }
    }
}

impl Serialize for ContactState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ContactState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The reed contacts wired to the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contact {
    /// Front door.
    Front,
    /// Back door.
    Back,
    /// Garage door.
    Garage,
    /// Window.
    Window,
}

impl Contact {
    /// All contacts, in record order.
    pub const ALL: [Self; 4] = [Self::Front, Self::Back, Self::Garage, Self::Window];

    /// Returns the channel name used in telemetry and stored records.
    #[must_use]
    pub const fn channel(&self) -> &'static str {
        match self {
            Self::Front => "reed_front",
            Self::Back => "reed_back",
            Self::Garage => "reed_garage",
            Self::Window => "reed_window",
        }
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.channel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_state_from_str() {
        assert_eq!("open".parse::<ContactState>().unwrap(), ContactState::Open);
        assert_eq!("Closed".parse::<ContactState>().unwrap(), ContactState::Closed);
        assert_eq!(" open ".parse::<ContactState>().unwrap(), ContactState::Open);
    }

    #[test]
    fn contact_state_from_str_invalid() {
        let result = "unknown".parse::<ContactState>();
        assert!(matches!(
            result.unwrap_err(),
            ValueError::InvalidContactState(_)
        ));
    }

    #[test]
    fn contact_state_defaults_to_closed() {
        assert_eq!(ContactState::default(), ContactState::Closed);
    }

    #[test]
    fn contact_state_serde() {
        let json = serde_json::to_string(&ContactState::Open).unwrap();
        assert_eq!(json, "\"open\"");

        let parsed: ContactState = serde_json::from_str("\"CLOSED\"").unwrap();
        assert_eq!(parsed, ContactState::Closed);

        assert!(serde_json::from_str::<ContactState>("\"ajar\"").is_err());
    }

    #[test]
    fn contact_channels() {
        let channels: Vec<_> = Contact::ALL.iter().map(Contact::channel).collect();
        assert_eq!(
            channels,
            ["reed_front", "reed_back", "reed_garage", "reed_window"]
        );
    }
}
