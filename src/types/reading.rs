// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Numeric sensor readings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValueError;

/// A temperature reading as reported by the peripheral.
///
/// Readings are always finite. The stored form is the shortest decimal string
/// that round-trips the underlying float (`72.5`, never
/// `72.5000000000000000001`), so stores with arbitrary-precision decimal
/// semantics keep exactly the value the sensor reported.
///
/// # Examples
///
/// ```
/// use blebridge::types::Temperature;
///
/// let t = Temperature::new(21.7).unwrap();
/// assert_eq!(t.to_decimal_string(), "21.7");
/// assert!(Temperature::new(f64::NAN).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Temperature(f64);

impl Temperature {
    /// Creates a reading, rejecting NaN and infinities.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::NonFiniteReading` if the value is not finite.
    pub fn new(value: f64) -> Result<Self, ValueError> {
        if value.is_finite() {
            Ok(Self(value))
        } else {
            Err(ValueError::NonFiniteReading(value.to_string()))
        }
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.0
    }

    /// Returns the decimal string used in durable records.
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Temperature {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| ValueError::NonFiniteReading(s.to_string()))?;
        Self::new(value)
    }
}

impl TryFrom<f64> for Temperature {
    type Error = ValueError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Serialize for Temperature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0)
    }
}

/// Accepts either a JSON number or a numeric string; firmware builds differ.
impl<'de> Deserialize<'de> for Temperature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Self::new(n).map_err(serde::de::Error::custom),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_string_is_shortest_round_trip() {
        assert_eq!(Temperature::new(72.5).unwrap().to_decimal_string(), "72.5");
        assert_eq!(Temperature::new(23.7).unwrap().to_decimal_string(), "23.7");
        assert_eq!(Temperature::new(0.1).unwrap().to_decimal_string(), "0.1");
        assert_eq!(Temperature::new(-4.0).unwrap().to_decimal_string(), "-4");
    }

    #[test]
    fn decimal_string_parses_back_to_same_value() {
        let t = Temperature::new(19.123_456_789).unwrap();
        let back: Temperature = t.to_decimal_string().parse().unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn rejects_non_finite() {
        assert!(Temperature::new(f64::INFINITY).is_err());
        assert!(Temperature::new(f64::NAN).is_err());
        assert!("inf".parse::<Temperature>().is_err());
        assert!("warm".parse::<Temperature>().is_err());
    }

    #[test]
    fn deserializes_number_or_string() {
        let a: Temperature = serde_json::from_str("24.5").unwrap();
        let b: Temperature = serde_json::from_str("\"24.5\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<Temperature>("true").is_err());
    }
}
