// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for sensor channels.
//!
//! # Types
//!
//! - [`ContactState`] - Open/closed state of a reed contact
//! - [`Contact`] - Which reed contact a state belongs to
//! - [`Temperature`] - Finite temperature reading with a decimal-safe stored form

mod contact;
mod reading;

pub use contact::{Contact, ContactState};
pub use reading::Temperature;
