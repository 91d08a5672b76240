// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state management types.
//!
//! [`DeviceState`] holds the last-known value of every sensor channel,
//! [`StateChange`] is a decoded update that can be merged into it, and
//! [`SharedState`] is the mutex-guarded handle through which the
//! notification task writes and the bridge loop reads.
//!
//! # Examples
//!
//! ```
//! use blebridge::state::{DeviceState, StateChange};
//! use blebridge::types::Temperature;
//!
//! let mut state = DeviceState::new();
//! state.apply(&StateChange::temperature(Temperature::new(21.5).unwrap()));
//!
//! assert_eq!(state.temperature().value(), 21.5);
//! ```

mod device_state;
mod shared;
mod state_change;

pub use device_state::{DeviceState, IR_SENSOR_DEFAULT};
pub use shared::SharedState;
pub use state_change::StateChange;
