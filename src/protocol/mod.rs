// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport shared by the cloud-side collaborators.
//!
//! - [`HttpClient`]: invokes JSON-protocol operations (`X-Amz-Target` +
//!   JSON body) used by both [`HttpStore`](crate::store::HttpStore) and
//!   [`HttpQueue`](crate::queue::HttpQueue)

mod http;

pub use http::{AMZ_JSON_CONTENT_TYPE, HttpClient, HttpConfig, TARGET_HEADER};
