// Copyright 2026 Boundless Foundation, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod protocol;
pub mod users;

use alloy::primitives::Address;
use axum::response::Response;
use std::str::FromStr;

use crate::handler::bad_request;

/// Parses a user address from the request path.
pub(crate) fn parse_address(address_str: &str) -> Result<Address, Response> {
    Address::from_str(address_str)
        .map_err(|e| bad_request(format!("Invalid address format: {e}")))
}
