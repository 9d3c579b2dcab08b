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

//! Deterministic identities for indexed records.
//!
//! Event records are keyed by the transaction hash followed by the log index
//! (4 bytes, little-endian `i32`). Aggregate records are keyed by a fixed
//! sentinel (protocol stats) or by the lowercase hex user address.

use std::{fmt, str::FromStr};

use alloy::primitives::{Address, FixedBytes, B256};
use thiserror::Error;

/// Length in bytes of an [EventId].
pub const EVENT_ID_LEN: usize = 36;

/// Key of the protocol-wide statistics singleton.
pub const PROTOCOL_STATS_KEY: &str = "global";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EventIdError {
    #[error("log index {0} does not fit in an i32")]
    LogIndexOutOfRange(u64),

    #[error("invalid event id hex: {0}")]
    InvalidHex(String),

    #[error("invalid event id length: expected {EVENT_ID_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Globally unique identity of one on-chain event occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(FixedBytes<EVENT_ID_LEN>);

impl EventId {
    pub fn new(tx_hash: B256, log_index: i32) -> Self {
        let mut bytes = [0u8; EVENT_ID_LEN];
        bytes[..32].copy_from_slice(tx_hash.as_slice());
        bytes[32..].copy_from_slice(&log_index.to_le_bytes());
        Self(FixedBytes(bytes))
    }

    /// Builds the identity from the raw log position reported by the RPC node.
    pub fn from_log_position(tx_hash: B256, log_index: u64) -> Result<Self, EventIdError> {
        let log_index =
            i32::try_from(log_index).map_err(|_| EventIdError::LogIndexOutOfRange(log_index))?;
        Ok(Self::new(tx_hash, log_index))
    }

    pub fn tx_hash(&self) -> B256 {
        B256::from_slice(&self.0[..32])
    }

    pub fn log_index(&self) -> i32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.0[32..]);
        i32::from_le_bytes(buf)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for EventId {
    type Err = EventIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|_| EventIdError::InvalidHex(s.to_string()))?;
        if bytes.len() != EVENT_ID_LEN {
            return Err(EventIdError::InvalidLength(bytes.len()));
        }
        Ok(Self(FixedBytes::from_slice(&bytes)))
    }
}

/// Storage key of the per-user statistics record.
pub fn user_key(user: Address) -> String {
    format!("{user:x}")
}
