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

mod aggregates;
mod records;
pub mod staking;

use alloy::primitives::{Address, B256, U256};
use std::str::FromStr;
use thiserror::Error;

use crate::{ids::EventId, stats::StatsError};

pub use staking::{DbObj, IndexerDb, RecordOutcome, StakingDb};

/// Largest page a single query may request.
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQL error {0:?}")]
    SqlErr(#[from] sqlx::Error),

    #[error("SQL Migration error {0:?}")]
    MigrateErr(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid block number: {0}")]
    BadBlockNumb(String),

    #[error("Failed to set last block")]
    SetBlockFail,

    #[error("Invalid value {value:?} in column {column}")]
    BadColumn { column: &'static str, value: String },

    #[error("Event id {id} already recorded as {existing} at block {existing_block}, got {kind} at block {block}")]
    EventIdCollision {
        id: EventId,
        existing: String,
        existing_block: u64,
        kind: String,
        block: u64,
    },

    #[error("Aggregate update failed: {0}")]
    Stats(#[from] StatsError),

    #[error("Invalid page request: {0}")]
    BadPage(String),

    #[error("Error: {0}")]
    Error(#[from] anyhow::Error),
}

/// Zero-based page of a paginated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Result<Self, DbError> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(DbError::BadPage(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }
        Ok(Self { page, page_size })
    }

    pub fn first(page_size: u32) -> Result<Self, DbError> {
        Self::new(0, page_size)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.page_size)
    }

    pub fn next(&self) -> Self {
        Self { page: self.page.saturating_add(1), page_size: self.page_size }
    }
}

/// One page of records, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    /// A full page means more records may follow; a short page is the end.
    pub has_next_page: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest) -> Self {
        let has_next_page = items.len() == request.page_size as usize;
        Self { items, page: request.page, page_size: request.page_size, has_next_page }
    }
}

/// Converts a position or timestamp into the signed column type.
pub(crate) fn to_i64(column: &'static str, value: u64) -> Result<i64, DbError> {
    i64::try_from(value).map_err(|_| DbError::BadColumn { column, value: value.to_string() })
}

pub(crate) fn parse_u256(column: &'static str, value: String) -> Result<U256, DbError> {
    U256::from_str(&value).map_err(|_| DbError::BadColumn { column, value })
}

pub(crate) fn parse_address(column: &'static str, value: String) -> Result<Address, DbError> {
    Address::from_str(&value).map_err(|_| DbError::BadColumn { column, value })
}

pub(crate) fn parse_b256(column: &'static str, value: String) -> Result<B256, DbError> {
    B256::from_str(&value).map_err(|_| DbError::BadColumn { column, value })
}
