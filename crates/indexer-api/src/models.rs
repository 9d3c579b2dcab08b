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

use serde::{Deserialize, Serialize};
use staking_indexer::{
    events::{
        EmergencyWithdrawEvent, EventMeta, RewardClaimEvent, StakeEvent, StakingEvent,
        WithdrawEvent,
    },
    Page, PageRequest, ProtocolStats, UserStats,
};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page size served over HTTP.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    /// Zero-based page index (default: 0)
    #[serde(default)]
    pub page: u32,

    /// Number of results per page (default: 10, max: 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 0, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl PaginationParams {
    /// Validate and normalize pagination parameters
    pub fn validate(self) -> PageRequest {
        PageRequest { page: self.page, page_size: self.page_size.clamp(1, MAX_PAGE_SIZE) }
    }
}

/// Paginated list of entries, newest first
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub entries: Vec<T>,
    pub pagination: PaginationMetadata,
}

/// Pagination metadata
#[derive(Debug, Serialize)]
pub struct PaginationMetadata {
    /// Number of results returned
    pub count: usize,

    pub page: u32,

    pub page_size: u32,

    /// True when the page was full, so a next page may exist
    pub has_next_page: bool,
}

impl<T> PageResponse<T> {
    pub fn from_page<S>(page: Page<S>) -> Self
    where
        T: for<'a> From<&'a S>,
    {
        let entries: Vec<T> = page.items.iter().map(T::from).collect();
        Self {
            pagination: PaginationMetadata {
                count: entries.len(),
                page: page.page,
                page_size: page.page_size,
                has_next_page: page.has_next_page,
            },
            entries,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProtocolStatsResponse {
    pub total_staked: String,
    pub current_reward_rate: String,
    pub total_burned: String,
    pub total_users: u64,
    pub total_stake_events: u64,
    pub total_withdraw_events: u64,
    pub total_emergency_withdraw_events: u64,
    pub total_rewards_claimed_events: u64,
    pub last_updated_block: u64,
    pub last_updated_timestamp: u64,
}

impl From<&ProtocolStats> for ProtocolStatsResponse {
    fn from(stats: &ProtocolStats) -> Self {
        Self {
            total_staked: stats.total_staked.to_string(),
            current_reward_rate: stats.current_reward_rate.to_string(),
            total_burned: stats.total_burned.to_string(),
            total_users: stats.total_users,
            total_stake_events: stats.total_stake_events,
            total_withdraw_events: stats.total_withdraw_events,
            total_emergency_withdraw_events: stats.total_emergency_withdraw_events,
            total_rewards_claimed_events: stats.total_rewards_claimed_events,
            last_updated_block: stats.last_updated_block,
            last_updated_timestamp: stats.last_updated_timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserStatsResponse {
    pub user: String,
    pub total_staked: String,
    pub total_withdrawn: String,
    pub total_rewards_claimed: String,
    pub total_emergency_withdrawn: String,
    pub total_penalties_paid: String,
    pub stake_count: u64,
    pub withdraw_count: u64,
    pub emergency_withdraw_count: u64,
    pub rewards_claimed_count: u64,
    /// Unset until the address stakes for the first time
    pub first_stake_timestamp: Option<u64>,
    pub last_activity_timestamp: u64,
}

impl From<&UserStats> for UserStatsResponse {
    fn from(stats: &UserStats) -> Self {
        Self {
            user: format!("{:#x}", stats.user),
            total_staked: stats.total_staked.to_string(),
            total_withdrawn: stats.total_withdrawn.to_string(),
            total_rewards_claimed: stats.total_rewards_claimed.to_string(),
            total_emergency_withdrawn: stats.total_emergency_withdrawn.to_string(),
            total_penalties_paid: stats.total_penalties_paid.to_string(),
            stake_count: stats.stake_count,
            withdraw_count: stats.withdraw_count,
            emergency_withdraw_count: stats.emergency_withdraw_count,
            rewards_claimed_count: stats.rewards_claimed_count,
            first_stake_timestamp: stats.first_stake_timestamp,
            last_activity_timestamp: stats.last_activity_timestamp,
        }
    }
}

/// Position of an event on chain
#[derive(Debug, Serialize)]
pub struct EventLocation {
    pub id: String,
    pub transaction_hash: String,
    pub log_index: i32,
    pub block_number: u64,
    pub block_timestamp: u64,
}

impl From<&EventMeta> for EventLocation {
    fn from(meta: &EventMeta) -> Self {
        Self {
            id: meta.id.to_string(),
            transaction_hash: format!("{:#x}", meta.tx_hash),
            log_index: meta.log_index,
            block_number: meta.block_number,
            block_timestamp: meta.block_timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StakeEntry {
    #[serde(flatten)]
    pub location: EventLocation,
    pub user: String,
    pub amount: String,
    pub timestamp: u64,
    pub new_total_staked: String,
    pub reward_rate: String,
}

impl From<&StakeEvent> for StakeEntry {
    fn from(event: &StakeEvent) -> Self {
        Self {
            location: (&event.meta).into(),
            user: format!("{:#x}", event.user),
            amount: event.amount.to_string(),
            timestamp: event.timestamp,
            new_total_staked: event.new_total_staked.to_string(),
            reward_rate: event.reward_rate.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WithdrawEntry {
    #[serde(flatten)]
    pub location: EventLocation,
    pub user: String,
    pub amount: String,
    pub timestamp: u64,
    pub new_total_staked: String,
    pub reward_rate: String,
    pub rewards_accrued: String,
}

impl From<&WithdrawEvent> for WithdrawEntry {
    fn from(event: &WithdrawEvent) -> Self {
        Self {
            location: (&event.meta).into(),
            user: format!("{:#x}", event.user),
            amount: event.amount.to_string(),
            timestamp: event.timestamp,
            new_total_staked: event.new_total_staked.to_string(),
            reward_rate: event.reward_rate.to_string(),
            rewards_accrued: event.rewards_accrued.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmergencyWithdrawEntry {
    #[serde(flatten)]
    pub location: EventLocation,
    pub user: String,
    pub amount: String,
    pub penalty: String,
    pub timestamp: u64,
    pub new_total_staked: String,
}

impl From<&EmergencyWithdrawEvent> for EmergencyWithdrawEntry {
    fn from(event: &EmergencyWithdrawEvent) -> Self {
        Self {
            location: (&event.meta).into(),
            user: format!("{:#x}", event.user),
            amount: event.amount.to_string(),
            penalty: event.penalty.to_string(),
            timestamp: event.timestamp,
            new_total_staked: event.new_total_staked.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RewardClaimEntry {
    #[serde(flatten)]
    pub location: EventLocation,
    pub user: String,
    pub amount: String,
    pub timestamp: u64,
    pub new_pending_rewards: String,
    pub total_staked: String,
}

impl From<&RewardClaimEvent> for RewardClaimEntry {
    fn from(event: &RewardClaimEvent) -> Self {
        Self {
            location: (&event.meta).into(),
            user: format!("{:#x}", event.user),
            amount: event.amount.to_string(),
            timestamp: event.timestamp,
            new_pending_rewards: event.new_pending_rewards.to_string(),
            total_staked: event.total_staked.to_string(),
        }
    }
}

/// One entry of a user's combined history, tagged by event kind
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityEntry {
    Stake(StakeEntry),
    Withdraw(WithdrawEntry),
    EmergencyWithdraw(EmergencyWithdrawEntry),
    RewardClaim(RewardClaimEntry),
}

impl From<&StakingEvent> for ActivityEntry {
    fn from(event: &StakingEvent) -> Self {
        match event {
            StakingEvent::Stake(e) => ActivityEntry::Stake(e.into()),
            StakingEvent::Withdraw(e) => ActivityEntry::Withdraw(e.into()),
            StakingEvent::EmergencyWithdraw(e) => ActivityEntry::EmergencyWithdraw(e.into()),
            StakingEvent::RewardClaim(e) => ActivityEntry::RewardClaim(e.into()),
        }
    }
}
