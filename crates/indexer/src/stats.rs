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

//! Running aggregates derived from the event stream.
//!
//! Counters and cumulative amounts only ever grow and use checked arithmetic:
//! an overflow is reported, never clamped. `total_staked` and
//! `current_reward_rate` instead mirror the latest value reported on-chain.

use alloy::primitives::{Address, U256};
use thiserror::Error;

use crate::events::StakingEvent;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StatsError {
    #[error("arithmetic overflow updating {0}")]
    Overflow(&'static str),
}

fn add_amount(field: &'static str, current: U256, delta: U256) -> Result<U256, StatsError> {
    current.checked_add(delta).ok_or(StatsError::Overflow(field))
}

fn increment(field: &'static str, current: u64) -> Result<u64, StatsError> {
    current.checked_add(1).ok_or(StatsError::Overflow(field))
}

/// Protocol-wide statistics singleton.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolStats {
    pub total_staked: U256,
    pub current_reward_rate: U256,
    pub total_burned: U256,
    pub total_users: u64,
    pub total_stake_events: u64,
    pub total_withdraw_events: u64,
    pub total_emergency_withdraw_events: u64,
    pub total_rewards_claimed_events: u64,
    pub last_updated_block: u64,
    pub last_updated_timestamp: u64,
}

impl ProtocolStats {
    /// Applies the protocol-level effect of one event. Does not touch
    /// `total_users`; see [ProtocolStats::register_user].
    pub fn apply(&mut self, event: &StakingEvent) -> Result<(), StatsError> {
        self.total_staked = event.total_staked_after();
        if let Some(rate) = event.reward_rate() {
            self.current_reward_rate = rate;
        }

        match event {
            StakingEvent::Stake(_) => {
                self.total_stake_events = increment("total_stake_events", self.total_stake_events)?;
            }
            StakingEvent::Withdraw(_) => {
                self.total_withdraw_events =
                    increment("total_withdraw_events", self.total_withdraw_events)?;
            }
            StakingEvent::EmergencyWithdraw(e) => {
                self.total_burned = add_amount("total_burned", self.total_burned, e.penalty)?;
                self.total_emergency_withdraw_events = increment(
                    "total_emergency_withdraw_events",
                    self.total_emergency_withdraw_events,
                )?;
            }
            StakingEvent::RewardClaim(_) => {
                self.total_rewards_claimed_events =
                    increment("total_rewards_claimed_events", self.total_rewards_claimed_events)?;
            }
        }

        let meta = event.meta();
        self.last_updated_block = meta.block_number;
        self.last_updated_timestamp = meta.block_timestamp;
        Ok(())
    }

    /// Counts a user seen for the first time.
    pub fn register_user(&mut self) -> Result<(), StatsError> {
        self.total_users = increment("total_users", self.total_users)?;
        Ok(())
    }
}

/// Per-address statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStats {
    pub user: Address,
    pub total_staked: U256,
    pub total_withdrawn: U256,
    pub total_rewards_claimed: U256,
    pub total_emergency_withdrawn: U256,
    pub total_penalties_paid: U256,
    pub stake_count: u64,
    pub withdraw_count: u64,
    pub emergency_withdraw_count: u64,
    pub rewards_claimed_count: u64,
    pub first_stake_timestamp: Option<u64>,
    pub last_activity_timestamp: u64,
}

impl UserStats {
    pub fn new(user: Address) -> Self {
        Self {
            user,
            total_staked: U256::ZERO,
            total_withdrawn: U256::ZERO,
            total_rewards_claimed: U256::ZERO,
            total_emergency_withdrawn: U256::ZERO,
            total_penalties_paid: U256::ZERO,
            stake_count: 0,
            withdraw_count: 0,
            emergency_withdraw_count: 0,
            rewards_claimed_count: 0,
            first_stake_timestamp: None,
            last_activity_timestamp: 0,
        }
    }

    pub fn apply(&mut self, event: &StakingEvent) -> Result<(), StatsError> {
        debug_assert_eq!(event.user(), self.user);
        let block_timestamp = event.meta().block_timestamp;

        match event {
            StakingEvent::Stake(e) => {
                self.total_staked = add_amount("total_staked", self.total_staked, e.amount)?;
                self.stake_count = increment("stake_count", self.stake_count)?;
                // Keep the earliest stake even if delivery is out of order.
                self.first_stake_timestamp = Some(match self.first_stake_timestamp {
                    Some(first) => first.min(block_timestamp),
                    None => block_timestamp,
                });
            }
            StakingEvent::Withdraw(e) => {
                self.total_withdrawn = add_amount("total_withdrawn", self.total_withdrawn, e.amount)?;
                self.withdraw_count = increment("withdraw_count", self.withdraw_count)?;
            }
            StakingEvent::EmergencyWithdraw(e) => {
                self.total_emergency_withdrawn =
                    add_amount("total_emergency_withdrawn", self.total_emergency_withdrawn, e.amount)?;
                self.total_penalties_paid =
                    add_amount("total_penalties_paid", self.total_penalties_paid, e.penalty)?;
                self.emergency_withdraw_count =
                    increment("emergency_withdraw_count", self.emergency_withdraw_count)?;
            }
            StakingEvent::RewardClaim(e) => {
                self.total_rewards_claimed =
                    add_amount("total_rewards_claimed", self.total_rewards_claimed, e.amount)?;
                self.rewards_claimed_count =
                    increment("rewards_claimed_count", self.rewards_claimed_count)?;
            }
        }

        self.last_activity_timestamp = block_timestamp;
        Ok(())
    }
}
