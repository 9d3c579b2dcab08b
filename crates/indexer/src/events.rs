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

//! Typed staking events and their decoding from RPC logs.
//!
//! Each variant of [StakingEvent] is the immutable record persisted for one
//! on-chain occurrence. Decoding is strict: a log with a missing or
//! out-of-domain field is rejected rather than defaulted.

use std::{fmt, str::FromStr};

use alloy::{
    primitives::{Address, B256, U256},
    rpc::types::Log,
    sol_types::SolEvent,
};
use thiserror::Error;

use crate::{
    contracts::IStakingContract,
    ids::{EventId, EventIdError},
};

#[derive(Error, Debug)]
pub enum EventError {
    #[error("log is missing {0}")]
    MissingField(&'static str),

    #[error("unknown event signature: {0:?}")]
    UnknownSignature(Option<B256>),

    #[error("failed to decode {kind} log: {source}")]
    Decode {
        kind: EventKind,
        #[source]
        source: alloy::sol_types::Error,
    },

    #[error("{field} value {value} is out of range")]
    OutOfRange { field: &'static str, value: U256 },

    #[error("invalid event identity: {0}")]
    Identity(#[from] EventIdError),

    #[error("log {0} was removed by a chain reorganization")]
    Removed(EventId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Stake,
    Withdraw,
    EmergencyWithdraw,
    RewardClaim,
}

impl EventKind {
    pub const ALL: [EventKind; 4] =
        [EventKind::Stake, EventKind::Withdraw, EventKind::EmergencyWithdraw, EventKind::RewardClaim];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Stake => "stake",
            EventKind::Withdraw => "withdraw",
            EventKind::EmergencyWithdraw => "emergency_withdraw",
            EventKind::RewardClaim => "reward_claim",
        }
    }

    pub fn signature_hash(&self) -> B256 {
        match self {
            EventKind::Stake => IStakingContract::Staked::SIGNATURE_HASH,
            EventKind::Withdraw => IStakingContract::Withdrawn::SIGNATURE_HASH,
            EventKind::EmergencyWithdraw => IStakingContract::EmergencyWithdrawn::SIGNATURE_HASH,
            EventKind::RewardClaim => IStakingContract::RewardsClaimed::SIGNATURE_HASH,
        }
    }

    pub fn from_signature_hash(topic0: &B256) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| &kind.signature_hash() == topic0)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stake" => Ok(EventKind::Stake),
            "withdraw" => Ok(EventKind::Withdraw),
            "emergency_withdraw" => Ok(EventKind::EmergencyWithdraw),
            "reward_claim" => Ok(EventKind::RewardClaim),
            _ => Err(format!("Invalid event kind: {}", s)),
        }
    }
}

/// Position and block context shared by every event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMeta {
    pub id: EventId,
    pub tx_hash: B256,
    pub log_index: i32,
    pub block_number: u64,
    pub block_timestamp: u64,
}

impl EventMeta {
    pub fn new(tx_hash: B256, log_index: i32, block_number: u64, block_timestamp: u64) -> Self {
        Self {
            id: EventId::new(tx_hash, log_index),
            tx_hash,
            log_index,
            block_number,
            block_timestamp,
        }
    }

    /// Extracts the metadata from a log. `fallback_timestamp` is used when the
    /// node did not include the block timestamp in the log.
    pub fn from_log(log: &Log, fallback_timestamp: Option<u64>) -> Result<Self, EventError> {
        let tx_hash = log.transaction_hash.ok_or(EventError::MissingField("transaction hash"))?;
        let raw_index = log.log_index.ok_or(EventError::MissingField("log index"))?;
        let id = EventId::from_log_position(tx_hash, raw_index)?;
        let block_number = log.block_number.ok_or(EventError::MissingField("block number"))?;
        let block_timestamp = log
            .block_timestamp
            .or(fallback_timestamp)
            .ok_or(EventError::MissingField("block timestamp"))?;

        if log.removed {
            return Err(EventError::Removed(id));
        }

        Ok(Self { id, tx_hash, log_index: id.log_index(), block_number, block_timestamp })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeEvent {
    pub meta: EventMeta,
    pub user: Address,
    pub amount: U256,
    pub timestamp: u64,
    pub new_total_staked: U256,
    pub reward_rate: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawEvent {
    pub meta: EventMeta,
    pub user: Address,
    pub amount: U256,
    pub timestamp: u64,
    pub new_total_staked: U256,
    pub reward_rate: U256,
    pub rewards_accrued: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyWithdrawEvent {
    pub meta: EventMeta,
    pub user: Address,
    pub amount: U256,
    pub penalty: U256,
    pub timestamp: u64,
    pub new_total_staked: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardClaimEvent {
    pub meta: EventMeta,
    pub user: Address,
    pub amount: U256,
    pub timestamp: u64,
    pub new_pending_rewards: U256,
    pub total_staked: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingEvent {
    Stake(StakeEvent),
    Withdraw(WithdrawEvent),
    EmergencyWithdraw(EmergencyWithdrawEvent),
    RewardClaim(RewardClaimEvent),
}

impl StakingEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StakingEvent::Stake(_) => EventKind::Stake,
            StakingEvent::Withdraw(_) => EventKind::Withdraw,
            StakingEvent::EmergencyWithdraw(_) => EventKind::EmergencyWithdraw,
            StakingEvent::RewardClaim(_) => EventKind::RewardClaim,
        }
    }

    pub fn meta(&self) -> &EventMeta {
        match self {
            StakingEvent::Stake(e) => &e.meta,
            StakingEvent::Withdraw(e) => &e.meta,
            StakingEvent::EmergencyWithdraw(e) => &e.meta,
            StakingEvent::RewardClaim(e) => &e.meta,
        }
    }

    pub fn id(&self) -> EventId {
        self.meta().id
    }

    pub fn user(&self) -> Address {
        match self {
            StakingEvent::Stake(e) => e.user,
            StakingEvent::Withdraw(e) => e.user,
            StakingEvent::EmergencyWithdraw(e) => e.user,
            StakingEvent::RewardClaim(e) => e.user,
        }
    }

    /// Primary amount moved by the event.
    pub fn amount(&self) -> U256 {
        match self {
            StakingEvent::Stake(e) => e.amount,
            StakingEvent::Withdraw(e) => e.amount,
            StakingEvent::EmergencyWithdraw(e) => e.amount,
            StakingEvent::RewardClaim(e) => e.amount,
        }
    }

    /// Protocol-wide stake reported by the contract after the event.
    pub fn total_staked_after(&self) -> U256 {
        match self {
            StakingEvent::Stake(e) => e.new_total_staked,
            StakingEvent::Withdraw(e) => e.new_total_staked,
            StakingEvent::EmergencyWithdraw(e) => e.new_total_staked,
            StakingEvent::RewardClaim(e) => e.total_staked,
        }
    }

    /// Reward rate in effect, for the events that report it.
    pub fn reward_rate(&self) -> Option<U256> {
        match self {
            StakingEvent::Stake(e) => Some(e.reward_rate),
            StakingEvent::Withdraw(e) => Some(e.reward_rate),
            StakingEvent::EmergencyWithdraw(_) | StakingEvent::RewardClaim(_) => None,
        }
    }

    /// Decodes a staking contract log into a typed event.
    pub fn decode_log(log: &Log, fallback_timestamp: Option<u64>) -> Result<Self, EventError> {
        let topic0 = log.topic0().copied();
        let kind = topic0
            .as_ref()
            .and_then(EventKind::from_signature_hash)
            .ok_or(EventError::UnknownSignature(topic0))?;
        let meta = EventMeta::from_log(log, fallback_timestamp)?;

        let event = match kind {
            EventKind::Stake => {
                let data = log
                    .log_decode::<IStakingContract::Staked>()
                    .map_err(|source| EventError::Decode { kind, source })?
                    .inner
                    .data;
                StakingEvent::Stake(StakeEvent {
                    meta,
                    user: data.user,
                    amount: data.amount,
                    timestamp: to_u64("timestamp", data.timestamp)?,
                    new_total_staked: data.newTotalStaked,
                    reward_rate: data.currentRewardRate,
                })
            }
            EventKind::Withdraw => {
                let data = log
                    .log_decode::<IStakingContract::Withdrawn>()
                    .map_err(|source| EventError::Decode { kind, source })?
                    .inner
                    .data;
                StakingEvent::Withdraw(WithdrawEvent {
                    meta,
                    user: data.user,
                    amount: data.amount,
                    timestamp: to_u64("timestamp", data.timestamp)?,
                    new_total_staked: data.newTotalStaked,
                    reward_rate: data.currentRewardRate,
                    rewards_accrued: data.rewardsAccrued,
                })
            }
            EventKind::EmergencyWithdraw => {
                let data = log
                    .log_decode::<IStakingContract::EmergencyWithdrawn>()
                    .map_err(|source| EventError::Decode { kind, source })?
                    .inner
                    .data;
                StakingEvent::EmergencyWithdraw(EmergencyWithdrawEvent {
                    meta,
                    user: data.user,
                    amount: data.amount,
                    penalty: data.penalty,
                    timestamp: to_u64("timestamp", data.timestamp)?,
                    new_total_staked: data.newTotalStaked,
                })
            }
            EventKind::RewardClaim => {
                let data = log
                    .log_decode::<IStakingContract::RewardsClaimed>()
                    .map_err(|source| EventError::Decode { kind, source })?
                    .inner
                    .data;
                StakingEvent::RewardClaim(RewardClaimEvent {
                    meta,
                    user: data.user,
                    amount: data.amount,
                    timestamp: to_u64("timestamp", data.timestamp)?,
                    new_pending_rewards: data.newPendingRewards,
                    total_staked: data.totalStaked,
                })
            }
        };

        Ok(event)
    }
}

fn to_u64(field: &'static str, value: U256) -> Result<u64, EventError> {
    u64::try_from(value).map_err(|_| EventError::OutOfRange { field, value })
}
