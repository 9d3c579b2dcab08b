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

//! Solidity bindings for the staking contract events consumed by the indexer.

use alloy::{primitives::B256, sol, sol_types::SolEvent};

sol! {
    #[sol(all_derives)]
    interface IStakingContract {
        event Staked(
            address indexed user,
            uint256 amount,
            uint256 timestamp,
            uint256 newTotalStaked,
            uint256 currentRewardRate
        );

        event Withdrawn(
            address indexed user,
            uint256 amount,
            uint256 timestamp,
            uint256 newTotalStaked,
            uint256 currentRewardRate,
            uint256 rewardsAccrued
        );

        event EmergencyWithdrawn(
            address indexed user,
            uint256 amount,
            uint256 penalty,
            uint256 timestamp,
            uint256 newTotalStaked
        );

        event RewardsClaimed(
            address indexed user,
            uint256 amount,
            uint256 timestamp,
            uint256 newPendingRewards,
            uint256 totalStaked
        );
    }
}

/// Event signatures for staking contract events that are indexed.
pub const STAKING_EVENT_SIGNATURES: &[B256] = &[
    IStakingContract::Staked::SIGNATURE_HASH,
    IStakingContract::Withdrawn::SIGNATURE_HASH,
    IStakingContract::EmergencyWithdrawn::SIGNATURE_HASH,
    IStakingContract::RewardsClaimed::SIGNATURE_HASH,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn signatures_are_distinct() {
        let unique: HashSet<_> = STAKING_EVENT_SIGNATURES.iter().collect();
        assert_eq!(unique.len(), STAKING_EVENT_SIGNATURES.len());
    }

    #[test]
    fn signature_strings() {
        assert_eq!(
            IStakingContract::Staked::SIGNATURE,
            "Staked(address,uint256,uint256,uint256,uint256)"
        );
        assert_eq!(
            IStakingContract::EmergencyWithdrawn::SIGNATURE,
            "EmergencyWithdrawn(address,uint256,uint256,uint256,uint256)"
        );
    }
}
