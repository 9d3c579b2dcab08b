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

//! Aggregate update applied once per indexed event.
//!
//! Storage loads the current aggregates, calls [apply_event], and persists the
//! result together with the event record in a single transaction.

use crate::{
    events::StakingEvent,
    stats::{ProtocolStats, StatsError, UserStats},
};

/// Aggregates after one event has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateUpdate {
    pub protocol: ProtocolStats,
    pub user: UserStats,
    /// True when the event's user had never been seen before.
    pub new_user: bool,
}

/// Applies `event` to the stored aggregates.
///
/// `protocol` is `None` before the first event ever indexed and `user` is
/// `None` the first time the event's address appears. A new address bumps
/// `ProtocolStats::total_users` exactly once, here, and nowhere else.
pub fn apply_event(
    protocol: Option<ProtocolStats>,
    user: Option<UserStats>,
    event: &StakingEvent,
) -> Result<AggregateUpdate, StatsError> {
    let mut protocol = protocol.unwrap_or_default();
    protocol.apply(event)?;

    let (mut user, new_user) = match user {
        Some(user) => (user, false),
        None => (UserStats::new(event.user()), true),
    };
    if new_user {
        protocol.register_user()?;
    }
    user.apply(event)?;

    Ok(AggregateUpdate { protocol, user, new_user })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use alloy::primitives::{Address, U256};
    use proptest::prelude::*;

    use super::*;
    use crate::test_utils::EventBuilder;

    /// Folds events through [apply_event] the way storage does.
    #[derive(Default)]
    struct Aggregates {
        protocol: Option<ProtocolStats>,
        users: HashMap<Address, UserStats>,
    }

    impl Aggregates {
        fn apply(&mut self, event: &StakingEvent) -> AggregateUpdate {
            let update = apply_event(
                self.protocol.clone(),
                self.users.get(&event.user()).cloned(),
                event,
            )
            .unwrap();
            self.protocol = Some(update.protocol.clone());
            self.users.insert(event.user(), update.user.clone());
            update
        }

        fn protocol(&self) -> &ProtocolStats {
            self.protocol.as_ref().unwrap()
        }
    }

    #[test]
    fn stake_stake_emergency_scenario() {
        let b = EventBuilder::new(Address::repeat_byte(0xaa));
        let mut aggregates = Aggregates::default();

        let first = aggregates.apply(&b.stake(1, 0, 100, 1_000, 100));
        assert!(first.new_user);
        let second = aggregates.apply(&b.stake(2, 0, 50, 2_000, 150));
        assert!(!second.new_user);
        aggregates.apply(&b.emergency_withdraw(3, 0, 150, 30, 3_000, 0));

        let user = &aggregates.users[&b.user()];
        assert_eq!(user.total_staked, U256::from(150));
        assert_eq!(user.stake_count, 2);
        assert_eq!(user.emergency_withdraw_count, 1);
        assert_eq!(user.total_penalties_paid, U256::from(30));
        assert_eq!(user.first_stake_timestamp, Some(1_000));

        let protocol = aggregates.protocol();
        assert_eq!(protocol.total_users, 1);
        assert_eq!(protocol.total_burned, U256::from(30));
        assert_eq!(protocol.total_stake_events, 2);
        assert_eq!(protocol.total_emergency_withdraw_events, 1);
        assert_eq!(protocol.total_staked, U256::ZERO);
    }

    #[test]
    fn two_users_each_stake_once() {
        let mut aggregates = Aggregates::default();
        aggregates.apply(&EventBuilder::new(Address::repeat_byte(1)).stake(1, 0, 10, 100, 10));
        aggregates.apply(&EventBuilder::new(Address::repeat_byte(2)).stake(2, 0, 10, 200, 20));

        assert_eq!(aggregates.protocol().total_users, 2);
        assert_eq!(aggregates.protocol().total_stake_events, 2);
    }

    #[test]
    fn lazy_singleton_starts_from_zero() {
        let event = EventBuilder::new(Address::repeat_byte(7)).reward_claim(9, 2, 5, 900, 77);
        let update = apply_event(None, None, &event).unwrap();
        assert_eq!(update.protocol.total_users, 1);
        assert_eq!(update.protocol.total_rewards_claimed_events, 1);
        assert_eq!(update.protocol.total_stake_events, 0);
        assert_eq!(update.protocol.total_burned, U256::ZERO);
        assert_eq!(update.protocol.total_staked, U256::from(77));
        assert_eq!(update.protocol.last_updated_block, 9);
    }

    fn arb_event() -> impl Strategy<Value = StakingEvent> {
        (0u8..4, 0u8..5, 1u64..1_000_000, 0u64..1_000, 0u64..1_000, 0u64..10_000).prop_map(
            |(kind, user, block, amount, penalty, total)| {
                let b = EventBuilder::new(Address::repeat_byte(user + 1));
                let ts = block * 12;
                match kind {
                    0 => b.stake(block, 0, amount, ts, total),
                    1 => b.withdraw(block, 0, amount, ts, total),
                    2 => b.emergency_withdraw(block, 0, amount, penalty, ts, total),
                    _ => b.reward_claim(block, 0, amount, ts, total),
                }
            },
        )
    }

    fn monotonic_fields(p: &ProtocolStats) -> [U256; 6] {
        [
            p.total_burned,
            U256::from(p.total_users),
            U256::from(p.total_stake_events),
            U256::from(p.total_withdraw_events),
            U256::from(p.total_emergency_withdraw_events),
            U256::from(p.total_rewards_claimed_events),
        ]
    }

    fn user_monotonic_fields(u: &UserStats) -> [U256; 9] {
        [
            u.total_staked,
            u.total_withdrawn,
            u.total_rewards_claimed,
            u.total_emergency_withdrawn,
            u.total_penalties_paid,
            U256::from(u.stake_count),
            U256::from(u.withdraw_count),
            U256::from(u.emergency_withdraw_count),
            U256::from(u.rewards_claimed_count),
        ]
    }

    proptest! {
        #[test]
        fn cumulative_fields_never_decrease(events in prop::collection::vec(arb_event(), 1..60)) {
            let mut aggregates = Aggregates::default();
            for event in &events {
                let before_protocol = aggregates.protocol.clone().unwrap_or_default();
                let before_user = aggregates
                    .users
                    .get(&event.user())
                    .cloned()
                    .unwrap_or_else(|| UserStats::new(event.user()));

                let update = aggregates.apply(event);

                for (before, after) in monotonic_fields(&before_protocol)
                    .iter()
                    .zip(monotonic_fields(&update.protocol).iter())
                {
                    prop_assert!(after >= before);
                }
                for (before, after) in user_monotonic_fields(&before_user)
                    .iter()
                    .zip(user_monotonic_fields(&update.user).iter())
                {
                    prop_assert!(after >= before);
                }
            }
        }

        #[test]
        fn user_count_equals_distinct_addresses(events in prop::collection::vec(arb_event(), 1..60)) {
            let mut aggregates = Aggregates::default();
            for event in &events {
                aggregates.apply(event);
            }
            let distinct: std::collections::HashSet<_> = events.iter().map(|e| e.user()).collect();
            prop_assert_eq!(aggregates.protocol().total_users, distinct.len() as u64);
            let counted: u64 = [
                aggregates.protocol().total_stake_events,
                aggregates.protocol().total_withdraw_events,
                aggregates.protocol().total_emergency_withdraw_events,
                aggregates.protocol().total_rewards_claimed_events,
            ]
            .iter()
            .sum();
            prop_assert_eq!(counted, events.len() as u64);
        }

        #[test]
        fn burned_equals_sum_of_penalties(events in prop::collection::vec(arb_event(), 1..60)) {
            let mut aggregates = Aggregates::default();
            let mut expected = U256::ZERO;
            for event in &events {
                if let StakingEvent::EmergencyWithdraw(e) = event {
                    expected += e.penalty;
                }
                aggregates.apply(event);
            }
            prop_assert_eq!(aggregates.protocol().total_burned, expected);
            let paid = aggregates.users.values().fold(U256::ZERO, |acc, u| acc + u.total_penalties_paid);
            prop_assert_eq!(paid, expected);
        }
    }
}
