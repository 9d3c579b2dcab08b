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

use alloy::primitives::Address;
use sqlx::{any::AnyRow, AnyConnection, Executor, Row};

use super::{parse_address, parse_u256, DbError};
use crate::{
    ids::{user_key, PROTOCOL_STATS_KEY},
    stats::{ProtocolStats, StatsError, UserStats},
};

// Counters are u64 in memory but BIGINT in storage; exceeding the column is an overflow.
fn stored_u64(field: &'static str, value: u64) -> Result<i64, DbError> {
    i64::try_from(value).map_err(|_| DbError::Stats(StatsError::Overflow(field)))
}

fn get_u64(row: &AnyRow, column: &'static str) -> Result<u64, DbError> {
    let value: i64 = row.try_get(column)?;
    u64::try_from(value).map_err(|_| DbError::BadColumn { column, value: value.to_string() })
}

fn row_to_protocol_stats(row: &AnyRow) -> Result<ProtocolStats, DbError> {
    Ok(ProtocolStats {
        total_staked: parse_u256("total_staked", row.try_get("total_staked")?)?,
        current_reward_rate: parse_u256("current_reward_rate", row.try_get("current_reward_rate")?)?,
        total_burned: parse_u256("total_burned", row.try_get("total_burned")?)?,
        total_users: get_u64(row, "total_users")?,
        total_stake_events: get_u64(row, "total_stake_events")?,
        total_withdraw_events: get_u64(row, "total_withdraw_events")?,
        total_emergency_withdraw_events: get_u64(row, "total_emergency_withdraw_events")?,
        total_rewards_claimed_events: get_u64(row, "total_rewards_claimed_events")?,
        last_updated_block: get_u64(row, "last_updated_block")?,
        last_updated_timestamp: get_u64(row, "last_updated_timestamp")?,
    })
}

fn row_to_user_stats(row: &AnyRow) -> Result<UserStats, DbError> {
    let first_stake: Option<i64> = row.try_get("first_stake_timestamp")?;
    Ok(UserStats {
        user: parse_address("user_address", row.try_get("user_address")?)?,
        total_staked: parse_u256("total_staked", row.try_get("total_staked")?)?,
        total_withdrawn: parse_u256("total_withdrawn", row.try_get("total_withdrawn")?)?,
        total_rewards_claimed: parse_u256(
            "total_rewards_claimed",
            row.try_get("total_rewards_claimed")?,
        )?,
        total_emergency_withdrawn: parse_u256(
            "total_emergency_withdrawn",
            row.try_get("total_emergency_withdrawn")?,
        )?,
        total_penalties_paid: parse_u256(
            "total_penalties_paid",
            row.try_get("total_penalties_paid")?,
        )?,
        stake_count: get_u64(row, "stake_count")?,
        withdraw_count: get_u64(row, "withdraw_count")?,
        emergency_withdraw_count: get_u64(row, "emergency_withdraw_count")?,
        rewards_claimed_count: get_u64(row, "rewards_claimed_count")?,
        first_stake_timestamp: first_stake.map(|ts| ts as u64),
        last_activity_timestamp: get_u64(row, "last_activity_timestamp")?,
    })
}

pub(super) async fn load_protocol_stats<'c, E>(executor: E) -> Result<Option<ProtocolStats>, DbError>
where
    E: Executor<'c, Database = sqlx::Any>,
{
    let row = sqlx::query("SELECT * FROM protocol_stats WHERE id = $1")
        .bind(PROTOCOL_STATS_KEY)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(row_to_protocol_stats).transpose()
}

pub(super) async fn load_user_stats<'c, E>(
    executor: E,
    user: Address,
) -> Result<Option<UserStats>, DbError>
where
    E: Executor<'c, Database = sqlx::Any>,
{
    let row = sqlx::query("SELECT * FROM user_stats WHERE user_address = $1")
        .bind(user_key(user))
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(row_to_user_stats).transpose()
}

pub(super) async fn upsert_protocol_stats(
    conn: &mut AnyConnection,
    stats: &ProtocolStats,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO protocol_stats (
            id,
            total_staked,
            current_reward_rate,
            total_burned,
            total_users,
            total_stake_events,
            total_withdraw_events,
            total_emergency_withdraw_events,
            total_rewards_claimed_events,
            last_updated_block,
            last_updated_timestamp
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO UPDATE SET
            total_staked = EXCLUDED.total_staked,
            current_reward_rate = EXCLUDED.current_reward_rate,
            total_burned = EXCLUDED.total_burned,
            total_users = EXCLUDED.total_users,
            total_stake_events = EXCLUDED.total_stake_events,
            total_withdraw_events = EXCLUDED.total_withdraw_events,
            total_emergency_withdraw_events = EXCLUDED.total_emergency_withdraw_events,
            total_rewards_claimed_events = EXCLUDED.total_rewards_claimed_events,
            last_updated_block = EXCLUDED.last_updated_block,
            last_updated_timestamp = EXCLUDED.last_updated_timestamp",
    )
    .bind(PROTOCOL_STATS_KEY)
    .bind(stats.total_staked.to_string())
    .bind(stats.current_reward_rate.to_string())
    .bind(stats.total_burned.to_string())
    .bind(stored_u64("total_users", stats.total_users)?)
    .bind(stored_u64("total_stake_events", stats.total_stake_events)?)
    .bind(stored_u64("total_withdraw_events", stats.total_withdraw_events)?)
    .bind(stored_u64("total_emergency_withdraw_events", stats.total_emergency_withdraw_events)?)
    .bind(stored_u64("total_rewards_claimed_events", stats.total_rewards_claimed_events)?)
    .bind(stored_u64("last_updated_block", stats.last_updated_block)?)
    .bind(stored_u64("last_updated_timestamp", stats.last_updated_timestamp)?)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(super) async fn upsert_user_stats(
    conn: &mut AnyConnection,
    stats: &UserStats,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO user_stats (
            user_address,
            total_staked,
            total_withdrawn,
            total_rewards_claimed,
            total_emergency_withdrawn,
            total_penalties_paid,
            stake_count,
            withdraw_count,
            emergency_withdraw_count,
            rewards_claimed_count,
            first_stake_timestamp,
            last_activity_timestamp
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (user_address) DO UPDATE SET
            total_staked = EXCLUDED.total_staked,
            total_withdrawn = EXCLUDED.total_withdrawn,
            total_rewards_claimed = EXCLUDED.total_rewards_claimed,
            total_emergency_withdrawn = EXCLUDED.total_emergency_withdrawn,
            total_penalties_paid = EXCLUDED.total_penalties_paid,
            stake_count = EXCLUDED.stake_count,
            withdraw_count = EXCLUDED.withdraw_count,
            emergency_withdraw_count = EXCLUDED.emergency_withdraw_count,
            rewards_claimed_count = EXCLUDED.rewards_claimed_count,
            first_stake_timestamp = EXCLUDED.first_stake_timestamp,
            last_activity_timestamp = EXCLUDED.last_activity_timestamp",
    )
    .bind(user_key(stats.user))
    .bind(stats.total_staked.to_string())
    .bind(stats.total_withdrawn.to_string())
    .bind(stats.total_rewards_claimed.to_string())
    .bind(stats.total_emergency_withdrawn.to_string())
    .bind(stats.total_penalties_paid.to_string())
    .bind(stored_u64("stake_count", stats.stake_count)?)
    .bind(stored_u64("withdraw_count", stats.withdraw_count)?)
    .bind(stored_u64("emergency_withdraw_count", stats.emergency_withdraw_count)?)
    .bind(stored_u64("rewards_claimed_count", stats.rewards_claimed_count)?)
    .bind(
        stats
            .first_stake_timestamp
            .map(|ts| stored_u64("first_stake_timestamp", ts))
            .transpose()?,
    )
    .bind(stored_u64("last_activity_timestamp", stats.last_activity_timestamp)?)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
