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

//! SQL for the immutable event record tables.

use alloy::primitives::Address;
use sqlx::{any::AnyRow, AnyConnection, AnyPool, Row};

use super::{parse_address, parse_b256, parse_u256, to_i64, DbError, Page, PageRequest};
use crate::{
    events::{
        EmergencyWithdrawEvent, EventKind, EventMeta, RewardClaimEvent, StakeEvent, StakingEvent,
        WithdrawEvent,
    },
    ids::user_key,
};

const ORDER_NEWEST_FIRST: &str = "ORDER BY block_timestamp DESC, block_number DESC, log_index DESC";

pub(super) fn table_for(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Stake => "stake_events",
        EventKind::Withdraw => "withdraw_events",
        EventKind::EmergencyWithdraw => "emergency_withdraw_events",
        EventKind::RewardClaim => "reward_claim_events",
    }
}

pub(super) async fn insert_event(
    conn: &mut AnyConnection,
    event: &StakingEvent,
) -> Result<(), DbError> {
    let meta = *event.meta();
    let query = match event {
        StakingEvent::Stake(e) => sqlx::query(
            "INSERT INTO stake_events (
                event_id,
                user_address,
                amount,
                event_timestamp,
                new_total_staked,
                reward_rate,
                tx_hash,
                log_index,
                block_number,
                block_timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(meta.id.to_string())
        .bind(user_key(e.user))
        .bind(e.amount.to_string())
        .bind(to_i64("event_timestamp", e.timestamp)?)
        .bind(e.new_total_staked.to_string())
        .bind(e.reward_rate.to_string()),
        StakingEvent::Withdraw(e) => sqlx::query(
            "INSERT INTO withdraw_events (
                event_id,
                user_address,
                amount,
                event_timestamp,
                new_total_staked,
                reward_rate,
                rewards_accrued,
                tx_hash,
                log_index,
                block_number,
                block_timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(meta.id.to_string())
        .bind(user_key(e.user))
        .bind(e.amount.to_string())
        .bind(to_i64("event_timestamp", e.timestamp)?)
        .bind(e.new_total_staked.to_string())
        .bind(e.reward_rate.to_string())
        .bind(e.rewards_accrued.to_string()),
        StakingEvent::EmergencyWithdraw(e) => sqlx::query(
            "INSERT INTO emergency_withdraw_events (
                event_id,
                user_address,
                amount,
                penalty,
                event_timestamp,
                new_total_staked,
                tx_hash,
                log_index,
                block_number,
                block_timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(meta.id.to_string())
        .bind(user_key(e.user))
        .bind(e.amount.to_string())
        .bind(e.penalty.to_string())
        .bind(to_i64("event_timestamp", e.timestamp)?)
        .bind(e.new_total_staked.to_string()),
        StakingEvent::RewardClaim(e) => sqlx::query(
            "INSERT INTO reward_claim_events (
                event_id,
                user_address,
                amount,
                event_timestamp,
                new_pending_rewards,
                total_staked,
                tx_hash,
                log_index,
                block_number,
                block_timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(meta.id.to_string())
        .bind(user_key(e.user))
        .bind(e.amount.to_string())
        .bind(to_i64("event_timestamp", e.timestamp)?)
        .bind(e.new_pending_rewards.to_string())
        .bind(e.total_staked.to_string()),
    };

    query
        .bind(format!("{:x}", meta.tx_hash))
        .bind(i64::from(meta.log_index))
        .bind(to_i64("block_number", meta.block_number)?)
        .bind(to_i64("block_timestamp", meta.block_timestamp)?)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

fn row_meta(row: &AnyRow) -> Result<EventMeta, DbError> {
    let tx_hash = parse_b256("tx_hash", row.try_get("tx_hash")?)?;
    let log_index: i64 = row.try_get("log_index")?;
    let log_index = i32::try_from(log_index)
        .map_err(|_| DbError::BadColumn { column: "log_index", value: log_index.to_string() })?;
    let block_number: i64 = row.try_get("block_number")?;
    let block_timestamp: i64 = row.try_get("block_timestamp")?;
    Ok(EventMeta::new(tx_hash, log_index, block_number as u64, block_timestamp as u64))
}

fn row_user(row: &AnyRow) -> Result<Address, DbError> {
    parse_address("user_address", row.try_get("user_address")?)
}

fn row_timestamp(row: &AnyRow) -> Result<u64, DbError> {
    let ts: i64 = row.try_get("event_timestamp")?;
    Ok(ts as u64)
}

pub(super) fn row_to_stake(row: &AnyRow) -> Result<StakeEvent, DbError> {
    Ok(StakeEvent {
        meta: row_meta(row)?,
        user: row_user(row)?,
        amount: parse_u256("amount", row.try_get("amount")?)?,
        timestamp: row_timestamp(row)?,
        new_total_staked: parse_u256("new_total_staked", row.try_get("new_total_staked")?)?,
        reward_rate: parse_u256("reward_rate", row.try_get("reward_rate")?)?,
    })
}

pub(super) fn row_to_withdraw(row: &AnyRow) -> Result<WithdrawEvent, DbError> {
    Ok(WithdrawEvent {
        meta: row_meta(row)?,
        user: row_user(row)?,
        amount: parse_u256("amount", row.try_get("amount")?)?,
        timestamp: row_timestamp(row)?,
        new_total_staked: parse_u256("new_total_staked", row.try_get("new_total_staked")?)?,
        reward_rate: parse_u256("reward_rate", row.try_get("reward_rate")?)?,
        rewards_accrued: parse_u256("rewards_accrued", row.try_get("rewards_accrued")?)?,
    })
}

pub(super) fn row_to_emergency_withdraw(row: &AnyRow) -> Result<EmergencyWithdrawEvent, DbError> {
    Ok(EmergencyWithdrawEvent {
        meta: row_meta(row)?,
        user: row_user(row)?,
        amount: parse_u256("amount", row.try_get("amount")?)?,
        penalty: parse_u256("penalty", row.try_get("penalty")?)?,
        timestamp: row_timestamp(row)?,
        new_total_staked: parse_u256("new_total_staked", row.try_get("new_total_staked")?)?,
    })
}

pub(super) fn row_to_reward_claim(row: &AnyRow) -> Result<RewardClaimEvent, DbError> {
    Ok(RewardClaimEvent {
        meta: row_meta(row)?,
        user: row_user(row)?,
        amount: parse_u256("amount", row.try_get("amount")?)?,
        timestamp: row_timestamp(row)?,
        new_pending_rewards: parse_u256(
            "new_pending_rewards",
            row.try_get("new_pending_rewards")?,
        )?,
        total_staked: parse_u256("total_staked", row.try_get("total_staked")?)?,
    })
}

/// Fetches one page of a single event table, optionally filtered by user.
pub(super) async fn list_page<T>(
    pool: &AnyPool,
    kind: EventKind,
    user: Option<Address>,
    request: PageRequest,
    map: fn(&AnyRow) -> Result<T, DbError>,
) -> Result<Page<T>, DbError> {
    let table = table_for(kind);
    let rows = match user {
        Some(user) => {
            let query_str = format!(
                "SELECT * FROM {table} WHERE user_address = $1 {ORDER_NEWEST_FIRST} LIMIT $2 OFFSET $3"
            );
            sqlx::query(&query_str)
                .bind(user_key(user))
                .bind(i64::from(request.page_size))
                .bind(to_i64("offset", request.offset())?)
                .fetch_all(pool)
                .await?
        }
        None => {
            let query_str =
                format!("SELECT * FROM {table} {ORDER_NEWEST_FIRST} LIMIT $1 OFFSET $2");
            sqlx::query(&query_str)
                .bind(i64::from(request.page_size))
                .bind(to_i64("offset", request.offset())?)
                .fetch_all(pool)
                .await?
        }
    };

    let items = rows.iter().map(map).collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, request))
}

// Every kind projected onto one column set so the tables can be merged.
const ACTIVITY_QUERY: &str = "
    SELECT 'stake' AS kind, event_id, user_address, amount,
           CAST(NULL AS TEXT) AS penalty, event_timestamp, new_total_staked,
           reward_rate, CAST(NULL AS TEXT) AS rewards_accrued,
           CAST(NULL AS TEXT) AS new_pending_rewards, CAST(NULL AS TEXT) AS total_staked,
           tx_hash, log_index, block_number, block_timestamp
    FROM stake_events WHERE user_address = $1
    UNION ALL
    SELECT 'withdraw' AS kind, event_id, user_address, amount,
           CAST(NULL AS TEXT) AS penalty, event_timestamp, new_total_staked,
           reward_rate, rewards_accrued,
           CAST(NULL AS TEXT) AS new_pending_rewards, CAST(NULL AS TEXT) AS total_staked,
           tx_hash, log_index, block_number, block_timestamp
    FROM withdraw_events WHERE user_address = $1
    UNION ALL
    SELECT 'emergency_withdraw' AS kind, event_id, user_address, amount,
           penalty, event_timestamp, new_total_staked,
           CAST(NULL AS TEXT) AS reward_rate, CAST(NULL AS TEXT) AS rewards_accrued,
           CAST(NULL AS TEXT) AS new_pending_rewards, CAST(NULL AS TEXT) AS total_staked,
           tx_hash, log_index, block_number, block_timestamp
    FROM emergency_withdraw_events WHERE user_address = $1
    UNION ALL
    SELECT 'reward_claim' AS kind, event_id, user_address, amount,
           CAST(NULL AS TEXT) AS penalty, event_timestamp, CAST(NULL AS TEXT) AS new_total_staked,
           CAST(NULL AS TEXT) AS reward_rate, CAST(NULL AS TEXT) AS rewards_accrued,
           new_pending_rewards, total_staked,
           tx_hash, log_index, block_number, block_timestamp
    FROM reward_claim_events WHERE user_address = $1
";

pub(super) async fn list_activity(
    pool: &AnyPool,
    user: Address,
    request: PageRequest,
) -> Result<Page<StakingEvent>, DbError> {
    let query_str = format!(
        "SELECT * FROM ({ACTIVITY_QUERY}) AS activity {ORDER_NEWEST_FIRST} LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query(&query_str)
        .bind(user_key(user))
        .bind(i64::from(request.page_size))
        .bind(to_i64("offset", request.offset())?)
        .fetch_all(pool)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        let kind: String = row.try_get("kind")?;
        let kind = kind
            .parse::<EventKind>()
            .map_err(|_| DbError::BadColumn { column: "kind", value: kind })?;
        items.push(match kind {
            EventKind::Stake => StakingEvent::Stake(row_to_stake(row)?),
            EventKind::Withdraw => StakingEvent::Withdraw(row_to_withdraw(row)?),
            EventKind::EmergencyWithdraw => {
                StakingEvent::EmergencyWithdraw(row_to_emergency_withdraw(row)?)
            }
            EventKind::RewardClaim => StakingEvent::RewardClaim(row_to_reward_claim(row)?),
        });
    }

    Ok(Page::new(items, request))
}
