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

use std::{str::FromStr, sync::Arc};

use alloy::primitives::Address;
use async_trait::async_trait;
use sqlx::{
    any::{install_default_drivers, AnyConnectOptions, AnyPoolOptions},
    AnyPool, Row,
};

use super::{aggregates, records, to_i64, DbError, Page, PageRequest};
use crate::{
    events::{
        EmergencyWithdrawEvent, EventKind, RewardClaimEvent, StakeEvent, StakingEvent,
        WithdrawEvent,
    },
    handlers::apply_event,
    stats::{ProtocolStats, UserStats},
};

const SQL_BLOCK_KEY: i64 = 0;

/// Result of handing one event to [IndexerDb::record_event].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The record was written and the aggregates updated.
    Applied { new_user: bool },
    /// The identity was already indexed for the same kind and block; nothing changed.
    Replayed,
}

#[async_trait]
pub trait IndexerDb {
    fn pool(&self) -> &AnyPool;

    async fn get_last_block(&self) -> Result<Option<u64>, DbError>;
    async fn set_last_block(&self, block_numb: u64) -> Result<(), DbError>;

    /// Stores the event record and applies it to the aggregates atomically.
    async fn record_event(&self, event: &StakingEvent) -> Result<RecordOutcome, DbError>;

    async fn get_protocol_stats(&self) -> Result<Option<ProtocolStats>, DbError>;
    async fn get_user_stats(&self, user: Address) -> Result<Option<UserStats>, DbError>;

    async fn list_stake_events(
        &self,
        user: Address,
        page: PageRequest,
    ) -> Result<Page<StakeEvent>, DbError>;

    async fn list_withdraw_events(
        &self,
        user: Address,
        page: PageRequest,
    ) -> Result<Page<WithdrawEvent>, DbError>;

    /// `None` lists emergency withdrawals across all users.
    async fn list_emergency_withdraw_events(
        &self,
        user: Option<Address>,
        page: PageRequest,
    ) -> Result<Page<EmergencyWithdrawEvent>, DbError>;

    async fn list_reward_claim_events(
        &self,
        user: Address,
        page: PageRequest,
    ) -> Result<Page<RewardClaimEvent>, DbError>;

    /// All four event kinds for one user, merged newest first.
    async fn list_user_activity(
        &self,
        user: Address,
        page: PageRequest,
    ) -> Result<Page<StakingEvent>, DbError>;
}

pub type DbObj = Arc<dyn IndexerDb + Send + Sync>;

#[derive(Debug, Clone)]
pub struct StakingDb {
    pool: AnyPool,
}

impl StakingDb {
    pub async fn new(conn_str: &str, skip_migrations: bool) -> Result<Self, DbError> {
        install_default_drivers();
        let opts = AnyConnectOptions::from_str(conn_str)?;

        let pool = AnyPoolOptions::new().max_connections(7).connect_with(opts).await?;

        if !skip_migrations {
            sqlx::migrate!().run(&pool).await?;
        }

        Ok(Self { pool })
    }
}

#[async_trait]
impl IndexerDb for StakingDb {
    fn pool(&self) -> &AnyPool {
        &self.pool
    }

    async fn get_last_block(&self) -> Result<Option<u64>, DbError> {
        let res = sqlx::query("SELECT block FROM last_block WHERE id = $1")
            .bind(SQL_BLOCK_KEY)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = res else {
            return Ok(None);
        };

        let block_str: String = row.try_get("block")?;

        Ok(Some(block_str.parse().map_err(|_err| DbError::BadBlockNumb(block_str))?))
    }

    async fn set_last_block(&self, block_numb: u64) -> Result<(), DbError> {
        let res = sqlx::query(
            "INSERT INTO last_block (id, block) VALUES ($1, $2)
         ON CONFLICT (id) DO UPDATE SET block = EXCLUDED.block",
        )
        .bind(SQL_BLOCK_KEY)
        .bind(block_numb.to_string())
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(DbError::SetBlockFail);
        }

        Ok(())
    }

    async fn record_event(&self, event: &StakingEvent) -> Result<RecordOutcome, DbError> {
        let meta = *event.meta();
        let kind = event.kind();
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "INSERT INTO processed_events (event_id, kind, block_number) VALUES ($1, $2, $3)
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(meta.id.to_string())
        .bind(kind.as_str())
        .bind(to_i64("block_number", meta.block_number)?)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            let row = sqlx::query("SELECT kind, block_number FROM processed_events WHERE event_id = $1")
                .bind(meta.id.to_string())
                .fetch_one(&mut *tx)
                .await?;
            let existing: String = row.try_get("kind")?;
            let existing_block: i64 = row.try_get("block_number")?;
            tx.rollback().await?;

            if existing == kind.as_str() && existing_block as u64 == meta.block_number {
                tracing::debug!("Skipping already indexed {kind} event {}", meta.id);
                return Ok(RecordOutcome::Replayed);
            }
            return Err(DbError::EventIdCollision {
                id: meta.id,
                existing,
                existing_block: existing_block as u64,
                kind: kind.to_string(),
                block: meta.block_number,
            });
        }

        records::insert_event(&mut tx, event).await?;

        let protocol = aggregates::load_protocol_stats(&mut *tx).await?;
        let user = aggregates::load_user_stats(&mut *tx, event.user()).await?;
        let update = apply_event(protocol, user, event)?;

        aggregates::upsert_protocol_stats(&mut tx, &update.protocol).await?;
        aggregates::upsert_user_stats(&mut tx, &update.user).await?;

        tx.commit().await?;

        if update.new_user {
            tracing::debug!("First activity for user {:#x}", event.user());
        }
        Ok(RecordOutcome::Applied { new_user: update.new_user })
    }

    async fn get_protocol_stats(&self) -> Result<Option<ProtocolStats>, DbError> {
        aggregates::load_protocol_stats(&self.pool).await
    }

    async fn get_user_stats(&self, user: Address) -> Result<Option<UserStats>, DbError> {
        aggregates::load_user_stats(&self.pool, user).await
    }

    async fn list_stake_events(
        &self,
        user: Address,
        page: PageRequest,
    ) -> Result<Page<StakeEvent>, DbError> {
        records::list_page(&self.pool, EventKind::Stake, Some(user), page, records::row_to_stake)
            .await
    }

    async fn list_withdraw_events(
        &self,
        user: Address,
        page: PageRequest,
    ) -> Result<Page<WithdrawEvent>, DbError> {
        records::list_page(
            &self.pool,
            EventKind::Withdraw,
            Some(user),
            page,
            records::row_to_withdraw,
        )
        .await
    }

    async fn list_emergency_withdraw_events(
        &self,
        user: Option<Address>,
        page: PageRequest,
    ) -> Result<Page<EmergencyWithdrawEvent>, DbError> {
        records::list_page(
            &self.pool,
            EventKind::EmergencyWithdraw,
            user,
            page,
            records::row_to_emergency_withdraw,
        )
        .await
    }

    async fn list_reward_claim_events(
        &self,
        user: Address,
        page: PageRequest,
    ) -> Result<Page<RewardClaimEvent>, DbError> {
        records::list_page(
            &self.pool,
            EventKind::RewardClaim,
            Some(user),
            page,
            records::row_to_reward_claim,
        )
        .await
    }

    async fn list_user_activity(
        &self,
        user: Address,
        page: PageRequest,
    ) -> Result<Page<StakingEvent>, DbError> {
        records::list_activity(&self.pool, user, page).await
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;
    use crate::{
        events::EventMeta,
        test_utils::{tx_hash, EventBuilder, TestDb},
    };

    #[tokio::test]
    async fn last_block_roundtrip() {
        let test_db = TestDb::new().await.unwrap();
        let db = test_db.get_db();

        assert_eq!(db.get_last_block().await.unwrap(), None);
        db.set_last_block(1234).await.unwrap();
        db.set_last_block(1240).await.unwrap();
        assert_eq!(db.get_last_block().await.unwrap(), Some(1240));
    }

    #[tokio::test]
    async fn stake_stake_emergency_withdraw() {
        let test_db = TestDb::new().await.unwrap();
        let db = test_db.get_db();
        let u = EventBuilder::new(Address::repeat_byte(0x11));

        let first = db.record_event(&u.stake(10, 0, 100, 1_000, 100)).await.unwrap();
        assert_eq!(first, RecordOutcome::Applied { new_user: true });
        let second = db.record_event(&u.stake(11, 2, 50, 1_010, 150)).await.unwrap();
        assert_eq!(second, RecordOutcome::Applied { new_user: false });
        db.record_event(&u.emergency_withdraw(12, 1, 150, 30, 1_020, 0)).await.unwrap();

        let user = db.get_user_stats(u.user()).await.unwrap().unwrap();
        assert_eq!(user.total_staked, U256::from(150));
        assert_eq!(user.stake_count, 2);
        assert_eq!(user.emergency_withdraw_count, 1);
        assert_eq!(user.total_penalties_paid, U256::from(30));
        assert_eq!(user.first_stake_timestamp, Some(1_000));
        assert_eq!(user.last_activity_timestamp, 1_020);

        let protocol = db.get_protocol_stats().await.unwrap().unwrap();
        assert_eq!(protocol.total_users, 1);
        assert_eq!(protocol.total_burned, U256::from(30));
        assert_eq!(protocol.total_stake_events, 2);
        assert_eq!(protocol.total_emergency_withdraw_events, 1);
        assert_eq!(protocol.total_staked, U256::ZERO);
        assert_eq!(protocol.last_updated_block, 12);
    }

    #[tokio::test]
    async fn two_users_each_stake_once() {
        let test_db = TestDb::new().await.unwrap();
        let db = test_db.get_db();
        let a = EventBuilder::new(Address::repeat_byte(0x21));
        let b = EventBuilder::new(Address::repeat_byte(0x22));

        assert_eq!(db.get_protocol_stats().await.unwrap(), None);
        db.record_event(&a.stake(1, 0, 10, 100, 10)).await.unwrap();
        db.record_event(&b.stake(1, 1, 20, 100, 30)).await.unwrap();

        let protocol = db.get_protocol_stats().await.unwrap().unwrap();
        assert_eq!(protocol.total_users, 2);
        assert_eq!(protocol.total_stake_events, 2);
        assert_eq!(protocol.total_staked, U256::from(30));
        assert_eq!(protocol.current_reward_rate, U256::from(EventBuilder::REWARD_RATE));
    }

    #[tokio::test]
    async fn replayed_event_is_skipped() {
        let test_db = TestDb::new().await.unwrap();
        let db = test_db.get_db();
        let u = EventBuilder::new(Address::repeat_byte(0x31));
        let event = u.stake(5, 3, 100, 500, 100);

        db.record_event(&event).await.unwrap();
        assert_eq!(db.record_event(&event).await.unwrap(), RecordOutcome::Replayed);

        let user = db.get_user_stats(u.user()).await.unwrap().unwrap();
        assert_eq!(user.stake_count, 1);
        assert_eq!(user.total_staked, U256::from(100));
        let page = db.list_stake_events(u.user(), PageRequest::first(10).unwrap()).await.unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn conflicting_identity_is_fatal() {
        let test_db = TestDb::new().await.unwrap();
        let db = test_db.get_db();
        let u = EventBuilder::new(Address::repeat_byte(0x41));

        db.record_event(&u.stake(7, 0, 100, 700, 100)).await.unwrap();
        // Same tx hash and log index, different kind.
        let err = db.record_event(&u.reward_claim(7, 0, 5, 700, 100)).await.unwrap_err();
        assert!(matches!(err, DbError::EventIdCollision { ref existing, .. } if existing == "stake"));

        let protocol = db.get_protocol_stats().await.unwrap().unwrap();
        assert_eq!(protocol.total_rewards_claimed_events, 0);
        let claims =
            db.list_reward_claim_events(u.user(), PageRequest::first(10).unwrap()).await.unwrap();
        assert!(claims.items.is_empty());
    }

    #[tokio::test]
    async fn pagination_boundary() {
        let test_db = TestDb::new().await.unwrap();
        let db = test_db.get_db();
        let full = EventBuilder::new(Address::repeat_byte(0x51));
        let short = EventBuilder::new(Address::repeat_byte(0x52));

        for i in 0..10u64 {
            db.record_event(&full.stake(100 + i, 0, 1, 1_000 + i, i + 1)).await.unwrap();
        }
        for i in 0..9u64 {
            db.record_event(&short.stake(200 + i, 0, 1, 2_000 + i, i + 1)).await.unwrap();
        }

        let request = PageRequest::first(10).unwrap();
        let page = db.list_stake_events(full.user(), request).await.unwrap();
        assert_eq!(page.items.len(), 10);
        assert!(page.has_next_page);
        let next = db.list_stake_events(full.user(), request.next()).await.unwrap();
        assert!(next.items.is_empty());
        assert!(!next.has_next_page);

        let page = db.list_stake_events(short.user(), request).await.unwrap();
        assert_eq!(page.items.len(), 9);
        assert!(!page.has_next_page);
    }

    #[tokio::test]
    async fn newest_first_with_tiebreaks() {
        let test_db = TestDb::new().await.unwrap();
        let db = test_db.get_db();
        let u = EventBuilder::new(Address::repeat_byte(0x61));

        db.record_event(&u.withdraw(20, 0, 1, 300, 9)).await.unwrap();
        db.record_event(&u.withdraw(21, 1, 1, 300, 8)).await.unwrap();
        db.record_event(&u.withdraw(21, 4, 1, 300, 7)).await.unwrap();
        db.record_event(&u.withdraw(19, 0, 1, 400, 6)).await.unwrap();

        let page = db.list_withdraw_events(u.user(), PageRequest::first(10).unwrap()).await.unwrap();
        let order: Vec<(u64, i32)> =
            page.items.iter().map(|e| (e.meta.block_number, e.meta.log_index)).collect();
        assert_eq!(order, vec![(19, 0), (21, 4), (21, 1), (20, 0)]);
        assert_eq!(page.items[0].rewards_accrued, U256::from(EventBuilder::REWARDS_ACCRUED));
        assert_eq!(page.items[0].meta, EventMeta::new(tx_hash(19), 0, 19, 400));
    }

    #[tokio::test]
    async fn emergency_withdrawals_protocol_wide() {
        let test_db = TestDb::new().await.unwrap();
        let db = test_db.get_db();
        let a = EventBuilder::new(Address::repeat_byte(0x71));
        let b = EventBuilder::new(Address::repeat_byte(0x72));

        db.record_event(&a.emergency_withdraw(1, 0, 100, 10, 100, 0)).await.unwrap();
        db.record_event(&b.emergency_withdraw(2, 0, 200, 20, 200, 0)).await.unwrap();

        let request = PageRequest::first(100).unwrap();
        let all = db.list_emergency_withdraw_events(None, request).await.unwrap();
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.items[0].user, b.user());
        assert_eq!(all.items[0].penalty, U256::from(20));

        let only_a = db.list_emergency_withdraw_events(Some(a.user()), request).await.unwrap();
        assert_eq!(only_a.items.len(), 1);
        assert_eq!(only_a.items[0].user, a.user());
    }

    #[tokio::test]
    async fn user_activity_merges_kinds() {
        let test_db = TestDb::new().await.unwrap();
        let db = test_db.get_db();
        let u = EventBuilder::new(Address::repeat_byte(0x81));
        let other = EventBuilder::new(Address::repeat_byte(0x82));

        let events = [
            u.stake(1, 0, 100, 10, 100),
            u.reward_claim(2, 0, 5, 20, 100),
            u.withdraw(3, 0, 40, 30, 60),
            u.emergency_withdraw(4, 0, 60, 6, 40, 0),
        ];
        for event in &events {
            db.record_event(event).await.unwrap();
        }
        db.record_event(&other.stake(5, 0, 1, 50, 1)).await.unwrap();

        let page = db.list_user_activity(u.user(), PageRequest::first(3).unwrap()).await.unwrap();
        assert!(page.has_next_page);
        assert_eq!(page.items, vec![events[3].clone(), events[2].clone(), events[1].clone()]);

        let rest = db
            .list_user_activity(u.user(), PageRequest::new(1, 3).unwrap())
            .await
            .unwrap();
        assert_eq!(rest.items, vec![events[0].clone()]);
        assert!(!rest.has_next_page);
    }

    #[tokio::test]
    async fn unknown_user_has_no_stats() {
        let test_db = TestDb::new().await.unwrap();
        let db = test_db.get_db();
        assert_eq!(db.get_user_stats(Address::repeat_byte(0x99)).await.unwrap(), None);
        let page = db
            .list_stake_events(Address::repeat_byte(0x99), PageRequest::first(10).unwrap())
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_next_page);
    }
}
