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

//! Polling runner that moves staking events from the chain into storage.

use std::{cmp::min, collections::HashMap, sync::Arc};

use alloy::{
    eips::BlockNumberOrTag,
    primitives::Address,
    providers::{Provider, RootProvider},
    rpc::types::{Filter, Log},
    transports::{RpcError, TransportErrorKind},
};
use anyhow::{anyhow, Context};
use thiserror::Error;
use tokio::time::Duration;
use url::Url;

use crate::{
    contracts::STAKING_EVENT_SIGNATURES,
    db::{DbError, DbObj, RecordOutcome, StakingDb},
    events::{EventError, StakingEvent},
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbError),

    #[error("RPC error: {0}")]
    RpcError(#[from] RpcError<TransportErrorKind>),

    #[error("Malformed event: {0}")]
    Event(#[from] EventError),

    #[error("Error: {0}")]
    Error(#[from] anyhow::Error),

    #[error("Maximum retries reached")]
    MaxRetries,
}

impl ServiceError {
    /// RPC failures are retried; everything else stops the indexer.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ServiceError::RpcError(_))
    }
}

#[derive(Clone, Debug)]
pub struct IndexerServiceConfig {
    pub interval: Duration,
    pub retries: u32,
    pub batch_size: u64,
}

/// Counts reported for one processed batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub applied: usize,
    pub replayed: usize,
    pub new_users: usize,
}

#[derive(Clone)]
pub struct IndexerService<P> {
    pub provider: P,
    pub staking_contract: Address,
    pub db: DbObj,
    pub config: IndexerServiceConfig,
    pub block_num_to_timestamp: HashMap<u64, u64>,
}

impl IndexerService<RootProvider> {
    pub async fn new(
        rpc_url: Url,
        staking_contract: Address,
        db_conn: &str,
        config: IndexerServiceConfig,
    ) -> Result<Self, ServiceError> {
        let provider = RootProvider::new_http(rpc_url);
        let db: DbObj = Arc::new(StakingDb::new(db_conn, false).await?);
        Ok(Self::from_parts(provider, staking_contract, db, config))
    }
}

impl<P> IndexerService<P>
where
    P: Provider + Clone + 'static,
{
    pub fn from_parts(
        provider: P,
        staking_contract: Address,
        db: DbObj,
        config: IndexerServiceConfig,
    ) -> Self {
        Self { provider, staking_contract, db, config, block_num_to_timestamp: HashMap::new() }
    }

    pub async fn run(
        &mut self,
        starting_block: Option<u64>,
        end_block: Option<u64>,
    ) -> Result<(), ServiceError> {
        let mut interval = tokio::time::interval(self.config.interval);

        let mut from_block: u64 = self.starting_block(starting_block).await?;

        if let Some(end) = end_block {
            if end < from_block {
                return Err(ServiceError::Error(anyhow!(
                    "End block {} is less than starting block {}",
                    end,
                    from_block
                )));
            }
            tracing::info!("Starting indexer at block {} (will stop at block {})", from_block, end);
        } else {
            tracing::info!("Starting indexer at block {}", from_block);
        }

        let mut attempt = 0;
        loop {
            interval.tick().await;

            let max_block = match self.current_block().await {
                Ok(to_block) => end_block.map_or(to_block, |end| min(to_block, end)),
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(
                        "Failed to fetch current block: {:?}, attempt number {}",
                        e,
                        attempt
                    );
                    if attempt > self.config.retries {
                        tracing::error!("Aborting after {} consecutive attempts", attempt);
                        return Err(ServiceError::MaxRetries);
                    }
                    continue;
                }
            };

            if max_block < from_block {
                continue;
            }

            let batch_end = min(max_block, from_block.saturating_add(self.config.batch_size));

            let start = std::time::Instant::now();
            match self.process_blocks(from_block, batch_end).await {
                Ok(summary) => {
                    tracing::info!(
                        "process_blocks completed in {:?} [num_blocks={}, applied={}, replayed={}, new_users={}]",
                        start.elapsed(),
                        batch_end - from_block + 1,
                        summary.applied,
                        summary.replayed,
                        summary.new_users
                    );
                    attempt = 0;
                    from_block = batch_end + 1;

                    if let Some(end) = end_block {
                        if from_block > end {
                            tracing::info!("Reached end block {}, exiting", end);
                            return Ok(());
                        }
                    }
                }
                Err(e) if e.is_recoverable() => {
                    attempt += 1;
                    let delay = retry_delay(attempt);
                    tracing::warn!(
                        "Failed to process blocks from {} to {}: {:?}, attempt number {}, retrying in {}s",
                        from_block,
                        batch_end,
                        e,
                        attempt,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to process blocks from {} to {}: {:?}",
                        from_block,
                        batch_end,
                        e
                    );
                    return Err(e);
                }
            }

            if attempt > self.config.retries {
                tracing::error!("Aborting after {} consecutive attempts", attempt);
                return Err(ServiceError::MaxRetries);
            }
        }
    }

    async fn process_blocks(&mut self, from: u64, to: u64) -> Result<BatchSummary, ServiceError> {
        tracing::info!("=== Processing blocks from {} to {} ===", from, to);
        let logs = self.fetch_logs(from, to).await?;
        let summary = self.process_logs(logs).await;
        self.block_num_to_timestamp.clear();
        let summary = summary?;

        self.db.set_last_block(to).await?;
        Ok(summary)
    }

    pub(crate) async fn fetch_logs(&self, from: u64, to: u64) -> Result<Vec<Log>, ServiceError> {
        let start = std::time::Instant::now();
        let filter = Filter::new()
            .address(self.staking_contract)
            .from_block(from)
            .to_block(to)
            .event_signature(STAKING_EVENT_SIGNATURES.to_vec());

        tracing::debug!("Fetching logs from RPC: block {} to block {}", from, to);
        let logs = self.provider.get_logs(&filter).await?;
        tracing::info!(
            "Fetched {} logs from block {} to {} in {:?}",
            logs.len(),
            from,
            to,
            start.elapsed()
        );
        Ok(logs)
    }

    /// Decodes and records logs in chain order, one event at a time.
    pub async fn process_logs(&mut self, mut logs: Vec<Log>) -> Result<BatchSummary, ServiceError> {
        logs.sort_by_key(|log| (log.block_number, log.log_index));

        let mut summary = BatchSummary::default();
        for log in &logs {
            let fallback = match (log.block_timestamp, log.block_number) {
                (None, Some(block_number)) => Some(self.block_timestamp(block_number).await?),
                _ => None,
            };
            let event = StakingEvent::decode_log(log, fallback)?;

            match self.db.record_event(&event).await? {
                RecordOutcome::Applied { new_user } => {
                    tracing::debug!(
                        "Recorded {} event {} for {:#x}",
                        event.kind(),
                        event.id(),
                        event.user()
                    );
                    summary.applied += 1;
                    if new_user {
                        summary.new_users += 1;
                    }
                }
                RecordOutcome::Replayed => summary.replayed += 1,
            }
        }
        Ok(summary)
    }

    pub async fn block_timestamp(&mut self, block_number: u64) -> Result<u64, ServiceError> {
        if let Some(ts) = self.block_num_to_timestamp.get(&block_number) {
            return Ok(*ts);
        }

        tracing::debug!("Fetching timestamp for block {}", block_number);
        let ts = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .await?
            .context(anyhow!("Failed to get block by number: {}", block_number))?
            .header
            .timestamp;
        self.block_num_to_timestamp.insert(block_number, ts);
        Ok(ts)
    }

    async fn current_block(&self) -> Result<u64, ServiceError> {
        Ok(self.provider.get_block_number().await?)
    }

    // Return the block after the last processed one, if any;
    // otherwise the starting_block if set and <= current_block;
    // otherwise the current_block.
    async fn starting_block(&self, starting_block: Option<u64>) -> Result<u64, ServiceError> {
        let last_processed = self.db.get_last_block().await?;
        let current_block = self.current_block().await?;
        Ok(find_starting_block(starting_block, last_processed, current_block))
    }
}

// exponential backoff with a maximum delay of 120 seconds
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt.saturating_sub(1)).min(120))
}

fn find_starting_block(
    starting_block: Option<u64>,
    last_processed: Option<u64>,
    current_block: u64,
) -> u64 {
    if let Some(last) = last_processed.filter(|&b| b > 0) {
        let next_block = last + 1;
        let start = min(next_block, current_block);
        tracing::info!("Using last processed block {} as starting block (next: {})", last, start);
        return start;
    }

    let from = starting_block.unwrap_or(current_block);
    if from > current_block {
        tracing::warn!(
            "Starting block {} is greater than current block {}, defaulting to current block",
            from,
            current_block
        );
        current_block
    } else {
        tracing::info!("Using {} as starting block", from);
        from
    }
}
