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

//! Drives the polling runner against a minimal JSON-RPC node served over HTTP.

use std::{
    collections::HashSet,
    future::IntoFuture,
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy::{
    primitives::{Address, B256},
    rpc::types::Log,
};
use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use staking_indexer::{
    contracts::STAKING_EVENT_SIGNATURES,
    test_utils::{encode_log, EventBuilder, TestDb, TEST_STAKING_CONTRACT},
    IndexerDb, IndexerService, IndexerServiceConfig, PageRequest, ServiceError,
};
use tokio::net::TcpListener;
use url::Url;

/// Chain state behind the fake node.
#[derive(Default)]
struct Chain {
    head: u64,
    logs: Vec<Log>,
    /// Remaining successful `eth_blockNumber` answers, unlimited when `None`.
    block_number_answers: Option<usize>,
    get_logs_failures: usize,
    /// Every `eth_getLogs` window requested, failed ones included.
    windows: Vec<(u64, u64)>,
    addresses: HashSet<Address>,
    topics: HashSet<B256>,
}

fn quantity(value: &Value) -> Result<u64, String> {
    let hex = value.as_str().ok_or_else(|| format!("expected a quantity, got {value}"))?;
    u64::from_str_radix(hex.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

// A filter field is either a single value or a list of alternatives.
fn one_or_many<T: serde::de::DeserializeOwned>(value: &Value) -> Result<Vec<T>, String> {
    let values = match value {
        Value::Null => vec![],
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };
    values.into_iter().map(|v| serde_json::from_value(v).map_err(|e| e.to_string())).collect()
}

impl Chain {
    fn block_number(&mut self) -> Result<Value, String> {
        match self.block_number_answers.as_mut() {
            Some(0) => Err("node unavailable".into()),
            Some(left) => {
                *left -= 1;
                Ok(json!(format!("{:#x}", self.head)))
            }
            None => Ok(json!(format!("{:#x}", self.head))),
        }
    }

    fn get_logs(&mut self, filter: &Value) -> Result<Value, String> {
        let from = quantity(&filter["fromBlock"])?;
        let to = quantity(&filter["toBlock"])?;
        self.windows.push((from, to));
        if self.get_logs_failures > 0 {
            self.get_logs_failures -= 1;
            return Err("upstream timeout".into());
        }

        let addresses: Vec<Address> = one_or_many(&filter["address"])?;
        let topics: Vec<B256> = one_or_many(&filter["topics"][0])?;
        self.addresses.extend(addresses.iter().copied());
        self.topics.extend(topics.iter().copied());

        let matched: Vec<&Log> = self
            .logs
            .iter()
            .filter(|log| log.block_number.is_some_and(|b| (from..=to).contains(&b)))
            .filter(|log| addresses.is_empty() || addresses.contains(&log.address()))
            .filter(|log| {
                topics.is_empty() || log.topic0().is_some_and(|topic| topics.contains(topic))
            })
            .collect();
        serde_json::to_value(matched).map_err(|e| e.to_string())
    }
}

async fn rpc(State(chain): State<Arc<Mutex<Chain>>>, Json(request): Json<Value>) -> Json<Value> {
    let id = request["id"].clone();
    let result = {
        let mut chain = chain.lock().unwrap();
        match request["method"].as_str() {
            Some("eth_blockNumber") => chain.block_number(),
            Some("eth_getLogs") => chain.get_logs(&request["params"][0]),
            other => Err(format!("unsupported method {other:?}")),
        }
    };
    Json(match result {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(message) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32000, "message": message },
        }),
    })
}

async fn spawn_node(chain: Chain) -> (Url, Arc<Mutex<Chain>>) {
    let state = Arc::new(Mutex::new(chain));
    let app = Router::new().route("/", post(rpc)).with_state(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, app).into_future());
    (format!("http://{addr}/").parse().unwrap(), state)
}

async fn service(
    url: Url,
    test_db: &TestDb,
    retries: u32,
    batch_size: u64,
) -> IndexerService<alloy::providers::RootProvider> {
    let config = IndexerServiceConfig { interval: Duration::from_millis(10), retries, batch_size };
    IndexerService::new(url, TEST_STAKING_CONTRACT, &test_db.db_url, config).await.unwrap()
}

fn windows(chain: &Arc<Mutex<Chain>>) -> Vec<(u64, u64)> {
    chain.lock().unwrap().windows.clone()
}

#[tokio::test]
async fn run_indexes_every_batch_and_stops_at_end_block() {
    let test_db = TestDb::new().await.unwrap();
    let alice = EventBuilder::new(Address::repeat_byte(0xa1));
    let bob = EventBuilder::new(Address::repeat_byte(0xb0));

    let mut foreign = encode_log(&alice.stake(12, 0, 999, 1_012, 999));
    foreign.inner.address = Address::repeat_byte(0xee);
    let logs = vec![
        encode_log(&alice.stake(10, 0, 100, 1_010, 100)),
        encode_log(&bob.stake(11, 0, 50, 1_011, 150)),
        foreign,
        encode_log(&alice.reward_claim(13, 0, 5, 1_013, 150)),
        encode_log(&bob.withdraw(16, 0, 20, 1_016, 130)),
        encode_log(&alice.emergency_withdraw(19, 0, 100, 10, 1_019, 30)),
        encode_log(&bob.stake(25, 0, 70, 1_025, 100)),
    ];
    let (url, chain) = spawn_node(Chain { head: 40, logs, ..Default::default() }).await;

    let mut service = service(url, &test_db, 2, 3).await;
    service.run(Some(10), Some(20)).await.unwrap();

    assert_eq!(windows(&chain), vec![(10, 13), (14, 17), (18, 20)]);
    assert_eq!(test_db.db.get_last_block().await.unwrap(), Some(20));
    {
        let chain = chain.lock().unwrap();
        assert_eq!(chain.addresses, HashSet::from([TEST_STAKING_CONTRACT]));
        assert_eq!(chain.topics, STAKING_EVENT_SIGNATURES.iter().copied().collect::<HashSet<_>>());
    }

    let stats = test_db.db.get_protocol_stats().await.unwrap().unwrap();
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.total_stake_events, 2);
    assert_eq!(stats.total_withdraw_events, 1);
    assert_eq!(stats.total_emergency_withdraw_events, 1);
    assert_eq!(stats.total_rewards_claimed_events, 1);
    assert_eq!(stats.last_updated_block, 19);

    // block 25 lies past the end block and is left for a later run
    let stakes =
        test_db.db.list_stake_events(bob.user(), PageRequest::new(0, 10).unwrap()).await.unwrap();
    assert_eq!(stakes.items.len(), 1);
    assert_eq!(stakes.items[0].meta.block_number, 11);
}

#[tokio::test]
async fn run_resumes_after_the_last_processed_block() {
    let test_db = TestDb::new().await.unwrap();
    let alice = EventBuilder::new(Address::repeat_byte(0xa1));
    let logs = vec![
        encode_log(&alice.stake(12, 0, 100, 1_012, 100)),
        encode_log(&alice.stake(15, 0, 40, 1_015, 140)),
    ];
    let (url, chain) = spawn_node(Chain { head: 40, logs, ..Default::default() }).await;
    test_db.db.set_last_block(13).await.unwrap();

    let mut service = service(url, &test_db, 2, 10).await;
    service.run(Some(5), Some(17)).await.unwrap();

    assert_eq!(windows(&chain), vec![(14, 17)]);
    assert_eq!(test_db.db.get_last_block().await.unwrap(), Some(17));
    let stats = test_db.db.get_user_stats(alice.user()).await.unwrap().unwrap();
    assert_eq!(stats.stake_count, 1);
    assert_eq!(stats.first_stake_timestamp, Some(1_015));
}

#[tokio::test]
async fn run_gives_up_when_the_node_stays_unreachable() {
    let test_db = TestDb::new().await.unwrap();
    let (url, chain) =
        spawn_node(Chain { head: 40, block_number_answers: Some(1), ..Default::default() }).await;

    let mut service = service(url, &test_db, 2, 10).await;
    let err = service.run(Some(10), None).await.unwrap_err();

    assert!(matches!(err, ServiceError::MaxRetries), "unexpected error: {err:?}");
    assert!(windows(&chain).is_empty());
    assert_eq!(test_db.db.get_last_block().await.unwrap(), None);
}

#[tokio::test]
async fn run_retries_a_failed_batch() {
    let test_db = TestDb::new().await.unwrap();
    let alice = EventBuilder::new(Address::repeat_byte(0xa1));
    let logs = vec![encode_log(&alice.stake(11, 0, 100, 1_011, 100))];
    let (url, chain) =
        spawn_node(Chain { head: 30, logs, get_logs_failures: 1, ..Default::default() }).await;

    let mut service = service(url, &test_db, 2, 5).await;
    service.run(Some(10), Some(12)).await.unwrap();

    assert_eq!(windows(&chain), vec![(10, 12), (10, 12)]);
    assert_eq!(test_db.db.get_last_block().await.unwrap(), Some(12));
    let stats = test_db.db.get_protocol_stats().await.unwrap().unwrap();
    assert_eq!(stats.total_stake_events, 1);
    assert_eq!(stats.total_users, 1);
}

#[tokio::test]
async fn run_rejects_an_end_block_before_the_start() {
    let test_db = TestDb::new().await.unwrap();
    let (url, chain) = spawn_node(Chain { head: 40, ..Default::default() }).await;

    let mut service = service(url, &test_db, 2, 10).await;
    let err = service.run(Some(30), Some(20)).await.unwrap_err();

    assert!(matches!(err, ServiceError::Error(_)), "unexpected error: {err:?}");
    assert!(windows(&chain).is_empty());
}
