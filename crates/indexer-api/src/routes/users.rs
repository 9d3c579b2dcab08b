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
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use staking_indexer::PageRequest;
use std::sync::Arc;

use super::parse_address;
use crate::{
    db::AppState,
    handler::{cached_json, handle_error, missing, page_request},
    models::{
        ActivityEntry, EmergencyWithdrawEntry, PageResponse, PaginationParams, RewardClaimEntry,
        StakeEntry, UserStatsResponse, WithdrawEntry,
    },
};

const USER_CACHE_SECS: u32 = 30;

/// Create per-user routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:address/stats", get(get_user_stats))
        .route("/:address/stakes", get(get_stakes))
        .route("/:address/withdrawals", get(get_withdrawals))
        .route("/:address/emergency-withdrawals", get(get_emergency_withdrawals))
        .route("/:address/reward-claims", get(get_reward_claims))
        .route("/:address/events", get(get_activity))
}

/// Parses the path address and pagination query shared by the list endpoints.
fn list_args(
    address_str: &str,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<(Address, PageRequest), Response> {
    let address = parse_address(address_str)?;
    let request = page_request(params)?;
    tracing::debug!(
        "Fetching history for address {:#x} with page={}, page_size={}",
        address,
        request.page,
        request.page_size
    );
    Ok((address, request))
}

fn respond<T: serde::Serialize>(result: anyhow::Result<T>) -> Response {
    match result {
        Ok(response) => cached_json(response, USER_CACHE_SECS),
        Err(err) => handle_error(err).into_response(),
    }
}

/// GET /v1/users/:address/stats
/// Returns the aggregate statistics for one address
async fn get_user_stats(
    State(state): State<Arc<AppState>>,
    Path(address_str): Path<String>,
) -> Response {
    let address = match parse_address(&address_str) {
        Ok(address) => address,
        Err(res) => return res,
    };

    match state.db.get_user_stats(address).await {
        Ok(Some(stats)) => cached_json(UserStatsResponse::from(&stats), USER_CACHE_SECS),
        Ok(None) => missing(format!("No staking activity for address {address:#x}")),
        Err(err) => handle_error(err.into()).into_response(),
    }
}

/// GET /v1/users/:address/stakes
async fn get_stakes(
    State(state): State<Arc<AppState>>,
    Path(address_str): Path<String>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Response {
    let (address, request) = match list_args(&address_str, params) {
        Ok(args) => args,
        Err(res) => return res,
    };
    respond(
        state
            .db
            .list_stake_events(address, request)
            .await
            .map(PageResponse::<StakeEntry>::from_page)
            .map_err(Into::into),
    )
}

/// GET /v1/users/:address/withdrawals
async fn get_withdrawals(
    State(state): State<Arc<AppState>>,
    Path(address_str): Path<String>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Response {
    let (address, request) = match list_args(&address_str, params) {
        Ok(args) => args,
        Err(res) => return res,
    };
    respond(
        state
            .db
            .list_withdraw_events(address, request)
            .await
            .map(PageResponse::<WithdrawEntry>::from_page)
            .map_err(Into::into),
    )
}

/// GET /v1/users/:address/emergency-withdrawals
async fn get_emergency_withdrawals(
    State(state): State<Arc<AppState>>,
    Path(address_str): Path<String>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Response {
    let (address, request) = match list_args(&address_str, params) {
        Ok(args) => args,
        Err(res) => return res,
    };
    respond(
        state
            .db
            .list_emergency_withdraw_events(Some(address), request)
            .await
            .map(PageResponse::<EmergencyWithdrawEntry>::from_page)
            .map_err(Into::into),
    )
}

/// GET /v1/users/:address/reward-claims
async fn get_reward_claims(
    State(state): State<Arc<AppState>>,
    Path(address_str): Path<String>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Response {
    let (address, request) = match list_args(&address_str, params) {
        Ok(args) => args,
        Err(res) => return res,
    };
    respond(
        state
            .db
            .list_reward_claim_events(address, request)
            .await
            .map(PageResponse::<RewardClaimEntry>::from_page)
            .map_err(Into::into),
    )
}

/// GET /v1/users/:address/events
/// Returns every event kind for the address merged into one history
async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(address_str): Path<String>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Response {
    let (address, request) = match list_args(&address_str, params) {
        Ok(args) => args,
        Err(res) => return res,
    };
    respond(
        state
            .db
            .list_user_activity(address, request)
            .await
            .map(PageResponse::<ActivityEntry>::from_page)
            .map_err(Into::into),
    )
}
