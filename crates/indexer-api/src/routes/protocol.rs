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

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use staking_indexer::PageRequest;
use std::sync::Arc;

use crate::{
    db::AppState,
    handler::{cached_json, handle_error, missing, page_request},
    models::{EmergencyWithdrawEntry, PageResponse, PaginationParams, ProtocolStatsResponse},
};

/// Create protocol-wide routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(get_protocol_stats))
        .route("/emergency-withdrawals", get(get_emergency_withdrawals))
}

/// GET /v1/stats
/// Returns the protocol-wide statistics
async fn get_protocol_stats(State(state): State<Arc<AppState>>) -> Response {
    match state.db.get_protocol_stats().await {
        Ok(Some(stats)) => cached_json(ProtocolStatsResponse::from(&stats), 15),
        Ok(None) => missing("No staking activity has been indexed yet"),
        Err(err) => handle_error(err.into()).into_response(),
    }
}

/// GET /v1/emergency-withdrawals
/// Returns emergency withdrawals across all users, newest first
async fn get_emergency_withdrawals(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Response {
    let request = match page_request(params) {
        Ok(request) => request,
        Err(res) => return res,
    };

    match get_emergency_withdrawals_impl(state, request).await {
        Ok(response) => cached_json(response, 30),
        Err(err) => handle_error(err).into_response(),
    }
}

async fn get_emergency_withdrawals_impl(
    state: Arc<AppState>,
    request: PageRequest,
) -> anyhow::Result<PageResponse<EmergencyWithdrawEntry>> {
    tracing::debug!(
        "Fetching emergency withdrawals with page={}, page_size={}",
        request.page,
        request.page_size
    );

    let page = state.db.list_emergency_withdraw_events(None, request).await?;
    Ok(PageResponse::from_page(page))
}
