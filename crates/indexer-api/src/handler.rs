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
    extract::{rejection::QueryRejection, Query},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::db::AppState;
use crate::models::PaginationParams;
use crate::routes::{protocol, users};
use staking_indexer::PageRequest;

/// Creates the axum application with all routes
pub fn create_app(state: Arc<AppState>) -> Router {
    // Configure CORS
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/v1", api_v1_routes(state))
        .layer(cors)
        .fallback(not_found)
}

/// API v1 routes
fn api_v1_routes(state: Arc<AppState>) -> Router {
    Router::new().merge(protocol::routes()).nest("/users", users::routes()).with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "staking-indexer-api"
    }))
}

/// 404 handler
async fn not_found() -> impl IntoResponse {
    error_response(StatusCode::NOT_FOUND, "Not Found", "The requested endpoint does not exist")
}

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": error, "message": message.into() }))).into_response()
}

/// Global error handler that converts anyhow errors to HTTP responses
pub fn handle_error(err: anyhow::Error) -> impl IntoResponse {
    tracing::error!("Request failed: {:?}", err);

    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", err.to_string())
}

pub fn bad_request(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "Bad Request", message)
}

pub fn missing(message: impl Into<String>) -> Response {
    error_response(StatusCode::NOT_FOUND, "Not Found", message)
}

/// Serializes `body` with a short cache lifetime; indexed data lags the chain anyway.
pub fn cached_json<T: Serialize>(body: T, max_age: u32) -> Response {
    let mut res = Json(body).into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={max_age}")) {
        res.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    res
}

/// Resolves the pagination query, rejecting malformed values with a JSON 400.
pub fn page_request(
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<PageRequest, Response> {
    match params {
        Ok(Query(params)) => Ok(params.validate()),
        Err(rejection) => Err(bad_request(rejection.body_text())),
    }
}
