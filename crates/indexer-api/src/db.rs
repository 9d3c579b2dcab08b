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

use anyhow::Result;
use staking_indexer::{DbObj, StakingDb};
use std::sync::Arc;

/// Application state containing the database connection
pub struct AppState {
    pub db: DbObj,
}

impl AppState {
    /// Create new application state with database connection.
    /// Read replicas should pass `skip_migrations`.
    pub async fn new(database_url: &str, skip_migrations: bool) -> Result<Self> {
        tracing::info!("Connecting to database...");

        let db = StakingDb::new(database_url, skip_migrations).await?;

        tracing::info!("Database connection established");

        Ok(Self::from_db(Arc::new(db)))
    }

    pub fn from_db(db: DbObj) -> Self {
        Self { db }
    }
}
