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

pub mod contracts;
pub mod db;
pub mod events;
pub mod handlers;
pub mod ids;
pub mod service;
pub mod stats;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use db::{DbError, DbObj, IndexerDb, Page, PageRequest, RecordOutcome, StakingDb};
pub use events::{EventKind, StakingEvent};
pub use service::{IndexerService, IndexerServiceConfig, ServiceError};
pub use stats::{ProtocolStats, UserStats};
