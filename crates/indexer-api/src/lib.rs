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

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;

pub mod db;
pub mod handler;
pub mod models;
pub mod routes;

pub use db::AppState;
pub use handler::create_app;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Bind address for the REST API
    #[clap(long, env, default_value = "0.0.0.0:8586")]
    pub bind_addr: SocketAddr,

    /// DB connection string.
    #[clap(long, env = "DATABASE_URL")]
    pub db: String,

    /// Do not apply migrations, for read-only replicas.
    #[clap(long, env, default_value_t = false)]
    pub skip_migrations: bool,

    /// Whether to log in JSON format.
    #[clap(long, env, default_value_t = false)]
    pub log_json: bool,
}

/// Serves the API until SIGINT or SIGTERM.
pub async fn run(args: &Args) -> Result<()> {
    let state = AppState::new(&args.db, args.skip_migrations)
        .await
        .context("Failed to initialize AppState")?;
    let listener = tokio::net::TcpListener::bind(&args.bind_addr)
        .await
        .context("Failed to bind a TCP listener")?;

    tracing::info!("REST API listening on: {}", args.bind_addr);
    axum::serve(listener, create_app(Arc::new(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("REST API service failed")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutting down REST API");
}
