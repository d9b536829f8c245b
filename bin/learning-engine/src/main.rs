// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.
// Minimal bootstrap; runtime logic & handlers reside in library modules.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use learning_engine::{
    config::{ConfigLoader, EngineConfig},
    http::build_router,
    AppState,
};
use ledger::InterventionScanner;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug, Clone)]
#[command(name = "learning-engine", about = "Adaptive learning engine service")]
struct Cli {
    /// Configuration file (TOML). Falls back to LE_CONFIG, then config/learning-engine.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Run the HTTP and WebSocket server (default).
    Serve,
    /// Run one intervention scan against the configured log and print flagged students.
    Scan,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::new()
        .with_path(cli.config)
        .load()
        .context("failed to load configuration")?;

    match cli.cmd.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config).await,
        Command::Scan => run_scan(config).await,
    }
}

async fn run_server(config: EngineConfig) -> Result<()> {
    info!("learning-engine starting");
    let addr = config
        .server
        .socket_addr()
        .context("invalid server host/port")?;
    let intervention = config.intervention.clone();

    let state = AppState::from_config(config).await?;

    let scanner = if intervention.enabled {
        let scanner = InterventionScanner::from_config(state.log.clone(), &intervention);
        Some(tokio::spawn(scanner.run()))
    } else {
        warn!("intervention scanner disabled");
        None
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local = listener.local_addr()?;
    info!(%local, "learning engine listening");

    tokio::select! {
        result = axum::serve(listener, app) => result?,
        _ = tokio::signal::ctrl_c() => {}
    }

    if let Some(handle) = scanner {
        handle.abort();
    }
    info!("learning-engine shutting down");
    Ok(())
}

async fn run_scan(config: EngineConfig) -> Result<()> {
    let log = config
        .ledger
        .open()
        .await
        .context("failed to open interaction log")?;
    let flagged = InterventionScanner::from_config(log, &config.intervention)
        .scan_once()
        .await?;
    if flagged.is_empty() {
        println!("No students below intervention thresholds.");
    }
    for student in flagged {
        println!(
            "{}\tinteractions={}\tavg_success={:.2}\tavg_engagement={:.2}",
            student.student_id, student.interactions, student.avg_success, student.avg_engagement
        );
    }
    Ok(())
}
