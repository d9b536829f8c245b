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

//! Adaptive learning engine service: HTTP and WebSocket surface over emotion
//! inference, the learning-style estimator, the adaptation rules and the
//! interaction log.

pub mod config;
pub mod events;
pub mod http;

use adapt::{AdaptationEngine, PhraseBook};
use affect::EmotionPipeline;
use anyhow::{Context, Result};
use ledger::InteractionLog;
use quanta::LearningStyleEstimator;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

use crate::config::EngineConfig;
use crate::events::PushEvent;

#[derive(Clone)]
pub struct AppState {
    /// Single process-wide estimator; every update holds the write lock for
    /// the whole read-modify-renormalise step.
    pub estimator: Arc<RwLock<LearningStyleEstimator>>,
    pub pipeline: Arc<EmotionPipeline>,
    pub engine: Arc<AdaptationEngine>,
    pub log: Arc<dyn InteractionLog>,
    pub events: broadcast::Sender<PushEvent>,
    pub config: Arc<EngineConfig>,
}

impl AppState {
    pub fn new(
        config: EngineConfig,
        estimator: LearningStyleEstimator,
        pipeline: EmotionPipeline,
        engine: AdaptationEngine,
        log: Arc<dyn InteractionLog>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.server.event_buffer.max(1));
        Self {
            estimator: Arc::new(RwLock::new(estimator)),
            pipeline: Arc::new(pipeline),
            engine: Arc::new(engine),
            log,
            events,
            config: Arc::new(config),
        }
    }

    /// Loads models, phrases and storage named by `config`.
    pub async fn from_config(config: EngineConfig) -> Result<Self> {
        let estimator = LearningStyleEstimator::new(config.estimator.clone())
            .context("invalid estimator configuration")?;
        let pipeline = EmotionPipeline::from_config(&config.inference)
            .context("failed to load emotion models")?;

        let phrases = match &config.adaptation.phrases_path {
            Some(path) => PhraseBook::load_from_file(path)
                .with_context(|| format!("failed to load phrase book {}", path.display()))?,
            None => PhraseBook::default(),
        };
        let engine = AdaptationEngine::new(phrases, config.adaptation.thresholds);

        let log = config
            .ledger
            .open()
            .await
            .context("failed to open interaction log")?;

        info!(backend = ?config.ledger.backend, "engine state initialised");
        Ok(Self::new(config, estimator, pipeline, engine, log))
    }

    /// Sends to every listener. Having no listeners is not an error.
    pub fn publish(&self, event: PushEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }
}
