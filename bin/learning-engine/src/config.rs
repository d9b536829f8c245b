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

//! Layered service configuration.
//!
//! Sources, lowest precedence first: built-in defaults, the TOML file
//! (`config/learning-engine.toml` unless `--config`/`LE_CONFIG` points
//! elsewhere), `LE__SECTION__KEY` environment variables, then `PORT`.

use adapt::AdaptationThresholds;
use affect::InferenceConfig;
use config::{Config, ConfigError, Environment, File};
use ledger::{InterventionConfig, LedgerConfig};
use quanta::EstimatorConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "config/learning-engine.toml";
const ENV_PREFIX: &str = "LE";
const ENV_CONFIG_PATH: &str = "LE_CONFIG";
const ENV_PORT: &str = "PORT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for request bodies, camera frames included.
    pub body_limit_bytes: usize,
    /// Page served at `/`; a generated endpoint listing is used when absent.
    pub index_html: Option<PathBuf>,
    /// Capacity of the push channel shared by all WebSocket listeners.
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            body_limit_bytes: 8 * 1024 * 1024,
            index_html: Some(PathBuf::from("quantum_learning_platform.html")),
            event_buffer: 1000,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    pub phrases_path: Option<PathBuf>,
    pub thresholds: AdaptationThresholds,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub inference: InferenceConfig,
    pub estimator: EstimatorConfig,
    pub adaptation: AdaptationConfig,
    pub ledger: LedgerConfig,
    pub intervention: InterventionConfig,
}

impl EngineConfig {
    /// Defaults with an in-memory ledger and no background scan.
    pub fn ephemeral() -> Self {
        let mut config = Self::default();
        config.ledger = LedgerConfig::memory();
        config.intervention.enabled = false;
        config.server.index_html = None;
        config
    }
}

/// Builds an [`EngineConfig`] from file and environment.
///
/// The environment can be replaced with an explicit map so loading is
/// reproducible in tests.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: Option<PathBuf>) -> Self {
        self.path = path;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    fn var(&self, key: &str) -> Option<String> {
        match &self.env {
            Some(env) => env.get(key).cloned(),
            None => std::env::var(key).ok(),
        }
    }

    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        // an explicitly named file must exist, the default one may not
        let (path, required) = match self.path.clone().or_else(|| self.var(ENV_CONFIG_PATH).map(PathBuf::from)) {
            Some(path) => (path, true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true);
        if let Some(env) = &self.env {
            environment = environment.source(Some(env.clone().into_iter().collect()));
        }

        let config = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(environment)
            .set_override_option("server.port", self.var(ENV_PORT))?
            .build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.body_limit_bytes, 8 * 1024 * 1024);
        assert_eq!(config.estimator.collapse_threshold, 0.65);
        assert_eq!(config.intervention.interval_secs, 30);
        assert_eq!(config.intervention.backoff_secs, 60);
        assert_eq!(config.inference.min_neighbors, 4);
    }
}
