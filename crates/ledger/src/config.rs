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

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::log::InteractionLog;
use crate::memory::MemoryInteractionLog;
use crate::sqlite::SqliteInteractionLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    pub url: String,
    pub max_connections: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Sqlite,
            url: "sqlite://learning_data.db".to_string(),
            max_connections: 5,
        }
    }
}

impl LedgerConfig {
    pub fn memory() -> Self {
        Self {
            backend: LedgerBackend::Memory,
            ..Default::default()
        }
    }

    pub async fn open(&self) -> Result<Arc<dyn InteractionLog>> {
        Ok(match self.backend {
            LedgerBackend::Memory => Arc::new(MemoryInteractionLog::new()),
            LedgerBackend::Sqlite => {
                Arc::new(SqliteInteractionLog::connect(&self.url, self.max_connections).await?)
            }
        })
    }
}
