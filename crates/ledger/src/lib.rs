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

//! Interaction history: the append-only log of learner actions, session
//! roll-ups, and the background scan that flags struggling students.

pub mod config;
pub mod error;
pub mod log;
pub mod memory;
pub mod scanner;
pub mod sqlite;
pub mod types;

pub use config::{LedgerBackend, LedgerConfig};
pub use error::{LedgerError, Result};
pub use log::{append_detached, close_session, InteractionLog};
pub use memory::MemoryInteractionLog;
pub use scanner::{InterventionConfig, InterventionScanner};
pub use sqlite::SqliteInteractionLog;
pub use types::{Aggregate, AggregateWindow, FlaggedStudent, SessionSummary};
