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

//! SQLite-backed interaction log.
//!
//! Timestamps are stored as fixed-width RFC 3339 text (UTC, microseconds) so
//! that lexical order in SQL matches chronological order. Emotion payloads and
//! adaptation lists are stored as JSON text.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use learning_contracts::{InteractionEvent, LearningStyle};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;

use crate::error::{LedgerError, Result};
use crate::log::InteractionLog;
use crate::types::{Aggregate, AggregateWindow, FlaggedStudent, SessionSummary};

const CREATE_SESSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS student_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT NOT NULL,
    session_start TEXT NOT NULL,
    session_end TEXT,
    total_interactions INTEGER NOT NULL DEFAULT 0,
    success_rate REAL NOT NULL DEFAULT 0,
    engagement_score REAL NOT NULL DEFAULT 0,
    optimal_learning_style TEXT,
    emotions_data TEXT
)"#;

const CREATE_INTERACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS interactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    interaction_type TEXT NOT NULL,
    success_rate REAL NOT NULL,
    engagement_level REAL NOT NULL,
    emotions TEXT,
    adaptations_triggered TEXT
)"#;

const CREATE_INTERACTIONS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_interactions_student_time ON interactions (student_id, timestamp)";

const AGGREGATE_COLUMNS: &str = "COUNT(*) AS count, \
     COALESCE(AVG(success_rate), 0.0) AS avg_success, \
     COALESCE(AVG(engagement_level), 0.0) AS avg_engagement, \
     MIN(timestamp) AS first_at, \
     MAX(timestamp) AS last_at";

fn encode_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| LedgerError::invalid_record(format!("timestamp '{raw}': {e}")))
}

fn decode_json(raw: Option<String>) -> Result<serde_json::Value> {
    match raw {
        Some(text) if !text.is_empty() => Ok(serde_json::from_str(&text)?),
        _ => Ok(serde_json::Value::Null),
    }
}

fn decode_style(raw: Option<String>) -> Result<Option<LearningStyle>> {
    raw.map(|s| serde_json::from_value(serde_json::Value::String(s)))
        .transpose()
        .map_err(LedgerError::from)
}

fn event_from_row(row: &SqliteRow) -> Result<InteractionEvent> {
    let timestamp: String = row.try_get("timestamp")?;
    let adaptations = match decode_json(row.try_get("adaptations_triggered")?)? {
        serde_json::Value::Null => Vec::new(),
        other => serde_json::from_value(other)?,
    };
    Ok(InteractionEvent {
        student_id: row.try_get("student_id")?,
        timestamp: decode_time(&timestamp)?,
        interaction_type: row.try_get("interaction_type")?,
        success_rate: row.try_get("success_rate")?,
        engagement_level: row.try_get("engagement_level")?,
        emotions: decode_json(row.try_get("emotions")?)?,
        adaptations_triggered: adaptations,
    })
}

fn aggregate_from_row(row: &SqliteRow) -> Result<Aggregate> {
    let count: i64 = row.try_get("count")?;
    let first_at: Option<String> = row.try_get("first_at")?;
    let last_at: Option<String> = row.try_get("last_at")?;
    Ok(Aggregate {
        count: u64::try_from(count).unwrap_or_default(),
        avg_success: row.try_get("avg_success")?,
        avg_engagement: row.try_get("avg_engagement")?,
        first_at: first_at.as_deref().map(decode_time).transpose()?,
        last_at: last_at.as_deref().map(decode_time).transpose()?,
    })
}

#[derive(Debug, Clone)]
pub struct SqliteInteractionLog {
    pool: SqlitePool,
}

impl SqliteInteractionLog {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    ///
    /// In-memory URLs are pinned to a single long-lived connection, since each
    /// SQLite connection would otherwise see its own empty database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };
        let pool = pool_options.connect_with(options).await?;
        let log = Self { pool };
        log.migrate().await?;
        info!(url, "Interaction log ready");
        Ok(log)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn migrate(&self) -> Result<()> {
        for statement in [CREATE_SESSIONS, CREATE_INTERACTIONS, CREATE_INTERACTIONS_INDEX] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl InteractionLog for SqliteInteractionLog {
    async fn append(&self, event: &InteractionEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO interactions \
             (student_id, timestamp, interaction_type, success_rate, engagement_level, emotions, adaptations_triggered) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.student_id)
        .bind(encode_time(&event.timestamp))
        .bind(&event.interaction_type)
        .bind(event.success_rate)
        .bind(event.engagement_level)
        .bind(serde_json::to_string(&event.emotions)?)
        .bind(serde_json::to_string(&event.adaptations_triggered)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn aggregate(&self, student_id: &str, window: AggregateWindow) -> Result<Aggregate> {
        let row = match window {
            AggregateWindow::Recent(n) => {
                let sql = format!(
                    "SELECT {AGGREGATE_COLUMNS} FROM (\
                     SELECT * FROM interactions WHERE student_id = ? \
                     ORDER BY timestamp DESC, id DESC LIMIT ?)"
                );
                sqlx::query(&sql)
                    .bind(student_id)
                    .bind(i64::try_from(n).unwrap_or(i64::MAX))
                    .fetch_one(&self.pool)
                    .await?
            }
            AggregateWindow::Since(since) => {
                let sql = format!(
                    "SELECT {AGGREGATE_COLUMNS} FROM interactions \
                     WHERE student_id = ? AND timestamp >= ?"
                );
                sqlx::query(&sql)
                    .bind(student_id)
                    .bind(encode_time(&since))
                    .fetch_one(&self.pool)
                    .await?
            }
            AggregateWindow::All => {
                let sql = format!("SELECT {AGGREGATE_COLUMNS} FROM interactions WHERE student_id = ?");
                sqlx::query(&sql)
                    .bind(student_id)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        aggregate_from_row(&row)
    }

    async fn recent(&self, student_id: &str, limit: usize) -> Result<Vec<InteractionEvent>> {
        let rows = sqlx::query(
            "SELECT student_id, timestamp, interaction_type, success_rate, engagement_level, \
             emotions, adaptations_triggered FROM interactions \
             WHERE student_id = ? ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(student_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn flagged_students(
        &self,
        since: DateTime<Utc>,
        success_floor: f64,
        engagement_floor: f64,
    ) -> Result<Vec<FlaggedStudent>> {
        let rows = sqlx::query(
            "SELECT student_id, COUNT(*) AS count, \
             AVG(success_rate) AS avg_success, AVG(engagement_level) AS avg_engagement \
             FROM interactions WHERE timestamp >= ? \
             GROUP BY student_id \
             HAVING avg_success < ? OR avg_engagement < ? \
             ORDER BY student_id",
        )
        .bind(encode_time(&since))
        .bind(success_floor)
        .bind(engagement_floor)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<FlaggedStudent> {
                let count: i64 = row.try_get("count")?;
                Ok(FlaggedStudent {
                    student_id: row.try_get("student_id")?,
                    interactions: u64::try_from(count).unwrap_or_default(),
                    avg_success: row.try_get("avg_success")?,
                    avg_engagement: row.try_get("avg_engagement")?,
                })
            })
            .collect()
    }

    async fn record_session(&self, summary: &SessionSummary) -> Result<()> {
        sqlx::query(
            "INSERT INTO student_sessions \
             (student_id, session_start, session_end, total_interactions, success_rate, \
              engagement_score, optimal_learning_style, emotions_data) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&summary.student_id)
        .bind(encode_time(&summary.session_start))
        .bind(encode_time(&summary.session_end))
        .bind(i64::try_from(summary.total_interactions).unwrap_or(i64::MAX))
        .bind(summary.success_rate)
        .bind(summary.engagement_score)
        .bind(summary.optimal_learning_style.map(|s| s.as_str()))
        .bind(serde_json::to_string(&summary.emotions_data)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn sessions(&self, student_id: &str) -> Result<Vec<SessionSummary>> {
        let rows = sqlx::query(
            "SELECT student_id, session_start, session_end, total_interactions, success_rate, \
             engagement_score, optimal_learning_style, emotions_data \
             FROM student_sessions WHERE student_id = ? ORDER BY id",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SessionSummary> {
                let start: String = row.try_get("session_start")?;
                let end: Option<String> = row.try_get("session_end")?;
                let total: i64 = row.try_get("total_interactions")?;
                let session_start = decode_time(&start)?;
                Ok(SessionSummary {
                    student_id: row.try_get("student_id")?,
                    session_start,
                    session_end: end
                        .as_deref()
                        .map(decode_time)
                        .transpose()?
                        .unwrap_or(session_start),
                    total_interactions: u64::try_from(total).unwrap_or_default(),
                    success_rate: row.try_get("success_rate")?,
                    engagement_score: row.try_get("engagement_score")?,
                    optimal_learning_style: decode_style(row.try_get("optimal_learning_style")?)?,
                    emotions_data: decode_json(row.try_get("emotions_data")?)?,
                })
            })
            .collect()
    }
}
