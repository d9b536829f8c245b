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

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learning_contracts::{InteractionEvent, LearningStyle};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{Aggregate, AggregateWindow, FlaggedStudent, SessionSummary};

/// Append-only record of student interactions plus the read queries the
/// analytics and intervention paths need.
#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn append(&self, event: &InteractionEvent) -> Result<()>;

    async fn aggregate(&self, student_id: &str, window: AggregateWindow) -> Result<Aggregate>;

    /// Newest first.
    async fn recent(&self, student_id: &str, limit: usize) -> Result<Vec<InteractionEvent>>;

    /// Students whose averages since `since` fall below either floor.
    async fn flagged_students(
        &self,
        since: DateTime<Utc>,
        success_floor: f64,
        engagement_floor: f64,
    ) -> Result<Vec<FlaggedStudent>>;

    async fn record_session(&self, summary: &SessionSummary) -> Result<()>;

    /// Oldest first.
    async fn sessions(&self, student_id: &str) -> Result<Vec<SessionSummary>>;
}

/// Appends on a background task. Failures are logged and never reach the caller.
pub fn append_detached(log: Arc<dyn InteractionLog>, event: InteractionEvent) -> JoinHandle<()> {
    tokio::spawn(async move {
        match log.append(&event).await {
            Ok(()) => debug!(student_id = %event.student_id, "Interaction stored"),
            Err(e) => warn!(
                student_id = %event.student_id,
                error = %e,
                "Failed to store interaction"
            ),
        }
    })
}

/// Rolls up a student's interactions from `session_start` (or their first
/// logged interaction) to now and persists the summary.
pub async fn close_session(
    log: &dyn InteractionLog,
    student_id: &str,
    session_start: Option<DateTime<Utc>>,
    optimal_learning_style: Option<LearningStyle>,
    emotions_data: serde_json::Value,
) -> Result<SessionSummary> {
    let window = session_start.map_or(AggregateWindow::All, AggregateWindow::Since);
    let aggregate = log.aggregate(student_id, window).await?;
    let session_end = Utc::now();

    let summary = SessionSummary {
        student_id: student_id.to_string(),
        session_start: session_start
            .or(aggregate.first_at)
            .unwrap_or(session_end),
        session_end,
        total_interactions: aggregate.count,
        success_rate: aggregate.avg_success,
        engagement_score: aggregate.avg_engagement,
        optimal_learning_style,
        emotions_data,
    };
    log.record_session(&summary).await?;
    Ok(summary)
}
