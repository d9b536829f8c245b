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
use learning_contracts::InteractionEvent;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::log::InteractionLog;
use crate::types::{Aggregate, AggregateWindow, FlaggedStudent, SessionSummary};

/// Process-local log. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryInteractionLog {
    interactions: RwLock<Vec<InteractionEvent>>,
    sessions: RwLock<Vec<SessionSummary>>,
}

impl MemoryInteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.interactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.interactions.read().await.is_empty()
    }
}

/// Student's events, newest first; later appends win timestamp ties.
fn newest_first<'a>(events: &'a [InteractionEvent], student_id: &str) -> Vec<&'a InteractionEvent> {
    let mut selected: Vec<&InteractionEvent> = events
        .iter()
        .rev()
        .filter(|e| e.student_id == student_id)
        .collect();
    selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    selected
}

#[async_trait]
impl InteractionLog for MemoryInteractionLog {
    async fn append(&self, event: &InteractionEvent) -> Result<()> {
        self.interactions.write().await.push(event.clone());
        Ok(())
    }

    async fn aggregate(&self, student_id: &str, window: AggregateWindow) -> Result<Aggregate> {
        let events = self.interactions.read().await;
        let ordered = newest_first(&events, student_id);
        let selected: Vec<&InteractionEvent> = match window {
            AggregateWindow::Recent(n) => ordered.into_iter().take(n).collect(),
            AggregateWindow::Since(since) => ordered
                .into_iter()
                .filter(|e| e.timestamp >= since)
                .collect(),
            AggregateWindow::All => ordered,
        };
        Ok(Aggregate::from_samples(
            selected
                .into_iter()
                .map(|e| (e.timestamp, e.success_rate, e.engagement_level)),
        ))
    }

    async fn recent(&self, student_id: &str, limit: usize) -> Result<Vec<InteractionEvent>> {
        let events = self.interactions.read().await;
        Ok(newest_first(&events, student_id)
            .into_iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn flagged_students(
        &self,
        since: DateTime<Utc>,
        success_floor: f64,
        engagement_floor: f64,
    ) -> Result<Vec<FlaggedStudent>> {
        let events = self.interactions.read().await;
        let mut by_student: BTreeMap<&str, Vec<&InteractionEvent>> = BTreeMap::new();
        for event in events.iter().filter(|e| e.timestamp >= since) {
            by_student.entry(event.student_id.as_str()).or_default().push(event);
        }
        Ok(by_student
            .into_iter()
            .filter_map(|(student_id, events)| {
                let agg = Aggregate::from_samples(
                    events
                        .into_iter()
                        .map(|e| (e.timestamp, e.success_rate, e.engagement_level)),
                );
                (agg.avg_success < success_floor || agg.avg_engagement < engagement_floor).then(
                    || FlaggedStudent {
                        student_id: student_id.to_string(),
                        interactions: agg.count,
                        avg_success: agg.avg_success,
                        avg_engagement: agg.avg_engagement,
                    },
                )
            })
            .collect())
    }

    async fn record_session(&self, summary: &SessionSummary) -> Result<()> {
        self.sessions.write().await.push(summary.clone());
        Ok(())
    }

    async fn sessions(&self, student_id: &str) -> Result<Vec<SessionSummary>> {
        Ok(self
            .sessions
            .read()
            .await
            .iter()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect())
    }
}
