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

use chrono::{DateTime, Utc};
use learning_contracts::LearningStyle;
use serde::{Deserialize, Serialize};

/// Which slice of a student's history an aggregate covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateWindow {
    /// The `n` most recent interactions.
    Recent(usize),
    /// Interactions at or after the instant.
    Since(DateTime<Utc>),
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregate {
    pub count: u64,
    pub avg_success: f64,
    pub avg_engagement: f64,
    pub first_at: Option<DateTime<Utc>>,
    pub last_at: Option<DateTime<Utc>>,
}

impl Aggregate {
    /// Folds `(timestamp, success, engagement)` triples. Empty input gives zeros.
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, f64, f64)>,
    {
        let mut agg = Aggregate::default();
        let (mut success, mut engagement) = (0.0, 0.0);
        for (at, s, e) in samples {
            agg.count += 1;
            success += s;
            engagement += e;
            agg.first_at = Some(agg.first_at.map_or(at, |f| f.min(at)));
            agg.last_at = Some(agg.last_at.map_or(at, |l| l.max(at)));
        }
        if agg.count > 0 {
            agg.avg_success = success / agg.count as f64;
            agg.avg_engagement = engagement / agg.count as f64;
        }
        agg
    }
}

/// A student whose recent averages fell below an intervention floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedStudent {
    pub student_id: String,
    pub interactions: u64,
    pub avg_success: f64,
    pub avg_engagement: f64,
}

/// Persisted roll-up of one learning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub student_id: String,
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    pub total_interactions: u64,
    pub success_rate: f64,
    pub engagement_score: f64,
    pub optimal_learning_style: Option<LearningStyle>,
    #[serde(default)]
    pub emotions_data: serde_json::Value,
}
