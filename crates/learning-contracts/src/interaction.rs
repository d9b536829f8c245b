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
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::style::LearningStyle;

pub const ANONYMOUS_STUDENT: &str = "anonymous";
pub const UNKNOWN_INTERACTION: &str = "unknown";

#[derive(Debug, Error, PartialEq)]
pub enum ContractError {
    #[error("{field} must be a finite number in [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Coarse learner state supplied by the client alongside emotions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningState {
    #[default]
    Neutral,
    Struggling,
    Disengaged,
    #[serde(other)]
    Other,
}

/// The part of an interaction the learning-style estimator consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionSignal {
    #[serde(rename = "type")]
    pub interaction_type: String,
    pub success: f64,
    pub engagement: f64,
}

impl InteractionSignal {
    pub fn new(interaction_type: impl Into<String>, success: f64, engagement: f64) -> Self {
        Self {
            interaction_type: interaction_type.into(),
            success,
            engagement,
        }
    }

    pub fn style(&self) -> Option<LearningStyle> {
        LearningStyle::from_interaction(&self.interaction_type)
    }

    pub fn validate(&self) -> Result<(), ContractError> {
        check_unit("success_rate", self.success)?;
        check_unit("engagement_level", self.engagement)
    }
}

impl Default for InteractionSignal {
    fn default() -> Self {
        Self::new(UNKNOWN_INTERACTION, 0.5, 0.5)
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ContractError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ContractError::OutOfRange { field, value })
    }
}

/// One logged learner action. Immutable once handed to the interaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub student_id: String,
    pub timestamp: DateTime<Utc>,
    pub interaction_type: String,
    pub success_rate: f64,
    pub engagement_level: f64,
    pub emotions: serde_json::Value,
    pub adaptations_triggered: Vec<String>,
}

impl InteractionEvent {
    pub fn new(
        student_id: impl Into<String>,
        signal: &InteractionSignal,
        emotions: serde_json::Value,
        adaptations_triggered: Vec<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            timestamp: Utc::now(),
            interaction_type: signal.interaction_type.clone(),
            success_rate: signal.success,
            engagement_level: signal.engagement,
            emotions,
            adaptations_triggered,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn signal(&self) -> InteractionSignal {
        InteractionSignal::new(
            self.interaction_type.clone(),
            self.success_rate,
            self.engagement_level,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_learning_states_deserialise_as_other() {
        let s: LearningState = serde_json::from_str(r#""daydreaming""#).unwrap();
        assert_eq!(s, LearningState::Other);
        let s: LearningState = serde_json::from_str(r#""struggling""#).unwrap();
        assert_eq!(s, LearningState::Struggling);
    }

    #[test]
    fn validate_rejects_out_of_range_rates() {
        assert!(InteractionSignal::new("hands_on", 1.0, 0.0).validate().is_ok());
        assert_eq!(
            InteractionSignal::new("hands_on", 1.2, 0.5).validate(),
            Err(ContractError::OutOfRange {
                field: "success_rate",
                value: 1.2
            })
        );
        assert!(InteractionSignal::new("hands_on", 0.5, f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn event_round_trips_its_signal() {
        let signal = InteractionSignal::new("image_click", 0.8, 0.6);
        let event = InteractionEvent::new("s1", &signal, serde_json::json!({}), vec![]);
        assert_eq!(event.signal(), signal);
        assert_eq!(event.signal().style(), Some(LearningStyle::Visual));
    }
}
