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
use learning_contracts::{CollapseResult, LearningEmotionVector, LearningState, LearningStyleState};
use serde::{Deserialize, Serialize};

/// Payload shared by `POST /api/get-adaptations` and the
/// `adaptations_generated` push event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationsPayload {
    pub adaptations: Vec<String>,
    pub quantum_state: LearningStyleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analogy: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Broadcast to every connected listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    AdaptationsGenerated(AdaptationsPayload),
    QuantumCollapsed(CollapseResult),
}

/// Sent to a single listener only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DirectEvent {
    Connected { message: String },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionUpdate {
    pub emotions: LearningEmotionVector,
    pub learning_state: LearningState,
    pub topic: Option<String>,
}

/// Messages a listener may send over the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    EmotionUpdate(EmotionUpdate),
    QuantumCollapse(Option<serde_json::Value>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_parse_from_wire_names() {
        let update: ClientEvent = serde_json::from_str(
            r#"{"event": "emotion_update", "data": {"emotions": {"frustrated": 0.9}, "learning_state": "struggling"}}"#,
        )
        .unwrap();
        match update {
            ClientEvent::EmotionUpdate(u) => {
                assert_eq!(u.learning_state, LearningState::Struggling);
                assert_eq!(u.emotions.frustrated, 0.9);
                assert_eq!(u.emotions.bored, 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }

        let collapse: ClientEvent =
            serde_json::from_str(r#"{"event": "quantum_collapse", "data": {}}"#).unwrap();
        assert!(matches!(collapse, ClientEvent::QuantumCollapse(_)));
    }

    #[test]
    fn direct_events_carry_event_names() {
        let json = serde_json::to_value(DirectEvent::Error {
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["message"], "boom");
    }
}
