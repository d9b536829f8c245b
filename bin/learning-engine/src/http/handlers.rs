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

use axum::{
    extract::{Multipart, Path, State},
    response::Html,
    Json,
};
use chrono::{DateTime, Utc};
use learning_contracts::{
    InteractionEvent, InteractionSignal, LearningEmotionVector, LearningStyleState,
    ANONYMOUS_STUDENT, UNKNOWN_INTERACTION,
};
use ledger::{AggregateWindow, SessionSummary};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::events::{AdaptationsPayload, EmotionUpdate};
use crate::http::error::ApiError;
use crate::http::extract::ApiJson;
use crate::AppState;

/// Interactions read for analytics.
pub const ANALYTICS_WINDOW: usize = 50;
/// Interactions echoed back in analytics responses.
pub const RECENT_INTERACTIONS: usize = 10;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

fn ok<T: Serialize>(body: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        body,
    })
}

#[derive(Debug, Serialize)]
pub struct DetectEmotionBody {
    pub emotions: LearningEmotionVector,
    pub face_detected: bool,
    pub timestamp: DateTime<Utc>,
}

pub async fn detect_emotion(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<DetectEmotionBody>>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("image") {
            upload = Some(field.bytes().await?);
            break;
        }
    }
    let bytes = upload.ok_or_else(|| ApiError::bad_request("MISSING_IMAGE", "No image provided"))?;

    let pipeline = state.pipeline.clone();
    let inference = tokio::task::spawn_blocking(move || {
        affect::frame::decode(&bytes).map(|frame| pipeline.infer(&frame))
    })
    .await?
    .map_err(|e| ApiError::bad_request("INVALID_IMAGE", format!("Invalid image: {e}")))?;
    debug!(face_detected = inference.face_detected, "frame analysed");

    Ok(ok(DetectEmotionBody {
        emotions: inference.emotions,
        face_detected: inference.face_detected,
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuantumUpdateRequest {
    pub student_id: String,
    pub interaction_type: String,
    pub success_rate: f64,
    pub engagement_level: f64,
    pub emotions: serde_json::Value,
    pub adaptations_triggered: Vec<String>,
}

impl Default for QuantumUpdateRequest {
    fn default() -> Self {
        Self {
            student_id: ANONYMOUS_STUDENT.to_string(),
            interaction_type: UNKNOWN_INTERACTION.to_string(),
            success_rate: 0.5,
            engagement_level: 0.5,
            emotions: serde_json::Value::Object(Default::default()),
            adaptations_triggered: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuantumStateBody {
    pub quantum_state: LearningStyleState,
    pub timestamp: DateTime<Utc>,
}

pub async fn quantum_update(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<QuantumUpdateRequest>,
) -> Result<Json<Envelope<QuantumStateBody>>, ApiError> {
    let signal = InteractionSignal::new(
        request.interaction_type,
        request.success_rate,
        request.engagement_level,
    );
    signal.validate()?;

    let quantum_state = state.estimator.write().await.update(&signal);

    let event = InteractionEvent::new(
        request.student_id,
        &signal,
        request.emotions,
        request.adaptations_triggered,
    );
    ledger::append_detached(state.log.clone(), event);

    Ok(ok(QuantumStateBody {
        quantum_state,
        timestamp: Utc::now(),
    }))
}

/// Rule output for `update` against the current estimator snapshot.
pub async fn adaptations_for(state: &AppState, update: &EmotionUpdate) -> AdaptationsPayload {
    let quantum_state = state.estimator.read().await.snapshot();
    let adaptations = state
        .engine
        .generate(&update.emotions, update.learning_state, &quantum_state);
    let analogy = update
        .topic
        .as_deref()
        .and_then(|topic| state.engine.phrases().analogy(topic))
        .map(str::to_string);
    AdaptationsPayload {
        adaptations,
        quantum_state,
        analogy,
        timestamp: Utc::now(),
    }
}

pub async fn get_adaptations(
    State(state): State<AppState>,
    ApiJson(update): ApiJson<EmotionUpdate>,
) -> Json<Envelope<AdaptationsPayload>> {
    ok(adaptations_for(&state, &update).await)
}

#[derive(Debug, Serialize)]
pub struct StudentAnalytics {
    pub total_interactions: u64,
    pub avg_success_rate: f64,
    pub avg_engagement: f64,
    pub quantum_state: LearningStyleState,
    pub recent_interactions: Vec<InteractionEvent>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsBody {
    pub analytics: StudentAnalytics,
    pub timestamp: DateTime<Utc>,
}

pub async fn student_analytics(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<Envelope<AnalyticsBody>>, ApiError> {
    let aggregate = state
        .log
        .aggregate(&student_id, AggregateWindow::Recent(ANALYTICS_WINDOW))
        .await?;
    let recent_interactions = state.log.recent(&student_id, RECENT_INTERACTIONS).await?;
    let quantum_state = state.estimator.read().await.snapshot();

    Ok(ok(AnalyticsBody {
        analytics: StudentAnalytics {
            total_interactions: aggregate.count,
            avg_success_rate: aggregate.avg_success,
            avg_engagement: aggregate.avg_engagement,
            quantum_state,
            recent_interactions,
        },
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSummaryRequest {
    pub student_id: String,
    pub session_start: Option<DateTime<Utc>>,
    pub emotions: serde_json::Value,
}

impl Default for SessionSummaryRequest {
    fn default() -> Self {
        Self {
            student_id: ANONYMOUS_STUDENT.to_string(),
            session_start: None,
            emotions: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionBody {
    pub session: SessionSummary,
    pub timestamp: DateTime<Utc>,
}

pub async fn session_summary(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SessionSummaryRequest>,
) -> Result<Json<Envelope<SessionBody>>, ApiError> {
    let optimal_style = state.estimator.read().await.snapshot().optimal_style;
    let session = ledger::close_session(
        state.log.as_ref(),
        &request.student_id,
        request.session_start,
        optimal_style,
        request.emotions,
    )
    .await?;
    info!(
        student_id = %session.student_id,
        interactions = session.total_interactions,
        "session summarised"
    );
    Ok(ok(SessionBody {
        session,
        timestamp: Utc::now(),
    }))
}

const FALLBACK_INDEX: &str = r#"<!DOCTYPE html>
<html>
<head><title>Adaptive Learning Engine</title></head>
<body>
<h1>Adaptive Learning Engine</h1>
<p>The learning platform page is not installed. Available endpoints:</p>
<ul>
<li>POST /api/detect-emotion</li>
<li>POST /api/quantum-update</li>
<li>POST /api/get-adaptations</li>
<li>GET /api/student-analytics/{student_id}</li>
<li>POST /api/session-summary</li>
<li>GET /ws</li>
</ul>
</body>
</html>
"#;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    if let Some(path) = &state.config.server.index_html {
        match tokio::fs::read_to_string(path).await {
            Ok(page) => return Html(page),
            Err(e) => debug!(path = %path.display(), error = %e, "index page unavailable"),
        }
    }
    Html(FALLBACK_INDEX.to_string())
}
