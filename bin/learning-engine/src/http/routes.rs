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
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::http::{handlers, ws};
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/detect-emotion", post(handlers::detect_emotion))
        .route("/api/quantum-update", post(handlers::quantum_update))
        .route("/api/get-adaptations", post(handlers::get_adaptations))
        .route(
            "/api/student-analytics/{student_id}",
            get(handlers::student_analytics),
        )
        .route("/api/session-summary", post(handlers::session_summary))
        .route("/ws", get(ws::ws_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
