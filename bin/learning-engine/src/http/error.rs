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
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use learning_contracts::ContractError;
use ledger::LedgerError;
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

/// JSON error body: `{success: false, error, code, request_id}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    #[serde(rename = "error")]
    pub message: String,
    pub code: String,
    pub request_id: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ApiError {
    pub fn new<S: Into<String>>(status: StatusCode, code: &str, message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: code.to_string(),
            request_id: Uuid::new_v4().to_string(),
            status,
        }
    }

    pub fn bad_request<S: Into<String>>(code: &str, message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn internal<S: Into<String>>(code: &str, message: S) -> Self {
        let err = Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message);
        error!(code = %err.code, request_id = %err.request_id, message = %err.message, "request failed");
        err
    }
}

impl From<ContractError> for ApiError {
    fn from(e: ContractError) -> Self {
        Self::bad_request("INVALID_INTERACTION", e.to_string())
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        Self::internal("PERSISTENCE_ERROR", e.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::bad_request("INVALID_UPLOAD", e.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::new(e.status(), "INVALID_JSON", e.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal("INFERENCE_FAILED", e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(self);
        (status, body).into_response()
    }
}
