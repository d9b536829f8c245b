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
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::Result;
use crate::log::InteractionLog;
use crate::types::FlaggedStudent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterventionConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub backoff_secs: u64,
    pub window_secs: u64,
    pub success_floor: f64,
    pub engagement_floor: f64,
}

impl Default for InterventionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            backoff_secs: 60,
            window_secs: 3600,
            success_floor: 0.3,
            engagement_floor: 0.3,
        }
    }
}

/// Periodically looks for students whose recent averages call for an
/// intervention. Only reads from the log.
pub struct InterventionScanner {
    log: Arc<dyn InteractionLog>,
    interval: Duration,
    backoff: Duration,
    window: Duration,
    success_floor: f64,
    engagement_floor: f64,
}

impl InterventionScanner {
    pub fn new(log: Arc<dyn InteractionLog>) -> Self {
        Self::from_config(log, &InterventionConfig::default())
    }

    pub fn from_config(log: Arc<dyn InteractionLog>, config: &InterventionConfig) -> Self {
        Self {
            log,
            interval: Duration::from_secs(config.interval_secs),
            backoff: Duration::from_secs(config.backoff_secs),
            window: Duration::from_secs(config.window_secs),
            success_floor: config.success_floor,
            engagement_floor: config.engagement_floor,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub async fn scan_once(&self) -> Result<Vec<FlaggedStudent>> {
        // windows reaching past the earliest representable instant cover all history
        let since = chrono::Duration::from_std(self.window)
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.log
            .flagged_students(since, self.success_floor, self.engagement_floor)
            .await
    }

    /// Scans forever. A failed cycle waits `backoff` instead of `interval`
    /// and the loop carries on.
    pub async fn run(self) {
        info!(
            interval = ?self.interval,
            backoff = ?self.backoff,
            window = ?self.window,
            "Starting intervention scanner"
        );
        let mut consecutive_failures: u32 = 0;
        loop {
            let delay = match self.scan_once().await {
                Ok(flagged) => {
                    if consecutive_failures > 0 {
                        info!(after = consecutive_failures, "Intervention scan recovered");
                    }
                    consecutive_failures = 0;
                    for student in &flagged {
                        info!(
                            student_id = %student.student_id,
                            avg_success = student.avg_success,
                            avg_engagement = student.avg_engagement,
                            "Student may need intervention"
                        );
                    }
                    self.interval
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        attempt = consecutive_failures,
                        error = %e,
                        "Intervention scan failed, backing off"
                    );
                    self.backoff
                }
            };
            tokio::time::sleep(delay).await;
        }
    }
}
