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

use learning_contracts::{
    CollapseResult, InteractionSignal, LearningStyle, LearningStyleState, StyleProbabilities,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

const PRIOR_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum EstimatorError {
    #[error("prior probabilities must be finite and non-negative with a positive sum: {0:?}")]
    InvalidPrior(StyleProbabilities),
    #[error("reinforcement factor must be finite and non-negative, got {0}")]
    InvalidReinforcement(f64),
    #[error("collapse threshold must lie in (0, 1], got {0}")]
    InvalidThreshold(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub prior: StyleProbabilities,
    /// Multiplier applied as `1 + success * reinforcement` to the matched style.
    pub reinforcement: f64,
    /// Strict lower bound the leading probability must exceed to collapse.
    pub collapse_threshold: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            prior: StyleProbabilities::default(),
            reinforcement: 0.3,
            collapse_threshold: 0.65,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<(), EstimatorError> {
        let prior_ok = LearningStyle::ALL.iter().all(|s| {
            let p = self.prior.get(*s);
            p.is_finite() && p >= 0.0
        }) && self.prior.total() > 0.0;
        if !prior_ok {
            return Err(EstimatorError::InvalidPrior(self.prior));
        }
        if !self.reinforcement.is_finite() || self.reinforcement < 0.0 {
            return Err(EstimatorError::InvalidReinforcement(self.reinforcement));
        }
        if !(self.collapse_threshold > 0.0 && self.collapse_threshold <= 1.0) {
            return Err(EstimatorError::InvalidThreshold(self.collapse_threshold));
        }
        Ok(())
    }
}

/// Probabilistic estimate of a learner's preferred modality.
///
/// Each recognised interaction reinforces one style and the vector is
/// renormalised. The first time the leading style clears the collapse
/// threshold the estimator "collapses": the optimal style and its confidence
/// are frozen. Later updates keep moving the probabilities but never the
/// frozen pair; only [`force_collapse`](Self::force_collapse) rewrites it.
#[derive(Debug, Clone)]
pub struct LearningStyleEstimator {
    config: EstimatorConfig,
    probabilities: StyleProbabilities,
    collapsed: bool,
    optimal_style: Option<LearningStyle>,
    confidence: f64,
    updates: u64,
}

impl Default for LearningStyleEstimator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl LearningStyleEstimator {
    pub fn new(config: EstimatorConfig) -> Result<Self, EstimatorError> {
        config.validate()?;
        let mut probabilities = config.prior;
        if (probabilities.total() - 1.0).abs() > PRIOR_TOLERANCE {
            probabilities.normalise();
        }
        Ok(Self {
            config,
            probabilities,
            collapsed: false,
            optimal_style: None,
            confidence: 0.0,
            updates: 0,
        })
    }

    pub fn with_defaults() -> Self {
        let config = EstimatorConfig::default();
        Self {
            probabilities: config.prior,
            config,
            collapsed: false,
            optimal_style: None,
            confidence: 0.0,
            updates: 0,
        }
    }

    pub fn update(&mut self, signal: &InteractionSignal) -> LearningStyleState {
        let Some(style) = signal.style() else {
            debug!(
                interaction_type = %signal.interaction_type,
                "interaction outside the style vocabulary, estimator unchanged"
            );
            return self.snapshot();
        };

        *self.probabilities.get_mut(style) *= 1.0 + signal.success * self.config.reinforcement;
        self.probabilities.normalise();
        self.updates += 1;

        let (_, leading) = self.probabilities.argmax();
        if leading > self.config.collapse_threshold && !self.collapsed {
            let result = self.collapse();
            info!(
                style = %result.optimal_style,
                confidence = result.confidence,
                updates = self.updates,
                "learning style collapsed"
            );
        }

        self.snapshot()
    }

    pub fn snapshot(&self) -> LearningStyleState {
        LearningStyleState {
            learning_styles: self.probabilities,
            collapsed: self.collapsed,
            optimal_style: self.optimal_style,
            confidence: self.confidence,
        }
    }

    /// Collapses onto the current leader regardless of threshold, replacing
    /// any earlier collapse.
    pub fn force_collapse(&mut self) -> CollapseResult {
        let result = self.collapse();
        info!(
            style = %result.optimal_style,
            confidence = result.confidence,
            "learning style collapse forced"
        );
        result
    }

    fn collapse(&mut self) -> CollapseResult {
        let (style, probability) = self.probabilities.argmax();
        self.collapsed = true;
        self.optimal_style = Some(style);
        self.confidence = probability;
        CollapseResult {
            collapsed: true,
            optimal_style: style,
            confidence: probability,
            learning_styles: self.probabilities,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn update_count(&self) -> u64 {
        self.updates
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }
}
