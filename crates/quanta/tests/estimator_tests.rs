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

use anyhow::Result;
use learning_contracts::{InteractionSignal, LearningStyle};
use quanta::{EstimatorConfig, LearningStyleEstimator};
use std::sync::Arc;
use tokio::sync::RwLock;

fn visual(success: f64) -> InteractionSignal {
    InteractionSignal::new("visual_content", success, 0.7)
}

fn auditory(success: f64) -> InteractionSignal {
    InteractionSignal::new("audio_played", success, 0.7)
}

#[test]
fn test_probabilities_sum_to_one_after_every_update() {
    let mut estimator = LearningStyleEstimator::with_defaults();
    let kinds = [
        "image_click",
        "voice_response",
        "hands_on",
        "quiz_answered",
        "interactive_activity",
        "visual_content",
    ];
    for (i, kind) in kinds.iter().cycle().take(60).enumerate() {
        let success = (i % 11) as f64 / 10.0;
        let state = estimator.update(&InteractionSignal::new(*kind, success, 0.5));
        assert!(
            (state.learning_styles.total() - 1.0).abs() < 1e-9,
            "sum drifted to {} after update {i}",
            state.learning_styles.total()
        );
    }
}

#[test]
fn test_three_visual_updates_do_not_reach_default_threshold() {
    let mut estimator = LearningStyleEstimator::with_defaults();
    let mut state = estimator.snapshot();
    for _ in 0..3 {
        state = estimator.update(&visual(0.9));
    }
    assert!((state.learning_styles.visual - 0.5022).abs() < 1e-3);
    assert!(!state.collapsed);
    assert_eq!(state.optimal_style, None);
}

#[test]
fn test_six_visual_updates_collapse_onto_visual() {
    let mut estimator = LearningStyleEstimator::with_defaults();
    for _ in 0..5 {
        assert!(!estimator.update(&visual(0.9)).collapsed);
    }
    let state = estimator.update(&visual(0.9));
    assert!(state.learning_styles.visual > 0.65);
    assert!(state.collapsed);
    assert_eq!(state.optimal_style, Some(LearningStyle::Visual));
    assert_eq!(state.confidence, state.learning_styles.visual);
}

#[test]
fn test_three_visual_updates_collapse_with_lower_threshold() -> Result<()> {
    let mut estimator = LearningStyleEstimator::new(EstimatorConfig {
        collapse_threshold: 0.5,
        ..Default::default()
    })?;
    assert!(!estimator.update(&visual(0.9)).collapsed);
    assert!(!estimator.update(&visual(0.9)).collapsed);
    let state = estimator.update(&visual(0.9));
    assert!(state.collapsed);
    assert_eq!(state.optimal_style, Some(LearningStyle::Visual));
    Ok(())
}

#[test]
fn test_collapse_is_frozen_against_later_updates() {
    let mut estimator = LearningStyleEstimator::with_defaults();
    for _ in 0..6 {
        estimator.update(&visual(0.9));
    }
    let frozen = estimator.snapshot();
    assert!(frozen.collapsed);

    for _ in 0..25 {
        let state = estimator.update(&auditory(1.0));
        assert_eq!(state.optimal_style, frozen.optimal_style);
        assert_eq!(state.confidence, frozen.confidence);
        assert!(state.collapsed);
    }
    let drifted = estimator.snapshot();
    assert!(drifted.learning_styles.auditory > drifted.learning_styles.visual);
}

#[test]
fn test_force_collapse_overrides_frozen_choice() {
    let mut estimator = LearningStyleEstimator::with_defaults();
    for _ in 0..6 {
        estimator.update(&visual(0.9));
    }
    for _ in 0..25 {
        estimator.update(&auditory(1.0));
    }
    let result = estimator.force_collapse();
    assert!(result.collapsed);
    assert_eq!(result.optimal_style, LearningStyle::Auditory);
    assert_eq!(result.confidence, result.learning_styles.auditory);

    let state = estimator.snapshot();
    assert_eq!(state.optimal_style, Some(LearningStyle::Auditory));
    assert_eq!(state.confidence, result.confidence);
}

#[test]
fn test_force_collapse_below_threshold_uses_tie_order() {
    let mut estimator = LearningStyleEstimator::new(EstimatorConfig {
        prior: learning_contracts::StyleProbabilities::new(1.0, 1.0, 1.0),
        ..Default::default()
    })
    .unwrap();
    let result = estimator.force_collapse();
    assert_eq!(result.optimal_style, LearningStyle::Visual);
    assert!(estimator.is_collapsed());
}

#[test]
fn test_success_strictly_increases_share() {
    let mut high = LearningStyleEstimator::with_defaults();
    let mut low = LearningStyleEstimator::with_defaults();
    let high_state = high.update(&InteractionSignal::new("hands_on", 1.0, 0.5));
    let low_state = low.update(&InteractionSignal::new("hands_on", 0.0, 0.5));
    assert!(high_state.learning_styles.kinesthetic > low_state.learning_styles.kinesthetic);
    for style in LearningStyle::ALL {
        assert!((low_state.learning_styles.get(style) - low.config().prior.get(style)).abs() < 1e-12);
    }
}

#[test]
fn test_unrecognised_interaction_changes_nothing() {
    let mut estimator = LearningStyleEstimator::with_defaults();
    let before = estimator.snapshot();
    let after = estimator.update(&InteractionSignal::new("unknown", 1.0, 1.0));
    assert_eq!(before, after);
    assert_eq!(estimator.update_count(), 0);
}

#[tokio::test]
async fn test_concurrent_updates_are_serialised() {
    let shared = Arc::new(RwLock::new(LearningStyleEstimator::with_defaults()));
    let mut handles = Vec::new();
    for i in 0..64 {
        let shared = Arc::clone(&shared);
        handles.push(tokio::spawn(async move {
            let kind = if i % 2 == 0 { "image_click" } else { "hands_on" };
            let mut estimator = shared.write().await;
            estimator.update(&InteractionSignal::new(kind, 0.5, 0.5));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    let estimator = shared.read().await;
    assert_eq!(estimator.update_count(), 64);
    assert!((estimator.snapshot().learning_styles.total() - 1.0).abs() < 1e-9);
}
