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

use adapt::{AdaptationEngine, AdaptationThresholds, PhraseBook};
use anyhow::Result;
use learning_contracts::{
    LearningEmotionVector, LearningState, LearningStyle, LearningStyleState, StyleProbabilities,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;

fn calm() -> LearningEmotionVector {
    LearningEmotionVector::new(0.1, 0.1, 0.1, 0.1, 0.1)
}

fn collapsed_visual(confidence: f64) -> LearningStyleState {
    LearningStyleState {
        learning_styles: StyleProbabilities::new(confidence, (1.0 - confidence) / 2.0, (1.0 - confidence) / 2.0),
        collapsed: true,
        optimal_style: Some(LearningStyle::Visual),
        confidence,
    }
}

#[test]
fn test_frustration_alone_yields_three_directives() {
    let engine = AdaptationEngine::default();
    let emotions = LearningEmotionVector {
        frustrated: 0.7,
        ..calm()
    };
    let out = engine.generate(&emotions, LearningState::Neutral, &LearningStyleState::default());
    assert_eq!(out.len(), 3);
    assert_eq!(out[0], "🎵 Switching to calmer, slower voice tone");
    assert!(out[1].starts_with("😌 Providing encouragement: '"));
    assert_eq!(out[2], "⏰ Suggesting 2-minute mindful break");
}

#[test]
fn test_encouragement_comes_from_pool() {
    let engine = AdaptationEngine::default();
    let pool = engine.phrases().encouragement.clone();
    let emotions = LearningEmotionVector {
        frustrated: 0.9,
        ..calm()
    };
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..20 {
        let out = engine.generate_with_rng(
            &emotions,
            LearningState::Neutral,
            &LearningStyleState::default(),
            &mut rng,
        );
        assert!(pool
            .iter()
            .any(|p| out[1] == format!("😌 Providing encouragement: '{p}'")));
    }
}

#[test]
fn test_seeded_generation_is_deterministic() {
    let engine = AdaptationEngine::default();
    let emotions = LearningEmotionVector {
        frustrated: 0.9,
        ..calm()
    };
    let state = LearningStyleState::default();
    let a = engine.generate_with_rng(
        &emotions,
        LearningState::Neutral,
        &state,
        &mut StdRng::seed_from_u64(3),
    );
    let b = engine.generate_with_rng(
        &emotions,
        LearningState::Neutral,
        &state,
        &mut StdRng::seed_from_u64(3),
    );
    assert_eq!(a, b);
}

#[test]
fn test_all_groups_fire_in_declared_order() {
    let engine = AdaptationEngine::default();
    let emotions = LearningEmotionVector::new(0.9, 0.9, 0.9, 0.9, 0.9);
    let state = collapsed_visual(0.674);

    let fired = engine.fired_rules(&emotions, LearningState::Struggling, &state);
    assert_eq!(
        fired,
        vec![
            "frustration",
            "boredom",
            "confusion",
            "high_engagement",
            "struggling",
            "style_collapse"
        ]
    );

    let out = engine.generate(&emotions, LearningState::Struggling, &state);
    assert_eq!(out.len(), 16);
    assert_eq!(out[3], "⚡ Increasing energy and adding gamification");
    assert_eq!(out[6], "🔄 Simplifying explanation with rural Punjab analogies");
    assert_eq!(
        out[9],
        "🚀 Increasing difficulty - student ready for advanced concepts"
    );
    assert_eq!(
        out[12],
        "📚 Providing peer learning connection with successful rural student"
    );
    assert_eq!(out[13], "🎯 QUANTUM COLLAPSE: Optimal style is visual");
    assert_eq!(out[14], "🚀 All future content will be visual-optimized");
    assert_eq!(out[15], "📊 Confidence level: 67% - System highly certain");
}

#[test]
fn test_disengaged_adds_social_proof() {
    let engine = AdaptationEngine::default();
    let out = engine.generate(&calm(), LearningState::Disengaged, &LearningStyleState::default());
    assert_eq!(
        out,
        vec!["🌟 Sharing local success story: 'Meet Simran from nearby village...'".to_string()]
    );
    assert!(engine
        .generate(&calm(), LearningState::Other, &LearningStyleState::default())
        .is_empty());
}

#[test]
fn test_enabling_a_guard_only_adds_directives() {
    let engine = AdaptationEngine::default();
    let state = collapsed_visual(0.7);
    let base = LearningEmotionVector::new(0.2, 0.85, 0.1, 0.1, 0.65);
    let before = engine.generate(&base, LearningState::Disengaged, &state);

    let raised = LearningEmotionVector {
        confused: 0.75,
        ..base
    };
    let after = engine.generate(&raised, LearningState::Disengaged, &state);

    assert_eq!(after.len(), before.len() + 3);
    for directive in &before {
        assert!(after.contains(directive), "lost directive {directive}");
    }
}

#[test]
fn test_custom_thresholds_and_phrase_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "encouragement:\n  - Keep going!")?;
    let phrases = PhraseBook::load_from_file(file.path())?;
    let engine = AdaptationEngine::new(
        phrases,
        AdaptationThresholds {
            frustrated: 0.3,
            ..Default::default()
        },
    );
    let emotions = LearningEmotionVector {
        frustrated: 0.4,
        ..calm()
    };
    let out = engine.generate(&emotions, LearningState::Neutral, &LearningStyleState::default());
    assert_eq!(out[1], "😌 Providing encouragement: 'Keep going!'");
    Ok(())
}
