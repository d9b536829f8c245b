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

use learning_contracts::{LearningEmotionVector, LearningState, LearningStyleState};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::phrases::PhraseBook;

/// Emotion levels a signal must strictly exceed for its rule to fire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationThresholds {
    pub frustrated: f64,
    pub bored: f64,
    pub confused: f64,
    pub engaged: f64,
}

impl Default for AdaptationThresholds {
    fn default() -> Self {
        Self {
            frustrated: 0.6,
            bored: 0.6,
            confused: 0.7,
            engaged: 0.8,
        }
    }
}

pub struct RuleInput<'a> {
    pub emotions: &'a LearningEmotionVector,
    pub learning_state: LearningState,
    pub quantum_state: &'a LearningStyleState,
    pub thresholds: &'a AdaptationThresholds,
}

type Guard = fn(&RuleInput<'_>) -> bool;
type Producer = fn(&RuleInput<'_>, &PhraseBook, &mut dyn RngCore) -> Vec<String>;

#[derive(Clone, Copy)]
pub struct AdaptationRule {
    pub name: &'static str,
    guard: Guard,
    produce: Producer,
}

impl std::fmt::Debug for AdaptationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptationRule")
            .field("name", &self.name)
            .finish()
    }
}

impl AdaptationRule {
    pub fn applies(&self, input: &RuleInput<'_>) -> bool {
        (self.guard)(input)
    }
}

fn fixed(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

fn frustration(i: &RuleInput<'_>) -> bool {
    i.emotions.frustrated > i.thresholds.frustrated
}

fn calm_down(_: &RuleInput<'_>, phrases: &PhraseBook, rng: &mut dyn RngCore) -> Vec<String> {
    vec![
        "🎵 Switching to calmer, slower voice tone".to_string(),
        format!(
            "😌 Providing encouragement: '{}'",
            phrases.encouragement(rng)
        ),
        "⏰ Suggesting 2-minute mindful break".to_string(),
    ]
}

fn boredom(i: &RuleInput<'_>) -> bool {
    i.emotions.bored > i.thresholds.bored
}

fn energise(_: &RuleInput<'_>, _: &PhraseBook, _: &mut dyn RngCore) -> Vec<String> {
    fixed(&[
        "⚡ Increasing energy and adding gamification",
        "🎮 Launching interactive village farming simulation",
        "🏆 Adding achievement badges and leaderboard",
    ])
}

fn confusion(i: &RuleInput<'_>) -> bool {
    i.emotions.confused > i.thresholds.confused
}

fn simplify(_: &RuleInput<'_>, _: &PhraseBook, _: &mut dyn RngCore) -> Vec<String> {
    fixed(&[
        "🔄 Simplifying explanation with rural Punjab analogies",
        "🗣️ Switching to step-by-step Punjabi explanation",
        "📱 Sending concept to phone for offline review",
    ])
}

fn high_engagement(i: &RuleInput<'_>) -> bool {
    i.emotions.engaged > i.thresholds.engaged
}

fn escalate(_: &RuleInput<'_>, _: &PhraseBook, _: &mut dyn RngCore) -> Vec<String> {
    fixed(&[
        "🚀 Increasing difficulty - student ready for advanced concepts",
        "🎯 Preparing university-level content",
        "👨‍🎓 Connecting with mentorship program",
    ])
}

fn struggling(i: &RuleInput<'_>) -> bool {
    i.learning_state == LearningState::Struggling
}

fn peer_connection(_: &RuleInput<'_>, _: &PhraseBook, _: &mut dyn RngCore) -> Vec<String> {
    fixed(&["📚 Providing peer learning connection with successful rural student"])
}

fn disengaged(i: &RuleInput<'_>) -> bool {
    i.learning_state == LearningState::Disengaged
}

fn social_proof(_: &RuleInput<'_>, _: &PhraseBook, _: &mut dyn RngCore) -> Vec<String> {
    fixed(&["🌟 Sharing local success story: 'Meet Simran from nearby village...'"])
}

fn style_collapsed(i: &RuleInput<'_>) -> bool {
    i.quantum_state.collapsed
}

fn announce_style(i: &RuleInput<'_>, _: &PhraseBook, _: &mut dyn RngCore) -> Vec<String> {
    let style = i
        .quantum_state
        .optimal_style
        .map(|s| s.as_str())
        .unwrap_or("unknown");
    vec![
        format!("🎯 QUANTUM COLLAPSE: Optimal style is {style}"),
        format!("🚀 All future content will be {style}-optimized"),
        format!(
            "📊 Confidence level: {:.0}% - System highly certain",
            i.quantum_state.confidence * 100.0
        ),
    ]
}

/// Rule table in evaluation order. Every rule is checked; none suppresses another.
pub const RULES: [AdaptationRule; 7] = [
    AdaptationRule {
        name: "frustration",
        guard: frustration,
        produce: calm_down,
    },
    AdaptationRule {
        name: "boredom",
        guard: boredom,
        produce: energise,
    },
    AdaptationRule {
        name: "confusion",
        guard: confusion,
        produce: simplify,
    },
    AdaptationRule {
        name: "high_engagement",
        guard: high_engagement,
        produce: escalate,
    },
    AdaptationRule {
        name: "struggling",
        guard: struggling,
        produce: peer_connection,
    },
    AdaptationRule {
        name: "disengaged",
        guard: disengaged,
        produce: social_proof,
    },
    AdaptationRule {
        name: "style_collapse",
        guard: style_collapsed,
        produce: announce_style,
    },
];

/// Maps emotions, learner state and the learning-style snapshot to directives.
///
/// Output order is rule order, so a frame can carry every group at once and
/// duplicates across rules are kept.
#[derive(Debug, Clone, Default)]
pub struct AdaptationEngine {
    phrases: PhraseBook,
    thresholds: AdaptationThresholds,
}

impl AdaptationEngine {
    pub fn new(phrases: PhraseBook, thresholds: AdaptationThresholds) -> Self {
        Self {
            phrases,
            thresholds,
        }
    }

    pub fn generate(
        &self,
        emotions: &LearningEmotionVector,
        learning_state: LearningState,
        quantum_state: &LearningStyleState,
    ) -> Vec<String> {
        let mut rng = rand::thread_rng();
        self.generate_with_rng(emotions, learning_state, quantum_state, &mut rng)
    }

    pub fn generate_with_rng(
        &self,
        emotions: &LearningEmotionVector,
        learning_state: LearningState,
        quantum_state: &LearningStyleState,
        rng: &mut dyn RngCore,
    ) -> Vec<String> {
        let input = RuleInput {
            emotions,
            learning_state,
            quantum_state,
            thresholds: &self.thresholds,
        };
        let mut directives = Vec::new();
        for rule in RULES.iter().filter(|r| r.applies(&input)) {
            let produced = (rule.produce)(&input, &self.phrases, rng);
            debug!(rule = rule.name, count = produced.len(), "adaptation rule fired");
            directives.extend(produced);
        }
        directives
    }

    /// Names of the rules whose guards hold, in evaluation order.
    pub fn fired_rules(
        &self,
        emotions: &LearningEmotionVector,
        learning_state: LearningState,
        quantum_state: &LearningStyleState,
    ) -> Vec<&'static str> {
        let input = RuleInput {
            emotions,
            learning_state,
            quantum_state,
            thresholds: &self.thresholds,
        };
        RULES
            .iter()
            .filter(|r| r.applies(&input))
            .map(|r| r.name)
            .collect()
    }

    pub fn phrases(&self) -> &PhraseBook {
        &self.phrases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_names_are_unique() {
        let mut names: Vec<_> = RULES.iter().map(|r| r.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), RULES.len());
    }

    #[test]
    fn thresholds_are_strict() {
        let engine = AdaptationEngine::default();
        let at_threshold = LearningEmotionVector::new(0.0, 0.8, 0.7, 0.6, 0.6);
        assert!(engine
            .fired_rules(&at_threshold, LearningState::Neutral, &LearningStyleState::default())
            .is_empty());
    }
}
