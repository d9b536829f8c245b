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

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStyle {
    Visual,
    Auditory,
    Kinesthetic,
}

impl LearningStyle {
    /// Iteration order; also the tie-break order for argmax.
    pub const ALL: [LearningStyle; 3] = [
        LearningStyle::Visual,
        LearningStyle::Auditory,
        LearningStyle::Kinesthetic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LearningStyle::Visual => "visual",
            LearningStyle::Auditory => "auditory",
            LearningStyle::Kinesthetic => "kinesthetic",
        }
    }

    /// Closed interaction vocabulary. Anything outside it maps to no style.
    pub fn from_interaction(interaction_type: &str) -> Option<Self> {
        match interaction_type {
            "image_click" | "visual_content" => Some(LearningStyle::Visual),
            "audio_played" | "voice_response" => Some(LearningStyle::Auditory),
            "interactive_activity" | "hands_on" => Some(LearningStyle::Kinesthetic),
            _ => None,
        }
    }
}

impl fmt::Display for LearningStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StyleProbabilities {
    pub visual: f64,
    pub auditory: f64,
    pub kinesthetic: f64,
}

impl Default for StyleProbabilities {
    fn default() -> Self {
        Self {
            visual: 0.33,
            auditory: 0.33,
            kinesthetic: 0.34,
        }
    }
}

impl StyleProbabilities {
    pub fn new(visual: f64, auditory: f64, kinesthetic: f64) -> Self {
        Self {
            visual,
            auditory,
            kinesthetic,
        }
    }

    pub fn get(&self, style: LearningStyle) -> f64 {
        match style {
            LearningStyle::Visual => self.visual,
            LearningStyle::Auditory => self.auditory,
            LearningStyle::Kinesthetic => self.kinesthetic,
        }
    }

    pub fn get_mut(&mut self, style: LearningStyle) -> &mut f64 {
        match style {
            LearningStyle::Visual => &mut self.visual,
            LearningStyle::Auditory => &mut self.auditory,
            LearningStyle::Kinesthetic => &mut self.kinesthetic,
        }
    }

    pub fn total(&self) -> f64 {
        self.visual + self.auditory + self.kinesthetic
    }

    /// Scales the entries so they sum to one. A zero or non-finite total leaves
    /// the entries untouched.
    pub fn normalise(&mut self) {
        let total = self.total();
        if total > 0.0 && total.is_finite() {
            for style in LearningStyle::ALL {
                *self.get_mut(style) /= total;
            }
        }
    }

    /// Highest-probability style; on exact ties the earlier style in
    /// [`LearningStyle::ALL`] wins.
    pub fn argmax(&self) -> (LearningStyle, f64) {
        let mut best = LearningStyle::Visual;
        for style in LearningStyle::ALL {
            if self.get(style) > self.get(best) {
                best = style;
            }
        }
        (best, self.get(best))
    }
}

/// Snapshot of the learning-style estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningStyleState {
    pub learning_styles: StyleProbabilities,
    pub collapsed: bool,
    pub optimal_style: Option<LearningStyle>,
    pub confidence: f64,
}

impl Default for LearningStyleState {
    fn default() -> Self {
        Self {
            learning_styles: StyleProbabilities::default(),
            collapsed: false,
            optimal_style: None,
            confidence: 0.0,
        }
    }
}

/// Outcome of a collapse, automatic or forced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollapseResult {
    pub collapsed: bool,
    pub optimal_style: LearningStyle,
    pub confidence: f64,
    pub learning_styles: StyleProbabilities,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_earlier_style_on_ties() {
        let p = StyleProbabilities::new(0.4, 0.4, 0.2);
        assert_eq!(p.argmax().0, LearningStyle::Visual);
        let p = StyleProbabilities::new(0.2, 0.4, 0.4);
        assert_eq!(p.argmax().0, LearningStyle::Auditory);
    }

    #[test]
    fn vocabulary_is_closed() {
        assert_eq!(
            LearningStyle::from_interaction("hands_on"),
            Some(LearningStyle::Kinesthetic)
        );
        assert_eq!(
            LearningStyle::from_interaction("voice_response"),
            Some(LearningStyle::Auditory)
        );
        assert_eq!(LearningStyle::from_interaction("quiz_answered"), None);
    }

    #[test]
    fn state_serialises_with_snake_case_keys() {
        let json = serde_json::to_value(LearningStyleState::default()).unwrap();
        assert_eq!(json["collapsed"], false);
        assert!(json["optimal_style"].is_null());
        assert_eq!(json["learning_styles"]["kinesthetic"], 0.34);
    }
}
