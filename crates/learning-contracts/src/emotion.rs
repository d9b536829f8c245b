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

/// Raw classifier labels, in the order the classifier emits its scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Happy,
    Sad,
    Angry,
    Surprised,
    Fearful,
    Disgusted,
    Neutral,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Angry,
        EmotionLabel::Surprised,
        EmotionLabel::Fearful,
        EmotionLabel::Disgusted,
        EmotionLabel::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Surprised => "surprised",
            EmotionLabel::Fearful => "fearful",
            EmotionLabel::Disgusted => "disgusted",
            EmotionLabel::Neutral => "neutral",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-label confidences straight out of the classifier.
///
/// Scores are treated as independent confidences downstream, so the vector is
/// not required to sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionVector {
    pub happy: f64,
    pub sad: f64,
    pub angry: f64,
    pub surprised: f64,
    pub fearful: f64,
    pub disgusted: f64,
    pub neutral: f64,
}

impl EmotionVector {
    /// Builds a vector from scores laid out in [`EmotionLabel::ALL`] order.
    /// Returns `None` when the slice does not carry exactly seven scores.
    pub fn from_scores(scores: &[f32]) -> Option<Self> {
        if scores.len() != EmotionLabel::ALL.len() {
            return None;
        }
        Some(Self {
            happy: f64::from(scores[0]),
            sad: f64::from(scores[1]),
            angry: f64::from(scores[2]),
            surprised: f64::from(scores[3]),
            fearful: f64::from(scores[4]),
            disgusted: f64::from(scores[5]),
            neutral: f64::from(scores[6]),
        })
    }

    pub fn get(&self, label: EmotionLabel) -> f64 {
        match label {
            EmotionLabel::Happy => self.happy,
            EmotionLabel::Sad => self.sad,
            EmotionLabel::Angry => self.angry,
            EmotionLabel::Surprised => self.surprised,
            EmotionLabel::Fearful => self.fearful,
            EmotionLabel::Disgusted => self.disgusted,
            EmotionLabel::Neutral => self.neutral,
        }
    }

    /// Label with the highest score; earlier labels win exact ties.
    pub fn dominant(&self) -> EmotionLabel {
        let mut best = EmotionLabel::Happy;
        for label in EmotionLabel::ALL {
            if self.get(label) > self.get(best) {
                best = label;
            }
        }
        best
    }
}

/// The five learning-relevant signals the adaptation rules read.
///
/// Inbound payloads may omit any of the keys; missing ones read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningEmotionVector {
    pub happy: f64,
    pub engaged: f64,
    pub confused: f64,
    pub frustrated: f64,
    pub bored: f64,
}

impl LearningEmotionVector {
    pub fn new(happy: f64, engaged: f64, confused: f64, frustrated: f64, bored: f64) -> Self {
        Self {
            happy,
            engaged,
            confused,
            frustrated,
            bored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_scores_requires_seven_entries() {
        assert!(EmotionVector::from_scores(&[0.1; 6]).is_none());
        let v = EmotionVector::from_scores(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7]).unwrap();
        assert!((v.get(EmotionLabel::Disgusted) - 0.6).abs() < 1e-6);
        assert_eq!(v.dominant(), EmotionLabel::Neutral);
    }

    #[test]
    fn learning_vector_accepts_partial_json() {
        let v: LearningEmotionVector = serde_json::from_str(r#"{"frustrated":0.7}"#).unwrap();
        assert_eq!(v.frustrated, 0.7);
        assert_eq!(v.bored, 0.0);
    }
}
