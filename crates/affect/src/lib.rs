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

//! Turns camera frames into the five learning-relevant emotion signals.
//!
//! A [`FaceLocator`] finds the face, an [`EmotionClassifier`] scores the crop
//! over seven expression labels, and [`EmotionPipeline`] remaps those scores
//! while absorbing every failure into a neutral fallback.

pub mod cascade;
pub mod classifier;
pub mod error;
pub mod frame;
pub mod integral;
pub mod locator;
pub mod pipeline;

pub use cascade::{group_rectangles, DetectionParams, HaarCascade};
pub use classifier::{EmotionClassifier, ExpressionCnn};
pub use error::{AffectError, Result};
pub use frame::Region;
pub use locator::{CascadeLocator, FaceLocator, FullFrameLocator};
pub use pipeline::{
    neutral_emotions, remap, EmotionPipeline, Inference, InferenceConfig, LocatorKind,
};
