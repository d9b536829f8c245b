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

//! Shared data model for the adaptive learning engine.
//!
//! Every crate in the workspace speaks these types; they serialise to the
//! snake_case JSON shapes the browser client already consumes.

pub mod emotion;
pub mod interaction;
pub mod style;

pub use emotion::{EmotionLabel, EmotionVector, LearningEmotionVector};
pub use interaction::{
    ContractError, InteractionEvent, InteractionSignal, LearningState, ANONYMOUS_STUDENT,
    UNKNOWN_INTERACTION,
};
pub use style::{CollapseResult, LearningStyle, LearningStyleState, StyleProbabilities};
