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

use image::DynamicImage;
use learning_contracts::{EmotionVector, LearningEmotionVector};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cascade::DetectionParams;
use crate::classifier::{EmotionClassifier, ExpressionCnn};
use crate::error::Result;
use crate::frame::{self, Region};
use crate::locator::{CascadeLocator, FaceLocator, FullFrameLocator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// Haar cascade detection.
    #[default]
    Cascade,
    /// Every frame is a pre-cropped face.
    FullFrame,
}

/// Settings for building an [`EmotionPipeline`] from files on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub locator: LocatorKind,
    /// OpenCV cascade XML, e.g. `haarcascade_frontalface_default.xml`.
    /// Without one the built-in frontal-face cascade is used.
    pub cascade_path: Option<PathBuf>,
    /// Safetensors weights for the expression network. Without them every
    /// face classifies as uniform.
    pub model_path: Option<PathBuf>,
    pub scale_factor: f64,
    pub min_neighbors: u32,
    pub min_face_size: u32,
    pub input_size: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            locator: LocatorKind::Cascade,
            cascade_path: None,
            model_path: None,
            scale_factor: 1.1,
            min_neighbors: 4,
            min_face_size: 0,
            input_size: 48,
        }
    }
}

/// Outcome of a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    pub emotions: LearningEmotionVector,
    pub face_detected: bool,
}

impl Inference {
    fn fallback(face_detected: bool) -> Self {
        Self {
            emotions: neutral_emotions(),
            face_detected,
        }
    }
}

/// Returned whenever no usable classification exists for a frame.
pub fn neutral_emotions() -> LearningEmotionVector {
    LearningEmotionVector::new(0.2, 0.3, 0.1, 0.1, 0.1)
}

/// Blends the seven classifier labels into the five learning signals.
pub fn remap(scores: &EmotionVector) -> LearningEmotionVector {
    LearningEmotionVector::new(
        scores.happy,
        0.8 * scores.happy + 0.2 * scores.surprised,
        0.6 * scores.sad + 0.4 * scores.fearful,
        scores.angry,
        scores.disgusted,
    )
}

#[derive(Clone)]
pub struct EmotionPipeline {
    locator: Arc<dyn FaceLocator>,
    classifier: Arc<dyn EmotionClassifier>,
}

impl std::fmt::Debug for EmotionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmotionPipeline")
            .field("input_size", &self.classifier.input_size())
            .finish_non_exhaustive()
    }
}

impl EmotionPipeline {
    pub fn new(locator: Arc<dyn FaceLocator>, classifier: Arc<dyn EmotionClassifier>) -> Self {
        Self {
            locator,
            classifier,
        }
    }

    /// Loads the configured detector and classifier. A configured file that
    /// cannot be loaded is an error; absent paths fall back to the built-in
    /// cascade and an untrained network.
    pub fn from_config(config: &InferenceConfig) -> Result<Self> {
        let params = DetectionParams {
            scale_factor: config.scale_factor,
            min_neighbors: config.min_neighbors,
            min_size: config.min_face_size,
        };
        let locator: Arc<dyn FaceLocator> = match (config.locator, &config.cascade_path) {
            (LocatorKind::FullFrame, _) => {
                info!("Treating whole frames as pre-cropped faces");
                Arc::new(FullFrameLocator)
            }
            (LocatorKind::Cascade, Some(path)) => Arc::new(CascadeLocator::from_file(path, params)?),
            (LocatorKind::Cascade, None) => {
                info!("No cascade file configured, using the built-in frontal-face cascade");
                Arc::new(CascadeLocator::frontal_face(params))
            }
        };

        let classifier: Arc<dyn EmotionClassifier> = match &config.model_path {
            Some(path) => Arc::new(ExpressionCnn::load_from_file(path, config.input_size)?),
            None => {
                warn!("No emotion model configured, classifications will be uniform");
                Arc::new(ExpressionCnn::untrained(config.input_size)?)
            }
        };

        Ok(Self::new(locator, classifier))
    }

    fn classify_face(&self, frame: &image::GrayImage, region: Region) -> Result<LearningEmotionVector> {
        let tensor = frame::face_tensor(frame, region, self.classifier.input_size())?;
        let scores = self.classifier.classify(&tensor)?;
        Ok(remap(&scores))
    }

    /// Never fails: every internal error degrades to [`neutral_emotions`].
    pub fn infer(&self, image: &DynamicImage) -> Inference {
        let gray = frame::to_intensity(image);

        let region = match self.locator.locate(&gray) {
            Ok(regions) => match regions.into_iter().next() {
                Some(region) => region,
                None => {
                    debug!("No face found in frame");
                    return Inference::fallback(false);
                }
            },
            Err(e) => {
                warn!(error = %e, "Face locator failed, using neutral emotions");
                return Inference::fallback(false);
            }
        };

        match self.classify_face(&gray, region) {
            Ok(emotions) => Inference {
                emotions,
                face_detected: true,
            },
            Err(e) => {
                warn!(error = %e, "Emotion classification failed, using neutral emotions");
                Inference::fallback(true)
            }
        }
    }

    pub fn infer_bytes(&self, bytes: &[u8]) -> Inference {
        match frame::decode(bytes) {
            Ok(image) => self.infer(&image),
            Err(e) => {
                warn!(error = %e, "Frame decode failed, using neutral emotions");
                Inference::fallback(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remap_uses_fixed_blends() {
        let scores = EmotionVector {
            happy: 0.5,
            sad: 0.2,
            angry: 0.3,
            surprised: 1.0,
            fearful: 0.5,
            disgusted: 0.4,
            neutral: 0.9,
        };
        let out = remap(&scores);
        assert!((out.happy - 0.5).abs() < 1e-12);
        assert!((out.engaged - 0.6).abs() < 1e-12);
        assert!((out.confused - 0.32).abs() < 1e-12);
        assert!((out.frustrated - 0.3).abs() < 1e-12);
        assert!((out.bored - 0.4).abs() < 1e-12);
    }
}
