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

use image::GrayImage;
use std::path::Path;

use crate::cascade::{DetectionParams, HaarCascade};
use crate::error::Result;
use crate::frame::Region;

/// Finds candidate face regions in an intensity frame.
///
/// Implementations return regions ordered by detector preference; callers
/// that need a single face take the first.
pub trait FaceLocator: Send + Sync {
    fn locate(&self, frame: &GrayImage) -> Result<Vec<Region>>;
}

#[derive(Debug, Clone)]
pub struct CascadeLocator {
    cascade: HaarCascade,
    params: DetectionParams,
}

impl CascadeLocator {
    pub fn new(cascade: HaarCascade, params: DetectionParams) -> Self {
        Self { cascade, params }
    }

    pub fn from_file(path: &Path, params: DetectionParams) -> Result<Self> {
        Ok(Self::new(HaarCascade::load_from_file(path)?, params))
    }

    /// The built-in frontal-face cascade.
    pub fn frontal_face(params: DetectionParams) -> Self {
        Self::new(HaarCascade::frontal_face(), params)
    }
}

impl FaceLocator for CascadeLocator {
    fn locate(&self, frame: &GrayImage) -> Result<Vec<Region>> {
        Ok(self.cascade.detect(frame, &self.params))
    }
}

/// Treats the whole frame as the face, for clients that upload pre-cropped
/// faces. Only used when explicitly configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullFrameLocator;

impl FaceLocator for FullFrameLocator {
    fn locate(&self, frame: &GrayImage) -> Result<Vec<Region>> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Region::new(0, 0, width, height)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_frame_covers_everything() {
        let frame = GrayImage::new(30, 20);
        assert_eq!(
            FullFrameLocator.locate(&frame).unwrap(),
            vec![Region::new(0, 0, 30, 20)]
        );
        assert!(FullFrameLocator.locate(&GrayImage::new(0, 0)).unwrap().is_empty());
    }

    #[test]
    fn frontal_face_ignores_flat_frames() {
        let locator = CascadeLocator::frontal_face(DetectionParams::default());
        for level in [0, 128, 255] {
            let frame = GrayImage::from_pixel(64, 64, image::Luma([level]));
            assert!(locator.locate(&frame).unwrap().is_empty(), "level {level}");
        }
    }
}
