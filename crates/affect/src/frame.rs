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

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use crate::error::{AffectError, Result};

/// Axis-aligned pixel rectangle in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, other: &Region) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    fn fits(&self, frame: &GrayImage) -> bool {
        self.width > 0
            && self.height > 0
            && u64::from(self.x) + u64::from(self.width) <= u64::from(frame.width())
            && u64::from(self.y) + u64::from(self.height) <= u64::from(frame.height())
    }
}

/// Decodes an encoded image (PNG, JPEG, ...) from raw upload bytes.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(AffectError::EmptyFrame);
    }
    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(AffectError::EmptyFrame);
    }
    Ok(image)
}

/// Single-channel intensity view of a frame. Frames that are already 8-bit
/// grayscale are passed through unchanged.
pub fn to_intensity(frame: &DynamicImage) -> GrayImage {
    match frame {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => other.to_luma8(),
    }
}

/// Crops `region`, resamples it to `size`×`size` and scales intensities into
/// `[0, 1]`, row-major.
pub fn face_tensor(frame: &GrayImage, region: Region, size: u32) -> Result<Vec<f32>> {
    if !region.fits(frame) {
        return Err(AffectError::RegionOutOfBounds {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            frame_width: frame.width(),
            frame_height: frame.height(),
        });
    }
    let crop = imageops::crop_imm(frame, region.x, region.y, region.width, region.height).to_image();
    let resized = imageops::resize(&crop, size, size, FilterType::Triangle);
    Ok(resized
        .into_raw()
        .into_iter()
        .map(|v| f32::from(v) / 255.0)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn decode_rejects_empty_and_garbage() {
        assert!(matches!(decode(&[]), Err(AffectError::EmptyFrame)));
        assert!(matches!(
            decode(b"definitely not a png"),
            Err(AffectError::Decode(_))
        ));
    }

    #[test]
    fn tensor_is_normalised_and_sized() {
        let frame = GrayImage::from_pixel(100, 80, Luma([255]));
        let tensor = face_tensor(&frame, Region::new(10, 10, 50, 50), 48).unwrap();
        assert_eq!(tensor.len(), 48 * 48);
        assert!(tensor.iter().all(|v| (*v - 1.0).abs() < 1e-2));
    }

    #[test]
    fn region_outside_frame_is_an_error() {
        let frame = GrayImage::new(20, 20);
        assert!(matches!(
            face_tensor(&frame, Region::new(10, 10, 20, 5), 48),
            Err(AffectError::RegionOutOfBounds { .. })
        ));
        assert!(face_tensor(&frame, Region::new(0, 0, 0, 5), 48).is_err());
    }
}
