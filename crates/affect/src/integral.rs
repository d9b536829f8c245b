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

/// Summed-area tables over pixel values and squared pixel values.
///
/// Both tables carry a zero row and column so that `(w + 1) * (h + 1)` entries
/// cover the frame.
#[derive(Debug, Clone)]
pub struct IntegralImage {
    width: u32,
    height: u32,
    sum: Vec<u64>,
    squared: Vec<u64>,
}

impl IntegralImage {
    pub fn new(frame: &GrayImage) -> Self {
        let (width, height) = frame.dimensions();
        let stride = width as usize + 1;
        let mut sum = vec![0u64; stride * (height as usize + 1)];
        let mut squared = vec![0u64; stride * (height as usize + 1)];

        for y in 0..height as usize {
            let mut row_sum = 0u64;
            let mut row_squared = 0u64;
            for x in 0..width as usize {
                let v = u64::from(frame.get_pixel(x as u32, y as u32)[0]);
                row_sum += v;
                row_squared += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row_sum;
                squared[idx] = squared[idx - stride] + row_squared;
            }
        }

        Self {
            width,
            height,
            sum,
            squared,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn lookup(table: &[u64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        table[y1 * stride + x1] + table[y0 * stride + x0]
            - table[y0 * stride + x1]
            - table[y1 * stride + x0]
    }

    /// Pixel sum over the rectangle. Callers keep the rectangle inside the frame.
    pub fn rect_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::lookup(&self.sum, self.width as usize + 1, x, y, w, h)
    }

    pub fn rect_squared_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::lookup(&self.squared, self.width as usize + 1, x, y, w, h)
    }

    /// Standard deviation of intensities inside the rectangle.
    pub fn std_dev(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        let area = f64::from(w) * f64::from(h);
        if area == 0.0 {
            return 0.0;
        }
        let mean = self.rect_sum(x, y, w, h) as f64 / area;
        let variance = self.rect_squared_sum(x, y, w, h) as f64 / area - mean * mean;
        variance.max(0.0).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn sums_match_brute_force() {
        let frame = GrayImage::from_fn(7, 5, |x, y| Luma([(x * 10 + y * 3) as u8]));
        let integral = IntegralImage::new(&frame);
        let mut expected = 0u64;
        for y in 1..4 {
            for x in 2..6 {
                expected += u64::from(frame.get_pixel(x, y)[0]);
            }
        }
        assert_eq!(integral.rect_sum(2, 1, 4, 3), expected);
        assert_eq!(
            integral.rect_sum(0, 0, 7, 5),
            frame.pixels().map(|p| u64::from(p[0])).sum::<u64>()
        );
    }

    #[test]
    fn uniform_patch_has_no_spread() {
        let frame = GrayImage::from_pixel(8, 8, Luma([90]));
        let integral = IntegralImage::new(&frame);
        assert_eq!(integral.std_dev(1, 1, 4, 4), 0.0);
    }
}
