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

//! Seven-way facial expression classifier.
//!
//! [`ExpressionCnn`] is a small convolutional network over a single-channel
//! square crop: 3x3 convolutions of 32 and 64 channels and a 2x2 max-pool,
//! two more of 128 channels and a second pool, a 512-unit dense layer, then a
//! softmax over the seven labels in [`EmotionLabel::ALL`] order.
//!
//! Weights load from safetensors as `conv1`..`conv4`, `fc1` and `fc2`, each
//! with `.weight` and `.bias`, in PyTorch layout: convolution kernels are
//! `(out, in, 3, 3)` and `fc1` expects channel-major `(C, H, W)` flattening.

use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{Conv2d, Conv2dConfig, Linear, VarBuilder};
use learning_contracts::{EmotionLabel, EmotionVector};
use std::path::Path;
use tracing::info;

use crate::error::{AffectError, Result};

pub trait EmotionClassifier: Send + Sync {
    /// Edge length of the square face crop the classifier expects.
    fn input_size(&self) -> u32;

    fn classify(&self, tensor: &[f32]) -> Result<EmotionVector>;
}

const CONV_CHANNELS: [usize; 4] = [32, 64, 128, 128];
const KERNEL: usize = 3;
const HIDDEN: usize = 512;

#[derive(Debug, Clone)]
pub struct ExpressionCnn {
    input_size: u32,
    pixels: usize,
    conv: [Conv2d; 4],
    fc1: Linear,
    fc2: Linear,
    device: Device,
}

impl ExpressionCnn {
    /// Edge of the feature maps entering `fc1`, or `None` when a crop of
    /// `input_size` does not survive both convolution blocks.
    pub fn pooled_edge(input_size: u32) -> Option<usize> {
        let shrink = 2 * (KERNEL - 1);
        let first = (input_size as usize).checked_sub(shrink)? / 2;
        let second = first.checked_sub(shrink)? / 2;
        (second > 0).then_some(second)
    }

    pub fn new(vb: VarBuilder, input_size: u32) -> Result<Self> {
        let edge = Self::pooled_edge(input_size).ok_or_else(|| {
            AffectError::model(format!("a {input_size}px crop is too small for the network"))
        })?;
        let side = input_size as usize;
        let (pixels, flat) = side
            .checked_mul(side)
            .zip(
                edge.checked_mul(edge)
                    .and_then(|a| a.checked_mul(CONV_CHANNELS[3])),
            )
            .ok_or_else(|| AffectError::model(format!("a {input_size}px crop is too large")))?;

        let cfg = Conv2dConfig::default();
        let conv = [
            candle_nn::conv2d(1, CONV_CHANNELS[0], KERNEL, cfg, vb.pp("conv1"))?,
            candle_nn::conv2d(CONV_CHANNELS[0], CONV_CHANNELS[1], KERNEL, cfg, vb.pp("conv2"))?,
            candle_nn::conv2d(CONV_CHANNELS[1], CONV_CHANNELS[2], KERNEL, cfg, vb.pp("conv3"))?,
            candle_nn::conv2d(CONV_CHANNELS[2], CONV_CHANNELS[3], KERNEL, cfg, vb.pp("conv4"))?,
        ];
        let fc1 = candle_nn::linear(flat, HIDDEN, vb.pp("fc1"))?;
        let fc2 = candle_nn::linear(HIDDEN, EmotionLabel::ALL.len(), vb.pp("fc2"))?;

        Ok(Self {
            input_size,
            pixels,
            conv,
            fc1,
            fc2,
            device: vb.device().clone(),
        })
    }

    /// All-zero weights: every label scores `1/7`.
    pub fn untrained(input_size: u32) -> Result<Self> {
        Self::new(VarBuilder::zeros(DType::F32, &Device::Cpu), input_size)
    }

    pub fn load_from_file(path: &Path, input_size: u32) -> Result<Self> {
        let data = std::fs::read(path)?;
        let vb = VarBuilder::from_buffered_safetensors(data, DType::F32, &Device::Cpu)?;
        let model = Self::new(vb, input_size)?;
        info!(path = %path.display(), input_size, "Loaded expression classifier");
        Ok(model)
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.conv[0].forward(xs)?.relu()?;
        let xs = self.conv[1].forward(&xs)?.relu()?.max_pool2d(2)?;
        let xs = self.conv[2].forward(&xs)?.relu()?;
        let xs = self.conv[3].forward(&xs)?.relu()?.max_pool2d(2)?;
        let xs = self.fc1.forward(&xs.flatten_from(1)?)?.relu()?;
        candle_nn::ops::softmax(&self.fc2.forward(&xs)?, D::Minus1)
    }
}

impl EmotionClassifier for ExpressionCnn {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn classify(&self, tensor: &[f32]) -> Result<EmotionVector> {
        if tensor.len() != self.pixels {
            return Err(AffectError::InputShape {
                expected: self.pixels,
                got: tensor.len(),
            });
        }
        let side = self.input_size as usize;
        let input = Tensor::from_slice(tensor, (1, 1, side, side), &self.device)?;
        let scores = self.forward(&input)?.squeeze(0)?.to_vec1::<f32>()?;
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(AffectError::prediction("non-finite class score"));
        }
        EmotionVector::from_scores(&scores)
            .ok_or_else(|| AffectError::prediction(format!("{} scores", scores.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_edge_follows_the_layer_stack() {
        assert_eq!(ExpressionCnn::pooled_edge(48), Some(9));
        assert_eq!(ExpressionCnn::pooled_edge(16), Some(1));
        assert_eq!(ExpressionCnn::pooled_edge(13), None);
        assert_eq!(ExpressionCnn::pooled_edge(0), None);
    }

    #[test]
    fn untrained_network_is_uniform() {
        let net = ExpressionCnn::untrained(48).unwrap();
        let out = net.classify(&vec![0.5; 48 * 48]).unwrap();
        for label in EmotionLabel::ALL {
            assert!((out.get(label) - 1.0 / 7.0).abs() < 1e-6);
        }
    }

    #[test]
    fn wrong_tensor_length_is_rejected() {
        let net = ExpressionCnn::untrained(16).unwrap();
        assert!(matches!(
            net.classify(&[0.0; 255]),
            Err(AffectError::InputShape { expected: 256, got: 255 })
        ));
    }

    #[test]
    fn unusable_crop_sizes_are_model_errors() {
        assert!(matches!(
            ExpressionCnn::untrained(12),
            Err(AffectError::InvalidModel(_))
        ));
        assert!(matches!(
            ExpressionCnn::untrained(u32::MAX),
            Err(AffectError::InvalidModel(_))
        ));
    }
}
