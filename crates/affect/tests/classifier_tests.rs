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

use affect::{AffectError, EmotionClassifier, ExpressionCnn};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use learning_contracts::EmotionLabel;
use std::collections::HashMap;

fn gradient(size: usize) -> Vec<f32> {
    (0..size * size).map(|i| (i % 251) as f32 / 250.0).collect()
}

#[test]
fn test_saved_weights_reload_to_the_same_predictions() -> Result<()> {
    let varmap = VarMap::new();
    let trained = ExpressionCnn::new(VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu), 48)?;
    let file = tempfile::Builder::new().suffix(".safetensors").tempfile()?;
    varmap.save(file.path())?;

    let loaded = ExpressionCnn::load_from_file(file.path(), 48)?;
    let input = gradient(48);
    let before = trained.classify(&input)?;
    let after = loaded.classify(&input)?;

    let total: f64 = EmotionLabel::ALL.iter().map(|l| after.get(*l)).sum();
    assert!((total - 1.0).abs() < 1e-4);
    for label in EmotionLabel::ALL {
        assert!((before.get(label) - after.get(label)).abs() < 1e-6, "{label}");
    }
    Ok(())
}

#[test]
fn test_weights_of_the_wrong_shape_are_rejected() -> Result<()> {
    let file = tempfile::Builder::new().suffix(".safetensors").tempfile()?;
    let tensors = HashMap::from([(
        "conv1.weight".to_string(),
        Tensor::zeros((8, 1, 3, 3), DType::F32, &Device::Cpu)?,
    )]);
    candle_core::safetensors::save(&tensors, file.path())?;

    assert!(matches!(
        ExpressionCnn::load_from_file(file.path(), 48),
        Err(AffectError::Tensor(_))
    ));
    Ok(())
}

#[test]
fn test_weights_for_another_crop_size_are_rejected() -> Result<()> {
    let varmap = VarMap::new();
    ExpressionCnn::new(VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu), 48)?;
    let file = tempfile::Builder::new().suffix(".safetensors").tempfile()?;
    varmap.save(file.path())?;

    // fc1 was sized for 9x9 pooled maps, a 64px crop pools to 13x13
    assert!(ExpressionCnn::load_from_file(file.path(), 64).is_err());
    Ok(())
}

#[test]
fn test_garbage_weight_file_is_an_error() -> Result<()> {
    let file = tempfile::NamedTempFile::new()?;
    std::fs::write(file.path(), b"not safetensors")?;
    assert!(ExpressionCnn::load_from_file(file.path(), 48).is_err());
    Ok(())
}
