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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AffectError {
    #[error("Frame could not be decoded: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Frame has no pixels")]
    EmptyFrame,
    #[error("Region {x},{y} {width}x{height} lies outside a {frame_width}x{frame_height} frame")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("Invalid detector definition: {0}")]
    InvalidCascade(String),
    #[error("Detector XML error: {0}")]
    CascadeXml(#[from] quick_xml::DeError),
    #[error("Invalid classifier definition: {0}")]
    InvalidModel(String),
    #[error("Classifier expected {expected} inputs, got {got}")]
    InputShape { expected: usize, got: usize },
    #[error("Classifier produced an unusable output: {0}")]
    Prediction(String),
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AffectError {
    pub fn cascade<S: Into<String>>(msg: S) -> Self {
        Self::InvalidCascade(msg.into())
    }

    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::InvalidModel(msg.into())
    }

    pub fn prediction<S: Into<String>>(msg: S) -> Self {
        Self::Prediction(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AffectError>;
