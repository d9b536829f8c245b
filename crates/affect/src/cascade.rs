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

//! Boosted Haar-feature cascade (Viola–Jones) face detector.
//!
//! Cascades are read from OpenCV's XML cascade format, the
//! `haarcascade_*.xml` files OpenCV ships (boosted stumps over upright Haar
//! features). [`HaarCascade::frontal_face`] is a small built-in frontal-face
//! cascade for deployments without one.
//!
//! As in OpenCV, feature sums are divided by `area * std_dev` of the window
//! interior (the window less a one-pixel border) before each stump compares
//! them with its threshold. Windows grow by `scale_factor` per pass and raw
//! hits are merged by [`group_rectangles`], which discards clusters backed by
//! `min_neighbors` or fewer raw detections.

use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::error::{AffectError, Result};
use crate::frame::Region;
use crate::integral::IntegralImage;

/// Relative size difference under which two hits count as the same face.
const GROUP_EPS: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f64,
}

/// Depth-one tree: `left` when the normalised response is below `threshold`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeakClassifier {
    pub rects: Vec<WeightedRect>,
    pub threshold: f64,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub threshold: f64,
    pub classifiers: Vec<WeakClassifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HaarCascade {
    pub window_width: u32,
    pub window_height: u32,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    pub scale_factor: f64,
    pub min_neighbors: u32,
    /// Smallest window edge considered; `0` means the cascade's base window.
    pub min_size: u32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 4,
            min_size: 0,
        }
    }
}

impl HaarCascade {
    /// Two stages over the two strongest Viola–Jones features in a 24x24
    /// window: the eye band is darker than the cheeks below it, and the
    /// bridge of the nose is brighter than the eyes either side. Flat regions
    /// fail both.
    pub fn frontal_face() -> Self {
        let rect = |x, y, width, height, weight| WeightedRect {
            x,
            y,
            width,
            height,
            weight,
        };
        Self {
            window_width: 24,
            window_height: 24,
            stages: vec![
                Stage {
                    threshold: 0.0,
                    classifiers: vec![WeakClassifier {
                        rects: vec![rect(3, 5, 18, 8, -1.0), rect(3, 5, 18, 4, 2.0)],
                        threshold: -0.05,
                        left: 1.0,
                        right: -1.0,
                    }],
                },
                Stage {
                    threshold: 0.0,
                    classifiers: vec![WeakClassifier {
                        rects: vec![rect(3, 5, 18, 4, -1.0), rect(9, 5, 6, 4, 3.0)],
                        threshold: 0.05,
                        left: -1.0,
                        right: 1.0,
                    }],
                },
            ],
        }
    }

    pub fn from_opencv_xml(xml: &str) -> Result<Self> {
        let storage: OpenCvStorage = quick_xml::de::from_str(xml)?;
        storage.cascade.into_cascade()
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_opencv_xml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(AffectError::cascade("window size must be non-zero"));
        }
        if self.stages.is_empty() {
            return Err(AffectError::cascade("cascade has no stages"));
        }
        let within = |offset: u32, extent: u32, limit: u32| {
            offset.checked_add(extent).is_some_and(|end| end <= limit)
        };
        for (s, stage) in self.stages.iter().enumerate() {
            if stage.classifiers.is_empty() {
                return Err(AffectError::cascade(format!("stage {s} has no classifiers")));
            }
            for weak in &stage.classifiers {
                if weak.rects.is_empty() {
                    return Err(AffectError::cascade(format!("stage {s} has an empty feature")));
                }
                for r in &weak.rects {
                    if r.width == 0
                        || r.height == 0
                        || !r.weight.is_finite()
                        || !within(r.x, r.width, self.window_width)
                        || !within(r.y, r.height, self.window_height)
                    {
                        return Err(AffectError::cascade(format!(
                            "stage {s} has a feature rectangle outside the {}x{} window",
                            self.window_width, self.window_height
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn at_scale(&self, scale: f64) -> ScaledWindow {
        let width = scaled(self.window_width, scale);
        let height = scaled(self.window_height, scale);
        let border = scaled(1, scale);
        let inner = if width > 2 * border && height > 2 * border {
            (border, border, width - 2 * border, height - 2 * border)
        } else {
            (0, 0, width, height)
        };
        let stages = self
            .stages
            .iter()
            .map(|stage| ScaledStage {
                threshold: stage.threshold,
                stumps: stage
                    .classifiers
                    .iter()
                    .map(|weak| WeakClassifier {
                        rects: place_rects(&weak.rects, scale, width, height),
                        ..weak.clone()
                    })
                    .collect(),
            })
            .collect();
        ScaledWindow {
            width,
            height,
            inner,
            stages,
        }
    }

    /// Raw, ungrouped hits over every scale and position.
    pub fn scan(&self, frame: &GrayImage, params: &DetectionParams) -> Vec<Region> {
        let integral = IntegralImage::new(frame);
        let mut hits = Vec::new();
        let min_edge = params.min_size.max(1);
        let growth = params.scale_factor.max(1.0001);
        let mut scale = 1.0f64;

        loop {
            let window = self.at_scale(scale);
            if window.width > integral.width() || window.height > integral.height() {
                break;
            }
            if window.width >= min_edge && window.height >= min_edge {
                // two pixels of the rescaled frame, one once it is under half size
                let step = (if scale > 2.0 { scale } else { 2.0 * scale }).round() as u32;
                let step = step.max(1);
                let mut y = 0;
                while y + window.height <= integral.height() {
                    let mut x = 0;
                    while x + window.width <= integral.width() {
                        if window.accepts(&integral, x, y) {
                            hits.push(Region::new(x, y, window.width, window.height));
                        }
                        x += step;
                    }
                    y += step;
                }
            }
            scale *= growth;
        }

        debug!(raw_hits = hits.len(), "cascade scan complete");
        hits
    }

    pub fn detect(&self, frame: &GrayImage, params: &DetectionParams) -> Vec<Region> {
        let hits = self.scan(frame, params);
        group_rectangles(&hits, params.min_neighbors)
    }
}

struct ScaledStage {
    threshold: f64,
    stumps: Vec<WeakClassifier>,
}

/// The cascade with every rectangle placed for one window size.
struct ScaledWindow {
    width: u32,
    height: u32,
    /// Variance-normalisation interior `(x, y, w, h)` relative to the window.
    inner: (u32, u32, u32, u32),
    stages: Vec<ScaledStage>,
}

impl ScaledWindow {
    fn accepts(&self, integral: &IntegralImage, x: u32, y: u32) -> bool {
        let (ix, iy, iw, ih) = self.inner;
        let norm = f64::from(iw) * f64::from(ih) * integral.std_dev(x + ix, y + iy, iw, ih);
        let norm = if norm > 0.0 { norm } else { 1.0 };

        self.stages.iter().all(|stage| {
            let total: f64 = stage
                .stumps
                .iter()
                .map(|stump| {
                    let sum: f64 = stump
                        .rects
                        .iter()
                        .map(|r| r.weight * integral.rect_sum(x + r.x, y + r.y, r.width, r.height) as f64)
                        .sum();
                    if sum / norm < stump.threshold {
                        stump.left
                    } else {
                        stump.right
                    }
                })
                .sum();
            total >= stage.threshold
        })
    }
}

fn scaled(v: u32, scale: f64) -> u32 {
    ((f64::from(v) * scale).round() as u32).max(1)
}

fn area(r: &WeightedRect) -> f64 {
    f64::from(r.width) * f64::from(r.height)
}

/// Scales rectangles into a `width`x`height` window, then rebalances the first
/// weight so the feature still sums to zero over a flat patch after rounding.
fn place_rects(rects: &[WeightedRect], scale: f64, width: u32, height: u32) -> Vec<WeightedRect> {
    let mut placed: Vec<WeightedRect> = rects
        .iter()
        .map(|r| {
            let x = ((f64::from(r.x) * scale).round() as u32).min(width - 1);
            let y = ((f64::from(r.y) * scale).round() as u32).min(height - 1);
            WeightedRect {
                x,
                y,
                width: scaled(r.width, scale).min(width - x),
                height: scaled(r.height, scale).min(height - y),
                weight: r.weight,
            }
        })
        .collect();
    if let Some((first, rest)) = placed.split_first_mut() {
        if !rest.is_empty() {
            let balance: f64 = rest.iter().map(|r| r.weight * area(r)).sum();
            first.weight = -balance / area(first);
        }
    }
    placed
}

fn similar(a: &Region, b: &Region) -> bool {
    let delta = GROUP_EPS
        * (f64::from(a.width.min(b.width)) + f64::from(a.height.min(b.height)))
        * 0.5;
    let close = |p: u32, q: u32| (f64::from(p) - f64::from(q)).abs() <= delta;
    close(a.x, b.x)
        && close(a.y, b.y)
        && close(a.x + a.width, b.x + b.width)
        && close(a.y + a.height, b.y + b.height)
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Clusters overlapping hits and averages each cluster.
///
/// Clusters with `min_neighbors` or fewer members are dropped, as are small
/// clusters nested inside a better-supported one. With `min_neighbors == 0`
/// the raw hits are returned untouched. Output order follows the first hit of
/// each cluster.
pub fn group_rectangles(hits: &[Region], min_neighbors: u32) -> Vec<Region> {
    if min_neighbors == 0 || hits.is_empty() {
        return hits.to_vec();
    }

    let mut parent: Vec<usize> = (0..hits.len()).collect();
    for i in 0..hits.len() {
        for j in (i + 1)..hits.len() {
            if similar(&hits[i], &hits[j]) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj.max(ri)] = ri.min(rj);
                }
            }
        }
    }

    // (root, member count, summed x, y, w, h) in first-seen order
    let mut clusters: Vec<(usize, u32, [u64; 4])> = Vec::new();
    for (i, hit) in hits.iter().enumerate() {
        let root = find(&mut parent, i);
        let pos = match clusters.iter().position(|c| c.0 == root) {
            Some(pos) => pos,
            None => {
                clusters.push((root, 0, [0; 4]));
                clusters.len() - 1
            }
        };
        let entry = &mut clusters[pos];
        entry.1 += 1;
        entry.2[0] += u64::from(hit.x);
        entry.2[1] += u64::from(hit.y);
        entry.2[2] += u64::from(hit.width);
        entry.2[3] += u64::from(hit.height);
    }

    let averaged: Vec<(Region, u32)> = clusters
        .iter()
        .filter(|(_, n, _)| *n > min_neighbors)
        .map(|(_, n, s)| {
            let n64 = u64::from(*n);
            let avg = |v: u64| ((v as f64) / n64 as f64).round() as u32;
            (Region::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3])), *n)
        })
        .collect();

    averaged
        .iter()
        .enumerate()
        .filter(|(i, (r1, n1))| {
            !averaged.iter().enumerate().any(|(j, (r2, n2))| {
                *i != j && r2.contains(r1) && r2 != r1 && (*n2 > (*n1).max(3) || *n1 < 3)
            })
        })
        .map(|(_, (r, _))| *r)
        .collect()
}

// OpenCV cascade XML. Sequences are written as repeated `<_>` children and
// numbers as whitespace-separated text.

#[derive(Debug, Deserialize)]
struct OpenCvStorage {
    cascade: CascadeXml,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CascadeXml {
    stage_type: Option<String>,
    feature_type: Option<String>,
    width: String,
    height: String,
    stages: XmlSeq<StageXml>,
    features: XmlSeq<FeatureXml>,
}

#[derive(Debug, Deserialize)]
struct XmlSeq<T> {
    #[serde(rename = "_", default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageXml {
    stage_threshold: String,
    weak_classifiers: XmlSeq<WeakXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeakXml {
    internal_nodes: String,
    leaf_values: String,
}

#[derive(Debug, Deserialize)]
struct FeatureXml {
    rects: XmlSeq<String>,
    tilted: Option<String>,
}

fn number<T: FromStr>(text: &str, what: &str) -> Result<T> {
    let text = text.trim();
    text.parse()
        .map_err(|_| AffectError::cascade(format!("{what} is not a number: {text:?}")))
}

impl CascadeXml {
    fn into_cascade(self) -> Result<HaarCascade> {
        if let Some(kind) = self.stage_type.as_deref().map(str::trim) {
            if kind != "BOOST" {
                return Err(AffectError::cascade(format!("unsupported stage type {kind}")));
            }
        }
        if let Some(kind) = self.feature_type.as_deref().map(str::trim) {
            if kind != "HAAR" {
                return Err(AffectError::cascade(format!("unsupported feature type {kind}")));
            }
        }

        let features = self
            .features
            .items
            .iter()
            .enumerate()
            .map(|(i, feature)| feature.to_rects(i))
            .collect::<Result<Vec<_>>>()?;
        let stages = self
            .stages
            .items
            .iter()
            .enumerate()
            .map(|(s, stage)| stage.to_stage(s, &features))
            .collect::<Result<Vec<_>>>()?;

        let cascade = HaarCascade {
            window_width: number(&self.width, "window width")?,
            window_height: number(&self.height, "window height")?,
            stages,
        };
        cascade.validate()?;
        Ok(cascade)
    }
}

impl FeatureXml {
    fn to_rects(&self, index: usize) -> Result<Vec<WeightedRect>> {
        if self.tilted.as_deref().is_some_and(|t| t.trim() != "0") {
            return Err(AffectError::cascade(format!(
                "feature {index} is tilted; only upright features are supported"
            )));
        }
        self.rects
            .items
            .iter()
            .map(|text| -> Result<WeightedRect> {
                let fields: Vec<&str> = text.split_whitespace().collect();
                match fields.as_slice() {
                    [x, y, width, height, weight] => Ok(WeightedRect {
                        x: number(x, "rect x")?,
                        y: number(y, "rect y")?,
                        width: number(width, "rect width")?,
                        height: number(height, "rect height")?,
                        weight: number(weight, "rect weight")?,
                    }),
                    _ => Err(AffectError::cascade(format!(
                        "feature {index} has a malformed rect {:?}",
                        text.trim()
                    ))),
                }
            })
            .collect()
    }
}

impl StageXml {
    fn to_stage(&self, index: usize, features: &[Vec<WeightedRect>]) -> Result<Stage> {
        let classifiers = self
            .weak_classifiers
            .items
            .iter()
            .map(|weak| -> Result<WeakClassifier> {
                let nodes: Vec<&str> = weak.internal_nodes.split_whitespace().collect();
                let leaves: Vec<&str> = weak.leaf_values.split_whitespace().collect();
                match (nodes.as_slice(), leaves.as_slice()) {
                    ([_, _, feature, threshold], [left, right]) => {
                        let feature: usize = number(feature, "feature index")?;
                        let rects = features.get(feature).cloned().ok_or_else(|| {
                            AffectError::cascade(format!(
                                "stage {index} references missing feature {feature}"
                            ))
                        })?;
                        Ok(WeakClassifier {
                            rects,
                            threshold: number(threshold, "node threshold")?,
                            left: number(left, "leaf value")?,
                            right: number(right, "leaf value")?,
                        })
                    }
                    _ => Err(AffectError::cascade(format!(
                        "stage {index} has a weak classifier deeper than one split"
                    ))),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Stage {
            threshold: number(&self.stage_threshold, "stage threshold")?,
            classifiers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overflowing_and_out_of_window_rects() {
        let mut cascade = HaarCascade::frontal_face();
        cascade.stages[0].classifiers[0].rects[0].x = 20;
        assert!(matches!(cascade.validate(), Err(AffectError::InvalidCascade(_))));

        cascade.stages[0].classifiers[0].rects[0].x = u32::MAX;
        assert!(matches!(cascade.validate(), Err(AffectError::InvalidCascade(_))));
    }

    #[test]
    fn rejects_empty_cascade() {
        let cascade = HaarCascade {
            stages: Vec::new(),
            ..HaarCascade::frontal_face()
        };
        assert!(cascade.validate().is_err());
    }

    #[test]
    fn rebalanced_features_cancel_on_flat_patches() {
        for scale in [1.0, 1.1, 1.71, 2.6] {
            for weak in &HaarCascade::frontal_face().stages {
                let placed = place_rects(&weak.classifiers[0].rects, scale, 60, 60);
                let net: f64 = placed.iter().map(|r| r.weight * area(r)).sum();
                assert!(net.abs() < 1e-9, "scale {scale}: {net}");
            }
        }
    }

    #[test]
    fn zero_neighbours_keeps_raw_hits() {
        let hits = vec![Region::new(0, 0, 10, 10), Region::new(1, 1, 10, 10)];
        assert_eq!(group_rectangles(&hits, 0), hits);
    }
}
