//! YuNet detector post-processing.
//!
//! YuNet is anchor-free. For every stride (8, 16, 32) the network emits four
//! tensors named `cls_<stride>`, `obj_<stride>`, `bbox_<stride>` and
//! `kps_<stride>`, each laid out as `[1, cells, channels]` with one cell per
//! grid location of the letterboxed input:
//!
//! - score = sqrt(clamp(cls) * clamp(obj))
//! - cx = (col + dx) * stride, cy = (row + dy) * stride
//! - w = exp(dw) * stride, h = exp(dh) * stride
//! - landmark k = ((col + lx_k) * stride, (row + ly_k) * stride)
//!
//! Decoded coordinates are in input pixels.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};

pub const STRIDES: [usize; 3] = [8, 16, 32];

#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub bbox: [f32; 4], // x, y, w, h in input pixels
    pub score: f32,
    pub landmarks: [f32; 10],
}

/// Flattened output tensors of one stride level.
#[derive(Debug, Clone, Copy)]
pub struct LevelOutputs<'a> {
    pub stride: usize,
    pub cls: &'a [f32],
    pub obj: &'a [f32],
    pub bbox: &'a [f32],
    pub kps: &'a [f32],
}

/// Group named network outputs by stride.
pub fn collect_levels(outputs: &HashMap<String, Vec<f32>>) -> Result<Vec<LevelOutputs<'_>>> {
    STRIDES
        .iter()
        .map(|&stride| {
            let get = |kind: &str| {
                outputs
                    .get(&format!("{kind}_{stride}"))
                    .map(Vec::as_slice)
                    .ok_or_else(|| anyhow!("missing YuNet output {kind}_{stride}"))
            };
            Ok(LevelOutputs {
                stride,
                cls: get("cls")?,
                obj: get("obj")?,
                bbox: get("bbox")?,
                kps: get("kps")?,
            })
        })
        .collect()
}

/// Decode every cell of one level scoring at least `score_threshold`.
pub fn decode_level(
    level: &LevelOutputs<'_>,
    input_size: usize,
    score_threshold: f32,
    out: &mut Vec<RawDetection>,
) -> Result<()> {
    let cols = input_size / level.stride;
    let cells = cols * cols;

    if level.cls.len() < cells
        || level.obj.len() < cells
        || level.bbox.len() < cells * 4
        || level.kps.len() < cells * 10
    {
        bail!(
            "stride {} outputs too short for a {}x{} grid",
            level.stride,
            cols,
            cols
        );
    }

    let stride = level.stride as f32;
    for idx in 0..cells {
        let score = (level.cls[idx].clamp(0.0, 1.0) * level.obj[idx].clamp(0.0, 1.0)).sqrt();
        if score < score_threshold {
            continue;
        }

        let col = (idx % cols) as f32;
        let row = (idx / cols) as f32;

        let b = &level.bbox[idx * 4..idx * 4 + 4];
        let cx = (col + b[0]) * stride;
        let cy = (row + b[1]) * stride;
        let w = b[2].exp() * stride;
        let h = b[3].exp() * stride;

        let mut landmarks = [0.0f32; 10];
        for (k, point) in level.kps[idx * 10..idx * 10 + 10].chunks_exact(2).enumerate() {
            landmarks[k * 2] = (col + point[0]) * stride;
            landmarks[k * 2 + 1] = (row + point[1]) * stride;
        }

        out.push(RawDetection {
            bbox: [cx - w / 2.0, cy - h / 2.0, w, h],
            score,
            landmarks,
        });
    }

    Ok(())
}

/// Decode all levels of a YuNet forward pass.
pub fn decode_detections(
    outputs: &HashMap<String, Vec<f32>>,
    input_size: usize,
    score_threshold: f32,
) -> Result<Vec<RawDetection>> {
    let mut detections = Vec::new();
    for level in collect_levels(outputs)? {
        decode_level(&level, input_size, score_threshold, &mut detections)?;
    }
    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_outputs(input_size: usize) -> HashMap<String, Vec<f32>> {
        let mut outputs = HashMap::new();
        for stride in STRIDES {
            let cells = (input_size / stride).pow(2);
            outputs.insert(format!("cls_{stride}"), vec![0.0; cells]);
            outputs.insert(format!("obj_{stride}"), vec![0.0; cells]);
            outputs.insert(format!("bbox_{stride}"), vec![0.0; cells * 4]);
            outputs.insert(format!("kps_{stride}"), vec![0.0; cells * 10]);
        }
        outputs
    }

    #[test]
    fn test_decode_single_cell() {
        let input_size = 640;
        let mut outputs = empty_outputs(input_size);

        // stride 32 grid is 20x20; light up row 10, col 10
        let idx = 10 * 20 + 10;
        outputs.get_mut("cls_32").unwrap()[idx] = 0.81;
        outputs.get_mut("obj_32").unwrap()[idx] = 1.0;
        let bbox = outputs.get_mut("bbox_32").unwrap();
        bbox[idx * 4] = 0.5;
        bbox[idx * 4 + 1] = 0.25;
        bbox[idx * 4 + 2] = 2.0f32.ln();
        bbox[idx * 4 + 3] = 2.0f32.ln();

        let detections = decode_detections(&outputs, input_size, 0.5).unwrap();
        assert_eq!(detections.len(), 1);
        let det = &detections[0];

        // center (10.5 * 32, 10.25 * 32) = (336, 328), size 64x64
        assert!((det.score - 0.9).abs() < 1e-5);
        assert!((det.bbox[0] - 304.0).abs() < 1e-3);
        assert!((det.bbox[1] - 296.0).abs() < 1e-3);
        assert!((det.bbox[2] - 64.0).abs() < 1e-3);
        assert!((det.bbox[3] - 64.0).abs() < 1e-3);
        assert!((det.landmarks[0] - 320.0).abs() < 1e-3);
        assert!((det.landmarks[1] - 320.0).abs() < 1e-3);
    }

    #[test]
    fn test_threshold_filters_everything() {
        let outputs = empty_outputs(640);
        let detections = decode_detections(&outputs, 640, 0.1).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_missing_output_is_reported() {
        let mut outputs = empty_outputs(640);
        outputs.remove("kps_16");
        let err = decode_detections(&outputs, 640, 0.5).unwrap_err();
        assert!(err.to_string().contains("kps_16"));
    }

    #[test]
    fn test_short_level_is_rejected() {
        let mut outputs = empty_outputs(640);
        outputs.insert("cls_8".to_string(), vec![0.0; 10]);
        assert!(decode_detections(&outputs, 640, 0.5).is_err());
    }
}
