use std::collections::HashMap;

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::{Array1, Array4};
use ort::{session::Session, value::Value};

use crate::yunet;

/// Side of the square canvas the detector runs on.
pub const DETECTOR_INPUT: u32 = 640;
/// Side of the aligned crop the recognizer expects.
pub const ALIGNED_SIZE: u32 = 112;

// ArcFace reference eye positions for a 112x112 crop
const REF_LEFT_EYE: (f32, f32) = (38.2946, 51.6963);
const REF_RIGHT_EYE: (f32, f32) = (73.5318, 51.5014);

/// Detection result in source image pixels
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: [f32; 4], // x, y, w, h
    pub score: f32,
    pub landmarks: [f32; 10], // right eye, left eye, nose, mouth corners as x,y pairs
}

/// Face embedding (SFace output, not normalized)
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Array1<f32>,
}

impl Embedding {
    pub fn len(&self) -> usize {
        self.vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self {
            vector: Array1::from(values),
        }
    }
}

/// Aspect-preserving placement of an image inside a square canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub width: u32,
    pub height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl Letterbox {
    pub fn fit(width: u32, height: u32, size: u32) -> Self {
        let scale = size as f32 / width.max(height).max(1) as f32;
        let scaled_w = ((width as f32 * scale) as u32).clamp(1, size);
        let scaled_h = ((height as f32 * scale) as u32).clamp(1, size);
        Self {
            scale,
            width: scaled_w,
            height: scaled_h,
            offset_x: (size - scaled_w) / 2,
            offset_y: (size - scaled_h) / 2,
        }
    }

    /// Map a canvas coordinate back onto the source image.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.offset_x as f32) / self.scale,
            (y - self.offset_y as f32) / self.scale,
        )
    }

    fn render(&self, img: &DynamicImage, size: u32) -> RgbImage {
        let resized = img
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgb8();
        let mut canvas = RgbImage::new(size, size);
        image::imageops::overlay(
            &mut canvas,
            &resized,
            self.offset_x as i64,
            self.offset_y as i64,
        );
        canvas
    }
}

/// Planar BGR float layout (CHW) of an RGB image, values in [0, 255].
pub fn bgr_planes(img: &RgbImage) -> Vec<f32> {
    let plane = (img.width() * img.height()) as usize;
    let mut data = vec![0.0f32; 3 * plane];
    for (i, px) in img.pixels().enumerate() {
        data[i] = px[2] as f32;
        data[plane + i] = px[1] as f32;
        data[2 * plane + i] = px[0] as f32;
    }
    data
}

/// Detect faces in an image using the YuNet detector
pub fn detect_faces(
    session: &mut Session,
    img: &DynamicImage,
    score_threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<Detection>> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        anyhow::bail!("image has no pixels");
    }

    let size = DETECTOR_INPUT;
    let letterbox = Letterbox::fit(width, height, size);
    let canvas = letterbox.render(img, size);

    let input = Array4::from_shape_vec((1, 3, size as usize, size as usize), bgr_planes(&canvas))?;
    let input_tensor = Value::from_array(input)?;
    let outputs = session.run(ort::inputs![input_tensor])?;

    let mut named = HashMap::new();
    for (name, output) in outputs.iter() {
        let (_shape, data) = output.try_extract_tensor::<f32>()?;
        named.insert(name.to_string(), data.to_vec());
    }

    let raw = yunet::decode_detections(&named, size as usize, score_threshold)
        .context("decoding detector output")?;

    let detections: Vec<Detection> = raw
        .into_iter()
        .map(|d| {
            let (x, y) = letterbox.to_source(d.bbox[0], d.bbox[1]);
            let mut landmarks = [0.0f32; 10];
            for k in 0..5 {
                let (lx, ly) = letterbox.to_source(d.landmarks[k * 2], d.landmarks[k * 2 + 1]);
                landmarks[k * 2] = lx;
                landmarks[k * 2 + 1] = ly;
            }
            Detection {
                bbox: [x, y, d.bbox[2] / letterbox.scale, d.bbox[3] / letterbox.scale],
                score: d.score,
                landmarks,
            }
        })
        .collect();

    Ok(nms(detections, nms_threshold))
}

/// Greedy non-maximum suppression, highest score first
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        if keep
            .iter()
            .all(|kept| iou(&kept.bbox, &candidate.bbox) <= iou_threshold)
        {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let left = a[0].max(b[0]);
    let top = a[1].max(b[1]);
    let right = (a[0] + a[2]).min(b[0] + b[2]);
    let bottom = (a[1] + a[3]).min(b[1] + b[3]);

    if right <= left || bottom <= top {
        return 0.0;
    }

    let inter = (right - left) * (bottom - top);
    inter / (a[2] * a[3] + b[2] * b[3] - inter)
}

fn bilinear(img: &RgbImage, x: f32, y: f32) -> Option<Rgb<u8>> {
    let (w, h) = img.dimensions();
    if !(x >= 0.0 && y >= 0.0 && x < w as f32 && y < h as f32) {
        return None;
    }

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let corners = [
        (img.get_pixel(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (img.get_pixel(x1, y0), fx * (1.0 - fy)),
        (img.get_pixel(x0, y1), (1.0 - fx) * fy),
        (img.get_pixel(x1, y1), fx * fy),
    ];

    let mut out = [0u8; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let v: f32 = corners.iter().map(|(p, w)| p[c] as f32 * w).sum();
        *slot = v.round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgb(out))
}

/// Rotate, scale and crop so the eyes land on the reference positions.
pub fn align_face(img: &DynamicImage, detection: &Detection, size: u32) -> Result<DynamicImage> {
    let k = size as f32 / ALIGNED_SIZE as f32;
    let ref_l = (REF_LEFT_EYE.0 * k, REF_LEFT_EYE.1 * k);
    let ref_r = (REF_RIGHT_EYE.0 * k, REF_RIGHT_EYE.1 * k);

    // YuNet emits the subject's right eye first, which is the image-left one
    let src_l = (detection.landmarks[0], detection.landmarks[1]);
    let src_r = (detection.landmarks[2], detection.landmarks[3]);

    let src_d = (src_r.0 - src_l.0, src_r.1 - src_l.1);
    let ref_d = (ref_r.0 - ref_l.0, ref_r.1 - ref_l.1);
    let src_len = src_d.0.hypot(src_d.1);
    if !src_len.is_finite() || src_len <= f32::EPSILON {
        anyhow::bail!("eye landmarks coincide");
    }

    // source pixels per output pixel
    let scale = src_len / ref_d.0.hypot(ref_d.1);
    let (sin, cos) = (src_d.1.atan2(src_d.0) - ref_d.1.atan2(ref_d.0)).sin_cos();
    let src_c = ((src_l.0 + src_r.0) / 2.0, (src_l.1 + src_r.1) / 2.0);
    let ref_c = ((ref_l.0 + ref_r.0) / 2.0, (ref_l.1 + ref_r.1) / 2.0);

    let rgb = img.to_rgb8();
    let mut out = RgbImage::new(size, size);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let dx = x as f32 - ref_c.0;
        let dy = y as f32 - ref_c.1;
        let sx = src_c.0 + scale * (cos * dx - sin * dy);
        let sy = src_c.1 + scale * (sin * dx + cos * dy);
        if let Some(sample) = bilinear(&rgb, sx, sy) {
            *px = sample;
        }
    }

    Ok(DynamicImage::ImageRgb8(out))
}

fn first_output<V>(values: impl IntoIterator<Item = V>) -> Result<V> {
    values
        .into_iter()
        .next()
        .context("recognizer produced no output")
}

/// Encode an aligned face crop with SFace
pub fn encode_face(session: &mut Session, face_img: &DynamicImage) -> Result<Embedding> {
    let size = ALIGNED_SIZE;
    let crop = face_img
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();

    let input = Array4::from_shape_vec((1, 3, size as usize, size as usize), bgr_planes(&crop))?;
    let input_tensor = Value::from_array(input)?;
    let outputs = session.run(ort::inputs![input_tensor])?;
    let output = first_output(outputs.values())?;
    let (_shape, data) = output.try_extract_tensor::<f32>()?;

    Ok(Embedding::from(data.to_vec()))
}
