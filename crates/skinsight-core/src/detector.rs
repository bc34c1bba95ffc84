//! SCRFD face detector via ONNX Runtime.
//!
//! Locates faces in an RGB photo so the attribute heads can work on a tight
//! crop. Only boxes are decoded; landmarks are not needed for attribute
//! estimation.

use crate::analyzer::AnalyzerError;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [u32; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

/// A detected face in original image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceRegion {
    fn area(&self) -> f32 {
        self.width * self.height
    }

    fn iou(&self, other: &FaceRegion) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

/// Scale and offset applied when fitting the photo into the square input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: u32, height: u32) -> (Self, u32, u32) {
        let side = SCRFD_INPUT_SIZE as f32;
        let scale = (side / width as f32).min(side / height as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, SCRFD_INPUT_SIZE);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, SCRFD_INPUT_SIZE);
        let letterbox = Self {
            scale,
            pad_x: ((SCRFD_INPUT_SIZE - new_w) / 2) as f32,
            pad_y: ((SCRFD_INPUT_SIZE - new_h) / 2) as f32,
        };
        (letterbox, new_w, new_h)
    }

    fn to_image(self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Which model outputs hold the scores and boxes for one stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StrideOutputs {
    score: usize,
    bbox: usize,
}

pub struct FaceDetector {
    session: Session,
    layout: [StrideOutputs; 3],
    threshold: f32,
}

impl FaceDetector {
    pub fn load(model_path: &str, threshold: f32) -> Result<Self, AnalyzerError> {
        if !Path::new(model_path).exists() {
            return Err(AnalyzerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        if names.len() < 6 {
            return Err(AnalyzerError::InferenceFailed(format!(
                "SCRFD model needs score and bbox outputs for 3 strides, got {} outputs",
                names.len()
            )));
        }
        let layout = output_layout(&names);

        tracing::info!(path = model_path, outputs = ?names, ?layout, "loaded SCRFD detector");

        Ok(Self {
            session,
            layout,
            threshold,
        })
    }

    /// Detect faces, highest confidence first.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, AnalyzerError> {
        let (input, letterbox) = preprocess(image);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (slot, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let StrideOutputs { score, bbox } = self.layout[slot];
            let (_, scores) = outputs[score]
                .try_extract_tensor::<f32>()
                .map_err(|e| AnalyzerError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, boxes) = outputs[bbox]
                .try_extract_tensor::<f32>()
                .map_err(|e| AnalyzerError::InferenceFailed(format!("boxes stride {stride}: {e}")))?;

            candidates.extend(decode_stride(scores, boxes, stride, letterbox, self.threshold));
        }

        Ok(nms(candidates, SCRFD_NMS_THRESHOLD))
    }
}

/// Map strides to output tensors. Exports either name them `score_8`,
/// `bbox_8`, ... or use numeric names in the order scores, boxes, keypoints.
fn output_layout(names: &[String]) -> [StrideOutputs; 3] {
    let position = |prefix: &str, stride: u32| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let named: Option<Vec<StrideOutputs>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| {
            Some(StrideOutputs {
                score: position("score", stride)?,
                bbox: position("bbox", stride)?,
            })
        })
        .collect();

    match named.as_deref() {
        Some(&[a, b, c]) => [a, b, c],
        _ => std::array::from_fn(|i| StrideOutputs { score: i, bbox: i + 3 }),
    }
}

/// Letterbox the photo into a 640×640 NCHW tensor normalized for SCRFD.
fn preprocess(image: &RgbImage) -> (Array4<f32>, Letterbox) {
    let (letterbox, new_w, new_h) = Letterbox::fit(image.width(), image.height());
    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let side = SCRFD_INPUT_SIZE as usize;
    // Padding is zero after normalization, i.e. the mean pixel value.
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    let (off_x, off_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);

    for (x, y, pixel) in resized.enumerate_pixels() {
        let (tx, ty) = (off_x + x as usize, off_y + y as usize);
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (pixel[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
        }
    }

    (tensor, letterbox)
}

/// Decode anchor-free box distances for one stride above `threshold`.
fn decode_stride(
    scores: &[f32],
    boxes: &[f32],
    stride: u32,
    letterbox: Letterbox,
    threshold: f32,
) -> Vec<FaceRegion> {
    let grid_w = (SCRFD_INPUT_SIZE / stride) as usize;
    let stride = stride as f32;

    scores
        .iter()
        .enumerate()
        .filter(|&(_, &score)| score > threshold)
        .filter_map(|(idx, &score)| {
            let distances = boxes.get(idx * 4..idx * 4 + 4)?;
            let cell = idx / SCRFD_ANCHORS_PER_CELL;
            let cx = (cell % grid_w) as f32 * stride;
            let cy = (cell / grid_w) as f32 * stride;

            let (x1, y1) = letterbox.to_image(cx - distances[0] * stride, cy - distances[1] * stride);
            let (x2, y2) = letterbox.to_image(cx + distances[2] * stride, cy + distances[3] * stride);

            Some(FaceRegion {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence: score,
            })
        })
        // Degenerate boxes would break cropping downstream.
        .filter(|f| {
            [f.x, f.y, f.width, f.height].iter().all(|v| v.is_finite())
                && f.width > 0.0
                && f.height > 0.0
        })
        .collect()
}

/// Greedy non-maximum suppression; output is sorted by confidence.
fn nms(mut faces: Vec<FaceRegion>, iou_threshold: f32) -> Vec<FaceRegion> {
    faces.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<FaceRegion> = Vec::new();
    for face in faces {
        if kept.iter().all(|k| k.iou(&face) <= iou_threshold) {
            kept.push(face);
        }
    }
    kept
}

/// Crop a face with `margin` extra context per side, clamped to the image.
pub fn crop_face(image: &RgbImage, face: &FaceRegion, margin: f32) -> RgbImage {
    let (w, h) = (image.width() as f32, image.height() as f32);
    let pad_x = face.width * margin;
    let pad_y = face.height * margin;

    let x0 = (face.x - pad_x).clamp(0.0, w - 1.0);
    let y0 = (face.y - pad_y).clamp(0.0, h - 1.0);
    let x1 = (face.x + face.width + pad_x).clamp(x0 + 1.0, w);
    let y1 = (face.y + face.height + pad_y).clamp(y0 + 1.0, h);

    imageops::crop_imm(
        image,
        x0 as u32,
        y0 as u32,
        (x1 - x0).round().max(1.0) as u32,
        (y1 - y0).round().max(1.0) as u32,
    )
    .to_image()
}
