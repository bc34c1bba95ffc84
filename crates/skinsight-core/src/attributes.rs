//! Attribute heads: gender/age, emotion and race classifiers via ONNX Runtime.
//!
//! Each head takes an RGB face crop, resizes it to the model's input size,
//! and decodes the raw output into the lower-case labels the normalizer
//! expects.

use crate::analyzer::AnalyzerError;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

// InsightFace genderage: raw RGB pixels, output [female, male, age / 100].
const GENDER_AGE_INPUT_SIZE: u32 = 96;
const GENDER_LABELS: [&str; 2] = ["female", "male"];

// FER+: raw grayscale pixels, 8 class scores.
const EMOTION_INPUT_SIZE: u32 = 64;
const EMOTION_LABELS: [&str; 8] = [
    "neutral", "happy", "surprise", "sad", "angry", "disgust", "fear", "contempt",
];

// FairFace: ImageNet-normalized RGB, the first 7 logits are the race classes.
const RACE_INPUT_SIZE: u32 = 224;
const RACE_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const RACE_STD: [f32; 3] = [0.229, 0.224, 0.225];
const RACE_LABELS: [&str; 7] = [
    "white",
    "black",
    "latino hispanic",
    "asian", // east asian
    "asian", // southeast asian
    "indian",
    "middle eastern",
];

fn load_session(model_path: &str, what: &str) -> Result<Session, AnalyzerError> {
    if !Path::new(model_path).exists() {
        return Err(AnalyzerError::ModelNotFound(model_path.to_string()));
    }

    let session = Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(model_path)?;

    tracing::info!(
        path = model_path,
        inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
        outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
        "loaded {what} model"
    );

    Ok(session)
}

/// Run a single-input model and return its first output flattened.
fn infer(session: &mut Session, input: Array4<f32>, what: &str) -> Result<Vec<f32>, AnalyzerError> {
    let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
    let (_, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| AnalyzerError::InferenceFailed(format!("{what}: {e}")))?;
    Ok(data.to_vec())
}

/// Resize to `size`×`size` and lay out as NCHW with a per-channel transform.
fn rgb_tensor(face: &RgbImage, size: u32, normalize: impl Fn(usize, u8) -> f32) -> Array4<f32> {
    let resized = imageops::resize(face, size, size, FilterType::Triangle);
    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = normalize(c, pixel[c]);
        }
    }
    tensor
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

/// Index of the largest value; the first one wins ties.
fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Pick the label of the highest score among the first `labels.len()` values.
fn top_label(scores: &[f32], labels: &[&'static str], what: &str) -> Result<&'static str, AnalyzerError> {
    if scores.len() < labels.len() {
        return Err(AnalyzerError::InferenceFailed(format!(
            "{what}: expected at least {} scores, got {}",
            labels.len(),
            scores.len()
        )));
    }
    let probabilities = softmax(&scores[..labels.len()]);
    argmax(&probabilities)
        .map(|i| labels[i])
        .ok_or_else(|| AnalyzerError::InferenceFailed(format!("{what}: empty output")))
}

pub struct GenderAgeHead {
    session: Session,
}

impl GenderAgeHead {
    pub fn load(model_path: &str) -> Result<Self, AnalyzerError> {
        Ok(Self {
            session: load_session(model_path, "gender/age")?,
        })
    }

    /// Returns `(gender label, age in years)`.
    pub fn predict(&mut self, face: &RgbImage) -> Result<(&'static str, f32), AnalyzerError> {
        let output = infer(&mut self.session, Self::preprocess(face), "gender/age")?;
        decode_gender_age(&output)
    }

    fn preprocess(face: &RgbImage) -> Array4<f32> {
        rgb_tensor(face, GENDER_AGE_INPUT_SIZE, |_, p| p as f32)
    }
}

fn decode_gender_age(output: &[f32]) -> Result<(&'static str, f32), AnalyzerError> {
    let [female, male, age] = output else {
        return Err(AnalyzerError::InferenceFailed(format!(
            "gender/age: expected 3 values, got {}",
            output.len()
        )));
    };
    let gender = if male > female { GENDER_LABELS[1] } else { GENDER_LABELS[0] };
    Ok((gender, (age * 100.0).round().max(0.0)))
}

pub struct EmotionHead {
    session: Session,
}

impl EmotionHead {
    pub fn load(model_path: &str) -> Result<Self, AnalyzerError> {
        Ok(Self {
            session: load_session(model_path, "emotion")?,
        })
    }

    pub fn predict(&mut self, face: &RgbImage) -> Result<&'static str, AnalyzerError> {
        let scores = infer(&mut self.session, Self::preprocess(face), "emotion")?;
        top_label(&scores, &EMOTION_LABELS, "emotion")
    }

    /// 64×64 single-channel tensor of raw luma values.
    fn preprocess(face: &RgbImage) -> Array4<f32> {
        let gray = imageops::grayscale(face);
        let resized = imageops::resize(&gray, EMOTION_INPUT_SIZE, EMOTION_INPUT_SIZE, FilterType::Triangle);
        let side = EMOTION_INPUT_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 1, side, side));
        for (x, y, pixel) in resized.enumerate_pixels() {
            tensor[[0, 0, y as usize, x as usize]] = pixel[0] as f32;
        }
        tensor
    }
}

pub struct RaceHead {
    session: Session,
}

impl RaceHead {
    pub fn load(model_path: &str) -> Result<Self, AnalyzerError> {
        Ok(Self {
            session: load_session(model_path, "race")?,
        })
    }

    pub fn predict(&mut self, face: &RgbImage) -> Result<&'static str, AnalyzerError> {
        let logits = infer(&mut self.session, Self::preprocess(face), "race")?;
        top_label(&logits, &RACE_LABELS, "race")
    }

    fn preprocess(face: &RgbImage) -> Array4<f32> {
        rgb_tensor(face, RACE_INPUT_SIZE, |c, p| {
            (p as f32 / 255.0 - RACE_MEAN[c]) / RACE_STD[c]
        })
    }
}
