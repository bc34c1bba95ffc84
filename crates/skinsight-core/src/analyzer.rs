//! Face-attribute analysis.
//!
//! [`FaceAnalyzer`] is the seam to the model that estimates age, gender,
//! emotion and race. [`OnnxAnalyzer`] implements it with an SCRFD face
//! detector followed by three attribute heads. Loaded models are not safe to
//! drive from several requests at once, so callers share one instance through
//! [`SharedAnalyzer`], which serializes every call behind a mutex.

use crate::attributes::{EmotionHead, GenderAgeHead, RaceHead};
use crate::detector::{crop_face, FaceDetector, FaceRegion};
use crate::types::RawFaceAnalysis;
use image::{DynamicImage, RgbImage};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

pub const DETECTOR_MODEL: &str = "det_10g.onnx";
pub const GENDER_AGE_MODEL: &str = "genderage.onnx";
pub const EMOTION_MODEL: &str = "emotion-ferplus-8.onnx";
pub const RACE_MODEL: &str = "race.onnx";

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("model file not found: {0}; download it into the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
    #[error("analyzer lock poisoned by a panicking call")]
    LockPoisoned,
}

/// Estimates face attributes from a decoded image.
pub trait FaceAnalyzer {
    fn analyze(&mut self, image: &DynamicImage) -> Result<RawFaceAnalysis, AnalyzerError>;
}

/// Process-wide analyzer handle. Each call holds the lock for its full
/// duration; the guard is dropped on every return path, errors included.
pub struct SharedAnalyzer<A> {
    inner: Mutex<A>,
}

impl<A: FaceAnalyzer> SharedAnalyzer<A> {
    pub fn new(analyzer: A) -> Self {
        Self {
            inner: Mutex::new(analyzer),
        }
    }

    pub fn analyze(&self, image: &DynamicImage) -> Result<RawFaceAnalysis, AnalyzerError> {
        let mut analyzer = self.inner.lock().map_err(|_| AnalyzerError::LockPoisoned)?;
        analyzer.analyze(image)
    }
}

/// Tuning for [`OnnxAnalyzer`].
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerOptions {
    /// Analyze the whole image when no face clears the detection threshold,
    /// instead of failing with [`AnalyzerError::NoFaceDetected`].
    pub lenient: bool,
    /// Minimum SCRFD score for a detection.
    pub detection_threshold: f32,
    /// Extra context around the face box, as a fraction of its size per side.
    pub face_margin: f32,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            lenient: true,
            detection_threshold: 0.5,
            face_margin: 0.2,
        }
    }
}

/// ONNX Runtime backed analyzer.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    gender_age: GenderAgeHead,
    emotion: EmotionHead,
    race: RaceHead,
    options: AnalyzerOptions,
}

impl OnnxAnalyzer {
    /// Load all four models from `model_dir`. Fails on the first missing or
    /// unloadable model.
    pub fn load(model_dir: &Path, options: AnalyzerOptions) -> Result<Self, AnalyzerError> {
        let path = |name: &str| model_dir.join(name).to_string_lossy().into_owned();

        let detector = FaceDetector::load(&path(DETECTOR_MODEL), options.detection_threshold)?;
        let gender_age = GenderAgeHead::load(&path(GENDER_AGE_MODEL))?;
        let emotion = EmotionHead::load(&path(EMOTION_MODEL))?;
        let race = RaceHead::load(&path(RACE_MODEL))?;

        tracing::info!(
            dir = %model_dir.display(),
            lenient = options.lenient,
            threshold = options.detection_threshold,
            "face analyzer ready"
        );

        Ok(Self {
            detector,
            gender_age,
            emotion,
            race,
            options,
        })
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn analyze(&mut self, image: &DynamicImage) -> Result<RawFaceAnalysis, AnalyzerError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(AnalyzerError::InferenceFailed("empty image".into()));
        }

        let rgb = image.to_rgb8();
        let faces = self.detector.detect(&rgb)?;

        let face = select_face(rgb, &faces, &self.options)?;

        let (gender, age) = self.gender_age.predict(&face)?;
        let emotion = self.emotion.predict(&face)?;
        let race = self.race.predict(&face)?;

        tracing::debug!(age, gender, emotion, race, "face attributes");

        Ok(RawFaceAnalysis {
            age,
            dominant_gender: gender.to_string(),
            dominant_race: race.to_string(),
            dominant_emotion: emotion.to_string(),
        })
    }
}

/// Pick the image region the attribute heads will see: the first (highest
/// confidence) face, or the whole frame in lenient mode when there is none.
fn select_face(
    rgb: RgbImage,
    faces: &[FaceRegion],
    options: &AnalyzerOptions,
) -> Result<RgbImage, AnalyzerError> {
    match faces.first() {
        Some(face) => {
            tracing::debug!(
                faces = faces.len(),
                confidence = face.confidence,
                "analyzing highest-confidence face"
            );
            Ok(crop_face(&rgb, face, options.face_margin))
        }
        None if options.lenient => {
            tracing::warn!(
                width = rgb.width(),
                height = rgb.height(),
                "no face detected; analyzing the whole image"
            );
            Ok(rgb)
        }
        None => Err(AnalyzerError::NoFaceDetected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn sample() -> RawFaceAnalysis {
        RawFaceAnalysis {
            age: 30.0,
            dominant_gender: "female".into(),
            dominant_race: "asian".into(),
            dominant_emotion: "neutral".into(),
        }
    }

    /// Records the highest number of overlapping `analyze` calls.
    struct OverlapProbe {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl FaceAnalyzer for OverlapProbe {
        fn analyze(&mut self, _image: &DynamicImage) -> Result<RawFaceAnalysis, AnalyzerError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(sample())
        }
    }

    /// Fails every other call.
    struct Flaky {
        calls: usize,
    }

    impl FaceAnalyzer for Flaky {
        fn analyze(&mut self, _image: &DynamicImage) -> Result<RawFaceAnalysis, AnalyzerError> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                Err(AnalyzerError::InferenceFailed("transient".into()))
            } else {
                Ok(sample())
            }
        }
    }

    #[test]
    fn test_shared_analyzer_serializes_calls() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let shared = SharedAnalyzer::new(OverlapProbe {
            in_flight: Arc::clone(&in_flight),
            max_in_flight: Arc::clone(&max_in_flight),
        });
        let image = DynamicImage::new_rgb8(8, 8);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..5 {
                        shared.analyze(&image).unwrap();
                    }
                });
            }
        });

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_lock_released_after_error() {
        let shared = SharedAnalyzer::new(Flaky { calls: 0 });
        let image = DynamicImage::new_rgb8(8, 8);

        assert!(matches!(
            shared.analyze(&image),
            Err(AnalyzerError::InferenceFailed(_))
        ));
        assert_eq!(shared.analyze(&image).unwrap(), sample());
    }

    #[test]
    fn test_poisoned_lock_reported() {
        struct Panicking;
        impl FaceAnalyzer for Panicking {
            fn analyze(&mut self, _image: &DynamicImage) -> Result<RawFaceAnalysis, AnalyzerError> {
                panic!("model crashed");
            }
        }

        let shared = SharedAnalyzer::new(Panicking);
        let image = DynamicImage::new_rgb8(4, 4);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = shared.analyze(&image);
        }));
        assert!(outcome.is_err());
        assert!(matches!(
            shared.analyze(&image),
            Err(AnalyzerError::LockPoisoned)
        ));
    }

    #[test]
    fn test_load_missing_models() {
        let err = OnnxAnalyzer::load(Path::new("/nonexistent/skinsight"), AnalyzerOptions::default())
            .err()
            .unwrap();
        match err {
            AnalyzerError::ModelNotFound(path) => assert!(path.ends_with(DETECTOR_MODEL)),
            other => panic!("unexpected error: {other}"),
        }
    }

    fn options(lenient: bool) -> AnalyzerOptions {
        AnalyzerOptions {
            lenient,
            ..AnalyzerOptions::default()
        }
    }

    #[test]
    fn test_select_face_lenient_uses_whole_frame() {
        let frame = RgbImage::from_pixel(64, 48, image::Rgb([90, 60, 30]));
        let selected = select_face(frame.clone(), &[], &options(true)).unwrap();
        assert_eq!(selected.dimensions(), (64, 48));
        assert_eq!(selected, frame);
    }

    #[test]
    fn test_select_face_strict_without_face() {
        let frame = RgbImage::new(64, 48);
        let err = select_face(frame, &[], &options(false)).unwrap_err();
        assert!(matches!(err, AnalyzerError::NoFaceDetected));
    }

    #[test]
    fn test_select_face_crops_best_face() {
        let frame = RgbImage::new(100, 100);
        // Faces arrive sorted by confidence; the first one is cropped.
        let faces = [
            FaceRegion { x: 40.0, y: 40.0, width: 20.0, height: 20.0, confidence: 0.9 },
            FaceRegion { x: 0.0, y: 0.0, width: 80.0, height: 80.0, confidence: 0.6 },
        ];
        for lenient in [true, false] {
            let opts = AnalyzerOptions { face_margin: 0.5, ..options(lenient) };
            let selected = select_face(frame.clone(), &faces, &opts).unwrap();
            assert_eq!(selected.dimensions(), (40, 40));
        }
    }

    #[test]
    fn test_default_options() {
        let options = AnalyzerOptions::default();
        assert!(options.lenient);
        assert!((options.detection_threshold - 0.5).abs() < 1e-6);
    }
}
