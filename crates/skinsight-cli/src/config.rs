use skinsight_core::AnalyzerOptions;
use std::path::PathBuf;

/// CLI configuration, loaded from environment variables.
pub struct Config {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Recommendation table to use instead of the built-in one.
    pub table_path: Option<PathBuf>,
    /// Analyze the whole image when no face is detected.
    pub lenient_detection: bool,
    /// Minimum detector score for a face.
    pub detection_threshold: f32,
    /// Context kept around the face box, as a fraction of its size.
    pub face_margin: f32,
}

impl Config {
    /// Load configuration from `SKINSIGHT_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = AnalyzerOptions::default();

        Self {
            model_dir: std::env::var("SKINSIGHT_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| skinsight_core::default_model_dir()),
            table_path: std::env::var("SKINSIGHT_TABLE_PATH").ok().map(PathBuf::from),
            lenient_detection: std::env::var("SKINSIGHT_LENIENT_DETECTION")
                .map(|v| v != "0")
                .unwrap_or(defaults.lenient),
            detection_threshold: env_f32("SKINSIGHT_DETECTION_THRESHOLD", defaults.detection_threshold),
            face_margin: env_f32("SKINSIGHT_FACE_MARGIN", defaults.face_margin),
        }
    }

    pub fn analyzer_options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            lenient: self.lenient_detection,
            detection_threshold: self.detection_threshold,
            face_margin: self.face_margin,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
