//! skinsight-core: face attribute analysis and skincare recommendation lookup.
//!
//! Raw detector output (age, gender, emotion, race) is bucketed into coarse
//! categories and matched against a static recommendation table with a fixed
//! wildcard precedence. The detector itself runs via ONNX Runtime.

pub mod advisor;
pub mod analyzer;
pub mod attributes;
pub mod detector;
pub mod normalizer;
pub mod resolver;
pub mod table;
pub mod types;

pub use advisor::{explain, Advice, Advisor, AdvisorError};
pub use analyzer::{AnalyzerError, AnalyzerOptions, FaceAnalyzer, OnnxAnalyzer, SharedAnalyzer};
pub use resolver::{lookup, resolve, MatchStep, Resolution};
pub use table::{RecommendationTable, TableError};
pub use types::{
    AgeGroup, LookupKey, Mood, NormalizedProfile, Product, RawFaceAnalysis, RecommendationRecord,
};

use std::path::PathBuf;

/// `$XDG_DATA_HOME/skinsight/models`, or `~/.local/share/skinsight/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("skinsight/models")
}
